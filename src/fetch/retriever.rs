//! Retrieval orchestration.
//!
//! Maps a selection request onto the store: direct lookups for the id
//! modes, the cursor paginator for query-or-all, and the range fallback
//! when the store refuses a query as too expensive. The fallback is only
//! synthesized for requests without an opaque expression; a throttled
//! expression query re-raises the fault unchanged.

use crate::core::Result;
use crate::fetch::paginator::paginate;
use crate::fetch::sink::RecordSink;
use crate::fetch::throttle::is_throttled;
use crate::fetch::window::repartition;
use crate::query::spec::{build_view, QuerySpec};
use crate::session::Session;
use log::debug;
use uuid::Uuid;

/// Which records to retrieve. At most one mode per request; the default is
/// every record in the list.
#[derive(Debug, Clone, Default)]
pub enum Selection {
    #[default]
    All,
    ById(i64),
    ByUniqueId(Uuid),
    Query(String),
}

/// One retrieval request as handed over by the caller.
#[derive(Debug, Clone, Default)]
pub struct FetchRequest {
    pub selection: Selection,
    pub fields: Option<Vec<String>>,
    pub page_size: Option<u32>,
}

impl FetchRequest {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn by_id(mut self, id: i64) -> Self {
        self.selection = Selection::ById(id);
        self
    }

    pub fn by_unique_id(mut self, unique_id: Uuid) -> Self {
        self.selection = Selection::ByUniqueId(unique_id);
        self
    }

    pub fn query(mut self, expression: &str) -> Self {
        self.selection = Selection::Query(expression.to_string());
        self
    }

    pub fn fields(mut self, fields: &[&str]) -> Self {
        self.fields = Some(fields.iter().map(|f| f.to_string()).collect());
        self
    }

    pub fn page_size(mut self, page_size: u32) -> Self {
        self.page_size = Some(page_size);
        self
    }
}

/// Executes [`FetchRequest`]s against one session.
pub struct Retriever<'a> {
    session: &'a Session,
}

impl<'a> Retriever<'a> {
    pub fn new(session: &'a Session) -> Self {
        Self { session }
    }

    /// Run the request, streaming every record into `sink`.
    pub async fn run(
        &self,
        list: &str,
        request: &FetchRequest,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        let store = self.session.store();
        match &request.selection {
            Selection::ById(id) => {
                let record = store.item_by_id(list, *id).await?;
                sink.accept(vec![record])?;
                Ok(())
            }
            Selection::ByUniqueId(unique_id) => {
                let record = store.item_by_unique_id(list, *unique_id).await?;
                sink.accept(vec![record])?;
                Ok(())
            }
            Selection::Query(expression) => {
                self.run_paged(list, request, Some(expression.clone()), sink)
                    .await
            }
            Selection::All => self.run_paged(list, request, None, sink).await,
        }
    }

    async fn run_paged(
        &self,
        list: &str,
        request: &FetchRequest,
        expression: Option<String>,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        // An explicit page size always wins. Without one, an expression
        // keeps whatever RowLimit it carries and plain requests page at the
        // session default.
        let page_size = match (request.page_size, &expression) {
            (Some(n), _) => Some(n),
            (None, Some(_)) => None,
            (None, None) => Some(self.session.config().default_page_size),
        };
        let spec = QuerySpec {
            expression,
            fields: request.fields.clone(),
            page_size,
        };

        let view = build_view(&spec)?;
        match paginate(self.session.store(), list, &view, sink).await {
            Ok(_) => Ok(()),
            Err(err) if is_throttled(&err) && spec.expression.is_none() => {
                repartition(self.session.store(), list, &spec, sink, err).await
            }
            Err(err) => {
                if is_throttled(&err) {
                    debug!(
                        "list '{}': throttled query carries a caller expression; not repartitioning",
                        list
                    );
                }
                Err(err)
            }
        }
    }
}
