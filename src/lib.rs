// ============================================================================
// listfetch Library
// ============================================================================

pub mod core;
pub mod fetch;
pub mod prelude;
pub mod query;
pub mod session;
pub mod store;

// Re-export main types for convenience
pub use crate::core::{Cursor, FetchError, Page, Record, Result, StoreFault, Value, Window};
pub use crate::fetch::{Collector, FetchRequest, RecordSink, Retriever, Selection, SinkFlow};
pub use crate::query::{Element, QuerySpec};
pub use crate::session::{Session, SessionConfig};
pub use crate::store::{HttpStore, ListStore, MemoryStore};

use std::sync::Arc;

// ============================================================================
// High-level Client API
// ============================================================================

/// Client for a remote list store site.
///
/// This is the recommended way to use listfetch in applications. It wraps a
/// [`Session`] and exposes the retrieval operations; pagination and the
/// throttling fallback are handled underneath, so callers always receive
/// the complete result set.
///
/// # Examples
///
/// ```
/// use listfetch::{FetchRequest, ListClient, MemoryStore, Record};
/// use std::sync::Arc;
///
/// # tokio_test::block_on(async {
/// let store = Arc::new(MemoryStore::new());
/// store.add_item("tasks", Record::new().with("Title", "write docs")).await;
///
/// let client = ListClient::with_store(store).unwrap();
/// let items = client.get_items("tasks", &FetchRequest::new()).await.unwrap();
/// assert_eq!(items.len(), 1);
/// # });
/// ```
pub struct ListClient {
    session: Session,
}

impl ListClient {
    /// Connect to the HTTP store at `site_url` with default configuration.
    pub fn connect(site_url: &str) -> Result<Self> {
        Self::with_config(SessionConfig::new(site_url))
    }

    /// Connect with custom configuration.
    pub fn with_config(config: SessionConfig) -> Result<Self> {
        Ok(Self {
            session: Session::connect(config)?,
        })
    }

    /// Wrap any store implementation, typically a
    /// [`MemoryStore`] in tests.
    pub fn with_store(store: Arc<dyn ListStore>) -> Result<Self> {
        Ok(Self {
            session: Session::with_store(SessionConfig::new("memory://local"), store)?,
        })
    }

    /// Wrap a store with explicit configuration.
    pub fn with_store_and_config(config: SessionConfig, store: Arc<dyn ListStore>) -> Result<Self> {
        Ok(Self {
            session: Session::with_store(config, store)?,
        })
    }

    pub fn session(&self) -> &Session {
        &self.session
    }

    /// Fetch one item by its indexed key.
    pub async fn get_item(&self, list: &str, id: i64) -> Result<Record> {
        self.session.store().item_by_id(list, id).await
    }

    /// Fetch one item by its unique identifier.
    pub async fn get_item_by_unique_id(&self, list: &str, unique_id: uuid::Uuid) -> Result<Record> {
        self.session.store().item_by_unique_id(list, unique_id).await
    }

    /// Run a request and collect every record, in arrival order.
    pub async fn get_items(&self, list: &str, request: &FetchRequest) -> Result<Vec<Record>> {
        let mut collector = Collector::new();
        Retriever::new(&self.session)
            .run(list, request, &mut collector)
            .await?;
        Ok(collector.into_records())
    }

    /// Run a request, invoking `on_page` after each page is delivered. The
    /// callback can return [`SinkFlow::Stop`] to cease fetching; records
    /// delivered up to that point are returned.
    ///
    /// The next page is not requested until the callback returns, so a slow
    /// callback slows the fetch rather than growing a buffer.
    pub async fn get_items_with(
        &self,
        list: &str,
        request: &FetchRequest,
        on_page: impl FnMut(&[Record]) -> SinkFlow + Send,
    ) -> Result<Vec<Record>> {
        let mut collector = Collector::with_callback(on_page);
        Retriever::new(&self.session)
            .run(list, request, &mut collector)
            .await?;
        Ok(collector.into_records())
    }

    /// Run a request against a caller-supplied sink. Nothing is buffered;
    /// the sink owns every page as it arrives.
    pub async fn stream_items(
        &self,
        list: &str,
        request: &FetchRequest,
        sink: &mut dyn RecordSink,
    ) -> Result<()> {
        Retriever::new(&self.session).run(list, request, sink).await
    }
}
