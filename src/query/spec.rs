//! Query descriptor builder.
//!
//! Turns a [`QuerySpec`], the semantic description of what the caller
//! wants, into a concrete `<View>` document, splicing projection, row
//! limit and the fallback range predicate into either a caller-supplied
//! expression or a fresh view. Splicing always replaces a directive of the
//! same kind instead of appending a duplicate.

use crate::core::{FetchError, Result, Window, DEFAULT_PAGE_SIZE, ID_FIELD};
use crate::query::markup::Element;

pub const VIEW: &str = "View";
pub const VIEW_FIELDS: &str = "ViewFields";
pub const FIELD_REF: &str = "FieldRef";
pub const ROW_LIMIT: &str = "RowLimit";
pub const QUERY: &str = "Query";
pub const WHERE: &str = "Where";
pub const ORDER_BY: &str = "OrderBy";
pub const VALUE: &str = "Value";
pub const AND: &str = "And";
pub const GT: &str = "Gt";
pub const LEQ: &str = "Leq";

pub const NAME_ATTR: &str = "Name";
pub const PAGED_ATTR: &str = "Paged";
pub const ASCENDING_ATTR: &str = "Ascending";
pub const TYPE_ATTR: &str = "Type";
pub const COUNTER_TYPE: &str = "Counter";

/// Semantic query description supplied by the caller.
///
/// `expression` is an opaque, complete `<View>` document; the builder only
/// edits it structurally. The range fallback is only legal when no
/// expression is present, which the retriever enforces.
#[derive(Debug, Clone, Default)]
pub struct QuerySpec {
    pub expression: Option<String>,
    pub fields: Option<Vec<String>>,
    pub page_size: Option<u32>,
}

impl QuerySpec {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn expression(mut self, expression: &str) -> Self {
        self.expression = Some(expression.to_string());
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

    /// The requested page size when positive, the default otherwise. Also
    /// the window span used by the range fallback.
    pub fn effective_page_size(&self) -> u32 {
        match self.page_size {
            Some(n) if n > 0 => n,
            _ => DEFAULT_PAGE_SIZE,
        }
    }
}

/// Render the paged view for the main fetch loop.
pub fn build_view(spec: &QuerySpec) -> Result<Element> {
    let mut view = base_view(spec)?;
    if let Some(fields) = &spec.fields {
        set_view_fields(&mut view, fields);
    }
    set_row_limit(&mut view, spec.page_size.filter(|n| *n > 0));
    Ok(view)
}

/// Render one bounded window query for the range fallback: the paged view
/// with any existing range predicate replaced by this window's bounds.
pub fn build_window_view(spec: &QuerySpec, window: Window) -> Result<Element> {
    let mut view = build_view(spec)?;
    view.ensure_child(QUERY).replace_child(window_predicate(window));
    Ok(view)
}

/// Render the max-key probe: the indexed key only, descending, one row,
/// unpaged.
pub fn build_max_key_probe() -> Element {
    let order = Element::new(ORDER_BY).with_child(
        Element::new(FIELD_REF)
            .with_attr(NAME_ATTR, ID_FIELD)
            .with_attr(ASCENDING_ATTR, "FALSE"),
    );
    Element::new(VIEW)
        .with_child(
            Element::new(VIEW_FIELDS)
                .with_child(Element::new(FIELD_REF).with_attr(NAME_ATTR, ID_FIELD)),
        )
        .with_child(Element::new(QUERY).with_child(order))
        .with_child(Element::new(ROW_LIMIT).with_text("1"))
}

fn base_view(spec: &QuerySpec) -> Result<Element> {
    match &spec.expression {
        Some(expression) => {
            let view = Element::parse(expression)?;
            if view.name != VIEW {
                return Err(FetchError::MalformedQuery(format!(
                    "query root element must be <{}>, found <{}>",
                    VIEW, view.name
                )));
            }
            Ok(view)
        }
        None => Ok(Element::new(VIEW)),
    }
}

fn set_view_fields(view: &mut Element, fields: &[String]) {
    let mut view_fields = Element::new(VIEW_FIELDS);
    for field in fields {
        view_fields
            .children
            .push(Element::new(FIELD_REF).with_attr(NAME_ATTR, field));
    }
    view.replace_child(view_fields);
}

/// Splice the paging directive. An explicit size replaces whatever the
/// expression carried; otherwise an existing limit is kept and only a
/// missing one falls back to the default. The loop always pages, so the
/// directive is always marked paged.
fn set_row_limit(view: &mut Element, rows: Option<u32>) {
    let limit = view.ensure_child(ROW_LIMIT);
    match rows {
        Some(n) => limit.set_text(&n.to_string()),
        None => {
            if limit.text.is_none() {
                limit.set_text(&DEFAULT_PAGE_SIZE.to_string());
            }
        }
    }
    limit.set_attr(PAGED_ATTR, "TRUE");
}

fn window_predicate(window: Window) -> Element {
    let key_ref = || Element::new(FIELD_REF).with_attr(NAME_ATTR, ID_FIELD);
    let bound = |value: i64| {
        Element::new(VALUE)
            .with_attr(TYPE_ATTR, COUNTER_TYPE)
            .with_text(&value.to_string())
    };
    let gt = Element::new(GT)
        .with_child(key_ref())
        .with_child(bound(window.low));
    let leq = Element::new(LEQ)
        .with_child(key_ref())
        .with_child(bound(window.high));
    Element::new(WHERE).with_child(Element::new(AND).with_child(gt).with_child(leq))
}
