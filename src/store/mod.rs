pub mod http;
pub mod memory;

use crate::core::{Cursor, Page, Record, Result};
use crate::query::Element;
use async_trait::async_trait;
use uuid::Uuid;

/// The seam to the remote list store.
///
/// One call is one remote round trip. Implementations return errors as
/// received and never retry; classification and recovery belong to the
/// fetch engine. Writing code against this trait keeps the engine testable
/// with [`memory::MemoryStore`] and deployable with [`http::HttpStore`].
#[async_trait]
pub trait ListStore: Send + Sync {
    /// Execute a view query and return one page plus the continuation
    /// cursor, starting from the beginning when `cursor` is `None`.
    async fn fetch_page(
        &self,
        list: &str,
        view: &Element,
        cursor: Option<&Cursor>,
    ) -> Result<Page>;

    /// Direct lookup by the indexed key.
    async fn item_by_id(&self, list: &str, id: i64) -> Result<Record>;

    /// Direct lookup by the unique identifier.
    async fn item_by_unique_id(&self, list: &str, unique_id: Uuid) -> Result<Record>;
}

pub use http::HttpStore;
pub use memory::MemoryStore;
