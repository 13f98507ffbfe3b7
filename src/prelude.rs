//! Convenience re-exports for the common path.
//!
//! ```
//! use listfetch::prelude::*;
//! ```

pub use crate::core::{Cursor, FetchError, Page, Record, Result, StoreFault, Value, Window};
pub use crate::fetch::{Collector, FetchRequest, RecordSink, Retriever, Selection, SinkFlow};
pub use crate::query::{Element, QuerySpec};
pub use crate::session::{Session, SessionConfig};
pub use crate::store::{HttpStore, ListStore, MemoryStore};
pub use crate::ListClient;
