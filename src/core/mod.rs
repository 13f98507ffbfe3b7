pub mod error;
pub mod types;
pub mod value;

pub use error::{FetchError, Result, StoreFault};
pub use types::{Cursor, Page, Record, Window, DEFAULT_PAGE_SIZE, ID_FIELD, UNIQUE_ID_FIELD};
pub use value::Value;
