pub mod paginator;
pub mod retriever;
pub mod sink;
pub mod throttle;
pub mod window;

pub use retriever::{FetchRequest, Retriever, Selection};
pub use sink::{Collector, PageCallback, RecordSink, SinkFlow};
