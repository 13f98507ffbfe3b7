//! Result sink.
//!
//! Pages flow to a sink in arrival order. The sink decides whether the
//! loop keeps fetching; because the engine awaits `accept` before issuing
//! the next round trip, a slow sink delays the network and memory stays
//! bounded to one page in flight.

use crate::core::{Record, Result};

/// Whether the fetch loop should keep going after a page was delivered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SinkFlow {
    Continue,
    Stop,
}

/// Receives each page as it arrives, in order.
pub trait RecordSink: Send {
    fn accept(&mut self, records: Vec<Record>) -> Result<SinkFlow>;
}

/// Per-page hook invoked synchronously after a page has been forwarded.
pub type PageCallback<'a> = Box<dyn FnMut(&[Record]) -> SinkFlow + Send + 'a>;

/// The default sink: accumulates records in arrival order and invokes the
/// optional per-page callback after each page lands.
#[derive(Default)]
pub struct Collector<'a> {
    records: Vec<Record>,
    callback: Option<PageCallback<'a>>,
}

impl<'a> Collector<'a> {
    pub fn new() -> Self {
        Self {
            records: Vec::new(),
            callback: None,
        }
    }

    pub fn with_callback(callback: impl FnMut(&[Record]) -> SinkFlow + Send + 'a) -> Self {
        Self {
            records: Vec::new(),
            callback: Some(Box::new(callback)),
        }
    }

    pub fn into_records(self) -> Vec<Record> {
        self.records
    }

    pub fn len(&self) -> usize {
        self.records.len()
    }

    pub fn is_empty(&self) -> bool {
        self.records.is_empty()
    }
}

impl RecordSink for Collector<'_> {
    fn accept(&mut self, records: Vec<Record>) -> Result<SinkFlow> {
        let start = self.records.len();
        self.records.extend(records);
        match &mut self.callback {
            Some(callback) => Ok(callback(&self.records[start..])),
            None => Ok(SinkFlow::Continue),
        }
    }
}
