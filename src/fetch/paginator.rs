//! Cursor pagination.
//!
//! Drives repeated fetch-page round trips from an empty cursor until the
//! store reports no continuation, streaming every page into the sink as it
//! arrives. One fetch is outstanding at a time; the next round trip only
//! starts after the sink has taken the previous page.

use crate::core::{Cursor, Result};
use crate::fetch::sink::{RecordSink, SinkFlow};
use crate::query::Element;
use crate::store::ListStore;
use log::debug;

/// Run one view query to completion. Returns `SinkFlow::Stop` when the sink
/// cancelled the loop, `SinkFlow::Continue` when the cursor ran out. Store
/// errors propagate unchanged.
pub async fn paginate(
    store: &dyn ListStore,
    list: &str,
    view: &Element,
    sink: &mut dyn RecordSink,
) -> Result<SinkFlow> {
    let mut cursor: Option<Cursor> = None;
    let mut pages = 0usize;
    loop {
        let page = store.fetch_page(list, view, cursor.as_ref()).await?;
        pages += 1;
        debug!(
            "list '{}': page {} with {} record(s), more={}",
            list,
            pages,
            page.len(),
            page.next.is_some()
        );

        let next = page.next;
        if sink.accept(page.records)? == SinkFlow::Stop {
            debug!("list '{}': sink stopped pagination after page {}", list, pages);
            return Ok(SinkFlow::Stop);
        }
        match next {
            Some(token) => cursor = Some(token),
            None => return Ok(SinkFlow::Continue),
        }
    }
}
