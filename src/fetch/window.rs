//! Range repartitioning, the throttling fallback.
//!
//! When the store refuses a query as too expensive, the same result set is
//! retrieved through a series of cheap queries, each bounded to one window
//! of the indexed key space. The maximum key is probed first with a
//! single-row descending read; windows then cover `(0, maxKey]` in fixed
//! spans, each one paginated to completion in order. Cost-based refusals
//! come from deep scans, so keeping every window small keeps every
//! server-side evaluation under the threshold regardless of list size.

use crate::core::{FetchError, Result, Window, ID_FIELD};
use crate::fetch::paginator::paginate;
use crate::fetch::sink::{RecordSink, SinkFlow};
use crate::query::spec::{build_max_key_probe, build_window_view, QuerySpec};
use crate::store::ListStore;
use log::{debug, info, warn};

/// Span-aligned windows from zero, in ascending order, generated lazily.
/// Generation stops once a window's low bound reaches `max_key`; because
/// windows are `(low, high]`, the last generated window contains `max_key`.
pub fn windows(span: i64, max_key: i64) -> impl Iterator<Item = Window> {
    (0i64..)
        .map(move |index| Window::new(index * span, (index + 1) * span))
        .take_while(move |window| window.low < max_key)
}

/// Retrieve the full result set of a throttled, expression-free query by
/// issuing one bounded query per key window.
///
/// Preconditions are enforced by the retriever: the triggering error
/// classified as throttling and `spec` carries no opaque expression. When
/// the max-key probe cannot produce a usable bound the fallback is
/// abandoned and `original` (the throttling error that got us here) is
/// re-raised so the caller still sees the root cause. Failures inside the
/// window loop propagate as received; there is no nested fallback.
pub async fn repartition(
    store: &dyn ListStore,
    list: &str,
    spec: &QuerySpec,
    sink: &mut dyn RecordSink,
    original: FetchError,
) -> Result<()> {
    debug_assert!(spec.expression.is_none());

    let probe = build_max_key_probe();
    let page = match store.fetch_page(list, &probe, None).await {
        Ok(page) => page,
        Err(probe_err) => {
            warn!(
                "list '{}': max-key probe failed ({}); re-raising the throttling error",
                list, probe_err
            );
            return Err(original);
        }
    };

    if page.len() != 1 {
        warn!(
            "list '{}': max-key probe returned {} record(s); re-raising the throttling error",
            list,
            page.len()
        );
        return Err(original);
    }
    let Some(max_key) = page.records[0].id() else {
        warn!(
            "list '{}': max-key probe record carries no readable '{}'; re-raising the throttling error",
            list, ID_FIELD
        );
        return Err(original);
    };

    let span = i64::from(spec.effective_page_size());
    info!(
        "list '{}': query throttled; repartitioning on '{}' up to {} in windows of {}",
        list, ID_FIELD, max_key, span
    );

    for window in windows(span, max_key) {
        debug!(
            "list '{}': window ({}, {}]",
            list, window.low, window.high
        );
        let view = build_window_view(spec, window)?;
        if paginate(store, list, &view, sink).await? == SinkFlow::Stop {
            break;
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_windows_cover_the_key_space() {
        let all: Vec<Window> = windows(1000, 10_000).collect();
        assert_eq!(all.len(), 10);
        assert_eq!(all[0], Window::new(0, 1000));
        assert_eq!(all[9], Window::new(9000, 10_000));
        for key in [1, 999, 1000, 1001, 9999, 10_000] {
            assert_eq!(all.iter().filter(|w| w.contains(key)).count(), 1);
        }
    }

    #[test]
    fn test_last_window_contains_unaligned_max_key() {
        let all: Vec<Window> = windows(1000, 2500).collect();
        assert_eq!(all.len(), 3);
        assert!(all[2].contains(2500));
    }

    #[test]
    fn test_single_window_for_small_max_key() {
        let all: Vec<Window> = windows(1000, 1).collect();
        assert_eq!(all, vec![Window::new(0, 1000)]);
    }

    #[test]
    fn test_no_windows_for_empty_range() {
        assert_eq!(windows(1000, 0).count(), 0);
    }

    #[test]
    fn test_windows_never_overlap() {
        let all: Vec<Window> = windows(300, 1000).collect();
        for pair in all.windows(2) {
            assert_eq!(pair[0].high, pair[1].low);
        }
    }
}
