use async_trait::async_trait;
use listfetch::fetch::throttle::{query_cost_fault, QUERY_COST_CODE, QUERY_COST_EXCEPTION};
use listfetch::{
    Cursor, Element, FetchError, FetchRequest, ListClient, ListStore, MemoryStore, Page, Record,
    Result, SinkFlow,
};
use std::collections::HashSet;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::Arc;
use uuid::Uuid;

async fn throttled_client(n: i64, threshold: usize) -> (Arc<MemoryStore>, ListClient) {
    let store = Arc::new(MemoryStore::new().with_cost_threshold(threshold));
    for i in 1..=n {
        store
            .add_item("tasks", Record::new().with("Title", format!("task {}", i)))
            .await;
    }
    let client = ListClient::with_store(store.clone()).unwrap();
    (store, client)
}

#[tokio::test]
async fn test_throttled_scan_switches_to_windows() {
    let (store, client) = throttled_client(2500, 2000).await;

    let request = FetchRequest::new().page_size(1000);
    let records = client.get_items("tasks", &request).await.unwrap();

    assert_eq!(records.len(), 2500);
    let ids: HashSet<i64> = records.iter().filter_map(Record::id).collect();
    assert_eq!(ids.len(), 2500);
    assert!(ids.contains(&1) && ids.contains(&2500));

    // One refused scan, one probe, three windows.
    assert_eq!(store.fetch_calls(), 5);
}

#[tokio::test]
async fn test_window_sequence_for_max_key_10000() {
    let (store, client) = throttled_client(10_000, 5000).await;

    let request = FetchRequest::new().page_size(1000);
    let records = client.get_items("tasks", &request).await.unwrap();
    assert_eq!(records.len(), 10_000);

    // Initial scan + probe + 10 windows.
    let views = store.issued_views();
    assert_eq!(views.len(), 12);

    let probe = Element::parse(&views[1]).unwrap();
    let order_ref = probe
        .child("Query")
        .and_then(|q| q.child("OrderBy"))
        .and_then(|o| o.child("FieldRef"))
        .unwrap();
    assert_eq!(order_ref.attr("Ascending"), Some("FALSE"));

    let mut bounds = Vec::new();
    for view in &views[2..] {
        let parsed = Element::parse(view).unwrap();
        let and = parsed
            .child("Query")
            .and_then(|q| q.child("Where"))
            .and_then(|w| w.child("And"))
            .unwrap();
        let low: i64 = and
            .child("Gt")
            .and_then(|gt| gt.child("Value"))
            .and_then(|v| v.text.clone())
            .unwrap()
            .parse()
            .unwrap();
        let high: i64 = and
            .child("Leq")
            .and_then(|leq| leq.child("Value"))
            .and_then(|v| v.text.clone())
            .unwrap()
            .parse()
            .unwrap();
        bounds.push((low, high));
    }
    let expected: Vec<(i64, i64)> = (0..10).map(|i| (i * 1000, (i + 1) * 1000)).collect();
    assert_eq!(bounds, expected);
}

#[tokio::test]
async fn test_record_on_window_boundary_appears_once() {
    let store = Arc::new(MemoryStore::new().with_cost_threshold(1));
    for id in [1000i64, 2000, 2500] {
        store
            .add_item(
                "tasks",
                Record::new().with("Id", id).with("Title", format!("task {}", id)),
            )
            .await;
    }
    let client = ListClient::with_store(store.clone()).unwrap();

    let records = client
        .get_items("tasks", &FetchRequest::new().page_size(1000))
        .await
        .unwrap();

    let mut ids: Vec<i64> = records.iter().filter_map(Record::id).collect();
    ids.sort();
    assert_eq!(ids, vec![1000, 2000, 2500]);
}

#[tokio::test]
async fn test_max_key_not_aligned_to_span_is_covered() {
    let store = Arc::new(MemoryStore::new().with_cost_threshold(1));
    for id in [1i64, 2500] {
        store
            .add_item(
                "tasks",
                Record::new().with("Id", id).with("Title", format!("task {}", id)),
            )
            .await;
    }
    let client = ListClient::with_store(store.clone()).unwrap();

    let records = client.get_items("tasks", &FetchRequest::new()).await.unwrap();
    let ids: HashSet<i64> = records.iter().filter_map(Record::id).collect();
    assert_eq!(ids, HashSet::from([1, 2500]));
}

/// Refuses every unbounded scan outright and delegates probes and bounded
/// window queries to the wrapped store.
struct ScanRefusingStore {
    inner: Arc<MemoryStore>,
    calls: AtomicUsize,
}

#[async_trait]
impl ListStore for ScanRefusingStore {
    async fn fetch_page(
        &self,
        list: &str,
        view: &Element,
        cursor: Option<&Cursor>,
    ) -> Result<Page> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let is_probe = view.child("RowLimit").and_then(|l| l.text.as_deref()) == Some("1");
        let is_bounded = view
            .child("Query")
            .and_then(|q| q.child("Where"))
            .is_some();
        if !is_probe && !is_bounded {
            return Err(FetchError::Remote(query_cost_fault(list)));
        }
        self.inner.fetch_page(list, view, cursor).await
    }

    async fn item_by_id(&self, list: &str, id: i64) -> Result<Record> {
        self.inner.item_by_id(list, id).await
    }

    async fn item_by_unique_id(&self, list: &str, unique_id: Uuid) -> Result<Record> {
        self.inner.item_by_unique_id(list, unique_id).await
    }
}

#[tokio::test]
async fn test_single_record_fetched_through_one_window() {
    let inner = Arc::new(MemoryStore::new());
    inner
        .add_item("tasks", Record::new().with("Title", "only one"))
        .await;
    let store = Arc::new(ScanRefusingStore {
        inner,
        calls: AtomicUsize::new(0),
    });
    let client = ListClient::with_store(store.clone()).unwrap();

    let records = client.get_items("tasks", &FetchRequest::new()).await.unwrap();
    assert_eq!(records.len(), 1);
    assert_eq!(records[0].id(), Some(1));

    // Refused scan, probe, one window.
    assert_eq!(store.calls.load(Ordering::SeqCst), 3);
}

#[tokio::test]
async fn test_throttled_query_with_expression_is_reraised() {
    let (store, client) = throttled_client(2500, 2000).await;

    let request = FetchRequest::new().query(
        r#"<View><Query><Where><Gt><FieldRef Name="Id"/><Value Type="Counter">0</Value></Gt></Where></Query><RowLimit>1000</RowLimit></View>"#,
    );
    let err = client.get_items("tasks", &request).await.unwrap_err();

    let fault = err.store_fault().expect("expected the store fault");
    assert_eq!(fault.code, QUERY_COST_CODE);
    assert_eq!(fault.exception, QUERY_COST_EXCEPTION);
    // No probe, no windows: the refusal came straight back.
    assert_eq!(store.fetch_calls(), 1);
}

#[tokio::test]
async fn test_fast_and_fallback_paths_agree() {
    let (_fast_store, fast) = throttled_client(2500, usize::MAX).await;
    let (_slow_store, slow) = throttled_client(2500, 2000).await;

    let request = FetchRequest::new().page_size(1000).fields(&["Id", "Title"]);
    let fast_records = fast.get_items("tasks", &request).await.unwrap();
    let mut slow_records = slow.get_items("tasks", &request).await.unwrap();
    slow_records.sort_by_key(|r| r.id());

    assert_eq!(fast_records.len(), slow_records.len());
    for (a, b) in fast_records.iter().zip(slow_records.iter()) {
        assert_eq!(a.id(), b.id());
        assert_eq!(a.get("Title"), b.get("Title"));
    }
}

#[tokio::test]
async fn test_callback_stop_inside_fallback() {
    let (store, client) = throttled_client(2500, 2000).await;

    let request = FetchRequest::new().page_size(1000);
    let records = client
        .get_items_with("tasks", &request, |_| SinkFlow::Stop)
        .await
        .unwrap();

    // Refused scan, probe, first window, then the sink stopped the loop.
    assert_eq!(records.len(), 1000);
    assert_eq!(store.fetch_calls(), 3);
}

/// Store that refuses every scan and answers the max-key probe with a
/// canned page. Lets the degraded probe paths be pinned exactly.
struct ProbeScriptedStore {
    probe_page: Vec<Record>,
    calls: AtomicUsize,
}

impl ProbeScriptedStore {
    fn new(probe_page: Vec<Record>) -> Self {
        Self {
            probe_page,
            calls: AtomicUsize::new(0),
        }
    }
}

#[async_trait]
impl ListStore for ProbeScriptedStore {
    async fn fetch_page(
        &self,
        list: &str,
        view: &Element,
        _cursor: Option<&Cursor>,
    ) -> Result<Page> {
        self.calls.fetch_add(1, Ordering::SeqCst);
        let is_probe = view.child("RowLimit").and_then(|l| l.text.as_deref()) == Some("1");
        if is_probe {
            Ok(Page::new(self.probe_page.clone(), None))
        } else {
            Err(FetchError::Remote(query_cost_fault(list)))
        }
    }

    async fn item_by_id(&self, list: &str, id: i64) -> Result<Record> {
        Err(FetchError::ItemNotFound(list.to_string(), id.to_string()))
    }

    async fn item_by_unique_id(&self, list: &str, unique_id: Uuid) -> Result<Record> {
        Err(FetchError::ItemNotFound(
            list.to_string(),
            unique_id.to_string(),
        ))
    }
}

#[tokio::test]
async fn test_empty_probe_reraises_the_throttling_fault() {
    let store = Arc::new(ProbeScriptedStore::new(Vec::new()));
    let client = ListClient::with_store(store.clone()).unwrap();

    let err = client
        .get_items("tasks", &FetchRequest::new())
        .await
        .unwrap_err();

    let fault = err.store_fault().expect("expected the store fault");
    assert_eq!(fault.code, QUERY_COST_CODE);
    assert_eq!(fault.exception, QUERY_COST_EXCEPTION);
    // The refused scan and the probe; no windows were attempted.
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_probe_without_readable_key_reraises() {
    let probe_page = vec![Record::new().with("Title", "no id here")];
    let store = Arc::new(ProbeScriptedStore::new(probe_page));
    let client = ListClient::with_store(store.clone()).unwrap();

    let err = client
        .get_items("tasks", &FetchRequest::new())
        .await
        .unwrap_err();

    assert_eq!(err.store_fault().unwrap().code, QUERY_COST_CODE);
    assert_eq!(store.calls.load(Ordering::SeqCst), 2);
}

#[tokio::test]
async fn test_non_throttling_fault_does_not_engage_fallback() {
    struct BrokenStore;

    #[async_trait]
    impl ListStore for BrokenStore {
        async fn fetch_page(
            &self,
            _list: &str,
            _view: &Element,
            _cursor: Option<&Cursor>,
        ) -> Result<Page> {
            Err(FetchError::Remote(listfetch::StoreFault::new(
                "InternalError",
                "ServerException",
                "unrelated failure",
            )))
        }

        async fn item_by_id(&self, list: &str, id: i64) -> Result<Record> {
            Err(FetchError::ItemNotFound(list.to_string(), id.to_string()))
        }

        async fn item_by_unique_id(&self, list: &str, unique_id: Uuid) -> Result<Record> {
            Err(FetchError::ItemNotFound(
                list.to_string(),
                unique_id.to_string(),
            ))
        }
    }

    let client = ListClient::with_store(Arc::new(BrokenStore)).unwrap();
    let err = client
        .get_items("tasks", &FetchRequest::new())
        .await
        .unwrap_err();
    assert_eq!(err.store_fault().unwrap().code, "InternalError");
}
