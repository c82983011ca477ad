use std::collections::VecDeque;
use std::sync::{Arc, Mutex};
use std::time::Duration;

use futures::future::BoxFuture;
use futures::FutureExt;
use serde_json::{json, Value};

use crate::controller::{ControllerError, ControllerOptions, ListController};
use crate::entity::{EntityDescriptor, EntityKind};
use crate::fetch::{normalize, FetchError, ListFetcher, Page};
use crate::query::ListQuery;

enum Reply {
    Ok { after: Duration, body: Value },
    Fail { after: Duration, status: u16 },
}

/// In-memory backend: records every query and answers from a script. Once
/// the script runs out it answers with an empty page.
#[derive(Default)]
struct ScriptedFetcher {
    calls: Mutex<Vec<ListQuery>>,
    replies: Mutex<VecDeque<Reply>>,
}

impl ScriptedFetcher {
    fn with(replies: Vec<Reply>) -> Arc<Self> {
        Arc::new(Self {
            calls: Mutex::new(Vec::new()),
            replies: Mutex::new(replies.into()),
        })
    }

    fn calls(&self) -> Vec<ListQuery> {
        self.calls.lock().unwrap().clone()
    }
}

impl ListFetcher<Value> for ScriptedFetcher {
    fn fetch(
        &self,
        _descriptor: &EntityDescriptor,
        query: &ListQuery,
    ) -> BoxFuture<'static, Result<Page<Value>, FetchError>> {
        self.calls.lock().unwrap().push(query.clone());
        let reply = self.replies.lock().unwrap().pop_front().unwrap_or(Reply::Ok {
            after: Duration::ZERO,
            body: json!({ "count": 0, "results": [] }),
        });
        async move {
            match reply {
                Reply::Ok { after, body } => {
                    tokio::time::sleep(after).await;
                    let bytes = serde_json::to_vec(&body).unwrap();
                    Ok(normalize(&bytes).unwrap())
                }
                Reply::Fail { after, status } => {
                    tokio::time::sleep(after).await;
                    Err(FetchError::Status {
                        url: "http://localhost:8000/api/".to_string(),
                        status,
                    })
                }
            }
        }
        .boxed()
    }
}

fn ok(body: Value) -> Reply {
    Reply::Ok {
        after: Duration::ZERO,
        body,
    }
}

fn page_of(count: usize, from: usize, len: usize) -> Value {
    let results: Vec<Value> = (from..from + len)
        .map(|i| json!({ "fid": i, "name": format!("Site {i}"), "type": "Clinic" }))
        .collect();
    json!({ "count": count, "results": results })
}

fn spawn(
    fetcher: &Arc<ScriptedFetcher>,
    options: ControllerOptions,
) -> ListController<Value> {
    ListController::spawn(
        EntityKind::Facilities.descriptor(),
        Arc::clone(fetcher),
        options,
    )
}

#[tokio::test(start_paused = true)]
async fn typing_burst_issues_one_search_fetch() {
    let fetcher = ScriptedFetcher::with(vec![ok(page_of(3, 0, 3)), ok(page_of(1, 0, 1))]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    for term in ["a", "ab", "abc"] {
        controller.set_search(term).unwrap();
        tokio::time::sleep(Duration::from_millis(100)).await;
    }
    let state = controller.settle().await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[0].search, "");
    assert_eq!(calls[1].search, "abc");
    assert_eq!(state.debounced_search_term, "abc");
    assert_eq!(state.total_count, 1);
}

#[tokio::test(start_paused = true)]
async fn search_is_not_sent_before_quiet_period() {
    let fetcher = ScriptedFetcher::with(vec![]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.set_search("tremblay").unwrap();
    tokio::time::sleep(Duration::from_millis(499)).await;
    assert_eq!(fetcher.calls().len(), 1);
    let state = controller.state();
    assert_eq!(state.search_term, "tremblay");
    assert!(state.search_pending);

    tokio::time::sleep(Duration::from_millis(2)).await;
    controller.settle().await.unwrap();
    assert_eq!(fetcher.calls().len(), 2);
    assert_eq!(fetcher.calls()[1].search, "tremblay");
}

#[tokio::test(start_paused = true)]
async fn filter_change_resets_to_first_page() {
    let fetcher = ScriptedFetcher::with(vec![ok(page_of(100, 40, 20)), ok(page_of(12, 0, 12))]);
    let controller = spawn(
        &fetcher,
        ControllerOptions {
            initial_page: 3,
            ..ControllerOptions::default()
        },
    );
    let state = controller.settle().await.unwrap();
    assert_eq!(state.current_page, 3);
    assert_eq!(state.total_pages, 5);

    controller.set_filter("type", Some("CLSC")).unwrap();
    let state = controller.settle().await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls[0].page, 3);
    assert_eq!(calls[1].page, 1);
    assert_eq!(calls[1].filters.get("type").map(String::as_str), Some("CLSC"));
    assert_eq!(state.current_page, 1);
}

#[tokio::test(start_paused = true)]
async fn search_commit_resets_to_first_page() {
    let fetcher = ScriptedFetcher::with(vec![ok(page_of(100, 20, 20))]);
    let controller = spawn(
        &fetcher,
        ControllerOptions {
            initial_page: 2,
            ..ControllerOptions::default()
        },
    );
    controller.settle().await.unwrap();
    controller.set_search("chum").unwrap();
    controller.settle().await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].page, 1);
    assert_eq!(calls[1].search, "chum");
}

#[tokio::test(start_paused = true)]
async fn next_page_keeps_search_and_filters() {
    let fetcher = ScriptedFetcher::with(vec![ok(page_of(100, 0, 20)), ok(page_of(100, 20, 20))]);
    let mut filters = std::collections::BTreeMap::new();
    filters.insert("type".to_string(), "Hospital".to_string());
    let controller = spawn(
        &fetcher,
        ControllerOptions {
            initial_search: "mont".to_string(),
            initial_filters: filters,
            ..ControllerOptions::default()
        },
    );
    controller.settle().await.unwrap();
    controller.next_page().unwrap();
    let state = controller.settle().await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].page, 2);
    assert_eq!(calls[1].search, calls[0].search);
    assert_eq!(calls[1].filters, calls[0].filters);
    assert_eq!(state.current_page, 2);
}

#[tokio::test(start_paused = true)]
async fn page_moves_outside_range_are_ignored() {
    let fetcher = ScriptedFetcher::with(vec![ok(page_of(30, 0, 20))]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.previous_page().unwrap();
    controller.go_to_page(0).unwrap();
    controller.go_to_page(3).unwrap();
    controller.go_to_page(1).unwrap();
    controller.settle().await.unwrap();
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn both_response_shapes_are_normalized() {
    let bare: Vec<Value> = (0..5).map(|i| json!({ "fid": i })).collect();
    let fetcher = ScriptedFetcher::with(vec![ok(page_of(47, 0, 20)), ok(Value::Array(bare))]);
    let controller = spawn(&fetcher, ControllerOptions::default());

    let state = controller.settle().await.unwrap();
    assert_eq!(state.items.len(), 20);
    assert_eq!(state.total_count, 47);
    assert_eq!(state.total_pages, 3);

    controller.refresh().unwrap();
    let state = controller.settle().await.unwrap();
    assert_eq!(state.items.len(), 5);
    assert_eq!(state.total_count, 5);
    assert_eq!(state.total_pages, 1);
    assert!(!state.paginated);
}

#[tokio::test(start_paused = true)]
async fn late_response_from_older_query_is_discarded() {
    let fetcher = ScriptedFetcher::with(vec![
        ok(page_of(1, 0, 1)),
        Reply::Ok {
            after: Duration::from_millis(300),
            body: page_of(60, 100, 20),
        },
        Reply::Ok {
            after: Duration::from_millis(50),
            body: page_of(2, 500, 2),
        },
    ]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.set_filter("type", Some("Hospital")).unwrap();
    controller.set_filter("type", Some("CLSC")).unwrap();
    let state = controller.settle().await.unwrap();
    assert_eq!(state.total_count, 2);
    assert_eq!(state.items[0]["fid"], json!(500));

    // let A land after B
    tokio::time::sleep(Duration::from_millis(400)).await;
    let state = controller.settle().await.unwrap();
    assert_eq!(state.total_count, 2);
    assert_eq!(state.items[0]["fid"], json!(500));
    assert_eq!(state.filters.get("type").map(String::as_str), Some("CLSC"));
}

#[tokio::test(start_paused = true)]
async fn failed_fetch_keeps_previous_items() {
    let fetcher = ScriptedFetcher::with(vec![
        ok(page_of(40, 0, 20)),
        Reply::Fail {
            after: Duration::from_millis(10),
            status: 500,
        },
        ok(page_of(40, 20, 20)),
    ]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.next_page().unwrap();
    let state = controller.settle().await.unwrap();
    assert!(!state.loading);
    assert_eq!(state.error.as_deref(), Some("Failed to fetch facilities"));
    assert_eq!(state.items.len(), 20);
    assert_eq!(state.items[0]["fid"], json!(0));

    controller.refresh().unwrap();
    let state = controller.settle().await.unwrap();
    assert_eq!(state.error, None);
    assert_eq!(state.items[0]["fid"], json!(20));
}

#[tokio::test(start_paused = true)]
async fn zero_results_render_empty_state() {
    let fetcher = ScriptedFetcher::with(vec![ok(json!({ "count": 0, "results": [] }))]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    let state = controller.settle().await.unwrap();

    assert!(state.items.is_empty());
    assert_eq!(state.total_pages, 1);
    assert!(state.is_empty_result());
    assert!(!state.pagination().is_visible());

    let text = crate::output::render_list_text(controller.descriptor(), &state);
    assert!(text.contains("No facilities found"));
    assert!(!text.contains("next"));
}

#[tokio::test(start_paused = true)]
async fn pending_search_dies_with_the_controller() {
    let fetcher = ScriptedFetcher::with(vec![]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.set_search("abc").unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    controller.shutdown().await;
    tokio::time::sleep(Duration::from_secs(2)).await;

    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn same_filter_value_does_not_refetch() {
    let fetcher = ScriptedFetcher::with(vec![]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.set_filter("type", Some("Pharmacy")).unwrap();
    controller.set_filter("type", Some("Pharmacy")).unwrap();
    controller.set_filter("type", Some("all")).unwrap();
    controller.clear_filter("type").unwrap();
    let state = controller.settle().await.unwrap();

    assert_eq!(fetcher.calls().len(), 3);
    assert!(state.filters.is_empty());
}

#[tokio::test(start_paused = true)]
async fn unknown_filters_are_rejected_up_front() {
    let fetcher = ScriptedFetcher::with(vec![]);
    let controller = spawn(&fetcher, ControllerOptions::default());

    let err = controller.set_filter("role", Some("nurse")).unwrap_err();
    assert!(matches!(err, ControllerError::UnknownFilter { .. }));
    let err = controller.set_filter("type", Some("Castle")).unwrap_err();
    assert!(matches!(err, ControllerError::InvalidFilterValue { .. }));

    controller.settle().await.unwrap();
    assert_eq!(fetcher.calls().len(), 1);
}

#[tokio::test(start_paused = true)]
async fn filter_value_is_sent_as_declared() {
    let fetcher = ScriptedFetcher::with(vec![]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.set_filter("type", Some("clsc")).unwrap();
    let state = controller.settle().await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].filters.get("type").map(String::as_str), Some("CLSC"));
    assert_eq!(state.filters.get("type").map(String::as_str), Some("CLSC"));
}

#[tokio::test(start_paused = true)]
async fn initial_filters_are_sent_as_declared() {
    let fetcher = ScriptedFetcher::with(vec![]);
    let mut filters = std::collections::BTreeMap::new();
    filters.insert("type".to_string(), " special INSTALLMENT ".to_string());
    let controller = spawn(
        &fetcher,
        ControllerOptions {
            initial_filters: filters,
            ..ControllerOptions::default()
        },
    );
    controller.settle().await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(
        calls[0].filters.get("type").map(String::as_str),
        Some("Special installment")
    );
}

#[tokio::test(start_paused = true)]
async fn next_page_during_filter_reset_is_ignored() {
    let fetcher = ScriptedFetcher::with(vec![
        ok(page_of(100, 0, 20)),
        Reply::Ok {
            after: Duration::from_millis(200),
            body: page_of(3, 0, 3),
        },
    ]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    let state = controller.settle().await.unwrap();
    assert_eq!(state.total_pages, 5);

    controller.set_filter("type", Some("CLSC")).unwrap();
    controller.next_page().unwrap();
    let state = controller.settle().await.unwrap();

    let calls = fetcher.calls();
    assert_eq!(calls.len(), 2);
    assert_eq!(calls[1].page, 1);
    assert_eq!(state.current_page, 1);
    assert_eq!(state.total_pages, 1);
    assert_eq!(state.total_count, 3);
}

#[tokio::test(start_paused = true)]
async fn next_page_during_search_reset_is_ignored() {
    let fetcher = ScriptedFetcher::with(vec![
        ok(page_of(100, 0, 20)),
        Reply::Ok {
            after: Duration::from_millis(200),
            body: page_of(60, 0, 20),
        },
        ok(page_of(60, 20, 20)),
    ]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.set_search("mont").unwrap();
    tokio::time::sleep(Duration::from_millis(550)).await;
    controller.next_page().unwrap();
    controller.settle().await.unwrap();
    assert_eq!(fetcher.calls().len(), 2);

    // once the reset lands the new page count applies
    controller.next_page().unwrap();
    let state = controller.settle().await.unwrap();
    let calls = fetcher.calls();
    assert_eq!(calls.len(), 3);
    assert_eq!(calls[2].page, 2);
    assert_eq!(calls[2].search, "mont");
    assert_eq!(state.total_pages, 3);
}

#[tokio::test(start_paused = true)]
async fn search_padding_is_kept_but_not_sent() {
    let fetcher = ScriptedFetcher::with(vec![]);
    let controller = spawn(&fetcher, ControllerOptions::default());
    controller.settle().await.unwrap();

    controller.set_search("mont ").unwrap();
    let state = controller.settle().await.unwrap();
    assert_eq!(state.debounced_search_term, "mont ");
    let calls = fetcher.calls();
    assert_eq!(
        calls[1].to_query_string(controller.descriptor()),
        "page=1&search=mont"
    );

    // trailing space removed: same request, so no fetch
    controller.set_search("mont").unwrap();
    controller.settle().await.unwrap();
    assert_eq!(fetcher.calls().len(), 2);
}
