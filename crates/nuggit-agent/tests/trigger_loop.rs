//! Trigger loop integration tests against a recording in-memory backend.
//!
//! All tests run on a paused clock, so debounce windows elapse instantly and
//! deterministically.

use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;
use serde_json::{json, Value};
use tokio::sync::mpsc;

use nuggit::{ExchangeRequest, TriggerRequest, TriggerResponse};
use nuggit_agent::config::{AgentConfig, ConfigOverrides};
use nuggit_agent::session::{run_agent, Page, RunSummary};
use nuggit_agent::types::{AgentError, AgentResult, HostMessage};
use nuggit_agent::Backend;

// ─────────────────────── helpers ───────────────────────

#[derive(Debug, Clone)]
enum Call {
    Status,
    Trigger(TriggerRequest),
    Exchange(ExchangeRequest),
}

struct FakeBackend {
    reachable: bool,
    response: Value,
    fail_exchange: bool,
    calls: Mutex<Vec<Call>>,
}

impl FakeBackend {
    fn with_response(response: Value) -> Arc<Self> {
        Arc::new(Self {
            reachable: true,
            response,
            fail_exchange: false,
            calls: Mutex::new(Vec::new()),
        })
    }

    fn calls(&self) -> Vec<Call> {
        self.calls.lock().unwrap().clone()
    }

    fn triggers(&self) -> Vec<TriggerRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Trigger(t) => Some(t),
                _ => None,
            })
            .collect()
    }

    fn exchanges(&self) -> Vec<ExchangeRequest> {
        self.calls()
            .into_iter()
            .filter_map(|c| match c {
                Call::Exchange(r) => Some(r),
                _ => None,
            })
            .collect()
    }

    fn record(&self, call: Call) {
        self.calls.lock().unwrap().push(call);
    }
}

#[async_trait]
impl Backend for FakeBackend {
    async fn status(&self) -> AgentResult<()> {
        self.record(Call::Status);
        if self.reachable {
            Ok(())
        } else {
            Err(AgentError::Status {
                status: 503,
                reason: None,
            })
        }
    }

    async fn trigger(&self, request: &TriggerRequest) -> AgentResult<TriggerResponse> {
        self.record(Call::Trigger(request.clone()));
        Ok(serde_json::from_value(self.response.clone())?)
    }

    async fn exchange(&self, report: &ExchangeRequest) -> AgentResult<()> {
        self.record(Call::Exchange(report.clone()));
        if self.fail_exchange {
            return Err(AgentError::Status {
                status: 500,
                reason: Some("storage offline".into()),
            });
        }
        Ok(())
    }
}

/// Plan reporting the text of every `.item` in the root input.
fn items_plan() -> Value {
    json!({
        "trigger": {"id": "t-1", "plan": "items-plan"},
        "plan": {
            "roots": [0],
            "exchanges": [2],
            "steps": [
                {"action": {"action": "querySelector", "selector": ".item", "all": true, "self": true}},
                {"action": {"action": "textContent"}, "input": 1},
                {"action": {"action": "exchange", "name": "items", "digest": "d1", "scalar": "string"}, "input": 2}
            ]
        }
    })
}

fn config() -> AgentConfig {
    let overrides = ConfigOverrides {
        debounce_ms: Some(500),
        ..Default::default()
    };
    AgentConfig::resolve_with(&overrides, |_| None).unwrap()
}

fn page(html: &str) -> Page {
    Page {
        url: "https://shop.example/list".into(),
        html: html.into(),
    }
}

fn added(html: &str) -> HostMessage {
    HostMessage::added(Some("#list"), &[html])
}

async fn sleep_ms(ms: u64) {
    tokio::time::sleep(Duration::from_millis(ms)).await;
}

/// Run the agent on `first` while `script` feeds host messages. The channel
/// closes when the script finishes.
async fn drive<F, Fut>(backend: Arc<FakeBackend>, first: Page, script: F) -> RunSummary
where
    F: FnOnce(mpsc::Sender<HostMessage>) -> Fut,
    Fut: std::future::Future<Output = ()>,
{
    let (tx, mut rx) = mpsc::channel(16);
    let cfg = config();
    let (summary, ()) = tokio::join!(run_agent(backend, &cfg, first, &mut rx), script(tx));
    summary
}

const EMPTY_LIST: &str = r#"<html><body><ul id="list"></ul></body></html>"#;

// ─────────────────────── tests ───────────────────────

#[tokio::test(start_paused = true)]
async fn test_empty_plan_response_stops_everything() {
    let backend = FakeBackend::with_response(json!({}));
    let summary = drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        tx.send(added(r#"<li class="item">a</li>"#)).await.unwrap();
        sleep_ms(2_000).await;
        tx.send(added(r#"<li class="item">b</li>"#)).await.unwrap();
        sleep_ms(2_000).await;
    })
    .await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 2, "calls: {calls:?}");
    assert!(matches!(calls[0], Call::Status));
    assert!(matches!(calls[1], Call::Trigger(_)));
    assert_eq!(summary.passes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_backend_is_never_asked_for_a_plan() {
    let backend = Arc::new(FakeBackend {
        reachable: false,
        response: items_plan(),
        fail_exchange: false,
        calls: Mutex::new(Vec::new()),
    });
    drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        tx.send(added(r#"<li class="item">a</li>"#)).await.unwrap();
        sleep_ms(1_000).await;
    })
    .await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 1);
    assert!(matches!(calls[0], Call::Status));
}

#[tokio::test(start_paused = true)]
async fn test_unreachable_page_ignores_explicit_trigger() {
    let backend = Arc::new(FakeBackend {
        reachable: false,
        response: items_plan(),
        fail_exchange: false,
        calls: Mutex::new(Vec::new()),
    });
    let html = r#"<ul id="list"><li class="item">x</li></ul>"#;
    drive(backend.clone(), page(html), |tx| async move {
        tx.send(HostMessage::Trigger).await.unwrap();
        sleep_ms(1_000).await;
        tx.send(added(r#"<li class="item">a</li>"#)).await.unwrap();
        sleep_ms(1_000).await;
    })
    .await;

    let calls = backend.calls();
    assert_eq!(calls.len(), 1, "calls: {calls:?}");
    assert!(matches!(calls[0], Call::Status));
}

#[tokio::test(start_paused = true)]
async fn test_empty_plan_page_ignores_explicit_trigger() {
    let backend = FakeBackend::with_response(json!({}));
    let summary = drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        sleep_ms(100).await;
        tx.send(HostMessage::Trigger).await.unwrap();
        sleep_ms(1_000).await;
    })
    .await;

    assert_eq!(backend.triggers().len(), 1);
    assert_eq!(backend.calls().len(), 2);
    assert_eq!(summary.passes, 0);
}

#[tokio::test(start_paused = true)]
async fn test_batches_in_one_window_coalesce_to_the_last() {
    let backend = FakeBackend::with_response(items_plan());
    let summary = drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        tx.send(added(r#"<li class="item">a</li>"#)).await.unwrap();
        sleep_ms(100).await;
        tx.send(added(r#"<li class="item">b</li>"#)).await.unwrap();
        sleep_ms(2_000).await;
    })
    .await;

    // Initial pass over the empty list reports nothing.
    let exchanges = backend.exchanges();
    assert_eq!(exchanges.len(), 1, "exchanges: {exchanges:?}");
    let report = &exchanges[0];
    assert_eq!(report.trigger.plan, "items-plan");
    assert_eq!(report.trigger.url, "https://shop.example/list");
    assert!(report.trigger.implicit);
    assert_eq!(report.results.len(), 1);
    assert_eq!(report.results[0].pipe, "items@d1");
    assert_eq!(report.results[0].result, json!(["b"]));
    assert_eq!(summary.passes, 2);
}

#[tokio::test(start_paused = true)]
async fn test_batches_in_separate_windows_each_run() {
    let backend = FakeBackend::with_response(items_plan());
    drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        tx.send(added(r#"<li class="item">a</li>"#)).await.unwrap();
        sleep_ms(1_000).await;
        tx.send(added(r#"<li class="item">b</li><li class="item">c</li>"#))
            .await
            .unwrap();
        sleep_ms(1_000).await;
    })
    .await;

    let results: Vec<_> = backend
        .exchanges()
        .iter()
        .map(|r| r.results[0].result.clone())
        .collect();
    assert_eq!(results, vec![json!(["a"]), json!(["b", "c"])]);
}

#[tokio::test(start_paused = true)]
async fn test_initial_pass_runs_against_whole_document() {
    let backend = FakeBackend::with_response(items_plan());
    let html = r#"<ul id="list"><li class="item">x</li><li class="item">y</li></ul>"#;
    drive(backend.clone(), page(html), |_tx| async move {}).await;

    let exchanges = backend.exchanges();
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].results[0].result, json!(["x", "y"]));
}

#[tokio::test(start_paused = true)]
async fn test_explicit_trigger_reuses_cached_plan() {
    let backend = FakeBackend::with_response(items_plan());
    let html = r#"<ul id="list"><li class="item">x</li></ul>"#;
    drive(backend.clone(), page(html), |tx| async move {
        sleep_ms(100).await;
        tx.send(HostMessage::Trigger).await.unwrap();
        sleep_ms(100).await;
    })
    .await;

    assert_eq!(backend.triggers().len(), 1);
    let exchanges = backend.exchanges();
    assert_eq!(exchanges.len(), 2);
    assert!(exchanges[0].trigger.implicit);
    assert!(!exchanges[1].trigger.implicit);
}

#[tokio::test(start_paused = true)]
async fn test_mutation_pass_after_explicit_trigger_is_implicit() {
    let backend = FakeBackend::with_response(items_plan());
    let html = r#"<ul id="list"><li class="item">x</li></ul>"#;
    drive(backend.clone(), page(html), |tx| async move {
        sleep_ms(100).await;
        tx.send(HostMessage::Trigger).await.unwrap();
        sleep_ms(100).await;
        tx.send(added(r#"<li class="item">m</li>"#)).await.unwrap();
        sleep_ms(2_000).await;
    })
    .await;

    let flags: Vec<_> = backend
        .exchanges()
        .iter()
        .map(|r| (r.trigger.implicit, r.results[0].result.clone()))
        .collect();
    assert_eq!(
        flags,
        vec![
            (true, json!(["x"])),
            (false, json!(["x"])),
            (true, json!(["m"])),
        ]
    );
}

#[tokio::test(start_paused = true)]
async fn test_exchange_failure_does_not_stop_the_page() {
    let backend = Arc::new(FakeBackend {
        reachable: true,
        response: items_plan(),
        fail_exchange: true,
        calls: Mutex::new(Vec::new()),
    });
    let summary = drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        tx.send(added(r#"<li class="item">a</li>"#)).await.unwrap();
        sleep_ms(1_000).await;
        tx.send(added(r#"<li class="item">b</li>"#)).await.unwrap();
        sleep_ms(1_000).await;
    })
    .await;

    assert_eq!(backend.exchanges().len(), 2);
    assert_eq!(summary.passes, 3);
}

#[tokio::test(start_paused = true)]
async fn test_navigation_drops_pending_batch_and_renegotiates() {
    let backend = FakeBackend::with_response(items_plan());
    let summary = drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        tx.send(added(r#"<li class="item">lost</li>"#)).await.unwrap();
        sleep_ms(100).await;
        tx.send(HostMessage::Navigate {
            url: "https://shop.example/next".into(),
            html: Some(r#"<ul id="list"><li class="item">n</li></ul>"#.into()),
        })
        .await
        .unwrap();
        sleep_ms(1_000).await;
    })
    .await;

    assert_eq!(summary.pages, 2);
    let triggers = backend.triggers();
    assert_eq!(triggers.len(), 2);
    assert_eq!(triggers[1].trigger.url, "https://shop.example/next");

    let exchanges = backend.exchanges();
    assert_eq!(exchanges.len(), 1, "exchanges: {exchanges:?}");
    assert_eq!(exchanges[0].trigger.url, "https://shop.example/next");
    assert_eq!(exchanges[0].results[0].result, json!(["n"]));
}

#[tokio::test(start_paused = true)]
async fn test_closed_channel_flushes_pending_batch() {
    let backend = FakeBackend::with_response(items_plan());
    drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        tx.send(added(r#"<li class="item">last</li>"#)).await.unwrap();
    })
    .await;

    let exchanges = backend.exchanges();
    assert_eq!(exchanges.len(), 1);
    assert_eq!(exchanges[0].results[0].result, json!(["last"]));
}

#[tokio::test(start_paused = true)]
async fn test_mutation_under_missing_target_is_ignored() {
    let backend = FakeBackend::with_response(items_plan());
    drive(backend.clone(), page(EMPTY_LIST), |tx| async move {
        tx.send(HostMessage::added(Some("#nowhere"), &[r#"<li class="item">a</li>"#]))
            .await
            .unwrap();
        sleep_ms(1_000).await;
    })
    .await;

    assert!(backend.exchanges().is_empty());
}
