//! Integration tests for the Context service.
//!
//! Uses wiremock to stand in for the localization backend.

// Allow unwrap and panic in tests - these are standard for test code
#![allow(clippy::unwrap_used, clippy::panic)]

use serde_json::json;
use std::io::{self, Write};
use std::sync::{Arc, Mutex};
use std::time::Duration;
use tokio::sync::broadcast::Receiver;
use tokio::sync::broadcast::error::TryRecvError;
use tracing::instrument::WithSubscriber;
use twitloc::twitloc_core::{ContextEvent, MetamodelState};
use twitloc::twitloc_sdk::Error as SdkError;
use twitloc::{Context, ContextConfig};
use wiremock::matchers::{body_json, method, path};
use wiremock::{Mock, MockServer, ResponseTemplate};

// =============================================================================
// HELPER FUNCTIONS
// =============================================================================

/// Context against the mock server. The poll interval only matters for
/// tests that call `start`.
fn context(server: &MockServer, interval: Duration) -> Context {
    Context::new(ContextConfig::new(server.uri()).with_poll_interval(interval)).unwrap()
}

async fn mount_metamodels(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/metamodels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "foo": {"status": "online"},
            "bar": {"status": "offline"}
        })))
        .mount(server)
        .await;
}

async fn mount_localizations(server: &MockServer) {
    Mock::given(method("GET"))
        .and(path("/localizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "complete": [{"screenName": "heidi", "metamodelName": "foo", "isSwiss": "true", "confidence": 0.9, "index": 0}],
            "pending": [{"screenName": "peter", "metamodelName": "foo"}],
            "failed": []
        })))
        .mount(server)
        .await;
}

/// Receive until `expected` arrives, failing after two seconds.
async fn wait_for(rx: &mut Receiver<ContextEvent>, expected: ContextEvent) {
    tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            match rx.recv().await {
                Ok(event) if event == expected => return,
                Ok(_) => {}
                Err(err) => panic!("event channel failed: {:?}", err),
            }
        }
    })
    .await
    .unwrap_or_else(|_| panic!("timed out waiting for {}", expected));
}

async fn request_count(server: &MockServer, route: &str) -> usize {
    server
        .received_requests()
        .await
        .unwrap()
        .iter()
        .filter(|req| req.url.path() == route)
        .count()
}

/// In-memory sink for log output.
#[derive(Clone, Default)]
struct LogBuffer(Arc<Mutex<Vec<u8>>>);

impl Write for LogBuffer {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        self.0.lock().unwrap().extend_from_slice(buf);
        Ok(buf.len())
    }

    fn flush(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// Subscriber writing plain-text logs into `logs`.
fn capture(logs: LogBuffer) -> impl tracing::Subscriber + Send + Sync + 'static {
    tracing_subscriber::fmt()
        .with_writer(move || logs.clone())
        .with_ansi(false)
        .with_max_level(tracing::Level::DEBUG)
        .finish()
}

impl LogBuffer {
    fn lines_containing(&self, needle: &str) -> Vec<String> {
        let text = String::from_utf8(self.0.lock().unwrap().clone()).unwrap();
        text.lines()
            .filter(|line| line.contains(needle))
            .map(str::to_owned)
            .collect()
    }
}

// =============================================================================
// POLLING
// =============================================================================

#[tokio::test]
async fn test_start_fetches_metamodels_immediately() {
    let server = MockServer::start().await;
    mount_metamodels(&server).await;
    mount_localizations(&server).await;

    let ctx = context(&server, Duration::from_secs(60));
    let mut rx = ctx.subscribe();
    let poller = ctx.start();

    wait_for(&mut rx, ContextEvent::MetamodelsUpdated).await;

    assert_eq!(ctx.all_metamodels(), vec!["foo", "bar"]);
    assert_eq!(ctx.available_metamodels(), vec!["foo"]);
    assert_eq!(
        ctx.list_metamodels(),
        vec![MetamodelState::new("online"), MetamodelState::new("offline")]
    );
    // Localizations wait for the first tick.
    assert_eq!(request_count(&server, "/localizations").await, 0);
    assert!(ctx.localizations().is_empty());

    poller.stop().await;
}

#[tokio::test]
async fn test_ticks_poll_both_resources() {
    let server = MockServer::start().await;
    mount_metamodels(&server).await;
    mount_localizations(&server).await;

    let ctx = context(&server, Duration::from_millis(50));
    let mut rx = ctx.subscribe();
    let poller = ctx.start();

    wait_for(&mut rx, ContextEvent::LocalizationsUpdated).await;

    let buckets = ctx.localizations();
    assert_eq!(buckets.complete[0].screen_name, "heidi");
    assert_eq!(buckets.pending[0].screen_name, "peter");
    assert!(buckets.failed.is_empty());

    // Metamodels are refreshed on every tick as well.
    wait_for(&mut rx, ContextEvent::MetamodelsUpdated).await;
    assert!(request_count(&server, "/metamodels").await >= 2);

    poller.stop().await;
}

#[tokio::test]
async fn test_every_subscriber_sees_events() {
    let server = MockServer::start().await;
    mount_metamodels(&server).await;

    let ctx = context(&server, Duration::from_secs(60));
    let mut first = ctx.subscribe();
    let mut second = ctx.clone().subscribe();

    ctx.refresh_metamodel_status().await.unwrap();

    assert_eq!(first.try_recv().unwrap(), ContextEvent::MetamodelsUpdated);
    assert_eq!(second.try_recv().unwrap(), ContextEvent::MetamodelsUpdated);
}

#[tokio::test]
async fn test_failed_poll_keeps_last_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metamodels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "foo": {"status": "online"},
            "bar": {"status": "offline"}
        })))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/metamodels"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    ctx.refresh_metamodel_status().await.unwrap();
    let before = ctx.snapshot();

    let mut rx = ctx.subscribe();
    let result = ctx.refresh_metamodel_status().await;

    assert!(matches!(result, Err(SdkError::Status { status: 500, .. })));
    assert_eq!(ctx.snapshot(), before);
    assert_eq!(ctx.all_metamodels(), vec!["foo", "bar"]);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_malformed_localizations_keep_last_state() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/localizations"))
        .respond_with(ResponseTemplate::new(200).set_body_string("not json"))
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    let mut rx = ctx.subscribe();

    assert!(matches!(
        ctx.refresh_localizations().await,
        Err(SdkError::Json(_))
    ));
    assert!(ctx.localizations().is_empty());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_off_shape_records_do_not_drop_the_poll() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/metamodels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "foo": {"status": "online"},
            "bar": {"status": null}
        })))
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/localizations"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "complete": [{"screenName": "heidi", "metamodelName": "foo", "isSwiss": "True"}],
            "pending": [{"screenName": "peter", "metamodelName": "foo"}],
            "failed": []
        })))
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    ctx.refresh_metamodel_status().await.unwrap();
    ctx.refresh_localizations().await.unwrap();

    assert_eq!(ctx.all_metamodels(), vec!["foo", "bar"]);
    assert_eq!(ctx.available_metamodels(), vec!["foo"]);
    let buckets = ctx.localizations();
    assert_eq!(buckets.complete[0].is_swiss, None);
    assert_eq!(buckets.pending[0].screen_name, "peter");
}

#[tokio::test]
async fn test_slow_response_neither_delays_ticks_nor_loses_to_older_state() {
    let server = MockServer::start().await;
    // First request: answered last.
    Mock::given(method("GET"))
        .and(path("/metamodels"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"slow": {"status": "online"}}))
                .set_delay(Duration::from_millis(400)),
        )
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    // The next two ticks: answered at once.
    Mock::given(method("GET"))
        .and(path("/metamodels"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"fast": {"status": "online"}})))
        .up_to_n_times(2)
        .with_priority(2)
        .mount(&server)
        .await;
    // Every later tick fails and keeps the last state.
    Mock::given(method("GET"))
        .and(path("/metamodels"))
        .respond_with(ResponseTemplate::new(500))
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_millis(50));
    let poller = ctx.start();

    tokio::time::sleep(Duration::from_millis(250)).await;
    // The first request is still pending, yet ticks kept firing.
    assert!(request_count(&server, "/metamodels").await >= 3);
    assert_eq!(ctx.all_metamodels(), vec!["fast"]);

    tokio::time::sleep(Duration::from_millis(400)).await;
    // The late response overwrote the newer one.
    assert_eq!(ctx.all_metamodels(), vec!["slow"]);

    poller.stop().await;
}

#[tokio::test]
async fn test_stop_cancels_polling() {
    let server = MockServer::start().await;
    mount_metamodels(&server).await;
    mount_localizations(&server).await;

    let ctx = context(&server, Duration::from_millis(20));
    let mut rx = ctx.subscribe();
    let poller = ctx.start();
    wait_for(&mut rx, ContextEvent::LocalizationsUpdated).await;

    poller.stop().await;
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = server.received_requests().await.unwrap().len();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), settled);
}

#[tokio::test]
async fn test_dropping_poller_cancels_polling() {
    let server = MockServer::start().await;
    mount_metamodels(&server).await;
    mount_localizations(&server).await;

    let ctx = context(&server, Duration::from_millis(20));
    let mut rx = ctx.subscribe();
    let poller = ctx.start();
    wait_for(&mut rx, ContextEvent::LocalizationsUpdated).await;

    drop(poller);
    tokio::time::sleep(Duration::from_millis(50)).await;
    let settled = server.received_requests().await.unwrap().len();

    tokio::time::sleep(Duration::from_millis(200)).await;
    assert_eq!(server.received_requests().await.unwrap().len(), settled);
}

// =============================================================================
// STATISTICS
// =============================================================================

#[tokio::test]
async fn test_statistics_lazy_load_and_cache() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/statistics"))
        .respond_with(
            ResponseTemplate::new(200)
                .set_body_json(json!({"usersCount": 1500, "tweetsCount": 2500000}))
                .set_delay(Duration::from_millis(200)),
        )
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    let mut rx = ctx.subscribe();

    // Repeated calls before the response arrives all return None.
    for _ in 0..5 {
        assert!(ctx.statistics().is_none());
    }

    wait_for(&mut rx, ContextEvent::StatisticsLoaded).await;

    let stats = ctx.statistics().unwrap();
    assert_eq!(stats.users_count, Some(1500));
    assert_eq!(stats.tweets_count, Some(2_500_000));

    for _ in 0..20 {
        assert_eq!(ctx.statistics().as_ref(), Some(&stats));
    }
    tokio::time::sleep(Duration::from_millis(100)).await;

    server.verify().await;
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_statistics_failure_leaves_cache_unset_and_retries() {
    let server = MockServer::start().await;
    Mock::given(method("GET"))
        .and(path("/statistics"))
        .respond_with(ResponseTemplate::new(503))
        .up_to_n_times(1)
        .with_priority(1)
        .mount(&server)
        .await;
    Mock::given(method("GET"))
        .and(path("/statistics"))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({"usersCount": 7})))
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    let mut rx = ctx.subscribe();

    assert!(ctx.statistics().is_none());

    let stats = tokio::time::timeout(Duration::from_secs(2), async {
        loop {
            if let Some(stats) = ctx.statistics() {
                return stats;
            }
            tokio::time::sleep(Duration::from_millis(20)).await;
        }
    })
    .await
    .unwrap();

    assert_eq!(stats.users_count, Some(7));
    assert_eq!(request_count(&server, "/statistics").await, 2);
    wait_for(&mut rx, ContextEvent::StatisticsLoaded).await;
}

// =============================================================================
// WRITE OPERATIONS
// =============================================================================

#[tokio::test]
async fn test_build_metamodel_failure_logs_once() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/buildmetamodel"))
        .respond_with(ResponseTemplate::new(404).set_body_string("No metamodel 'x'"))
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    let mut rx = ctx.subscribe();
    let logs = LogBuffer::default();

    let result = ctx
        .build_metamodel("x")
        .with_subscriber(capture(logs.clone()))
        .await;

    assert!(matches!(result, Err(SdkError::Status { status: 404, .. })));
    let errors = logs.lines_containing("ERROR");
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].contains("Unable to build metamodel"));
    assert!(errors[0].contains("metamodel=x"));
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_build_metamodel_success_changes_nothing() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/buildmetamodel"))
        .and(body_json(json!({"metamodel": "x"})))
        .respond_with(ResponseTemplate::new(204))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    let mut rx = ctx.subscribe();
    let before = ctx.snapshot();
    let logs = LogBuffer::default();

    ctx.build_metamodel("x")
        .with_subscriber(capture(logs.clone()))
        .await
        .unwrap();

    assert_eq!(ctx.snapshot(), before);
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
    assert!(logs.lines_containing("ERROR").is_empty());
}

#[tokio::test]
async fn test_localize_user_posts_body() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/localize"))
        .and(body_json(json!({"screenName": "heidi", "metamodel": "foo"})))
        .respond_with(ResponseTemplate::new(200).set_body_json(json!({
            "complete": [], "pending": [{"screenName": "heidi", "metamodelName": "foo"}], "failed": []
        })))
        .expect(1)
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    let mut rx = ctx.subscribe();

    ctx.localize_user("heidi", "foo").await.unwrap();

    // The response is not folded into local state; the next poll does that.
    assert!(ctx.localizations().is_empty());
    assert!(matches!(rx.try_recv(), Err(TryRecvError::Empty)));
}

#[tokio::test]
async fn test_localize_user_failure_logs_screen_name() {
    let server = MockServer::start().await;
    Mock::given(method("POST"))
        .and(path("/localize"))
        .respond_with(ResponseTemplate::new(404).set_body_string("Metamodel 'foo' is offline"))
        .mount(&server)
        .await;

    let ctx = context(&server, Duration::from_secs(60));
    let logs = LogBuffer::default();

    let result = ctx
        .localize_user("heidi", "foo")
        .with_subscriber(capture(logs.clone()))
        .await;

    assert!(result.is_err());
    let errors = logs.lines_containing("ERROR");
    assert_eq!(errors.len(), 1, "{:?}", errors);
    assert!(errors[0].contains("screen_name=heidi"));
}
