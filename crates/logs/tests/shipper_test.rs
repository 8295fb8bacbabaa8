use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use chrono::{DateTime, Duration as ChronoDuration, SubsecRound, Utc};
use prometheus::{Encoder, Registry, TextEncoder};
use scom_bootable::Bootable;
use scom_gateway::{
    Alert, AlertPriority, AlertSeverity, Event, GatewayErrorKind, InstanceId, Reconnecting,
};
use scom_gateway_mock::{MockGateway, Operation};
use scom_logs::{
    BookmarkStore, Error, LogShipper, LogSink, PushRequest, Result, ShipperConfig,
};
use tempfile::TempDir;
use tokio::sync::Mutex;
use tracing_test::traced_test;
use uuid::Uuid;

#[derive(Clone, Default)]
struct RecordingSink {
    pushed: Arc<Mutex<Vec<PushRequest>>>,
    reject: Arc<AtomicBool>,
}

#[async_trait]
impl LogSink for RecordingSink {
    async fn push(&self, request: &PushRequest) -> Result<()> {
        self.pushed.lock().await.push(request.clone());
        if self.reject.load(Ordering::SeqCst) {
            return Err(Error::Rejected {
                status: 500,
                body: "ingester unavailable".to_string(),
            });
        }
        Ok(())
    }
}

struct Harness {
    shipper: LogShipper<MockGateway, RecordingSink>,
    gateway: Arc<Reconnecting<MockGateway>>,
    sink: RecordingSink,
    bookmark: BookmarkStore,
    registry: Registry,
    _dir: TempDir,
}

fn harness(gateway: MockGateway, alerts: bool, events: bool) -> Harness {
    let dir = tempfile::tempdir().unwrap();
    let bookmark = BookmarkStore::new(dir.path().join("bookmark.txt"));
    let gateway = Arc::new(Reconnecting::new(gateway));
    let sink = RecordingSink::default();
    let registry = Registry::new();
    let shipper = LogShipper::new(
        Arc::clone(&gateway),
        sink.clone(),
        bookmark.clone(),
        ShipperConfig {
            interval: Duration::from_secs(60),
            alerts,
            events,
        },
        &registry,
    )
    .unwrap();

    Harness {
        shipper,
        gateway,
        sink,
        bookmark,
        registry,
        _dir: dir,
    }
}

fn metric_value(registry: &Registry, name: &str) -> Option<f64> {
    let mut buffer = Vec::new();
    TextEncoder::new()
        .encode(&registry.gather(), &mut buffer)
        .unwrap();
    String::from_utf8(buffer).unwrap().lines().find_map(|line| {
        let (metric, value) = line.split_once(' ')?;
        (metric == name).then(|| value.parse().ok()).flatten()
    })
}

fn alert(object: &str, raised: DateTime<Utc>) -> Alert {
    Alert {
        id: Uuid::new_v4(),
        name: format!("{object} disk almost full"),
        description: Some("Free space is below 10%".to_string()),
        severity: AlertSeverity::Warning,
        priority: AlertPriority::High,
        resolution_state: 0,
        category: "Custom".to_string(),
        is_monitor_alert: false,
        repeat_count: 1,
        owner: None,
        net_bios_computer_name: None,
        monitoring_object_id: InstanceId::new_v4(),
        monitoring_object_full_name: object.to_string(),
        monitoring_object_display_name: object.to_string(),
        monitoring_object_path: None,
        time_raised: raised,
        time_added: raised,
        last_modified: raised,
    }
}

fn event(object: &str, generated: DateTime<Utc>) -> Event {
    Event {
        id: Uuid::new_v4(),
        number: 1000,
        channel: "Application".to_string(),
        logging_computer: format!("{object}.contoso.com"),
        publisher_name: "Contoso".to_string(),
        level: "Error".to_string(),
        category: None,
        description: None,
        user_name: None,
        monitoring_object_id: InstanceId::new_v4(),
        monitoring_object_full_name: object.to_string(),
        monitoring_object_display_name: object.to_string(),
        time_generated: generated,
        time_added: generated,
    }
}

#[tokio::test]
async fn test_cycle_ships_alerts_and_events() {
    let t0 = (Utc::now() - ChronoDuration::minutes(10)).trunc_subsecs(0);
    let after = t0 + ChronoDuration::minutes(1);
    let gateway = MockGateway::new("MG01")
        .with_alert(alert("srv01", after))
        .with_alert(alert("srv02", after))
        .with_alert(alert("srv03", after))
        .with_alert(alert("srv04", t0 - ChronoDuration::minutes(1)))
        .with_event(event("srv01", after))
        .with_event(event("srv02", after));
    let h = harness(gateway, true, true);
    h.bookmark.save(t0).await.unwrap();

    let report = h.shipper.run_cycle().await;

    assert_eq!(report.since, Some(t0));
    assert_eq!(report.entries, 5);
    assert_eq!(report.streams, 5);
    assert!(report.pushed);
    assert_eq!(metric_value(&h.registry, "loki_logs_last_round_count"), Some(5.0));
    assert_eq!(metric_value(&h.registry, "loki_logs_total_count"), Some(5.0));

    let pushed = h.sink.pushed.lock().await;
    assert_eq!(pushed.len(), 1);
    assert_eq!(pushed[0].entry_count(), 5);
    assert_eq!(pushed[0].streams[0].stream["type"], "alert");
    assert_eq!(pushed[0].streams[4].stream["type"], "event");

    let bookmark = report.bookmark.unwrap();
    assert!(bookmark > t0);
    assert_eq!(h.bookmark.load(Duration::from_secs(60)).await, bookmark);
    assert_eq!(h.gateway.inner().alert_queries(), vec![t0]);
    assert_eq!(h.gateway.inner().event_queries(), vec![t0]);
}

#[tokio::test]
async fn test_counters_count_streams_not_records() {
    let t0 = (Utc::now() - ChronoDuration::minutes(10)).trunc_subsecs(0);
    let after = t0 + ChronoDuration::minutes(1);
    let gateway = MockGateway::new("MG01")
        .with_alert(alert("srv01", after))
        .with_alert(alert("srv01", after + ChronoDuration::seconds(1)))
        .with_alert(alert("srv01", after + ChronoDuration::seconds(2)))
        .with_event(event("srv02", after))
        .with_event(event("srv03", after));
    let h = harness(gateway, true, true);
    h.bookmark.save(t0).await.unwrap();

    let report = h.shipper.run_cycle().await;

    assert_eq!(report.streams, 3);
    assert_eq!(report.entries, 5);
    assert_eq!(metric_value(&h.registry, "loki_logs_last_round_count"), Some(3.0));
    assert_eq!(metric_value(&h.registry, "loki_logs_total_count"), Some(3.0));

    let pushed = h.sink.pushed.lock().await;
    assert_eq!(pushed[0].streams[0].values.len(), 3);
}

#[tokio::test]
#[traced_test]
async fn test_bookmark_advances_when_push_fails() {
    let t0 = (Utc::now() - ChronoDuration::minutes(5)).trunc_subsecs(0);
    let gateway = MockGateway::new("MG01").with_alert(alert("srv01", Utc::now()));
    let h = harness(gateway, true, true);
    h.bookmark.save(t0).await.unwrap();
    h.sink.reject.store(true, Ordering::SeqCst);

    let report = h.shipper.run_cycle().await;

    assert!(!report.pushed);
    assert_eq!(report.entries, 1);
    assert!(report.bookmark.unwrap() > t0);
    assert!(h.bookmark.load(Duration::from_secs(60)).await > t0);
    assert_eq!(metric_value(&h.registry, "loki_logs_total_count"), Some(1.0));
    assert!(logs_contain("ingester unavailable"));
}

#[tokio::test]
async fn test_counters_accumulate_over_cycles() {
    let gateway = MockGateway::new("MG01")
        .with_event(event("srv01", Utc::now() - ChronoDuration::seconds(30)));
    let h = harness(gateway, true, true);
    h.bookmark
        .save(Utc::now() - ChronoDuration::minutes(1))
        .await
        .unwrap();
    h.shipper.run_cycle().await;

    h.gateway
        .inner()
        .add_alert(alert("srv02", Utc::now() + ChronoDuration::seconds(2)));
    h.gateway
        .inner()
        .add_alert(alert("srv03", Utc::now() + ChronoDuration::seconds(2)));
    let second = h.shipper.run_cycle().await;

    assert_eq!(second.entries, 2);
    assert_eq!(metric_value(&h.registry, "loki_logs_last_round_count"), Some(2.0));
    assert_eq!(metric_value(&h.registry, "loki_logs_total_count"), Some(3.0));
    assert_eq!(h.sink.pushed.lock().await.len(), 2);
}

#[tokio::test]
async fn test_nothing_new_pushes_nothing() {
    let h = harness(MockGateway::new("MG01"), true, true);

    let report = h.shipper.run_cycle().await;

    assert_eq!(report.entries, 0);
    assert!(!report.pushed);
    assert!(report.bookmark.is_some());
    assert!(h.sink.pushed.lock().await.is_empty());
    assert_eq!(metric_value(&h.registry, "loki_logs_total_count"), Some(0.0));
}

#[tokio::test]
async fn test_disabled_feed_is_not_queried() {
    let now = Utc::now();
    let gateway = MockGateway::new("MG01")
        .with_alert(alert("srv01", now))
        .with_event(event("srv01", now));
    let h = harness(gateway, true, false);
    h.bookmark
        .save(now - ChronoDuration::minutes(1))
        .await
        .unwrap();

    let report = h.shipper.run_cycle().await;

    assert_eq!(report.entries, 1);
    assert_eq!(h.gateway.inner().calls(Operation::EventsSince), 0);
    assert_eq!(h.gateway.inner().calls(Operation::AlertsSince), 1);
}

#[tokio::test]
#[traced_test]
async fn test_fetch_failure_skips_push_but_advances_bookmark() {
    let now = Utc::now();
    let t0 = (now - ChronoDuration::minutes(1)).trunc_subsecs(0);
    let gateway = MockGateway::new("MG01")
        .with_alert(alert("srv01", now))
        .with_event(event("srv01", now));
    gateway.fail_next(Operation::EventsSince, GatewayErrorKind::Other);
    let h = harness(gateway, true, true);
    h.bookmark.save(t0).await.unwrap();

    let report = h.shipper.run_cycle().await;

    assert!(!report.pushed);
    assert!(h.sink.pushed.lock().await.is_empty());
    assert!(h.bookmark.load(Duration::from_secs(60)).await > t0);
    assert!(logs_contain("error while fetching alerts and events"));
}

#[tokio::test]
async fn test_fetch_reconnects_after_disconnect() {
    let gateway = MockGateway::new("MG01").with_alert(alert("srv01", Utc::now()));
    gateway.fail_next(Operation::AlertsSince, GatewayErrorKind::Disconnected);
    let h = harness(gateway, true, false);
    h.bookmark
        .save(Utc::now() - ChronoDuration::minutes(1))
        .await
        .unwrap();

    let report = h.shipper.run_cycle().await;

    assert!(report.pushed);
    assert_eq!(h.gateway.inner().calls(Operation::Reconnect), 1);
}

#[tokio::test]
async fn test_missing_bookmark_starts_one_interval_ago() {
    let h = harness(MockGateway::new("MG01"), true, true);

    let before = Utc::now();
    let report = h.shipper.run_cycle().await;

    let since = report.since.unwrap();
    assert!(before - since >= ChronoDuration::seconds(59));
    assert!(before - since <= ChronoDuration::seconds(61));
}

#[tokio::test]
async fn test_start_is_noop_when_both_feeds_disabled() {
    let h = harness(MockGateway::new("MG01"), false, false);

    h.shipper.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(50)).await;
    h.shipper.wait().await;

    assert_eq!(h.gateway.inner().calls(Operation::AlertsSince), 0);
    assert_eq!(h.gateway.inner().calls(Operation::EventsSince), 0);
    assert!(!h.bookmark.path().exists());
}

#[tokio::test]
async fn test_start_runs_first_cycle_immediately() {
    let h = harness(MockGateway::new("MG01"), true, true);

    h.shipper.start().await.unwrap();
    tokio::time::sleep(Duration::from_millis(100)).await;
    h.shipper.shutdown().await.unwrap();

    assert_eq!(h.gateway.inner().calls(Operation::AlertsSince), 1);
    assert!(h.bookmark.path().exists());
}
