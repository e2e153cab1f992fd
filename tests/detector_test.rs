mod common;

use std::sync::Arc;

use common::{Harness, RecordingBridge};
use sms_relay::SourceId;

#[tokio::test]
async fn test_empty_source_then_one_message() {
    let harness = Harness::new();
    let bridge = RecordingBridge::new();
    harness.attach(bridge.clone()).await;

    assert_eq!(harness.detector.initialize_cursor().await, SourceId::NONE);

    harness.source.insert_with_id(5, Some("+1555"), Some("hi"), 1000).await;

    let report = harness.detector.on_change_notification().await;
    assert_eq!(report.delivered, 1);
    assert_eq!(report.cursor, SourceId(5));
    assert_eq!(harness.detector.cursor().await, SourceId(5));

    let calls = bridge.sms_calls().await;
    assert_eq!(calls.len(), 1);
    assert_eq!(calls[0]["sender"], "+1555");
    assert_eq!(calls[0]["message"], "hi");
    assert_eq!(calls[0]["timestamp"], "1000");

    let again = harness.detector.on_change_notification().await;
    assert_eq!(again.delivered, 0);
    assert_eq!(again.cursor, SourceId(5));
    assert_eq!(bridge.sms_calls().await.len(), 1);
}

#[tokio::test]
async fn test_existing_records_are_not_reprocessed() {
    let harness = Harness::new();
    harness.source.insert(Some("a"), Some("old 1"), 1).await;
    harness.source.insert(Some("b"), Some("old 2"), 2).await;

    assert_eq!(harness.detector.initialize_cursor().await, SourceId(2));

    let report = harness.detector.on_change_notification().await;
    assert_eq!(report.delivered, 0);

    let log = harness.relay.message_log().read_all().await.unwrap();
    assert!(log.is_empty());
}

#[tokio::test]
async fn test_cursor_tracks_max_delivered_id() {
    let harness = Harness::new();
    harness.detector.initialize_cursor().await;

    harness.source.insert_with_id(3, Some("a"), Some("one"), 10).await;
    harness.source.insert_with_id(7, Some("b"), Some("two"), 20).await;
    harness.source.insert_with_id(12, Some("c"), Some("three"), 30).await;

    let report = harness.detector.on_manual_check_requested().await;
    assert_eq!(report.delivered, 3);
    assert_eq!(report.cursor, SourceId(12));

    let log = harness.relay.message_log().read_all().await.unwrap();
    let mut ids: Vec<_> = log.iter().filter_map(|r| r.source_id).collect();
    ids.sort();
    assert_eq!(ids, vec![SourceId(3), SourceId(7), SourceId(12)]);
}

#[tokio::test]
async fn test_initialize_cursor_runs_once() {
    let harness = Harness::new();
    assert_eq!(harness.detector.initialize_cursor().await, SourceId::NONE);

    harness.source.insert_with_id(9, Some("a"), Some("x"), 1).await;
    assert_eq!(harness.detector.initialize_cursor().await, SourceId::NONE);

    let report = harness.detector.on_change_notification().await;
    assert_eq!(report.delivered, 1);
}

#[tokio::test]
async fn test_bulk_rescan_redelivers_without_moving_cursor() {
    let harness = Harness::new();
    let bridge = RecordingBridge::new();
    harness.attach(bridge.clone()).await;
    harness.detector.initialize_cursor().await;

    for i in 0..12 {
        harness.source.insert(Some("x"), Some(format!("m{}", i).as_str()), i).await;
    }
    harness.detector.on_change_notification().await;
    let cursor = harness.detector.cursor().await;
    assert_eq!(cursor, SourceId(12));
    assert_eq!(bridge.sms_calls().await.len(), 12);

    let report = harness.detector.on_bulk_rescan_requested().await;
    assert_eq!(report.delivered, 10);
    assert_eq!(harness.detector.cursor().await, cursor);
    assert_eq!(bridge.sms_calls().await.len(), 22);
}

#[tokio::test]
async fn test_source_failure_is_swallowed_and_retried() {
    let harness = Harness::new();
    harness.detector.initialize_cursor().await;
    harness.source.insert_with_id(1, Some("a"), Some("x"), 1).await;

    harness.source.set_failing(true);
    let failed = harness.detector.on_change_notification().await;
    assert!(failed.source_failed);
    assert_eq!(failed.delivered, 0);
    assert_eq!(failed.cursor, SourceId::NONE);

    harness.source.set_failing(false);
    let retried = harness.detector.on_change_notification().await;
    assert!(!retried.source_failed);
    assert_eq!(retried.delivered, 1);
    assert_eq!(retried.cursor, SourceId(1));
}

#[tokio::test]
async fn test_concurrent_notifications_deliver_once() {
    let harness = Harness::new();
    let bridge = RecordingBridge::new();
    harness.attach(bridge.clone()).await;
    harness.detector.initialize_cursor().await;

    for i in 0..8 {
        harness.source.insert(Some("x"), Some("body"), i).await;
    }

    let mut handles = Vec::new();
    for _ in 0..4 {
        let detector = Arc::clone(&harness.detector);
        handles.push(tokio::spawn(async move { detector.on_change_notification().await }));
    }

    let mut total = 0;
    for handle in handles {
        total += handle.await.unwrap().delivered;
    }

    assert_eq!(total, 8);
    assert_eq!(bridge.sms_calls().await.len(), 8);
    assert_eq!(harness.detector.cursor().await, SourceId(8));
}

#[tokio::test]
async fn test_idle_probe_does_not_deliver() {
    let harness = Harness::new();
    let bridge = RecordingBridge::new();
    harness.attach(bridge.clone()).await;
    harness.source.insert(Some("a"), Some("already seen"), 1).await;
    harness.detector.initialize_cursor().await;

    let report = harness.detector.on_change_notification().await;
    assert_eq!(report.delivered, 0);
    assert!(bridge.sms_calls().await.is_empty());

    let debug = harness.relay.debug_log_store().read_all().await.unwrap();
    assert!(debug.iter().any(|line| line.text.contains("Recent SMS - ID: 1")));
}
