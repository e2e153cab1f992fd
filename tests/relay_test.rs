mod common;

use std::sync::Arc;

use common::{Harness, RecordingBridge, ReplyBridge};
use sms_relay::{
    Broadcast, BridgeError, IncomingSms, LiveOutcome, MessageRecord, MethodResponse, SmsReceiver,
    DEBUG_PREFIX, METHOD_DEBUG_LOG, UNKNOWN_SENDER,
};

#[tokio::test]
async fn test_record_kept_when_bridge_absent() {
    let harness = Harness::new();

    let record = MessageRecord::new(Some("+1555"), Some("hi"), 1000).with_source_id(5);
    let report = harness.relay.deliver(record).await;

    assert_eq!(report.live, LiveOutcome::NoBridge);
    assert!(report.persisted);

    let log = harness.relay.message_log().read_all().await.unwrap();
    assert_eq!(log.len(), 1);
    assert_eq!(log[0].sender, "+1555");
    assert_eq!(log[0].body, "hi");
    assert_eq!(log[0].source_timestamp, 1000);
    assert!(log[0].received_at > 0);
}

#[tokio::test]
async fn test_live_delivery_still_persists() {
    let harness = Harness::new();
    let bridge = RecordingBridge::new();
    harness.attach(bridge.clone()).await;

    let report = harness
        .relay
        .deliver(MessageRecord::new(Some("+1"), Some("hello"), 7))
        .await;

    assert_eq!(report.live, LiveOutcome::Delivered);
    assert!(report.persisted);
    assert_eq!(bridge.sms_calls().await.len(), 1);
    assert_eq!(harness.relay.message_log().read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_bridge_resolved_lazily_after_registration() {
    let harness = Harness::new();

    let first = harness
        .relay
        .deliver(MessageRecord::new(Some("a"), Some("early"), 1))
        .await;
    assert_eq!(first.live, LiveOutcome::NoBridge);

    let bridge = RecordingBridge::new();
    harness.attach(bridge.clone()).await;

    let second = harness
        .relay
        .deliver(MessageRecord::new(Some("a"), Some("late"), 2))
        .await;
    assert_eq!(second.live, LiveOutcome::Delivered);
    assert_eq!(bridge.sms_calls().await.len(), 1);
}

#[tokio::test]
async fn test_failed_call_invalidates_and_persists() {
    let harness = Harness::new();
    let bridge = RecordingBridge::new();
    harness.attach(bridge.clone()).await;
    bridge.set_failing(true);

    let report = harness
        .relay
        .deliver(MessageRecord::new(Some("a"), Some("x"), 1))
        .await;

    assert_eq!(report.live, LiveOutcome::Failed(BridgeError::Detached));
    assert!(report.persisted);
    assert!(harness.relay.slot().cached().await.is_none());

    bridge.set_failing(false);
    let retry = harness
        .relay
        .deliver(MessageRecord::new(Some("a"), Some("y"), 2))
        .await;
    assert_eq!(retry.live, LiveOutcome::Delivered);
    assert_eq!(harness.relay.message_log().read_all().await.unwrap().len(), 2);
}

#[tokio::test]
async fn test_remote_error_persists_and_keeps_bridge() {
    let harness = Harness::new();
    harness
        .attach(ReplyBridge::new(MethodResponse::error("BUSY", "ui not ready")))
        .await;

    let report = harness
        .relay
        .deliver(MessageRecord::new(Some("a"), Some("x"), 1))
        .await;

    assert_eq!(
        report.live,
        LiveOutcome::Failed(BridgeError::Remote {
            code: "BUSY".to_string(),
            message: "ui not ready".to_string(),
        })
    );
    assert!(report.persisted);
    assert!(harness.relay.slot().cached().await.is_some());
    assert_eq!(harness.relay.message_log().read_all().await.unwrap().len(), 1);
}

#[tokio::test]
async fn test_not_implemented_still_persists() {
    let harness = Harness::new();
    harness.attach(ReplyBridge::new(MethodResponse::NotImplemented)).await;

    let report = harness
        .relay
        .deliver(MessageRecord::new(Some("a"), Some("x"), 1))
        .await;

    assert_eq!(report.live, LiveOutcome::NotImplemented);
    assert!(report.persisted);
    assert!(harness.relay.slot().cached().await.is_some());

    let debug = harness.relay.debug_log_store().read_all().await.unwrap();
    assert!(debug.iter().any(|l| l.text.ends_with("Bridge does not implement onSmsReceived")));
}

#[tokio::test]
async fn test_empty_sender_is_kept() {
    let harness = Harness::new();

    harness
        .relay
        .deliver(MessageRecord::new(Some(""), Some("blank"), 1))
        .await;
    harness
        .relay
        .deliver(MessageRecord::new(None, Some("absent"), 2))
        .await;

    let mut log = harness.relay.message_log().read_all().await.unwrap();
    log.sort_by_key(|r| r.source_timestamp);
    assert_eq!(log[0].sender, "");
    assert_eq!(log[1].sender, UNKNOWN_SENDER);
}

#[tokio::test]
async fn test_debug_lines_are_prefixed_and_bounded() {
    let harness = Harness::new();
    let bridge = RecordingBridge::new();
    harness.attach(bridge.clone()).await;

    for i in 0..60 {
        harness.relay.debug_log(format!("line {}", i)).await;
    }

    let lines = harness.relay.debug_log_store().read_all().await.unwrap();
    assert_eq!(lines.len(), 50);
    assert!(lines.iter().all(|l| l.text.starts_with(DEBUG_PREFIX)));

    let calls = bridge.calls.lock().await;
    assert_eq!(calls.len(), 60);
    assert!(calls.iter().all(|(method, _)| method == METHOD_DEBUG_LOG));
}

#[tokio::test]
async fn test_receiver_normalizes_missing_fields() {
    let harness = Harness::new();
    let receiver = SmsReceiver::new(Arc::clone(&harness.relay));

    let broadcast = Broadcast::sms_received(vec![
        IncomingSms::new("+1555", "first"),
        IncomingSms::default(),
    ]);
    assert_eq!(receiver.on_receive(&broadcast).await, 2);

    let mut log = harness.relay.message_log().read_all().await.unwrap();
    log.sort_by_key(|r| r.body.clone());
    assert_eq!(log.len(), 2);
    assert_eq!(log[0].sender, UNKNOWN_SENDER);
    assert_eq!(log[0].body, "");
    assert!(log[0].source_id.is_none());
    assert_eq!(log[1].sender, "+1555");
}

#[tokio::test]
async fn test_receiver_ignores_other_actions() {
    let harness = Harness::new();
    let receiver = SmsReceiver::new(Arc::clone(&harness.relay));

    let broadcast = Broadcast {
        action: "android.intent.action.BOOT_COMPLETED".to_string(),
        messages: vec![IncomingSms::new("+1", "nope")],
    };
    assert_eq!(receiver.on_receive(&broadcast).await, 0);
    assert!(harness.relay.message_log().read_all().await.unwrap().is_empty());
}
