use std::sync::Arc;

use serde_json::Value;

use crate::bounded_log::{BoundedLog, LogEntry};
use crate::bridge::{BridgeSlot, METHOD_DEBUG_LOG, METHOD_ON_SMS_RECEIVED};
use crate::config::RelayConfig;
use crate::error::{BridgeError, LiveOutcome};
use crate::storage::KeyValueStore;
use crate::types::{now_millis, DebugLine, MethodResponse, MessageRecord};

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// Prefix applied to every diagnostic line emitted by the relay.
pub const DEBUG_PREFIX: &str = "SERVICE: ";

/// An entry that knows how to present itself on the bridge.
pub trait Relayable: LogEntry {
    fn to_args(&self) -> Value;
}

impl Relayable for MessageRecord {
    fn to_args(&self) -> Value {
        MessageRecord::to_args(self)
    }
}

impl Relayable for DebugLine {
    fn to_args(&self) -> Value {
        Value::from(self.text.clone())
    }
}

/// Result of one relay attempt. Both legs run independently.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct RelayReport {
    pub live: LiveOutcome,
    pub persisted: bool,
}

/// "Try the live bridge, always persist" for one kind of entry.
pub struct Relay<T> {
    method: &'static str,
    slot: Arc<BridgeSlot>,
    log: BoundedLog<T>,
}

impl<T: Relayable> Relay<T> {
    pub fn new(method: &'static str, slot: Arc<BridgeSlot>, log: BoundedLog<T>) -> Self {
        Self { method, slot, log }
    }

    pub fn log(&self) -> &BoundedLog<T> {
        &self.log
    }

    /// Attempt live delivery, then append to the bounded log regardless.
    pub async fn relay(&self, entry: &T) -> RelayReport {
        let live = self.try_live(entry).await;

        let persisted = match self.log.append(entry).await {
            Ok(_) => true,
            Err(err) => {
                metric_inc("sms_relay.persist.failed");
                tracing::warn!(method = self.method, error = %err, "fallback persistence failed");
                false
            }
        };

        RelayReport { live, persisted }
    }

    async fn try_live(&self, entry: &T) -> LiveOutcome {
        let Some(bridge) = self.slot.get_or_resolve().await else {
            metric_inc("sms_relay.live.no_bridge");
            return LiveOutcome::NoBridge;
        };

        match bridge.invoke(self.method, entry.to_args()).await {
            Ok(MethodResponse::NotImplemented) => LiveOutcome::NotImplemented,
            Ok(MethodResponse::Error { code, message }) => {
                metric_inc("sms_relay.live.failed");
                LiveOutcome::Failed(BridgeError::Remote { code, message })
            }
            Ok(MethodResponse::Success(_)) => {
                metric_inc("sms_relay.live.delivered");
                LiveOutcome::Delivered
            }
            Err(err) => {
                metric_inc("sms_relay.live.failed");
                if matches!(err, BridgeError::Detached | BridgeError::Transport(_)) {
                    self.slot.invalidate().await;
                }
                LiveOutcome::Failed(err)
            }
        }
    }
}

/// Hands message records to the consumer with at-least-once persistence.
///
/// Records go through the primary relay (`onSmsReceived`); progress lines
/// go through the diagnostic relay (`debugLog`). Both share one bridge slot.
pub struct DeliveryRelay {
    messages: Relay<MessageRecord>,
    diagnostics: Relay<DebugLine>,
    slot: Arc<BridgeSlot>,
}

impl DeliveryRelay {
    pub fn new(config: &RelayConfig, slot: Arc<BridgeSlot>, store: Arc<dyn KeyValueStore>) -> Self {
        let message_log = BoundedLog::new(
            store.clone(),
            config.message_namespace.clone(),
            config.message_key.clone(),
            config.message_capacity,
        );
        let debug_log = BoundedLog::new(
            store,
            config.debug_namespace.clone(),
            config.debug_key.clone(),
            config.debug_capacity,
        );

        Self {
            messages: Relay::new(METHOD_ON_SMS_RECEIVED, slot.clone(), message_log),
            diagnostics: Relay::new(METHOD_DEBUG_LOG, slot.clone(), debug_log),
            slot,
        }
    }

    pub fn slot(&self) -> &Arc<BridgeSlot> {
        &self.slot
    }

    pub fn message_log(&self) -> &BoundedLog<MessageRecord> {
        self.messages.log()
    }

    pub fn debug_log_store(&self) -> &BoundedLog<DebugLine> {
        self.diagnostics.log()
    }

    /// Deliver `record` live if possible and always persist it.
    ///
    /// `received_at` is stamped here. Never fails; the report describes
    /// what happened on each leg.
    pub async fn deliver(&self, record: MessageRecord) -> RelayReport {
        let record = record.with_received_at(now_millis());

        tracing::debug!(
            sender = %record.sender,
            length = record.body.len(),
            timestamp = record.source_timestamp,
            "relaying sms"
        );
        self.debug_log(format!("Relaying SMS from: {}", record.sender)).await;

        if self.slot.cached().await.is_none() {
            self.debug_log("Bridge not cached, attempting resolution...").await;
        }

        let report = self.messages.relay(&record).await;

        match &report.live {
            LiveOutcome::Delivered => {
                self.debug_log("SMS sent via bridge").await;
            }
            LiveOutcome::NotImplemented => {
                tracing::warn!("consumer does not handle onSmsReceived");
                self.debug_log("Bridge does not implement onSmsReceived").await;
            }
            LiveOutcome::NoBridge => {
                tracing::debug!("no bridge available, relying on persisted log");
                self.debug_log("Bridge not available, SMS kept in log").await;
            }
            LiveOutcome::Failed(err) => {
                tracing::warn!(error = %err, "live delivery failed");
                self.debug_log(format!("Bridge call failed: {}", err)).await;
            }
        }

        if report.persisted {
            self.debug_log("SMS written to log").await;
        } else {
            self.debug_log("ERROR: SMS could not be written to log").await;
        }

        report
    }

    /// Emit a diagnostic line through the bridge and the diagnostic log.
    pub async fn debug_log(&self, text: impl AsRef<str>) -> RelayReport {
        let line = DebugLine::new(format!("{}{}", DEBUG_PREFIX, text.as_ref()));
        tracing::trace!(line = %line.text, "diagnostic");
        self.diagnostics.relay(&line).await
    }
}
