//! High-water-mark change detection over a [`MessageSource`].

use std::sync::Arc;

use tokio::sync::Mutex;

use crate::config::RelayConfig;
use crate::relay::DeliveryRelay;
use crate::source::MessageSource;
use crate::types::SourceId;

#[cfg(feature = "metrics")]
fn metric_inc(name: &'static str) {
    metrics::increment_counter!(name);
}

#[cfg(not(feature = "metrics"))]
fn metric_inc(_name: &'static str) {}

/// What a scan did.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ScanReport {
    /// Records handed to the relay.
    pub delivered: usize,

    /// Cursor after the scan.
    pub cursor: SourceId,

    /// Whether the source query failed.
    pub source_failed: bool,
}

struct CursorState {
    last_processed: SourceId,
    initialized: bool,
}

impl CursorState {
    fn advance(&mut self, id: SourceId) {
        if id > self.last_processed {
            self.last_processed = id;
        }
    }
}

/// Discovers new records without reprocessing old ones.
///
/// Every scan holds the cursor lock for its whole duration, so concurrent
/// triggers are serialized and never deliver the same range twice.
pub struct ChangeDetector {
    source: Arc<dyn MessageSource>,
    relay: Arc<DeliveryRelay>,
    cursor: Mutex<CursorState>,
    recent_probe_limit: usize,
    bulk_rescan_limit: usize,
}

impl ChangeDetector {
    pub fn new(config: &RelayConfig, source: Arc<dyn MessageSource>, relay: Arc<DeliveryRelay>) -> Self {
        Self {
            source,
            relay,
            cursor: Mutex::new(CursorState {
                last_processed: SourceId::NONE,
                initialized: false,
            }),
            recent_probe_limit: config.recent_probe_limit,
            bulk_rescan_limit: config.bulk_rescan_limit,
        }
    }

    pub async fn cursor(&self) -> SourceId {
        self.cursor.lock().await.last_processed
    }

    /// Start the cursor at the current maximum id so existing records are
    /// never delivered. Only the first call has an effect.
    pub async fn initialize_cursor(&self) -> SourceId {
        let mut state = self.cursor.lock().await;
        if state.initialized {
            return state.last_processed;
        }

        let max = match self.source.max_id().await {
            Ok(max) => max.unwrap_or(SourceId::NONE),
            Err(err) => {
                tracing::warn!(error = %err, "could not read max source id, starting from empty");
                self.relay.debug_log(format!("Error getting last SMS ID: {}", err)).await;
                SourceId::NONE
            }
        };
        state.last_processed = max;
        state.initialized = true;

        tracing::info!(cursor = %max, "cursor initialized");
        self.relay.debug_log(format!("Last SMS ID: {}", max)).await;
        max
    }

    /// React to a change signal from the source.
    pub async fn on_change_notification(&self) -> ScanReport {
        metric_inc("sms_relay.scan.notification");
        self.relay.debug_log("SMS content changed").await;
        self.check_new().await
    }

    /// Same as a change notification, requested explicitly.
    pub async fn on_manual_check_requested(&self) -> ScanReport {
        metric_inc("sms_relay.scan.manual");
        self.relay.debug_log("Manual SMS check requested").await;
        self.check_new().await
    }

    /// Timer-driven check that catches changes whose signal was missed.
    pub async fn on_poll_tick(&self) -> ScanReport {
        metric_inc("sms_relay.scan.poll");
        self.relay.debug_log("Periodic SMS check").await;
        self.check_new().await
    }

    /// Replay the most recent records as if new. May re-deliver; never
    /// moves the cursor.
    pub async fn on_bulk_rescan_requested(&self) -> ScanReport {
        metric_inc("sms_relay.scan.bulk");
        let state = self.cursor.lock().await;
        let cursor = state.last_processed;

        self.relay
            .debug_log(format!("Checking all recent SMS (last {})...", self.bulk_rescan_limit))
            .await;

        let records = match self.source.list_recent(self.bulk_rescan_limit).await {
            Ok(records) => records,
            Err(err) => {
                metric_inc("sms_relay.scan.source_failed");
                tracing::warn!(error = %err, "bulk rescan query failed");
                self.relay.debug_log(format!("Error checking all recent SMS: {}", err)).await;
                return ScanReport { delivered: 0, cursor, source_failed: true };
            }
        };

        self.relay
            .debug_log(format!("Found {} recent SMS messages", records.len()))
            .await;

        let mut delivered = 0;
        for record in records {
            self.relay
                .debug_log(format!(
                    "Recent SMS - ID: {}, From: {}",
                    display_id(record.source_id),
                    record.sender
                ))
                .await;
            self.relay.deliver(record).await;
            delivered += 1;
        }

        ScanReport { delivered, cursor, source_failed: false }
    }

    async fn check_new(&self) -> ScanReport {
        let mut state = self.cursor.lock().await;
        let from = state.last_processed;

        tracing::debug!(cursor = %from, "checking for new sms");
        self.relay.debug_log(format!("Last processed SMS ID: {}", from)).await;

        let records = match self.source.list_after(from).await {
            Ok(records) => records,
            Err(err) => {
                metric_inc("sms_relay.scan.source_failed");
                tracing::warn!(error = %err, "new sms query failed");
                self.relay.debug_log(format!("Error checking for new SMS: {}", err)).await;
                return ScanReport { delivered: 0, cursor: from, source_failed: true };
            }
        };

        self.relay
            .debug_log(format!("Found {} new SMS messages", records.len()))
            .await;

        if records.is_empty() {
            self.probe_recent().await;
            return ScanReport { delivered: 0, cursor: from, source_failed: false };
        }

        let mut delivered = 0;
        for record in records {
            let id = record.source_id;
            tracing::debug!(id = %display_id(id), sender = %record.sender, "new sms found");
            self.relay
                .debug_log(format!("New SMS found - ID: {}, From: {}", display_id(id), record.sender))
                .await;

            self.relay.deliver(record).await;
            delivered += 1;

            if let Some(id) = id {
                state.advance(id);
            }
        }
        metric_inc("sms_relay.scan.delivered");

        ScanReport { delivered, cursor: state.last_processed, source_failed: false }
    }

    /// Log the most recent records. Observability only.
    async fn probe_recent(&self) {
        self.relay
            .debug_log(format!(
                "No new SMS found. Checking recent SMS (last {})...",
                self.recent_probe_limit
            ))
            .await;

        match self.source.list_recent(self.recent_probe_limit).await {
            Ok(records) => {
                for record in records {
                    let preview: String = record.body.chars().take(20).collect();
                    self.relay
                        .debug_log(format!(
                            "Recent SMS - ID: {}, From: {}, Body: {}...",
                            display_id(record.source_id),
                            record.sender,
                            preview
                        ))
                        .await;
                }
            }
            Err(err) => {
                tracing::warn!(error = %err, "recent sms probe failed");
                self.relay.debug_log(format!("Error checking recent SMS: {}", err)).await;
            }
        }
    }
}

fn display_id(id: Option<SourceId>) -> String {
    id.map(|id| id.to_string()).unwrap_or_else(|| "-".to_string())
}
