use std::time::Duration;

use serde::{Deserialize, Serialize};

const DEFAULT_MESSAGE_CAPACITY: usize = 20;
const DEFAULT_DEBUG_CAPACITY: usize = 50;
const DEFAULT_RECENT_PROBE_LIMIT: usize = 5;
const DEFAULT_BULK_RESCAN_LIMIT: usize = 10;

/// Configuration shared by the relay, the detector and the service.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct RelayConfig {
    /// Registry name the consumer registers its bridge under.
    pub bridge_name: String,

    /// Namespace and key of the primary message log.
    pub message_namespace: String,
    pub message_key: String,
    pub message_capacity: usize,

    /// Namespace and key of the diagnostic log.
    pub debug_namespace: String,
    pub debug_key: String,
    pub debug_capacity: usize,

    /// Records inspected, for logging only, when a check finds nothing new.
    pub recent_probe_limit: usize,

    /// Records replayed by a bulk rescan.
    pub bulk_rescan_limit: usize,

    /// Interval of the service's periodic check. `None` disables it.
    pub poll_interval: Option<Duration>,

    /// Upper bound of random delay added to each poll.
    pub poll_jitter_ms: u64,
}

impl Default for RelayConfig {
    fn default() -> Self {
        Self {
            bridge_name: "main".to_string(),
            message_namespace: "sms_data".to_string(),
            message_key: "sms_messages_json".to_string(),
            message_capacity: DEFAULT_MESSAGE_CAPACITY,
            debug_namespace: "sms_debug_logs".to_string(),
            debug_key: "debug_logs".to_string(),
            debug_capacity: DEFAULT_DEBUG_CAPACITY,
            recent_probe_limit: DEFAULT_RECENT_PROBE_LIMIT,
            bulk_rescan_limit: DEFAULT_BULK_RESCAN_LIMIT,
            poll_interval: None,
            poll_jitter_ms: 0,
        }
    }
}

impl RelayConfig {
    /// Parse a JSON document; absent fields keep their defaults.
    pub fn from_json_str(json: &str) -> Result<Self, serde_json::Error> {
        serde_json::from_str(json)
    }

    /// Apply overrides from the environment.
    ///
    /// Reads `SMS_RELAY_POLL_INTERVAL_SECS` (0 disables polling) and
    /// `SMS_RELAY_BRIDGE_NAME`.
    pub fn with_env_overrides(self) -> Self {
        self.with_overrides(|name| std::env::var(name).ok())
    }

    fn with_overrides(mut self, lookup: impl Fn(&str) -> Option<String>) -> Self {
        if let Some(secs) = lookup("SMS_RELAY_POLL_INTERVAL_SECS").and_then(|s| s.parse::<u64>().ok()) {
            self.poll_interval = if secs == 0 { None } else { Some(Duration::from_secs(secs)) };
        }
        if let Some(name) = lookup("SMS_RELAY_BRIDGE_NAME").filter(|s| !s.is_empty()) {
            self.bridge_name = name;
        }
        self
    }

    pub fn with_poll_interval(mut self, interval: Duration) -> Self {
        self.poll_interval = Some(interval);
        self
    }

    pub fn with_poll_jitter_ms(mut self, jitter_ms: u64) -> Self {
        self.poll_jitter_ms = jitter_ms;
        self
    }

    pub fn with_bridge_name(mut self, name: impl Into<String>) -> Self {
        self.bridge_name = name.into();
        self
    }

    pub fn with_capacities(mut self, messages: usize, debug: usize) -> Self {
        self.message_capacity = messages;
        self.debug_capacity = debug;
        self
    }

    /// Poll interval plus a random jitter in `0..=poll_jitter_ms`.
    pub(crate) fn next_poll_delay(&self) -> Option<Duration> {
        let base = self.poll_interval?;
        let jitter = if self.poll_jitter_ms == 0 {
            0
        } else {
            fastrand::u64(0..=self.poll_jitter_ms)
        };
        Some(base + Duration::from_millis(jitter))
    }
}
