use std::fmt;
use std::time::{SystemTime, UNIX_EPOCH};

use serde::{Deserialize, Deserializer, Serialize};
use serde_json::{json, Value};

/// Sender recorded when the originating address is absent.
pub const UNKNOWN_SENDER: &str = "Unknown";

/// Identifier assigned by the external ordered source.
///
/// Strictly increasing with insertion order within a single source.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct SourceId(pub i64);

impl SourceId {
    /// Cursor value for a source that holds no records.
    pub const NONE: SourceId = SourceId(-1);
}

impl fmt::Display for SourceId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}", self.0)
    }
}

/// A single SMS travelling through the relay.
///
/// `sender` and `body` are already normalized: an absent originating
/// address becomes [`UNKNOWN_SENDER`] and an absent body becomes empty.
/// Numeric fields decode leniently: a numeric string is accepted and
/// anything unparsable reads as 0, so a damaged entry is still returned.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct MessageRecord {
    pub sender: String,

    #[serde(rename = "message")]
    pub body: String,

    /// Timestamp assigned by the originating event, epoch milliseconds.
    #[serde(rename = "timestamp", default, deserialize_with = "lenient_i64")]
    pub source_timestamp: i64,

    /// Wall-clock time the record entered the relay, epoch milliseconds.
    #[serde(default, deserialize_with = "lenient_u64")]
    pub received_at: u64,

    /// Row identifier in the source store; absent for broadcast deliveries.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_id: Option<SourceId>,
}

impl MessageRecord {
    /// Build a record from possibly-absent raw fields.
    pub fn new(sender: Option<&str>, body: Option<&str>, source_timestamp: i64) -> Self {
        Self {
            sender: sender.unwrap_or(UNKNOWN_SENDER).to_string(),
            body: body.unwrap_or_default().to_string(),
            source_timestamp,
            received_at: 0,
            source_id: None,
        }
    }

    /// Attach the source row identifier.
    pub fn with_source_id(mut self, id: i64) -> Self {
        self.source_id = Some(SourceId(id));
        self
    }

    /// Stamp the hand-off time.
    pub fn with_received_at(mut self, received_at: u64) -> Self {
        self.received_at = received_at;
        self
    }

    /// Arguments of the `onSmsReceived` bridge call.
    pub fn to_args(&self) -> Value {
        json!({
            "sender": self.sender,
            "message": self.body,
            "timestamp": self.source_timestamp.to_string(),
        })
    }
}

/// One line of the diagnostic log.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct DebugLine {
    pub at_ms: u64,
    pub text: String,
}

impl DebugLine {
    pub fn new(text: impl Into<String>) -> Self {
        Self {
            at_ms: now_millis(),
            text: text.into(),
        }
    }
}

impl fmt::Display for DebugLine {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.at_ms, self.text)
    }
}

/// Response to a method call crossing the bridge.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum MethodResponse {
    Success(Value),
    Error { code: String, message: String },
    /// The callee does not know the method.
    NotImplemented,
}

impl MethodResponse {
    pub fn success(value: impl Into<Value>) -> Self {
        MethodResponse::Success(value.into())
    }

    pub fn error(code: impl Into<String>, message: impl Into<String>) -> Self {
        MethodResponse::Error {
            code: code.into(),
            message: message.into(),
        }
    }
}

fn lenient_i64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<i64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_i64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

fn lenient_u64<'de, D: Deserializer<'de>>(deserializer: D) -> Result<u64, D::Error> {
    Ok(match Value::deserialize(deserializer)? {
        Value::Number(n) => n.as_u64().unwrap_or(0),
        Value::String(s) => s.trim().parse().unwrap_or(0),
        _ => 0,
    })
}

pub(crate) fn now_millis() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .unwrap_or_default()
        .as_millis() as u64
}
