//! Capacity-bounded, persisted append log.
//!
//! Entries are stored as one JSON array per `(namespace, key)`. When an
//! append pushes the log past capacity, all entries are sorted by their
//! embedded receive time and only the newest `capacity` survive.

use std::marker::PhantomData;
use std::sync::Arc;

use serde::de::DeserializeOwned;
use serde::Serialize;
use serde_json::{Map, Value};
use tokio::sync::Mutex;

use crate::error::StoreError;
use crate::storage::KeyValueStore;
use crate::types::{DebugLine, MessageRecord};

/// Record separator of the pre-JSON storage layout.
pub const LEGACY_RECORD_SEPARATOR: &str = "|||";

/// Field separator of the pre-JSON storage layout.
pub const LEGACY_FIELD_SEPARATOR: char = '|';

/// An entry that can live in a [`BoundedLog`].
pub trait LogEntry: Serialize + DeserializeOwned + Send + Sync {
    /// Name of the field in the stored form that orders eviction.
    const TIME_FIELD: &'static str;

    /// Convert one entry of the legacy delimiter layout into the JSON form.
    fn from_legacy(_entry: &str) -> Option<Value> {
        None
    }
}

impl LogEntry for MessageRecord {
    const TIME_FIELD: &'static str = "received_at";

    fn from_legacy(entry: &str) -> Option<Value> {
        let mut object = Map::new();
        for field in entry.split(LEGACY_FIELD_SEPARATOR) {
            let Some((key, value)) = field.split_once('=') else { continue };
            let value = match key {
                "timestamp" => Value::from(value.parse::<i64>().unwrap_or(0)),
                "received_at" => Value::from(value.parse::<u64>().unwrap_or(0)),
                _ => Value::from(value),
            };
            object.insert(key.to_string(), value);
        }
        if object.is_empty() {
            return None;
        }
        object.entry("sender").or_insert_with(|| Value::from(crate::types::UNKNOWN_SENDER));
        object.entry("message").or_insert_with(|| Value::from(""));
        object.entry("timestamp").or_insert_with(|| Value::from(0));
        Some(Value::Object(object))
    }
}

impl LogEntry for DebugLine {
    const TIME_FIELD: &'static str = "at_ms";

    fn from_legacy(entry: &str) -> Option<Value> {
        let (at, text) = entry.split_once(':')?;
        let mut object = Map::new();
        object.insert("at_ms".into(), Value::from(at.trim().parse::<u64>().unwrap_or(0)));
        object.insert("text".into(), Value::from(text.strip_prefix(' ').unwrap_or(text)));
        Some(Value::Object(object))
    }
}

/// Append-only store that never holds more than `capacity` entries.
pub struct BoundedLog<T> {
    store: Arc<dyn KeyValueStore>,
    namespace: String,
    key: String,
    capacity: usize,
    write_lock: Mutex<()>,
    _entry: PhantomData<fn() -> T>,
}

impl<T: LogEntry> BoundedLog<T> {
    pub fn new(
        store: Arc<dyn KeyValueStore>,
        namespace: impl Into<String>,
        key: impl Into<String>,
        capacity: usize,
    ) -> Self {
        Self {
            store,
            namespace: namespace.into(),
            key: key.into(),
            capacity: capacity.max(1),
            write_lock: Mutex::new(()),
            _entry: PhantomData,
        }
    }

    pub fn capacity(&self) -> usize {
        self.capacity
    }

    /// Append `entry`, evicting the oldest entries if over capacity.
    ///
    /// Returns the number of entries persisted.
    pub async fn append(&self, entry: &T) -> Result<usize, StoreError> {
        let _guard = self.write_lock.lock().await;

        let mut entries = self.load().await?;
        entries.push(serde_json::to_value(entry)?);

        if entries.len() > self.capacity {
            // Stable sort keeps storage order among equal timestamps.
            entries.sort_by_key(sort_key::<T>);
            let excess = entries.len() - self.capacity;
            entries.drain(..excess);
        }

        let count = entries.len();
        self.store
            .put(&self.namespace, &self.key, serde_json::to_string(&entries)?)
            .await?;
        Ok(count)
    }

    /// Every decodable entry, in stored order.
    ///
    /// Entries that fail to decode stay in storage; they are only left out
    /// of this view.
    pub async fn read_all(&self) -> Result<Vec<T>, StoreError> {
        let raw = self.read_raw().await?;
        let mut decoded = Vec::with_capacity(raw.len());
        for value in raw {
            match serde_json::from_value::<T>(value) {
                Ok(entry) => decoded.push(entry),
                Err(err) => {
                    tracing::debug!(namespace = %self.namespace, error = %err, "skipping malformed log entry");
                }
            }
        }
        Ok(decoded)
    }

    /// Stored entries exactly as persisted.
    pub async fn read_raw(&self) -> Result<Vec<Value>, StoreError> {
        self.load().await
    }

    async fn load(&self) -> Result<Vec<Value>, StoreError> {
        let Some(payload) = self.store.get(&self.namespace, &self.key).await? else {
            return Ok(Vec::new());
        };
        if payload.is_empty() {
            return Ok(Vec::new());
        }

        match serde_json::from_str::<Vec<Value>>(&payload) {
            Ok(entries) => Ok(entries),
            Err(_) => {
                tracing::info!(namespace = %self.namespace, "importing legacy log layout");
                Ok(decode_legacy::<T>(&payload))
            }
        }
    }
}

fn decode_legacy<T: LogEntry>(payload: &str) -> Vec<Value> {
    payload
        .split(LEGACY_RECORD_SEPARATOR)
        .filter(|entry| !entry.is_empty())
        .map(|entry| T::from_legacy(entry).unwrap_or_else(|| Value::from(entry)))
        .collect()
}

fn sort_key<T: LogEntry>(value: &Value) -> u64 {
    match value.get(T::TIME_FIELD) {
        Some(Value::Number(n)) => n.as_u64().unwrap_or(0),
        Some(Value::String(s)) => s.parse().unwrap_or(0),
        _ => 0,
    }
}
