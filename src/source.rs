use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use tokio::sync::{Mutex, Notify};

use crate::error::SourceError;
use crate::types::{MessageRecord, SourceId};

/// An ordered store of received messages, such as the system SMS inbox.
///
/// Records returned by queries carry their `source_id`.
#[async_trait]
pub trait MessageSource: Send + Sync {
    /// Highest identifier present, or `None` if the source is empty.
    async fn max_id(&self) -> Result<Option<SourceId>, SourceError>;

    /// All records with an identifier greater than `after`, ascending.
    async fn list_after(&self, after: SourceId) -> Result<Vec<MessageRecord>, SourceError>;

    /// The `limit` most recent records, descending.
    async fn list_recent(&self, limit: usize) -> Result<Vec<MessageRecord>, SourceError>;
}

/// Zero-payload "the source may have changed" signal.
#[derive(Default, Clone)]
pub struct ChangeSignal {
    notify: Arc<Notify>,
}

impl ChangeSignal {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn notify(&self) {
        self.notify.notify_one();
    }

    pub(crate) async fn notified(&self) {
        self.notify.notified().await
    }
}

/// In-memory source for tests and demos.
#[derive(Default)]
pub struct InMemorySource {
    rows: Mutex<Vec<MessageRecord>>,
    next_id: Mutex<i64>,
    failing: AtomicBool,
    signal: Option<ChangeSignal>,
}

impl InMemorySource {
    pub fn new() -> Self {
        Self::default()
    }

    /// Fire `signal` after every insert.
    pub fn with_signal(mut self, signal: ChangeSignal) -> Self {
        self.signal = Some(signal);
        self
    }

    /// Insert a message with the next identifier.
    pub async fn insert(&self, sender: Option<&str>, body: Option<&str>, timestamp: i64) -> SourceId {
        let id = {
            let mut next = self.next_id.lock().await;
            *next += 1;
            *next
        };
        self.insert_with_id(id, sender, body, timestamp).await
    }

    /// Insert a message with an explicit identifier.
    pub async fn insert_with_id(
        &self,
        id: i64,
        sender: Option<&str>,
        body: Option<&str>,
        timestamp: i64,
    ) -> SourceId {
        {
            let mut next = self.next_id.lock().await;
            *next = (*next).max(id);
        }
        let record = MessageRecord::new(sender, body, timestamp).with_source_id(id);
        {
            let mut rows = self.rows.lock().await;
            rows.push(record);
            rows.sort_by_key(|r| r.source_id);
        }
        if let Some(signal) = &self.signal {
            signal.notify();
        }
        SourceId(id)
    }

    /// Make every query fail until cleared.
    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    fn check_available(&self) -> Result<(), SourceError> {
        if self.failing.load(Ordering::SeqCst) {
            Err(SourceError::Unavailable("source offline".to_string()))
        } else {
            Ok(())
        }
    }
}

#[async_trait]
impl MessageSource for InMemorySource {
    async fn max_id(&self) -> Result<Option<SourceId>, SourceError> {
        self.check_available()?;
        let rows = self.rows.lock().await;
        Ok(rows.iter().filter_map(|r| r.source_id).max())
    }

    async fn list_after(&self, after: SourceId) -> Result<Vec<MessageRecord>, SourceError> {
        self.check_available()?;
        let rows = self.rows.lock().await;
        Ok(rows
            .iter()
            .filter(|r| r.source_id.map_or(false, |id| id > after))
            .cloned()
            .collect())
    }

    async fn list_recent(&self, limit: usize) -> Result<Vec<MessageRecord>, SourceError> {
        self.check_available()?;
        let rows = self.rows.lock().await;
        Ok(rows.iter().rev().take(limit).cloned().collect())
    }
}
