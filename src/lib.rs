//! An at-least-once relay from an SMS store to a UI consumer.
//!
//! Messages arrive on two paths: system broadcasts ([`SmsReceiver`]) and a
//! background monitor that watches the message store for rows past a
//! high-water mark ([`MonitorService`], [`ChangeDetector`]). Either way each
//! record is handed to the [`DeliveryRelay`], which calls the consumer over
//! a [`Bridge`] when one is registered and always appends the record to a
//! capacity-bounded persisted log the consumer can read later.
//!
//! ## Guarantees
//! - Every relayed record reaches the persisted log, bridge or not
//! - Records already in the store at startup are never relayed by a check
//! - Concurrent checks never deliver the same range twice
//! - Persisted logs never exceed their capacity
//! - No entry point returns an error for source, bridge or store failures
//!
//! ## Non-Guarantees
//! - Exactly-once observation (live call and log may both show a record)
//! - Retention beyond log capacity (oldest entries are evicted silently)
//! - Ordering of entries as returned by [`BoundedLog::read_all`]

mod bounded_log;
mod bridge;
mod config;
mod detector;
mod error;
mod handler;
mod receiver;
mod relay;
mod service;
mod source;
mod storage;
mod types;

#[cfg(feature = "http")]
mod bridge_http;
#[cfg(feature = "http")]
mod signing;

#[cfg(feature = "redis")]
mod storage_redis;

#[cfg(feature = "postgres")]
mod storage_postgres;

pub use bounded_log::{BoundedLog, LogEntry, LEGACY_FIELD_SEPARATOR, LEGACY_RECORD_SEPARATOR};
pub use bridge::{
    Bridge,
    BridgeRegistry,
    BridgeSlot,
    METHOD_DEBUG_LOG,
    METHOD_ON_SMS_RECEIVED,
    METHOD_TEST,
};
pub use config::RelayConfig;
pub use detector::{ChangeDetector, ScanReport};
pub use error::{BridgeError, LiveOutcome, ServiceError, SourceError, StoreError};
pub use handler::MethodCallHandler;
pub use receiver::{Broadcast, IncomingSms, SmsReceiver, SMS_RECEIVED_ACTION};
pub use relay::{DeliveryRelay, Relay, RelayReport, Relayable, DEBUG_PREFIX};
pub use service::{MonitorService, ServiceCommand, ServiceControl};
pub use source::{ChangeSignal, InMemorySource, MessageSource};
pub use storage::{FileStore, InMemoryStore, KeyValueStore};
pub use types::{DebugLine, MessageRecord, MethodResponse, SourceId, UNKNOWN_SENDER};

#[cfg(feature = "http")]
pub use bridge_http::{BridgeCall, HttpBridge};
#[cfg(feature = "http")]
pub use signing::{
    sign_call,
    verify_bridge_call,
    CallSignature,
    VerificationError,
    METHOD_HEADER,
    SIGNATURE_HEADER,
    TIMESTAMP_HEADER,
};

#[cfg(feature = "redis")]
pub use storage_redis::RedisStore;

#[cfg(feature = "postgres")]
pub use storage_postgres::PostgresStore;
