use std::fmt;

/// Failure to query the external message source.
///
/// Always recoverable: the next trigger retries from the same cursor.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SourceError {
    /// The source could not be reached or refused the query.
    Unavailable(String),

    /// A row was returned but could not be read.
    MalformedRow(String),
}

impl fmt::Display for SourceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            SourceError::Unavailable(reason) =>
                write!(f, "message source unavailable: {}", reason),
            SourceError::MalformedRow(reason) =>
                write!(f, "malformed source row: {}", reason),
        }
    }
}

impl std::error::Error for SourceError {}

/// Failure of a call made through a resolved bridge handle.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BridgeError {
    /// The handle no longer points at a live consumer.
    Detached,

    /// The consumer raised while handling the call.
    Remote { code: String, message: String },

    /// Transport-level failure (timeout, connection reset, ...).
    Transport(String),
}

impl fmt::Display for BridgeError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            BridgeError::Detached =>
                write!(f, "bridge handle is detached"),
            BridgeError::Remote { code, message } =>
                write!(f, "consumer error {}: {}", code, message),
            BridgeError::Transport(reason) =>
                write!(f, "bridge transport error: {}", reason),
        }
    }
}

impl std::error::Error for BridgeError {}

/// Failure of the key-value persistence layer.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum StoreError {
    Io(String),
    Encode(String),
    Backend(String),
}

impl fmt::Display for StoreError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            StoreError::Io(reason) =>
                write!(f, "store io error: {}", reason),
            StoreError::Encode(reason) =>
                write!(f, "store encoding error: {}", reason),
            StoreError::Backend(reason) =>
                write!(f, "store backend error: {}", reason),
        }
    }
}

impl std::error::Error for StoreError {}

impl From<std::io::Error> for StoreError {
    fn from(err: std::io::Error) -> Self {
        StoreError::Io(err.to_string())
    }
}

impl From<serde_json::Error> for StoreError {
    fn from(err: serde_json::Error) -> Self {
        StoreError::Encode(err.to_string())
    }
}

/// Errors returned by the monitor service control surface.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ServiceError {
    /// The service loop is not running.
    NotRunning,

    /// The service is already running.
    AlreadyRunning,

    /// The command queue is full.
    Busy,
}

impl fmt::Display for ServiceError {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            ServiceError::NotRunning =>
                write!(f, "monitor service is not running"),
            ServiceError::AlreadyRunning =>
                write!(f, "monitor service is already running"),
            ServiceError::Busy =>
                write!(f, "monitor service command queue is full"),
        }
    }
}

impl std::error::Error for ServiceError {}

/// Outcome of the live leg of a relay attempt.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum LiveOutcome {
    /// The consumer accepted the call.
    Delivered,

    /// The consumer answered that it does not handle the method.
    NotImplemented,

    /// No bridge handle could be resolved.
    NoBridge,

    /// A handle was resolved but the call failed.
    Failed(BridgeError),
}
