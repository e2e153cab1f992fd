use std::collections::HashMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::{Mutex, RwLock};

use crate::error::BridgeError;
use crate::types::MethodResponse;

/// Outbound method carrying a received SMS.
pub const METHOD_ON_SMS_RECEIVED: &str = "onSmsReceived";

/// Outbound method carrying a diagnostic line.
pub const METHOD_DEBUG_LOG: &str = "debugLog";

/// Liveness probe understood by both sides.
pub const METHOD_TEST: &str = "test";

/// A live channel into the consumer.
#[async_trait]
pub trait Bridge: Send + Sync {
    async fn invoke(&self, method: &str, args: Value) -> Result<MethodResponse, BridgeError>;
}

/// Process-wide lookup of bridge handles by name.
///
/// The consumer registers itself once it is ready; until then lookups
/// return `None`, which callers treat as a normal transient state.
#[derive(Default)]
pub struct BridgeRegistry {
    bridges: RwLock<HashMap<String, Arc<dyn Bridge>>>,
}

impl BridgeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn register(&self, name: impl Into<String>, bridge: Arc<dyn Bridge>) {
        let name = name.into();
        tracing::debug!(bridge = %name, "bridge registered");
        self.bridges.write().await.insert(name, bridge);
    }

    pub async fn unregister(&self, name: &str) -> Option<Arc<dyn Bridge>> {
        self.bridges.write().await.remove(name)
    }

    pub async fn resolve(&self, name: &str) -> Option<Arc<dyn Bridge>> {
        self.bridges.read().await.get(name).cloned()
    }
}

/// The relay's cached bridge handle.
///
/// Resolution happens lazily on every access while the slot is empty.
pub struct BridgeSlot {
    registry: Arc<BridgeRegistry>,
    name: String,
    handle: Mutex<Option<Arc<dyn Bridge>>>,
}

impl BridgeSlot {
    pub fn new(registry: Arc<BridgeRegistry>, name: impl Into<String>) -> Self {
        Self {
            registry,
            name: name.into(),
            handle: Mutex::new(None),
        }
    }

    pub fn name(&self) -> &str {
        &self.name
    }

    /// Cached handle, or a fresh one from the registry if none is cached.
    pub async fn get_or_resolve(&self) -> Option<Arc<dyn Bridge>> {
        let mut guard = self.handle.lock().await;
        if let Some(handle) = guard.as_ref() {
            return Some(handle.clone());
        }
        let resolved = self.registry.resolve(&self.name).await;
        if resolved.is_some() {
            tracing::debug!(bridge = %self.name, "bridge resolved");
        }
        *guard = resolved.clone();
        resolved
    }

    /// Current handle without attempting resolution.
    pub async fn cached(&self) -> Option<Arc<dyn Bridge>> {
        self.handle.lock().await.clone()
    }

    /// Drop the cached handle so the next access re-resolves.
    pub async fn invalidate(&self) {
        self.handle.lock().await.take();
    }
}
