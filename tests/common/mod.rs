#![allow(dead_code)]

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, OnceLock};

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::Mutex;

use sms_relay::{
    Bridge, BridgeError, BridgeRegistry, BridgeSlot, ChangeDetector, DeliveryRelay, InMemorySource,
    InMemoryStore, MethodCallHandler, MethodResponse, RelayConfig, METHOD_ON_SMS_RECEIVED,
};

/// Bridge that records every call and can be told to fail.
#[derive(Default)]
pub struct RecordingBridge {
    pub calls: Mutex<Vec<(String, Value)>>,
    failing: AtomicBool,
}

impl RecordingBridge {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    pub fn set_failing(&self, failing: bool) {
        self.failing.store(failing, Ordering::SeqCst);
    }

    pub async fn sms_calls(&self) -> Vec<Value> {
        self.calls
            .lock()
            .await
            .iter()
            .filter(|(method, _)| method == METHOD_ON_SMS_RECEIVED)
            .map(|(_, args)| args.clone())
            .collect()
    }
}

#[async_trait]
impl Bridge for RecordingBridge {
    async fn invoke(&self, method: &str, args: Value) -> Result<MethodResponse, BridgeError> {
        if self.failing.load(Ordering::SeqCst) {
            return Err(BridgeError::Detached);
        }
        self.calls.lock().await.push((method.to_string(), args));
        Ok(MethodResponse::success("ok"))
    }
}

/// Bridge that answers every call with a fixed response.
pub struct ReplyBridge {
    reply: MethodResponse,
}

impl ReplyBridge {
    pub fn new(reply: MethodResponse) -> Arc<Self> {
        Arc::new(Self { reply })
    }
}

#[async_trait]
impl Bridge for ReplyBridge {
    async fn invoke(&self, _method: &str, _args: Value) -> Result<MethodResponse, BridgeError> {
        Ok(self.reply.clone())
    }
}

/// Bridge whose consumer calls back into the handler the first time it
/// sees `trigger`, the way a UI reacts to an incoming message.
pub struct CallbackBridge {
    trigger: &'static str,
    callback: &'static str,
    handler: OnceLock<Arc<MethodCallHandler>>,
    fired: AtomicBool,
    pub answers: Mutex<Vec<MethodResponse>>,
}

impl CallbackBridge {
    pub fn new(trigger: &'static str, callback: &'static str) -> Arc<Self> {
        Arc::new(Self {
            trigger,
            callback,
            handler: OnceLock::new(),
            fired: AtomicBool::new(false),
            answers: Mutex::new(Vec::new()),
        })
    }

    pub fn connect(&self, handler: Arc<MethodCallHandler>) {
        let _ = self.handler.set(handler);
    }
}

#[async_trait]
impl Bridge for CallbackBridge {
    async fn invoke(&self, method: &str, _args: Value) -> Result<MethodResponse, BridgeError> {
        if method == self.trigger && !self.fired.swap(true, Ordering::SeqCst) {
            if let Some(handler) = self.handler.get() {
                let answer = handler.handle(self.callback, Value::Null).await;
                self.answers.lock().await.push(answer);
            }
        }
        Ok(MethodResponse::success("ok"))
    }
}

pub struct Harness {
    pub config: RelayConfig,
    pub registry: Arc<BridgeRegistry>,
    pub store: Arc<InMemoryStore>,
    pub source: Arc<InMemorySource>,
    pub relay: Arc<DeliveryRelay>,
    pub detector: Arc<ChangeDetector>,
}

impl Harness {
    pub fn new() -> Self {
        Self::with_source(InMemorySource::new())
    }

    pub fn with_source(source: InMemorySource) -> Self {
        let config = RelayConfig::default();
        let registry = Arc::new(BridgeRegistry::new());
        let store = Arc::new(InMemoryStore::new());
        let source = Arc::new(source);
        let slot = Arc::new(BridgeSlot::new(registry.clone(), config.bridge_name.clone()));
        let relay = Arc::new(DeliveryRelay::new(&config, slot, store.clone()));
        let detector = Arc::new(ChangeDetector::new(&config, source.clone(), relay.clone()));

        Self {
            config,
            registry,
            store,
            source,
            relay,
            detector,
        }
    }

    pub async fn attach(&self, bridge: Arc<dyn Bridge>) {
        self.registry.register(self.config.bridge_name.clone(), bridge).await;
    }
}
