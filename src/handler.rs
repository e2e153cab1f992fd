use std::sync::Arc;

use serde_json::Value;

use crate::bridge::{METHOD_ON_SMS_RECEIVED, METHOD_TEST};
use crate::relay::DeliveryRelay;
use crate::service::{ServiceCommand, ServiceControl};
use crate::types::{MessageRecord, MethodResponse};

/// Inbound calls made by the consumer over the bridge.
///
/// Every method is a thin action; unknown methods answer
/// [`MethodResponse::NotImplemented`] so the consumer can probe support.
pub struct MethodCallHandler {
    service: Arc<dyn ServiceControl>,
    relay: Arc<DeliveryRelay>,
}

impl MethodCallHandler {
    pub fn new(service: Arc<dyn ServiceControl>, relay: Arc<DeliveryRelay>) -> Self {
        Self { service, relay }
    }

    pub async fn handle(&self, method: &str, args: Value) -> MethodResponse {
        tracing::debug!(method, "method called");

        match method {
            METHOD_TEST => MethodResponse::success("Test successful"),
            METHOD_ON_SMS_RECEIVED => MethodResponse::success("SMS received"),
            "startService" => match self.service.start_service().await {
                Ok(()) => MethodResponse::success("Service started"),
                Err(err) => MethodResponse::error("SERVICE", err.to_string()),
            },
            "stopService" => match self.service.stop_service().await {
                Ok(()) => MethodResponse::success("Service stopped"),
                Err(err) => MethodResponse::error("SERVICE", err.to_string()),
            },
            "isServiceRunning" => MethodResponse::success(self.service.is_running()),
            "checkSms" => self.forward(ServiceCommand::CheckSms).await,
            "checkAllRecentSms" => self.forward(ServiceCommand::CheckAllRecentSms).await,
            "testCommunication" => self.forward(ServiceCommand::TestCommunication).await,
            "log" => {
                let text = match &args {
                    Value::String(text) => text.clone(),
                    other => other.to_string(),
                };
                self.relay.debug_log(text).await;
                MethodResponse::success(Value::Null)
            }
            "getMessages" => self.messages().await,
            _ => {
                tracing::warn!(method, "unknown method");
                MethodResponse::NotImplemented
            }
        }
    }

    async fn forward(&self, command: ServiceCommand) -> MethodResponse {
        match self.service.send(command).await {
            Ok(()) => MethodResponse::success(Value::Null),
            Err(err) => MethodResponse::error("SERVICE", err.to_string()),
        }
    }

    async fn messages(&self) -> MethodResponse {
        match self.relay.message_log().read_all().await {
            Ok(mut records) => {
                records.sort_by_key(|r| r.received_at);
                let values: Vec<Value> = records.iter().map(MessageRecord::to_args).collect();
                MethodResponse::success(values)
            }
            Err(err) => MethodResponse::error("STORE", err.to_string()),
        }
    }
}
