use std::sync::Arc;

use serde::{Deserialize, Serialize};

use crate::relay::DeliveryRelay;
use crate::types::{now_millis, MessageRecord};

/// Broadcast action announcing newly received SMS.
pub const SMS_RECEIVED_ACTION: &str = "android.provider.Telephony.SMS_RECEIVED";

/// One message extracted from a received broadcast.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct IncomingSms {
    pub originating_address: Option<String>,
    pub body: Option<String>,
}

impl IncomingSms {
    pub fn new(originating_address: impl Into<String>, body: impl Into<String>) -> Self {
        Self {
            originating_address: Some(originating_address.into()),
            body: Some(body.into()),
        }
    }
}

/// A system broadcast as delivered to the receiver.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Broadcast {
    pub action: String,
    pub messages: Vec<IncomingSms>,
}

impl Broadcast {
    pub fn sms_received(messages: Vec<IncomingSms>) -> Self {
        Self {
            action: SMS_RECEIVED_ACTION.to_string(),
            messages,
        }
    }
}

/// Push path: turns SMS broadcasts into relayed records.
pub struct SmsReceiver {
    relay: Arc<DeliveryRelay>,
}

impl SmsReceiver {
    pub fn new(relay: Arc<DeliveryRelay>) -> Self {
        Self { relay }
    }

    /// Handle a broadcast. Returns how many messages were relayed.
    ///
    /// Broadcast messages carry no store identifier; their source
    /// timestamp is the wall clock at receipt.
    pub async fn on_receive(&self, broadcast: &Broadcast) -> usize {
        tracing::debug!(action = %broadcast.action, "broadcast received");

        if broadcast.action != SMS_RECEIVED_ACTION {
            tracing::warn!(action = %broadcast.action, "ignoring unexpected broadcast");
            self.relay
                .debug_log(format!("Received broadcast with action: {}", broadcast.action))
                .await;
            return 0;
        }

        self.relay
            .debug_log(format!("Found {} messages", broadcast.messages.len()))
            .await;

        for sms in &broadcast.messages {
            let record = MessageRecord::new(
                sms.originating_address.as_deref(),
                sms.body.as_deref(),
                now_millis() as i64,
            );
            self.relay.deliver(record).await;
        }

        broadcast.messages.len()
    }
}
