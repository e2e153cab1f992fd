use std::time::{Duration, SystemTime, UNIX_EPOCH};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::bridge::Bridge;
use crate::error::BridgeError;
use crate::signing::sign_call;
use crate::types::MethodResponse;

/// Body posted for every call.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BridgeCall {
    pub method: String,
    pub args: Value,
}

/// Bridge to a consumer listening on HTTP.
///
/// Calls are POSTed as JSON. 2xx is success (the response body, if JSON,
/// becomes the result), 501 means the method is not implemented, any other
/// status is a remote error.
pub struct HttpBridge {
    client: reqwest::Client,
    url: String,
    timeout: Duration,
    secret: Option<Vec<u8>>,
}

impl HttpBridge {
    pub fn new(url: impl Into<String>) -> Self {
        Self {
            client: reqwest::Client::new(),
            url: url.into(),
            timeout: Duration::from_secs(5),
            secret: None,
        }
    }

    pub fn with_timeout(mut self, timeout: Duration) -> Self {
        self.timeout = timeout;
        self
    }

    /// Sign every call with HMAC-SHA256; see [`crate::signing`].
    pub fn with_secret(mut self, secret: impl Into<Vec<u8>>) -> Self {
        self.secret = Some(secret.into());
        self
    }
}

#[async_trait]
impl Bridge for HttpBridge {
    async fn invoke(&self, method: &str, args: Value) -> Result<MethodResponse, BridgeError> {
        let body = serde_json::to_vec(&BridgeCall {
            method: method.to_string(),
            args,
        })
        .map_err(|err| BridgeError::Transport(err.to_string()))?;

        let mut request = self.client
            .post(&self.url)
            .timeout(self.timeout)
            .header("Content-Type", "application/json");

        if let Some(secret) = &self.secret {
            let now = SystemTime::now()
                .duration_since(UNIX_EPOCH)
                .unwrap_or_default()
                .as_secs();
            for (name, value) in sign_call(secret, method, &body, now).headers() {
                request = request.header(name, value);
            }
        }

        let response = request.body(body).send().await.map_err(|err| {
            if err.is_timeout() {
                BridgeError::Transport("request timed out".to_string())
            } else if err.is_connect() {
                BridgeError::Detached
            } else {
                BridgeError::Transport(err.to_string())
            }
        })?;

        let status = response.status();
        if status.as_u16() == 501 {
            return Ok(MethodResponse::NotImplemented);
        }

        let text = response
            .text()
            .await
            .map_err(|err| BridgeError::Transport(err.to_string()))?;

        if status.is_success() {
            let value = serde_json::from_str(&text).unwrap_or(Value::String(text));
            Ok(MethodResponse::Success(value))
        } else {
            Err(BridgeError::Remote {
                code: status.as_u16().to_string(),
                message: text,
            })
        }
    }
}
