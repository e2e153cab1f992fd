//! HMAC-SHA256 signatures for bridge calls sent over HTTP.
//!
//! A signature covers `"<timestamp>.<method>."` followed by the request
//! body. The method travels in its own header and must match the method
//! named in the body, so a captured call cannot be replayed later or under
//! another method. Signatures are hex-encoded.

use hmac::{Hmac, Mac};
use sha2::Sha256;

use crate::bridge_http::BridgeCall;

pub const SIGNATURE_HEADER: &str = "X-Relay-Signature";
pub const TIMESTAMP_HEADER: &str = "X-Relay-Timestamp";
pub const METHOD_HEADER: &str = "X-Relay-Method";

type HmacSha256 = Hmac<Sha256>;

/// Header values attached to one signed call.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CallSignature {
    pub timestamp: u64,
    pub method: String,
    pub signature: String,
}

impl CallSignature {
    pub fn headers(&self) -> [(&'static str, String); 3] {
        [
            (SIGNATURE_HEADER, self.signature.clone()),
            (TIMESTAMP_HEADER, self.timestamp.to_string()),
            (METHOD_HEADER, self.method.clone()),
        ]
    }
}

fn keyed(secret: &[u8], timestamp: &str, method: &str, body: &[u8]) -> Option<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret).ok()?;
    mac.update(timestamp.as_bytes());
    mac.update(b".");
    mac.update(method.as_bytes());
    mac.update(b".");
    mac.update(body);
    Some(mac)
}

/// Sign the call `method` whose serialized form is `body`.
pub fn sign_call(secret: &[u8], method: &str, body: &[u8], timestamp: u64) -> CallSignature {
    let signature = keyed(secret, &timestamp.to_string(), method, body)
        .map(|mac| hex::encode(mac.finalize().into_bytes()))
        .unwrap_or_default();
    CallSignature {
        timestamp,
        method: method.to_string(),
        signature,
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum VerificationError {
    MissingHeader(&'static str),
    InvalidTimestamp,
    StaleTimestamp,
    InvalidSignature,
    MalformedBody(String),
    MethodMismatch { header: String, body: String },
}

impl std::fmt::Display for VerificationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            VerificationError::MissingHeader(name) => write!(f, "header {} missing", name),
            VerificationError::InvalidTimestamp => write!(f, "timestamp is not a number"),
            VerificationError::StaleTimestamp => write!(f, "timestamp outside allowed window"),
            VerificationError::InvalidSignature => write!(f, "signature mismatch"),
            VerificationError::MalformedBody(err) => write!(f, "call body is not a bridge call: {}", err),
            VerificationError::MethodMismatch { header, body } => {
                write!(f, "method header {} does not match body method {}", header, body)
            }
        }
    }
}

impl std::error::Error for VerificationError {}

/// Verify a signed bridge call on the consumer side and decode it.
///
/// Header names are matched case-insensitively. The timestamp may differ
/// from `now_secs` by at most `max_age_secs` in either direction.
pub fn verify_bridge_call<'a, I>(
    headers: I,
    body: &[u8],
    secret: &[u8],
    max_age_secs: u64,
    now_secs: u64,
) -> Result<BridgeCall, VerificationError>
where
    I: IntoIterator<Item = (&'a str, &'a str)>,
{
    let (mut signature, mut timestamp, mut method) = (None, None, None);
    for (name, value) in headers {
        if name.eq_ignore_ascii_case(SIGNATURE_HEADER) {
            signature = Some(value);
        } else if name.eq_ignore_ascii_case(TIMESTAMP_HEADER) {
            timestamp = Some(value);
        } else if name.eq_ignore_ascii_case(METHOD_HEADER) {
            method = Some(value);
        }
    }

    let signature = signature.ok_or(VerificationError::MissingHeader(SIGNATURE_HEADER))?;
    let timestamp_str = timestamp.ok_or(VerificationError::MissingHeader(TIMESTAMP_HEADER))?;
    let method = method.ok_or(VerificationError::MissingHeader(METHOD_HEADER))?;

    let timestamp = timestamp_str
        .parse::<u64>()
        .map_err(|_| VerificationError::InvalidTimestamp)?;
    if now_secs.abs_diff(timestamp) > max_age_secs {
        return Err(VerificationError::StaleTimestamp);
    }

    let expected = hex::decode(signature).map_err(|_| VerificationError::InvalidSignature)?;
    let mac = keyed(secret, timestamp_str, method, body).ok_or(VerificationError::InvalidSignature)?;
    mac.verify_slice(&expected)
        .map_err(|_| VerificationError::InvalidSignature)?;

    let call: BridgeCall =
        serde_json::from_slice(body).map_err(|err| VerificationError::MalformedBody(err.to_string()))?;
    if call.method != method {
        return Err(VerificationError::MethodMismatch {
            header: method.to_string(),
            body: call.method,
        });
    }
    Ok(call)
}
