//! Verification of signed payment-provider webhook deliveries.
//!
//! The signature header has the form `t=<unix seconds>,v1=<hex>[,v1=<hex>...]`
//! where each `v1` is HMAC-SHA256 over `"<t>.<raw body>"` keyed by the
//! endpoint secret. Several `v1` entries appear while a secret is rotated.

use chrono::Utc;
use hmac::{Hmac, Mac};
use serde::Deserialize;
use serde_json::Value;
use sha2::Sha256;

use crate::{CoreError, CoreResult};

type HmacSha256 = Hmac<Sha256>;

pub const SIGNATURE_HEADER: &str = "stripe-signature";
pub const CHECKOUT_COMPLETED: &str = "checkout.session.completed";
pub const DEFAULT_TOLERANCE_SECONDS: i64 = 300;

#[derive(Debug, Clone, Deserialize)]
pub struct WebhookEvent {
    pub id: String,
    #[serde(rename = "type")]
    pub event_type: String,
    pub data: EventData,
}

#[derive(Debug, Clone, Deserialize)]
pub struct EventData {
    pub object: Value,
}

#[derive(Debug, Clone, Deserialize)]
pub struct CustomerDetails {
    #[serde(default)]
    pub email: Option<String>,
}

/// The session object carried by a `checkout.session.completed` event.
#[derive(Debug, Clone, Deserialize)]
pub struct CompletedCheckout {
    pub id: String,
    #[serde(default)]
    pub client_reference_id: Option<String>,
    #[serde(default)]
    pub customer_email: Option<String>,
    #[serde(default)]
    pub customer_details: Option<CustomerDetails>,
    /// Minor currency units.
    #[serde(default)]
    pub amount_total: Option<i64>,
}

impl CompletedCheckout {
    /// `customer_email` is what we set on the session; newer payloads also
    /// carry the address the payer typed in.
    pub fn purchaser_email(&self) -> Option<&str> {
        self.customer_email
            .as_deref()
            .or_else(|| self.customer_details.as_ref().and_then(|d| d.email.as_deref()))
    }
}

impl WebhookEvent {
    /// `None` for every event type other than a completed checkout.
    pub fn completed_checkout(&self) -> CoreResult<Option<CompletedCheckout>> {
        if self.event_type != CHECKOUT_COMPLETED {
            return Ok(None);
        }
        serde_json::from_value(self.data.object.clone())
            .map(Some)
            .map_err(|e| CoreError::validation(format!("Malformed checkout session in event {}: {}", self.id, e)))
    }
}

pub struct WebhookVerifier {
    secret: String,
    tolerance_seconds: i64,
}

impl WebhookVerifier {
    pub fn new(secret: impl Into<String>, tolerance_seconds: i64) -> Self {
        Self {
            secret: secret.into(),
            tolerance_seconds,
        }
    }

    pub fn verify(&self, payload: &[u8], header: Option<&str>) -> CoreResult<WebhookEvent> {
        self.verify_at(payload, header, Utc::now().timestamp())
    }

    pub fn verify_at(&self, payload: &[u8], header: Option<&str>, now: i64) -> CoreResult<WebhookEvent> {
        let header = header.ok_or_else(|| invalid("Missing signature header"))?;
        let (timestamp, signatures) = parse_header(header)?;

        // `t` comes from the caller; an extreme value must not overflow.
        let age = now.checked_sub(timestamp).map(i64::unsigned_abs);
        if !matches!(age, Some(age) if age <= self.tolerance_seconds.unsigned_abs()) {
            return Err(invalid("Timestamp outside the tolerance zone"));
        }

        let mac = signing_mac(&self.secret, timestamp, payload)?;
        let matched = signatures.iter().any(|candidate| {
            hex::decode(candidate)
                .map(|bytes| mac.clone().verify_slice(&bytes).is_ok())
                .unwrap_or(false)
        });
        if !matched {
            tracing::warn!("Webhook signature mismatch for timestamp {}", timestamp);
            return Err(invalid("No signatures found matching the expected signature for payload"));
        }

        serde_json::from_slice(payload).map_err(|e| invalid(&format!("Invalid event payload: {}", e)))
    }
}

/// Hex HMAC for `timestamp` and `payload`, as the provider computes it.
pub fn compute_signature(secret: &str, timestamp: i64, payload: &[u8]) -> CoreResult<String> {
    let mac = signing_mac(secret, timestamp, payload)?;
    Ok(hex::encode(mac.finalize().into_bytes()))
}

/// Full header value for a single `v1` signature.
pub fn signature_header(secret: &str, timestamp: i64, payload: &[u8]) -> CoreResult<String> {
    Ok(format!("t={},v1={}", timestamp, compute_signature(secret, timestamp, payload)?))
}

fn signing_mac(secret: &str, timestamp: i64, payload: &[u8]) -> CoreResult<HmacSha256> {
    let mut mac = HmacSha256::new_from_slice(secret.as_bytes())
        .map_err(|e| CoreError::InternalError(format!("Invalid webhook secret: {}", e)))?;
    mac.update(timestamp.to_string().as_bytes());
    mac.update(b".");
    mac.update(payload);
    Ok(mac)
}

fn parse_header(header: &str) -> CoreResult<(i64, Vec<&str>)> {
    let mut timestamp = None;
    let mut signatures = Vec::new();

    for part in header.split(',') {
        match part.trim().split_once('=') {
            Some(("t", value)) => {
                timestamp = Some(value.parse::<i64>().map_err(|_| invalid("Malformed timestamp in signature header"))?);
            }
            Some(("v1", value)) => signatures.push(value),
            _ => {}
        }
    }

    let timestamp = timestamp.ok_or_else(|| invalid("No timestamp found in signature header"))?;
    if signatures.is_empty() {
        return Err(invalid("No v1 signature found in signature header"));
    }
    Ok((timestamp, signatures))
}

fn invalid(reason: &str) -> CoreError {
    CoreError::SignatureInvalid(reason.to_string())
}
