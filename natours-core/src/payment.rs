use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use serde_json::{Map, Value};
use std::sync::Mutex;
use uuid::Uuid;

use crate::{CoreError, CoreResult};

#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct LineItem {
    pub name: String,
    pub description: String,
    pub images: Vec<String>,
    /// Minor currency units (cents).
    pub unit_amount: i64,
    pub currency: String,
    pub quantity: u32,
}

/// Everything the provider needs to open a hosted checkout page.
#[derive(Debug, Clone, Serialize, PartialEq)]
pub struct CheckoutSessionRequest {
    pub payment_method_types: Vec<String>,
    pub mode: String,
    pub success_url: String,
    pub cancel_url: String,
    pub customer_email: String,
    /// Echoed back in the completion event; carries the tour id.
    pub client_reference_id: String,
    pub line_items: Vec<LineItem>,
}

/// Provider-issued session. Known fields are typed, the rest is passed
/// through untouched to the client.
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
pub struct CheckoutSession {
    pub id: String,
    #[serde(default)]
    pub url: Option<String>,
    #[serde(flatten)]
    pub extra: Map<String, Value>,
}

#[async_trait]
pub trait PaymentProvider: Send + Sync {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> CoreResult<CheckoutSession>;
}

/// Records requests and answers with a synthetic session.
#[derive(Default)]
pub struct MockPaymentProvider {
    requests: Mutex<Vec<CheckoutSessionRequest>>,
    fail: bool,
}

impl MockPaymentProvider {
    pub fn new() -> Self {
        Self::default()
    }

    /// A provider whose every call fails, for exercising upstream errors.
    pub fn failing() -> Self {
        Self { requests: Mutex::new(Vec::new()), fail: true }
    }

    pub fn requests(&self) -> Vec<CheckoutSessionRequest> {
        self.requests.lock().map(|r| r.clone()).unwrap_or_default()
    }
}

#[async_trait]
impl PaymentProvider for MockPaymentProvider {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> CoreResult<CheckoutSession> {
        if let Ok(mut requests) = self.requests.lock() {
            requests.push(request.clone());
        }

        if self.fail {
            return Err(CoreError::UpstreamError("Simulated payment provider failure".to_string()));
        }

        let id = format!("cs_test_{}", Uuid::new_v4().simple());
        let mut extra = Map::new();
        extra.insert("object".to_string(), Value::from("checkout.session"));
        extra.insert("client_reference_id".to_string(), Value::from(request.client_reference_id.clone()));
        extra.insert("customer_email".to_string(), Value::from(request.customer_email.clone()));
        extra.insert(
            "amount_total".to_string(),
            Value::from(request.line_items.iter().map(|i| i.unit_amount * i64::from(i.quantity)).sum::<i64>()),
        );

        Ok(CheckoutSession {
            url: Some(format!("https://checkout.example.test/pay/{}", id)),
            id,
            extra,
        })
    }
}
