use async_trait::async_trait;
use natours_core::payment::{CheckoutSession, CheckoutSessionRequest, PaymentProvider};
use natours_core::{CoreError, CoreResult};
use serde::Deserialize;
use std::time::Duration;
use tracing::{error, info};

use crate::app_config::PaymentsConfig;

/// Stripe REST client for hosted checkout sessions.
pub struct StripeClient {
    http: reqwest::Client,
    secret_key: String,
    api_base: String,
}

#[derive(Debug, Deserialize)]
struct StripeErrorBody {
    error: StripeErrorDetail,
}

#[derive(Debug, Deserialize)]
struct StripeErrorDetail {
    #[serde(default)]
    message: Option<String>,
    #[serde(rename = "type", default)]
    kind: Option<String>,
}

impl StripeClient {
    pub fn new(config: &PaymentsConfig) -> Result<Self, reqwest::Error> {
        let http = reqwest::Client::builder()
            .timeout(Duration::from_secs(10))
            .build()?;

        Ok(Self {
            http,
            secret_key: config.secret_key.clone(),
            api_base: config.api_base.trim_end_matches('/').to_string(),
        })
    }
}

/// Flattens a session request into Stripe's bracketed form encoding.
fn form_params(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut params = vec![
        ("mode".to_string(), request.mode.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("customer_email".to_string(), request.customer_email.clone()),
        ("client_reference_id".to_string(), request.client_reference_id.clone()),
    ];

    for (i, method) in request.payment_method_types.iter().enumerate() {
        params.push((format!("payment_method_types[{}]", i), method.clone()));
    }

    for (i, item) in request.line_items.iter().enumerate() {
        let prefix = format!("line_items[{}]", i);
        params.push((format!("{}[quantity]", prefix), item.quantity.to_string()));
        params.push((format!("{}[price_data][currency]", prefix), item.currency.clone()));
        params.push((format!("{}[price_data][unit_amount]", prefix), item.unit_amount.to_string()));
        params.push((format!("{}[price_data][product_data][name]", prefix), item.name.clone()));
        params.push((format!("{}[price_data][product_data][description]", prefix), item.description.clone()));
        for (j, image) in item.images.iter().enumerate() {
            params.push((format!("{}[price_data][product_data][images][{}]", prefix, j), image.clone()));
        }
    }

    params
}

#[async_trait]
impl PaymentProvider for StripeClient {
    async fn create_checkout_session(
        &self,
        request: &CheckoutSessionRequest,
    ) -> CoreResult<CheckoutSession> {
        let url = format!("{}/v1/checkout/sessions", self.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.secret_key)
            .form(&form_params(request))
            .send()
            .await
            .map_err(|e| {
                error!("Stripe request failed: {}", e);
                CoreError::UpstreamError(format!("Payment provider unreachable: {}", e))
            })?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            let detail = serde_json::from_str::<StripeErrorBody>(&body)
                .ok()
                .map(|b| {
                    format!(
                        "{}: {}",
                        b.error.kind.unwrap_or_else(|| "api_error".to_string()),
                        b.error.message.unwrap_or_default()
                    )
                })
                .unwrap_or(body);
            error!("Stripe rejected checkout session ({}): {}", status, detail);
            return Err(CoreError::UpstreamError(format!("Payment provider returned {}: {}", status, detail)));
        }

        let session: CheckoutSession = response
            .json()
            .await
            .map_err(|e| CoreError::UpstreamError(format!("Unreadable checkout session: {}", e)))?;

        info!("Created checkout session {} for tour {}", session.id, request.client_reference_id);
        Ok(session)
    }
}
