//! Stripe Checkout client
//!
//! This module is gated behind the `stripe` feature flag.

use crate::core::error::{Result, ShopError};
use crate::integrations::payment::{
    CheckoutSession, CheckoutSessionRequest, GatewayEvent, PaymentGateway, WebhookVerifier,
    parse_event,
};
use async_trait::async_trait;
use chrono::Utc;
use reqwest::Client;
use serde::Deserialize;

const DEFAULT_API_BASE: &str = "https://api.stripe.com";

/// Configuration for connecting to Stripe
#[derive(Debug, Clone)]
pub struct StripeConfig {
    /// Secret API key (`sk_...`)
    pub api_key: String,
    /// API base URL, overridable for mocks
    pub api_base: String,
}

impl StripeConfig {
    pub fn new(api_key: impl Into<String>) -> Self {
        Self {
            api_key: api_key.into(),
            api_base: DEFAULT_API_BASE.to_string(),
        }
    }
}

/// HTTP client for Stripe Checkout sessions
#[derive(Clone)]
pub struct StripeGateway {
    config: StripeConfig,
    verifier: WebhookVerifier,
    http: Client,
}

impl StripeGateway {
    pub fn new(config: StripeConfig, verifier: WebhookVerifier) -> Self {
        Self {
            config,
            verifier,
            http: Client::new(),
        }
    }
}

/// Form fields of a one-line payment-mode session
fn session_form(request: &CheckoutSessionRequest) -> Vec<(String, String)> {
    let mut form = vec![
        ("mode".to_string(), "payment".to_string()),
        ("line_items[0][quantity]".to_string(), "1".to_string()),
        ("line_items[0][price_data][currency]".to_string(), request.currency.clone()),
        ("line_items[0][price_data][unit_amount]".to_string(), request.amount_minor.to_string()),
        ("line_items[0][price_data][product_data][name]".to_string(), request.buyer_name.clone()),
        ("success_url".to_string(), request.success_url.clone()),
        ("cancel_url".to_string(), request.cancel_url.clone()),
        ("customer_email".to_string(), request.buyer_email.clone()),
        ("client_reference_id".to_string(), request.reference.clone()),
    ];
    for (key, value) in &request.metadata {
        form.push((format!("metadata[{}]", key), value.clone()));
    }
    form
}

#[derive(Debug, Deserialize)]
struct SessionResponse {
    id: String,
    url: Option<String>,
    amount_total: Option<i64>,
    currency: Option<String>,
}

#[async_trait]
impl PaymentGateway for StripeGateway {
    async fn create_checkout_session(
        &self,
        request: CheckoutSessionRequest,
    ) -> Result<CheckoutSession> {
        let url = format!("{}/v1/checkout/sessions", self.config.api_base);

        let response = self
            .http
            .post(&url)
            .bearer_auth(&self.config.api_key)
            .form(&session_form(&request))
            .send()
            .await
            .map_err(|e| ShopError::upstream("stripe", e))?;

        if !response.status().is_success() {
            let status = response.status();
            let text = response.text().await.unwrap_or_default();

            return Err(ShopError::upstream(
                "stripe",
                format!("checkout session request failed with status {status}: {text}"),
            ));
        }

        let parsed: SessionResponse = response
            .json()
            .await
            .map_err(|e| ShopError::upstream("stripe", e))?;

        tracing::info!(
            session = %parsed.id,
            reference = %request.reference,
            "checkout session created"
        );

        Ok(CheckoutSession {
            url: parsed.url.unwrap_or_default(),
            id: parsed.id,
            amount_total: parsed.amount_total.unwrap_or(request.amount_minor),
            currency: parsed.currency.unwrap_or(request.currency),
        })
    }

    fn verify_event(&self, payload: &[u8], signature: &str) -> Result<GatewayEvent> {
        self.verifier.verify(payload, signature, Utc::now().timestamp())?;
        parse_event(payload)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::collections::BTreeMap;

    #[test]
    fn test_session_form_fields() {
        let request = CheckoutSessionRequest {
            amount_minor: 9_900,
            currency: "sar".into(),
            buyer_name: "Sara".into(),
            buyer_email: "sara@example.com".into(),
            success_url: "https://shop.example/orders".into(),
            cancel_url: "https://shop.example/cart".into(),
            reference: "cart-1".into(),
            metadata: BTreeMap::from([("city".to_string(), "Riyadh".to_string())]),
        };

        let form: BTreeMap<_, _> = session_form(&request).into_iter().collect();
        assert_eq!(form["line_items[0][price_data][unit_amount]"], "9900");
        assert_eq!(form["client_reference_id"], "cart-1");
        assert_eq!(form["metadata[city]"], "Riyadh");
        assert_eq!(form["mode"], "payment");
    }
}
