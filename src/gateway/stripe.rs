//! Intent-based gateway over the Stripe REST API.

use async_trait::async_trait;
use serde::Deserialize;
use std::collections::HashMap;
use std::time::Duration;
use tracing::debug;
use uuid::Uuid;
use crate::config::StripeConfig;
use crate::domain::aggregates::StripeConfirmation;
use crate::domain::value_objects::Money;
use crate::gateway::{ensure_success, GatewayError, IntentGateway, PaymentIntent};

pub struct StripeClient {
    http: reqwest::Client,
    api_base: String,
    secret_key: String,
}

impl std::fmt::Debug for StripeClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("StripeClient")
            .field("api_base", &self.api_base)
            .field("secret_key", &"[REDACTED]")
            .finish()
    }
}

#[derive(Debug, Deserialize)]
struct IntentResponse {
    id: String,
    status: String,
    amount: i64,
    currency: String,
    client_secret: Option<String>,
    #[serde(default)]
    metadata: HashMap<String, String>,
}

impl StripeClient {
    pub fn new(config: &StripeConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self { http, api_base: config.api_base.trim_end_matches('/').to_string(), secret_key: config.secret_key.clone() })
    }
}

#[async_trait]
impl IntentGateway for StripeClient {
    async fn create_payment_intent(&self, amount: Money, currency: &str, order_id: Uuid) -> Result<PaymentIntent, GatewayError> {
        let form = [
            ("amount", amount.minor().to_string()),
            ("currency", currency.to_ascii_lowercase()),
            ("metadata[order_id]", order_id.to_string()),
            ("automatic_payment_methods[enabled]", "true".to_string()),
        ];
        debug!(%order_id, amount = amount.minor(), "creating payment intent");
        let response = self.http.post(format!("{}/v1/payment_intents", self.api_base))
            .bearer_auth(&self.secret_key)
            .header("Idempotency-Key", format!("intent-{}", order_id))
            .form(&form)
            .send().await?;
        let intent: IntentResponse = ensure_success(response).await?.json().await?;
        let client_secret = intent.client_secret
            .ok_or_else(|| GatewayError::MalformedResponse("payment intent without client_secret".into()))?;
        Ok(PaymentIntent { id: intent.id, client_secret })
    }

    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<StripeConfirmation, GatewayError> {
        let response = self.http.get(format!("{}/v1/payment_intents/{}", self.api_base, intent_id))
            .bearer_auth(&self.secret_key)
            .send().await?;
        let mut intent: IntentResponse = ensure_success(response).await?.json().await?;
        Ok(StripeConfirmation {
            order_reference: intent.metadata.remove("order_id"),
            id: intent.id, status: intent.status, amount: intent.amount, currency: intent.currency,
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_intent_metadata_carries_order_reference() {
        let json = serde_json::json!({
            "id": "pi_3MtwBwLkdIwHu7ix28a3tqPa", "status": "succeeded", "amount": 2000, "currency": "usd",
            "client_secret": null, "metadata": { "order_id": "0190c2a4-7c1e-7000-8000-000000000001" }
        });
        let mut intent: IntentResponse = serde_json::from_value(json).unwrap();
        assert_eq!(intent.metadata.remove("order_id").as_deref(), Some("0190c2a4-7c1e-7000-8000-000000000001"));

        let bare: IntentResponse = serde_json::from_value(serde_json::json!({
            "id": "pi_1", "status": "processing", "amount": 10, "currency": "usd"
        })).unwrap();
        assert!(bare.metadata.is_empty());
    }
}
