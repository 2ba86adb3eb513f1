//! Capture-based gateway over the PayPal Orders v2 API.
//!
//! Every call needs a bearer token obtained with the client credentials grant.
//! Tokens are cached until shortly before they expire.

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::time::{Duration, Instant};
use tokio::sync::Mutex;
use tracing::{debug, warn};
use uuid::Uuid;
use crate::config::PaypalConfig;
use crate::domain::aggregates::{PaypalAmount, PaypalConfirmation};
use crate::domain::value_objects::Money;
use crate::gateway::{ensure_success, CaptureGateway, GatewayError, GatewayOrder};

#[derive(Debug, Deserialize)]
struct TokenResponse {
    access_token: String,
    expires_in: Option<u64>,
}

#[derive(Debug, Clone)]
struct CachedToken {
    access_token: String,
    obtained_at: Instant,
    expires_in: Option<u64>,
}

impl CachedToken {
    /// Expired, with a 30 second buffer.
    fn is_expired(&self) -> bool {
        match self.expires_in {
            Some(expires_in) => self.obtained_at.elapsed() + Duration::from_secs(30) > Duration::from_secs(expires_in),
            None => false,
        }
    }
}

#[derive(Serialize)]
struct CreateOrderRequest<'a> {
    intent: &'static str,
    purchase_units: [PurchaseUnitRequest<'a>; 1],
}

#[derive(Serialize)]
struct PurchaseUnitRequest<'a> {
    reference_id: String,
    amount: AmountRequest<'a>,
}

#[derive(Serialize)]
struct AmountRequest<'a> {
    currency_code: &'a str,
    value: String,
}

#[derive(Debug, Deserialize)]
struct OrderResponse {
    id: String,
}

#[derive(Debug, Deserialize)]
struct CaptureResponse {
    id: String,
    status: String,
    #[serde(default)]
    purchase_units: Vec<PurchaseUnit>,
}

#[derive(Debug, Deserialize)]
struct PurchaseUnit {
    reference_id: Option<String>,
    payments: Option<Payments>,
}

#[derive(Debug, Deserialize)]
struct Payments {
    #[serde(default)]
    captures: Vec<Capture>,
}

#[derive(Debug, Deserialize)]
struct Capture {
    status: Option<String>,
    amount: PaypalAmount,
}

impl CaptureResponse {
    /// Orders are created with a single purchase unit; only the first is read.
    fn into_confirmation(self) -> PaypalConfirmation {
        let unit = self.purchase_units.into_iter().next();
        let reference_id = unit.as_ref().and_then(|u| u.reference_id.clone());
        let capture = unit.and_then(|u| u.payments).and_then(|p| p.captures.into_iter().next());
        let (amount, capture_status) = match capture {
            Some(c) => (Some(c.amount), c.status),
            None => (None, None),
        };
        PaypalConfirmation { id: self.id, status: self.status, amount, reference_id, capture_status }
    }
}

pub struct PaypalClient {
    http: reqwest::Client,
    api_base: String,
    client_id: String,
    client_secret: String,
    token: Mutex<Option<CachedToken>>,
}

impl std::fmt::Debug for PaypalClient {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("PaypalClient")
            .field("api_base", &self.api_base)
            .field("client_id", &self.client_id)
            .field("client_secret", &"[REDACTED]")
            .finish()
    }
}

impl PaypalClient {
    pub fn new(config: &PaypalConfig, timeout: Duration) -> Result<Self, GatewayError> {
        let http = reqwest::Client::builder().timeout(timeout).build()?;
        Ok(Self {
            http,
            api_base: config.api_base.trim_end_matches('/').to_string(),
            client_id: config.client_id.clone(),
            client_secret: config.client_secret.clone(),
            token: Mutex::new(None),
        })
    }

    async fn access_token(&self) -> Result<String, GatewayError> {
        let mut cached = self.token.lock().await;
        if let Some(token) = cached.as_ref().filter(|t| !t.is_expired()) {
            return Ok(token.access_token.clone());
        }

        debug!("fetching paypal access token");
        let response = self.http.post(format!("{}/v1/oauth2/token", self.api_base))
            .basic_auth(&self.client_id, Some(&self.client_secret))
            .form(&[("grant_type", "client_credentials")])
            .send().await?;
        let token: TokenResponse = match ensure_success(response).await {
            Ok(r) => r.json().await?,
            Err(e) => {
                warn!(error = %e, "paypal token request failed");
                return Err(e);
            }
        };
        let access_token = token.access_token.clone();
        *cached = Some(CachedToken { access_token: token.access_token, obtained_at: Instant::now(), expires_in: token.expires_in });
        Ok(access_token)
    }
}

#[async_trait]
impl CaptureGateway for PaypalClient {
    async fn create_order(&self, amount: Money, currency: &str, order_id: Uuid) -> Result<GatewayOrder, GatewayError> {
        let token = self.access_token().await?;
        let body = CreateOrderRequest {
            intent: "CAPTURE",
            purchase_units: [PurchaseUnitRequest {
                reference_id: order_id.to_string(),
                amount: AmountRequest { currency_code: currency, value: amount.to_major().to_string() },
            }],
        };
        let response = self.http.post(format!("{}/v2/checkout/orders", self.api_base))
            .bearer_auth(token)
            .header("PayPal-Request-Id", format!("order-{}", order_id))
            .json(&body)
            .send().await?;
        let order: OrderResponse = ensure_success(response).await?.json().await?;
        Ok(GatewayOrder { id: order.id })
    }

    async fn capture_order(&self, gateway_order_id: &str) -> Result<PaypalConfirmation, GatewayError> {
        let token = self.access_token().await?;
        let response = self.http.post(format!("{}/v2/checkout/orders/{}/capture", self.api_base, gateway_order_id))
            .bearer_auth(token)
            .header("PayPal-Request-Id", format!("capture-{}", gateway_order_id))
            .header(reqwest::header::CONTENT_TYPE, "application/json")
            .send().await?;
        let capture: CaptureResponse = ensure_success(response).await?.json().await?;
        Ok(capture.into_confirmation())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_capture_response_takes_first_capture_amount() {
        let json = serde_json::json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "0190c2a4-7c1e-7000-8000-000000000001",
                "payments": { "captures": [
                    { "id": "3C679366HH908993F", "status": "COMPLETED", "amount": { "currency_code": "USD", "value": "100.00" } }
                ]}
            }]
        });
        let parsed: CaptureResponse = serde_json::from_value(json).unwrap();
        let confirmation = parsed.into_confirmation();
        assert_eq!(confirmation.status, "COMPLETED");
        assert_eq!(confirmation.reference_id.as_deref(), Some("0190c2a4-7c1e-7000-8000-000000000001"));
        assert_eq!(confirmation.capture_status.as_deref(), Some("COMPLETED"));
        assert_eq!(confirmation.amount.unwrap().value, "100.00");
    }

    #[test]
    fn test_declined_capture_without_payments() {
        let json = serde_json::json!({ "id": "X", "status": "DECLINED" });
        let parsed: CaptureResponse = serde_json::from_value(json).unwrap();
        let confirmation = parsed.into_confirmation();
        assert!(confirmation.amount.is_none());
        assert!(confirmation.reference_id.is_none());
    }

    #[test]
    fn test_pending_capture_status_is_kept() {
        let json = serde_json::json!({
            "id": "5O190127TN364715T",
            "status": "COMPLETED",
            "purchase_units": [{
                "reference_id": "0190c2a4-7c1e-7000-8000-000000000001",
                "payments": { "captures": [
                    { "id": "3C679366HH908993F", "status": "PENDING", "amount": { "currency_code": "USD", "value": "100.00" } }
                ]}
            }]
        });
        let parsed: CaptureResponse = serde_json::from_value(json).unwrap();
        assert_eq!(parsed.into_confirmation().capture_status.as_deref(), Some("PENDING"));
    }

    #[test]
    fn test_cached_token_expiry_buffer() {
        let token = CachedToken { access_token: "t".into(), obtained_at: Instant::now(), expires_in: Some(20) };
        assert!(token.is_expired());
        let token = CachedToken { access_token: "t".into(), obtained_at: Instant::now(), expires_in: Some(3600) };
        assert!(!token.is_expired());
    }
}
