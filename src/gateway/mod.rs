//! Payment gateway clients.
//!
//! Two shapes are supported: an intent-based gateway where the client confirms
//! and the server later verifies the intent, and a capture-based gateway where
//! the server captures an approved order itself. Both produce a
//! [`GatewayConfirmation`] for the reconciler.

pub mod paypal;
pub mod stripe;

use async_trait::async_trait;
use serde::Serialize;
use std::sync::Arc;
use uuid::Uuid;
use crate::domain::aggregates::{PaypalConfirmation, StripeConfirmation};
use crate::domain::value_objects::Money;

pub use paypal::PaypalClient;
pub use stripe::StripeClient;

#[derive(Debug, thiserror::Error)]
pub enum GatewayError {
    #[error("gateway timed out")]
    Timeout,

    #[error("gateway returned {status}: {body}")]
    Http { status: u16, body: String },

    #[error("transport error: {0}")]
    Transport(String),

    #[error("malformed gateway response: {0}")]
    MalformedResponse(String),

    #[error("{0} gateway is not configured")]
    NotConfigured(&'static str),
}

impl From<reqwest::Error> for GatewayError {
    fn from(e: reqwest::Error) -> Self {
        if e.is_timeout() {
            Self::Timeout
        } else if e.is_decode() {
            Self::MalformedResponse(e.to_string())
        } else {
            Self::Transport(e.to_string())
        }
    }
}

/// Turns a non-2xx response into [`GatewayError::Http`].
pub(crate) async fn ensure_success(response: reqwest::Response) -> Result<reqwest::Response, GatewayError> {
    let status = response.status();
    if status.is_success() {
        return Ok(response);
    }
    let body = response.text().await.unwrap_or_default();
    Err(GatewayError::Http { status: status.as_u16(), body })
}

#[derive(Debug, Clone, Serialize)]
pub struct PaymentIntent {
    pub id: String,
    pub client_secret: String,
}

#[derive(Debug, Clone, Serialize)]
pub struct GatewayOrder {
    pub id: String,
}

#[async_trait]
pub trait IntentGateway: Send + Sync {
    async fn create_payment_intent(&self, amount: Money, currency: &str, order_id: Uuid) -> Result<PaymentIntent, GatewayError>;

    /// Server-side lookup of an intent the client reports as confirmed.
    async fn retrieve_payment_intent(&self, intent_id: &str) -> Result<StripeConfirmation, GatewayError>;
}

#[async_trait]
pub trait CaptureGateway: Send + Sync {
    async fn create_order(&self, amount: Money, currency: &str, order_id: Uuid) -> Result<GatewayOrder, GatewayError>;

    async fn capture_order(&self, gateway_order_id: &str) -> Result<PaypalConfirmation, GatewayError>;
}

/// Configured gateways. A gateway without credentials stays `None`.
#[derive(Clone, Default)]
pub struct Gateways {
    pub stripe: Option<Arc<dyn IntentGateway>>,
    pub paypal: Option<Arc<dyn CaptureGateway>>,
}

impl Gateways {
    pub fn stripe(&self) -> Result<&dyn IntentGateway, GatewayError> {
        self.stripe.as_deref().ok_or(GatewayError::NotConfigured("stripe"))
    }

    pub fn paypal(&self) -> Result<&dyn CaptureGateway, GatewayError> {
        self.paypal.as_deref().ok_or(GatewayError::NotConfigured("paypal"))
    }
}
