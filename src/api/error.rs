//! JSON envelope shared by every endpoint, and the error-to-status mapping.

use axum::{http::StatusCode, response::{IntoResponse, Response}, Json};
use serde::Serialize;
use tracing::error;
use crate::gateway::GatewayError;
use crate::SettlementError;

#[derive(Debug, Serialize)]
pub struct ApiResponse<T> {
    pub success: bool,
    pub message: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub code: Option<&'static str>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub data: Option<T>,
}

impl<T> ApiResponse<T> {
    pub fn ok(message: impl Into<String>, data: T) -> Self {
        Self { success: true, message: message.into(), code: None, data: Some(data) }
    }
}

impl SettlementError {
    pub fn status_code(&self) -> StatusCode {
        match self {
            Self::EmptyCart
            | Self::InvalidAddress
            | Self::InvalidCoupon(_)
            | Self::NegativeOrderTotal { .. }
            | Self::ShippingUnavailable { .. }
            | Self::Validation(_)
            | Self::PaymentMismatch { .. }
            | Self::Money(_) => StatusCode::BAD_REQUEST,
            Self::Unauthenticated => StatusCode::UNAUTHORIZED,
            Self::Forbidden => StatusCode::FORBIDDEN,
            Self::OrderNotFound(_) | Self::OrderGroupNotFound(_) | Self::OrderItemNotFound(_) => StatusCode::NOT_FOUND,
            Self::InsufficientStock { .. }
            | Self::SizeNotFound(_)
            | Self::InvalidTransition { .. }
            | Self::PaymentNotFinal(_)
            | Self::PaymentAlreadyFinalized { .. }
            | Self::DuplicatePayment { .. } => StatusCode::CONFLICT,
            Self::Gateway(GatewayError::Timeout) => StatusCode::GATEWAY_TIMEOUT,
            Self::Gateway(GatewayError::NotConfigured(_)) => StatusCode::SERVICE_UNAVAILABLE,
            Self::Gateway(_) => StatusCode::BAD_GATEWAY,
            Self::Storage(_) => StatusCode::INTERNAL_SERVER_ERROR,
        }
    }
}

impl IntoResponse for SettlementError {
    fn into_response(self) -> Response {
        let status = self.status_code();
        let message = match &self {
            Self::Storage(detail) => {
                error!(%detail, "storage failure");
                "Internal error".to_string()
            }
            other => other.to_string(),
        };
        let body = ApiResponse::<()> { success: false, message, code: Some(self.code()), data: None };
        (status, Json(body)).into_response()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use uuid::Uuid;

    #[test]
    fn test_status_mapping() {
        assert_eq!(SettlementError::EmptyCart.status_code(), StatusCode::BAD_REQUEST);
        assert_eq!(SettlementError::InsufficientStock { size_id: Uuid::nil(), requested: 2, available: 0 }.status_code(), StatusCode::CONFLICT);
        assert_eq!(SettlementError::Gateway(GatewayError::Timeout).status_code(), StatusCode::GATEWAY_TIMEOUT);
        assert_eq!(SettlementError::OrderNotFound(Uuid::nil()).status_code(), StatusCode::NOT_FOUND);
        assert_eq!(SettlementError::DuplicatePayment { gateway_payment_id: "pi_1".into() }.status_code(), StatusCode::CONFLICT);
    }
}
