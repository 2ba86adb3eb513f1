//! Marketplace order settlement
//!
//! Turns a multi-seller cart into one order with a group per seller, and
//! reconciles payment gateway confirmations with inventory exactly once.
//!
//! ## Features
//! - Per-seller shipping fees (ITEM, WEIGHT, FIXED) and coupon discounts
//! - Transactional order placement with authoritative stock checks
//! - Idempotent payment capture for intent-based and capture-based gateways
//! - Seller fulfillment status lifecycles

pub mod api;
pub mod config;
pub mod domain;
pub mod gateway;
pub mod identity;
pub mod publisher;
pub mod settlement;
pub mod store;

use thiserror::Error;
use uuid::Uuid;

pub use domain::aggregates::{CartSnapshot, Order, PaymentStatus};
pub use domain::value_objects::Money;
pub use gateway::GatewayError;

// =============================================================================
// Error Types
// =============================================================================

#[derive(Error, Debug)]
pub enum SettlementError {
    #[error("Cart is empty")]
    EmptyCart,

    #[error("Shipping address does not belong to buyer")]
    InvalidAddress,

    #[error("Insufficient stock for size {size_id}: requested {requested}, available {available}")]
    InsufficientStock { size_id: Uuid, requested: u64, available: i32 },

    #[error("Invalid coupon: {0}")]
    InvalidCoupon(String),

    #[error("Order group for seller {seller_id} would total below zero")]
    NegativeOrderTotal { seller_id: Uuid },

    #[error("Seller {seller_id} does not ship to {country}")]
    ShippingUnavailable { seller_id: Uuid, country: String },

    #[error("Order {0} not found")]
    OrderNotFound(Uuid),

    #[error("Order group {0} not found")]
    OrderGroupNotFound(Uuid),

    #[error("Order item {0} not found")]
    OrderItemNotFound(Uuid),

    #[error("Size {0} not found")]
    SizeNotFound(Uuid),

    #[error("Authentication required")]
    Unauthenticated,

    #[error("Not allowed")]
    Forbidden,

    #[error("Cannot move from {from} to {to}")]
    InvalidTransition { from: String, to: String },

    #[error("Payment is not final yet: {0}")]
    PaymentNotFinal(String),

    #[error("Payment for order {order_id} already settled as {status}")]
    PaymentAlreadyFinalized { order_id: Uuid, status: PaymentStatus },

    #[error("Payment does not match order {order_id}: {reason}")]
    PaymentMismatch { order_id: Uuid, reason: domain::aggregates::ConfirmationMismatch },

    #[error("Payment {gateway_payment_id} already settles another order")]
    DuplicatePayment { gateway_payment_id: String },

    #[error("Invalid request: {0}")]
    Validation(String),

    #[error("Gateway error: {0}")]
    Gateway(#[from] GatewayError),

    #[error("Amount error: {0}")]
    Money(#[from] domain::value_objects::MoneyError),

    #[error("Storage error: {0}")]
    Storage(String),
}

impl SettlementError {
    /// Stable machine-readable kind for API responses.
    pub fn code(&self) -> &'static str {
        match self {
            Self::EmptyCart => "EMPTY_CART",
            Self::InvalidAddress => "INVALID_ADDRESS",
            Self::InsufficientStock { .. } => "INSUFFICIENT_STOCK",
            Self::InvalidCoupon(_) => "INVALID_COUPON",
            Self::NegativeOrderTotal { .. } => "NEGATIVE_ORDER_TOTAL",
            Self::ShippingUnavailable { .. } => "SHIPPING_UNAVAILABLE",
            Self::OrderNotFound(_) => "ORDER_NOT_FOUND",
            Self::OrderGroupNotFound(_) => "ORDER_GROUP_NOT_FOUND",
            Self::OrderItemNotFound(_) => "ORDER_ITEM_NOT_FOUND",
            Self::SizeNotFound(_) => "SIZE_NOT_FOUND",
            Self::Unauthenticated => "UNAUTHENTICATED",
            Self::Forbidden => "FORBIDDEN",
            Self::InvalidTransition { .. } => "INVALID_TRANSITION",
            Self::PaymentNotFinal(_) => "PAYMENT_NOT_FINAL",
            Self::PaymentAlreadyFinalized { .. } => "PAYMENT_ALREADY_FINALIZED",
            Self::PaymentMismatch { .. } => "PAYMENT_MISMATCH",
            Self::DuplicatePayment { .. } => "DUPLICATE_PAYMENT",
            Self::Validation(_) => "VALIDATION",
            Self::Gateway(_) => "GATEWAY",
            Self::Money(_) => "AMOUNT",
            Self::Storage(_) => "STORAGE",
        }
    }
}

impl From<sqlx::Error> for SettlementError {
    fn from(e: sqlx::Error) -> Self { Self::Storage(e.to_string()) }
}

impl From<domain::aggregates::OrderError> for SettlementError {
    fn from(e: domain::aggregates::OrderError) -> Self {
        match e {
            domain::aggregates::OrderError::NoGroups => Self::EmptyCart,
            domain::aggregates::OrderError::Money(m) => Self::Money(m),
        }
    }
}

impl From<domain::aggregates::ConfirmationError> for SettlementError {
    fn from(e: domain::aggregates::ConfirmationError) -> Self {
        match e {
            domain::aggregates::ConfirmationError::NotFinal(s) => Self::PaymentNotFinal(s),
            domain::aggregates::ConfirmationError::Malformed(s) => Self::Gateway(GatewayError::MalformedResponse(s)),
            domain::aggregates::ConfirmationError::Money(m) => Self::Money(m),
        }
    }
}

impl From<domain::aggregates::StockShortage> for SettlementError {
    fn from(s: domain::aggregates::StockShortage) -> Self {
        Self::InsufficientStock { size_id: s.size_id, requested: s.requested, available: s.available }
    }
}

impl From<validator::ValidationErrors> for SettlementError {
    fn from(e: validator::ValidationErrors) -> Self { Self::Validation(e.to_string()) }
}

pub type Result<T> = std::result::Result<T, SettlementError>;
