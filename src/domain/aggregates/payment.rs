//! Payment records and the capture state machine.
//!
//! Both gateways deliver differently shaped confirmations. They are normalized
//! into one [`PaymentConfirmation`] before anything touches storage, so the
//! transactional capture path exists exactly once.

use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::inventory::InventoryShortfall;
use crate::domain::aggregates::order::PaymentStatus;
use crate::domain::value_objects::{Money, MoneyError};

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum PaymentMethod { Stripe, Paypal }

impl PaymentMethod {
    pub fn as_str(&self) -> &'static str { match self { Self::Stripe => "stripe", Self::Paypal => "paypal" } }
}

impl FromStr for PaymentMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "stripe" => Ok(Self::Stripe),
            "paypal" => Ok(Self::Paypal),
            other => Err(format!("unknown payment method {}", other)),
        }
    }
}

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum PaymentOutcome { Succeeded, Failed }

/// Gateway-neutral confirmation fed into capture.
#[derive(Clone, Debug, PartialEq, Eq, Serialize)]
pub struct PaymentConfirmation {
    pub gateway_payment_id: String,
    /// Raw status string as the gateway reported it.
    pub gateway_status: String,
    pub outcome: PaymentOutcome,
    pub amount: Money,
    pub currency: String,
    pub method: PaymentMethod,
    /// Order id the gateway payment was created for, as echoed back by the gateway.
    pub order_reference: Option<String>,
}

/// Intent-based gateway result, amounts already in minor units.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct StripeConfirmation {
    pub id: String,
    pub status: String,
    pub amount: i64,
    pub currency: String,
    /// `metadata.order_id` stamped on the intent at creation.
    #[serde(default)]
    pub order_reference: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaypalAmount {
    pub currency_code: String,
    /// Major units as a decimal string, e.g. "12.50".
    pub value: String,
}

/// Capture-based gateway result, amount taken from the first capture.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PaypalConfirmation {
    pub id: String,
    /// Order-level status.
    pub status: String,
    pub amount: Option<PaypalAmount>,
    /// `purchase_units[0].reference_id`, set to our order id at creation.
    #[serde(default)]
    pub reference_id: Option<String>,
    /// Status of the first capture, when the response carried one.
    #[serde(default)]
    pub capture_status: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(tag = "gateway", rename_all = "lowercase")]
pub enum GatewayConfirmation {
    Stripe(StripeConfirmation),
    Paypal(PaypalConfirmation),
}

impl GatewayConfirmation {
    pub fn gateway_payment_id(&self) -> &str {
        match self { Self::Stripe(c) => &c.id, Self::Paypal(c) => &c.id }
    }

    /// Normalizes into the shared shape. `order_currency` fills in a missing
    /// amount on declined captures, which carry no capture record.
    pub fn normalize(&self, order_currency: &str) -> Result<PaymentConfirmation, ConfirmationError> {
        match self {
            Self::Stripe(c) => {
                let outcome = match c.status.to_ascii_lowercase().as_str() {
                    "succeeded" => PaymentOutcome::Succeeded,
                    "canceled" | "requires_payment_method" | "payment_failed" | "failed" | "declined" => PaymentOutcome::Failed,
                    _ => return Err(ConfirmationError::NotFinal(c.status.clone())),
                };
                Ok(PaymentConfirmation {
                    gateway_payment_id: c.id.clone(), gateway_status: c.status.clone(), outcome,
                    amount: Money::from_minor(c.amount)?, currency: c.currency.to_ascii_uppercase(), method: PaymentMethod::Stripe,
                    order_reference: c.order_reference.clone(),
                })
            }
            Self::Paypal(c) => {
                // A COMPLETED order can still hold a PENDING or DECLINED capture.
                let status = match &c.capture_status {
                    Some(capture) if c.status.eq_ignore_ascii_case("COMPLETED") => capture,
                    _ => &c.status,
                };
                let outcome = match status.to_ascii_uppercase().as_str() {
                    "COMPLETED" => PaymentOutcome::Succeeded,
                    "DECLINED" | "FAILED" | "VOIDED" | "DENIED" => PaymentOutcome::Failed,
                    _ => return Err(ConfirmationError::NotFinal(status.clone())),
                };
                let (amount, currency) = match (&c.amount, outcome) {
                    (Some(a), _) => {
                        let value = Decimal::from_str(&a.value).map_err(|_| ConfirmationError::Malformed(format!("amount {}", a.value)))?;
                        (Money::from_major(value)?, a.currency_code.to_ascii_uppercase())
                    }
                    (None, PaymentOutcome::Failed) => (Money::ZERO, order_currency.to_string()),
                    (None, PaymentOutcome::Succeeded) => return Err(ConfirmationError::Malformed("completed capture without amount".into())),
                };
                Ok(PaymentConfirmation {
                    gateway_payment_id: c.id.clone(), gateway_status: status.clone(), outcome, amount, currency,
                    method: PaymentMethod::Paypal, order_reference: c.reference_id.clone(),
                })
            }
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationError { NotFinal(String), Malformed(String), Money(MoneyError) }
impl std::error::Error for ConfirmationError {}
impl std::fmt::Display for ConfirmationError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::NotFinal(s) => write!(f, "Payment not final: {}", s),
            Self::Malformed(s) => write!(f, "Malformed confirmation: {}", s),
            Self::Money(e) => write!(f, "{}", e),
        }
    }
}
impl From<MoneyError> for ConfirmationError {
    fn from(e: MoneyError) -> Self { Self::Money(e) }
}

impl PaymentConfirmation {
    /// Checks the confirmation belongs to `order_id`. A success must also name
    /// the order and cover exactly `total` in `currency`.
    pub fn verify_for(&self, order_id: Uuid, total: Money, currency: &str) -> Result<(), ConfirmationMismatch> {
        match &self.order_reference {
            Some(reference) if Uuid::parse_str(reference.trim()).ok() != Some(order_id) => {
                return Err(ConfirmationMismatch::ForeignOrder(reference.clone()));
            }
            None if self.outcome == PaymentOutcome::Succeeded => return Err(ConfirmationMismatch::MissingReference),
            _ => {}
        }
        if self.outcome == PaymentOutcome::Succeeded {
            if !self.currency.eq_ignore_ascii_case(currency) {
                return Err(ConfirmationMismatch::Currency { expected: currency.to_string(), captured: self.currency.clone() });
            }
            if self.amount != total {
                return Err(ConfirmationMismatch::Amount { expected: total, captured: self.amount });
            }
        }
        Ok(())
    }
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub enum ConfirmationMismatch {
    ForeignOrder(String),
    MissingReference,
    Amount { expected: Money, captured: Money },
    Currency { expected: String, captured: String },
}
impl std::error::Error for ConfirmationMismatch {}
impl std::fmt::Display for ConfirmationMismatch {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self {
            Self::ForeignOrder(reference) => write!(f, "payment was created for order {}", reference),
            Self::MissingReference => write!(f, "payment carries no order reference"),
            Self::Amount { expected, captured } => write!(f, "captured {} but order total is {}", captured, expected),
            Self::Currency { expected, captured } => write!(f, "captured in {} but order is in {}", captured, expected),
        }
    }
}

/// The single payment row of an order. `order_id` is unique, so every
/// confirmation for an order upserts the same row.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentDetails {
    pub id: Uuid,
    pub order_id: Uuid,
    pub payment_intent_id: String,
    pub payment_method: PaymentMethod,
    pub status: String,
    pub amount: Money,
    pub currency: String,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

impl PaymentDetails {
    /// Applies a confirmation on top of the existing row, keeping its identity.
    pub fn upsert(existing: Option<&PaymentDetails>, order_id: Uuid, confirmation: &PaymentConfirmation, now: DateTime<Utc>) -> Self {
        let (id, created_at) = existing.map(|p| (p.id, p.created_at)).unwrap_or_else(|| (Uuid::now_v7(), now));
        Self {
            id, order_id, payment_intent_id: confirmation.gateway_payment_id.clone(), payment_method: confirmation.method,
            status: confirmation.gateway_status.clone(), amount: confirmation.amount, currency: confirmation.currency.clone(),
            created_at, updated_at: now,
        }
    }
}

/// What a confirmation does to an order. PENDING moves to PAID or FAILED once;
/// a repeat of the same outcome only refreshes the payment row.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize)]
#[serde(rename_all = "snake_case")]
pub enum CaptureTransition { MarkPaid, AlreadyPaid, MarkFailed, AlreadyFailed }

impl CaptureTransition {
    pub fn plan(current: PaymentStatus, outcome: PaymentOutcome) -> Result<Self, CaptureConflict> {
        match (current, outcome) {
            (PaymentStatus::Pending, PaymentOutcome::Succeeded) => Ok(Self::MarkPaid),
            (PaymentStatus::Paid, PaymentOutcome::Succeeded) => Ok(Self::AlreadyPaid),
            (PaymentStatus::Pending, PaymentOutcome::Failed) => Ok(Self::MarkFailed),
            (PaymentStatus::Failed, PaymentOutcome::Failed) => Ok(Self::AlreadyFailed),
            (current, outcome) => Err(CaptureConflict { current, outcome }),
        }
    }

    pub fn decrements_stock(&self) -> bool { *self == Self::MarkPaid }

    /// Status to write, or `None` when the order already holds it.
    pub fn status_change(&self) -> Option<PaymentStatus> {
        match self {
            Self::MarkPaid => Some(PaymentStatus::Paid),
            Self::MarkFailed => Some(PaymentStatus::Failed),
            Self::AlreadyPaid | Self::AlreadyFailed => None,
        }
    }

    pub fn resulting_status(&self) -> PaymentStatus {
        match self { Self::MarkPaid | Self::AlreadyPaid => PaymentStatus::Paid, Self::MarkFailed | Self::AlreadyFailed => PaymentStatus::Failed }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConflict { pub current: PaymentStatus, pub outcome: PaymentOutcome }

/// Result of one committed capture transaction.
#[derive(Clone, Debug, Serialize)]
pub struct CaptureReport {
    pub order_id: Uuid,
    pub transition: CaptureTransition,
    pub payment: PaymentDetails,
    /// Payment id previously stored for this order, when a different one arrived.
    pub replaced_payment_id: Option<String>,
    pub shortfalls: Vec<InventoryShortfall>,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_plan_transitions() {
        assert_eq!(CaptureTransition::plan(PaymentStatus::Pending, PaymentOutcome::Succeeded), Ok(CaptureTransition::MarkPaid));
        assert_eq!(CaptureTransition::plan(PaymentStatus::Paid, PaymentOutcome::Succeeded), Ok(CaptureTransition::AlreadyPaid));
        assert!(!CaptureTransition::AlreadyPaid.decrements_stock());
        assert!(CaptureTransition::plan(PaymentStatus::Paid, PaymentOutcome::Failed).is_err());
        assert!(CaptureTransition::plan(PaymentStatus::Failed, PaymentOutcome::Succeeded).is_err());
    }

    #[test]
    fn test_normalize_stripe() {
        let c = GatewayConfirmation::Stripe(StripeConfirmation {
            id: "pi_1".into(), status: "succeeded".into(), amount: 2599, currency: "usd".into(), order_reference: None,
        });
        let n = c.normalize("USD").unwrap();
        assert_eq!(n.outcome, PaymentOutcome::Succeeded);
        assert_eq!(n.amount, Money::cents(2599));
        assert_eq!(n.currency, "USD");
        assert_eq!(n.method, PaymentMethod::Stripe);
    }

    #[test]
    fn test_normalize_paypal_amount_string() {
        let c = GatewayConfirmation::Paypal(PaypalConfirmation {
            id: "5O190127TN364715T".into(), status: "COMPLETED".into(),
            amount: Some(PaypalAmount { currency_code: "USD".into(), value: "25.99".into() }),
            reference_id: None, capture_status: Some("COMPLETED".into()),
        });
        assert_eq!(c.normalize("USD").unwrap().amount, Money::cents(2599));
    }

    #[test]
    fn test_normalize_declined_without_amount() {
        let c = GatewayConfirmation::Paypal(PaypalConfirmation {
            id: "X".into(), status: "DECLINED".into(), amount: None, reference_id: None, capture_status: None,
        });
        let n = c.normalize("EUR").unwrap();
        assert_eq!(n.outcome, PaymentOutcome::Failed);
        assert_eq!(n.currency, "EUR");
    }

    #[test]
    fn test_normalize_rejects_processing() {
        let c = GatewayConfirmation::Stripe(StripeConfirmation {
            id: "pi_2".into(), status: "processing".into(), amount: 100, currency: "usd".into(), order_reference: None,
        });
        assert_eq!(c.normalize("USD"), Err(ConfirmationError::NotFinal("processing".into())));
    }

    #[test]
    fn test_completed_order_with_pending_capture_is_not_final() {
        let c = GatewayConfirmation::Paypal(PaypalConfirmation {
            id: "5O190127TN364715T".into(), status: "COMPLETED".into(),
            amount: Some(PaypalAmount { currency_code: "USD".into(), value: "25.99".into() }),
            reference_id: None, capture_status: Some("PENDING".into()),
        });
        assert_eq!(c.normalize("USD"), Err(ConfirmationError::NotFinal("PENDING".into())));

        let declined = GatewayConfirmation::Paypal(PaypalConfirmation {
            id: "5O190127TN364715T".into(), status: "COMPLETED".into(),
            amount: Some(PaypalAmount { currency_code: "USD".into(), value: "25.99".into() }),
            reference_id: None, capture_status: Some("DECLINED".into()),
        });
        assert_eq!(declined.normalize("USD").unwrap().outcome, PaymentOutcome::Failed);
    }

    fn captured(outcome: PaymentOutcome, cents: u32, currency: &str, reference: Option<Uuid>) -> PaymentConfirmation {
        PaymentConfirmation {
            gateway_payment_id: "pi_1".into(), gateway_status: "succeeded".into(), outcome, amount: Money::cents(cents),
            currency: currency.into(), method: PaymentMethod::Stripe, order_reference: reference.map(|r| r.to_string()),
        }
    }

    #[test]
    fn test_verify_for_binds_payment_to_its_order() {
        let (order_id, other) = (Uuid::new_v4(), Uuid::new_v4());
        let total = Money::cents(100500);
        assert_eq!(captured(PaymentOutcome::Succeeded, 100500, "USD", Some(order_id)).verify_for(order_id, total, "USD"), Ok(()));
        assert_eq!(
            captured(PaymentOutcome::Succeeded, 600, "USD", Some(other)).verify_for(order_id, total, "USD"),
            Err(ConfirmationMismatch::ForeignOrder(other.to_string())),
        );
        assert_eq!(
            captured(PaymentOutcome::Succeeded, 100500, "USD", None).verify_for(order_id, total, "USD"),
            Err(ConfirmationMismatch::MissingReference),
        );
        assert_eq!(
            captured(PaymentOutcome::Failed, 0, "USD", Some(other)).verify_for(order_id, total, "USD"),
            Err(ConfirmationMismatch::ForeignOrder(other.to_string())),
        );
        assert_eq!(captured(PaymentOutcome::Failed, 0, "USD", None).verify_for(order_id, total, "USD"), Ok(()));
    }

    #[test]
    fn test_verify_for_rejects_short_or_foreign_currency_capture() {
        let order_id = Uuid::new_v4();
        let total = Money::cents(100500);
        assert_eq!(
            captured(PaymentOutcome::Succeeded, 600, "USD", Some(order_id)).verify_for(order_id, total, "USD"),
            Err(ConfirmationMismatch::Amount { expected: total, captured: Money::cents(600) }),
        );
        assert!(matches!(
            captured(PaymentOutcome::Succeeded, 100500, "EUR", Some(order_id)).verify_for(order_id, total, "USD"),
            Err(ConfirmationMismatch::Currency { .. }),
        ));
    }

    #[test]
    fn test_upsert_keeps_row_identity() {
        let order_id = Uuid::new_v4();
        let conf = PaymentConfirmation {
            gateway_payment_id: "pi_1".into(), gateway_status: "succeeded".into(), outcome: PaymentOutcome::Succeeded,
            amount: Money::cents(100), currency: "USD".into(), method: PaymentMethod::Stripe, order_reference: None,
        };
        let first = PaymentDetails::upsert(None, order_id, &conf, Utc::now());
        let second = PaymentDetails::upsert(Some(&first), order_id, &conf, Utc::now());
        assert_eq!(first.id, second.id);
        assert_eq!(first.created_at, second.created_at);
    }
}
