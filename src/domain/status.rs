//! Seller-managed fulfillment lifecycles.
//!
//! Both lifecycles are independent of payment status. The main line only moves
//! forward (skipping steps is allowed); side states can be entered from any
//! state that has not finished the forward line.

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderGroupStatus {
    #[default]
    Pending,
    Confirmed,
    Processing,
    Shipped,
    OutForDelivery,
    Delivered,
    Cancelled,
    Failed,
    Refunded,
    Returned,
    OnHold,
}

impl OrderGroupStatus {
    pub const ALL: [OrderGroupStatus; 11] = [
        Self::Pending, Self::Confirmed, Self::Processing, Self::Shipped, Self::OutForDelivery, Self::Delivered,
        Self::Cancelled, Self::Failed, Self::Refunded, Self::Returned, Self::OnHold,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Confirmed => "CONFIRMED",
            Self::Processing => "PROCESSING",
            Self::Shipped => "SHIPPED",
            Self::OutForDelivery => "OUT_FOR_DELIVERY",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Failed => "FAILED",
            Self::Refunded => "REFUNDED",
            Self::Returned => "RETURNED",
            Self::OnHold => "ON_HOLD",
        }
    }

    fn forward_rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Confirmed => Some(1),
            Self::Processing => Some(2),
            Self::Shipped => Some(3),
            Self::OutForDelivery => Some(4),
            Self::Delivered => Some(5),
            _ => None,
        }
    }

    pub fn can_transition_to(&self, next: OrderGroupStatus) -> bool {
        use OrderGroupStatus::*;
        if *self == next { return true; }
        match (*self, next) {
            (Delivered, Returned | Refunded) => true,
            (Delivered, _) => false,
            (Returned | Cancelled, Refunded) => true,
            (Returned | Cancelled | Failed | Refunded, _) => false,
            (OnHold, to) => to != Delivered,
            (_, Cancelled | Failed | Refunded | Returned | OnHold) => true,
            (from, to) => match (from.forward_rank(), to.forward_rank()) {
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        }
    }
}

impl fmt::Display for OrderGroupStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderGroupStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str().eq_ignore_ascii_case(s)).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum OrderItemStatus {
    #[default]
    Pending,
    Processing,
    ReadyForShipment,
    PartiallyShipped,
    Shipped,
    AwaitingPickup,
    Delivered,
    Cancelled,
    Returned,
    Refunded,
    FailedDelivery,
    OnHold,
    BackOrdered,
    ExchangeRequested,
}

impl OrderItemStatus {
    pub const ALL: [OrderItemStatus; 14] = [
        Self::Pending, Self::Processing, Self::ReadyForShipment, Self::PartiallyShipped, Self::Shipped,
        Self::AwaitingPickup, Self::Delivered, Self::Cancelled, Self::Returned, Self::Refunded,
        Self::FailedDelivery, Self::OnHold, Self::BackOrdered, Self::ExchangeRequested,
    ];

    pub fn as_str(&self) -> &'static str {
        match self {
            Self::Pending => "PENDING",
            Self::Processing => "PROCESSING",
            Self::ReadyForShipment => "READY_FOR_SHIPMENT",
            Self::PartiallyShipped => "PARTIALLY_SHIPPED",
            Self::Shipped => "SHIPPED",
            Self::AwaitingPickup => "AWAITING_PICKUP",
            Self::Delivered => "DELIVERED",
            Self::Cancelled => "CANCELLED",
            Self::Returned => "RETURNED",
            Self::Refunded => "REFUNDED",
            Self::FailedDelivery => "FAILED_DELIVERY",
            Self::OnHold => "ON_HOLD",
            Self::BackOrdered => "BACK_ORDERED",
            Self::ExchangeRequested => "EXCHANGE_REQUESTED",
        }
    }

    fn forward_rank(&self) -> Option<u8> {
        match self {
            Self::Pending => Some(0),
            Self::Processing => Some(1),
            Self::ReadyForShipment => Some(2),
            Self::PartiallyShipped => Some(3),
            Self::Shipped => Some(4),
            Self::AwaitingPickup => Some(5),
            Self::Delivered => Some(6),
            _ => None,
        }
    }

    fn has_left_warehouse(&self) -> bool {
        matches!(self, Self::Shipped | Self::AwaitingPickup | Self::PartiallyShipped)
    }

    pub fn can_transition_to(&self, next: OrderItemStatus) -> bool {
        use OrderItemStatus::*;
        if *self == next { return true; }
        match (*self, next) {
            (Refunded, _) => false,
            (Cancelled | Returned, to) => to == Refunded,
            (Delivered, to) => matches!(to, Returned | Refunded | ExchangeRequested),
            (ExchangeRequested, to) => matches!(to, Processing | Returned | Refunded),
            (FailedDelivery, to) => matches!(to, Shipped | Returned | Refunded | Cancelled),
            (BackOrdered, to) => matches!(to, Processing | ReadyForShipment | Cancelled | Refunded | OnHold),
            (OnHold, to) => !matches!(to, Delivered | ExchangeRequested | FailedDelivery),
            (from, FailedDelivery) => from.has_left_warehouse(),
            (from, BackOrdered) => matches!(from, Pending | Processing | ReadyForShipment),
            (_, Cancelled | OnHold | Refunded) => true,
            (from, Returned) => from.has_left_warehouse(),
            (_, ExchangeRequested) => false,
            (from, to) => match (from.forward_rank(), to.forward_rank()) {
                (Some(a), Some(b)) => b > a,
                _ => false,
            },
        }
    }
}

impl fmt::Display for OrderItemStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { f.write_str(self.as_str()) }
}

impl FromStr for OrderItemStatus {
    type Err = UnknownStatus;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Self::ALL.into_iter().find(|st| st.as_str().eq_ignore_ascii_case(s)).ok_or_else(|| UnknownStatus(s.to_string()))
    }
}

#[derive(Debug, Clone)] pub struct UnknownStatus(pub String);
impl std::error::Error for UnknownStatus {}
impl fmt::Display for UnknownStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result { write!(f, "Unknown status {}", self.0) }
}
