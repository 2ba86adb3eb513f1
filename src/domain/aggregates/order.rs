//! Order Aggregate
//!
//! One buyer checkout: an [`Order`] holding one [`OrderGroup`] per seller, each
//! group holding immutable [`OrderItem`] snapshots. Financial fields are fixed
//! at creation; only payment status (by capture) and fulfillment statuses (by
//! sellers) change afterwards.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;
use uuid::Uuid;
use crate::domain::aggregates::cart::CartLineItem;
use crate::domain::aggregates::inventory;
use crate::domain::aggregates::payment::PaymentDetails;
use crate::domain::events::{DomainEvent, OrderEvent};
use crate::domain::status::{OrderGroupStatus, OrderItemStatus};
use crate::domain::value_objects::{Money, MoneyError};

#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum PaymentStatus { #[default] Pending, Paid, Failed }

impl PaymentStatus {
    pub fn as_str(&self) -> &'static str {
        match self { Self::Pending => "PENDING", Self::Paid => "PAID", Self::Failed => "FAILED" }
    }
}

impl std::fmt::Display for PaymentStatus {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result { f.write_str(self.as_str()) }
}

impl std::str::FromStr for PaymentStatus {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s {
            "PENDING" => Ok(Self::Pending),
            "PAID" => Ok(Self::Paid),
            "FAILED" => Ok(Self::Failed),
            other => Err(format!("unknown payment status {}", other)),
        }
    }
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct ShippingAddress {
    pub id: Uuid,
    pub user_id: Uuid,
    pub recipient: String,
    pub line1: String,
    pub line2: Option<String>,
    pub city: String,
    pub region: Option<String>,
    pub postal_code: String,
    /// ISO 3166-1 alpha-2, uppercase.
    pub country: String,
    pub phone: Option<String>,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderItem {
    pub id: Uuid,
    pub group_id: Uuid,
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub size_id: Uuid,
    pub unit_price: Money,
    pub quantity: u32,
    pub status: OrderItemStatus,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrderGroup {
    pub id: Uuid,
    pub order_id: Uuid,
    pub seller_id: Uuid,
    pub subtotal: Money,
    pub shipping_fees: Money,
    pub discount: Money,
    pub coupon_id: Option<Uuid>,
    pub total: Money,
    pub status: OrderGroupStatus,
    pub items: Vec<OrderItem>,
}

/// One seller's priced portion of a cart, before persistence.
#[derive(Clone, Debug, Serialize)]
pub struct OrderGroupDraft {
    pub seller_id: Uuid,
    pub items: Vec<CartLineItem>,
    pub subtotal: Money,
    pub shipping_fees: Money,
    pub discount: Money,
    pub coupon_id: Option<Uuid>,
    pub total: Money,
}

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Order {
    pub id: Uuid,
    pub buyer_id: Uuid,
    pub shipping_address_id: Uuid,
    pub currency: String,
    pub total: Money,
    pub payment_status: PaymentStatus,
    pub groups: Vec<OrderGroup>,
    pub payment: Option<PaymentDetails>,
    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    #[serde(skip)]
    pub(crate) events: Vec<DomainEvent>,
}

impl Order {
    /// Builds a PENDING order from priced seller groups.
    pub fn place(buyer_id: Uuid, shipping_address_id: Uuid, currency: &str, drafts: Vec<OrderGroupDraft>) -> Result<Self, OrderError> {
        if drafts.is_empty() { return Err(OrderError::NoGroups); }
        let id = Uuid::now_v7();
        let now = Utc::now();
        let mut total = Money::ZERO;
        let mut groups = Vec::with_capacity(drafts.len());
        for draft in drafts {
            total = total.checked_add(draft.total)?;
            let group_id = Uuid::now_v7();
            let items = draft.items.iter().map(|line| OrderItem {
                id: Uuid::now_v7(), group_id, product_id: line.product_id, variant_id: line.variant_id, size_id: line.size_id,
                unit_price: line.unit_price, quantity: line.quantity.value(), status: OrderItemStatus::Pending,
            }).collect();
            groups.push(OrderGroup {
                id: group_id, order_id: id, seller_id: draft.seller_id, subtotal: draft.subtotal, shipping_fees: draft.shipping_fees,
                discount: draft.discount, coupon_id: draft.coupon_id, total: draft.total, status: OrderGroupStatus::Pending, items,
            });
        }
        let seller_ids = groups.iter().map(|g| g.seller_id).collect();
        let mut order = Self {
            id, buyer_id, shipping_address_id, currency: currency.to_string(), total, payment_status: PaymentStatus::Pending,
            groups, payment: None, created_at: now, updated_at: now, events: vec![],
        };
        order.raise_event(DomainEvent::Order(OrderEvent::Placed {
            order_id: id, buyer_id, total, seller_ids,
        }));
        Ok(order)
    }

    pub fn items(&self) -> impl Iterator<Item = &OrderItem> { self.groups.iter().flat_map(|g| g.items.iter()) }

    /// Units per size across all groups, in ascending size id.
    pub fn requested_by_size(&self) -> BTreeMap<Uuid, u64> {
        inventory::requested_by_size(self.items().map(|i| (i.size_id, i.quantity)))
    }

    pub fn take_events(&mut self) -> Vec<DomainEvent> { std::mem::take(&mut self.events) }
    fn raise_event(&mut self, e: DomainEvent) { self.events.push(e); }
}

#[derive(Debug, Clone)] pub enum OrderError { NoGroups, Money(MoneyError) }
impl std::error::Error for OrderError {}
impl std::fmt::Display for OrderError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self { Self::NoGroups => write!(f, "No order groups"), Self::Money(e) => write!(f, "{}", e) }
    }
}
impl From<MoneyError> for OrderError {
    fn from(e: MoneyError) -> Self { Self::Money(e) }
}
