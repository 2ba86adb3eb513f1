//! Domain events
use serde::Serialize;
use uuid::Uuid;
use crate::domain::aggregates::inventory::InventoryShortfall;
use crate::domain::status::{OrderGroupStatus, OrderItemStatus};
use crate::domain::value_objects::Money;

#[derive(Clone, Debug, Serialize)]
#[serde(untagged)]
pub enum DomainEvent {
    Order(OrderEvent),
    Inventory(InventoryEvent),
    Fulfillment(FulfillmentEvent),
}

impl DomainEvent {
    /// Messaging subject suffix, e.g. `order.paid`.
    pub fn subject(&self) -> &'static str {
        match self {
            Self::Order(OrderEvent::Placed { .. }) => "order.placed",
            Self::Order(OrderEvent::Paid { .. }) => "order.paid",
            Self::Order(OrderEvent::PaymentFailed { .. }) => "order.payment_failed",
            Self::Inventory(InventoryEvent::Shortfall(_)) => "inventory.shortfall",
            Self::Fulfillment(FulfillmentEvent::GroupStatusChanged { .. }) => "order_group.status_changed",
            Self::Fulfillment(FulfillmentEvent::ItemStatusChanged { .. }) => "order_item.status_changed",
        }
    }
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum OrderEvent {
    Placed { order_id: Uuid, buyer_id: Uuid, total: Money, seller_ids: Vec<Uuid> },
    Paid { order_id: Uuid, gateway_payment_id: String, amount: Money },
    PaymentFailed { order_id: Uuid, gateway_payment_id: String, gateway_status: String },
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum InventoryEvent {
    Shortfall(InventoryShortfall),
}

#[derive(Clone, Debug, Serialize)]
#[serde(tag = "type", rename_all = "snake_case")]
pub enum FulfillmentEvent {
    GroupStatusChanged { group_id: Uuid, seller_id: Uuid, from: OrderGroupStatus, to: OrderGroupStatus },
    ItemStatusChanged { item_id: Uuid, group_id: Uuid, from: OrderItemStatus, to: OrderItemStatus },
}
