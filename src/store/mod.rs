//! Persistence for the settlement pipeline.
//!
//! Every method is one storage transaction. The two that must be atomic across
//! several rows are [`SettlementStore::insert_order`] and
//! [`SettlementStore::capture_payment`].

pub mod memory;
pub mod postgres;

use async_trait::async_trait;
use std::collections::HashMap;
use uuid::Uuid;
use crate::domain::aggregates::{
    CaptureReport, Coupon, Order, OrderGroup, OrderItem, PaymentConfirmation, SellerShipping, ShippingAddress,
};
use crate::domain::status::{OrderGroupStatus, OrderItemStatus};
use crate::Result;

pub use memory::MemoryStore;
pub use postgres::PgStore;

#[async_trait]
pub trait SettlementStore: Send + Sync {
    async fn find_address(&self, address_id: Uuid) -> Result<Option<ShippingAddress>>;

    /// Current stock for the given sizes. Unknown ids are absent from the map.
    async fn stock_levels(&self, size_ids: &[Uuid]) -> Result<HashMap<Uuid, i32>>;

    /// Shipping configuration for sellers that have one.
    async fn seller_shipping(&self, seller_ids: &[Uuid]) -> Result<HashMap<Uuid, SellerShipping>>;

    /// Coupon codes are unique across sellers.
    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>>;

    /// Persists the order with all groups and items. Stock for every referenced
    /// size is re-checked under row locks first; on `InsufficientStock` nothing
    /// is written. Stock is not decremented here.
    async fn insert_order(&self, order: &Order) -> Result<()>;

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>>;

    /// One atomic capture: upsert the order's payment row, move payment status,
    /// and on the first transition into PAID decrement every item's size.
    async fn capture_payment(&self, order_id: Uuid, confirmation: &PaymentConfirmation) -> Result<CaptureReport>;

    async fn find_group(&self, group_id: Uuid) -> Result<Option<OrderGroup>>;

    /// Compare-and-set on the group status. Returns false when the stored
    /// status is no longer `from`.
    async fn set_group_status(&self, group_id: Uuid, from: OrderGroupStatus, to: OrderGroupStatus) -> Result<bool>;

    /// The item along with the seller owning its group.
    async fn find_item(&self, item_id: Uuid) -> Result<Option<(OrderItem, Uuid)>>;

    async fn set_item_status(&self, item_id: Uuid, from: OrderItemStatus, to: OrderItemStatus) -> Result<bool>;
}
