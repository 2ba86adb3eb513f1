//! In-process store used when no database is configured, and by tests.
//!
//! Writes run against a copy of the state that replaces the original only
//! when the whole operation succeeds, which gives the same all-or-nothing
//! behavior as a database transaction.

use async_trait::async_trait;
use chrono::Utc;
use std::collections::HashMap;
use tokio::sync::Mutex;
use uuid::Uuid;
use crate::domain::aggregates::{
    decrement_stock, find_shortage, CaptureReport, CaptureTransition, Coupon, InventoryShortfall, Order, OrderGroup, OrderItem,
    PaymentConfirmation, PaymentDetails, SellerShipping, ShippingAddress, Size,
};
use crate::domain::status::{OrderGroupStatus, OrderItemStatus};
use crate::store::SettlementStore;
use crate::{Result, SettlementError};

#[derive(Clone, Default)]
struct State {
    sizes: HashMap<Uuid, Size>,
    addresses: HashMap<Uuid, ShippingAddress>,
    shipping: HashMap<Uuid, SellerShipping>,
    coupons: HashMap<String, Coupon>,
    orders: HashMap<Uuid, Order>,
    shortfalls: Vec<InventoryShortfall>,
}

#[derive(Default)]
pub struct MemoryStore {
    state: Mutex<State>,
}

impl MemoryStore {
    pub fn new() -> Self { Self::default() }

    pub async fn put_size(&self, size: Size) { self.state.lock().await.sizes.insert(size.id, size); }

    pub async fn remove_size(&self, size_id: Uuid) { self.state.lock().await.sizes.remove(&size_id); }

    pub async fn put_address(&self, address: ShippingAddress) { self.state.lock().await.addresses.insert(address.id, address); }

    pub async fn put_seller_shipping(&self, shipping: SellerShipping) { self.state.lock().await.shipping.insert(shipping.seller_id, shipping); }

    pub async fn put_coupon(&self, coupon: Coupon) { self.state.lock().await.coupons.insert(coupon.code.clone(), coupon); }

    pub async fn size_quantity(&self, size_id: Uuid) -> Option<i32> { self.state.lock().await.sizes.get(&size_id).map(|s| s.quantity) }

    pub async fn order_count(&self) -> usize { self.state.lock().await.orders.len() }

    pub async fn shortfalls(&self) -> Vec<InventoryShortfall> { self.state.lock().await.shortfalls.clone() }
}

fn capture(state: &mut State, order_id: Uuid, confirmation: &PaymentConfirmation) -> Result<CaptureReport> {
    let claimed = state.orders.values().any(|o| {
        o.id != order_id && o.payment.as_ref().is_some_and(|p| p.payment_intent_id == confirmation.gateway_payment_id)
    });
    if claimed {
        return Err(SettlementError::DuplicatePayment { gateway_payment_id: confirmation.gateway_payment_id.clone() });
    }

    let order = state.orders.get_mut(&order_id).ok_or(SettlementError::OrderNotFound(order_id))?;
    let transition = CaptureTransition::plan(order.payment_status, confirmation.outcome)
        .map_err(|c| SettlementError::PaymentAlreadyFinalized { order_id, status: c.current })?;

    let now = Utc::now();
    let payment = PaymentDetails::upsert(order.payment.as_ref(), order_id, confirmation, now);
    let replaced_payment_id = order.payment.as_ref()
        .filter(|p| p.payment_intent_id != payment.payment_intent_id)
        .map(|p| p.payment_intent_id.clone());
    order.payment = Some(payment.clone());
    if let Some(status) = transition.status_change() {
        order.payment_status = status;
        order.updated_at = now;
    }

    let mut shortfalls = Vec::new();
    if transition.decrements_stock() {
        let mut lines: Vec<&mut OrderItem> = order.groups.iter_mut().flat_map(|g| g.items.iter_mut()).collect();
        lines.sort_by_key(|i| (i.size_id, i.id));
        for item in lines {
            let size = state.sizes.get_mut(&item.size_id).ok_or(SettlementError::SizeNotFound(item.size_id))?;
            let decrement = decrement_stock(size.quantity, item.quantity);
            if decrement.shortfall > 0 {
                item.status = OrderItemStatus::BackOrdered;
                shortfalls.push(InventoryShortfall {
                    order_id, order_item_id: item.id, size_id: item.size_id, requested: item.quantity,
                    available: size.quantity, shortfall: decrement.shortfall, recorded_at: now,
                });
            }
            size.quantity = decrement.new_quantity;
        }
        state.shortfalls.extend(shortfalls.iter().cloned());
    }

    Ok(CaptureReport { order_id, transition, payment, replaced_payment_id, shortfalls })
}

#[async_trait]
impl SettlementStore for MemoryStore {
    async fn find_address(&self, address_id: Uuid) -> Result<Option<ShippingAddress>> {
        Ok(self.state.lock().await.addresses.get(&address_id).cloned())
    }

    async fn stock_levels(&self, size_ids: &[Uuid]) -> Result<HashMap<Uuid, i32>> {
        let state = self.state.lock().await;
        Ok(size_ids.iter().filter_map(|id| state.sizes.get(id).map(|s| (*id, s.quantity))).collect())
    }

    async fn seller_shipping(&self, seller_ids: &[Uuid]) -> Result<HashMap<Uuid, SellerShipping>> {
        let state = self.state.lock().await;
        Ok(seller_ids.iter().filter_map(|id| state.shipping.get(id).map(|s| (*id, s.clone()))).collect())
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        Ok(self.state.lock().await.coupons.get(code).cloned())
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut state = self.state.lock().await;
        let requested = order.requested_by_size();
        let stock: HashMap<Uuid, i32> = requested.keys()
            .filter_map(|id| state.sizes.get(id).map(|s| (*id, s.quantity)))
            .collect();
        if let Some(shortage) = find_shortage(&requested, &stock) {
            return Err(shortage.into());
        }
        let mut stored = order.clone();
        stored.events.clear();
        state.orders.insert(order.id, stored);
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        Ok(self.state.lock().await.orders.get(&order_id).cloned())
    }

    async fn capture_payment(&self, order_id: Uuid, confirmation: &PaymentConfirmation) -> Result<CaptureReport> {
        let mut state = self.state.lock().await;
        let mut working = state.clone();
        let report = capture(&mut working, order_id, confirmation)?;
        *state = working;
        Ok(report)
    }

    async fn find_group(&self, group_id: Uuid) -> Result<Option<OrderGroup>> {
        let state = self.state.lock().await;
        Ok(state.orders.values().flat_map(|o| o.groups.iter()).find(|g| g.id == group_id).cloned())
    }

    async fn set_group_status(&self, group_id: Uuid, from: OrderGroupStatus, to: OrderGroupStatus) -> Result<bool> {
        let mut state = self.state.lock().await;
        let group = state.orders.values_mut().flat_map(|o| o.groups.iter_mut()).find(|g| g.id == group_id);
        match group {
            Some(g) if g.status == from => { g.status = to; Ok(true) }
            Some(_) => Ok(false),
            None => Err(SettlementError::OrderGroupNotFound(group_id)),
        }
    }

    async fn find_item(&self, item_id: Uuid) -> Result<Option<(OrderItem, Uuid)>> {
        let state = self.state.lock().await;
        Ok(state.orders.values().flat_map(|o| o.groups.iter())
            .find_map(|g| g.items.iter().find(|i| i.id == item_id).map(|i| (i.clone(), g.seller_id))))
    }

    async fn set_item_status(&self, item_id: Uuid, from: OrderItemStatus, to: OrderItemStatus) -> Result<bool> {
        let mut state = self.state.lock().await;
        let item = state.orders.values_mut().flat_map(|o| o.groups.iter_mut()).flat_map(|g| g.items.iter_mut()).find(|i| i.id == item_id);
        match item {
            Some(i) if i.status == from => { i.status = to; Ok(true) }
            Some(_) => Ok(false),
            None => Err(SettlementError::OrderItemNotFound(item_id)),
        }
    }
}
