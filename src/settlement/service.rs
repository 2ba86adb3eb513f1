//! Order Settlement Service
//!
//! Converts a buyer's cart into a persisted PENDING order. Stock is checked
//! here but only decremented once payment is captured, so a PENDING order
//! holds no inventory and two orders may race for the last units of a size.
//! The capture path absorbs that case (see [`crate::settlement::reconciler`]).

use chrono::Utc;
use serde::Serialize;
use std::collections::HashMap;
use std::sync::Arc;
use tracing::{debug, info, instrument};
use uuid::Uuid;
use crate::domain::aggregates::{CartSnapshot, Coupon, Order, OrderGroupDraft};
use crate::domain::value_objects::Money;
use crate::identity::Actor;
use crate::publisher::EventPublisher;
use crate::settlement::grouping::{group_cart, GroupingContext};
use crate::store::SettlementStore;
use crate::{Result, SettlementError};

/// Priced cart as it would be placed right now.
#[derive(Debug, Clone, Serialize)]
pub struct CartPreview {
    pub currency: String,
    pub total: Money,
    pub groups: Vec<OrderGroupDraft>,
}

#[derive(Clone)]
pub struct OrderSettlementService {
    store: Arc<dyn SettlementStore>,
    publisher: EventPublisher,
    currency: String,
}

impl OrderSettlementService {
    pub fn new(store: Arc<dyn SettlementStore>, publisher: EventPublisher, currency: impl Into<String>) -> Self {
        Self { store, publisher, currency: currency.into() }
    }

    /// Groups, prices and persists the cart. Nothing is written unless every
    /// line has stock at the moment of insertion.
    #[instrument(skip(self, cart), fields(lines = cart.items.len()))]
    pub async fn place_order(&self, buyer_id: Uuid, address_id: Uuid, cart: &CartSnapshot) -> Result<Order> {
        let drafts = self.price(buyer_id, address_id, cart).await?;
        let mut order = Order::place(buyer_id, address_id, &self.currency, drafts)?;
        self.store.insert_order(&order).await?;
        info!(order_id = %order.id, total = %order.total, groups = order.groups.len(), "order placed");
        self.publisher.publish(order.take_events()).await;
        Ok(order)
    }

    /// Same pricing as [`Self::place_order`] without persisting.
    #[instrument(skip(self, cart), fields(lines = cart.items.len()))]
    pub async fn preview_cart(&self, buyer_id: Uuid, address_id: Uuid, cart: &CartSnapshot) -> Result<CartPreview> {
        let groups = self.price(buyer_id, address_id, cart).await?;
        let total = groups.iter().try_fold(Money::ZERO, |acc, g| acc.checked_add(g.total))?;
        Ok(CartPreview { currency: self.currency.clone(), total, groups })
    }

    #[instrument(skip(self))]
    pub async fn get_order(&self, actor: &Actor, order_id: Uuid) -> Result<Order> {
        let order = self.store.find_order(order_id).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
        actor.ensure_owns(order.buyer_id)?;
        Ok(order)
    }

    async fn price(&self, buyer_id: Uuid, address_id: Uuid, cart: &CartSnapshot) -> Result<Vec<OrderGroupDraft>> {
        if cart.is_empty() { return Err(SettlementError::EmptyCart); }
        let address = self.store.find_address(address_id).await?
            .filter(|a| a.user_id == buyer_id)
            .ok_or(SettlementError::InvalidAddress)?;

        let stock = self.store.stock_levels(&cart.size_ids()).await?;
        let shipping = self.store.seller_shipping(&cart.seller_ids()).await?;
        let coupons = self.load_coupons(cart).await?;
        debug!(sizes = stock.len(), configured_sellers = shipping.len(), coupons = coupons.len(), "pricing cart");

        let ctx = GroupingContext { country: &address.country, now: Utc::now(), stock: &stock, shipping: &shipping, coupons: &coupons };
        group_cart(cart.items(), &ctx)
    }

    /// Resolves entered codes, keyed by the seller they were entered for.
    async fn load_coupons(&self, cart: &CartSnapshot) -> Result<HashMap<Uuid, Coupon>> {
        let mut coupons = HashMap::new();
        for applied in &cart.coupons {
            let code = applied.code.trim();
            if !cart.items.iter().any(|i| i.seller_id == applied.seller_id) {
                return Err(SettlementError::InvalidCoupon(format!("{} entered for a seller with no items in the cart", code)));
            }
            let coupon = self.store.find_coupon(code).await?
                .ok_or_else(|| SettlementError::InvalidCoupon(format!("unknown code {}", code)))?;
            coupons.insert(applied.seller_id, coupon);
        }
        Ok(coupons)
    }
}
