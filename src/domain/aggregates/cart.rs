//! Cart snapshot submitted at checkout

use rust_decimal::Decimal;
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashSet};
use uuid::Uuid;
use crate::domain::aggregates::inventory;
use crate::domain::aggregates::shipping::ShippingRate;
use crate::domain::value_objects::{Money, Quantity};

/// One line of a buyer's cart. Held client-side until settlement.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct CartLineItem {
    pub product_id: Uuid,
    pub variant_id: Uuid,
    pub size_id: Uuid,
    pub seller_id: Uuid,
    pub unit_price: Money,
    pub quantity: Quantity,
    /// Per-unit weight in kilograms as declared on the variant.
    #[serde(default)]
    pub weight_kg: Option<Decimal>,
    /// Shipping method the cart displayed for this seller.
    pub shipping: ShippingRate,
}

impl CartLineItem {
    pub fn line_total(&self) -> Result<Money, crate::domain::value_objects::MoneyError> {
        self.unit_price.checked_mul(self.quantity.value())
    }
}

/// Coupon code the buyer entered for one seller's portion of the cart.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct AppliedCoupon {
    pub seller_id: Uuid,
    pub code: String,
}

#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct CartSnapshot {
    pub items: Vec<CartLineItem>,
    #[serde(default)]
    pub coupons: Vec<AppliedCoupon>,
}

impl CartSnapshot {
    pub fn items(&self) -> &[CartLineItem] { &self.items }
    pub fn is_empty(&self) -> bool { self.items.is_empty() }

    /// At most one coupon per seller; a second code for the same seller replaces the first.
    pub fn apply_coupon(&mut self, seller_id: Uuid, code: impl Into<String>) {
        self.coupons.retain(|c| c.seller_id != seller_id);
        self.coupons.push(AppliedCoupon { seller_id, code: code.into() });
    }

    /// Total requested units per size, summing lines that share a size.
    pub fn requested_by_size(&self) -> BTreeMap<Uuid, u64> {
        inventory::requested_by_size(self.items.iter().map(|i| (i.size_id, i.quantity.value())))
    }

    /// Distinct sizes in ascending id order.
    pub fn size_ids(&self) -> Vec<Uuid> { self.requested_by_size().into_keys().collect() }

    /// Sellers in order of first appearance.
    pub fn seller_ids(&self) -> Vec<Uuid> {
        let mut seen = HashSet::new();
        self.items.iter().map(|i| i.seller_id).filter(|id| seen.insert(*id)).collect()
    }
}
