//! Inventory rows and the capture-time decrement policy

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{BTreeMap, HashMap};
use uuid::Uuid;

/// A sellable size of a product variant. `quantity` never drops below zero.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Size {
    pub id: Uuid,
    pub variant_id: Uuid,
    pub quantity: i32,
}

/// Units requested per size, summing lines that share a size. Iterates in
/// ascending size id, the order stock rows are locked in.
pub fn requested_by_size(lines: impl IntoIterator<Item = (Uuid, u32)>) -> BTreeMap<Uuid, u64> {
    let mut requested = BTreeMap::new();
    for (size_id, quantity) in lines {
        *requested.entry(size_id).or_insert(0u64) += u64::from(quantity);
    }
    requested
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockShortage {
    pub size_id: Uuid,
    pub requested: u64,
    pub available: i32,
}

/// First size whose stock cannot cover the request. Sizes absent from `stock`
/// hold nothing.
pub fn find_shortage(requested: &BTreeMap<Uuid, u64>, stock: &HashMap<Uuid, i32>) -> Option<StockShortage> {
    requested.iter().find_map(|(&size_id, &qty)| {
        let available = stock.get(&size_id).copied().unwrap_or(0);
        (u64::try_from(available).unwrap_or(0) < qty).then_some(StockShortage { size_id, requested: qty, available })
    })
}

#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct StockDecrement {
    pub new_quantity: i32,
    /// Units paid for that were not on the shelf.
    pub shortfall: u32,
}

/// Decrements after payment has been taken. Payment cannot be undone here, so a
/// short shelf clamps at zero and reports the missing units instead of failing.
pub fn decrement_stock(available: i32, requested: u32) -> StockDecrement {
    let available = available.max(0);
    let requested_i = i64::from(requested);
    let remaining = i64::from(available) - requested_i;
    if remaining >= 0 {
        StockDecrement { new_quantity: remaining as i32, shortfall: 0 }
    } else {
        StockDecrement { new_quantity: 0, shortfall: (-remaining) as u32 }
    }
}

/// Paid units the shelf could not cover, kept for operator follow-up.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryShortfall {
    pub order_id: Uuid,
    pub order_item_id: Uuid,
    pub size_id: Uuid,
    pub requested: u32,
    pub available: i32,
    pub shortfall: u32,
    pub recorded_at: DateTime<Utc>,
}
