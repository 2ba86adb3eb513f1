//! Coupon discounts for one seller's group.

use chrono::{DateTime, Utc};
use uuid::Uuid;
use crate::domain::aggregates::Coupon;
use crate::domain::value_objects::Money;
use crate::{Result, SettlementError};

/// Percentage discount on `subtotal`, rounded half up. Zero without a coupon
/// or outside the coupon's window.
pub fn apply_coupon(subtotal: Money, coupon: Option<&Coupon>, now: DateTime<Utc>) -> Money {
    let Some(coupon) = coupon else { return Money::ZERO };
    if !coupon.is_active_at(now) { return Money::ZERO; }
    let scaled = i128::from(subtotal.minor()) * i128::from(coupon.discount.value());
    let rounded = (scaled + 50) / 100;
    // percent < 100 keeps the result below subtotal, which already fits in i64
    Money::from_minor(rounded as i64).unwrap_or(Money::ZERO)
}

/// A coupon only applies to its owning seller's lines.
pub fn ensure_coupon_scope(coupon: &Coupon, seller_id: Uuid) -> Result<()> {
    if coupon.belongs_to(seller_id) {
        Ok(())
    } else {
        Err(SettlementError::InvalidCoupon(format!("{} is not issued by seller {}", coupon.code, seller_id)))
    }
}

/// Discounts never take a group below zero: at most subtotal plus shipping.
pub fn clamp_discount(discount: Money, subtotal: Money, shipping_fees: Money) -> Result<Money> {
    Ok(discount.min(subtotal.checked_add(shipping_fees)?))
}
