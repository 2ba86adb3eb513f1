//! Shipping fee calculation for one seller's lines. Pure; safe for previews.

use rust_decimal::Decimal;
use uuid::Uuid;
use crate::domain::aggregates::{CartLineItem, SellerShipping, ShippingRate};
use crate::domain::value_objects::{Money, MoneyError};
use crate::{Result, SettlementError};

/// Fee for all of one seller's lines under a single rate.
///
/// - ITEM: base fee once, plus the extra fee for every unit after the first,
///   counting units across all lines.
/// - WEIGHT: per-kg fee times unit weight times quantity, summed over lines.
///   Lines without a declared weight contribute nothing.
/// - FIXED: the fee, whatever the quantity.
pub fn compute_shipping_fee(items: &[CartLineItem], rate: &ShippingRate) -> std::result::Result<Money, MoneyError> {
    let total_quantity: u64 = items.iter().map(|i| u64::from(i.quantity.value())).sum();
    if total_quantity == 0 { return Ok(Money::ZERO); }
    match rate {
        ShippingRate::Item { base_fee, extra_fee } => {
            let additional = u32::try_from(total_quantity - 1).map_err(|_| MoneyError::Overflow)?;
            base_fee.checked_add(extra_fee.checked_mul(additional)?)
        }
        ShippingRate::Weight { fee_per_kg } => {
            let per_kg = Decimal::from(fee_per_kg.minor());
            let fee = items.iter().try_fold(Decimal::ZERO, |acc, item| {
                let weight = item.weight_kg.unwrap_or(Decimal::ZERO);
                per_kg.checked_mul(weight)
                    .and_then(|w| w.checked_mul(Decimal::from(item.quantity.value())))
                    .and_then(|line| acc.checked_add(line))
                    .ok_or(MoneyError::Overflow)
            })?;
            Money::from_fractional_minor(fee)
        }
        ShippingRate::Fixed { fee } => Ok(*fee),
    }
}

/// Resolves the seller's rate for `country` and computes the fee.
///
/// A seller with no configured rates ships at the rate the cart carried for
/// its lines. A seller with rates but none matching the country (and no
/// store-wide default) does not ship there.
pub fn shipping_fee_for(seller_id: Uuid, items: &[CartLineItem], shipping: Option<&SellerShipping>, country: &str) -> Result<Money> {
    let rate = match shipping {
        Some(config) => config.resolve(country).ok_or_else(|| SettlementError::ShippingUnavailable {
            seller_id, country: country.to_string(),
        })?,
        None => match items.first() {
            Some(line) => &line.shipping,
            None => return Ok(Money::ZERO),
        },
    };
    Ok(compute_shipping_fee(items, rate)?)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::value_objects::Quantity;

    fn line(qty: u32, weight_kg: Option<Decimal>) -> CartLineItem {
        CartLineItem {
            product_id: Uuid::new_v4(), variant_id: Uuid::new_v4(), size_id: Uuid::new_v4(), seller_id: Uuid::nil(),
            unit_price: Money::cents(1000), quantity: Quantity::new(qty).unwrap(), weight_kg,
            shipping: ShippingRate::Fixed { fee: Money::cents(100) },
        }
    }

    #[test]
    fn test_item_method_charges_base_once() {
        let rate = ShippingRate::Item { base_fee: Money::cents(500), extra_fee: Money::cents(200) };
        assert_eq!(compute_shipping_fee(&[line(1, None)], &rate).unwrap(), Money::cents(500));
        for n in 2..=10 {
            assert_eq!(compute_shipping_fee(&[line(n, None)], &rate).unwrap(), Money::cents(500 + 200 * (n - 1)));
        }
    }

    #[test]
    fn test_item_method_counts_units_across_lines() {
        let rate = ShippingRate::Item { base_fee: Money::cents(500), extra_fee: Money::cents(200) };
        assert_eq!(compute_shipping_fee(&[line(2, None), line(1, None)], &rate).unwrap(), Money::cents(900));
    }

    #[test]
    fn test_weight_method_without_weight_is_free() {
        let rate = ShippingRate::Weight { fee_per_kg: Money::cents(300) };
        for n in 1..=5 {
            assert_eq!(compute_shipping_fee(&[line(n, None)], &rate).unwrap(), Money::ZERO);
        }
    }

    #[test]
    fn test_weight_method_rounds_once() {
        let rate = ShippingRate::Weight { fee_per_kg: Money::cents(333) };
        // 333 * 0.5 * 3 = 499.5
        assert_eq!(compute_shipping_fee(&[line(3, Some(Decimal::new(5, 1)))], &rate).unwrap(), Money::cents(500));
    }

    #[test]
    fn test_fixed_method_ignores_quantity() {
        let rate = ShippingRate::Fixed { fee: Money::cents(1000) };
        for n in 1..=10 {
            assert_eq!(compute_shipping_fee(&[line(n, Some(Decimal::new(2, 0)))], &rate).unwrap(), Money::cents(1000));
        }
    }

    #[test]
    fn test_unshippable_country() {
        let seller = Uuid::new_v4();
        let config = SellerShipping::new(seller).with_country("NG", ShippingRate::Fixed { fee: Money::cents(100) });
        assert!(matches!(
            shipping_fee_for(seller, &[line(1, None)], Some(&config), "US"),
            Err(SettlementError::ShippingUnavailable { .. })
        ));
    }

    #[test]
    fn test_unconfigured_seller_uses_cart_rate() {
        assert_eq!(shipping_fee_for(Uuid::new_v4(), &[line(4, None)], None, "US").unwrap(), Money::cents(100));
    }
}
