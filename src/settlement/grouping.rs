//! Splits a cart into one priced group per seller.

use chrono::{DateTime, Utc};
use std::collections::HashMap;
use uuid::Uuid;
use crate::domain::aggregates::{find_shortage, requested_by_size, CartLineItem, Coupon, OrderGroupDraft, SellerShipping};
use crate::domain::value_objects::Money;
use crate::settlement::{discount, shipping};
use crate::{Result, SettlementError};

/// Live state the grouping engine prices against.
#[derive(Debug, Clone, Copy)]
pub struct GroupingContext<'a> {
    pub country: &'a str,
    pub now: DateTime<Utc>,
    /// Current `Size.quantity` by size id. Missing sizes count as out of stock.
    pub stock: &'a HashMap<Uuid, i32>,
    pub shipping: &'a HashMap<Uuid, SellerShipping>,
    /// At most one coupon per seller, keyed by the seller it was entered for.
    pub coupons: &'a HashMap<Uuid, Coupon>,
}

/// Checks every requested size against live stock, summing lines that share a size.
pub fn check_stock(items: &[CartLineItem], stock: &HashMap<Uuid, i32>) -> Result<()> {
    let requested = requested_by_size(items.iter().map(|i| (i.size_id, i.quantity.value())));
    match find_shortage(&requested, stock) {
        Some(shortage) => Err(shortage.into()),
        None => Ok(()),
    }
}

/// Partitions `items` by seller in order of first appearance and prices each
/// partition: subtotal, shipping, coupon discount, total.
pub fn group_cart(items: &[CartLineItem], ctx: &GroupingContext<'_>) -> Result<Vec<OrderGroupDraft>> {
    if items.is_empty() { return Err(SettlementError::EmptyCart); }
    check_stock(items, ctx.stock)?;

    let mut slots: HashMap<Uuid, usize> = HashMap::new();
    let mut partitions: Vec<(Uuid, Vec<CartLineItem>)> = Vec::new();
    for item in items {
        let slot = *slots.entry(item.seller_id).or_insert_with(|| {
            partitions.push((item.seller_id, Vec::new()));
            partitions.len() - 1
        });
        partitions[slot].1.push(item.clone());
    }

    partitions.into_iter().map(|(seller_id, lines)| price_group(seller_id, lines, ctx)).collect()
}

fn price_group(seller_id: Uuid, lines: Vec<CartLineItem>, ctx: &GroupingContext<'_>) -> Result<OrderGroupDraft> {
    let subtotal = lines.iter().try_fold(Money::ZERO, |acc, line| acc.checked_add(line.line_total()?))?;
    let shipping_fees = shipping::shipping_fee_for(seller_id, &lines, ctx.shipping.get(&seller_id), ctx.country)?;

    let coupon = ctx.coupons.get(&seller_id);
    if let Some(coupon) = coupon {
        discount::ensure_coupon_scope(coupon, seller_id)?;
    }
    let raw_discount = discount::apply_coupon(subtotal, coupon, ctx.now);
    let discount = discount::clamp_discount(raw_discount, subtotal, shipping_fees)?;
    let total = subtotal.checked_add(shipping_fees)?.checked_sub(discount)
        .map_err(|_| SettlementError::NegativeOrderTotal { seller_id })?;

    Ok(OrderGroupDraft {
        seller_id,
        items: lines,
        subtotal,
        shipping_fees,
        discount,
        coupon_id: coupon.filter(|c| c.is_active_at(ctx.now)).map(|c| c.id),
        total,
    })
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::domain::aggregates::ShippingRate;
    use crate::domain::value_objects::{DiscountPercent, Quantity};
    use chrono::Duration;

    struct Fixture { stock: HashMap<Uuid, i32>, shipping: HashMap<Uuid, SellerShipping>, coupons: HashMap<Uuid, Coupon> }

    impl Fixture {
        fn new() -> Self { Self { stock: HashMap::new(), shipping: HashMap::new(), coupons: HashMap::new() } }
        fn ctx(&self) -> GroupingContext<'_> {
            GroupingContext { country: "US", now: Utc::now(), stock: &self.stock, shipping: &self.shipping, coupons: &self.coupons }
        }
        fn line(&mut self, seller_id: Uuid, price: u32, qty: u32, rate: ShippingRate) -> CartLineItem {
            let size_id = Uuid::new_v4();
            self.stock.insert(size_id, 10);
            CartLineItem {
                product_id: Uuid::new_v4(), variant_id: Uuid::new_v4(), size_id, seller_id, unit_price: Money::cents(price),
                quantity: Quantity::new(qty).unwrap(), weight_kg: None, shipping: rate,
            }
        }
    }

    #[test]
    fn test_two_sellers_item_and_fixed_shipping() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut fx = Fixture::new();
        fx.shipping.insert(a, SellerShipping::new(a).with_default(ShippingRate::Item { base_fee: Money::cents(500), extra_fee: Money::cents(200) }));
        fx.shipping.insert(b, SellerShipping::new(b).with_default(ShippingRate::Fixed { fee: Money::cents(1000) }));
        let fallback = ShippingRate::Fixed { fee: Money::ZERO };
        let items = vec![fx.line(a, 1000, 3, fallback.clone()), fx.line(b, 2000, 1, fallback)];

        let groups = group_cart(&items, &fx.ctx()).unwrap();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].seller_id, a);
        assert_eq!(groups[0].shipping_fees, Money::cents(900));
        assert_eq!(groups[0].subtotal, Money::cents(3000));
        assert_eq!(groups[1].shipping_fees, Money::cents(1000));
        assert_eq!(groups[1].total, Money::cents(3000));
    }

    #[test]
    fn test_coupon_only_touches_its_seller() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut fx = Fixture::new();
        let free = ShippingRate::Fixed { fee: Money::ZERO };
        let items = vec![fx.line(a, 5000, 1, free.clone()), fx.line(b, 5000, 1, free)];
        let now = Utc::now();
        fx.coupons.insert(a, Coupon {
            id: Uuid::new_v4(), code: "A20".into(), seller_id: a, discount: DiscountPercent::new(20).unwrap(),
            starts_at: now - Duration::hours(1), ends_at: now + Duration::hours(1),
        });

        let groups = group_cart(&items, &fx.ctx()).unwrap();
        assert_eq!(groups[0].discount, Money::cents(1000));
        assert_eq!(groups[0].total, Money::cents(4000));
        assert!(groups[0].coupon_id.is_some());
        assert_eq!(groups[1].discount, Money::ZERO);
        assert_eq!(groups[1].coupon_id, None);
    }

    #[test]
    fn test_foreign_coupon_rejected() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut fx = Fixture::new();
        let items = vec![fx.line(a, 5000, 1, ShippingRate::Fixed { fee: Money::ZERO })];
        let now = Utc::now();
        fx.coupons.insert(a, Coupon {
            id: Uuid::new_v4(), code: "B20".into(), seller_id: b, discount: DiscountPercent::new(20).unwrap(),
            starts_at: now - Duration::hours(1), ends_at: now + Duration::hours(1),
        });
        assert!(matches!(group_cart(&items, &fx.ctx()), Err(SettlementError::InvalidCoupon(_))));
    }

    #[test]
    fn test_stock_check_sums_shared_sizes() {
        let seller = Uuid::new_v4();
        let mut fx = Fixture::new();
        let first = fx.line(seller, 100, 6, ShippingRate::Fixed { fee: Money::ZERO });
        let mut second = first.clone();
        second.quantity = Quantity::new(5).unwrap();
        let err = group_cart(&[first.clone(), second], &fx.ctx()).unwrap_err();
        match err {
            SettlementError::InsufficientStock { size_id, requested, available } => {
                assert_eq!(size_id, first.size_id);
                assert_eq!(requested, 11);
                assert_eq!(available, 10);
            }
            other => panic!("unexpected {other:?}"),
        }
    }

    #[test]
    fn test_unknown_size_is_out_of_stock() {
        let seller = Uuid::new_v4();
        let mut fx = Fixture::new();
        let line = fx.line(seller, 100, 1, ShippingRate::Fixed { fee: Money::ZERO });
        fx.stock.clear();
        assert!(matches!(group_cart(&[line], &fx.ctx()), Err(SettlementError::InsufficientStock { available: 0, .. })));
    }

    #[test]
    fn test_interleaved_sellers_keep_first_appearance_order() {
        let (a, b) = (Uuid::new_v4(), Uuid::new_v4());
        let mut fx = Fixture::new();
        let free = ShippingRate::Fixed { fee: Money::ZERO };
        let items = vec![fx.line(b, 100, 1, free.clone()), fx.line(a, 200, 1, free.clone()), fx.line(b, 300, 2, free)];

        let groups = group_cart(&items, &fx.ctx()).unwrap();
        assert_eq!(groups.iter().map(|g| g.seller_id).collect::<Vec<_>>(), vec![b, a]);
        assert_eq!(groups[0].items.len(), 2);
        assert_eq!(groups[0].subtotal, Money::cents(700));
    }

    #[test]
    fn test_empty_cart() {
        let fx = Fixture::new();
        assert!(matches!(group_cart(&[], &fx.ctx()), Err(SettlementError::EmptyCart)));
    }
}
