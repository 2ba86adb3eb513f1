//! Postgres store.
//!
//! Stock rows are always locked in ascending size id order so concurrent
//! settlements and captures touching the same sizes cannot deadlock.

use async_trait::async_trait;
use chrono::{DateTime, Utc};
use sqlx::postgres::PgPool;
use sqlx::{Postgres, Transaction};
use std::collections::HashMap;
use std::str::FromStr;
use uuid::Uuid;
use crate::domain::aggregates::{
    decrement_stock, find_shortage, CaptureReport, CaptureTransition, Coupon, InventoryShortfall, Order, OrderGroup, OrderItem,
    PaymentConfirmation, PaymentDetails, PaymentMethod, PaymentStatus, SellerShipping, ShippingAddress, ShippingMethod,
    ShippingRate,
};
use crate::domain::status::{OrderGroupStatus, OrderItemStatus};
use crate::domain::value_objects::{DiscountPercent, Money};
use crate::store::SettlementStore;
use crate::{Result, SettlementError};

#[derive(Clone)]
pub struct PgStore {
    pool: PgPool,
}

impl PgStore {
    pub fn new(pool: PgPool) -> Self { Self { pool } }
}

fn corrupt(what: impl std::fmt::Display) -> SettlementError { SettlementError::Storage(format!("corrupt row: {}", what)) }

fn money(minor: i64) -> Result<Money> { Money::from_minor(minor).map_err(|e| corrupt(e)) }

fn quantity(value: i32) -> Result<u32> { u32::try_from(value).map_err(|_| corrupt(format!("quantity {}", value))) }

#[derive(sqlx::FromRow)]
struct AddressRow {
    id: Uuid, user_id: Uuid, recipient: String, line1: String, line2: Option<String>, city: String,
    region: Option<String>, postal_code: String, country: String, phone: Option<String>,
}

#[derive(sqlx::FromRow)]
struct RateRow { seller_id: Uuid, country: Option<String>, method: String, base_fee: i64, extra_fee: i64 }

#[derive(sqlx::FromRow)]
struct CouponRow { id: Uuid, code: String, seller_id: Uuid, discount_percent: i16, starts_at: DateTime<Utc>, ends_at: DateTime<Utc> }

#[derive(sqlx::FromRow)]
struct OrderRow {
    id: Uuid, buyer_id: Uuid, shipping_address_id: Uuid, currency: String, total: i64, payment_status: String,
    created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

#[derive(sqlx::FromRow)]
struct GroupRow {
    id: Uuid, order_id: Uuid, seller_id: Uuid, subtotal: i64, shipping_fees: i64, discount: i64,
    coupon_id: Option<Uuid>, total: i64, status: String,
}

#[derive(sqlx::FromRow)]
struct ItemRow {
    id: Uuid, group_id: Uuid, product_id: Uuid, variant_id: Uuid, size_id: Uuid, unit_price: i64, quantity: i32, status: String,
}

#[derive(sqlx::FromRow)]
struct PaymentRow {
    id: Uuid, order_id: Uuid, payment_intent_id: String, payment_method: String, status: String, amount: i64,
    currency: String, created_at: DateTime<Utc>, updated_at: DateTime<Utc>,
}

impl From<AddressRow> for ShippingAddress {
    fn from(r: AddressRow) -> Self {
        Self {
            id: r.id, user_id: r.user_id, recipient: r.recipient, line1: r.line1, line2: r.line2, city: r.city,
            region: r.region, postal_code: r.postal_code, country: r.country, phone: r.phone,
        }
    }
}

impl TryFrom<CouponRow> for Coupon {
    type Error = SettlementError;
    fn try_from(r: CouponRow) -> Result<Self> {
        let percent = u8::try_from(r.discount_percent).ok().and_then(|p| DiscountPercent::new(p).ok())
            .ok_or_else(|| corrupt(format!("coupon {} percent {}", r.code, r.discount_percent)))?;
        Ok(Self { id: r.id, code: r.code, seller_id: r.seller_id, discount: percent, starts_at: r.starts_at, ends_at: r.ends_at })
    }
}

impl TryFrom<ItemRow> for OrderItem {
    type Error = SettlementError;
    fn try_from(r: ItemRow) -> Result<Self> {
        Ok(Self {
            id: r.id, group_id: r.group_id, product_id: r.product_id, variant_id: r.variant_id, size_id: r.size_id,
            unit_price: money(r.unit_price)?, quantity: quantity(r.quantity)?,
            status: OrderItemStatus::from_str(&r.status).map_err(corrupt)?,
        })
    }
}

impl GroupRow {
    fn into_group(self, items: Vec<OrderItem>) -> Result<OrderGroup> {
        Ok(OrderGroup {
            id: self.id, order_id: self.order_id, seller_id: self.seller_id, subtotal: money(self.subtotal)?,
            shipping_fees: money(self.shipping_fees)?, discount: money(self.discount)?, coupon_id: self.coupon_id,
            total: money(self.total)?, status: OrderGroupStatus::from_str(&self.status).map_err(corrupt)?, items,
        })
    }
}

impl TryFrom<PaymentRow> for PaymentDetails {
    type Error = SettlementError;
    fn try_from(r: PaymentRow) -> Result<Self> {
        Ok(Self {
            id: r.id, order_id: r.order_id, payment_intent_id: r.payment_intent_id,
            payment_method: PaymentMethod::from_str(&r.payment_method).map_err(corrupt)?, status: r.status,
            amount: money(r.amount)?, currency: r.currency, created_at: r.created_at, updated_at: r.updated_at,
        })
    }
}

/// Unique index keeping one gateway payment to one order.
const PAYMENT_INTENT_UNIQUE: &str = "idx_payment_details_intent";

const ITEM_COLUMNS: &str = "oi.id, oi.group_id, oi.product_id, oi.variant_id, oi.size_id, oi.unit_price, oi.quantity, oi.status";

async fn lock_stock(tx: &mut Transaction<'_, Postgres>, size_ids: &[Uuid]) -> Result<HashMap<Uuid, i32>> {
    let rows: Vec<(Uuid, i32)> = sqlx::query_as("SELECT id, quantity FROM sizes WHERE id = ANY($1) ORDER BY id FOR UPDATE")
        .bind(size_ids).fetch_all(&mut **tx).await?;
    Ok(rows.into_iter().collect())
}

#[async_trait]
impl SettlementStore for PgStore {
    async fn find_address(&self, address_id: Uuid) -> Result<Option<ShippingAddress>> {
        let row = sqlx::query_as::<_, AddressRow>("SELECT * FROM shipping_addresses WHERE id = $1")
            .bind(address_id).fetch_optional(&self.pool).await?;
        Ok(row.map(Into::into))
    }

    async fn stock_levels(&self, size_ids: &[Uuid]) -> Result<HashMap<Uuid, i32>> {
        let rows: Vec<(Uuid, i32)> = sqlx::query_as("SELECT id, quantity FROM sizes WHERE id = ANY($1)")
            .bind(size_ids).fetch_all(&self.pool).await?;
        Ok(rows.into_iter().collect())
    }

    async fn seller_shipping(&self, seller_ids: &[Uuid]) -> Result<HashMap<Uuid, SellerShipping>> {
        let rows = sqlx::query_as::<_, RateRow>("SELECT seller_id, country, method, base_fee, extra_fee FROM seller_shipping_rates WHERE seller_id = ANY($1)")
            .bind(seller_ids).fetch_all(&self.pool).await?;
        let mut out: HashMap<Uuid, SellerShipping> = HashMap::new();
        for r in rows {
            let method = ShippingMethod::from_str(&r.method).map_err(corrupt)?;
            let rate = ShippingRate::from_parts(method, money(r.base_fee)?, money(r.extra_fee)?);
            out.entry(r.seller_id).or_insert_with(|| SellerShipping::new(r.seller_id)).set_rate(r.country.as_deref(), rate);
        }
        Ok(out)
    }

    async fn find_coupon(&self, code: &str) -> Result<Option<Coupon>> {
        let row = sqlx::query_as::<_, CouponRow>("SELECT id, code, seller_id, discount_percent, starts_at, ends_at FROM coupons WHERE code = $1")
            .bind(code).fetch_optional(&self.pool).await?;
        row.map(Coupon::try_from).transpose()
    }

    async fn insert_order(&self, order: &Order) -> Result<()> {
        let mut tx = self.pool.begin().await?;

        let requested = order.requested_by_size();
        let size_ids: Vec<Uuid> = requested.keys().copied().collect();
        let stock = lock_stock(&mut tx, &size_ids).await?;
        if let Some(shortage) = find_shortage(&requested, &stock) {
            return Err(shortage.into());
        }

        sqlx::query("INSERT INTO orders (id, buyer_id, shipping_address_id, currency, total, payment_status, created_at, updated_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
            .bind(order.id).bind(order.buyer_id).bind(order.shipping_address_id).bind(&order.currency).bind(order.total.minor())
            .bind(order.payment_status.as_str()).bind(order.created_at).bind(order.updated_at)
            .execute(&mut *tx).await?;
        for (gpos, group) in order.groups.iter().enumerate() {
            sqlx::query("INSERT INTO order_groups (id, order_id, seller_id, subtotal, shipping_fees, discount, coupon_id, total, status, position) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9, $10)")
                .bind(group.id).bind(group.order_id).bind(group.seller_id).bind(group.subtotal.minor()).bind(group.shipping_fees.minor())
                .bind(group.discount.minor()).bind(group.coupon_id).bind(group.total.minor()).bind(group.status.as_str()).bind(gpos as i32)
                .execute(&mut *tx).await?;
            for (ipos, item) in group.items.iter().enumerate() {
                sqlx::query("INSERT INTO order_items (id, group_id, product_id, variant_id, size_id, unit_price, quantity, status, position) VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9)")
                    .bind(item.id).bind(item.group_id).bind(item.product_id).bind(item.variant_id).bind(item.size_id)
                    .bind(item.unit_price.minor()).bind(item.quantity as i32).bind(item.status.as_str()).bind(ipos as i32)
                    .execute(&mut *tx).await?;
            }
        }

        tx.commit().await?;
        Ok(())
    }

    async fn find_order(&self, order_id: Uuid) -> Result<Option<Order>> {
        let Some(row) = sqlx::query_as::<_, OrderRow>("SELECT id, buyer_id, shipping_address_id, currency, total, payment_status, created_at, updated_at FROM orders WHERE id = $1")
            .bind(order_id).fetch_optional(&self.pool).await? else { return Ok(None) };

        let group_rows = sqlx::query_as::<_, GroupRow>("SELECT id, order_id, seller_id, subtotal, shipping_fees, discount, coupon_id, total, status FROM order_groups WHERE order_id = $1 ORDER BY position")
            .bind(order_id).fetch_all(&self.pool).await?;
        let item_rows = sqlx::query_as::<_, ItemRow>(&format!("SELECT {ITEM_COLUMNS} FROM order_items oi JOIN order_groups og ON og.id = oi.group_id WHERE og.order_id = $1 ORDER BY oi.position"))
            .bind(order_id).fetch_all(&self.pool).await?;
        let payment = sqlx::query_as::<_, PaymentRow>("SELECT * FROM payment_details WHERE order_id = $1")
            .bind(order_id).fetch_optional(&self.pool).await?;

        let mut items_by_group: HashMap<Uuid, Vec<OrderItem>> = HashMap::new();
        for r in item_rows {
            let item = OrderItem::try_from(r)?;
            items_by_group.entry(item.group_id).or_default().push(item);
        }
        let groups = group_rows.into_iter()
            .map(|g| { let items = items_by_group.remove(&g.id).unwrap_or_default(); g.into_group(items) })
            .collect::<Result<Vec<_>>>()?;

        Ok(Some(Order {
            id: row.id, buyer_id: row.buyer_id, shipping_address_id: row.shipping_address_id, currency: row.currency,
            total: money(row.total)?, payment_status: PaymentStatus::from_str(&row.payment_status).map_err(corrupt)?,
            groups, payment: payment.map(PaymentDetails::try_from).transpose()?, created_at: row.created_at,
            updated_at: row.updated_at, events: vec![],
        }))
    }

    async fn capture_payment(&self, order_id: Uuid, confirmation: &PaymentConfirmation) -> Result<CaptureReport> {
        let mut tx = self.pool.begin().await?;

        let (status,): (String,) = sqlx::query_as("SELECT payment_status FROM orders WHERE id = $1 FOR UPDATE")
            .bind(order_id).fetch_optional(&mut *tx).await?.ok_or(SettlementError::OrderNotFound(order_id))?;
        let current = PaymentStatus::from_str(&status).map_err(corrupt)?;
        let transition = CaptureTransition::plan(current, confirmation.outcome)
            .map_err(|c| SettlementError::PaymentAlreadyFinalized { order_id, status: c.current })?;

        let claimed: Option<(Uuid,)> = sqlx::query_as("SELECT order_id FROM payment_details WHERE payment_intent_id = $1 AND order_id <> $2")
            .bind(&confirmation.gateway_payment_id).bind(order_id).fetch_optional(&mut *tx).await?;
        if claimed.is_some() {
            return Err(SettlementError::DuplicatePayment { gateway_payment_id: confirmation.gateway_payment_id.clone() });
        }

        let existing = sqlx::query_as::<_, PaymentRow>("SELECT * FROM payment_details WHERE order_id = $1")
            .bind(order_id).fetch_optional(&mut *tx).await?
            .map(PaymentDetails::try_from).transpose()?;
        let now = Utc::now();
        let payment = PaymentDetails::upsert(existing.as_ref(), order_id, confirmation, now);
        let replaced_payment_id = existing
            .filter(|p| p.payment_intent_id != payment.payment_intent_id)
            .map(|p| p.payment_intent_id);

        sqlx::query(
            "INSERT INTO payment_details (id, order_id, payment_intent_id, payment_method, status, amount, currency, created_at, updated_at) \
             VALUES ($1, $2, $3, $4, $5, $6, $7, $8, $9) \
             ON CONFLICT (order_id) DO UPDATE SET payment_intent_id = EXCLUDED.payment_intent_id, payment_method = EXCLUDED.payment_method, \
             status = EXCLUDED.status, amount = EXCLUDED.amount, currency = EXCLUDED.currency, updated_at = EXCLUDED.updated_at",
        )
        .bind(payment.id).bind(order_id).bind(&payment.payment_intent_id).bind(payment.payment_method.as_str()).bind(&payment.status)
        .bind(payment.amount.minor()).bind(&payment.currency).bind(payment.created_at).bind(payment.updated_at)
        .execute(&mut *tx).await
        .map_err(|e| match e {
            sqlx::Error::Database(db) if db.constraint() == Some(PAYMENT_INTENT_UNIQUE) => {
                SettlementError::DuplicatePayment { gateway_payment_id: payment.payment_intent_id.clone() }
            }
            other => other.into(),
        })?;

        if let Some(next) = transition.status_change() {
            sqlx::query("UPDATE orders SET payment_status = $2, updated_at = $3 WHERE id = $1")
                .bind(order_id).bind(next.as_str()).bind(now).execute(&mut *tx).await?;
        }

        let mut shortfalls = Vec::new();
        if transition.decrements_stock() {
            let items = sqlx::query_as::<_, ItemRow>(&format!("SELECT {ITEM_COLUMNS} FROM order_items oi JOIN order_groups og ON og.id = oi.group_id WHERE og.order_id = $1 ORDER BY oi.size_id, oi.id"))
                .bind(order_id).fetch_all(&mut *tx).await?;
            let mut size_ids: Vec<Uuid> = items.iter().map(|i| i.size_id).collect();
            size_ids.dedup();
            let mut stock = lock_stock(&mut tx, &size_ids).await?;

            for row in items {
                let item = OrderItem::try_from(row)?;
                let available = stock.get_mut(&item.size_id).ok_or(SettlementError::SizeNotFound(item.size_id))?;
                let decrement = decrement_stock(*available, item.quantity);
                sqlx::query("UPDATE sizes SET quantity = $2 WHERE id = $1")
                    .bind(item.size_id).bind(decrement.new_quantity).execute(&mut *tx).await?;
                if decrement.shortfall > 0 {
                    let shortfall = InventoryShortfall {
                        order_id, order_item_id: item.id, size_id: item.size_id, requested: item.quantity,
                        available: *available, shortfall: decrement.shortfall, recorded_at: now,
                    };
                    sqlx::query("UPDATE order_items SET status = $2 WHERE id = $1")
                        .bind(item.id).bind(OrderItemStatus::BackOrdered.as_str()).execute(&mut *tx).await?;
                    sqlx::query("INSERT INTO inventory_shortfalls (id, order_id, order_item_id, size_id, requested, available, shortfall, recorded_at) VALUES ($1, $2, $3, $4, $5, $6, $7, $8)")
                        .bind(Uuid::now_v7()).bind(order_id).bind(item.id).bind(item.size_id).bind(item.quantity as i32)
                        .bind(*available).bind(decrement.shortfall as i32).bind(now)
                        .execute(&mut *tx).await?;
                    shortfalls.push(shortfall);
                }
                *available = decrement.new_quantity;
            }
        }

        tx.commit().await?;
        Ok(CaptureReport { order_id, transition, payment, replaced_payment_id, shortfalls })
    }

    async fn find_group(&self, group_id: Uuid) -> Result<Option<OrderGroup>> {
        let Some(row) = sqlx::query_as::<_, GroupRow>("SELECT id, order_id, seller_id, subtotal, shipping_fees, discount, coupon_id, total, status FROM order_groups WHERE id = $1")
            .bind(group_id).fetch_optional(&self.pool).await? else { return Ok(None) };
        let items = sqlx::query_as::<_, ItemRow>(&format!("SELECT {ITEM_COLUMNS} FROM order_items oi WHERE oi.group_id = $1 ORDER BY oi.position"))
            .bind(group_id).fetch_all(&self.pool).await?
            .into_iter().map(OrderItem::try_from).collect::<Result<Vec<_>>>()?;
        Ok(Some(row.into_group(items)?))
    }

    async fn set_group_status(&self, group_id: Uuid, from: OrderGroupStatus, to: OrderGroupStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE order_groups SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2")
            .bind(group_id).bind(from.as_str()).bind(to.as_str()).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }

    async fn find_item(&self, item_id: Uuid) -> Result<Option<(OrderItem, Uuid)>> {
        let row: Option<(Uuid, Uuid, Uuid, Uuid, Uuid, i64, i32, String, Uuid)> = sqlx::query_as(
            "SELECT oi.id, oi.group_id, oi.product_id, oi.variant_id, oi.size_id, oi.unit_price, oi.quantity, oi.status, og.seller_id \
             FROM order_items oi JOIN order_groups og ON og.id = oi.group_id WHERE oi.id = $1",
        ).bind(item_id).fetch_optional(&self.pool).await?;
        row.map(|(id, group_id, product_id, variant_id, size_id, unit_price, quantity, status, seller_id)| {
            let item = OrderItem::try_from(ItemRow { id, group_id, product_id, variant_id, size_id, unit_price, quantity, status })?;
            Ok((item, seller_id))
        }).transpose()
    }

    async fn set_item_status(&self, item_id: Uuid, from: OrderItemStatus, to: OrderItemStatus) -> Result<bool> {
        let result = sqlx::query("UPDATE order_items SET status = $3, updated_at = NOW() WHERE id = $1 AND status = $2")
            .bind(item_id).bind(from.as_str()).bind(to.as_str()).execute(&self.pool).await?;
        Ok(result.rows_affected() == 1)
    }
}
