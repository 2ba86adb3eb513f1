//! Seller-scoped coupon

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;
use crate::domain::value_objects::DiscountPercent;

#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct Coupon {
    pub id: Uuid,
    pub code: String,
    pub seller_id: Uuid,
    pub discount: DiscountPercent,
    pub starts_at: DateTime<Utc>,
    pub ends_at: DateTime<Utc>,
}

impl Coupon {
    /// Active over the half-open window `[starts_at, ends_at)`.
    pub fn is_active_at(&self, now: DateTime<Utc>) -> bool { self.starts_at <= now && now < self.ends_at }

    pub fn belongs_to(&self, seller_id: Uuid) -> bool { self.seller_id == seller_id }
}

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::Duration;

    #[test]
    fn test_window_is_half_open() {
        let start = Utc::now();
        let coupon = Coupon {
            id: Uuid::new_v4(), code: "TEN".into(), seller_id: Uuid::new_v4(), discount: DiscountPercent::new(10).unwrap(),
            starts_at: start, ends_at: start + Duration::days(1),
        };
        assert!(coupon.is_active_at(start));
        assert!(!coupon.is_active_at(start + Duration::days(1)));
        assert!(!coupon.is_active_at(start - Duration::seconds(1)));
    }
}
