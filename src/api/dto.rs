//! Request bodies.

use serde::Deserialize;
use std::collections::HashSet;
use uuid::Uuid;
use validator::{Validate, ValidationError};
use crate::domain::aggregates::{AppliedCoupon, CartLineItem, CartSnapshot, GatewayConfirmation};

#[derive(Debug, Deserialize, Validate)]
pub struct CartRequest {
    pub shipping_address_id: Uuid,
    #[validate(length(max = 200, message = "cart holds at most 200 lines"))]
    pub items: Vec<CartLineItem>,
    #[serde(default)]
    #[validate(custom = "validate_coupons")]
    pub coupons: Vec<AppliedCoupon>,
}

impl CartRequest {
    pub fn into_cart(self) -> (Uuid, CartSnapshot) {
        let mut cart = CartSnapshot { items: self.items, coupons: Vec::new() };
        for coupon in self.coupons {
            cart.apply_coupon(coupon.seller_id, coupon.code.trim());
        }
        (self.shipping_address_id, cart)
    }
}

fn validate_coupons(coupons: &Vec<AppliedCoupon>) -> Result<(), ValidationError> {
    let mut sellers = HashSet::new();
    for coupon in coupons {
        let code = coupon.code.trim();
        if code.is_empty() || code.len() > 64 {
            return Err(ValidationError::new("coupon_code_length"));
        }
        if !sellers.insert(coupon.seller_id) {
            return Err(ValidationError::new("one_coupon_per_seller"));
        }
    }
    Ok(())
}

#[derive(Debug, Deserialize, Validate)]
pub struct StripeConfirmRequest {
    #[validate(length(min = 1, max = 255))]
    pub payment_intent_id: String,
}

#[derive(Debug, Deserialize, Validate)]
pub struct PaypalCaptureRequest {
    #[validate(length(min = 1, max = 255))]
    pub gateway_order_id: String,
}

/// Operator replay of a confirmation received out of band.
#[derive(Debug, Deserialize)]
pub struct ReconcileRequest {
    pub confirmation: GatewayConfirmation,
}

#[derive(Debug, Deserialize, Validate)]
pub struct StatusUpdateRequest {
    #[validate(length(min = 1, max = 32))]
    pub status: String,
}
