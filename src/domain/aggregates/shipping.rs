//! Seller shipping rates

use serde::{Deserialize, Serialize};
use std::collections::HashMap;
use uuid::Uuid;
use crate::domain::value_objects::Money;

#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "UPPERCASE")]
pub enum ShippingMethod { Item, Weight, Fixed }

impl std::str::FromStr for ShippingMethod {
    type Err = String;
    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.to_ascii_uppercase().as_str() {
            "ITEM" => Ok(Self::Item),
            "WEIGHT" => Ok(Self::Weight),
            "FIXED" => Ok(Self::Fixed),
            other => Err(format!("unknown shipping method {}", other)),
        }
    }
}

/// A shipping rate with all fees already in minor units.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "method", rename_all = "UPPERCASE")]
pub enum ShippingRate {
    /// First unit pays `base_fee`, every further unit pays `extra_fee`.
    Item { base_fee: Money, extra_fee: Money },
    Weight { fee_per_kg: Money },
    Fixed { fee: Money },
}

impl ShippingRate {
    /// Rebuilds a rate from a rate table row. `extra` is only read for ITEM.
    pub fn from_parts(method: ShippingMethod, base: Money, extra: Money) -> Self {
        match method {
            ShippingMethod::Item => Self::Item { base_fee: base, extra_fee: extra },
            ShippingMethod::Weight => Self::Weight { fee_per_kg: base },
            ShippingMethod::Fixed => Self::Fixed { fee: base },
        }
    }
}

/// All shipping rates configured by one seller.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct SellerShipping {
    pub seller_id: Uuid,
    pub default_rate: Option<ShippingRate>,
    /// Keyed by ISO 3166-1 alpha-2 country code, uppercase.
    pub country_rates: HashMap<String, ShippingRate>,
}

impl SellerShipping {
    pub fn new(seller_id: Uuid) -> Self { Self { seller_id, ..Default::default() } }

    pub fn with_default(mut self, rate: ShippingRate) -> Self { self.set_rate(None, rate); self }

    pub fn with_country(mut self, country: &str, rate: ShippingRate) -> Self { self.set_rate(Some(country), rate); self }

    /// Stores `rate` for `country`, or as the default when no country is given.
    pub fn set_rate(&mut self, country: Option<&str>, rate: ShippingRate) {
        match country {
            Some(country) => { self.country_rates.insert(country.to_ascii_uppercase(), rate); }
            None => self.default_rate = Some(rate),
        }
    }

    /// Country-specific rate, falling back to the store-wide default.
    pub fn resolve(&self, country: &str) -> Option<&ShippingRate> {
        self.country_rates.get(&country.to_ascii_uppercase()).or(self.default_rate.as_ref())
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_from_parts_ignores_extra_outside_item() {
        let weight = ShippingRate::from_parts(ShippingMethod::Weight, Money::cents(250), Money::cents(99));
        assert_eq!(weight, ShippingRate::Weight { fee_per_kg: Money::cents(250) });
        let item = ShippingRate::from_parts(ShippingMethod::Item, Money::cents(500), Money::cents(200));
        assert_eq!(item, ShippingRate::Item { base_fee: Money::cents(500), extra_fee: Money::cents(200) });
    }

    #[test]
    fn test_resolve_falls_back_to_default() {
        let shipping = SellerShipping::new(Uuid::new_v4())
            .with_default(ShippingRate::Fixed { fee: Money::cents(1000) })
            .with_country("ng", ShippingRate::Fixed { fee: Money::cents(300) });
        assert_eq!(shipping.resolve("NG"), Some(&ShippingRate::Fixed { fee: Money::cents(300) }));
        assert_eq!(shipping.resolve("US"), Some(&ShippingRate::Fixed { fee: Money::cents(1000) }));
    }

    #[test]
    fn test_serde_tagged_by_method() {
        let json = serde_json::json!({"method": "FIXED", "fee": 1000});
        let rate: ShippingRate = serde_json::from_value(json).unwrap();
        assert_eq!(rate, ShippingRate::Fixed { fee: Money::cents(1000) });
    }
}
