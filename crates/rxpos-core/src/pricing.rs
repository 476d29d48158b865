//! # Shop Pricing
//!
//! Per-shop price book for one drug: cost, flat selling price, discount,
//! tax rate, and per-unit-name price entries.
//!
//! ## Price Resolution
//! The flat `selling_price` is the fallback when no per-unit entry exists;
//! the full fallback chain (override price → shop price → catalog suggested
//! price) lives in [`crate::resolve`].

use serde::{Deserialize, Serialize};
use std::collections::HashMap;

use crate::money::Money;
use crate::DEFAULT_CURRENCY;

// =============================================================================
// Shop Pricing
// =============================================================================

/// Price book one shop keeps for one drug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopPricing {
    /// Acquisition cost per default sell unit.
    pub cost_price: Money,

    /// Flat selling price - the fallback for units with no entry in
    /// `unit_prices`.
    pub selling_price: Money,

    /// Shop-wide discount in basis points (1000 = 10%).
    pub discount_bps: u32,

    /// ISO currency code. Single currency per price book; no conversion.
    pub currency: String,

    /// Tax rate in basis points (825 = 8.25%).
    pub tax_rate_bps: u32,

    /// Per-unit-name price entries, keyed by lowercase unit name.
    pub unit_prices: HashMap<String, Money>,
}

impl ShopPricing {
    /// Creates a price book with a cost and flat selling price.
    pub fn new(cost_price: Money, selling_price: Money) -> Self {
        ShopPricing {
            cost_price,
            selling_price,
            discount_bps: 0,
            currency: DEFAULT_CURRENCY.to_string(),
            tax_rate_bps: 0,
            unit_prices: HashMap::new(),
        }
    }

    /// Price for a packaging unit: the per-unit entry when present, else
    /// the flat selling price.
    pub fn price_for_unit(&self, unit_name: &str) -> Money {
        self.unit_price(unit_name).unwrap_or(self.selling_price)
    }

    /// The per-unit entry only (no flat fallback). Case-insensitive.
    pub fn unit_price(&self, unit_name: &str) -> Option<Money> {
        self.unit_prices
            .get(&unit_name.trim().to_lowercase())
            .copied()
    }

    /// Writes one per-unit price entry.
    pub fn set_unit_price(&mut self, unit_name: &str, price: Money) {
        self.unit_prices
            .insert(unit_name.trim().to_lowercase(), price);
    }

    /// Removes a per-unit price entry, returning the old value.
    pub fn clear_unit_price(&mut self, unit_name: &str) -> Option<Money> {
        self.unit_prices.remove(&unit_name.trim().to_lowercase())
    }

    /// Selling price for a unit after the shop-wide discount.
    pub fn discounted_price_for_unit(&self, unit_name: &str) -> Money {
        self.price_for_unit(unit_name)
            .apply_discount_bps(self.discount_bps)
    }
}

impl Default for ShopPricing {
    fn default() -> Self {
        ShopPricing::new(Money::zero(), Money::zero())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_flat_fallback() {
        let mut pricing = ShopPricing::new(Money::from_cents(1500), Money::from_cents(2499));
        pricing.set_unit_price("Strip", Money::from_cents(299));

        assert_eq!(pricing.price_for_unit("Strip").cents(), 299);
        // No entry for Box: flat selling price applies
        assert_eq!(pricing.price_for_unit("Box").cents(), 2499);
    }

    #[test]
    fn test_unit_price_is_case_insensitive() {
        let mut pricing = ShopPricing::default();
        pricing.set_unit_price("Strip", Money::from_cents(299));

        assert_eq!(pricing.unit_price("sTrIp").unwrap().cents(), 299);
        assert_eq!(pricing.unit_price(" strip ").unwrap().cents(), 299);
        assert!(pricing.unit_price("Box").is_none());
    }

    #[test]
    fn test_clear_unit_price() {
        let mut pricing = ShopPricing::default();
        pricing.set_unit_price("Box", Money::from_cents(2499));
        assert_eq!(pricing.clear_unit_price("box").unwrap().cents(), 2499);
        assert!(pricing.unit_price("Box").is_none());
    }

    #[test]
    fn test_discounted_price() {
        let mut pricing = ShopPricing::new(Money::zero(), Money::from_cents(1000));
        pricing.discount_bps = 1000; // 10%
        assert_eq!(pricing.discounted_price_for_unit("anything").cents(), 900);
    }
}
