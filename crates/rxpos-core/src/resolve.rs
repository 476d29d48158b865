//! # Effective Packaging Resolver
//!
//! Merges the shared catalog with one shop's overrides into the single
//! ordered view sales and listing code is allowed to read.
//!
//! ## The Merge
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │              Catalog            +          Shop Overrides               │
//! │                                                                         │
//! │  Tablet (base, qty 1)                                                   │
//! │  Strip  (qty 10, default) ◄──── global override: price 3.50            │
//! │  Box    (qty 100)         ◄──── global override: hidden                │
//! │                           ◄──── custom level: "Half Strip" (0.5×Strip) │
//! │                                                                         │
//! │                         resolve(shop, drug)                             │
//! │                                │                                        │
//! │                                ▼                                        │
//! │  [ Tablet    Global               qty 1    price: flat    seq 1 ]      │
//! │  [ Strip     GlobalWithOverride   qty 10   price: 3.50    seq 2 ]★     │
//! │  [ Box       GlobalWithOverride   qty 100  hidden         seq 3 ]      │
//! │  [ HalfStrip Custom               qty 5    price: flat    seq 4 ]      │
//! │                                                                         │
//! │  ★ exactly one entry carries is_default_sell_unit                      │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Why a Sum Type?
//! Each resolved entry is one of three cases - untouched catalog level,
//! overridden catalog level, or shop-defined custom level. Modeling the
//! case as [`LevelSource`] instead of a flat nullable-field record lets the
//! compiler catch a missing merge arm.
//!
//! Consumers must only read this resolved list, never raw catalog +
//! overrides.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};

use crate::error::{CoreResult, ValidationError};
use crate::money::Money;
use crate::overrides::{OverrideSet, ShopPackagingOverride};
use crate::packaging::{PackagingInfo, PackagingLevel};
use crate::pricing::ShopPricing;

// =============================================================================
// Level Source
// =============================================================================

/// Where a resolved packaging level came from.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum LevelSource {
    /// Catalog level with no shop customization.
    Global { level_id: String },
    /// Catalog level merged with a shop's global override.
    GlobalWithOverride { level_id: String, override_id: String },
    /// Shop-defined custom level with no catalog counterpart.
    Custom { override_id: String },
}

impl LevelSource {
    /// Whether the level exists in the shared catalog.
    pub fn is_global(&self) -> bool {
        match self {
            LevelSource::Global { .. } | LevelSource::GlobalWithOverride { .. } => true,
            LevelSource::Custom { .. } => false,
        }
    }
}

// =============================================================================
// Effective Packaging Level
// =============================================================================

/// One sellable-unit entry of the resolved per-shop view.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct EffectivePackagingLevel {
    /// Provenance of this entry (catalog / override / custom).
    pub source: LevelSource,

    /// Unit name shown on sales screens.
    pub unit_name: String,

    /// Effective sellability after the override merge.
    pub is_sellable: bool,

    /// Whether this is the shop's default sell unit. Exactly one entry of a
    /// resolved list carries `true`.
    pub is_default_sell_unit: bool,

    /// The catalog's base-unit quantity; `None` for custom levels.
    pub global_base_unit_quantity: Option<f64>,

    /// Base-unit quantity after override re-ratios are applied.
    pub effective_base_unit_quantity: f64,

    /// Resolved price: override price, else the shop price book, else the
    /// catalog-suggested price.
    pub selling_price: Money,

    /// 1-based display position: catalog order, then custom levels.
    pub sequence: u32,
}

impl EffectivePackagingLevel {
    /// Whether the level exists in the shared catalog.
    #[inline]
    pub fn is_global(&self) -> bool {
        self.source.is_global()
    }
}

// =============================================================================
// Resolution
// =============================================================================

/// Resolves the effective packaging view for one (shop, drug).
///
/// Walks catalog levels in hierarchy order, merging each with its matching
/// global override, then appends the shop's custom levels ordered by
/// `custom_level_order` / creation. Effective base-unit quantities are
/// recomputed from override ratios against the *parent's effective*
/// quantity, so a re-ratioed strip re-sizes every box above it.
///
/// ## Price Fallback Chain
/// ```text
/// override.selling_price → pricing.unit_prices[name] → pricing.selling_price
///                        → level.suggested_price → zero
/// ```
/// A zero flat price is treated as unset so the catalog suggestion can
/// still apply.
pub fn resolve_effective_packaging(
    catalog: &PackagingInfo,
    overrides: &OverrideSet,
    pricing: Option<&ShopPricing>,
) -> CoreResult<Vec<EffectivePackagingLevel>> {
    let mut entries: Vec<EffectivePackagingLevel> = Vec::new();

    // Effective base-unit quantity per catalog level id. Catalog levels are
    // sorted by level_number, so a parent is always computed before its
    // children.
    let mut level_qty: HashMap<String, f64> = HashMap::new();

    // An override default flag anywhere in the set supersedes the catalog's
    // suggested default.
    let override_has_default = overrides.default_override().is_some();

    let mut sequence: u32 = 0;
    for level in &catalog.levels {
        sequence += 1;
        let ov = overrides.for_level(&level.id);

        let effective_qty = match ov.and_then(|o| o.override_quantity_per_parent) {
            Some(ratio) => match &level.parent_level_id {
                Some(parent_id) => {
                    ratio * level_qty.get(parent_id).copied().unwrap_or(1.0)
                }
                // Re-ratioing the base level is meaningless; keep catalog.
                None => level.base_unit_quantity,
            },
            None => level.base_unit_quantity,
        };
        level_qty.insert(level.id.clone(), effective_qty);

        let is_sellable = ov
            .and_then(|o| o.is_sellable)
            .unwrap_or(level.is_sellable);
        let is_default = if override_has_default {
            ov.is_some_and(|o| o.is_default_sell_unit)
        } else {
            level.is_default
        };

        let source = match ov {
            Some(o) => LevelSource::GlobalWithOverride {
                level_id: level.id.clone(),
                override_id: o.id.clone(),
            },
            None => LevelSource::Global {
                level_id: level.id.clone(),
            },
        };

        entries.push(EffectivePackagingLevel {
            source,
            unit_name: level.unit_name.clone(),
            is_sellable,
            is_default_sell_unit: is_default,
            global_base_unit_quantity: Some(level.base_unit_quantity),
            effective_base_unit_quantity: effective_qty,
            selling_price: resolve_price(ov, &level.unit_name, pricing, Some(level)),
            sequence,
        });
    }

    // Custom levels, each resolving its own parent chain. Memoized so a
    // chain of custom levels is walked once; a visited set guards against
    // parent edits that introduced a cycle.
    let mut custom_qty: HashMap<String, f64> = HashMap::new();
    for ov in overrides.custom_levels_ordered() {
        sequence += 1;
        let mut visiting = HashSet::new();
        let effective_qty =
            custom_effective_qty(ov, overrides, &level_qty, &mut custom_qty, &mut visiting)?;

        let unit_name = ov
            .custom_unit_name
            .clone()
            .ok_or_else(|| ValidationError::Required {
                field: "custom_unit_name".to_string(),
            })?;
        let is_default = if override_has_default {
            ov.is_default_sell_unit
        } else {
            false
        };

        entries.push(EffectivePackagingLevel {
            source: LevelSource::Custom {
                override_id: ov.id.clone(),
            },
            unit_name: unit_name.clone(),
            is_sellable: ov.is_sellable.unwrap_or(true),
            is_default_sell_unit: is_default,
            global_base_unit_quantity: None,
            effective_base_unit_quantity: effective_qty,
            selling_price: resolve_price(Some(ov), &unit_name, pricing, None),
            sequence,
        });
    }

    enforce_single_default(&mut entries);
    Ok(entries)
}

/// Effective base-unit quantity of a custom level:
/// `ratio × parent's effective quantity`, following the parent chain down
/// to the catalog.
fn custom_effective_qty(
    ov: &ShopPackagingOverride,
    overrides: &OverrideSet,
    level_qty: &HashMap<String, f64>,
    cache: &mut HashMap<String, f64>,
    visiting: &mut HashSet<String>,
) -> CoreResult<f64> {
    if let Some(&qty) = cache.get(&ov.id) {
        return Ok(qty);
    }
    if !visiting.insert(ov.id.clone()) {
        return Err(ValidationError::CyclicParentChain {
            unit_name: ov
                .custom_unit_name
                .clone()
                .unwrap_or_else(|| ov.id.clone()),
        }
        .into());
    }

    let ratio = ov
        .override_quantity_per_parent
        .ok_or_else(|| ValidationError::Required {
            field: "override_quantity_per_parent".to_string(),
        })?;

    let parent_qty = match (&ov.parent_packaging_level_id, &ov.parent_override_id) {
        (Some(level_id), _) => {
            level_qty
                .get(level_id)
                .copied()
                .ok_or_else(|| crate::error::CoreError::NotFound {
                    entity: "packaging level",
                    id: level_id.clone(),
                })?
        }
        (None, Some(override_id)) => {
            let parent =
                overrides
                    .get(override_id)
                    .ok_or_else(|| crate::error::CoreError::NotFound {
                        entity: "parent override",
                        id: override_id.clone(),
                    })?;
            custom_effective_qty(parent, overrides, level_qty, cache, visiting)?
        }
        (None, None) => {
            return Err(ValidationError::Required {
                field: "parent_packaging_level_id or parent_override_id".to_string(),
            }
            .into())
        }
    };

    let qty = ratio * parent_qty;
    cache.insert(ov.id.clone(), qty);
    Ok(qty)
}

/// The price fallback chain shared by global and custom entries.
fn resolve_price(
    ov: Option<&ShopPackagingOverride>,
    unit_name: &str,
    pricing: Option<&ShopPricing>,
    level: Option<&PackagingLevel>,
) -> Money {
    if let Some(price) = ov.and_then(|o| o.selling_price) {
        return price;
    }
    if let Some(pricing) = pricing {
        if let Some(price) = pricing.unit_price(unit_name) {
            return price;
        }
        if !pricing.selling_price.is_zero() {
            return pricing.selling_price;
        }
    }
    level
        .and_then(|l| l.suggested_price)
        .unwrap_or_else(Money::zero)
}

/// Post-merge guarantee: exactly one entry is the default sell unit.
///
/// Duplicate defaults keep the first (earlier sequence wins); a list with
/// no default falls back to the first sellable entry, else the first entry.
fn enforce_single_default(entries: &mut [EffectivePackagingLevel]) {
    let mut seen = false;
    for entry in entries.iter_mut() {
        if entry.is_default_sell_unit {
            if seen {
                entry.is_default_sell_unit = false;
            }
            seen = true;
        }
    }
    if !seen && !entries.is_empty() {
        let idx = entries
            .iter()
            .position(|e| e.is_sellable)
            .unwrap_or(0);
        entries[idx].is_default_sell_unit = true;
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use crate::packaging::PackagingLevel;
    use crate::types::UnitType;

    fn catalog() -> PackagingInfo {
        let mut info = PackagingInfo::new("amox-500", UnitType::Count, "tab", "Tablet");
        info.add_level(PackagingLevel::base("Tablet")).unwrap();
        info.add_level(PackagingLevel::new("Strip", 2, 10.0).as_default())
            .unwrap();
        info.add_level(PackagingLevel::new("Box", 3, 100.0)).unwrap();
        info
    }

    fn level_id(catalog: &PackagingInfo, name: &str) -> String {
        catalog.level_by_name(name).unwrap().id.clone()
    }

    #[test]
    fn test_flat_price_scenario() {
        // Tablet(qty 1), Strip(qty 10, default, sellable), Box(qty 100,
        // sellable); flat selling price 24.99, no overrides.
        let catalog = catalog();
        let overrides = OverrideSet::new("shop-1", "amox-500");
        let pricing = ShopPricing::new(Money::zero(), Money::from_cents(2499));

        let resolved =
            resolve_effective_packaging(&catalog, &overrides, Some(&pricing)).unwrap();

        assert_eq!(resolved.len(), 3);
        let default: Vec<_> = resolved.iter().filter(|e| e.is_default_sell_unit).collect();
        assert_eq!(default.len(), 1);
        assert_eq!(default[0].unit_name, "Strip");

        let boxed = resolved.iter().find(|e| e.unit_name == "Box").unwrap();
        assert_eq!(boxed.selling_price.cents(), 2499);
        assert!(matches!(boxed.source, LevelSource::Global { .. }));
        assert_eq!(boxed.effective_base_unit_quantity, 100.0);
    }

    #[test]
    fn test_override_price_and_sellability_win() {
        let catalog = catalog();
        let mut overrides = OverrideSet::new("shop-1", "amox-500");
        overrides
            .add(
                ShopPackagingOverride::global("shop-1", "amox-500", level_id(&catalog, "Strip"))
                    .with_price(Money::from_cents(350)),
                &catalog,
            )
            .unwrap();
        overrides
            .add(
                ShopPackagingOverride::global("shop-1", "amox-500", level_id(&catalog, "Box"))
                    .sellable(false),
                &catalog,
            )
            .unwrap();
        let pricing = ShopPricing::new(Money::zero(), Money::from_cents(2499));

        let resolved =
            resolve_effective_packaging(&catalog, &overrides, Some(&pricing)).unwrap();

        let strip = resolved.iter().find(|e| e.unit_name == "Strip").unwrap();
        assert_eq!(strip.selling_price.cents(), 350);
        assert!(matches!(
            strip.source,
            LevelSource::GlobalWithOverride { .. }
        ));

        let boxed = resolved.iter().find(|e| e.unit_name == "Box").unwrap();
        assert!(!boxed.is_sellable);
        // Hidden, not removed: the entry stays in the resolved view.
        assert_eq!(resolved.len(), 3);
    }

    #[test]
    fn test_unit_price_map_beats_flat_price() {
        let catalog = catalog();
        let overrides = OverrideSet::new("shop-1", "amox-500");
        let mut pricing = ShopPricing::new(Money::zero(), Money::from_cents(2499));
        pricing.set_unit_price("Strip", Money::from_cents(299));

        let resolved =
            resolve_effective_packaging(&catalog, &overrides, Some(&pricing)).unwrap();
        let strip = resolved.iter().find(|e| e.unit_name == "Strip").unwrap();
        assert_eq!(strip.selling_price.cents(), 299);
    }

    #[test]
    fn test_suggested_price_when_no_shop_pricing() {
        let mut catalog = PackagingInfo::new("d", UnitType::Count, "tab", "Tablet");
        catalog
            .add_level(PackagingLevel::base("Tablet").with_suggested_price(Money::from_cents(15)))
            .unwrap();
        let overrides = OverrideSet::new("shop-1", "d");

        let resolved = resolve_effective_packaging(&catalog, &overrides, None).unwrap();
        assert_eq!(resolved[0].selling_price.cents(), 15);
    }

    #[test]
    fn test_override_ratio_recomputes_children() {
        // Shop re-ratios Strip to 12 tablets; Box (10 strips) follows.
        let catalog = catalog();
        let mut overrides = OverrideSet::new("shop-1", "amox-500");
        let mut strip_ov =
            ShopPackagingOverride::global("shop-1", "amox-500", level_id(&catalog, "Strip"));
        strip_ov.override_quantity_per_parent = Some(12.0);
        overrides.add(strip_ov, &catalog).unwrap();
        let mut box_ov =
            ShopPackagingOverride::global("shop-1", "amox-500", level_id(&catalog, "Box"));
        box_ov.override_quantity_per_parent = Some(10.0);
        overrides.add(box_ov, &catalog).unwrap();

        let resolved = resolve_effective_packaging(&catalog, &overrides, None).unwrap();
        let strip = resolved.iter().find(|e| e.unit_name == "Strip").unwrap();
        let boxed = resolved.iter().find(|e| e.unit_name == "Box").unwrap();

        assert_eq!(strip.effective_base_unit_quantity, 12.0);
        assert_eq!(strip.global_base_unit_quantity, Some(10.0));
        assert_eq!(boxed.effective_base_unit_quantity, 120.0);
    }

    #[test]
    fn test_custom_levels_append_after_globals() {
        let catalog = catalog();
        let mut overrides = OverrideSet::new("shop-1", "amox-500");
        let half_id = overrides
            .add(
                ShopPackagingOverride::custom("shop-1", "amox-500", "Half Strip", 0.5)
                    .with_parent_level(level_id(&catalog, "Strip")),
                &catalog,
            )
            .unwrap()
            .id
            .clone();
        overrides
            .add(
                ShopPackagingOverride::custom("shop-1", "amox-500", "Quarter Strip", 0.5)
                    .with_parent_override(half_id),
                &catalog,
            )
            .unwrap();

        let resolved = resolve_effective_packaging(&catalog, &overrides, None).unwrap();
        assert_eq!(resolved.len(), 5);

        let half = resolved.iter().find(|e| e.unit_name == "Half Strip").unwrap();
        assert!(!half.is_global());
        assert_eq!(half.effective_base_unit_quantity, 5.0);
        assert_eq!(half.global_base_unit_quantity, None);
        assert_eq!(half.sequence, 4);

        // Chained custom parent: quarter = 0.5 × half = 2.5 tablets.
        let quarter = resolved
            .iter()
            .find(|e| e.unit_name == "Quarter Strip")
            .unwrap();
        assert_eq!(quarter.effective_base_unit_quantity, 2.5);
        assert_eq!(quarter.sequence, 5);
    }

    #[test]
    fn test_override_default_supersedes_catalog_default() {
        let catalog = catalog();
        let mut overrides = OverrideSet::new("shop-1", "amox-500");
        overrides
            .add(
                ShopPackagingOverride::custom("shop-1", "amox-500", "Half Strip", 0.5)
                    .with_parent_level(level_id(&catalog, "Strip"))
                    .as_default(),
                &catalog,
            )
            .unwrap();

        let resolved = resolve_effective_packaging(&catalog, &overrides, None).unwrap();
        let defaults: Vec<_> = resolved
            .iter()
            .filter(|e| e.is_default_sell_unit)
            .collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].unit_name, "Half Strip");
    }

    #[test]
    fn test_at_most_one_default_always() {
        // No default anywhere: resolver still elects exactly one.
        let mut catalog = PackagingInfo::new("d", UnitType::Count, "tab", "Tablet");
        catalog.add_level(PackagingLevel::base("Tablet")).unwrap();
        catalog
            .add_level(PackagingLevel::new("Strip", 2, 10.0))
            .unwrap();
        let overrides = OverrideSet::new("shop-1", "d");

        let resolved = resolve_effective_packaging(&catalog, &overrides, None).unwrap();
        assert_eq!(
            resolved.iter().filter(|e| e.is_default_sell_unit).count(),
            1
        );
    }

    #[test]
    fn test_cyclic_custom_parents_detected() {
        let catalog = catalog();
        let mut overrides = OverrideSet::new("shop-1", "amox-500");
        let a = overrides
            .add(
                ShopPackagingOverride::custom("shop-1", "amox-500", "A", 0.5)
                    .with_parent_level(level_id(&catalog, "Strip")),
                &catalog,
            )
            .unwrap()
            .id
            .clone();
        let b = overrides
            .add(
                ShopPackagingOverride::custom("shop-1", "amox-500", "B", 0.5)
                    .with_parent_override(a.clone()),
                &catalog,
            )
            .unwrap()
            .id
            .clone();
        // Mutate A to point back at B (parent edits can introduce cycles).
        let a_ov = overrides.overrides.iter_mut().find(|o| o.id == a).unwrap();
        a_ov.parent_packaging_level_id = None;
        a_ov.parent_override_id = Some(b);

        let err = resolve_effective_packaging(&catalog, &overrides, None).unwrap_err();
        assert!(matches!(
            err,
            crate::error::CoreError::Validation(ValidationError::CyclicParentChain { .. })
        ));
    }
}
