//! # Packaging Override Store
//!
//! Per-shop customizations layered on the shared packaging catalog.
//!
//! ## Two Kinds of Override
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                     ShopPackagingOverride                               │
//! │                                                                         │
//! │  GLOBAL override (packaging_level_id = Some)                           │
//! │  ├── repoints price / sellability / default flag / min sale qty        │
//! │  ├── may re-ratio via override_quantity_per_parent                     │
//! │  └── must NOT set custom-parent fields                                 │
//! │                                                                         │
//! │  CUSTOM level (packaging_level_id = None)                              │
//! │  ├── requires custom_unit_name + override_quantity_per_parent > 0      │
//! │  └── parent is EXACTLY ONE of:                                         │
//! │      • parent_packaging_level_id  (anchors to the catalog)             │
//! │      • parent_override_id         (anchors to another custom level)    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! At most one override per (shop, drug) carries `is_default_sell_unit`;
//! setting it clears the flag everywhere else in the set. The propagation of
//! the default unit name into `ShopInventory::shop_specific_sell_unit` is
//! orchestrated by the store layer, which owns both aggregates.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::packaging::PackagingInfo;
use crate::validation::{validate_ratio, validate_unit_name};

// =============================================================================
// Shop Packaging Override
// =============================================================================

/// One per-shop customization of a drug's packaging.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopPackagingOverride {
    /// Unique identifier (UUID v4). Assigned on insert when empty.
    pub id: String,

    /// Shop this override belongs to.
    pub shop_id: String,

    /// Drug being customized.
    pub drug_id: String,

    /// `Some` → global override of that catalog level; `None` → custom level.
    pub packaging_level_id: Option<String>,

    /// Custom-level parent anchored to a catalog level.
    pub parent_packaging_level_id: Option<String>,

    /// Custom-level parent anchored to another custom override.
    pub parent_override_id: Option<String>,

    /// Unit name of a custom level. Required when custom, unique
    /// case-insensitively per (shop, drug).
    pub custom_unit_name: Option<String>,

    /// How many parent units one of this unit contains (a half strip of a
    /// 10-tablet strip has ratio 0.5). Required (> 0) for custom levels;
    /// optional re-ratio for global overrides.
    pub override_quantity_per_parent: Option<f64>,

    /// Shop-set selling price for this unit.
    pub selling_price: Option<Money>,

    /// Shop-set sellability; `None` defers to the catalog level.
    pub is_sellable: Option<bool>,

    /// Whether this unit is the shop's default sell unit.
    pub is_default_sell_unit: bool,

    /// Shop-set minimum sale quantity.
    pub minimum_sale_quantity: Option<f64>,

    /// Display position of a custom level after the global levels.
    pub custom_level_order: Option<u32>,
}

impl ShopPackagingOverride {
    /// Creates a global override of an existing catalog level.
    pub fn global(
        shop_id: impl Into<String>,
        drug_id: impl Into<String>,
        packaging_level_id: impl Into<String>,
    ) -> Self {
        ShopPackagingOverride {
            id: String::new(),
            shop_id: shop_id.into(),
            drug_id: drug_id.into(),
            packaging_level_id: Some(packaging_level_id.into()),
            parent_packaging_level_id: None,
            parent_override_id: None,
            custom_unit_name: None,
            override_quantity_per_parent: None,
            selling_price: None,
            is_sellable: None,
            is_default_sell_unit: false,
            minimum_sale_quantity: None,
            custom_level_order: None,
        }
    }

    /// Creates a custom level. A parent must be attached with
    /// [`with_parent_level`](Self::with_parent_level) or
    /// [`with_parent_override`](Self::with_parent_override).
    pub fn custom(
        shop_id: impl Into<String>,
        drug_id: impl Into<String>,
        custom_unit_name: impl Into<String>,
        quantity_per_parent: f64,
    ) -> Self {
        ShopPackagingOverride {
            id: String::new(),
            shop_id: shop_id.into(),
            drug_id: drug_id.into(),
            packaging_level_id: None,
            parent_packaging_level_id: None,
            parent_override_id: None,
            custom_unit_name: Some(custom_unit_name.into()),
            override_quantity_per_parent: Some(quantity_per_parent),
            selling_price: None,
            is_sellable: None,
            is_default_sell_unit: false,
            minimum_sale_quantity: None,
            custom_level_order: None,
        }
    }

    /// Anchors a custom level to a catalog level.
    pub fn with_parent_level(mut self, parent_packaging_level_id: impl Into<String>) -> Self {
        self.parent_packaging_level_id = Some(parent_packaging_level_id.into());
        self
    }

    /// Anchors a custom level to another custom override.
    pub fn with_parent_override(mut self, parent_override_id: impl Into<String>) -> Self {
        self.parent_override_id = Some(parent_override_id.into());
        self
    }

    /// Sets the shop selling price for this unit.
    pub fn with_price(mut self, price: Money) -> Self {
        self.selling_price = Some(price);
        self
    }

    /// Sets shop-level sellability.
    pub fn sellable(mut self, sellable: bool) -> Self {
        self.is_sellable = Some(sellable);
        self
    }

    /// Flags this unit as the shop's default sell unit.
    pub fn as_default(mut self) -> Self {
        self.is_default_sell_unit = true;
        self
    }

    /// Sets the display order of a custom level.
    pub fn with_order(mut self, order: u32) -> Self {
        self.custom_level_order = Some(order);
        self
    }

    /// Whether this override targets an existing catalog level.
    #[inline]
    pub fn is_global(&self) -> bool {
        self.packaging_level_id.is_some()
    }

    /// Whether this override defines a custom level.
    #[inline]
    pub fn is_custom(&self) -> bool {
        self.packaging_level_id.is_none()
    }
}

// =============================================================================
// Override Set
// =============================================================================

/// All overrides one shop holds for one drug, in creation order.
///
/// Custom levels resolve "after globals by custom_level_order / creation",
/// so insertion order is meaningful and preserved.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OverrideSet {
    pub shop_id: String,
    pub drug_id: String,
    pub overrides: Vec<ShopPackagingOverride>,
}

impl OverrideSet {
    /// Creates an empty set for one (shop, drug).
    pub fn new(shop_id: impl Into<String>, drug_id: impl Into<String>) -> Self {
        OverrideSet {
            shop_id: shop_id.into(),
            drug_id: drug_id.into(),
            overrides: Vec::new(),
        }
    }

    /// Adds an override, enforcing the creation validation order:
    ///
    /// 1. Dual-parent specification is rejected outright
    /// 2. Custom levels: name + ratio required, duplicate name rejected,
    ///    unresolved `parent_override_id` rejected
    /// 3. Global levels: the catalog level must exist, an already-overridden
    ///    level is rejected (use [`update`](Self::update) instead), and
    ///    custom-parent fields are rejected
    ///
    /// On success the override id is assigned (when empty) and, if the new
    /// override is flagged default, every other default flag is cleared.
    pub fn add(
        &mut self,
        mut ov: ShopPackagingOverride,
        catalog: &PackagingInfo,
    ) -> CoreResult<&ShopPackagingOverride> {
        self.validate_candidate(&ov, catalog, None)?;

        if ov.id.is_empty() {
            ov.id = Uuid::new_v4().to_string();
        }
        if ov.is_default_sell_unit {
            for existing in &mut self.overrides {
                existing.is_default_sell_unit = false;
            }
        }

        self.overrides.push(ov);
        Ok(self.overrides.last().unwrap())
    }

    /// Replaces an existing override (matched by id) with new field values,
    /// re-running the same validation as [`add`](Self::add).
    pub fn update(
        &mut self,
        updated: ShopPackagingOverride,
        catalog: &PackagingInfo,
    ) -> CoreResult<()> {
        let pos = self
            .overrides
            .iter()
            .position(|o| o.id == updated.id)
            .ok_or_else(|| CoreError::NotFound {
                entity: "override",
                id: updated.id.clone(),
            })?;

        self.validate_candidate(&updated, catalog, Some(&updated.id))?;

        if updated.is_default_sell_unit {
            for existing in &mut self.overrides {
                existing.is_default_sell_unit = false;
            }
        }
        self.overrides[pos] = updated;
        Ok(())
    }

    /// Shared creation/update validation. `exclude_id` skips self-collision
    /// checks on update.
    fn validate_candidate(
        &self,
        ov: &ShopPackagingOverride,
        catalog: &PackagingInfo,
        exclude_id: Option<&str>,
    ) -> CoreResult<()> {
        // (a) A level never has two parents.
        if ov.parent_packaging_level_id.is_some() && ov.parent_override_id.is_some() {
            return Err(ValidationError::Conflicting {
                first: "parent_packaging_level_id".to_string(),
                second: "parent_override_id".to_string(),
            }
            .into());
        }

        if ov.is_custom() {
            // (b) Custom level rules.
            let name = ov
                .custom_unit_name
                .as_deref()
                .ok_or_else(|| ValidationError::Required {
                    field: "custom_unit_name".to_string(),
                })?;
            validate_unit_name(name)?;

            let ratio =
                ov.override_quantity_per_parent
                    .ok_or_else(|| ValidationError::Required {
                        field: "override_quantity_per_parent".to_string(),
                    })?;
            validate_ratio("override_quantity_per_parent", ratio)?;

            let duplicate = self
                .overrides
                .iter()
                .filter(|o| Some(o.id.as_str()) != exclude_id)
                .filter_map(|o| o.custom_unit_name.as_deref())
                .any(|existing| existing.eq_ignore_ascii_case(name.trim()))
                || catalog.level_by_name(name).is_some();
            if duplicate {
                return Err(ValidationError::Duplicate {
                    field: "custom_unit_name".to_string(),
                    value: name.to_string(),
                }
                .into());
            }

            match (&ov.parent_packaging_level_id, &ov.parent_override_id) {
                (Some(level_id), None) => {
                    if catalog.level_by_id(level_id).is_none() {
                        return Err(CoreError::NotFound {
                            entity: "packaging level",
                            id: level_id.clone(),
                        });
                    }
                }
                (None, Some(override_id)) => {
                    let parent = self
                        .overrides
                        .iter()
                        .filter(|o| Some(o.id.as_str()) != exclude_id)
                        .find(|o| o.id == *override_id);
                    match parent {
                        Some(p) if p.is_custom() => {}
                        _ => {
                            return Err(CoreError::NotFound {
                                entity: "parent override",
                                id: override_id.clone(),
                            })
                        }
                    }
                }
                (None, None) => {
                    return Err(ValidationError::Required {
                        field: "parent_packaging_level_id or parent_override_id".to_string(),
                    }
                    .into())
                }
                (Some(_), Some(_)) => unreachable!("rejected above"),
            }
        } else {
            // (c) Global override rules.
            let level_id = ov.packaging_level_id.as_deref().unwrap();
            if catalog.level_by_id(level_id).is_none() {
                return Err(CoreError::NotFound {
                    entity: "packaging level",
                    id: level_id.to_string(),
                });
            }

            let already = self
                .overrides
                .iter()
                .filter(|o| Some(o.id.as_str()) != exclude_id)
                .any(|o| o.packaging_level_id.as_deref() == Some(level_id));
            if already {
                return Err(ValidationError::Duplicate {
                    field: "packaging_level_id".to_string(),
                    value: level_id.to_string(),
                }
                .into());
            }

            if ov.parent_packaging_level_id.is_some() || ov.parent_override_id.is_some() {
                return Err(ValidationError::Conflicting {
                    first: "packaging_level_id".to_string(),
                    second: "custom parent fields".to_string(),
                }
                .into());
            }

            if let Some(ratio) = ov.override_quantity_per_parent {
                validate_ratio("override_quantity_per_parent", ratio)?;
            }
        }

        Ok(())
    }

    /// Sets or clears the default-sell-unit flag on one override.
    ///
    /// Setting clears the flag on every other override of the set in the
    /// same step, preserving the at-most-one invariant. Returns the unit
    /// name affected so the caller can propagate it into (or out of)
    /// `ShopInventory::shop_specific_sell_unit`.
    pub fn set_default_sell_unit(
        &mut self,
        override_id: &str,
        value: bool,
        catalog: &PackagingInfo,
    ) -> CoreResult<String> {
        let unit_name = {
            let ov = self.get(override_id).ok_or_else(|| CoreError::NotFound {
                entity: "override",
                id: override_id.to_string(),
            })?;
            match (&ov.custom_unit_name, &ov.packaging_level_id) {
                (Some(name), _) => name.clone(),
                (None, Some(level_id)) => catalog
                    .level_by_id(level_id)
                    .map(|l| l.unit_name.clone())
                    .ok_or_else(|| CoreError::NotFound {
                        entity: "packaging level",
                        id: level_id.clone(),
                    })?,
                (None, None) => {
                    return Err(ValidationError::Required {
                        field: "custom_unit_name".to_string(),
                    }
                    .into())
                }
            }
        };

        if value {
            for existing in &mut self.overrides {
                existing.is_default_sell_unit = existing.id == override_id;
            }
        } else if let Some(ov) = self.overrides.iter_mut().find(|o| o.id == override_id) {
            ov.is_default_sell_unit = false;
        }

        Ok(unit_name)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Override by id.
    pub fn get(&self, id: &str) -> Option<&ShopPackagingOverride> {
        self.overrides.iter().find(|o| o.id == id)
    }

    /// Global override targeting one catalog level.
    pub fn for_level(&self, packaging_level_id: &str) -> Option<&ShopPackagingOverride> {
        self.overrides
            .iter()
            .find(|o| o.packaging_level_id.as_deref() == Some(packaging_level_id))
    }

    /// Custom level by name, case-insensitively.
    pub fn custom_by_name(&self, unit_name: &str) -> Option<&ShopPackagingOverride> {
        self.overrides.iter().find(|o| {
            o.custom_unit_name
                .as_deref()
                .is_some_and(|n| n.eq_ignore_ascii_case(unit_name.trim()))
        })
    }

    /// The override currently flagged default, if any.
    pub fn default_override(&self) -> Option<&ShopPackagingOverride> {
        self.overrides.iter().find(|o| o.is_default_sell_unit)
    }

    /// Custom-level overrides in display order: `custom_level_order` first,
    /// creation order as the tiebreak.
    pub fn custom_levels_ordered(&self) -> Vec<&ShopPackagingOverride> {
        let mut customs: Vec<(usize, &ShopPackagingOverride)> = self
            .overrides
            .iter()
            .enumerate()
            .filter(|(_, o)| o.is_custom())
            .collect();
        customs.sort_by_key(|(created, o)| (o.custom_level_order.unwrap_or(u32::MAX), *created));
        customs.into_iter().map(|(_, o)| o).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
