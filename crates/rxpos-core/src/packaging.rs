//! # Unit & Packaging Catalog
//!
//! Per-drug hierarchy of packaging levels expressing unit-conversion ratios.
//!
//! ## The Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                 Packaging Hierarchy (example: Amoxicillin)              │
//! │                                                                         │
//! │  Level 3: Box      ──── base_unit_quantity = 100 ── qty/parent = 10    │
//! │     │                                                                   │
//! │  Level 2: Strip    ──── base_unit_quantity = 10  ── qty/parent = 10    │
//! │     │                                                                   │
//! │  Level 1: Tablet   ──── base_unit_quantity = 1   ── qty/parent = 1     │
//! │           (base unit - the ground truth for every conversion)          │
//! │                                                                         │
//! │  convert(3, Strip → Tablet) = 3 × 10 ÷ 1   = 30                        │
//! │  convert(30, Tablet → Box)  = 30 × 1 ÷ 100 = 0.3                       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Invariants
//! - Exactly one level has `level_number = 1` (the base)
//! - Level numbers are contiguous from 1
//! - Every level above the base has a resolvable parent
//! - At most one level is the default sell unit, and it must be sellable
//!
//! A drug whose hierarchy fails [`PackagingInfo::validate`] must be rejected
//! at creation - this is the one hard failure point of the catalog.

use serde::{Deserialize, Serialize};
use std::collections::{HashMap, HashSet};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::types::UnitType;
use crate::validation::{validate_ratio, validate_unit_name};
use crate::MAX_PACKAGING_LEVELS;

// =============================================================================
// Packaging Level
// =============================================================================

/// A named tier of a drug's packaging hierarchy (Tablet / Strip / Box).
///
/// `base_unit_quantity` is the ground truth for conversion: how many base
/// units one of this level contains. `quantity_per_parent` is derivable
/// (`base_unit_quantity ÷ parent.base_unit_quantity`) and equals 1 at the
/// base level.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingLevel {
    /// Unique identifier (UUID v4). Assigned by `add_level` when empty.
    pub id: String,

    /// Position in the hierarchy; 1 is the base unit.
    pub level_number: u32,

    /// Display name of the unit (Tablet, Strip, Box, Bottle, ...).
    pub unit_name: String,

    /// Parent level id. `None` only at level 1.
    pub parent_level_id: Option<String>,

    /// How many base units one of this level contains. Must be > 0.
    pub base_unit_quantity: f64,

    /// How many parent units one of this level contains (a strip of 10
    /// tablets has `quantity_per_parent = 10`). Derived when <= 0 on input.
    pub quantity_per_parent: f64,

    /// Whether this level may appear on a sales screen.
    pub is_sellable: bool,

    /// Whether this level is the catalog-suggested default sell unit.
    pub is_default: bool,

    /// Whether this level may be broken open into its children for sale.
    pub is_breakable: bool,

    /// Optional barcode printed on this packaging tier.
    pub barcode: Option<String>,

    /// Optional minimum quantity a shop may sell at this level.
    pub minimum_sale_quantity: Option<f64>,

    /// Catalog-suggested retail price; the last resort of price resolution.
    pub suggested_price: Option<Money>,
}

impl PackagingLevel {
    /// Creates the base level (level 1, one base unit, sellable).
    pub fn base(unit_name: impl Into<String>) -> Self {
        PackagingLevel {
            id: String::new(),
            level_number: 1,
            unit_name: unit_name.into(),
            parent_level_id: None,
            base_unit_quantity: 1.0,
            quantity_per_parent: 1.0,
            is_sellable: true,
            is_default: false,
            is_breakable: false,
            barcode: None,
            minimum_sale_quantity: None,
            suggested_price: None,
        }
    }

    /// Creates a level above the base. `quantity_per_parent` is left unset
    /// and derived on insert; the parent defaults to `level_number - 1`.
    pub fn new(unit_name: impl Into<String>, level_number: u32, base_unit_quantity: f64) -> Self {
        PackagingLevel {
            id: String::new(),
            level_number,
            unit_name: unit_name.into(),
            parent_level_id: None,
            base_unit_quantity,
            quantity_per_parent: 0.0,
            is_sellable: true,
            is_default: false,
            is_breakable: false,
            barcode: None,
            minimum_sale_quantity: None,
            suggested_price: None,
        }
    }

    /// Marks this level as the default sell unit.
    pub fn as_default(mut self) -> Self {
        self.is_default = true;
        self
    }

    /// Sets whether the level is sellable.
    pub fn sellable(mut self, sellable: bool) -> Self {
        self.is_sellable = sellable;
        self
    }

    /// Attaches a barcode.
    pub fn with_barcode(mut self, barcode: impl Into<String>) -> Self {
        self.barcode = Some(barcode.into());
        self
    }

    /// Attaches a catalog-suggested retail price.
    pub fn with_suggested_price(mut self, price: Money) -> Self {
        self.suggested_price = Some(price);
        self
    }
}

// =============================================================================
// Packaging Info
// =============================================================================

/// The full packaging definition of one drug: base unit plus the ordered
/// list of packaging levels. One per drug in the shared catalog.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct PackagingInfo {
    /// The drug this packaging belongs to.
    pub drug_id: String,

    /// Physical dimension of the base unit.
    pub unit_type: UnitType,

    /// Short symbol of the base unit ("tab", "ml", "g").
    pub base_unit_symbol: String,

    /// Display name of the base unit ("Tablet", "Millilitre").
    pub base_unit_name: String,

    /// Whether stock may be sold below one base unit (e.g., loose ml).
    pub is_subdivisible: bool,

    /// Packaging levels, kept sorted by `level_number`.
    pub levels: Vec<PackagingLevel>,
}

impl PackagingInfo {
    /// Creates an empty packaging definition for a drug.
    pub fn new(
        drug_id: impl Into<String>,
        unit_type: UnitType,
        base_unit_symbol: impl Into<String>,
        base_unit_name: impl Into<String>,
    ) -> Self {
        PackagingInfo {
            drug_id: drug_id.into(),
            unit_type,
            base_unit_symbol: base_unit_symbol.into(),
            base_unit_name: base_unit_name.into(),
            is_subdivisible: false,
            levels: Vec::new(),
        }
    }

    /// Adds a level to the hierarchy.
    ///
    /// ## What Happens
    /// 1. Field validation (unit name, base quantity, duplicate name)
    /// 2. Id assignment when absent
    /// 3. If flagged default, clears `is_default` on every other level
    /// 4. Parent resolution: explicit `parent_level_id`, else the level
    ///    numbered `level_number - 1`
    /// 5. `quantity_per_parent` derivation when unset:
    ///    `base_unit_quantity ÷ parent.base_unit_quantity` (1 at the base)
    /// 6. Insert and re-sort by `level_number`
    ///
    /// Structural invariants (contiguity, single base, ...) are checked by
    /// [`validate`](Self::validate), not here: hierarchies are built
    /// incrementally and are allowed to pass through incomplete states.
    pub fn add_level(&mut self, mut level: PackagingLevel) -> CoreResult<()> {
        validate_unit_name(&level.unit_name)?;
        validate_ratio("base_unit_quantity", level.base_unit_quantity)?;

        if self.levels.len() >= MAX_PACKAGING_LEVELS {
            return Err(ValidationError::OutOfRange {
                field: "levels".to_string(),
                min: 1,
                max: MAX_PACKAGING_LEVELS as i64,
            }
            .into());
        }

        if self.level_by_name(&level.unit_name).is_some() {
            return Err(ValidationError::Duplicate {
                field: "unit_name".to_string(),
                value: level.unit_name.clone(),
            }
            .into());
        }

        if level.id.is_empty() {
            level.id = Uuid::new_v4().to_string();
        }

        if level.is_default {
            for existing in &mut self.levels {
                existing.is_default = false;
            }
        }

        if level.level_number > 1 && level.parent_level_id.is_none() {
            level.parent_level_id = self
                .levels
                .iter()
                .find(|l| l.level_number == level.level_number - 1)
                .map(|l| l.id.clone());
        }

        if level.quantity_per_parent <= 0.0 {
            level.quantity_per_parent = if level.level_number == 1 {
                1.0
            } else if let Some(parent) = level
                .parent_level_id
                .as_deref()
                .and_then(|pid| self.level_by_id(pid))
            {
                level.base_unit_quantity / parent.base_unit_quantity
            } else {
                // Unresolved parent: leave unset, validate() reports it.
                0.0
            };
        }

        self.levels.push(level);
        self.levels.sort_by_key(|l| l.level_number);
        Ok(())
    }

    /// Validates the structural invariants of the hierarchy.
    ///
    /// Returns every violation, not just the first, so a misconfigured drug
    /// can be fixed in one pass.
    ///
    /// ## Rules
    /// - At least one level
    /// - A base level (`level_number = 1`), level numbers contiguous from 1
    /// - Unique level ids
    /// - At most one default; the default (if any) must be sellable
    /// - `base_unit_quantity > 0` for all levels
    /// - Levels above the base have `quantity_per_parent > 0` and a parent
    ///   that resolves, acyclically, within the hierarchy
    pub fn validate(&self) -> Result<(), Vec<ValidationError>> {
        let mut errors = Vec::new();

        if self.levels.is_empty() {
            errors.push(ValidationError::Required {
                field: "levels".to_string(),
            });
            return Err(errors);
        }

        // Unique ids
        let mut seen_ids = HashSet::new();
        for level in &self.levels {
            if !seen_ids.insert(level.id.as_str()) {
                errors.push(ValidationError::Duplicate {
                    field: "level_id".to_string(),
                    value: level.id.clone(),
                });
            }
        }

        // Base level + contiguity. Levels are kept sorted by level_number,
        // so position i must carry number i+1.
        if !self.levels.iter().any(|l| l.level_number == 1) {
            errors.push(ValidationError::MissingBaseLevel);
        } else {
            for (i, level) in self.levels.iter().enumerate() {
                let expected = (i + 1) as u32;
                if level.level_number != expected {
                    errors.push(ValidationError::NonContiguousLevels {
                        expected,
                        found: level.level_number,
                    });
                    break;
                }
            }
        }

        // Default sell unit rules
        let defaults: Vec<&PackagingLevel> =
            self.levels.iter().filter(|l| l.is_default).collect();
        if defaults.len() > 1 {
            errors.push(ValidationError::MultipleDefaults {
                count: defaults.len(),
            });
        }
        if let Some(default) = defaults.first() {
            if !default.is_sellable {
                errors.push(ValidationError::DefaultNotSellable {
                    unit_name: default.unit_name.clone(),
                });
            }
        }

        // Per-level quantity and parent rules
        let by_id: HashMap<&str, &PackagingLevel> =
            self.levels.iter().map(|l| (l.id.as_str(), l)).collect();
        for level in &self.levels {
            if level.base_unit_quantity <= 0.0 {
                errors.push(ValidationError::MustBePositive {
                    field: format!("base_unit_quantity ({})", level.unit_name),
                });
            }

            if level.level_number > 1 {
                if level.quantity_per_parent <= 0.0 {
                    errors.push(ValidationError::MustBePositive {
                        field: format!("quantity_per_parent ({})", level.unit_name),
                    });
                }
                match level.parent_level_id.as_deref() {
                    Some(pid) if by_id.contains_key(pid) => {}
                    _ => errors.push(ValidationError::UnresolvedParent {
                        unit_name: level.unit_name.clone(),
                    }),
                }
            }

            // Visited-set guarded parent walk: edits can introduce cycles.
            let mut visited = HashSet::new();
            let mut current = level;
            loop {
                if !visited.insert(current.id.as_str()) {
                    errors.push(ValidationError::CyclicParentChain {
                        unit_name: level.unit_name.clone(),
                    });
                    break;
                }
                match current.parent_level_id.as_deref().and_then(|p| by_id.get(p)) {
                    Some(parent) => current = parent,
                    None => break,
                }
            }
        }

        if errors.is_empty() {
            Ok(())
        } else {
            Err(errors)
        }
    }

    /// Whether the hierarchy passes [`validate`](Self::validate).
    pub fn is_valid(&self) -> bool {
        self.validate().is_ok()
    }

    /// Validates and maps failures to [`CoreError::InvalidPackaging`].
    ///
    /// Used at drug creation: a drug with a broken hierarchy never enters
    /// the catalog.
    pub fn validate_or_reject(&self) -> CoreResult<()> {
        self.validate().map_err(|errors| CoreError::InvalidPackaging {
            drug_id: self.drug_id.clone(),
            errors,
        })
    }

    // =========================================================================
    // Conversion
    // =========================================================================

    /// Converts a quantity between two packaging levels of this drug.
    ///
    /// ## How It Works
    /// 1. To base units: `qty × from.base_unit_quantity`
    /// 2. To the target: `÷ to.base_unit_quantity`
    ///
    /// ## Example
    /// ```rust
    /// use rxpos_core::packaging::{PackagingInfo, PackagingLevel};
    /// use rxpos_core::types::UnitType;
    ///
    /// let mut info = PackagingInfo::new("d1", UnitType::Count, "tab", "Tablet");
    /// info.add_level(PackagingLevel::base("Tablet")).unwrap();
    /// info.add_level(PackagingLevel::new("Strip", 2, 10.0)).unwrap();
    ///
    /// assert_eq!(info.convert_quantity(3.0, "Strip", "Tablet").unwrap(), 30.0);
    /// ```
    pub fn convert_quantity(&self, qty: f64, from_unit: &str, to_unit: &str) -> CoreResult<f64> {
        let from = self
            .level_by_name(from_unit)
            .ok_or_else(|| CoreError::InvalidUnit {
                unit_name: from_unit.to_string(),
                drug_id: self.drug_id.clone(),
            })?;
        let to = self
            .level_by_name(to_unit)
            .ok_or_else(|| CoreError::InvalidUnit {
                unit_name: to_unit.to_string(),
                drug_id: self.drug_id.clone(),
            })?;

        let base_units = qty * from.base_unit_quantity;
        Ok(base_units / to.base_unit_quantity)
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Looks up a level by unit name, case-insensitively.
    pub fn level_by_name(&self, unit_name: &str) -> Option<&PackagingLevel> {
        self.levels
            .iter()
            .find(|l| l.unit_name.eq_ignore_ascii_case(unit_name.trim()))
    }

    /// Looks up a level by id.
    pub fn level_by_id(&self, id: &str) -> Option<&PackagingLevel> {
        self.levels.iter().find(|l| l.id == id)
    }

    /// Looks up a level by barcode.
    pub fn level_by_barcode(&self, barcode: &str) -> Option<&PackagingLevel> {
        self.levels
            .iter()
            .find(|l| l.barcode.as_deref() == Some(barcode))
    }

    /// The base level (level 1), if present.
    pub fn base_level(&self) -> Option<&PackagingLevel> {
        self.levels.iter().find(|l| l.level_number == 1)
    }

    /// The catalog default sell unit, if flagged.
    pub fn default_sell_level(&self) -> Option<&PackagingLevel> {
        self.levels.iter().find(|l| l.is_default)
    }

    /// Sellable levels in hierarchy order.
    pub fn sellable_levels(&self) -> Vec<&PackagingLevel> {
        self.levels.iter().filter(|l| l.is_sellable).collect()
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    fn tablet_strip_box() -> PackagingInfo {
        let mut info = PackagingInfo::new("amox-500", UnitType::Count, "tab", "Tablet");
        info.add_level(PackagingLevel::base("Tablet")).unwrap();
        info.add_level(PackagingLevel::new("Strip", 2, 10.0).as_default())
            .unwrap();
        info.add_level(PackagingLevel::new("Box", 3, 100.0)).unwrap();
        info
    }

    #[test]
    fn test_add_level_derives_quantity_per_parent() {
        let info = tablet_strip_box();
        let strip = info.level_by_name("Strip").unwrap();
        let boxed = info.level_by_name("Box").unwrap();

        assert_eq!(strip.quantity_per_parent, 10.0);
        assert_eq!(boxed.quantity_per_parent, 10.0); // 100 / 10
        assert_eq!(
            boxed.parent_level_id.as_deref(),
            Some(strip.id.as_str())
        );
    }

    #[test]
    fn test_add_level_assigns_ids_and_clears_previous_default() {
        let mut info = tablet_strip_box();
        assert!(info.levels.iter().all(|l| !l.id.is_empty()));
        assert_eq!(info.default_sell_level().unwrap().unit_name, "Strip");

        info.add_level(PackagingLevel::new("Carton", 4, 1000.0).as_default())
            .unwrap();
        let defaults: Vec<_> = info.levels.iter().filter(|l| l.is_default).collect();
        assert_eq!(defaults.len(), 1);
        assert_eq!(defaults[0].unit_name, "Carton");
    }

    #[test]
    fn test_add_level_rejects_duplicate_name_case_insensitive() {
        let mut info = tablet_strip_box();
        let err = info
            .add_level(PackagingLevel::new("strip", 4, 500.0))
            .unwrap_err();
        assert!(matches!(
            err,
            CoreError::Validation(ValidationError::Duplicate { .. })
        ));
    }

    #[test]
    fn test_valid_hierarchy_passes_validation() {
        assert!(tablet_strip_box().is_valid());
    }

    #[test]
    fn test_validate_reports_missing_base_and_contiguity() {
        let mut info = PackagingInfo::new("d", UnitType::Count, "tab", "Tablet");
        info.add_level(PackagingLevel::new("Box", 3, 100.0)).unwrap();

        let errors = info.validate().unwrap_err();
        assert!(errors.contains(&ValidationError::MissingBaseLevel));
    }

    #[test]
    fn test_validate_reports_gap_in_level_numbers() {
        let mut info = PackagingInfo::new("d", UnitType::Count, "tab", "Tablet");
        info.add_level(PackagingLevel::base("Tablet")).unwrap();
        info.add_level(PackagingLevel::new("Box", 3, 100.0)).unwrap();

        let errors = info.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::NonContiguousLevels { .. })));
    }

    #[test]
    fn test_validate_rejects_unsellable_default() {
        let mut info = PackagingInfo::new("d", UnitType::Count, "tab", "Tablet");
        info.add_level(PackagingLevel::base("Tablet")).unwrap();
        info.add_level(PackagingLevel::new("Strip", 2, 10.0).as_default().sellable(false))
            .unwrap();

        let errors = info.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::DefaultNotSellable { .. })));
    }

    #[test]
    fn test_validate_detects_parent_cycle() {
        let mut info = tablet_strip_box();
        // Force a cycle: Strip's parent becomes Box, Box's parent is Strip.
        let box_id = info.level_by_name("Box").unwrap().id.clone();
        let strip = info
            .levels
            .iter_mut()
            .find(|l| l.unit_name == "Strip")
            .unwrap();
        strip.parent_level_id = Some(box_id);

        let errors = info.validate().unwrap_err();
        assert!(errors
            .iter()
            .any(|e| matches!(e, ValidationError::CyclicParentChain { .. })));
    }

    #[test]
    fn test_validate_or_reject_wraps_errors() {
        let info = PackagingInfo::new("d", UnitType::Count, "tab", "Tablet");
        let err = info.validate_or_reject().unwrap_err();
        assert!(matches!(err, CoreError::InvalidPackaging { .. }));
    }

    #[test]
    fn test_convert_quantity_round_trips() {
        let info = tablet_strip_box();
        let q = 7.0;
        let there = info.convert_quantity(q, "Strip", "Box").unwrap();
        let back = info.convert_quantity(there, "Box", "Strip").unwrap();
        assert!((back - q).abs() < 1e-9);
    }

    #[test]
    fn test_convert_quantity_unknown_unit() {
        let info = tablet_strip_box();
        let err = info.convert_quantity(1.0, "Strip", "Pallet").unwrap_err();
        assert!(matches!(err, CoreError::InvalidUnit { .. }));
    }

    #[test]
    fn test_lookups() {
        let info = tablet_strip_box();
        assert_eq!(info.base_level().unwrap().unit_name, "Tablet");
        assert_eq!(info.default_sell_level().unwrap().unit_name, "Strip");
        assert!(info.level_by_name("sTrIp").is_some());
        assert_eq!(info.sellable_levels().len(), 3);
    }

    #[test]
    fn test_barcode_lookup() {
        let mut info = PackagingInfo::new("d", UnitType::Count, "tab", "Tablet");
        info.add_level(PackagingLevel::base("Tablet")).unwrap();
        info.add_level(PackagingLevel::new("Box", 2, 100.0).with_barcode("5449000000996"))
            .unwrap();

        assert_eq!(
            info.level_by_barcode("5449000000996").unwrap().unit_name,
            "Box"
        );
        assert!(info.level_by_barcode("nope").is_none());
    }
}
