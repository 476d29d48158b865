//! # Validation Module
//!
//! Field-level validation utilities.
//!
//! ## Validation Strategy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                      Validation Layers                                  │
//! │                                                                         │
//! │  Layer 1: Surrounding platform (transport, request DTOs)               │
//! │  ├── Type validation (deserialization)                                 │
//! │  └── Out of scope for this repo                                        │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 2: THIS MODULE - field rules                                    │
//! │  ├── Unit names, batch numbers, quantities, ratios                     │
//! │  └── Runs before any aggregate mutation                                │
//! │           │                                                             │
//! │           ▼                                                             │
//! │  Layer 3: Structural rules (per aggregate)                             │
//! │  ├── PackagingInfo::validate - hierarchy invariants                    │
//! │  └── OverrideSet::add - creation validation order                      │
//! │                                                                         │
//! │  Defense in depth: a failure at any layer means NOTHING was applied    │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use crate::error::ValidationError;
use crate::MAX_MOVEMENT_QUANTITY;

/// Result type for validation operations.
pub type ValidationResult<T> = Result<T, ValidationError>;

// =============================================================================
// String Validators
// =============================================================================

/// Validates a packaging unit name (Tablet, Strip, Box, ...).
///
/// ## Rules
/// - Must not be empty after trimming
/// - Must be at most 50 characters
///
/// ## Example
/// ```rust
/// use rxpos_core::validation::validate_unit_name;
///
/// assert!(validate_unit_name("Strip").is_ok());
/// assert!(validate_unit_name("   ").is_err());
/// ```
pub fn validate_unit_name(name: &str) -> ValidationResult<()> {
    let name = name.trim();

    if name.is_empty() {
        return Err(ValidationError::Required {
            field: "unit_name".to_string(),
        });
    }

    if name.len() > 50 {
        return Err(ValidationError::TooLong {
            field: "unit_name".to_string(),
            max: 50,
        });
    }

    Ok(())
}

/// Validates a batch number.
///
/// ## Rules
/// - Must not be empty
/// - Must be at most 64 characters
/// - Alphanumeric plus hyphen, underscore, slash (common supplier formats)
pub fn validate_batch_number(batch_number: &str) -> ValidationResult<()> {
    let batch_number = batch_number.trim();

    if batch_number.is_empty() {
        return Err(ValidationError::Required {
            field: "batch_number".to_string(),
        });
    }

    if batch_number.len() > 64 {
        return Err(ValidationError::TooLong {
            field: "batch_number".to_string(),
            max: 64,
        });
    }

    if !batch_number
        .chars()
        .all(|c| c.is_alphanumeric() || c == '-' || c == '_' || c == '/')
    {
        return Err(ValidationError::InvalidFormat {
            field: "batch_number".to_string(),
            reason: "must contain only letters, numbers, hyphens, underscores, and slashes"
                .to_string(),
        });
    }

    Ok(())
}

/// Validates an entity id reference (shop id, drug id, supplier id, ...).
///
/// Ids are opaque strings here; the platform issues UUIDs but this engine
/// only requires them to be non-empty.
pub fn validate_id(field: &str, id: &str) -> ValidationResult<()> {
    if id.trim().is_empty() {
        return Err(ValidationError::Required {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Numeric Validators
// =============================================================================

/// Validates a stock movement quantity.
///
/// ## Rules
/// - Must be positive (> 0)
/// - Must not exceed [`MAX_MOVEMENT_QUANTITY`]
pub fn validate_movement_quantity(qty: i64) -> ValidationResult<()> {
    if qty <= 0 {
        return Err(ValidationError::MustBePositive {
            field: "quantity".to_string(),
        });
    }

    if qty > MAX_MOVEMENT_QUANTITY {
        return Err(ValidationError::OutOfRange {
            field: "quantity".to_string(),
            min: 1,
            max: MAX_MOVEMENT_QUANTITY,
        });
    }

    Ok(())
}

/// Validates a unit-conversion ratio (base_unit_quantity,
/// quantity_per_parent, override_quantity_per_parent).
///
/// Ratios are strictly positive; zero or negative ratios would collapse
/// the conversion arithmetic.
pub fn validate_ratio(field: &str, ratio: f64) -> ValidationResult<()> {
    if !ratio.is_finite() || ratio <= 0.0 {
        return Err(ValidationError::MustBePositive {
            field: field.to_string(),
        });
    }
    Ok(())
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_unit_name_rules() {
        assert!(validate_unit_name("Strip").is_ok());
        assert!(validate_unit_name("").is_err());
        assert!(validate_unit_name("  ").is_err());
        assert!(validate_unit_name(&"A".repeat(51)).is_err());
    }

    #[test]
    fn test_batch_number_rules() {
        assert!(validate_batch_number("BN-2024/0917").is_ok());
        assert!(validate_batch_number("").is_err());
        assert!(validate_batch_number("BN 123").is_err()); // space not allowed
    }

    #[test]
    fn test_movement_quantity_rules() {
        assert!(validate_movement_quantity(1).is_ok());
        assert!(validate_movement_quantity(0).is_err());
        assert!(validate_movement_quantity(-5).is_err());
        assert!(validate_movement_quantity(MAX_MOVEMENT_QUANTITY + 1).is_err());
    }

    #[test]
    fn test_ratio_rules() {
        assert!(validate_ratio("base_unit_quantity", 10.0).is_ok());
        assert!(validate_ratio("base_unit_quantity", 0.5).is_ok());
        assert!(validate_ratio("base_unit_quantity", 0.0).is_err());
        assert!(validate_ratio("base_unit_quantity", -1.0).is_err());
        assert!(validate_ratio("base_unit_quantity", f64::NAN).is_err());
    }
}
