//! # Error Types
//!
//! Domain-specific error types for rxpos-core.
//!
//! ## Error Hierarchy
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Error Types                                     │
//! │                                                                         │
//! │  rxpos-core errors (this file)                                         │
//! │  ├── CoreError        - Domain failures (NotFound, StateConflict, ...) │
//! │  └── ValidationError  - Input / configuration validation failures      │
//! │                                                                         │
//! │  rxpos-store errors (separate crate)                                   │
//! │  └── StoreError       - Repository and orchestration failures          │
//! │                                                                         │
//! │  Flow: ValidationError → CoreError → StoreError → caller               │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Design Principles
//! 1. Use `thiserror` for derive macros (not manual impl)
//! 2. Include context in error messages (drug id, batch number, etc.)
//! 3. Errors are enum variants, never String
//! 4. Every failure is surfaced *before* any mutation - no partial application

use thiserror::Error;

use crate::types::{StockLocation, TransferStatus};

// =============================================================================
// Core Error
// =============================================================================

/// Core business logic errors.
///
/// These errors represent business rule violations or domain logic failures.
/// They should be caught and translated to user-friendly messages.
#[derive(Debug, Error)]
pub enum CoreError {
    /// An entity referenced by an operation does not exist.
    ///
    /// ## When This Occurs
    /// - Drug id has no packaging info in the catalog
    /// - (shop, drug) pair has no inventory record
    /// - Override / transfer / batch id is unknown
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// Insufficient total stock to satisfy a FEFO issue.
    ///
    /// ## User Workflow
    /// ```text
    /// Sell 70 units
    ///      │
    ///      ▼
    /// Available across active batches: 50
    ///      │
    ///      ▼
    /// InsufficientStock { available: 50, requested: 70 }  (no batch touched)
    /// ```
    #[error("Insufficient stock for drug {drug_id}: available {available}, requested {requested}")]
    InsufficientStock {
        drug_id: String,
        available: i64,
        requested: i64,
    },

    /// Insufficient stock in one physical location for a location move.
    ///
    /// Scoped to the source location: storage may be full while the shop
    /// floor is empty, and vice versa.
    #[error(
        "Insufficient {location} stock for drug {drug_id}: available {available}, requested {requested}"
    )]
    InsufficientLocationStock {
        drug_id: String,
        location: StockLocation,
        available: i64,
        requested: i64,
    },

    /// Unit name does not match any packaging level of the drug.
    #[error("Unknown unit '{unit_name}' for drug {drug_id}")]
    InvalidUnit { unit_name: String, drug_id: String },

    /// A transfer is not in a state that allows the requested transition.
    ///
    /// ## When This Occurs
    /// - Approving a transfer that is not Pending
    /// - Completing a transfer that never went InTransit
    /// - Cancelling an already Completed transfer
    #[error("Transfer {transfer_id} is {current_status:?}, cannot {operation}")]
    TransferStateConflict {
        transfer_id: String,
        current_status: TransferStatus,
        operation: &'static str,
    },

    /// A batch is not in a state that allows the requested operation.
    #[error("Batch {batch_number} is {current_status}, cannot {operation}")]
    BatchStateConflict {
        batch_number: String,
        current_status: String,
        operation: &'static str,
    },

    /// Validation error (wraps ValidationError).
    #[error("Validation error: {0}")]
    Validation(#[from] ValidationError),

    /// Packaging hierarchy failed structural validation.
    ///
    /// Carries every violation so the caller can report all of them at once
    /// instead of fixing one field per round trip.
    #[error("Invalid packaging hierarchy for drug {drug_id}: {errors:?}")]
    InvalidPackaging {
        drug_id: String,
        errors: Vec<ValidationError>,
    },
}

// =============================================================================
// Validation Error
// =============================================================================

/// Input and configuration validation errors.
///
/// These errors occur when input doesn't meet requirements. Used for early
/// validation before business logic runs, and by `PackagingInfo::validate`
/// for structural checks on the hierarchy.
#[derive(Debug, Clone, PartialEq, Error)]
pub enum ValidationError {
    /// A required field is missing or empty.
    #[error("{field} is required")]
    Required { field: String },

    /// Field value is too long.
    #[error("{field} must be at most {max} characters")]
    TooLong { field: String, max: usize },

    /// Value must be positive.
    #[error("{field} must be positive")]
    MustBePositive { field: String },

    /// Numeric value is out of range.
    #[error("{field} must be between {min} and {max}")]
    OutOfRange { field: String, min: i64, max: i64 },

    /// Invalid format (e.g., invalid characters in a batch number).
    #[error("{field} has invalid format: {reason}")]
    InvalidFormat { field: String, reason: String },

    /// Duplicate value (e.g., duplicate batch number or custom unit name).
    #[error("{field} '{value}' already exists")]
    Duplicate { field: String, value: String },

    /// Two mutually exclusive fields were both supplied.
    #[error("{first} and {second} are mutually exclusive")]
    Conflicting { first: String, second: String },

    /// No level with level_number = 1 in a packaging hierarchy.
    #[error("packaging hierarchy has no base level (level_number = 1)")]
    MissingBaseLevel,

    /// Level numbers are not contiguous from 1.
    #[error("packaging level numbers must be contiguous: expected {expected}, found {found}")]
    NonContiguousLevels { expected: u32, found: u32 },

    /// More than one level/override is flagged as the default sell unit.
    #[error("at most one default sell unit is allowed, found {count}")]
    MultipleDefaults { count: usize },

    /// The default sell unit is not sellable.
    #[error("default sell unit '{unit_name}' must be sellable")]
    DefaultNotSellable { unit_name: String },

    /// A level above the base has no resolvable parent.
    #[error("packaging level '{unit_name}' has no resolvable parent")]
    UnresolvedParent { unit_name: String },

    /// A parent chain loops back on itself.
    #[error("parent chain of '{unit_name}' contains a cycle")]
    CyclicParentChain { unit_name: String },
}

// =============================================================================
// Result Type Alias
// =============================================================================

/// Convenience type alias for Results with CoreError.
pub type CoreResult<T> = Result<T, CoreError>;

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_error_messages() {
        let err = CoreError::InsufficientStock {
            drug_id: "AMOX-500".to_string(),
            available: 50,
            requested: 70,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient stock for drug AMOX-500: available 50, requested 70"
        );
    }

    #[test]
    fn test_location_scoped_message() {
        let err = CoreError::InsufficientLocationStock {
            drug_id: "AMOX-500".to_string(),
            location: StockLocation::ShopFloor,
            available: 5,
            requested: 20,
        };
        assert_eq!(
            err.to_string(),
            "Insufficient shop_floor stock for drug AMOX-500: available 5, requested 20"
        );
    }

    #[test]
    fn test_validation_error_messages() {
        let err = ValidationError::Required {
            field: "custom_unit_name".to_string(),
        };
        assert_eq!(err.to_string(), "custom_unit_name is required");

        let err = ValidationError::Conflicting {
            first: "parent_packaging_level_id".to_string(),
            second: "parent_override_id".to_string(),
        };
        assert_eq!(
            err.to_string(),
            "parent_packaging_level_id and parent_override_id are mutually exclusive"
        );
    }

    #[test]
    fn test_validation_converts_to_core_error() {
        let validation_err = ValidationError::MissingBaseLevel;
        let core_err: CoreError = validation_err.into();
        assert!(matches!(core_err, CoreError::Validation(_)));
    }
}
