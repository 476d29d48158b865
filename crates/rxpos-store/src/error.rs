//! # Store Error Types
//!
//! Error types for the repository and service layer.
//!
//! ## Error Flow
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                    Error Propagation                                    │
//! │                                                                         │
//! │  CoreError (rxpos-core)          backend failure                        │
//! │       │                               │                                 │
//! │       ▼                               ▼                                 │
//! │  StoreError::Core            StoreError::Repository                     │
//! │       │                               │                                 │
//! │       └───────────────┬───────────────┘                                 │
//! │                       ▼                                                 │
//! │  Caller (API layer) maps to its transport error                         │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

use thiserror::Error;

use rxpos_core::CoreError;

/// Repository and service layer errors.
#[derive(Debug, Error)]
pub enum StoreError {
    /// A business rule rejected the operation.
    ///
    /// ## When This Occurs
    /// - Insufficient stock for a FEFO issue
    /// - Invalid packaging hierarchy on save
    /// - Illegal transfer status transition
    #[error(transparent)]
    Core(#[from] CoreError),

    /// Entity not found in the store.
    ///
    /// ## When This Occurs
    /// - Unknown drug, shop inventory, or transfer id
    /// - Barcode with no matching packaging level
    #[error("{entity} not found: {id}")]
    NotFound { entity: &'static str, id: String },

    /// The storage backend itself failed.
    ///
    /// ## When This Occurs
    /// - Poisoned or unreachable backend
    /// - Corrupt persisted record (e.g. a transfer with no recorded
    ///   expiry)
    #[error("Repository failure: {0}")]
    Repository(String),
}

/// Result alias for store operations.
pub type StoreResult<T> = Result<T, StoreError>;
