//! # rxpos-core: Pure Business Logic for Rx POS
//!
//! This crate is the **heart** of the Rx POS inventory and packaging-pricing
//! engine. It contains all business logic as pure functions with zero I/O
//! dependencies.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Rx POS Architecture                              │
//! │                                                                         │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │              Surrounding Platform (out of scope)                │   │
//! │  │   Auth ──► Shop/Drug CRUD ──► Orders ──► Transport/Persistence  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │                  rxpos-store (Services + Seams)                 │   │
//! │  │   resolve_effective_packaging, add_batch, reduce_stock, ...     │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │  ┌─────────────────────────────▼───────────────────────────────────┐   │
//! │  │               ★ rxpos-core (THIS CRATE) ★                       │   │
//! │  │                                                                 │   │
//! │  │  ┌───────────┐ ┌───────────┐ ┌───────────┐ ┌────────────────┐  │   │
//! │  │  │ packaging │ │ overrides │ │  resolve  │ │   inventory    │  │   │
//! │  │  │ hierarchy │ │ per-shop  │ │ effective │ │ FEFO batches,  │  │   │
//! │  │  │ + convert │ │ layering  │ │   view    │ │ moves, audit   │  │   │
//! │  │  └───────────┘ └───────────┘ └───────────┘ └────────────────┘  │   │
//! │  │                                                                 │   │
//! │  │   NO I/O • NO DATABASE • NO NETWORK • NO CLOCK • PURE LOGIC    │   │
//! │  └─────────────────────────────────────────────────────────────────┘   │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Modules
//!
//! - [`types`] - Shared enums (unit types, locations, statuses)
//! - [`money`] - Money type with integer arithmetic (no floating point!)
//! - [`error`] - Domain error types
//! - [`validation`] - Field-level validation rules
//! - [`packaging`] - Per-drug packaging hierarchy and unit conversion
//! - [`pricing`] - Per-shop price book
//! - [`overrides`] - Per-shop packaging customizations
//! - [`resolve`] - Catalog + override merge into effective packaging
//! - [`inventory`] - Batch stock ledger with FEFO depletion
//! - [`adjustment`] - Append-only stock audit records
//! - [`transfer`] - Shop-to-shop stock transfer state machine
//!
//! ## Design Principles
//!
//! 1. **Pure Functions**: Every function is deterministic - same input = same output
//! 2. **No I/O**: Database, network, file system and clock access is FORBIDDEN here
//! 3. **Integer Money**: All monetary values are in cents (i64) to avoid float errors
//! 4. **Explicit Errors**: All errors are typed, never strings or panics
//!
//! ## Example Usage
//!
//! ```rust
//! use rxpos_core::packaging::{PackagingInfo, PackagingLevel};
//! use rxpos_core::types::UnitType;
//!
//! let mut info = PackagingInfo::new("drug-1", UnitType::Count, "tab", "Tablet");
//! info.add_level(PackagingLevel::base("Tablet")).unwrap();
//! info.add_level(PackagingLevel::new("Strip", 2, 10.0)).unwrap();
//!
//! // 3 strips = 30 tablets
//! let tablets = info.convert_quantity(3.0, "Strip", "Tablet").unwrap();
//! assert_eq!(tablets, 30.0);
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod adjustment;
pub mod error;
pub mod inventory;
pub mod money;
pub mod overrides;
pub mod packaging;
pub mod pricing;
pub mod resolve;
pub mod transfer;
pub mod types;
pub mod validation;

// =============================================================================
// Re-exports for Convenience
// =============================================================================
// These allow users to do `use rxpos_core::Money` instead of
// `use rxpos_core::money::Money`

pub use adjustment::{AdjustmentFilter, MovementContext, StockAdjustment, StockMovement};
pub use error::{CoreError, CoreResult, ValidationError};
pub use inventory::{Batch, ShopInventory};
pub use money::Money;
pub use overrides::{OverrideSet, ShopPackagingOverride};
pub use packaging::{PackagingInfo, PackagingLevel};
pub use pricing::ShopPricing;
pub use resolve::{resolve_effective_packaging, EffectivePackagingLevel, LevelSource};
pub use transfer::StockTransfer;
pub use types::*;

// =============================================================================
// Crate-Level Constants
// =============================================================================

/// Default currency for new shop price books.
///
/// ## Why a constant?
/// v0.1 shops are single-currency. The schema carries a currency code per
/// price book so multi-currency tenants can be introduced without migration.
pub const DEFAULT_CURRENCY: &str = "USD";

/// Maximum packaging levels allowed in one drug's hierarchy.
///
/// ## Business Reason
/// Real pharmacy packaging tops out at 4-5 tiers (tablet/strip/box/carton).
/// Ten leaves generous headroom while bounding parent-chain walks.
pub const MAX_PACKAGING_LEVELS: usize = 10;

/// Maximum quantity accepted by a single stock movement.
///
/// ## Business Reason
/// Prevents accidental over-entry (e.g., scanning a barcode into the
/// quantity field). Bulk loads go through repeated receipts instead.
pub const MAX_MOVEMENT_QUANTITY: i64 = 1_000_000;
