//! # rxpos-store: Repository Seams and Services for Rx POS
//!
//! This crate owns the async boundary of the Rx POS inventory and
//! packaging-pricing engine: repository traits, in-memory implementations,
//! and the orchestration services that pair every stock mutation with its
//! audit record.
//!
//! ## Architecture Position
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                        Rx POS Data Flow                                 │
//! │                                                                         │
//! │  API layer (out of scope)                                               │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌─────────────────────────────────────────────────────────────────┐   │
//! │  │                    rxpos-store (THIS CRATE)                     │   │
//! │  │                                                                 │   │
//! │  │   ┌────────────────┐   ┌────────────────┐   ┌───────────────┐  │   │
//! │  │   │   Services     │   │  Repository    │   │   In-Memory   │  │   │
//! │  │   │ (service/*)    │──►│    Seams       │◄──│    Backend    │  │   │
//! │  │   │                │   │ (repository/)  │   │  (memory.rs)  │  │   │
//! │  │   │ Packaging      │   │ DrugCatalog    │   │ RwLock maps   │  │   │
//! │  │   │ Inventory      │   │ InventoryRepo  │   │               │  │   │
//! │  │   │ Transfer       │   │ AdjustmentLog  │   │               │  │   │
//! │  │   └────────────────┘   └────────────────┘   └───────────────┘  │   │
//! │  └─────────────────────────────┬───────────────────────────────────┘   │
//! │                                │                                        │
//! │                                ▼                                        │
//! │                     rxpos-core (pure logic)                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Module Organization
//!
//! - [`error`] - Store error types
//! - [`repository`] - Async seams plus [`repository::memory`] backends
//! - [`service`] - Packaging, inventory, and transfer orchestration
//!
//! ## Usage
//!
//! ```rust,ignore
//! use std::sync::Arc;
//! use rxpos_store::repository::memory::*;
//! use rxpos_store::service::inventory::InventoryService;
//!
//! let inventories = Arc::new(MemoryInventoryRepository::new());
//! let suppliers = Arc::new(MemorySupplierDirectory::new());
//! let audit = Arc::new(MemoryAdjustmentLog::new());
//! let service = InventoryService::new(inventories, suppliers, audit);
//!
//! let movement = service
//!     .receive_batch("shop-a", "amox-500", batch, "user-1")
//!     .await?;
//! ```

// =============================================================================
// Module Declarations
// =============================================================================

pub mod error;
pub mod repository;
pub mod service;

// =============================================================================
// Re-exports
// =============================================================================

pub use error::{StoreError, StoreResult};

pub use repository::{
    AdjustmentLog, BarcodeHit, DrugCatalog, InventoryRepository, OverrideRepository, Supplier,
    SupplierDirectory, TransferRepository,
};

pub use service::inventory::InventoryService;
pub use service::packaging::PackagingService;
pub use service::transfer::TransferService;
