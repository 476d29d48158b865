//! # Repository Seams
//!
//! Async traits the services talk to, plus the in-memory implementations
//! used in tests and single-process deployments.
//!
//! ## Seam Layout
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  Services (packaging / inventory / transfer)                            │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  ┌──────────────┬────────────────┬──────────────┬──────────────────┐   │
//! │  │ DrugCatalog  │ OverrideRepo   │ InventoryRepo│ TransferRepo     │   │
//! │  │ (packaging)  │ (shop layers)  │ (batch       │ AdjustmentLog    │   │
//! │  │              │                │  ledger)     │ SupplierDirectory│   │
//! │  └──────────────┴────────────────┴──────────────┴──────────────────┘   │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  memory::* (tokio RwLock over HashMap) or a real database backend       │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Every trait is object-safe so services can hold `Arc<dyn Trait>`.

pub mod memory;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};

use rxpos_core::adjustment::{AdjustmentFilter, StockAdjustment};
use rxpos_core::inventory::ShopInventory;
use rxpos_core::overrides::OverrideSet;
use rxpos_core::packaging::PackagingInfo;
use rxpos_core::transfer::StockTransfer;

use crate::error::StoreResult;

// =============================================================================
// Supporting Records
// =============================================================================

/// Result of a global barcode lookup: which drug and which packaging level
/// the scanned code belongs to.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BarcodeHit {
    pub drug_id: String,
    pub level_id: String,
    pub unit_name: String,
}

/// A supplier on file. Batches reference suppliers by id.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Supplier {
    pub id: String,
    pub name: String,
    pub contact: Option<String>,
    pub is_active: bool,
}

impl Supplier {
    pub fn new(id: impl Into<String>, name: impl Into<String>) -> Self {
        Supplier {
            id: id.into(),
            name: name.into(),
            contact: None,
            is_active: true,
        }
    }
}

// =============================================================================
// Catalog Seams
// =============================================================================

/// Global packaging catalog, keyed by drug id.
#[async_trait]
pub trait DrugCatalog: Send + Sync {
    /// Fetches a drug's packaging hierarchy.
    async fn get_packaging(&self, drug_id: &str) -> StoreResult<Option<PackagingInfo>>;

    /// Creates or replaces a drug's packaging hierarchy. Implementations
    /// must reject hierarchies that fail structural validation.
    async fn save_packaging(&self, info: PackagingInfo) -> StoreResult<()>;

    /// Global barcode lookup across every drug's packaging levels.
    async fn find_by_barcode(&self, barcode: &str) -> StoreResult<Option<BarcodeHit>>;

    /// Lists all drug ids with a packaging hierarchy on file.
    async fn list_drug_ids(&self) -> StoreResult<Vec<String>>;
}

/// Supplier directory.
#[async_trait]
pub trait SupplierDirectory: Send + Sync {
    async fn get(&self, supplier_id: &str) -> StoreResult<Option<Supplier>>;
    async fn upsert(&self, supplier: Supplier) -> StoreResult<()>;
    async fn list_active(&self) -> StoreResult<Vec<Supplier>>;
}

// =============================================================================
// Shop-Scoped Seams
// =============================================================================

/// Per-shop batch inventories, keyed by (shop id, drug id).
#[async_trait]
pub trait InventoryRepository: Send + Sync {
    async fn get(&self, shop_id: &str, drug_id: &str) -> StoreResult<Option<ShopInventory>>;

    /// Creates or replaces an inventory record.
    async fn save(&self, inventory: ShopInventory) -> StoreResult<()>;

    async fn list_for_shop(&self, shop_id: &str) -> StoreResult<Vec<ShopInventory>>;

    /// Inventories at or below their reorder point.
    async fn list_needing_reorder(&self, shop_id: &str) -> StoreResult<Vec<ShopInventory>>;
}

/// Per-shop packaging override sets, keyed by (shop id, drug id).
#[async_trait]
pub trait OverrideRepository: Send + Sync {
    /// Fetches a shop's override set for a drug. Returns an empty set when
    /// the shop has no customizations.
    async fn get_set(&self, shop_id: &str, drug_id: &str) -> StoreResult<OverrideSet>;

    async fn save_set(&self, set: OverrideSet) -> StoreResult<()>;
}

// =============================================================================
// Audit and Transfer Seams
// =============================================================================

/// Append-only stock adjustment log.
#[async_trait]
pub trait AdjustmentLog: Send + Sync {
    /// Appends one record. Records are never updated or deleted.
    async fn append(&self, adjustment: StockAdjustment) -> StoreResult<()>;

    /// Records matching the filter, newest first.
    async fn query(&self, filter: &AdjustmentFilter) -> StoreResult<Vec<StockAdjustment>>;
}

/// Inter-shop transfer records.
#[async_trait]
pub trait TransferRepository: Send + Sync {
    async fn get(&self, transfer_id: &str) -> StoreResult<Option<StockTransfer>>;
    async fn save(&self, transfer: StockTransfer) -> StoreResult<()>;

    /// Transfers where the shop is sender or receiver, newest first.
    async fn list_for_shop(&self, shop_id: &str) -> StoreResult<Vec<StockTransfer>>;
}
