//! # In-Memory Repositories
//!
//! `tokio::sync::RwLock` over `HashMap` implementations of every seam.
//! These back the test suite and single-process deployments; a database
//! backend implements the same traits.
//!
//! Writers clone on the way in and readers clone on the way out, so no
//! caller ever holds a reference into the locked maps.

use std::collections::HashMap;

use async_trait::async_trait;
use tokio::sync::RwLock;
use tracing::debug;

use rxpos_core::adjustment::{AdjustmentFilter, StockAdjustment};
use rxpos_core::inventory::ShopInventory;
use rxpos_core::overrides::OverrideSet;
use rxpos_core::packaging::PackagingInfo;
use rxpos_core::transfer::StockTransfer;

use crate::error::StoreResult;
use crate::repository::{
    AdjustmentLog, BarcodeHit, DrugCatalog, InventoryRepository, OverrideRepository, Supplier,
    SupplierDirectory, TransferRepository,
};

// =============================================================================
// Drug Catalog
// =============================================================================

/// In-memory packaging catalog keyed by drug id.
#[derive(Debug, Default)]
pub struct MemoryDrugCatalog {
    drugs: RwLock<HashMap<String, PackagingInfo>>,
}

impl MemoryDrugCatalog {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl DrugCatalog for MemoryDrugCatalog {
    async fn get_packaging(&self, drug_id: &str) -> StoreResult<Option<PackagingInfo>> {
        Ok(self.drugs.read().await.get(drug_id).cloned())
    }

    async fn save_packaging(&self, info: PackagingInfo) -> StoreResult<()> {
        // Structurally invalid hierarchies never reach storage.
        info.validate_or_reject()?;
        debug!(drug_id = %info.drug_id, levels = info.levels.len(), "Saving packaging");
        self.drugs.write().await.insert(info.drug_id.clone(), info);
        Ok(())
    }

    async fn find_by_barcode(&self, barcode: &str) -> StoreResult<Option<BarcodeHit>> {
        let drugs = self.drugs.read().await;
        for info in drugs.values() {
            if let Some(level) = info.level_by_barcode(barcode) {
                return Ok(Some(BarcodeHit {
                    drug_id: info.drug_id.clone(),
                    level_id: level.id.clone(),
                    unit_name: level.unit_name.clone(),
                }));
            }
        }
        Ok(None)
    }

    async fn list_drug_ids(&self) -> StoreResult<Vec<String>> {
        let mut ids: Vec<String> = self.drugs.read().await.keys().cloned().collect();
        ids.sort();
        Ok(ids)
    }
}

// =============================================================================
// Supplier Directory
// =============================================================================

/// In-memory supplier directory.
#[derive(Debug, Default)]
pub struct MemorySupplierDirectory {
    suppliers: RwLock<HashMap<String, Supplier>>,
}

impl MemorySupplierDirectory {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl SupplierDirectory for MemorySupplierDirectory {
    async fn get(&self, supplier_id: &str) -> StoreResult<Option<Supplier>> {
        Ok(self.suppliers.read().await.get(supplier_id).cloned())
    }

    async fn upsert(&self, supplier: Supplier) -> StoreResult<()> {
        self.suppliers
            .write()
            .await
            .insert(supplier.id.clone(), supplier);
        Ok(())
    }

    async fn list_active(&self) -> StoreResult<Vec<Supplier>> {
        let mut active: Vec<Supplier> = self
            .suppliers
            .read()
            .await
            .values()
            .filter(|s| s.is_active)
            .cloned()
            .collect();
        active.sort_by(|a, b| a.name.cmp(&b.name));
        Ok(active)
    }
}

// =============================================================================
// Inventory Repository
// =============================================================================

fn inventory_key(shop_id: &str, drug_id: &str) -> (String, String) {
    (shop_id.to_string(), drug_id.to_string())
}

/// In-memory batch inventories keyed by (shop id, drug id).
#[derive(Debug, Default)]
pub struct MemoryInventoryRepository {
    inventories: RwLock<HashMap<(String, String), ShopInventory>>,
}

impl MemoryInventoryRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl InventoryRepository for MemoryInventoryRepository {
    async fn get(&self, shop_id: &str, drug_id: &str) -> StoreResult<Option<ShopInventory>> {
        Ok(self
            .inventories
            .read()
            .await
            .get(&inventory_key(shop_id, drug_id))
            .cloned())
    }

    async fn save(&self, inventory: ShopInventory) -> StoreResult<()> {
        debug!(
            shop_id = %inventory.shop_id,
            drug_id = %inventory.drug_id,
            total_stock = inventory.total_stock,
            "Saving inventory"
        );
        let key = inventory_key(&inventory.shop_id, &inventory.drug_id);
        self.inventories.write().await.insert(key, inventory);
        Ok(())
    }

    async fn list_for_shop(&self, shop_id: &str) -> StoreResult<Vec<ShopInventory>> {
        let mut result: Vec<ShopInventory> = self
            .inventories
            .read()
            .await
            .values()
            .filter(|inv| inv.shop_id == shop_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| a.drug_id.cmp(&b.drug_id));
        Ok(result)
    }

    async fn list_needing_reorder(&self, shop_id: &str) -> StoreResult<Vec<ShopInventory>> {
        let mut result: Vec<ShopInventory> = self
            .inventories
            .read()
            .await
            .values()
            .filter(|inv| inv.shop_id == shop_id && inv.needs_reorder())
            .cloned()
            .collect();
        result.sort_by(|a, b| a.drug_id.cmp(&b.drug_id));
        Ok(result)
    }
}

// =============================================================================
// Override Repository
// =============================================================================

/// In-memory override sets keyed by (shop id, drug id).
#[derive(Debug, Default)]
pub struct MemoryOverrideRepository {
    sets: RwLock<HashMap<(String, String), OverrideSet>>,
}

impl MemoryOverrideRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl OverrideRepository for MemoryOverrideRepository {
    async fn get_set(&self, shop_id: &str, drug_id: &str) -> StoreResult<OverrideSet> {
        Ok(self
            .sets
            .read()
            .await
            .get(&inventory_key(shop_id, drug_id))
            .cloned()
            .unwrap_or_else(|| OverrideSet::new(shop_id, drug_id)))
    }

    async fn save_set(&self, set: OverrideSet) -> StoreResult<()> {
        debug!(
            shop_id = %set.shop_id,
            drug_id = %set.drug_id,
            overrides = set.overrides.len(),
            "Saving override set"
        );
        let key = inventory_key(&set.shop_id, &set.drug_id);
        self.sets.write().await.insert(key, set);
        Ok(())
    }
}

// =============================================================================
// Adjustment Log
// =============================================================================

/// In-memory append-only adjustment log.
#[derive(Debug, Default)]
pub struct MemoryAdjustmentLog {
    records: RwLock<Vec<StockAdjustment>>,
}

impl MemoryAdjustmentLog {
    pub fn new() -> Self {
        Self::default()
    }

    /// Total number of records. Test helper.
    pub async fn len(&self) -> usize {
        self.records.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.records.read().await.is_empty()
    }
}

#[async_trait]
impl AdjustmentLog for MemoryAdjustmentLog {
    async fn append(&self, adjustment: StockAdjustment) -> StoreResult<()> {
        debug!(
            shop_id = %adjustment.shop_id,
            drug_id = %adjustment.drug_id,
            adjustment_type = ?adjustment.adjustment_type,
            quantity_changed = adjustment.quantity_changed,
            "Appending stock adjustment"
        );
        self.records.write().await.push(adjustment);
        Ok(())
    }

    async fn query(&self, filter: &AdjustmentFilter) -> StoreResult<Vec<StockAdjustment>> {
        let mut hits: Vec<StockAdjustment> = self
            .records
            .read()
            .await
            .iter()
            .filter(|record| filter.matches(record))
            .cloned()
            .collect();
        hits.sort_by(|a, b| b.adjusted_at.cmp(&a.adjusted_at));
        Ok(hits)
    }
}

// =============================================================================
// Transfer Repository
// =============================================================================

/// In-memory transfer records keyed by transfer id.
#[derive(Debug, Default)]
pub struct MemoryTransferRepository {
    transfers: RwLock<HashMap<String, StockTransfer>>,
}

impl MemoryTransferRepository {
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl TransferRepository for MemoryTransferRepository {
    async fn get(&self, transfer_id: &str) -> StoreResult<Option<StockTransfer>> {
        Ok(self.transfers.read().await.get(transfer_id).cloned())
    }

    async fn save(&self, transfer: StockTransfer) -> StoreResult<()> {
        debug!(
            transfer_id = %transfer.id,
            status = ?transfer.status,
            "Saving transfer"
        );
        self.transfers
            .write()
            .await
            .insert(transfer.id.clone(), transfer);
        Ok(())
    }

    async fn list_for_shop(&self, shop_id: &str) -> StoreResult<Vec<StockTransfer>> {
        let mut result: Vec<StockTransfer> = self
            .transfers
            .read()
            .await
            .values()
            .filter(|t| t.from_shop_id == shop_id || t.to_shop_id == shop_id)
            .cloned()
            .collect();
        result.sort_by(|a, b| b.created_at.cmp(&a.created_at));
        Ok(result)
    }
}
