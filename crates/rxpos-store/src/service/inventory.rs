//! # Inventory Service
//!
//! Batch receipts, FEFO issues, location moves, and the expiry sweep.
//! Every stock mutation persists the inventory and appends the paired
//! audit record (see the module docs in [`super`] for ordering).

use std::sync::Arc;

use chrono::{DateTime, Utc};
use tracing::{debug, info};

use rxpos_core::adjustment::{AdjustmentFilter, MovementContext, StockAdjustment, StockMovement};
use rxpos_core::inventory::{Batch, ShopInventory};
use rxpos_core::pricing::ShopPricing;
use rxpos_core::types::AdjustmentType;

use crate::error::{StoreError, StoreResult};
use crate::repository::{AdjustmentLog, InventoryRepository, SupplierDirectory};
use crate::service::append_audit;

/// Orchestrates the per-shop batch ledger.
pub struct InventoryService<I, S, A> {
    inventories: Arc<I>,
    suppliers: Arc<S>,
    audit: Arc<A>,
}

impl<I, S, A> InventoryService<I, S, A>
where
    I: InventoryRepository,
    S: SupplierDirectory,
    A: AdjustmentLog,
{
    pub fn new(inventories: Arc<I>, suppliers: Arc<S>, audit: Arc<A>) -> Self {
        InventoryService {
            inventories,
            suppliers,
            audit,
        }
    }

    // =========================================================================
    // Lookups
    // =========================================================================

    /// Fetches a shop's inventory record for a drug.
    pub async fn get(&self, shop_id: &str, drug_id: &str) -> StoreResult<ShopInventory> {
        self.inventories
            .get(shop_id, drug_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "inventory",
                id: format!("{shop_id}/{drug_id}"),
            })
    }

    async fn get_or_create(&self, shop_id: &str, drug_id: &str) -> StoreResult<ShopInventory> {
        Ok(self
            .inventories
            .get(shop_id, drug_id)
            .await?
            .unwrap_or_else(|| ShopInventory::new(shop_id, drug_id)))
    }

    /// Inventories at or below their reorder point, for the reorder report.
    pub async fn reorder_report(&self, shop_id: &str) -> StoreResult<Vec<ShopInventory>> {
        self.inventories.list_needing_reorder(shop_id).await
    }

    /// Adjustment history matching the filter, newest first.
    pub async fn history(&self, filter: &AdjustmentFilter) -> StoreResult<Vec<StockAdjustment>> {
        self.audit.query(filter).await
    }

    // =========================================================================
    // Stock Movements
    // =========================================================================

    /// Books a received supplier batch. Creates the inventory record on
    /// first receipt. The supplier must be on file.
    pub async fn receive_batch(
        &self,
        shop_id: &str,
        drug_id: &str,
        batch: Batch,
        received_by: &str,
    ) -> StoreResult<StockMovement> {
        if self.suppliers.get(&batch.supplier_id).await?.is_none() {
            return Err(StoreError::NotFound {
                entity: "supplier",
                id: batch.supplier_id.clone(),
            });
        }
        info!(
            shop_id = %shop_id,
            drug_id = %drug_id,
            batch_number = %batch.batch_number,
            quantity = batch.quantity_on_hand,
            "Receiving batch"
        );
        let mut inv = self.get_or_create(shop_id, drug_id).await?;
        let ctx = MovementContext::new(AdjustmentType::Receipt, "supplier delivery", received_by);
        let movement = inv.add_batch(batch, Utc::now(), &ctx)?;

        self.inventories.save(inv).await?;
        append_audit(self.audit.as_ref(), movement.adjustment.clone()).await;
        Ok(movement)
    }

    /// Deducts stock FEFO. The caller supplies the movement context so the
    /// same path serves sales, damage write-offs, and expiry disposals.
    pub async fn deduct_stock(
        &self,
        shop_id: &str,
        drug_id: &str,
        quantity: i64,
        ctx: MovementContext,
    ) -> StoreResult<StockMovement> {
        let mut inv = self.get(shop_id, drug_id).await?;
        let movement = inv.reduce_stock(quantity, Utc::now(), &ctx)?;
        debug!(
            shop_id = %shop_id,
            drug_id = %drug_id,
            quantity = quantity,
            batches = movement.batch_deltas.len(),
            "Deducted stock"
        );

        self.inventories.save(inv).await?;
        append_audit(self.audit.as_ref(), movement.adjustment.clone()).await;
        Ok(movement)
    }

    /// Moves stock from storage to the shop floor.
    pub async fn restock_shop_floor(
        &self,
        shop_id: &str,
        drug_id: &str,
        quantity: i64,
        batch_number: Option<&str>,
        moved_by: &str,
    ) -> StoreResult<StockMovement> {
        let mut inv = self.get(shop_id, drug_id).await?;
        let ctx = MovementContext::new(AdjustmentType::LocationMove, "shelf restock", moved_by);
        let movement = inv.restock_shop_floor(quantity, batch_number, Utc::now(), &ctx)?;

        self.inventories.save(inv).await?;
        append_audit(self.audit.as_ref(), movement.adjustment.clone()).await;
        Ok(movement)
    }

    /// Moves stock from the shop floor back to storage.
    pub async fn return_to_storage(
        &self,
        shop_id: &str,
        drug_id: &str,
        quantity: i64,
        batch_number: Option<&str>,
        moved_by: &str,
    ) -> StoreResult<StockMovement> {
        let mut inv = self.get(shop_id, drug_id).await?;
        let ctx = MovementContext::new(AdjustmentType::LocationMove, "return to storage", moved_by);
        let movement = inv.return_to_storage(quantity, batch_number, Utc::now(), &ctx)?;

        self.inventories.save(inv).await?;
        append_audit(self.audit.as_ref(), movement.adjustment.clone()).await;
        Ok(movement)
    }

    /// Recalls a batch into quarantine.
    pub async fn recall_batch(
        &self,
        shop_id: &str,
        drug_id: &str,
        batch_number: &str,
        recalled_by: &str,
    ) -> StoreResult<StockMovement> {
        let mut inv = self.get(shop_id, drug_id).await?;
        let ctx = MovementContext::new(AdjustmentType::Recall, "supplier recall", recalled_by);
        let movement = inv.recall_batch(batch_number, Utc::now(), &ctx)?;

        self.inventories.save(inv).await?;
        append_audit(self.audit.as_ref(), movement.adjustment.clone()).await;
        Ok(movement)
    }

    /// Reserves a batch against a pending order, taking it out of FEFO
    /// selection until released.
    pub async fn reserve_batch(
        &self,
        shop_id: &str,
        drug_id: &str,
        batch_number: &str,
        reserved_by: &str,
    ) -> StoreResult<StockMovement> {
        let mut inv = self.get(shop_id, drug_id).await?;
        let ctx = MovementContext::new(AdjustmentType::LocationMove, "held for order", reserved_by);
        let movement = inv.reserve_batch(batch_number, Utc::now(), &ctx)?;

        self.inventories.save(inv).await?;
        append_audit(self.audit.as_ref(), movement.adjustment.clone()).await;
        Ok(movement)
    }

    /// Releases a reserved batch back to active storage.
    pub async fn release_batch(
        &self,
        shop_id: &str,
        drug_id: &str,
        batch_number: &str,
        released_by: &str,
    ) -> StoreResult<StockMovement> {
        let mut inv = self.get(shop_id, drug_id).await?;
        let ctx =
            MovementContext::new(AdjustmentType::LocationMove, "reservation released", released_by);
        let movement = inv.release_batch(batch_number, Utc::now(), &ctx)?;

        self.inventories.save(inv).await?;
        append_audit(self.audit.as_ref(), movement.adjustment.clone()).await;
        Ok(movement)
    }

    /// Persists `Expired` status on every batch past its date. Returns the
    /// number of batches swept. Disposal of the quantity is a separate
    /// [`deduct_stock`](Self::deduct_stock) with an `Expired` context.
    pub async fn sweep_expired(&self, shop_id: &str, drug_id: &str) -> StoreResult<usize> {
        let mut inv = self.get(shop_id, drug_id).await?;
        let swept = inv.mark_expired(Utc::now());
        if swept > 0 {
            info!(shop_id = %shop_id, drug_id = %drug_id, swept = swept, "Swept expired batches");
            self.inventories.save(inv).await?;
        }
        Ok(swept)
    }

    // =========================================================================
    // Settings
    // =========================================================================

    /// Updates the reorder point.
    pub async fn set_reorder_point(
        &self,
        shop_id: &str,
        drug_id: &str,
        reorder_point: i64,
    ) -> StoreResult<()> {
        let mut inv = self.get(shop_id, drug_id).await?;
        inv.reorder_point = reorder_point;
        self.inventories.save(inv).await
    }

    /// Replaces the shop's price book for a drug. Creates the inventory
    /// record when pricing is configured before the first receipt.
    pub async fn update_pricing(
        &self,
        shop_id: &str,
        drug_id: &str,
        pricing: ShopPricing,
    ) -> StoreResult<()> {
        let mut inv = self.get_or_create(shop_id, drug_id).await?;
        inv.update_pricing(pricing);
        self.inventories.save(inv).await
    }

    /// Writes one per-unit price entry.
    pub async fn set_unit_price(
        &self,
        shop_id: &str,
        drug_id: &str,
        unit_name: &str,
        price: rxpos_core::Money,
    ) -> StoreResult<()> {
        let mut inv = self.get(shop_id, drug_id).await?;
        inv.set_packaging_level_price(unit_name, price);
        self.inventories.save(inv).await
    }

    /// Timestamp helper exposed for reporting: expired quantity as of now.
    pub async fn expired_quantity(
        &self,
        shop_id: &str,
        drug_id: &str,
        now: DateTime<Utc>,
    ) -> StoreResult<i64> {
        let inv = self.get(shop_id, drug_id).await?;
        Ok(inv.expired_quantity(now))
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use chrono::Duration;
    use rxpos_core::CoreError;

    use crate::repository::memory::{
        MemoryAdjustmentLog, MemoryInventoryRepository, MemorySupplierDirectory,
    };
    use crate::repository::Supplier;

    type Svc = InventoryService<
        MemoryInventoryRepository,
        MemorySupplierDirectory,
        MemoryAdjustmentLog,
    >;

    async fn service() -> (Svc, Arc<MemoryAdjustmentLog>) {
        let suppliers = Arc::new(MemorySupplierDirectory::new());
        suppliers
            .upsert(Supplier::new("sup-1", "Acme Pharma"))
            .await
            .unwrap();
        let audit = Arc::new(MemoryAdjustmentLog::new());
        (
            InventoryService::new(
                Arc::new(MemoryInventoryRepository::new()),
                suppliers,
                audit.clone(),
            ),
            audit,
        )
    }

    fn batch(number: &str, qty: i64, expires_in_days: i64) -> Batch {
        let now = Utc::now();
        Batch::new(number, "sup-1", qty, now, now + Duration::days(expires_in_days))
    }

    async fn seed(svc: &Svc) {
        svc.receive_batch("shop-a", "amox-500", batch("B1", 50, 10), "user-1")
            .await
            .unwrap();
        svc.receive_batch("shop-a", "amox-500", batch("B2", 50, 40), "user-1")
            .await
            .unwrap();
    }

    #[tokio::test]
    async fn test_receive_creates_inventory_and_audit() {
        let (svc, audit) = service().await;
        seed(&svc).await;

        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.total_stock, 100);
        assert_eq!(audit.len().await, 2);

        let history = svc
            .history(&AdjustmentFilter::for_shop("shop-a").of_type(AdjustmentType::Receipt))
            .await
            .unwrap();
        assert_eq!(history.len(), 2);
    }

    #[tokio::test]
    async fn test_sale_deducts_fefo_and_logs() {
        let (svc, _) = service().await;
        seed(&svc).await;

        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        let movement = svc
            .deduct_stock("shop-a", "amox-500", 70, ctx)
            .await
            .unwrap();
        assert_eq!(movement.adjustment.quantity_after, 30);

        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.batch_quantity("B1"), 0);
        assert_eq!(inv.batch_quantity("B2"), 30);

        let sales = svc
            .history(&AdjustmentFilter::for_shop("shop-a").of_type(AdjustmentType::Sale))
            .await
            .unwrap();
        assert_eq!(sales.len(), 1);
        assert_eq!(sales[0].quantity_changed, -70);
    }

    #[tokio::test]
    async fn test_insufficient_stock_persists_nothing() {
        let (svc, audit) = service().await;
        seed(&svc).await;
        let receipts = audit.len().await;

        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        let err = svc
            .deduct_stock("shop-a", "amox-500", 150, ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::InsufficientStock { .. })
        ));

        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.total_stock, 100);
        assert_eq!(audit.len().await, receipts); // no audit entry either
    }

    #[tokio::test]
    async fn test_location_moves_round_trip() {
        let (svc, _) = service().await;
        seed(&svc).await;

        svc.restock_shop_floor("shop-a", "amox-500", 20, None, "user-1")
            .await
            .unwrap();
        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.shop_floor_stock(), 20);
        assert_eq!(inv.storage_stock(), 80);

        svc.return_to_storage("shop-a", "amox-500", 20, None, "user-1")
            .await
            .unwrap();
        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.shop_floor_stock(), 0);
        assert_eq!(inv.storage_stock(), 100);
        assert_eq!(inv.total_stock, 100);
    }

    #[tokio::test]
    async fn test_sweep_and_dispose_expired() {
        let (svc, _) = service().await;
        svc.receive_batch("shop-a", "amox-500", batch("OLD", 30, -1), "user-1")
            .await
            .unwrap();
        svc.receive_batch("shop-a", "amox-500", batch("NEW", 50, 40), "user-1")
            .await
            .unwrap();

        let swept = svc.sweep_expired("shop-a", "amox-500").await.unwrap();
        assert_eq!(swept, 1);
        assert_eq!(
            svc.expired_quantity("shop-a", "amox-500", Utc::now())
                .await
                .unwrap(),
            30
        );

        // Disposal only touches sellable stock, so the expired 30 stay put
        // and the report shows them until written off by a stock count.
        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        svc.deduct_stock("shop-a", "amox-500", 50, ctx).await.unwrap();
        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.batch_quantity("OLD"), 30);
        assert_eq!(inv.batch_quantity("NEW"), 0);
    }

    #[tokio::test]
    async fn test_reorder_report() {
        let (svc, _) = service().await;
        seed(&svc).await;
        svc.set_reorder_point("shop-a", "amox-500", 40).await.unwrap();

        assert!(svc.reorder_report("shop-a").await.unwrap().is_empty());

        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        svc.deduct_stock("shop-a", "amox-500", 70, ctx).await.unwrap();

        let report = svc.reorder_report("shop-a").await.unwrap();
        assert_eq!(report.len(), 1);
        assert_eq!(report[0].drug_id, "amox-500");
    }

    #[tokio::test]
    async fn test_unknown_inventory_is_not_found() {
        let (svc, _) = service().await;
        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        assert!(matches!(
            svc.deduct_stock("shop-x", "nope", 1, ctx).await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
    }

    #[tokio::test]
    async fn test_receipt_rejects_unknown_supplier() {
        let (svc, audit) = service().await;

        let now = Utc::now();
        let err = svc
            .receive_batch(
                "shop-a",
                "amox-500",
                Batch::new("B1", "ghost-supplier", 50, now, now + Duration::days(30)),
                "user-1",
            )
            .await
            .unwrap_err();
        assert!(matches!(err, StoreError::NotFound { entity: "supplier", .. }));

        // Nothing persisted.
        assert!(matches!(
            svc.get("shop-a", "amox-500").await.unwrap_err(),
            StoreError::NotFound { .. }
        ));
        assert_eq!(audit.len().await, 0);
    }

    #[tokio::test]
    async fn test_reserve_and_release_batch() {
        let (svc, audit) = service().await;
        seed(&svc).await;

        svc.reserve_batch("shop-a", "amox-500", "B1", "user-1")
            .await
            .unwrap();
        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.reserved_stock(), 50);
        assert_eq!(inv.total_stock, 100);

        // Reserved stock is not sellable.
        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        let err = svc
            .deduct_stock("shop-a", "amox-500", 60, ctx)
            .await
            .unwrap_err();
        assert!(matches!(
            err,
            StoreError::Core(CoreError::InsufficientStock { .. })
        ));

        svc.release_batch("shop-a", "amox-500", "B1", "user-1")
            .await
            .unwrap();
        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.reserved_stock(), 0);
        assert_eq!(inv.storage_stock(), 100);

        let moves = svc
            .history(&AdjustmentFilter::for_shop("shop-a").of_type(AdjustmentType::LocationMove))
            .await
            .unwrap();
        assert_eq!(moves.len(), 2);
        assert_eq!(audit.len().await, 4); // 2 receipts + reserve + release
    }

    /// Adjustment log whose `append` always fails; `query` stays empty.
    struct DownAdjustmentLog;

    #[async_trait]
    impl AdjustmentLog for DownAdjustmentLog {
        async fn append(&self, _adjustment: StockAdjustment) -> StoreResult<()> {
            Err(StoreError::Repository("audit log unavailable".to_string()))
        }

        async fn query(&self, _filter: &AdjustmentFilter) -> StoreResult<Vec<StockAdjustment>> {
            Ok(Vec::new())
        }
    }

    #[tokio::test]
    async fn test_audit_failure_does_not_roll_back_stock_change() {
        let suppliers = Arc::new(MemorySupplierDirectory::new());
        suppliers
            .upsert(Supplier::new("sup-1", "Acme Pharma"))
            .await
            .unwrap();
        let svc = InventoryService::new(
            Arc::new(MemoryInventoryRepository::new()),
            suppliers,
            Arc::new(DownAdjustmentLog),
        );

        svc.receive_batch("shop-a", "amox-500", batch("B1", 50, 30), "user-1")
            .await
            .unwrap();

        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        let movement = svc
            .deduct_stock("shop-a", "amox-500", 20, ctx)
            .await
            .unwrap();
        assert_eq!(movement.adjustment.quantity_after, 30);

        // The deduction survived the failed audit append.
        let inv = svc.get("shop-a", "amox-500").await.unwrap();
        assert_eq!(inv.total_stock, 30);
    }
}
