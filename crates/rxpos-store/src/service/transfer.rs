//! # Transfer Service
//!
//! Orchestrates inter-shop transfers over the transfer state machine in
//! `rxpos_core::transfer`.
//!
//! ## Stock Movement Points
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  request    Pending      source FEFO deduction (TransferOut)            │
//! │  approve    Approved     no stock touched                               │
//! │  dispatch   InTransit    no stock touched                               │
//! │  receive    Completed    destination XFER-<id> batch (TransferIn)       │
//! │  cancel     Cancelled    source restored from any pre-completion state  │
//! │                          (Correction, XFER-<id>-RETURN batch)           │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! The reservation is pessimistic: the source gives up the quantity the
//! moment the request is created, so two shops can never sell the same
//! stock while a transfer is pending approval.
//!
//! The destination books the goods under a synthetic batch number because
//! source batch identities are not carried across shops; the earliest
//! expiry among the consumed source batches is stamped on it so FEFO at
//! the destination stays conservative.

use std::sync::Arc;

use chrono::Utc;
use tracing::info;

use rxpos_core::adjustment::MovementContext;
use rxpos_core::inventory::{Batch, ShopInventory};
use rxpos_core::transfer::StockTransfer;
use rxpos_core::types::{AdjustmentType, TransferStatus};

use crate::error::{StoreError, StoreResult};
use crate::repository::{AdjustmentLog, InventoryRepository, TransferRepository};
use crate::service::append_audit;

/// Orchestrates shop-to-shop stock transfers.
pub struct TransferService<I, T, A> {
    inventories: Arc<I>,
    transfers: Arc<T>,
    audit: Arc<A>,
}

impl<I, T, A> TransferService<I, T, A>
where
    I: InventoryRepository,
    T: TransferRepository,
    A: AdjustmentLog,
{
    pub fn new(inventories: Arc<I>, transfers: Arc<T>, audit: Arc<A>) -> Self {
        TransferService {
            inventories,
            transfers,
            audit,
        }
    }

    async fn load(&self, transfer_id: &str) -> StoreResult<StockTransfer> {
        self.transfers
            .get(transfer_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "transfer",
                id: transfer_id.to_string(),
            })
    }

    async fn load_inventory(&self, shop_id: &str, drug_id: &str) -> StoreResult<ShopInventory> {
        self.inventories
            .get(shop_id, drug_id)
            .await?
            .ok_or_else(|| StoreError::NotFound {
                entity: "inventory",
                id: format!("{shop_id}/{drug_id}"),
            })
    }

    fn carried_expiry(transfer: &StockTransfer) -> StoreResult<chrono::DateTime<Utc>> {
        transfer.earliest_expiry.ok_or_else(|| {
            StoreError::Repository(format!(
                "transfer {} has no recorded expiry",
                transfer.id
            ))
        })
    }

    // =========================================================================
    // Lifecycle
    // =========================================================================

    /// Creates a transfer request and immediately deducts the quantity
    /// FEFO at the source. The earliest expiry among the consumed batches
    /// is recorded on the transfer for the destination to carry.
    pub async fn request(
        &self,
        from_shop_id: &str,
        to_shop_id: &str,
        drug_id: &str,
        quantity: i64,
        requested_by: &str,
    ) -> StoreResult<StockTransfer> {
        let now = Utc::now();
        let mut transfer =
            StockTransfer::new(from_shop_id, to_shop_id, drug_id, quantity, requested_by, now)?;

        let mut source = self.load_inventory(from_shop_id, drug_id).await?;
        let ctx = MovementContext::new(
            AdjustmentType::TransferOut,
            format!("transfer to {to_shop_id}"),
            requested_by,
        )
        .with_reference("transfer", transfer.id.clone());
        let movement = source.reduce_stock(quantity, now, &ctx)?;
        transfer.earliest_expiry = movement.earliest_expiry();

        info!(
            transfer_id = %transfer.id,
            from = %from_shop_id,
            to = %to_shop_id,
            quantity = quantity,
            batches = movement.batch_deltas.len(),
            "Transfer requested, source stock reserved"
        );
        self.inventories.save(source).await?;
        self.transfers.save(transfer.clone()).await?;
        append_audit(self.audit.as_ref(), movement.adjustment).await;
        Ok(transfer)
    }

    /// Pending → Approved.
    pub async fn approve(&self, transfer_id: &str, approved_by: &str) -> StoreResult<StockTransfer> {
        let mut transfer = self.load(transfer_id).await?;
        transfer.approve(approved_by, Utc::now())?;
        self.transfers.save(transfer.clone()).await?;
        Ok(transfer)
    }

    /// Approved → InTransit. The stock already left the source at request
    /// time, so this is a pure status transition.
    pub async fn dispatch(&self, transfer_id: &str) -> StoreResult<StockTransfer> {
        let mut transfer = self.load(transfer_id).await?;
        transfer.mark_in_transit(Utc::now())?;
        info!(transfer_id = %transfer.id, "Transfer dispatched");
        self.transfers.save(transfer.clone()).await?;
        Ok(transfer)
    }

    /// InTransit → Completed. Books the goods at the destination under the
    /// transfer's synthetic batch number, creating the destination
    /// inventory record if needed.
    pub async fn receive(&self, transfer_id: &str, received_by: &str) -> StoreResult<StockTransfer> {
        let mut transfer = self.load(transfer_id).await?;
        transfer.complete(received_by, Utc::now())?;

        let expiry = Self::carried_expiry(&transfer)?;
        let mut destination = self
            .inventories
            .get(&transfer.to_shop_id, &transfer.drug_id)
            .await?
            .unwrap_or_else(|| ShopInventory::new(&transfer.to_shop_id, &transfer.drug_id));

        let batch = Batch::new(
            transfer.synthetic_batch_number(),
            &transfer.from_shop_id,
            transfer.quantity,
            Utc::now(),
            expiry,
        );
        let ctx = MovementContext::new(
            AdjustmentType::TransferIn,
            format!("transfer from {}", transfer.from_shop_id),
            received_by,
        )
        .with_reference("transfer", transfer.id.clone());
        let movement = destination.add_batch(batch, Utc::now(), &ctx)?;

        info!(transfer_id = %transfer.id, "Transfer received");
        self.inventories.save(destination).await?;
        self.transfers.save(transfer.clone()).await?;
        append_audit(self.audit.as_ref(), movement.adjustment).await;
        Ok(transfer)
    }

    /// Cancels a non-terminal transfer and restores the reserved quantity
    /// at the source under a return batch with the carried expiry, audited
    /// as a correction.
    pub async fn cancel(&self, transfer_id: &str, cancelled_by: &str) -> StoreResult<StockTransfer> {
        let mut transfer = self.load(transfer_id).await?;
        transfer.cancel(Utc::now())?;

        let expiry = Self::carried_expiry(&transfer)?;
        let mut source = self
            .load_inventory(&transfer.from_shop_id, &transfer.drug_id)
            .await?;

        let batch = Batch::new(
            format!("{}-RETURN", transfer.synthetic_batch_number()),
            &transfer.to_shop_id,
            transfer.quantity,
            Utc::now(),
            expiry,
        );
        let ctx = MovementContext::new(
            AdjustmentType::Correction,
            "transfer cancelled, reservation released",
            cancelled_by,
        )
        .with_reference("transfer", transfer.id.clone());
        let movement = source.add_batch(batch, Utc::now(), &ctx)?;

        info!(transfer_id = %transfer.id, "Transfer cancelled, source restored");
        self.inventories.save(source).await?;
        self.transfers.save(transfer.clone()).await?;
        append_audit(self.audit.as_ref(), movement.adjustment).await;
        Ok(transfer)
    }

    /// Transfers where the shop is sender or receiver, newest first.
    pub async fn list_for_shop(&self, shop_id: &str) -> StoreResult<Vec<StockTransfer>> {
        self.transfers.list_for_shop(shop_id).await
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
