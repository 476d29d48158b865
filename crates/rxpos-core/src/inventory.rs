//! # Batch Stock Ledger
//!
//! Per-shop-per-drug batch inventory with FEFO depletion, physical
//! locations, and audit-paired mutations.
//!
//! ## FEFO (First-Expired-First-Out)
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reduce_stock(70)                                                       │
//! │                                                                         │
//! │  Batches sorted by expiry:   B1 (qty 50, expires +10d)                 │
//! │                              B2 (qty 50, expires +40d)                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Pre-check: available 100 ≥ 70   (fail here = NOTHING touched)         │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Drain B1: 50 → 0    Drain B2: 50 → 30                                 │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StockMovement { deltas: [B1 50→0, B2 50→30], adjustment: -70 }        │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Batch Slices
//! A batch is identified by its batch number, but its quantity may be
//! physically split across locations (half the box on the shelf, half in
//! the back room). The ledger stores one [`Batch`] entry per
//! (batch_number, location) slice; `add_batch` still enforces a unique
//! batch number per receipt, and location moves split/merge slices.
//!
//! ## Concurrency
//! All mutations to one `ShopInventory` must be serialized by the caller
//! (per-(shop, drug) lock or optimistic-concurrency token): FEFO issue and
//! location moves both read-then-write the batch collection.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::adjustment::{BatchDelta, MovementContext, StockAdjustment, StockMovement};
use crate::error::{CoreError, CoreResult, ValidationError};
use crate::money::Money;
use crate::pricing::ShopPricing;
use crate::types::{BatchStatus, StockLocation};
use crate::validation::{validate_batch_number, validate_id, validate_movement_quantity};

// =============================================================================
// Batch
// =============================================================================

/// A dated, priced lot of physical stock received together.
///
/// One entry represents the slice of a batch sitting in one location; see
/// the module docs on batch slices.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Batch {
    /// Supplier's batch/lot number. Unique per receipt within an inventory.
    pub batch_number: String,

    /// Supplier the batch came from.
    pub supplier_id: String,

    /// Quantity in base units. Never negative.
    pub quantity_on_hand: i64,

    pub received_date: DateTime<Utc>,
    pub expiry_date: DateTime<Utc>,

    /// Cost per base unit at receipt.
    pub purchase_price: Money,

    /// Suggested selling price per base unit for this lot.
    pub selling_price: Money,

    pub status: BatchStatus,
    pub location: StockLocation,
}

impl Batch {
    /// Creates an active batch in storage (the receipt default).
    pub fn new(
        batch_number: impl Into<String>,
        supplier_id: impl Into<String>,
        quantity_on_hand: i64,
        received_date: DateTime<Utc>,
        expiry_date: DateTime<Utc>,
    ) -> Self {
        Batch {
            batch_number: batch_number.into(),
            supplier_id: supplier_id.into(),
            quantity_on_hand,
            received_date,
            expiry_date,
            purchase_price: Money::zero(),
            selling_price: Money::zero(),
            status: BatchStatus::Active,
            location: StockLocation::Storage,
        }
    }

    /// Sets purchase and selling prices.
    pub fn with_prices(mut self, purchase: Money, selling: Money) -> Self {
        self.purchase_price = purchase;
        self.selling_price = selling;
        self
    }

    /// Whether the batch is past its expiry date. Time-derived: `Expired`
    /// status is persisted only by an explicit sweep.
    #[inline]
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiry_date <= now
    }

    /// Whether this slice may be drained by a FEFO issue.
    pub fn is_available_for_sale(&self, now: DateTime<Utc>) -> bool {
        self.status == BatchStatus::Active
            && !self.is_expired(now)
            && self.quantity_on_hand > 0
            && matches!(
                self.location,
                StockLocation::Storage | StockLocation::ShopFloor
            )
    }
}

// =============================================================================
// Shop Inventory
// =============================================================================

/// Aggregate root: everything one shop holds of one drug.
///
/// `total_stock` and `is_available` are cached sums over the batch list,
/// refreshed by every dedicated mutation; call
/// [`recalculate_total_stock`](Self::recalculate_total_stock) after any
/// bulk external mutation that bypasses them.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct ShopInventory {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub shop_id: String,
    pub drug_id: String,

    /// Reorder when total stock falls to this level. 0 disables the check.
    pub reorder_point: i64,

    /// Free-form physical storage hint ("Shelf 4B", "Fridge 2").
    pub storage_location: Option<String>,

    /// The shop's price book for this drug.
    pub pricing: ShopPricing,

    /// Cached name of the shop's default sell unit, propagated from the
    /// override set by the store layer.
    pub shop_specific_sell_unit: Option<String>,

    /// Shop-level minimum sale quantity (in default sell units).
    pub minimum_sale_quantity: Option<f64>,

    /// Batch slices; see module docs.
    pub batches: Vec<Batch>,

    /// Cached Σ batch.quantity_on_hand.
    pub total_stock: i64,

    /// Cached `total_stock > 0`.
    pub is_available: bool,

    pub last_restock_date: Option<DateTime<Utc>>,
}

impl ShopInventory {
    /// Creates an empty inventory record for one (shop, drug).
    pub fn new(shop_id: impl Into<String>, drug_id: impl Into<String>) -> Self {
        ShopInventory {
            id: Uuid::new_v4().to_string(),
            shop_id: shop_id.into(),
            drug_id: drug_id.into(),
            reorder_point: 0,
            storage_location: None,
            pricing: ShopPricing::default(),
            shop_specific_sell_unit: None,
            minimum_sale_quantity: None,
            batches: Vec::new(),
            total_stock: 0,
            is_available: false,
            last_restock_date: None,
        }
    }

    // =========================================================================
    // Derived Stock Figures
    // =========================================================================

    /// Stock in one physical location.
    pub fn location_stock(&self, location: StockLocation) -> i64 {
        self.batches
            .iter()
            .filter(|b| b.location == location)
            .map(|b| b.quantity_on_hand)
            .sum()
    }

    /// Stock in back-room storage.
    pub fn storage_stock(&self) -> i64 {
        self.location_stock(StockLocation::Storage)
    }

    /// Stock on customer-facing shelves.
    pub fn shop_floor_stock(&self) -> i64 {
        self.location_stock(StockLocation::ShopFloor)
    }

    /// Stock held against reservations.
    pub fn reserved_stock(&self) -> i64 {
        self.location_stock(StockLocation::Reserved)
    }

    /// Stock isolated in quarantine.
    pub fn quarantined_stock(&self) -> i64 {
        self.location_stock(StockLocation::Quarantine)
    }

    /// Total quantity of one batch across all its location slices.
    pub fn batch_quantity(&self, batch_number: &str) -> i64 {
        self.batches
            .iter()
            .filter(|b| b.batch_number == batch_number)
            .map(|b| b.quantity_on_hand)
            .sum()
    }

    /// Whether total stock has fallen to the reorder point.
    pub fn needs_reorder(&self) -> bool {
        self.reorder_point > 0 && self.total_stock <= self.reorder_point
    }

    /// Quantity sitting in batches past their expiry date.
    pub fn expired_quantity(&self, now: DateTime<Utc>) -> i64 {
        self.batches
            .iter()
            .filter(|b| b.is_expired(now))
            .map(|b| b.quantity_on_hand)
            .sum()
    }

    /// Resum all batch quantities into the cached totals.
    ///
    /// Call after any bulk external mutation that bypassed the dedicated
    /// movement methods.
    pub fn recalculate_total_stock(&mut self) {
        self.total_stock = self.batches.iter().map(|b| b.quantity_on_hand).sum();
        self.is_available = self.total_stock > 0;
    }

    // =========================================================================
    // Receipts
    // =========================================================================

    /// Appends a received batch and refreshes the cached totals and
    /// `last_restock_date`.
    ///
    /// The adjustment type comes from `ctx`: `Receipt` for supplier
    /// deliveries, `TransferIn` / `Correction` for transfer completion and
    /// cancellation restores.
    pub fn add_batch(
        &mut self,
        batch: Batch,
        now: DateTime<Utc>,
        ctx: &MovementContext,
    ) -> CoreResult<StockMovement> {
        validate_batch_number(&batch.batch_number)?;
        validate_id("supplier_id", &batch.supplier_id)?;
        validate_movement_quantity(batch.quantity_on_hand)?;

        if self
            .batches
            .iter()
            .any(|b| b.batch_number == batch.batch_number)
        {
            return Err(ValidationError::Duplicate {
                field: "batch_number".to_string(),
                value: batch.batch_number.clone(),
            }
            .into());
        }

        let before = self.total_stock;
        let delta = BatchDelta {
            batch_number: batch.batch_number.clone(),
            quantity_before: 0,
            quantity_after: batch.quantity_on_hand,
            expiry_date: batch.expiry_date,
        };
        let adjustment = StockAdjustment::new(
            self.shop_id.clone(),
            self.drug_id.clone(),
            ctx.adjustment_type,
            batch.quantity_on_hand,
            before,
            ctx,
            now,
        )
        .for_batch(batch.batch_number.clone());

        self.batches.push(batch);
        self.recalculate_total_stock();
        self.last_restock_date = Some(now);

        Ok(StockMovement {
            adjustment,
            batch_deltas: vec![delta],
        })
    }

    // =========================================================================
    // FEFO Issue
    // =========================================================================

    /// Reduces total stock by `qty`, draining the earliest-expiring batch
    /// first.
    ///
    /// All-or-nothing: availability is checked across every sellable batch
    /// *before* any quantity is touched, so an `InsufficientStock` failure
    /// leaves the ledger exactly as it was. Reserved and quarantined slices
    /// never participate.
    pub fn reduce_stock(
        &mut self,
        qty: i64,
        now: DateTime<Utc>,
        ctx: &MovementContext,
    ) -> CoreResult<StockMovement> {
        validate_movement_quantity(qty)?;

        let mut order: Vec<usize> = (0..self.batches.len())
            .filter(|&i| self.batches[i].is_available_for_sale(now))
            .collect();
        order.sort_by(|&a, &b| {
            let (ba, bb) = (&self.batches[a], &self.batches[b]);
            ba.expiry_date
                .cmp(&bb.expiry_date)
                .then_with(|| ba.batch_number.cmp(&bb.batch_number))
        });

        let available: i64 = order
            .iter()
            .map(|&i| self.batches[i].quantity_on_hand)
            .sum();
        if available < qty {
            return Err(CoreError::InsufficientStock {
                drug_id: self.drug_id.clone(),
                available,
                requested: qty,
            });
        }

        let before = self.total_stock;
        let mut remaining = qty;
        let mut deltas = Vec::new();
        for i in order {
            if remaining == 0 {
                break;
            }
            let batch = &mut self.batches[i];
            let take = remaining.min(batch.quantity_on_hand);
            deltas.push(BatchDelta {
                batch_number: batch.batch_number.clone(),
                quantity_before: batch.quantity_on_hand,
                quantity_after: batch.quantity_on_hand - take,
                expiry_date: batch.expiry_date,
            });
            batch.quantity_on_hand -= take;
            remaining -= take;
        }
        self.recalculate_total_stock();

        let mut adjustment = StockAdjustment::new(
            self.shop_id.clone(),
            self.drug_id.clone(),
            ctx.adjustment_type,
            -qty,
            before,
            ctx,
            now,
        );
        if deltas.len() == 1 {
            adjustment = adjustment.for_batch(deltas[0].batch_number.clone());
        }

        Ok(StockMovement {
            adjustment,
            batch_deltas: deltas,
        })
    }

    // =========================================================================
    // Location Moves
    // =========================================================================

    /// Moves quantity from storage to the shop floor.
    ///
    /// FEFO-selects source batches when `batch_number` is omitted. Total
    /// stock is unchanged; failure is scoped to the storage location.
    pub fn restock_shop_floor(
        &mut self,
        qty: i64,
        batch_number: Option<&str>,
        now: DateTime<Utc>,
        ctx: &MovementContext,
    ) -> CoreResult<StockMovement> {
        self.move_stock(
            qty,
            StockLocation::Storage,
            StockLocation::ShopFloor,
            batch_number,
            now,
            ctx,
        )
    }

    /// Moves quantity from the shop floor back to storage.
    pub fn return_to_storage(
        &mut self,
        qty: i64,
        batch_number: Option<&str>,
        now: DateTime<Utc>,
        ctx: &MovementContext,
    ) -> CoreResult<StockMovement> {
        self.move_stock(
            qty,
            StockLocation::ShopFloor,
            StockLocation::Storage,
            batch_number,
            now,
            ctx,
        )
    }

    fn move_stock(
        &mut self,
        qty: i64,
        from: StockLocation,
        to: StockLocation,
        batch_number: Option<&str>,
        now: DateTime<Utc>,
        ctx: &MovementContext,
    ) -> CoreResult<StockMovement> {
        validate_movement_quantity(qty)?;

        if let Some(bn) = batch_number {
            if !self.batches.iter().any(|b| b.batch_number == bn) {
                return Err(CoreError::NotFound {
                    entity: "batch",
                    id: bn.to_string(),
                });
            }
        }

        let mut order: Vec<usize> = (0..self.batches.len())
            .filter(|&i| {
                let b = &self.batches[i];
                b.location == from
                    && b.status == BatchStatus::Active
                    && b.quantity_on_hand > 0
                    && batch_number.map_or(true, |bn| b.batch_number == bn)
            })
            .collect();
        order.sort_by(|&a, &b| {
            let (ba, bb) = (&self.batches[a], &self.batches[b]);
            ba.expiry_date
                .cmp(&bb.expiry_date)
                .then_with(|| ba.batch_number.cmp(&bb.batch_number))
        });

        let available: i64 = order
            .iter()
            .map(|&i| self.batches[i].quantity_on_hand)
            .sum();
        if available < qty {
            return Err(CoreError::InsufficientLocationStock {
                drug_id: self.drug_id.clone(),
                location: from,
                available,
                requested: qty,
            });
        }

        let before = self.total_stock;
        let mut remaining = qty;
        let mut deltas = Vec::new();
        for i in order {
            if remaining == 0 {
                break;
            }
            let take = remaining.min(self.batches[i].quantity_on_hand);
            let source = &mut self.batches[i];
            deltas.push(BatchDelta {
                batch_number: source.batch_number.clone(),
                quantity_before: source.quantity_on_hand,
                quantity_after: source.quantity_on_hand - take,
                expiry_date: source.expiry_date,
            });
            source.quantity_on_hand -= take;
            let template = source.clone();

            // Merge into an existing destination slice, else split one off.
            match self
                .batches
                .iter_mut()
                .find(|b| b.batch_number == template.batch_number && b.location == to)
            {
                Some(dest) => dest.quantity_on_hand += take,
                None => {
                    let mut dest = template;
                    dest.location = to;
                    dest.quantity_on_hand = take;
                    self.batches.push(dest);
                }
            }
            remaining -= take;
        }

        // Drop emptied slices that now have a sibling slice; a batch's last
        // slice stays visible even at zero.
        let mut i = 0;
        while i < self.batches.len() {
            let b = &self.batches[i];
            let has_sibling = self
                .batches
                .iter()
                .enumerate()
                .any(|(j, o)| j != i && o.batch_number == b.batch_number);
            if b.quantity_on_hand == 0 && has_sibling {
                self.batches.remove(i);
            } else {
                i += 1;
            }
        }
        self.recalculate_total_stock();

        // Net-zero on total stock: before == after by construction.
        let adjustment = StockAdjustment::new(
            self.shop_id.clone(),
            self.drug_id.clone(),
            ctx.adjustment_type,
            0,
            before,
            ctx,
            now,
        );

        Ok(StockMovement {
            adjustment,
            batch_deltas: deltas,
        })
    }

    // =========================================================================
    // Batch Lifecycle
    // =========================================================================

    /// Persists the time-derived `Expired` status on every active batch
    /// past its expiry date. Returns the number of slices swept.
    pub fn mark_expired(&mut self, now: DateTime<Utc>) -> usize {
        let mut swept = 0;
        for batch in &mut self.batches {
            if batch.status == BatchStatus::Active && batch.is_expired(now) {
                batch.status = BatchStatus::Expired;
                swept += 1;
            }
        }
        swept
    }

    /// Recalls a batch: every slice goes to `Recalled` status and the
    /// quarantine location. Quantity is untouched; disposal is a separate
    /// movement.
    pub fn recall_batch(
        &mut self,
        batch_number: &str,
        now: DateTime<Utc>,
        ctx: &MovementContext,
    ) -> CoreResult<StockMovement> {
        let slices = self.batch_slices(batch_number)?;
        if slices
            .iter()
            .any(|&i| self.batches[i].status == BatchStatus::Recalled)
        {
            return Err(CoreError::BatchStateConflict {
                batch_number: batch_number.to_string(),
                current_status: "recalled".to_string(),
                operation: "recall",
            });
        }

        let mut deltas = Vec::new();
        for i in slices {
            let batch = &mut self.batches[i];
            batch.status = BatchStatus::Recalled;
            batch.location = StockLocation::Quarantine;
            deltas.push(BatchDelta {
                batch_number: batch.batch_number.clone(),
                quantity_before: batch.quantity_on_hand,
                quantity_after: batch.quantity_on_hand,
                expiry_date: batch.expiry_date,
            });
        }

        Ok(StockMovement {
            adjustment: self.status_adjustment(batch_number, ctx, now),
            batch_deltas: deltas,
        })
    }

    /// Reserves a batch against a pending order: every slice goes to
    /// `Reserved` status and the reserved location, taking it out of FEFO
    /// selection. Quantity is untouched.
    pub fn reserve_batch(
        &mut self,
        batch_number: &str,
        now: DateTime<Utc>,
        ctx: &MovementContext,
    ) -> CoreResult<StockMovement> {
        let slices = self.batch_slices(batch_number)?;
        if let Some(&i) = slices
            .iter()
            .find(|&&i| self.batches[i].status != BatchStatus::Active)
        {
            return Err(CoreError::BatchStateConflict {
                batch_number: batch_number.to_string(),
                current_status: format!("{:?}", self.batches[i].status).to_lowercase(),
                operation: "reserve",
            });
        }

        let mut deltas = Vec::new();
        for i in slices {
            let batch = &mut self.batches[i];
            batch.status = BatchStatus::Reserved;
            batch.location = StockLocation::Reserved;
            deltas.push(BatchDelta {
                batch_number: batch.batch_number.clone(),
                quantity_before: batch.quantity_on_hand,
                quantity_after: batch.quantity_on_hand,
                expiry_date: batch.expiry_date,
            });
        }

        Ok(StockMovement {
            adjustment: self.status_adjustment(batch_number, ctx, now),
            batch_deltas: deltas,
        })
    }

    /// Releases a reserved batch back to active storage.
    pub fn release_batch(
        &mut self,
        batch_number: &str,
        now: DateTime<Utc>,
        ctx: &MovementContext,
    ) -> CoreResult<StockMovement> {
        let slices = self.batch_slices(batch_number)?;
        if let Some(&i) = slices
            .iter()
            .find(|&&i| self.batches[i].status != BatchStatus::Reserved)
        {
            return Err(CoreError::BatchStateConflict {
                batch_number: batch_number.to_string(),
                current_status: format!("{:?}", self.batches[i].status).to_lowercase(),
                operation: "release",
            });
        }

        let mut deltas = Vec::new();
        for i in slices {
            let batch = &mut self.batches[i];
            batch.status = BatchStatus::Active;
            batch.location = StockLocation::Storage;
            deltas.push(BatchDelta {
                batch_number: batch.batch_number.clone(),
                quantity_before: batch.quantity_on_hand,
                quantity_after: batch.quantity_on_hand,
                expiry_date: batch.expiry_date,
            });
        }

        Ok(StockMovement {
            adjustment: self.status_adjustment(batch_number, ctx, now),
            batch_deltas: deltas,
        })
    }

    fn batch_slices(&self, batch_number: &str) -> CoreResult<Vec<usize>> {
        let slices: Vec<usize> = (0..self.batches.len())
            .filter(|&i| self.batches[i].batch_number == batch_number)
            .collect();
        if slices.is_empty() {
            return Err(CoreError::NotFound {
                entity: "batch",
                id: batch_number.to_string(),
            });
        }
        Ok(slices)
    }

    /// Net-zero adjustment for a status transition that moves no quantity.
    fn status_adjustment(
        &self,
        batch_number: &str,
        ctx: &MovementContext,
        now: DateTime<Utc>,
    ) -> StockAdjustment {
        StockAdjustment::new(
            self.shop_id.clone(),
            self.drug_id.clone(),
            ctx.adjustment_type,
            0,
            self.total_stock,
            ctx,
            now,
        )
        .for_batch(batch_number)
    }

    // =========================================================================
    // Pricing
    // =========================================================================

    /// Replaces the shop's price book for this drug.
    pub fn update_pricing(&mut self, pricing: ShopPricing) {
        self.pricing = pricing;
    }

    /// Price for one packaging level; falls back to the flat selling price.
    pub fn get_packaging_level_price(&self, unit_name: &str) -> Money {
        self.pricing.price_for_unit(unit_name)
    }

    /// Writes one per-unit price entry.
    pub fn set_packaging_level_price(&mut self, unit_name: &str, price: Money) {
        self.pricing.set_unit_price(unit_name, price);
    }

    // =========================================================================
    // Sell-Unit Cache
    // =========================================================================

    /// Caches the shop's default sell unit name (propagated from the
    /// override set).
    pub fn set_shop_specific_sell_unit(&mut self, unit_name: impl Into<String>) {
        self.shop_specific_sell_unit = Some(unit_name.into());
    }

    /// Clears the cached sell unit if it matches `unit_name`.
    pub fn clear_shop_specific_sell_unit_if(&mut self, unit_name: &str) {
        if self
            .shop_specific_sell_unit
            .as_deref()
            .is_some_and(|cached| cached.eq_ignore_ascii_case(unit_name))
        {
            self.shop_specific_sell_unit = None;
        }
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
