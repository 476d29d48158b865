//! # Stock Audit Trail
//!
//! Append-only [`StockAdjustment`] records plus the [`StockMovement`]
//! envelope that glues a mutation to its audit record.
//!
//! ## One Movement, One Record
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  reduce_stock(70) on ShopInventory                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  StockMovement {                                                        │
//! │      batch_deltas: [ B1: 50 → 0,  B2: 50 → 30 ]    ← what changed      │
//! │      adjustment:   Sale, -70, before 100, after 30 ← the audit record  │
//! │  }                                                                      │
//! │       │                                                                 │
//! │       ▼                                                                 │
//! │  Caller persists inventory + adjustment in ONE transaction             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! Adjustment creation always records `quantity_before` and computes
//! `quantity_after = before + changed`; records are never edited or deleted.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::types::AdjustmentType;

// =============================================================================
// Stock Adjustment
// =============================================================================

/// One append-only entry of the stock audit trail.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockAdjustment {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub shop_id: String,
    pub drug_id: String,

    /// Batch this adjustment is attributed to; `None` when the movement
    /// spanned several batches (FEFO) or no batch applies.
    pub batch_number: Option<String>,

    /// Cause of the adjustment. Closed set.
    pub adjustment_type: AdjustmentType,

    /// Signed change in base units (negative for issues).
    pub quantity_changed: i64,

    /// Total stock before the movement.
    pub quantity_before: i64,

    /// Total stock after the movement. Always `before + changed`.
    pub quantity_after: i64,

    /// Short operator-facing reason ("POS sale", "stock count", ...).
    pub reason: String,

    /// Free-form details.
    pub notes: Option<String>,

    /// Who performed the movement.
    pub adjusted_by: String,

    /// When the movement happened.
    pub adjusted_at: DateTime<Utc>,

    /// Id of the driving record (sale id, transfer id, ...).
    pub reference_id: Option<String>,

    /// Kind of the driving record ("sale", "transfer", ...).
    pub reference_type: Option<String>,
}

impl StockAdjustment {
    /// Creates an adjustment record, computing `quantity_after`.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        shop_id: impl Into<String>,
        drug_id: impl Into<String>,
        adjustment_type: AdjustmentType,
        quantity_changed: i64,
        quantity_before: i64,
        ctx: &MovementContext,
        adjusted_at: DateTime<Utc>,
    ) -> Self {
        StockAdjustment {
            id: Uuid::new_v4().to_string(),
            shop_id: shop_id.into(),
            drug_id: drug_id.into(),
            batch_number: None,
            adjustment_type,
            quantity_changed,
            quantity_before,
            quantity_after: quantity_before + quantity_changed,
            reason: ctx.reason.clone(),
            notes: ctx.notes.clone(),
            adjusted_by: ctx.adjusted_by.clone(),
            adjusted_at,
            reference_id: ctx.reference_id.clone(),
            reference_type: ctx.reference_type.clone(),
        }
    }

    /// Attributes the adjustment to a single batch.
    pub fn for_batch(mut self, batch_number: impl Into<String>) -> Self {
        self.batch_number = Some(batch_number.into());
        self
    }
}

// =============================================================================
// Movement Context
// =============================================================================

/// Who/why context every stock mutation carries so its audit record can be
/// generated in the same step.
#[derive(Debug, Clone)]
pub struct MovementContext {
    pub adjustment_type: AdjustmentType,
    pub reason: String,
    pub adjusted_by: String,
    pub notes: Option<String>,
    pub reference_id: Option<String>,
    pub reference_type: Option<String>,
}

impl MovementContext {
    pub fn new(
        adjustment_type: AdjustmentType,
        reason: impl Into<String>,
        adjusted_by: impl Into<String>,
    ) -> Self {
        MovementContext {
            adjustment_type,
            reason: reason.into(),
            adjusted_by: adjusted_by.into(),
            notes: None,
            reference_id: None,
            reference_type: None,
        }
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Links the movement to its driving record (sale, transfer, ...).
    pub fn with_reference(
        mut self,
        reference_type: impl Into<String>,
        reference_id: impl Into<String>,
    ) -> Self {
        self.reference_type = Some(reference_type.into());
        self.reference_id = Some(reference_id.into());
        self
    }
}

// =============================================================================
// Stock Movement
// =============================================================================

/// Before/after snapshot of one batch touched by a movement.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BatchDelta {
    pub batch_number: String,
    pub quantity_before: i64,
    pub quantity_after: i64,
    pub expiry_date: DateTime<Utc>,
}

/// The result of one inventory mutation: the generated audit record plus
/// per-batch snapshots, returned together so the caller persists both as
/// one atomic unit.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockMovement {
    pub adjustment: StockAdjustment,
    pub batch_deltas: Vec<BatchDelta>,
}

impl StockMovement {
    /// Earliest expiry date among the touched batches. Used by transfers to
    /// carry a conservative expiry to the destination.
    pub fn earliest_expiry(&self) -> Option<DateTime<Utc>> {
        self.batch_deltas.iter().map(|d| d.expiry_date).min()
    }
}

// =============================================================================
// Adjustment Filter
// =============================================================================

/// Query filter over the adjustment history (reporting, reconciliation).
#[derive(Debug, Clone, Default)]
pub struct AdjustmentFilter {
    pub shop_id: Option<String>,
    pub drug_id: Option<String>,
    pub adjustment_type: Option<AdjustmentType>,
    pub from: Option<DateTime<Utc>>,
    pub to: Option<DateTime<Utc>>,
}

impl AdjustmentFilter {
    pub fn for_shop(shop_id: impl Into<String>) -> Self {
        AdjustmentFilter {
            shop_id: Some(shop_id.into()),
            ..Default::default()
        }
    }

    pub fn drug(mut self, drug_id: impl Into<String>) -> Self {
        self.drug_id = Some(drug_id.into());
        self
    }

    pub fn of_type(mut self, adjustment_type: AdjustmentType) -> Self {
        self.adjustment_type = Some(adjustment_type);
        self
    }

    pub fn between(mut self, from: DateTime<Utc>, to: DateTime<Utc>) -> Self {
        self.from = Some(from);
        self.to = Some(to);
        self
    }

    /// Whether one record passes the filter.
    pub fn matches(&self, adjustment: &StockAdjustment) -> bool {
        if let Some(shop_id) = &self.shop_id {
            if adjustment.shop_id != *shop_id {
                return false;
            }
        }
        if let Some(drug_id) = &self.drug_id {
            if adjustment.drug_id != *drug_id {
                return false;
            }
        }
        if let Some(t) = self.adjustment_type {
            if adjustment.adjustment_type != t {
                return false;
            }
        }
        if let Some(from) = self.from {
            if adjustment.adjusted_at < from {
                return false;
            }
        }
        if let Some(to) = self.to {
            if adjustment.adjusted_at > to {
                return false;
            }
        }
        true
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;
    use chrono::TimeZone;

    fn ts(day: u32) -> DateTime<Utc> {
        Utc.with_ymd_and_hms(2025, 6, day, 12, 0, 0).unwrap()
    }

    fn sale_adjustment(day: u32, shop: &str, drug: &str) -> StockAdjustment {
        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        StockAdjustment::new(shop, drug, AdjustmentType::Sale, -70, 100, &ctx, ts(day))
    }

    #[test]
    fn test_quantity_after_is_computed() {
        let adj = sale_adjustment(1, "shop-1", "amox-500");
        assert_eq!(adj.quantity_before, 100);
        assert_eq!(adj.quantity_changed, -70);
        assert_eq!(adj.quantity_after, 30);
        assert!(!adj.id.is_empty());
    }

    #[test]
    fn test_context_reference_carried() {
        let ctx = MovementContext::new(AdjustmentType::TransferOut, "transfer", "user-1")
            .with_reference("transfer", "xfer-9")
            .with_notes("to branch B");
        let adj = StockAdjustment::new(
            "shop-a",
            "amox-500",
            ctx.adjustment_type,
            -20,
            100,
            &ctx,
            ts(2),
        );
        assert_eq!(adj.reference_id.as_deref(), Some("xfer-9"));
        assert_eq!(adj.reference_type.as_deref(), Some("transfer"));
        assert_eq!(adj.notes.as_deref(), Some("to branch B"));
    }

    #[test]
    fn test_movement_earliest_expiry() {
        let ctx = MovementContext::new(AdjustmentType::Sale, "POS sale", "user-1");
        let movement = StockMovement {
            adjustment: StockAdjustment::new(
                "s",
                "d",
                AdjustmentType::Sale,
                -70,
                100,
                &ctx,
                ts(3),
            ),
            batch_deltas: vec![
                BatchDelta {
                    batch_number: "B2".into(),
                    quantity_before: 50,
                    quantity_after: 30,
                    expiry_date: ts(20),
                },
                BatchDelta {
                    batch_number: "B1".into(),
                    quantity_before: 50,
                    quantity_after: 0,
                    expiry_date: ts(10),
                },
            ],
        };
        assert_eq!(movement.earliest_expiry(), Some(ts(10)));
    }

    #[test]
    fn test_filter_matching() {
        let adj = sale_adjustment(5, "shop-1", "amox-500");

        assert!(AdjustmentFilter::for_shop("shop-1").matches(&adj));
        assert!(!AdjustmentFilter::for_shop("shop-2").matches(&adj));
        assert!(AdjustmentFilter::for_shop("shop-1")
            .drug("amox-500")
            .of_type(AdjustmentType::Sale)
            .matches(&adj));
        assert!(!AdjustmentFilter::default()
            .of_type(AdjustmentType::Receipt)
            .matches(&adj));
        assert!(AdjustmentFilter::default()
            .between(ts(1), ts(10))
            .matches(&adj));
        assert!(!AdjustmentFilter::default()
            .between(ts(6), ts(10))
            .matches(&adj));
    }
}
