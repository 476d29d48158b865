//! # Orchestration Services
//!
//! Services glue the pure core logic to the repository seams: they load
//! state, apply a core operation, and persist the result together with its
//! audit record.
//!
//! ## Persistence Ordering
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │  1. Load aggregate(s) from repositories                                 │
//! │  2. Apply core mutation in memory (may fail, nothing persisted yet)     │
//! │  3. Save mutated aggregate(s)                                           │
//! │  4. Append audit record                                                 │
//! │       └─ append failure is logged at ERROR and never unwinds the        │
//! │          already-persisted stock change                                 │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```

pub mod inventory;
pub mod packaging;
pub mod transfer;

use tracing::error;

use rxpos_core::adjustment::StockAdjustment;

use crate::repository::AdjustmentLog;

/// Appends an audit record, logging instead of failing when the log is
/// unavailable. The stock change it describes is already persisted.
pub(crate) async fn append_audit<A: AdjustmentLog + ?Sized>(log: &A, adjustment: StockAdjustment) {
    let id = adjustment.id.clone();
    if let Err(e) = log.append(adjustment).await {
        error!(adjustment_id = %id, error = %e, "Failed to append stock adjustment");
    }
}
