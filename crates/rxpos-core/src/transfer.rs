//! # Inter-Shop Stock Transfers
//!
//! The [`StockTransfer`] record and its status state machine. Stock
//! movement itself lives in the store layer; this module only guards the
//! legal transitions and carries the transfer's facts.
//!
//! ## Lifecycle
//! ```text
//!             approve        mark_in_transit       complete
//!  Pending ──────────► Approved ──────────► InTransit ──────────► Completed
//!     │                   │                     │
//!     └───────────────────┴─────────────────────┘
//!                       cancel
//!                         │
//!                         ▼
//!                     Cancelled   (source stock restored)
//! ```
//!
//! Stock leaves the source at creation (pessimistic reservation, FEFO,
//! `TransferOut`) and lands at the destination at completion (`TransferIn`,
//! synthetic `XFER-<id>` batch stamped with the earliest expiry among the
//! consumed source batches). Cancelling any pre-Completed transfer restores
//! the source. Completed and Cancelled are terminal.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::{CoreError, CoreResult, ValidationError};
use crate::types::TransferStatus;
use crate::validation::{validate_id, validate_movement_quantity};

/// One inter-shop transfer of a single drug.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct StockTransfer {
    /// Unique identifier (UUID v4).
    pub id: String,

    pub from_shop_id: String,
    pub to_shop_id: String,
    pub drug_id: String,

    /// Quantity in base units. Reserved at the source on creation.
    pub quantity: i64,

    /// Earliest expiry among the source batches consumed at creation.
    pub earliest_expiry: Option<DateTime<Utc>>,

    pub status: TransferStatus,

    pub requested_by: String,
    pub approved_by: Option<String>,
    pub received_by: Option<String>,
    pub notes: Option<String>,

    pub created_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
    pub completed_at: Option<DateTime<Utc>>,
}

impl StockTransfer {
    /// Creates a pending transfer request. The caller is responsible for
    /// reserving the quantity at the source in the same unit of work.
    pub fn new(
        from_shop_id: impl Into<String>,
        to_shop_id: impl Into<String>,
        drug_id: impl Into<String>,
        quantity: i64,
        requested_by: impl Into<String>,
        now: DateTime<Utc>,
    ) -> CoreResult<Self> {
        let from_shop_id = from_shop_id.into();
        let to_shop_id = to_shop_id.into();
        validate_id("from_shop_id", &from_shop_id)?;
        validate_id("to_shop_id", &to_shop_id)?;
        validate_movement_quantity(quantity)?;
        if from_shop_id == to_shop_id {
            return Err(ValidationError::Conflicting {
                first: "from_shop_id".to_string(),
                second: "to_shop_id".to_string(),
            }
            .into());
        }

        Ok(StockTransfer {
            id: Uuid::new_v4().to_string(),
            from_shop_id,
            to_shop_id,
            drug_id: drug_id.into(),
            quantity,
            earliest_expiry: None,
            status: TransferStatus::Pending,
            requested_by: requested_by.into(),
            approved_by: None,
            received_by: None,
            notes: None,
            created_at: now,
            updated_at: now,
            completed_at: None,
        })
    }

    pub fn with_notes(mut self, notes: impl Into<String>) -> Self {
        self.notes = Some(notes.into());
        self
    }

    /// Batch number the destination books the stock under.
    pub fn synthetic_batch_number(&self) -> String {
        format!("XFER-{}", self.id)
    }

    /// Whether the transfer can still be cancelled.
    pub fn is_cancellable(&self) -> bool {
        matches!(
            self.status,
            TransferStatus::Pending | TransferStatus::Approved | TransferStatus::InTransit
        )
    }

    /// Whether the transfer has reached a terminal status.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self.status,
            TransferStatus::Completed | TransferStatus::Cancelled
        )
    }

    fn conflict(&self, operation: &'static str) -> CoreError {
        CoreError::TransferStateConflict {
            transfer_id: self.id.clone(),
            current_status: self.status,
            operation,
        }
    }

    // =========================================================================
    // Transitions
    // =========================================================================

    /// Pending → Approved.
    pub fn approve(&mut self, approved_by: impl Into<String>, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != TransferStatus::Pending {
            return Err(self.conflict("approve"));
        }
        self.status = TransferStatus::Approved;
        self.approved_by = Some(approved_by.into());
        self.updated_at = now;
        Ok(())
    }

    /// Approved → InTransit.
    pub fn mark_in_transit(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != TransferStatus::Approved {
            return Err(self.conflict("mark_in_transit"));
        }
        self.status = TransferStatus::InTransit;
        self.updated_at = now;
        Ok(())
    }

    /// InTransit → Completed. Called once the destination has booked the
    /// stock.
    pub fn complete(&mut self, received_by: impl Into<String>, now: DateTime<Utc>) -> CoreResult<()> {
        if self.status != TransferStatus::InTransit {
            return Err(self.conflict("complete"));
        }
        self.status = TransferStatus::Completed;
        self.received_by = Some(received_by.into());
        self.completed_at = Some(now);
        self.updated_at = now;
        Ok(())
    }

    /// Any non-terminal status → Cancelled. The source reservation must be
    /// restored by the caller in the same unit of work.
    pub fn cancel(&mut self, now: DateTime<Utc>) -> CoreResult<()> {
        if !self.is_cancellable() {
            return Err(self.conflict("cancel"));
        }
        self.status = TransferStatus::Cancelled;
        self.updated_at = now;
        Ok(())
    }
}

// =============================================================================
// Unit Tests
// =============================================================================
