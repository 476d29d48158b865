//! # Shared Domain Types
//!
//! Closed enum sets used across the engine.
//!
//! ## Type Map
//! ```text
//! ┌─────────────────────────────────────────────────────────────────────────┐
//! │                         Shared Types                                    │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐   ┌─────────────────┐       │
//! │  │    UnitType     │   │   BatchStatus   │   │ StockLocation   │       │
//! │  │  ─────────────  │   │  ─────────────  │   │  ─────────────  │       │
//! │  │  Count          │   │  Active         │   │  Storage        │       │
//! │  │  Volume         │   │  Expired        │   │  ShopFloor      │       │
//! │  │  Weight         │   │  Recalled       │   │  Reserved       │       │
//! │  │  Dose           │   │  Reserved       │   │  Quarantine     │       │
//! │  └─────────────────┘   └─────────────────┘   └─────────────────┘       │
//! │                                                                         │
//! │  ┌─────────────────┐   ┌─────────────────┐                             │
//! │  │ AdjustmentType  │   │ TransferStatus  │                             │
//! │  │  ─────────────  │   │  ─────────────  │                             │
//! │  │  Sale, Return,  │   │  Pending        │                             │
//! │  │  Damage, Theft, │   │  Approved       │                             │
//! │  │  Receipt, ...   │   │  InTransit ...  │                             │
//! │  └─────────────────┘   └─────────────────┘                             │
//! └─────────────────────────────────────────────────────────────────────────┘
//! ```
//!
//! ## Dual-Key Identity Pattern
//! Every entity has:
//! - `id`: UUID v4 - immutable, used for relations
//! - Business ID: (batch_number, unit_name, etc.) - human-readable

use serde::{Deserialize, Serialize};
use std::fmt;

// =============================================================================
// Unit Type
// =============================================================================

/// The physical dimension a drug's base unit measures.
///
/// ## Why It Matters
/// Count-based drugs (tablets) deplete in whole units; Volume/Weight drugs
/// (syrups, ointments) may be subdivisible below one retail container.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum UnitType {
    /// Discrete pieces (tablets, capsules, sachets).
    Count,
    /// Liquid volume (ml for syrups, drops, injections).
    Volume,
    /// Mass (grams for powders, ointments).
    Weight,
    /// Metered doses (inhaler puffs, insulin units).
    Dose,
}

impl Default for UnitType {
    fn default() -> Self {
        UnitType::Count
    }
}

// =============================================================================
// Batch Status
// =============================================================================

/// Lifecycle status of a stock batch.
///
/// `Expired` is time-derived (expiry_date vs. now), not a stored transition;
/// `Batch::is_expired` is the source of truth and a sweep may persist it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum BatchStatus {
    /// Sellable stock.
    Active,
    /// Past expiry date (derived; persisted only by an explicit sweep).
    Expired,
    /// Pulled by supplier or regulator recall.
    Recalled,
    /// Held against a pending order.
    Reserved,
}

impl Default for BatchStatus {
    fn default() -> Self {
        BatchStatus::Active
    }
}

// =============================================================================
// Stock Location
// =============================================================================

/// Physical sub-area of a shop holding a batch's quantity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum StockLocation {
    /// Back-room storage (default for receipts).
    Storage,
    /// Customer-facing shelves.
    ShopFloor,
    /// Set aside for a reservation.
    Reserved,
    /// Isolated pending disposal or recall handling.
    Quarantine,
}

impl Default for StockLocation {
    fn default() -> Self {
        StockLocation::Storage
    }
}

impl fmt::Display for StockLocation {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let s = match self {
            StockLocation::Storage => "storage",
            StockLocation::ShopFloor => "shop_floor",
            StockLocation::Reserved => "reserved",
            StockLocation::Quarantine => "quarantine",
        };
        f.write_str(s)
    }
}

// =============================================================================
// Adjustment Type
// =============================================================================

/// The cause of a stock adjustment. Closed set, validated at the boundary
/// by deserialization - free-form causes go in `StockAdjustment::notes`.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum AdjustmentType {
    /// Stock issued against a sale.
    Sale,
    /// Customer return back into stock.
    Return,
    /// Breakage, spillage, spoiled packaging.
    Damage,
    /// Expired stock written off.
    Expired,
    /// Shrinkage / theft write-off.
    Theft,
    /// Manual correction after a physical count.
    Correction,
    /// Outbound side of a shop-to-shop transfer.
    TransferOut,
    /// Inbound side of a shop-to-shop transfer.
    TransferIn,
    /// Batch received from a supplier.
    Receipt,
    /// Movement between physical locations (net zero on total stock).
    LocationMove,
    /// Stock pulled under a recall.
    Recall,
}

impl AdjustmentType {
    /// Whether this adjustment type normally increases stock on hand.
    ///
    /// `Correction` and `LocationMove` are direction-neutral: the sign of
    /// `quantity_changed` carries the direction.
    pub fn is_inbound(&self) -> bool {
        matches!(
            self,
            AdjustmentType::Return | AdjustmentType::TransferIn | AdjustmentType::Receipt
        )
    }
}

// =============================================================================
// Transfer Status
// =============================================================================

/// Lifecycle of a shop-to-shop stock transfer.
///
/// ```text
/// Pending ──► Approved ──► InTransit ──► Completed
///    │            │            │
///    └────────────┴────────────┴──────► Cancelled
/// ```
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TransferStatus {
    /// Requested; source stock already decremented (pessimistic reservation).
    Pending,
    /// Approved by the receiving/managing party.
    Approved,
    /// Dispatched; goods on their way.
    InTransit,
    /// Received at destination; destination stock incremented.
    Completed,
    /// Aborted before completion; source stock restored.
    Cancelled,
}

impl Default for TransferStatus {
    fn default() -> Self {
        TransferStatus::Pending
    }
}

// =============================================================================
// Unit Tests
// =============================================================================

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_location_display_matches_serde() {
        let json = serde_json::to_string(&StockLocation::ShopFloor).unwrap();
        assert_eq!(json, "\"shop_floor\"");
        assert_eq!(StockLocation::ShopFloor.to_string(), "shop_floor");
    }

    #[test]
    fn test_adjustment_type_direction() {
        assert!(AdjustmentType::Receipt.is_inbound());
        assert!(AdjustmentType::TransferIn.is_inbound());
        assert!(!AdjustmentType::Sale.is_inbound());
        assert!(!AdjustmentType::LocationMove.is_inbound());
    }

    #[test]
    fn test_defaults() {
        assert_eq!(BatchStatus::default(), BatchStatus::Active);
        assert_eq!(StockLocation::default(), StockLocation::Storage);
        assert_eq!(TransferStatus::default(), TransferStatus::Pending);
    }

    #[test]
    fn test_adjustment_type_round_trips_snake_case() {
        let json = serde_json::to_string(&AdjustmentType::TransferOut).unwrap();
        assert_eq!(json, "\"transfer_out\"");
        let back: AdjustmentType = serde_json::from_str(&json).unwrap();
        assert_eq!(back, AdjustmentType::TransferOut);
    }
}
