//! Bookable units and the ledger guarding their capacity counters.

mod ledger;
mod unit;

pub use ledger::{InventoryLedger, UNIT_NAMESPACE};
pub use unit::InventoryUnit;

use common::UnitId;
use kv_store::StoreError;
use thiserror::Error;

/// Errors that can occur during inventory operations.
#[derive(Debug, Error)]
pub enum LedgerError {
    /// No seat left, or the unit does not exist.
    #[error("No capacity left on unit {0}")]
    OutOfCapacity(UnitId),

    /// Release would push `available` above `capacity`.
    #[error("Unit {0} is already at maximum capacity")]
    AtMaximumCapacity(UnitId),

    /// The unit has never been registered.
    #[error("Unit not found: {0}")]
    UnitNotFound(UnitId),

    /// A unit with this id is already registered.
    #[error("Unit already exists: {0}")]
    UnitAlreadyExists(UnitId),

    /// The requested counter values are out of range.
    #[error("Invalid capacity for unit {id}: available {available} exceeds capacity {capacity}")]
    InvalidCapacity {
        id: UnitId,
        available: u32,
        capacity: u32,
    },

    /// The unit id is empty.
    #[error("Unit id is required")]
    UnitIdRequired,

    /// The underlying store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),
}
