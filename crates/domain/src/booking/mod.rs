//! Reservation records and their state machine.

mod record;
mod status;
mod store;

pub use record::ReservationRecord;
pub use status::{ParseStatusError, RecordStatus};
pub use store::{CancelOutcome, RECORD_NAMESPACE, RecordStore};

use common::RecordId;
use kv_store::StoreError;
use thiserror::Error;

/// Errors that can occur during record operations.
#[derive(Debug, Error)]
pub enum RecordError {
    /// No record with this id.
    #[error("Record not found: {0}")]
    RecordNotFound(RecordId),

    /// The record is not in a state that allows the transition.
    #[error("Invalid transition for record {id}: cannot move from {from} to {to}")]
    InvalidTransition {
        id: RecordId,
        from: RecordStatus,
        to: RecordStatus,
    },

    /// A reference field is empty.
    #[error("Invalid reference: {0} is required")]
    InvalidReference(&'static str),

    /// A record with a freshly generated id already exists.
    #[error("Record already exists: {0}")]
    AlreadyExists(RecordId),

    /// The underlying store failed.
    #[error("Store error: {0}")]
    Store(#[from] StoreError),

    /// Serialization error.
    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}
