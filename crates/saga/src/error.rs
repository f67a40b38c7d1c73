//! Saga error types.

use std::time::Duration;

use domain::{LedgerError, RecordError, RecordStatus};
use thiserror::Error;

use crate::request::RequestError;
use crate::services::{PaymentError, SinkError};

/// Errors raised by saga steps and the cancellation path.
///
/// Step failures inside [`ReservationSaga::execute`](crate::ReservationSaga::execute)
/// are folded into the returned outcome and never escape as `Err`.
#[derive(Debug, Error)]
pub enum SagaError {
    /// The request failed validation.
    #[error("Invalid request: {0}")]
    InvalidRequest(#[from] RequestError),

    /// Inventory ledger error.
    #[error("Inventory error: {0}")]
    Ledger(#[from] LedgerError),

    /// Record store error.
    #[error("Record error: {0}")]
    Record(#[from] RecordError),

    /// Payment gateway error.
    #[error("Payment error: {0}")]
    Payment(#[from] PaymentError),

    /// Best-effort sink error.
    #[error("Sink error: {0}")]
    Sink(#[from] SinkError),

    /// An external call did not finish in time.
    #[error("{operation} timed out after {after:?}")]
    Timeout {
        operation: &'static str,
        after: Duration,
    },

    /// A step panicked.
    #[error("Unexpected failure: {0}")]
    Panicked(String),

    /// The record cannot be cancelled through the saga in its current state.
    #[error("Record is {status}; only confirmed records can be cancelled")]
    NotCancellable { status: RecordStatus },
}

/// Convenience type alias for saga results.
pub type Result<T> = std::result::Result<T, SagaError>;
