//! External collaborator traits and in-memory implementations.

pub mod loyalty;
pub mod notification;
pub mod payment;

use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use thiserror::Error;

pub use loyalty::{InMemoryLoyaltyLedger, LoyaltySink, LoyaltySummary, LoyaltyTier};
pub use notification::{
    InMemoryNotifier, NotificationReceipt, NotificationSink, NotificationStatus,
};
pub use payment::{
    DEFAULT_PRICE, InMemoryPaymentGateway, PaymentError, PaymentGateway, PaymentReceipt,
    PaymentRecord, PaymentStatus, RefundConfirmation,
};

/// Errors reported by best-effort sinks.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum SinkError {
    /// The sink could not be reached.
    #[error("Sink unavailable: {0}")]
    Unavailable(String),

    /// The sink refused the request.
    #[error("Sink rejected request: {0}")]
    Rejected(String),
}

// The in-memory doubles can be told to panic; the guards below keep a
// poisoned lock usable for the assertions that follow.

pub(crate) fn read<T>(lock: &RwLock<T>) -> RwLockReadGuard<'_, T> {
    lock.read().unwrap_or_else(PoisonError::into_inner)
}

pub(crate) fn write<T>(lock: &RwLock<T>) -> RwLockWriteGuard<'_, T> {
    lock.write().unwrap_or_else(PoisonError::into_inner)
}
