//! Reservation saga with compensating rollback.
//!
//! The reservation saga follows these steps:
//! 1. Reserve inventory
//! 2. Create the reservation record
//! 3. Collect payment
//! 4. Confirm the record
//! 5. Best-effort loyalty credit and notification
//!
//! If any of steps 1-4 fails, previously completed steps are compensated in
//! reverse order. Failures in step 5 are logged and never unwind the saga.

pub mod config;
pub mod coordinator;
pub mod error;
pub mod events;
pub mod outcome;
pub mod progress;
pub mod request;
pub mod services;
pub mod state;
pub mod steps;

pub use config::SagaConfig;
pub use coordinator::ReservationSaga;
pub use error::SagaError;
pub use events::SagaEvent;
pub use outcome::{
    CancellationOutcome, CompensationReport, FailureKind, ResponseClass, SagaFailure, SagaOutcome,
};
pub use progress::SagaProgress;
pub use request::{MAX_FIELD_LEN, RequestError, ReservationRequest};
pub use services::{
    DEFAULT_PRICE, InMemoryLoyaltyLedger, InMemoryNotifier, InMemoryPaymentGateway, LoyaltySink,
    LoyaltySummary, LoyaltyTier, NotificationReceipt, NotificationSink, NotificationStatus,
    PaymentError, PaymentGateway, PaymentReceipt, PaymentRecord, PaymentStatus,
    RefundConfirmation, SinkError,
};
pub use state::SagaState;
pub use steps::{Compensation, SAGA_TYPE, SagaStep, SideEffect};
