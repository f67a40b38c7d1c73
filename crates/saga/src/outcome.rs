//! Structured saga results.

use common::{RecordId, UnitId};
use domain::{LedgerError, RecordError, RecordStatus, ReservationRecord};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::services::{NotificationReceipt, PaymentError, PaymentReceipt};
use crate::state::SagaState;
use crate::steps::{Compensation, SagaStep};

/// Classification of a step failure.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum FailureKind {
    OutOfCapacity,
    RecordRejected,
    PaymentDeclined,
    GatewayUnavailable,
    StorageUnavailable,
    /// Payment was captured but the record could not be confirmed.
    ConfirmationFailed,
    /// A step panicked.
    Unexpected,
}

impl FailureKind {
    /// Classifies an error raised by `step`.
    pub fn classify(step: SagaStep, error: &SagaError) -> Self {
        if let SagaError::Panicked(_) = error {
            return FailureKind::Unexpected;
        }
        if step == SagaStep::ConfirmRecord {
            return FailureKind::ConfirmationFailed;
        }
        match error {
            SagaError::Ledger(LedgerError::OutOfCapacity(_)) => FailureKind::OutOfCapacity,
            SagaError::Record(RecordError::InvalidReference(_) | RecordError::AlreadyExists(_)) => {
                FailureKind::RecordRejected
            }
            SagaError::Payment(PaymentError::Declined(_)) => FailureKind::PaymentDeclined,
            SagaError::Payment(_) | SagaError::Timeout { .. } => FailureKind::GatewayUnavailable,
            _ => FailureKind::StorageUnavailable,
        }
    }
}

/// Which step failed, and how.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SagaFailure {
    pub step: SagaStep,
    pub kind: FailureKind,
    pub message: String,
}

/// Result of one compensating action.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompensationReport {
    pub compensation: Compensation,
    pub succeeded: bool,
    pub error: Option<String>,
}

impl CompensationReport {
    pub fn succeeded(compensation: Compensation) -> Self {
        Self {
            compensation,
            succeeded: true,
            error: None,
        }
    }

    pub fn failed(compensation: Compensation, error: impl Into<String>) -> Self {
        Self {
            compensation,
            succeeded: false,
            error: Some(error.into()),
        }
    }
}

/// How a caller should present an outcome.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ResponseClass {
    Success,
    /// Failure before the customer was charged, or a charge that was declined.
    ClientError,
    /// Failure after the charge, or an unexpected failure.
    ServerError,
}

/// The result of one [`ReservationSaga::execute`](crate::ReservationSaga::execute).
#[derive(Debug, Clone, Serialize)]
pub struct SagaOutcome {
    pub saga_id: Uuid,
    pub state: SagaState,
    pub subject_id: UnitId,
    /// Set once step 2 succeeded, kept on failure for support traceability.
    pub record_id: Option<RecordId>,
    pub reference: Option<String>,
    pub receipt: Option<PaymentReceipt>,
    pub failure: Option<SagaFailure>,
    /// Compensations attempted, in execution order.
    pub compensations: Vec<CompensationReport>,
    pub refund_attempted: bool,
    pub notification: Option<NotificationReceipt>,
    pub journal: Vec<SagaEvent>,
}

impl SagaOutcome {
    pub fn is_success(&self) -> bool {
        self.state == SagaState::Completed
    }

    pub fn response_class(&self) -> ResponseClass {
        match &self.failure {
            None => ResponseClass::Success,
            Some(f) if matches!(f.kind, FailureKind::ConfirmationFailed | FailureKind::Unexpected) => {
                ResponseClass::ServerError
            }
            Some(_) => ResponseClass::ClientError,
        }
    }

    /// Compensations attempted, in execution order.
    pub fn compensations_attempted(&self) -> Vec<Compensation> {
        self.compensations.iter().map(|c| c.compensation).collect()
    }

    /// Whether the refund succeeded, if one was attempted.
    pub fn refund_succeeded(&self) -> Option<bool> {
        self.compensations
            .iter()
            .find(|c| c.compensation == Compensation::RefundPayment)
            .map(|c| c.succeeded)
    }
}

/// The result of [`ReservationSaga::cancel`](crate::ReservationSaga::cancel).
#[derive(Debug, Clone, Serialize)]
pub struct CancellationOutcome {
    pub record: ReservationRecord,
    pub previous: RecordStatus,
    pub compensations: Vec<CompensationReport>,
    pub notification: Option<NotificationReceipt>,
}

impl CancellationOutcome {
    /// True if the record was already cancelled and nothing ran.
    pub fn was_noop(&self) -> bool {
        self.previous == RecordStatus::Cancelled
    }

    pub fn refund_attempted(&self) -> bool {
        self.compensations
            .iter()
            .any(|c| c.compensation == Compensation::RefundPayment)
    }
}
