//! Saga journal events.
//!
//! Events are kept in memory for the lifetime of one execution and returned in
//! the outcome for support traceability. They are not persisted.

use chrono::{DateTime, Utc};
use common::{OwnerId, RecordId, UnitId};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

use crate::outcome::FailureKind;
use crate::services::PaymentReceipt;
use crate::steps::{Compensation, SagaStep, SideEffect};

/// Events that can occur during saga execution.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", content = "data")]
pub enum SagaEvent {
    /// Saga execution started.
    SagaStarted(SagaStartedData),

    /// A forward step started.
    StepStarted(StepData),

    /// A forward step completed successfully.
    StepCompleted(StepCompletedData),

    /// A forward step failed.
    StepFailed(StepFailedData),

    /// Compensation started after a step failure.
    CompensationStarted(StepData),

    /// A compensating action succeeded.
    CompensationCompleted(CompensationData),

    /// A compensating action failed (logged, compensation continues).
    CompensationFailed(CompensationData),

    /// A best-effort side effect failed (logged, outcome unchanged).
    SideEffectFailed(SideEffectFailedData),

    /// Steps 1-4 all succeeded.
    SagaCompleted(TimestampData),

    /// Saga failed after compensation.
    SagaFailed(TimestampData),
}

impl SagaEvent {
    /// Returns the event type name.
    pub fn event_type(&self) -> &'static str {
        match self {
            SagaEvent::SagaStarted(_) => "SagaStarted",
            SagaEvent::StepStarted(_) => "StepStarted",
            SagaEvent::StepCompleted(_) => "StepCompleted",
            SagaEvent::StepFailed(_) => "StepFailed",
            SagaEvent::CompensationStarted(_) => "CompensationStarted",
            SagaEvent::CompensationCompleted(_) => "CompensationCompleted",
            SagaEvent::CompensationFailed(_) => "CompensationFailed",
            SagaEvent::SideEffectFailed(_) => "SideEffectFailed",
            SagaEvent::SagaCompleted(_) => "SagaCompleted",
            SagaEvent::SagaFailed(_) => "SagaFailed",
        }
    }
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SagaStartedData {
    pub saga_id: Uuid,
    pub saga_type: String,
    pub subject_id: UnitId,
    pub owner_id: OwnerId,
    pub started_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepData {
    pub step: SagaStep,
}

/// Completion of a step, with whatever context it produced.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepCompletedData {
    pub step: SagaStep,
    /// Set after create_record.
    pub record_id: Option<RecordId>,
    /// Set after collect_payment.
    pub receipt: Option<PaymentReceipt>,
    /// Set after confirm_record.
    pub reference: Option<String>,
    pub completed_at: DateTime<Utc>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct StepFailedData {
    pub step: SagaStep,
    pub kind: FailureKind,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompensationData {
    pub compensation: Compensation,
    /// Set when the action failed.
    pub error: Option<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct SideEffectFailedData {
    pub effect: SideEffect,
    pub error: String,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct TimestampData {
    pub at: DateTime<Utc>,
}

// Convenience constructors
impl SagaEvent {
    pub fn saga_started(saga_id: Uuid, subject_id: UnitId, owner_id: OwnerId) -> Self {
        SagaEvent::SagaStarted(SagaStartedData {
            saga_id,
            saga_type: crate::steps::SAGA_TYPE.to_string(),
            subject_id,
            owner_id,
            started_at: Utc::now(),
        })
    }

    pub fn step_started(step: SagaStep) -> Self {
        SagaEvent::StepStarted(StepData { step })
    }

    /// Completion of a step that produced no context.
    pub fn step_completed(step: SagaStep) -> Self {
        SagaEvent::StepCompleted(Self::completed_data(step))
    }

    pub fn record_created(record_id: RecordId) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            record_id: Some(record_id),
            ..Self::completed_data(SagaStep::CreateRecord)
        })
    }

    pub fn payment_collected(receipt: PaymentReceipt) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            receipt: Some(receipt),
            ..Self::completed_data(SagaStep::CollectPayment)
        })
    }

    pub fn record_confirmed(reference: String) -> Self {
        SagaEvent::StepCompleted(StepCompletedData {
            reference: Some(reference),
            ..Self::completed_data(SagaStep::ConfirmRecord)
        })
    }

    fn completed_data(step: SagaStep) -> StepCompletedData {
        StepCompletedData {
            step,
            record_id: None,
            receipt: None,
            reference: None,
            completed_at: Utc::now(),
        }
    }

    pub fn step_failed(step: SagaStep, kind: FailureKind, error: impl Into<String>) -> Self {
        SagaEvent::StepFailed(StepFailedData {
            step,
            kind,
            error: error.into(),
        })
    }

    pub fn compensation_started(from_step: SagaStep) -> Self {
        SagaEvent::CompensationStarted(StepData { step: from_step })
    }

    pub fn compensation_completed(compensation: Compensation) -> Self {
        SagaEvent::CompensationCompleted(CompensationData {
            compensation,
            error: None,
        })
    }

    pub fn compensation_failed(compensation: Compensation, error: impl Into<String>) -> Self {
        SagaEvent::CompensationFailed(CompensationData {
            compensation,
            error: Some(error.into()),
        })
    }

    pub fn side_effect_failed(effect: SideEffect, error: impl Into<String>) -> Self {
        SagaEvent::SideEffectFailed(SideEffectFailedData {
            effect,
            error: error.into(),
        })
    }

    pub fn saga_completed() -> Self {
        SagaEvent::SagaCompleted(TimestampData { at: Utc::now() })
    }

    pub fn saga_failed() -> Self {
        SagaEvent::SagaFailed(TimestampData { at: Utc::now() })
    }
}
