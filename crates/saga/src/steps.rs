//! Reservation saga step definitions.

use serde::{Deserialize, Serialize};

/// Saga type identifier.
pub const SAGA_TYPE: &str = "Reservation";

/// The forward steps of the reservation saga, in execution order.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SagaStep {
    ReserveInventory,
    CreateRecord,
    CollectPayment,
    ConfirmRecord,
}

impl SagaStep {
    /// All steps, in execution order.
    pub const ALL: [SagaStep; 4] = [
        SagaStep::ReserveInventory,
        SagaStep::CreateRecord,
        SagaStep::CollectPayment,
        SagaStep::ConfirmRecord,
    ];

    /// The action that undoes this step, if it needs undoing.
    ///
    /// Confirmation is the last step; if it succeeds there is nothing left to
    /// fail, so it has no compensation.
    pub fn compensation(&self) -> Option<Compensation> {
        match self {
            SagaStep::ReserveInventory => Some(Compensation::ReleaseInventory),
            SagaStep::CreateRecord => Some(Compensation::CancelRecord),
            SagaStep::CollectPayment => Some(Compensation::RefundPayment),
            SagaStep::ConfirmRecord => None,
        }
    }

    /// Returns the step name as a string.
    pub fn as_str(&self) -> &'static str {
        match self {
            SagaStep::ReserveInventory => "reserve_inventory",
            SagaStep::CreateRecord => "create_record",
            SagaStep::CollectPayment => "collect_payment",
            SagaStep::ConfirmRecord => "confirm_record",
        }
    }
}

impl std::fmt::Display for SagaStep {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Compensating actions, each undoing one forward step.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum Compensation {
    RefundPayment,
    CancelRecord,
    ReleaseInventory,
}

impl Compensation {
    pub fn as_str(&self) -> &'static str {
        match self {
            Compensation::RefundPayment => "refund_payment",
            Compensation::CancelRecord => "cancel_record",
            Compensation::ReleaseInventory => "release_inventory",
        }
    }
}

impl std::fmt::Display for Compensation {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}

/// Best-effort actions run after confirmation.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum SideEffect {
    AwardLoyalty,
    Notify,
}

impl SideEffect {
    pub fn as_str(&self) -> &'static str {
        match self {
            SideEffect::AwardLoyalty => "award_loyalty",
            SideEffect::Notify => "notify",
        }
    }
}

impl std::fmt::Display for SideEffect {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        write!(f, "{}", self.as_str())
    }
}
