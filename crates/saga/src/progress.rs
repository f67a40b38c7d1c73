//! In-flight saga state, rebuilt from its own journal.

use common::RecordId;
use uuid::Uuid;

use crate::events::SagaEvent;
use crate::outcome::SagaFailure;
use crate::services::PaymentReceipt;
use crate::state::SagaState;
use crate::steps::SagaStep;

/// Tracks one execution: which steps completed and the context they
/// produced (record id, receipt, reference).
///
/// Every change goes through [`SagaProgress::apply`], which also appends the
/// event to the journal, so the journal and the tracked state never diverge.
#[derive(Debug, Clone, Default)]
pub struct SagaProgress {
    saga_id: Option<Uuid>,
    state: SagaState,
    current_step: Option<SagaStep>,
    completed_steps: Vec<SagaStep>,
    record_id: Option<RecordId>,
    receipt: Option<PaymentReceipt>,
    reference: Option<String>,
    failure: Option<SagaFailure>,
    journal: Vec<SagaEvent>,
}

impl SagaProgress {
    pub fn apply(&mut self, event: SagaEvent) {
        match &event {
            SagaEvent::SagaStarted(data) => {
                self.saga_id = Some(data.saga_id);
                self.state = SagaState::Running;
            }
            SagaEvent::StepStarted(data) => {
                self.current_step = Some(data.step);
            }
            SagaEvent::StepCompleted(data) => {
                self.completed_steps.push(data.step);
                if let Some(id) = data.record_id {
                    self.record_id = Some(id);
                }
                if let Some(receipt) = &data.receipt {
                    self.receipt = Some(receipt.clone());
                }
                if let Some(reference) = &data.reference {
                    self.reference = Some(reference.clone());
                }
            }
            SagaEvent::StepFailed(data) => {
                self.failure = Some(SagaFailure {
                    step: data.step,
                    kind: data.kind,
                    message: data.error.clone(),
                });
            }
            SagaEvent::CompensationStarted(_) => self.transition(SagaState::Compensating),
            SagaEvent::CompensationCompleted(_)
            | SagaEvent::CompensationFailed(_)
            | SagaEvent::SideEffectFailed(_) => {}
            SagaEvent::SagaCompleted(_) => self.transition(SagaState::Completed),
            SagaEvent::SagaFailed(_) => self.transition(SagaState::Failed),
        }
        self.journal.push(event);
    }

    fn transition(&mut self, next: SagaState) {
        debug_assert!(
            self.state.can_transition_to(next),
            "illegal saga transition {} -> {next}",
            self.state
        );
        self.state = next;
    }

    pub fn saga_id(&self) -> Option<Uuid> {
        self.saga_id
    }

    pub fn state(&self) -> SagaState {
        self.state
    }

    /// The step most recently started, whether or not it finished.
    pub fn current_step(&self) -> Option<SagaStep> {
        self.current_step
    }

    pub fn completed_steps(&self) -> &[SagaStep] {
        &self.completed_steps
    }

    pub fn has_completed(&self, step: SagaStep) -> bool {
        self.completed_steps.contains(&step)
    }

    pub fn record_id(&self) -> Option<RecordId> {
        self.record_id
    }

    pub fn receipt(&self) -> Option<&PaymentReceipt> {
        self.receipt.as_ref()
    }

    pub fn reference(&self) -> Option<&str> {
        self.reference.as_deref()
    }

    pub fn failure(&self) -> Option<&SagaFailure> {
        self.failure.as_ref()
    }

    pub fn journal(&self) -> &[SagaEvent] {
        &self.journal
    }

    pub(crate) fn into_journal(self) -> Vec<SagaEvent> {
        self.journal
    }
}
