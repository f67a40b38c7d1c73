//! Saga coordinator for the reservation flow.

use std::any::Any;
use std::future::Future;
use std::panic::AssertUnwindSafe;
use std::time::{Duration, Instant};

use common::{RecordId, UnitId};
use domain::{InventoryLedger, Money, RecordStatus, RecordStore};
use futures_util::FutureExt;
use kv_store::KvStore;
use uuid::Uuid;

use crate::config::SagaConfig;
use crate::error::SagaError;
use crate::events::SagaEvent;
use crate::outcome::{CancellationOutcome, CompensationReport, FailureKind, SagaOutcome};
use crate::progress::SagaProgress;
use crate::request::ReservationRequest;
use crate::services::{LoyaltySink, NotificationReceipt, NotificationSink, PaymentGateway};
use crate::steps::{Compensation, SAGA_TYPE, SagaStep, SideEffect};

/// A step failure, tagged with the step that raised it.
struct StepFailure {
    step: SagaStep,
    error: SagaError,
}

fn failed_at<E: Into<SagaError>>(step: SagaStep) -> impl FnOnce(E) -> StepFailure {
    move |error| StepFailure {
        step,
        error: error.into(),
    }
}

/// Orchestrates reservation sagas.
///
/// The coordinator drives a 4-step saga (reserve → create record → collect
/// payment → confirm) followed by best-effort loyalty credit and notification.
/// A failure in steps 1-4 compensates the completed steps in reverse order.
/// The saga state lives in memory for the duration of one call.
pub struct ReservationSaga<S, P, L, N>
where
    S: KvStore,
    P: PaymentGateway,
    L: LoyaltySink,
    N: NotificationSink,
{
    ledger: InventoryLedger<S>,
    records: RecordStore<S>,
    payment: P,
    loyalty: L,
    notifier: N,
    config: SagaConfig,
}

impl<S, P, L, N> ReservationSaga<S, P, L, N>
where
    S: KvStore + Clone,
    P: PaymentGateway,
    L: LoyaltySink,
    N: NotificationSink,
{
    /// Creates a coordinator whose ledger and record store share `store`.
    pub fn new(store: S, payment: P, loyalty: L, notifier: N) -> Self {
        Self {
            ledger: InventoryLedger::new(store.clone()),
            records: RecordStore::new(store),
            payment,
            loyalty,
            notifier,
            config: SagaConfig::default(),
        }
    }

    pub fn with_config(mut self, config: SagaConfig) -> Self {
        self.config = config;
        self
    }

    pub fn ledger(&self) -> &InventoryLedger<S> {
        &self.ledger
    }

    pub fn records(&self) -> &RecordStore<S> {
        &self.records
    }

    pub fn payment(&self) -> &P {
        &self.payment
    }

    pub fn loyalty(&self) -> &L {
        &self.loyalty
    }

    pub fn notifier(&self) -> &N {
        &self.notifier
    }

    pub fn config(&self) -> &SagaConfig {
        &self.config
    }

    /// Runs one reservation saga to completion.
    ///
    /// Never returns an error: step failures, timeouts and panics are folded
    /// into the outcome together with the compensations that ran. Each call
    /// reserves fresh inventory and creates a new record.
    #[tracing::instrument(
        skip(self, request),
        fields(
            saga_type = SAGA_TYPE,
            subject_id = %request.subject_id(),
            owner_id = %request.owner_id(),
        )
    )]
    pub async fn execute(&self, request: ReservationRequest) -> SagaOutcome {
        metrics::counter!("saga_executions_total").increment(1);
        let saga_start = Instant::now();

        let saga_id = Uuid::new_v4();
        let mut progress = SagaProgress::default();
        progress.apply(SagaEvent::saga_started(
            saga_id,
            request.subject_id().clone(),
            request.owner_id().clone(),
        ));

        let run = AssertUnwindSafe(self.run_steps(&request, &mut progress))
            .catch_unwind()
            .await;
        let result = run.unwrap_or_else(|panic| {
            Err(StepFailure {
                step: progress
                    .current_step()
                    .unwrap_or(SagaStep::ReserveInventory),
                error: SagaError::Panicked(panic_message(panic)),
            })
        });

        let mut compensations = Vec::new();
        let mut notification = None;

        match result {
            Ok(()) => {
                progress.apply(SagaEvent::saga_completed());
                metrics::counter!("saga_completed").increment(1);
                tracing::info!(%saga_id, "saga completed successfully");

                notification = self.side_effects(&request, &mut progress).await;
            }
            Err(StepFailure { step, error }) => {
                let kind = FailureKind::classify(step, &error);
                progress.apply(SagaEvent::step_failed(step, kind, error.to_string()));

                match kind {
                    FailureKind::ConfirmationFailed => {
                        metrics::counter!("saga_confirmation_failures_total").increment(1);
                        tracing::error!(
                            %saga_id,
                            record_id = ?progress.record_id(),
                            error = %error,
                            "payment captured but record could not be confirmed"
                        );
                    }
                    FailureKind::Unexpected => {
                        tracing::error!(%saga_id, %step, error = %error, "saga step panicked");
                    }
                    _ => {
                        tracing::warn!(%saga_id, %step, error = %error, "saga step failed");
                    }
                }

                compensations = self.compensate(step, &request, &mut progress).await;
                progress.apply(SagaEvent::saga_failed());
                metrics::counter!("saga_failed", "step" => step.as_str()).increment(1);
            }
        }

        metrics::histogram!("saga_duration_seconds").record(saga_start.elapsed().as_secs_f64());

        let refund_attempted = compensations
            .iter()
            .any(|c| c.compensation == Compensation::RefundPayment);

        SagaOutcome {
            saga_id,
            state: progress.state(),
            subject_id: request.subject_id().clone(),
            record_id: progress.record_id(),
            reference: progress.reference().map(str::to_string),
            receipt: progress.receipt().cloned(),
            failure: progress.failure().cloned(),
            compensations,
            refund_attempted,
            notification,
            journal: progress.into_journal(),
        }
    }

    /// Steps 1-4. Stops at the first failure.
    async fn run_steps(
        &self,
        request: &ReservationRequest,
        progress: &mut SagaProgress,
    ) -> Result<(), StepFailure> {
        begin(progress, SagaStep::ReserveInventory);
        let remaining = self
            .ledger
            .reserve(request.subject_id())
            .await
            .map_err(failed_at(SagaStep::ReserveInventory))?;
        tracing::debug!(remaining, "inventory reserved");
        progress.apply(SagaEvent::step_completed(SagaStep::ReserveInventory));

        begin(progress, SagaStep::CreateRecord);
        let record_id = self
            .records
            .create(
                request.subject_id(),
                request.owner_id(),
                request.payment_token(),
            )
            .await
            .map_err(failed_at(SagaStep::CreateRecord))?;
        progress.apply(SagaEvent::record_created(record_id));

        begin(progress, SagaStep::CollectPayment);
        let receipt = within(
            self.config.payment_timeout,
            "payment collect",
            self.payment.collect(request.payment_token()),
        )
        .await
        .map_err(failed_at(SagaStep::CollectPayment))?;
        progress.apply(SagaEvent::payment_collected(receipt));

        begin(progress, SagaStep::ConfirmRecord);
        let reference = self
            .records
            .confirm(record_id)
            .await
            .map_err(failed_at(SagaStep::ConfirmRecord))?;
        progress.apply(SagaEvent::record_confirmed(reference));

        Ok(())
    }

    /// Undoes every completed step, most recent first.
    ///
    /// Each compensation runs regardless of how the previous one ended.
    #[tracing::instrument(skip(self, request, progress))]
    async fn compensate(
        &self,
        failed_step: SagaStep,
        request: &ReservationRequest,
        progress: &mut SagaProgress,
    ) -> Vec<CompensationReport> {
        progress.apply(SagaEvent::compensation_started(failed_step));

        let record_id = progress.record_id();
        let pending: Vec<Compensation> = progress
            .completed_steps()
            .iter()
            .rev()
            .filter_map(SagaStep::compensation)
            .collect();

        let mut reports = Vec::with_capacity(pending.len());
        for compensation in pending {
            let report = self
                .run_compensation(
                    compensation,
                    request.subject_id(),
                    record_id,
                    request.payment_token(),
                )
                .await;

            progress.apply(match &report.error {
                None => SagaEvent::compensation_completed(compensation),
                Some(error) => SagaEvent::compensation_failed(compensation, error.clone()),
            });
            reports.push(report);
        }
        reports
    }

    async fn run_compensation(
        &self,
        compensation: Compensation,
        subject_id: &UnitId,
        record_id: Option<RecordId>,
        payment_token: &str,
    ) -> CompensationReport {
        let action = async {
            match compensation {
                Compensation::RefundPayment => {
                    let refund = within(
                        self.config.payment_timeout,
                        "payment refund",
                        self.payment.refund(payment_token),
                    )
                    .await?;
                    tracing::info!(refund_id = %refund.refund_id, "payment refunded");
                }
                Compensation::CancelRecord => {
                    if let Some(id) = record_id {
                        self.records.cancel(id).await?;
                    }
                }
                Compensation::ReleaseInventory => {
                    self.ledger.release(subject_id).await?;
                }
            }
            Ok::<(), SagaError>(())
        };

        match catching(action).await {
            Ok(()) => {
                metrics::counter!(
                    "saga_compensations_total",
                    "compensation" => compensation.as_str(),
                    "outcome" => "succeeded"
                )
                .increment(1);
                CompensationReport::succeeded(compensation)
            }
            Err(error) => {
                metrics::counter!(
                    "saga_compensations_total",
                    "compensation" => compensation.as_str(),
                    "outcome" => "failed"
                )
                .increment(1);
                tracing::error!(%compensation, error = %error, "compensation failed");
                CompensationReport::failed(compensation, error.to_string())
            }
        }
    }

    /// Step 5: loyalty credit, then notification. Failures are recorded in the
    /// journal and otherwise ignored.
    async fn side_effects(
        &self,
        request: &ReservationRequest,
        progress: &mut SagaProgress,
    ) -> Option<NotificationReceipt> {
        let amount = progress
            .receipt()
            .map(|r| r.amount)
            .unwrap_or_else(Money::zero);
        let reference = progress.reference().map(str::to_string);
        let owner_id = request.owner_id();

        if let Err(error) = self
            .best_effort(
                "loyalty award",
                self.loyalty.award_credit(owner_id, amount),
            )
            .await
        {
            tracing::warn!(error = %error, "loyalty credit failed");
            progress.apply(SagaEvent::side_effect_failed(
                SideEffect::AwardLoyalty,
                error.to_string(),
            ));
        }

        match self
            .best_effort(
                "notification",
                self.notifier.notify(owner_id, amount, reference.as_deref()),
            )
            .await
        {
            Ok(receipt) => Some(receipt),
            Err(error) => {
                tracing::warn!(error = %error, "notification failed");
                progress.apply(SagaEvent::side_effect_failed(
                    SideEffect::Notify,
                    error.to_string(),
                ));
                None
            }
        }
    }

    async fn best_effort<T, E, F>(&self, operation: &'static str, call: F) -> Result<T, SagaError>
    where
        E: Into<SagaError>,
        F: Future<Output = Result<T, E>>,
    {
        catching(within(self.config.side_effect_timeout, operation, call)).await
    }

    /// Cancels a confirmed booking and undoes its effects.
    ///
    /// Cancels the record, releases its unit, refunds its payment and sends a
    /// best-effort notification. Release and refund failures are reported in
    /// the outcome. A record that is already cancelled is returned unchanged
    /// with nothing run. Unconfirmed records belong to an in-flight saga and
    /// are rejected; see [`Self::force_cancel`].
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, record_id: RecordId) -> Result<CancellationOutcome, SagaError> {
        self.cancel_booking(record_id, false).await
    }

    /// Cancels a booking in any status, including one left UNCONFIRMED by an
    /// interrupted saga, and gives its seat back.
    ///
    /// The refund is attempted and reported like any other compensation; for a
    /// record whose charge was never captured it is reported as failed.
    #[tracing::instrument(skip(self))]
    pub async fn force_cancel(
        &self,
        record_id: RecordId,
    ) -> Result<CancellationOutcome, SagaError> {
        self.cancel_booking(record_id, true).await
    }

    async fn cancel_booking(
        &self,
        record_id: RecordId,
        include_unconfirmed: bool,
    ) -> Result<CancellationOutcome, SagaError> {
        let record = self.records.get(record_id).await?;
        match record.status {
            RecordStatus::Unconfirmed if !include_unconfirmed => {
                return Err(SagaError::NotCancellable {
                    status: record.status,
                });
            }
            RecordStatus::Cancelled => return Ok(noop_cancellation(record)),
            RecordStatus::Unconfirmed | RecordStatus::Confirmed => {}
        }

        let cancelled = self.records.cancel(record_id).await?;
        if cancelled.was_noop() {
            // A concurrent cancel got there first and owns the compensations.
            return Ok(noop_cancellation(cancelled.record));
        }

        let record = cancelled.record;
        let mut compensations = Vec::with_capacity(2);
        for compensation in [Compensation::ReleaseInventory, Compensation::RefundPayment] {
            compensations.push(
                self.run_compensation(
                    compensation,
                    &record.subject_id,
                    Some(record.id),
                    &record.payment_token,
                )
                .await,
            );
        }

        let notification = match self
            .best_effort(
                "notification",
                self.notifier.notify(&record.owner_id, Money::zero(), None),
            )
            .await
        {
            Ok(receipt) => Some(receipt),
            Err(error) => {
                tracing::warn!(error = %error, "cancellation notification failed");
                None
            }
        };

        tracing::info!(%record_id, previous = %cancelled.previous, "booking cancelled");
        Ok(CancellationOutcome {
            record,
            previous: cancelled.previous,
            compensations,
            notification,
        })
    }
}

fn begin(progress: &mut SagaProgress, step: SagaStep) {
    tracing::info!(%step, "saga step started");
    progress.apply(SagaEvent::step_started(step));
}

fn noop_cancellation(record: domain::ReservationRecord) -> CancellationOutcome {
    CancellationOutcome {
        record,
        previous: RecordStatus::Cancelled,
        compensations: Vec::new(),
        notification: None,
    }
}

/// Bounds `call` by `limit`; expiry becomes [`SagaError::Timeout`].
async fn within<T, E, F>(limit: Duration, operation: &'static str, call: F) -> Result<T, SagaError>
where
    E: Into<SagaError>,
    F: Future<Output = Result<T, E>>,
{
    match tokio::time::timeout(limit, call).await {
        Ok(result) => result.map_err(Into::into),
        Err(_) => Err(SagaError::Timeout {
            operation,
            after: limit,
        }),
    }
}

/// Turns a panic inside `call` into [`SagaError::Panicked`].
async fn catching<T, F>(call: F) -> Result<T, SagaError>
where
    F: Future<Output = Result<T, SagaError>>,
{
    AssertUnwindSafe(call)
        .catch_unwind()
        .await
        .unwrap_or_else(|panic| Err(SagaError::Panicked(panic_message(panic))))
}

fn panic_message(panic: Box<dyn Any + Send>) -> String {
    if let Some(message) = panic.downcast_ref::<&str>() {
        (*message).to_string()
    } else if let Some(message) = panic.downcast_ref::<String>() {
        message.clone()
    } else {
        "unknown panic".to_string()
    }
}
