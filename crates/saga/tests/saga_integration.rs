//! Integration tests for the reservation saga.

use std::sync::Arc;
use std::sync::atomic::{AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use common::{OwnerId, UnitId};
use domain::{InventoryUnit, RecordStatus, ReservationRecord};
use futures_util::future::join_all;
use kv_store::{
    ConditionalOutcome, InMemoryKvStore, Item, KvStore, Mutation, Precondition, StoreOp,
};
use saga::{
    Compensation, FailureKind, InMemoryLoyaltyLedger, InMemoryNotifier, InMemoryPaymentGateway,
    NotificationStatus, PaymentStatus, ReservationRequest, ReservationSaga, ResponseClass,
    SagaConfig, SagaError, SagaEvent, SagaOutcome, SagaState, SagaStep, SideEffect,
};
use serde_json::Value;

const UNIT: &str = "FL-0001";
const OWNER: &str = "customer-1";

type TestSaga =
    ReservationSaga<InMemoryKvStore, InMemoryPaymentGateway, InMemoryLoyaltyLedger, InMemoryNotifier>;

struct TestHarness {
    saga: TestSaga,
    store: InMemoryKvStore,
    payment: InMemoryPaymentGateway,
    loyalty: InMemoryLoyaltyLedger,
    notifier: InMemoryNotifier,
}

impl TestHarness {
    async fn new(capacity: u32) -> Self {
        Self::with_config(capacity, SagaConfig::default()).await
    }

    async fn with_config(capacity: u32, config: SagaConfig) -> Self {
        let store = InMemoryKvStore::new();
        let payment = InMemoryPaymentGateway::new();
        let loyalty = InMemoryLoyaltyLedger::new();
        let notifier = InMemoryNotifier::new();

        let saga = ReservationSaga::new(
            store.clone(),
            payment.clone(),
            loyalty.clone(),
            notifier.clone(),
        )
        .with_config(config);

        saga.ledger()
            .register(InventoryUnit::new(UnitId::new(UNIT), capacity).unwrap())
            .await
            .unwrap();

        Self {
            saga,
            store,
            payment,
            loyalty,
            notifier,
        }
    }

    async fn available(&self) -> u32 {
        self.saga
            .ledger()
            .get(&UnitId::new(UNIT))
            .await
            .unwrap()
            .available
    }

    async fn record(&self, outcome: &SagaOutcome) -> ReservationRecord {
        let id = outcome.record_id.expect("record id");
        self.saga.records().get(id).await.unwrap()
    }

    async fn book(&self, token: &str) -> SagaOutcome {
        self.saga
            .execute(ReservationRequest::new(UNIT, OWNER, token).unwrap())
            .await
    }
}

fn failed_step(outcome: &SagaOutcome) -> Option<SagaStep> {
    outcome.failure.as_ref().map(|f| f.step)
}

fn failure_kind(outcome: &SagaOutcome) -> Option<FailureKind> {
    outcome.failure.as_ref().map(|f| f.kind)
}

fn side_effect_failures(outcome: &SagaOutcome) -> Vec<SideEffect> {
    outcome
        .journal
        .iter()
        .filter_map(|event| match event {
            SagaEvent::SideEffectFailed(data) => Some(data.effect),
            _ => None,
        })
        .collect()
}

#[tokio::test]
async fn test_happy_path() {
    let h = TestHarness::new(1).await;

    let outcome = h.book("tok_a").await;

    assert!(outcome.is_success());
    assert_eq!(outcome.response_class(), ResponseClass::Success);
    assert_eq!(h.available().await, 0);

    let record = h.record(&outcome).await;
    assert_eq!(record.status, RecordStatus::Confirmed);
    assert!(record.reference.is_some());
    assert_eq!(outcome.reference, record.reference);

    let receipt = outcome.receipt.as_ref().unwrap();
    assert_eq!(receipt.amount, h.payment.price());
    assert_eq!(h.payment.collect_calls(), 1);
    assert_eq!(h.payment.refund_calls(), 0);
    assert!(!outcome.refund_attempted);

    // Step 5 side effects
    assert_eq!(h.loyalty.summary(&OwnerId::new(OWNER)).points, 150);
    let notification = outcome.notification.as_ref().unwrap();
    assert_eq!(notification.status, NotificationStatus::Confirmed);
    assert!(notification.subject.contains(record.reference.as_deref().unwrap()));
    assert_eq!(h.notifier.sent_count(), 1);
}

#[tokio::test]
async fn test_happy_path_journal_order() {
    let h = TestHarness::new(1).await;

    let outcome = h.book("tok_a").await;

    let completed: Vec<SagaStep> = outcome
        .journal
        .iter()
        .filter_map(|event| match event {
            SagaEvent::StepCompleted(data) => Some(data.step),
            _ => None,
        })
        .collect();
    assert_eq!(completed, SagaStep::ALL.to_vec());
    assert_eq!(outcome.journal.first().unwrap().event_type(), "SagaStarted");
    assert_eq!(outcome.journal.last().unwrap().event_type(), "SagaCompleted");
}

#[tokio::test]
async fn test_inventory_exhausted() {
    let h = TestHarness::new(0).await;

    let outcome = h.book("tok_b").await;

    assert_eq!(outcome.state, SagaState::Failed);
    assert_eq!(failed_step(&outcome), Some(SagaStep::ReserveInventory));
    assert_eq!(failure_kind(&outcome), Some(FailureKind::OutOfCapacity));
    assert_eq!(outcome.response_class(), ResponseClass::ClientError);
    assert!(outcome.record_id.is_none());
    assert!(outcome.compensations.is_empty());
    assert_eq!(h.payment.collect_calls(), 0);
    assert!(
        h.saga
            .records()
            .list_by_owner(&OwnerId::new(OWNER), None)
            .await
            .unwrap()
            .is_empty()
    );
}

#[tokio::test]
async fn test_payment_declined() {
    let h = TestHarness::new(1).await;
    h.payment.set_decline(true);

    let outcome = h.book("tok_c").await;

    assert_eq!(failed_step(&outcome), Some(SagaStep::CollectPayment));
    assert_eq!(failure_kind(&outcome), Some(FailureKind::PaymentDeclined));
    assert_eq!(outcome.response_class(), ResponseClass::ClientError);
    assert_eq!(
        outcome.compensations_attempted(),
        vec![Compensation::CancelRecord, Compensation::ReleaseInventory]
    );
    assert!(outcome.compensations.iter().all(|c| c.succeeded));
    assert!(!outcome.refund_attempted);

    let record = h.record(&outcome).await;
    assert_eq!(record.status, RecordStatus::Cancelled);
    assert_eq!(h.available().await, 1);
    assert_eq!(h.payment.refund_calls(), 0);
    assert_eq!(h.notifier.sent_count(), 0);
}

#[tokio::test]
async fn test_confirmation_fails_after_charge() {
    let h = TestHarness::new(1).await;
    h.store
        .fail_nth(StoreOp::ConditionalUpdate, "booking/", 1)
        .await;

    let outcome = h.book("tok_d").await;

    assert_eq!(failed_step(&outcome), Some(SagaStep::ConfirmRecord));
    assert_eq!(failure_kind(&outcome), Some(FailureKind::ConfirmationFailed));
    assert_eq!(outcome.response_class(), ResponseClass::ServerError);
    assert!(outcome.refund_attempted);
    assert_eq!(outcome.refund_succeeded(), Some(true));
    assert_eq!(
        outcome.compensations_attempted(),
        vec![
            Compensation::RefundPayment,
            Compensation::CancelRecord,
            Compensation::ReleaseInventory
        ]
    );

    assert_eq!(h.payment.collect_calls(), 1);
    assert_eq!(h.payment.refund_calls(), 1);
    assert_eq!(
        h.payment.payment("tok_d").unwrap().status,
        PaymentStatus::Refunded
    );

    let record = h.record(&outcome).await;
    assert_eq!(record.status, RecordStatus::Cancelled);
    assert!(record.reference.is_none());
    assert_eq!(h.available().await, 1);
    assert!(outcome.notification.is_none());
}

#[tokio::test]
async fn test_refund_failure_is_reported_not_raised() {
    let h = TestHarness::new(1).await;
    h.store
        .fail_nth(StoreOp::ConditionalUpdate, "booking/", 1)
        .await;
    h.payment.set_fail_on_refund(true);

    let outcome = h.book("tok_d2").await;

    assert!(outcome.refund_attempted);
    assert_eq!(outcome.refund_succeeded(), Some(false));
    let refund = &outcome.compensations[0];
    assert_eq!(refund.compensation, Compensation::RefundPayment);
    assert!(refund.error.is_some());

    // Later compensations still ran.
    assert!(outcome.compensations[1..].iter().all(|c| c.succeeded));
    assert_eq!(h.record(&outcome).await.status, RecordStatus::Cancelled);
    assert_eq!(h.available().await, 1);
    assert_eq!(failure_kind(&outcome), Some(FailureKind::ConfirmationFailed));
}

#[tokio::test]
async fn test_post_confirmation_cancellation() {
    let h = TestHarness::new(1).await;
    let outcome = h.book("tok_e").await;
    assert!(outcome.is_success());
    let record_id = outcome.record_id.unwrap();

    let cancelled = h.saga.cancel(record_id).await.unwrap();

    assert!(!cancelled.was_noop());
    assert_eq!(cancelled.previous, RecordStatus::Confirmed);
    assert_eq!(cancelled.record.status, RecordStatus::Cancelled);
    assert!(cancelled.record.reference.is_none());
    assert!(cancelled.refund_attempted());
    assert!(cancelled.compensations.iter().all(|c| c.succeeded));
    assert_eq!(
        cancelled.notification.as_ref().map(|n| n.status),
        Some(NotificationStatus::Cancelled)
    );
    assert_eq!(h.available().await, 1);
    assert_eq!(h.payment.refund_calls(), 1);

    // Repeat is a no-op.
    let sent_before = h.notifier.sent_count();
    let again = h.saga.cancel(record_id).await.unwrap();

    assert!(again.was_noop());
    assert!(again.compensations.is_empty());
    assert!(again.notification.is_none());
    assert_eq!(h.available().await, 1);
    assert_eq!(h.payment.refund_calls(), 1);
    assert_eq!(h.notifier.sent_count(), sent_before);
}

#[tokio::test]
async fn test_cancel_reports_release_failure() {
    let h = TestHarness::new(1).await;
    let outcome = h.book("tok_e2").await;
    h.store.fail_next(StoreOp::ConditionalUpdate, "unit/").await;

    let cancelled = h.saga.cancel(outcome.record_id.unwrap()).await.unwrap();

    assert_eq!(cancelled.record.status, RecordStatus::Cancelled);
    let release = &cancelled.compensations[0];
    assert_eq!(release.compensation, Compensation::ReleaseInventory);
    assert!(!release.succeeded);
    assert!(cancelled.compensations[1].succeeded);
    assert_eq!(h.payment.refund_calls(), 1);
}

#[tokio::test]
async fn test_cancel_unconfirmed_is_rejected() {
    let h = TestHarness::new(1).await;
    let id = h
        .saga
        .records()
        .create(&UnitId::new(UNIT), &OwnerId::new(OWNER), "tok_u")
        .await
        .unwrap();

    let result = h.saga.cancel(id).await;

    assert!(matches!(
        result,
        Err(SagaError::NotCancellable {
            status: RecordStatus::Unconfirmed
        })
    ));
    let record = h.saga.records().get(id).await.unwrap();
    assert_eq!(record.status, RecordStatus::Unconfirmed);
}

#[tokio::test]
async fn test_compensation_completeness_per_failing_step() {
    let cases = [
        (SagaStep::ReserveInventory, vec![]),
        (SagaStep::CreateRecord, vec![Compensation::ReleaseInventory]),
        (
            SagaStep::CollectPayment,
            vec![Compensation::CancelRecord, Compensation::ReleaseInventory],
        ),
        (
            SagaStep::ConfirmRecord,
            vec![
                Compensation::RefundPayment,
                Compensation::CancelRecord,
                Compensation::ReleaseInventory,
            ],
        ),
    ];

    for (step, expected) in cases {
        let h = TestHarness::new(3).await;
        match step {
            SagaStep::ReserveInventory => {
                h.store.fail_next(StoreOp::ConditionalUpdate, "unit/").await
            }
            SagaStep::CreateRecord => {
                h.store
                    .fail_next(StoreOp::ConditionalUpdate, "booking/")
                    .await
            }
            SagaStep::CollectPayment => h.payment.set_unavailable(true),
            SagaStep::ConfirmRecord => {
                h.store
                    .fail_nth(StoreOp::ConditionalUpdate, "booking/", 1)
                    .await
            }
        }

        let outcome = h.book("tok_k").await;

        assert_eq!(failed_step(&outcome), Some(step), "{step}");
        assert_eq!(outcome.compensations_attempted(), expected, "{step}");
        assert!(outcome.compensations.iter().all(|c| c.succeeded), "{step}");
        assert_eq!(h.available().await, 3, "{step}");
        assert!(h.payment.collect_calls() <= 1, "{step}");
        assert!(h.payment.refund_calls() <= 1, "{step}");
        assert_eq!(h.payment.captured_count(), 0, "{step}");
        assert_eq!(outcome.state, SagaState::Failed, "{step}");
    }
}

#[tokio::test]
async fn test_store_failure_on_create_is_client_error() {
    let h = TestHarness::new(1).await;
    h.store
        .fail_next(StoreOp::ConditionalUpdate, "booking/")
        .await;

    let outcome = h.book("tok_s").await;

    assert_eq!(failure_kind(&outcome), Some(FailureKind::StorageUnavailable));
    assert_eq!(outcome.response_class(), ResponseClass::ClientError);
    assert!(outcome.record_id.is_none());
    assert_eq!(h.available().await, 1);
}

#[tokio::test]
async fn test_panic_in_payment_unwinds_known_steps() {
    let h = TestHarness::new(1).await;
    h.payment.set_panic_on_collect(true);

    let outcome = h.book("tok_p").await;

    assert_eq!(failed_step(&outcome), Some(SagaStep::CollectPayment));
    assert_eq!(failure_kind(&outcome), Some(FailureKind::Unexpected));
    assert_eq!(outcome.response_class(), ResponseClass::ServerError);
    assert_eq!(
        outcome.compensations_attempted(),
        vec![Compensation::CancelRecord, Compensation::ReleaseInventory]
    );
    assert_eq!(h.record(&outcome).await.status, RecordStatus::Cancelled);
    assert_eq!(h.available().await, 1);
    assert!(
        outcome
            .failure
            .as_ref()
            .unwrap()
            .message
            .contains("payment gateway crashed")
    );
}

#[tokio::test]
async fn test_payment_timeout_is_gateway_failure() {
    let config = SagaConfig::default().with_payment_timeout(Duration::from_millis(50));
    let h = TestHarness::with_config(1, config).await;
    h.payment.set_collect_delay(Some(Duration::from_secs(2)));

    let outcome = h.book("tok_t").await;

    assert_eq!(failed_step(&outcome), Some(SagaStep::CollectPayment));
    assert_eq!(failure_kind(&outcome), Some(FailureKind::GatewayUnavailable));
    assert_eq!(outcome.response_class(), ResponseClass::ClientError);
    assert_eq!(
        outcome.compensations_attempted(),
        vec![Compensation::CancelRecord, Compensation::ReleaseInventory]
    );
    assert_eq!(h.payment.captured_count(), 0);
    assert_eq!(h.available().await, 1);
}

#[tokio::test]
async fn test_side_effect_failures_do_not_change_outcome() {
    let h = TestHarness::new(1).await;
    h.loyalty.set_fail_on_award(true);
    h.notifier.set_fail_on_notify(true);

    let outcome = h.book("tok_f").await;

    assert!(outcome.is_success());
    assert!(outcome.compensations.is_empty());
    assert!(outcome.notification.is_none());
    assert_eq!(
        side_effect_failures(&outcome),
        vec![SideEffect::AwardLoyalty, SideEffect::Notify]
    );
    assert_eq!(h.record(&outcome).await.status, RecordStatus::Confirmed);
    assert_eq!(h.available().await, 0);
}

#[tokio::test]
async fn test_side_effect_panic_does_not_change_outcome() {
    let h = TestHarness::new(1).await;
    h.loyalty.set_panic_on_award(true);

    let outcome = h.book("tok_g").await;

    assert!(outcome.is_success());
    assert_eq!(side_effect_failures(&outcome), vec![SideEffect::AwardLoyalty]);
    // Notification still goes out after the loyalty panic.
    assert!(outcome.notification.is_some());
    assert_eq!(h.notifier.sent_count(), 1);
}

#[tokio::test]
async fn test_notification_timeout_is_ignored() {
    let config = SagaConfig::default().with_side_effect_timeout(Duration::from_millis(50));
    let h = TestHarness::with_config(1, config).await;
    h.notifier.set_delay(Some(Duration::from_secs(2)));

    let outcome = h.book("tok_n").await;

    assert!(outcome.is_success());
    assert!(outcome.notification.is_none());
    assert_eq!(side_effect_failures(&outcome), vec![SideEffect::Notify]);
}

#[tokio::test]
async fn test_each_execution_allocates_new_record() {
    let h = TestHarness::new(2).await;

    let first = h.book("tok_1").await;
    let second = h.book("tok_2").await;

    assert!(first.is_success() && second.is_success());
    assert_ne!(first.record_id, second.record_id);
    assert_eq!(h.available().await, 0);
}

#[tokio::test]
async fn test_concurrent_sagas_never_oversell() {
    let h = TestHarness::new(3).await;

    let tokens: Vec<String> = (0..10).map(|i| format!("tok_{i}")).collect();
    let outcomes = join_all(tokens.iter().map(|t| h.book(t))).await;

    let succeeded = outcomes.iter().filter(|o| o.is_success()).count();
    let sold_out = outcomes
        .iter()
        .filter(|o| failure_kind(o) == Some(FailureKind::OutOfCapacity))
        .count();

    assert_eq!(succeeded, 3);
    assert_eq!(sold_out, 7);
    assert_eq!(h.available().await, 0);
    assert_eq!(h.payment.captured_count(), 3);
}

/// Store that panics on the second conditional update of a booking document,
/// which is the confirm write.
#[derive(Clone, Default)]
struct PanicOnConfirmStore {
    inner: InMemoryKvStore,
    booking_updates: Arc<AtomicUsize>,
}

#[async_trait]
impl KvStore for PanicOnConfirmStore {
    async fn get(&self, key: &str) -> kv_store::Result<Option<Item>> {
        self.inner.get(key).await
    }

    async fn put(&self, key: &str, value: Value) -> kv_store::Result<Item> {
        self.inner.put(key, value).await
    }

    async fn conditional_update(
        &self,
        key: &str,
        precondition: Precondition,
        mutation: Mutation,
    ) -> kv_store::Result<ConditionalOutcome> {
        if key.starts_with("booking/") && self.booking_updates.fetch_add(1, Ordering::SeqCst) == 1
        {
            panic!("record store crashed during confirm");
        }
        self.inner
            .conditional_update(key, precondition, mutation)
            .await
    }

    async fn scan_prefix(&self, prefix: &str) -> kv_store::Result<Vec<Item>> {
        self.inner.scan_prefix(prefix).await
    }
}

#[tokio::test]
async fn test_panic_in_confirm_refunds_and_unwinds() {
    let store = PanicOnConfirmStore::default();
    let payment = InMemoryPaymentGateway::new();
    let saga = ReservationSaga::new(
        store.clone(),
        payment.clone(),
        InMemoryLoyaltyLedger::new(),
        InMemoryNotifier::new(),
    );
    saga.ledger()
        .register(InventoryUnit::new(UnitId::new(UNIT), 1).unwrap())
        .await
        .unwrap();

    let outcome = saga
        .execute(ReservationRequest::new(UNIT, OWNER, "tok_x").unwrap())
        .await;

    assert_eq!(failed_step(&outcome), Some(SagaStep::ConfirmRecord));
    assert_eq!(failure_kind(&outcome), Some(FailureKind::Unexpected));
    assert_eq!(outcome.response_class(), ResponseClass::ServerError);
    assert_eq!(
        outcome.compensations_attempted(),
        vec![
            Compensation::RefundPayment,
            Compensation::CancelRecord,
            Compensation::ReleaseInventory,
        ]
    );
    assert!(outcome.refund_attempted);
    assert_eq!(outcome.refund_succeeded(), Some(true));
    assert_eq!(payment.refund_calls(), 1);
    assert_eq!(payment.captured_count(), 0);

    let record = saga
        .records()
        .get(outcome.record_id.expect("record id"))
        .await
        .unwrap();
    assert_eq!(record.status, RecordStatus::Cancelled);
    assert_eq!(
        saga.ledger().get(&UnitId::new(UNIT)).await.unwrap().available,
        1
    );
}

#[tokio::test]
async fn test_force_cancel_frees_stuck_unconfirmed_record() {
    let h = TestHarness::new(1).await;
    let unit = UnitId::new(UNIT);
    h.saga.ledger().reserve(&unit).await.unwrap();
    let id = h
        .saga
        .records()
        .create(&unit, &OwnerId::new(OWNER), "tok_s")
        .await
        .unwrap();

    let cancelled = h.saga.force_cancel(id).await.unwrap();

    assert_eq!(cancelled.previous, RecordStatus::Unconfirmed);
    assert_eq!(cancelled.record.status, RecordStatus::Cancelled);
    assert_eq!(h.available().await, 1);

    let release = &cancelled.compensations[0];
    assert_eq!(release.compensation, Compensation::ReleaseInventory);
    assert!(release.succeeded);
    // Nothing was captured for this token.
    let refund = &cancelled.compensations[1];
    assert_eq!(refund.compensation, Compensation::RefundPayment);
    assert!(!refund.succeeded);

    let again = h.saga.force_cancel(id).await.unwrap();
    assert!(again.was_noop());
    assert!(again.compensations.is_empty());
    assert_eq!(h.available().await, 1);
}

#[tokio::test]
async fn test_force_cancel_confirmed_matches_cancel() {
    let h = TestHarness::new(1).await;
    let outcome = h.book("tok_fc").await;

    let cancelled = h.saga.force_cancel(outcome.record_id.unwrap()).await.unwrap();

    assert_eq!(cancelled.previous, RecordStatus::Confirmed);
    assert!(cancelled.compensations.iter().all(|c| c.succeeded));
    assert_eq!(h.payment.refund_calls(), 1);
    assert_eq!(h.available().await, 1);
}
