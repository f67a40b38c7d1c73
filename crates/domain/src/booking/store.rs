use chrono::Utc;
use common::{OwnerId, RecordId, UnitId};
use kv_store::{
    ConditionalOutcome, FieldCheck, KvStore, KvStoreExt, Mutation, Precondition, item_key,
};
use serde_json::{Value, json};
use uuid::Uuid;

use super::{RecordError, RecordStatus, ReservationRecord};

/// Key namespace for record documents (`booking/{id}`).
pub const RECORD_NAMESPACE: &str = "booking";

const STATUS: &str = "status";
const REFERENCE_LEN: usize = 8;

fn record_key(id: RecordId) -> String {
    item_key(RECORD_NAMESPACE, id)
}

fn status_is(status: RecordStatus) -> Precondition {
    Precondition::field(STATUS, FieldCheck::Equals(json!(status.as_str())))
}

/// Opaque, human-readable booking reference.
fn generate_reference() -> String {
    Uuid::new_v4().simple().to_string()[..REFERENCE_LEN].to_uppercase()
}

/// Result of [`RecordStore::cancel`].
#[derive(Debug, Clone)]
pub struct CancelOutcome {
    /// Status the record had before this call.
    pub previous: RecordStatus,
    /// The record as stored after the call.
    pub record: ReservationRecord,
}

impl CancelOutcome {
    /// True if the record was already cancelled and nothing changed.
    pub fn was_noop(&self) -> bool {
        self.previous == RecordStatus::Cancelled
    }
}

/// Reservation records keyed by id.
///
/// Status changes are conditional updates on the stored status, so a
/// transition is only written if the record is still in the state it was
/// observed in.
pub struct RecordStore<S: KvStore> {
    store: S,
}

impl<S: KvStore> RecordStore<S> {
    /// Creates a record store backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Inserts a new UNCONFIRMED record and returns its id.
    #[tracing::instrument(skip(self, payment_token))]
    pub async fn create(
        &self,
        subject_id: &UnitId,
        owner_id: &OwnerId,
        payment_token: &str,
    ) -> Result<RecordId, RecordError> {
        if subject_id.is_blank() {
            return Err(RecordError::InvalidReference("subject_id"));
        }
        if owner_id.is_blank() {
            return Err(RecordError::InvalidReference("owner_id"));
        }
        if payment_token.trim().is_empty() {
            return Err(RecordError::InvalidReference("payment_token"));
        }

        let record = ReservationRecord::new(subject_id.clone(), owner_id.clone(), payment_token);
        let document = serde_json::to_value(&record)?;

        let outcome = self
            .store
            .conditional_update(
                &record_key(record.id),
                Precondition::Absent,
                Mutation::Insert(document),
            )
            .await?;

        if !outcome.is_applied() {
            return Err(RecordError::AlreadyExists(record.id));
        }

        tracing::debug!(record_id = %record.id, "record created");
        Ok(record.id)
    }

    /// Moves a record from UNCONFIRMED to CONFIRMED and returns the new
    /// reference.
    #[tracing::instrument(skip(self))]
    pub async fn confirm(&self, id: RecordId) -> Result<String, RecordError> {
        let reference = generate_reference();
        let mutation = Mutation::set([
            (STATUS, json!(RecordStatus::Confirmed.as_str())),
            ("reference", json!(reference)),
            ("updated_at", serde_json::to_value(Utc::now())?),
        ]);

        let outcome = self
            .store
            .conditional_update(&record_key(id), status_is(RecordStatus::Unconfirmed), mutation)
            .await?;

        match outcome {
            ConditionalOutcome::Applied(_) => {
                tracing::debug!(%reference, "record confirmed");
                Ok(reference)
            }
            ConditionalOutcome::PreconditionFailed { current: None } => {
                Err(RecordError::RecordNotFound(id))
            }
            ConditionalOutcome::PreconditionFailed {
                current: Some(item),
            } => {
                let record: ReservationRecord = item.decode()?;
                Err(RecordError::InvalidTransition {
                    id,
                    from: record.status,
                    to: RecordStatus::Confirmed,
                })
            }
        }
    }

    /// Cancels a record from any state and clears its reference.
    ///
    /// Cancelling a cancelled record is a successful no-op; check
    /// [`CancelOutcome::was_noop`] to tell the cases apart.
    #[tracing::instrument(skip(self))]
    pub async fn cancel(&self, id: RecordId) -> Result<CancelOutcome, RecordError> {
        let key = record_key(id);
        let mut current = self.get(id).await?;

        // Status only moves forward, so each lost race observes a later
        // status and the loop ends at CANCELLED at the latest.
        loop {
            if current.status.is_terminal() {
                return Ok(CancelOutcome {
                    previous: current.status,
                    record: current,
                });
            }

            let mutation = Mutation::set([
                (STATUS, json!(RecordStatus::Cancelled.as_str())),
                ("reference", Value::Null),
                ("updated_at", serde_json::to_value(Utc::now())?),
            ]);

            let outcome = self
                .store
                .conditional_update(&key, status_is(current.status), mutation)
                .await?;

            match outcome {
                ConditionalOutcome::Applied(item) => {
                    tracing::debug!(previous = %current.status, "record cancelled");
                    return Ok(CancelOutcome {
                        previous: current.status,
                        record: item.decode()?,
                    });
                }
                ConditionalOutcome::PreconditionFailed { current: None } => {
                    return Err(RecordError::RecordNotFound(id));
                }
                ConditionalOutcome::PreconditionFailed {
                    current: Some(item),
                } => {
                    current = item.decode()?;
                }
            }
        }
    }

    /// Reads a record.
    pub async fn get(&self, id: RecordId) -> Result<ReservationRecord, RecordError> {
        self.store
            .get_as::<ReservationRecord>(&record_key(id))
            .await?
            .ok_or(RecordError::RecordNotFound(id))
    }

    /// Lists an owner's records, oldest first, optionally filtered by status.
    pub async fn list_by_owner(
        &self,
        owner_id: &OwnerId,
        status: Option<RecordStatus>,
    ) -> Result<Vec<ReservationRecord>, RecordError> {
        let prefix = format!("{RECORD_NAMESPACE}/");
        let mut records = Vec::new();
        for item in self.store.scan_prefix(&prefix).await? {
            let record: ReservationRecord = item.decode()?;
            if &record.owner_id == owner_id && status.is_none_or(|s| s == record.status) {
                records.push(record);
            }
        }
        records.sort_by_key(|r| r.created_at);
        Ok(records)
    }
}
