use common::UnitId;
use kv_store::{
    ConditionalOutcome, FieldCheck, Item, KvStore, KvStoreExt, Mutation, Precondition, StoreError,
    item_key,
};

use super::{InventoryUnit, LedgerError};

/// Key namespace for unit documents (`unit/{id}`).
pub const UNIT_NAMESPACE: &str = "unit";

const AVAILABLE: &str = "available";
const CAPACITY: &str = "capacity";

fn unit_key(id: &UnitId) -> String {
    item_key(UNIT_NAMESPACE, id)
}

/// Reads the counter out of a document that has already been written.
///
/// The write is committed at this point, so an unreadable document must not
/// turn the update into a reported failure.
fn available_in(item: &Item) -> u32 {
    match item
        .value
        .get(AVAILABLE)
        .and_then(serde_json::Value::as_u64)
        .and_then(|n| u32::try_from(n).ok())
    {
        Some(available) => available,
        None => {
            tracing::warn!(key = %item.key, "unit document has no readable available count");
            0
        }
    }
}

/// Capacity counters for every bookable unit.
///
/// Every change to `available` is a single conditional update against the
/// store. Concurrent callers race at the storage layer and the precondition
/// picks the winners, so the ledger itself holds no locks.
pub struct InventoryLedger<S: KvStore> {
    store: S,
}

impl<S: KvStore> InventoryLedger<S> {
    /// Creates a ledger backed by the given store.
    pub fn new(store: S) -> Self {
        Self { store }
    }

    /// Returns a reference to the underlying store.
    pub fn store(&self) -> &S {
        &self.store
    }

    /// Registers a new unit. Fails if the id is already taken.
    #[tracing::instrument(skip(self), fields(unit_id = %unit.id))]
    pub async fn register(&self, unit: InventoryUnit) -> Result<InventoryUnit, LedgerError> {
        let document = serde_json::to_value(&unit).map_err(StoreError::from)?;
        let outcome = self
            .store
            .conditional_update(
                &unit_key(&unit.id),
                Precondition::Absent,
                Mutation::Insert(document),
            )
            .await?;

        match outcome {
            ConditionalOutcome::Applied(_) => {
                tracing::info!(capacity = unit.capacity, "unit registered");
                Ok(unit)
            }
            ConditionalOutcome::PreconditionFailed { .. } => {
                Err(LedgerError::UnitAlreadyExists(unit.id))
            }
        }
    }

    /// Takes one seat. Returns the number of seats left.
    ///
    /// Fails with [`LedgerError::OutOfCapacity`] when nothing is left or the
    /// unit does not exist.
    #[tracing::instrument(skip(self))]
    pub async fn reserve(&self, unit_id: &UnitId) -> Result<u32, LedgerError> {
        let precondition =
            Precondition::Exists.and(Precondition::field(AVAILABLE, FieldCheck::GreaterThan(0)));

        let outcome = self
            .store
            .conditional_update(
                &unit_key(unit_id),
                precondition,
                Mutation::increment(AVAILABLE, -1),
            )
            .await?;

        match outcome {
            ConditionalOutcome::Applied(item) => {
                let remaining = available_in(&item);
                metrics::counter!("inventory_reservations_total", "outcome" => "reserved")
                    .increment(1);
                tracing::debug!(remaining, "seat reserved");
                Ok(remaining)
            }
            ConditionalOutcome::PreconditionFailed { .. } => {
                metrics::counter!("inventory_reservations_total", "outcome" => "out_of_capacity")
                    .increment(1);
                tracing::debug!("no capacity left");
                Err(LedgerError::OutOfCapacity(unit_id.clone()))
            }
        }
    }

    /// Returns one seat. Returns the number of seats now available.
    ///
    /// The guard compares against the stored capacity in the same operation,
    /// so a release without a matching reserve fails with
    /// [`LedgerError::AtMaximumCapacity`] instead of overflowing the unit.
    #[tracing::instrument(skip(self))]
    pub async fn release(&self, unit_id: &UnitId) -> Result<u32, LedgerError> {
        let precondition = Precondition::field(
            AVAILABLE,
            FieldCheck::LessThanField(CAPACITY.to_string()),
        );

        let outcome = self
            .store
            .conditional_update(
                &unit_key(unit_id),
                precondition,
                Mutation::increment(AVAILABLE, 1),
            )
            .await?;

        match outcome {
            ConditionalOutcome::Applied(item) => {
                let available = available_in(&item);
                metrics::counter!("inventory_releases_total", "outcome" => "released")
                    .increment(1);
                tracing::debug!(available, "seat released");
                Ok(available)
            }
            ConditionalOutcome::PreconditionFailed { current: None } => {
                Err(LedgerError::UnitNotFound(unit_id.clone()))
            }
            ConditionalOutcome::PreconditionFailed { current: Some(_) } => {
                metrics::counter!("inventory_releases_total", "outcome" => "at_maximum")
                    .increment(1);
                tracing::warn!("release rejected, unit already at capacity");
                Err(LedgerError::AtMaximumCapacity(unit_id.clone()))
            }
        }
    }

    /// Reads a unit.
    pub async fn get(&self, unit_id: &UnitId) -> Result<InventoryUnit, LedgerError> {
        self.store
            .get_as::<InventoryUnit>(&unit_key(unit_id))
            .await?
            .ok_or_else(|| LedgerError::UnitNotFound(unit_id.clone()))
    }

    /// Lists every registered unit, ordered by id.
    pub async fn list(&self) -> Result<Vec<InventoryUnit>, LedgerError> {
        let prefix = format!("{UNIT_NAMESPACE}/");
        let items = self.store.scan_prefix(&prefix).await?;
        items
            .into_iter()
            .map(|item| item.decode::<InventoryUnit>().map_err(LedgerError::from))
            .collect()
    }
}
