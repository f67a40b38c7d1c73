use std::collections::BTreeMap;
use std::sync::Arc;

use async_trait::async_trait;
use serde_json::Value;
use tokio::sync::RwLock;

use crate::{
    ConditionalOutcome, Item, Mutation, Precondition, Result, StoreError, store::KvStore,
};

/// Store operation kinds, used to target injected faults.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum StoreOp {
    Get,
    Put,
    ConditionalUpdate,
    Scan,
}

#[derive(Debug, Clone)]
struct Fault {
    op: StoreOp,
    key_prefix: String,
    skip: usize,
}

#[derive(Debug, Default)]
struct MemoryState {
    items: BTreeMap<String, Item>,
    faults: Vec<Fault>,
}

impl MemoryState {
    /// Consumes the first pending fault matching this operation, if any.
    fn take_fault(&mut self, op: StoreOp, key: &str) -> Result<()> {
        let position = self
            .faults
            .iter()
            .position(|f| f.op == op && key.starts_with(&f.key_prefix));
        match position {
            Some(idx) if self.faults[idx].skip > 0 => {
                self.faults[idx].skip -= 1;
                Ok(())
            }
            Some(idx) => {
                let fault = self.faults.remove(idx);
                tracing::debug!(?op, key, prefix = %fault.key_prefix, "injected store fault");
                Err(StoreError::Unavailable(format!(
                    "injected fault on {op:?} for '{key}'"
                )))
            }
            None => Ok(()),
        }
    }
}

/// In-memory key-value store.
///
/// Every operation runs under a single write lock, so conditional updates are
/// trivially atomic. Provides the same interface as the PostgreSQL store and
/// supports one-shot fault injection for exercising failure paths.
#[derive(Clone, Default)]
pub struct InMemoryKvStore {
    state: Arc<RwLock<MemoryState>>,
}

impl InMemoryKvStore {
    /// Creates a new empty in-memory store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Returns the number of stored documents.
    pub async fn len(&self) -> usize {
        self.state.read().await.items.len()
    }

    /// Returns true if no documents are stored.
    pub async fn is_empty(&self) -> bool {
        self.state.read().await.items.is_empty()
    }

    /// Removes all documents and pending faults.
    pub async fn clear(&self) {
        let mut state = self.state.write().await;
        state.items.clear();
        state.faults.clear();
    }

    /// Makes the next `op` on a key starting with `key_prefix` fail with
    /// [`StoreError::Unavailable`]. Each queued fault fires once.
    pub async fn fail_next(&self, op: StoreOp, key_prefix: impl Into<String>) {
        self.fail_nth(op, key_prefix, 0).await;
    }

    /// Lets `skip` matching operations through, then fails the next one.
    pub async fn fail_nth(&self, op: StoreOp, key_prefix: impl Into<String>, skip: usize) {
        self.state.write().await.faults.push(Fault {
            op,
            key_prefix: key_prefix.into(),
            skip,
        });
    }

    /// Returns the number of faults that have not fired yet.
    pub async fn pending_faults(&self) -> usize {
        self.state.read().await.faults.len()
    }
}

#[async_trait]
impl KvStore for InMemoryKvStore {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        let mut state = self.state.write().await;
        state.take_fault(StoreOp::Get, key)?;
        Ok(state.items.get(key).cloned())
    }

    async fn put(&self, key: &str, value: Value) -> Result<Item> {
        let mut state = self.state.write().await;
        state.take_fault(StoreOp::Put, key)?;
        let item = Item::new(key, value);
        state.items.insert(key.to_string(), item.clone());
        Ok(item)
    }

    async fn conditional_update(
        &self,
        key: &str,
        precondition: Precondition,
        mutation: Mutation,
    ) -> Result<ConditionalOutcome> {
        let mut state = self.state.write().await;
        state.take_fault(StoreOp::ConditionalUpdate, key)?;

        let current = state.items.get(key);
        if !precondition.holds(current.map(|item| &item.value)) {
            return Ok(ConditionalOutcome::PreconditionFailed {
                current: current.cloned(),
            });
        }

        let value = mutation.apply(key, current.map(|item| &item.value))?;
        let item = Item::new(key, value);
        state.items.insert(key.to_string(), item.clone());
        Ok(ConditionalOutcome::Applied(item))
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>> {
        let mut state = self.state.write().await;
        state.take_fault(StoreOp::Scan, prefix)?;
        Ok(state
            .items
            .range(prefix.to_string()..)
            .take_while(|(key, _)| key.starts_with(prefix))
            .map(|(_, item)| item.clone())
            .collect())
    }
}
