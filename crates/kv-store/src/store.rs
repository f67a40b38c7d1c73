use std::sync::Arc;

use async_trait::async_trait;
use serde::Serialize;
use serde::de::DeserializeOwned;
use serde_json::Value;

use crate::{Item, Mutation, Precondition, Result};

/// Result of a conditional update.
#[derive(Debug, Clone, PartialEq)]
pub enum ConditionalOutcome {
    /// The precondition held and the mutation was written.
    Applied(Item),
    /// The precondition did not hold; nothing was written.
    ///
    /// `current` is the document the precondition was evaluated against.
    PreconditionFailed { current: Option<Item> },
}

impl ConditionalOutcome {
    /// Returns true if the mutation was written.
    pub fn is_applied(&self) -> bool {
        matches!(self, ConditionalOutcome::Applied(_))
    }

    /// Returns the written item, if the mutation was applied.
    pub fn applied(self) -> Option<Item> {
        match self {
            ConditionalOutcome::Applied(item) => Some(item),
            ConditionalOutcome::PreconditionFailed { .. } => None,
        }
    }
}

/// Core trait for key-value store implementations.
///
/// All implementations must be thread-safe (Send + Sync).
#[async_trait]
pub trait KvStore: Send + Sync {
    /// Reads the document stored under `key`.
    async fn get(&self, key: &str) -> Result<Option<Item>>;

    /// Writes a document unconditionally, replacing any previous value.
    async fn put(&self, key: &str, value: Value) -> Result<Item>;

    /// Applies `mutation` to the document under `key` only if `precondition`
    /// holds on its current value.
    ///
    /// Evaluation and write are a single indivisible operation with respect to
    /// every other operation on the same key. Implementations must never
    /// implement this as a client-side read followed by an unguarded write.
    async fn conditional_update(
        &self,
        key: &str,
        precondition: Precondition,
        mutation: Mutation,
    ) -> Result<ConditionalOutcome>;

    /// Returns every document whose key starts with `prefix`, ordered by key.
    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>>;
}

#[async_trait]
impl<T: KvStore + ?Sized> KvStore for Arc<T> {
    async fn get(&self, key: &str) -> Result<Option<Item>> {
        (**self).get(key).await
    }

    async fn put(&self, key: &str, value: Value) -> Result<Item> {
        (**self).put(key, value).await
    }

    async fn conditional_update(
        &self,
        key: &str,
        precondition: Precondition,
        mutation: Mutation,
    ) -> Result<ConditionalOutcome> {
        (**self).conditional_update(key, precondition, mutation).await
    }

    async fn scan_prefix(&self, prefix: &str) -> Result<Vec<Item>> {
        (**self).scan_prefix(prefix).await
    }
}

/// Extension trait providing typed convenience methods for stores.
#[async_trait]
pub trait KvStoreExt: KvStore {
    /// Reads and deserializes the document under `key`.
    async fn get_as<T>(&self, key: &str) -> Result<Option<T>>
    where
        T: DeserializeOwned + Send,
    {
        match self.get(key).await? {
            Some(item) => Ok(Some(item.decode()?)),
            None => Ok(None),
        }
    }

    /// Serializes and writes a document unconditionally.
    async fn put_as<T>(&self, key: &str, value: &T) -> Result<Item>
    where
        T: Serialize + Sync,
    {
        let value = serde_json::to_value(value)?;
        self.put(key, value).await
    }

    /// Checks whether a document exists under `key`.
    async fn exists(&self, key: &str) -> Result<bool> {
        Ok(self.get(key).await?.is_some())
    }
}

// Blanket implementation for all KvStore implementations
impl<T: KvStore + ?Sized> KvStoreExt for T {}
