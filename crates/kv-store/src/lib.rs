//! Key-value storage with atomic conditional updates.
//!
//! The [`KvStore`] trait is the only coordination primitive the reservation
//! system relies on: `conditional_update` evaluates a [`Precondition`] and
//! applies a [`Mutation`] as one indivisible operation. Two backends are
//! provided, an in-memory store for tests and single-process deployments and a
//! PostgreSQL store for everything else.

pub mod condition;
pub mod error;
pub mod item;
pub mod memory;
pub mod mutation;
pub mod postgres;
pub mod store;

pub use condition::{FieldCheck, Precondition};
pub use error::{Result, StoreError};
pub use item::{Item, item_key};
pub use memory::{InMemoryKvStore, StoreOp};
pub use mutation::Mutation;
pub use postgres::PostgresKvStore;
pub use store::{ConditionalOutcome, KvStore, KvStoreExt};
