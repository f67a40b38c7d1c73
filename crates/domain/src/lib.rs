//! Domain layer for the reservation system.
//!
//! This crate provides the two stateful components the reservation saga
//! coordinates:
//! - [`InventoryLedger`] guarding each unit's `0 ≤ available ≤ capacity` counter
//! - [`RecordStore`] holding reservation records and their state machine
//!
//! Both are thin layers over a [`kv_store::KvStore`] and rely exclusively on
//! its conditional update for coordination.

pub mod booking;
pub mod inventory;
pub mod money;

pub use booking::{
    CancelOutcome, ParseStatusError, RECORD_NAMESPACE, RecordError, RecordStatus, RecordStore,
    ReservationRecord,
};
pub use inventory::{InventoryLedger, InventoryUnit, LedgerError, UNIT_NAMESPACE};
pub use money::Money;
