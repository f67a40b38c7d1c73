//! Identifier types shared by every crate in the reservation workspace.

pub mod types;

pub use types::{OwnerId, RecordId, UnitId};
