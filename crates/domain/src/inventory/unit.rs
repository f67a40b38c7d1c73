use common::UnitId;
use serde::{Deserialize, Serialize};

use super::LedgerError;

/// A bookable resource with a bounded capacity counter.
///
/// `available` is only ever changed through [`InventoryLedger`](super::InventoryLedger);
/// `capacity` is fixed at registration.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct InventoryUnit {
    pub id: UnitId,
    pub available: u32,
    pub capacity: u32,
}

impl InventoryUnit {
    /// Creates a unit with every seat available.
    pub fn new(id: impl Into<UnitId>, capacity: u32) -> Result<Self, LedgerError> {
        Self::with_available(id, capacity, capacity)
    }

    /// Creates a unit with an explicit starting counter.
    pub fn with_available(
        id: impl Into<UnitId>,
        available: u32,
        capacity: u32,
    ) -> Result<Self, LedgerError> {
        let id = id.into();
        if id.is_blank() {
            return Err(LedgerError::UnitIdRequired);
        }
        if available > capacity {
            return Err(LedgerError::InvalidCapacity {
                id,
                available,
                capacity,
            });
        }
        Ok(Self {
            id,
            available,
            capacity,
        })
    }

    /// Number of seats currently held.
    pub fn reserved(&self) -> u32 {
        self.capacity.saturating_sub(self.available)
    }

    pub fn is_sold_out(&self) -> bool {
        self.available == 0
    }
}
