//! Loyalty sink trait and in-memory points ledger.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};

use async_trait::async_trait;
use common::OwnerId;
use domain::Money;
use serde::{Deserialize, Serialize};

use super::{SinkError, read, write};

const SILVER_THRESHOLD: u64 = 50_000;
const GOLD_THRESHOLD: u64 = 100_000;

/// Receives loyalty credit for charged bookings.
#[async_trait]
pub trait LoyaltySink: Send + Sync {
    async fn award_credit(&self, owner_id: &OwnerId, amount: Money) -> Result<(), SinkError>;
}

/// Loyalty tier derived from accumulated points.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum LoyaltyTier {
    Bronze,
    Silver,
    Gold,
}

impl LoyaltyTier {
    pub fn from_points(points: u64) -> Self {
        if points >= GOLD_THRESHOLD {
            LoyaltyTier::Gold
        } else if points >= SILVER_THRESHOLD {
            LoyaltyTier::Silver
        } else {
            LoyaltyTier::Bronze
        }
    }

    /// Points needed to enter the next tier, if there is one.
    pub fn next_threshold(&self) -> Option<u64> {
        match self {
            LoyaltyTier::Bronze => Some(SILVER_THRESHOLD),
            LoyaltyTier::Silver => Some(GOLD_THRESHOLD),
            LoyaltyTier::Gold => None,
        }
    }
}

/// An owner's loyalty standing.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoyaltySummary {
    pub points: u64,
    pub tier: LoyaltyTier,
    /// Points left until the next tier; zero at the top tier.
    pub remaining_points: u64,
}

impl LoyaltySummary {
    pub fn from_points(points: u64) -> Self {
        let tier = LoyaltyTier::from_points(points);
        let remaining_points = tier
            .next_threshold()
            .map_or(0, |threshold| threshold.saturating_sub(points));
        Self {
            points,
            tier,
            remaining_points,
        }
    }
}

#[derive(Debug, Default)]
struct InMemoryLoyaltyState {
    points: HashMap<OwnerId, u64>,
    award_calls: usize,
    fail_on_award: bool,
    panic_on_award: bool,
}

/// In-memory loyalty points ledger.
///
/// Awards one point per whole currency unit charged.
#[derive(Debug, Clone, Default)]
pub struct InMemoryLoyaltyLedger {
    state: Arc<RwLock<InMemoryLoyaltyState>>,
}

impl InMemoryLoyaltyLedger {
    pub fn new() -> Self {
        Self::default()
    }

    /// Makes every award fail.
    pub fn set_fail_on_award(&self, fail: bool) {
        write(&self.state).fail_on_award = fail;
    }

    /// Makes every award panic.
    pub fn set_panic_on_award(&self, panic: bool) {
        write(&self.state).panic_on_award = panic;
    }

    /// Number of award calls received.
    pub fn award_calls(&self) -> usize {
        read(&self.state).award_calls
    }

    /// Returns the owner's standing; owners with no history are bronze with
    /// zero points.
    pub fn summary(&self, owner_id: &OwnerId) -> LoyaltySummary {
        let points = read(&self.state)
            .points
            .get(owner_id)
            .copied()
            .unwrap_or_default();
        LoyaltySummary::from_points(points)
    }
}

#[async_trait]
impl LoyaltySink for InMemoryLoyaltyLedger {
    async fn award_credit(&self, owner_id: &OwnerId, amount: Money) -> Result<(), SinkError> {
        let panic = {
            let mut state = write(&self.state);
            state.award_calls += 1;
            state.panic_on_award
        };
        if panic {
            panic!("loyalty ledger crashed while awarding credit");
        }

        let mut state = write(&self.state);
        if state.fail_on_award {
            return Err(SinkError::Unavailable("loyalty ledger offline".to_string()));
        }
        let points = u64::try_from(amount.dollars())
            .map_err(|_| SinkError::Rejected(format!("cannot award credit for {amount}")))?;

        *state.points.entry(owner_id.clone()).or_default() += points;
        tracing::debug!(%owner_id, points, "loyalty credit awarded");
        Ok(())
    }
}
