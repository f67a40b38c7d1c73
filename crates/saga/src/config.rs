use std::time::Duration;

/// Time limits applied to external calls made by the saga.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct SagaConfig {
    /// Bound on each payment collect/refund call. Expiry counts as
    /// `GatewayUnavailable`.
    pub payment_timeout: Duration,
    /// Bound on each loyalty/notification call.
    pub side_effect_timeout: Duration,
}

impl Default for SagaConfig {
    fn default() -> Self {
        Self {
            payment_timeout: Duration::from_secs(10),
            side_effect_timeout: Duration::from_secs(5),
        }
    }
}

impl SagaConfig {
    pub fn with_payment_timeout(mut self, timeout: Duration) -> Self {
        self.payment_timeout = timeout;
        self
    }

    pub fn with_side_effect_timeout(mut self, timeout: Duration) -> Self {
        self.side_effect_timeout = timeout;
        self
    }
}
