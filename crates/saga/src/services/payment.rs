//! Payment gateway trait and in-memory implementation.

use std::collections::HashMap;
use std::sync::{Arc, RwLock};
use std::time::Duration;

use async_trait::async_trait;
use domain::Money;
use serde::{Deserialize, Serialize};
use thiserror::Error;

use super::{read, write};

/// Errors returned by a payment gateway.
#[derive(Debug, Clone, PartialEq, Eq, Error)]
pub enum PaymentError {
    /// The charge was refused (card declined, token already used, ...).
    #[error("Payment declined: {0}")]
    Declined(String),

    /// The gateway could not be reached or did not answer in time.
    #[error("Payment gateway unavailable: {0}")]
    GatewayUnavailable(String),

    /// The refund could not be issued.
    #[error("Refund failed: {0}")]
    RefundFailed(String),
}

/// Proof of a captured charge.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentReceipt {
    pub charge_id: String,
    pub receipt_url: String,
    pub amount: Money,
}

/// Proof of an issued refund.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RefundConfirmation {
    pub refund_id: String,
    pub amount: Money,
}

/// Lifecycle of a charge held by the gateway.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PaymentStatus {
    Captured,
    Refunded,
}

/// A charge as the gateway sees it.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PaymentRecord {
    pub token: String,
    pub charge_id: String,
    pub amount: Money,
    pub status: PaymentStatus,
}

/// Trait for payment gateway operations.
#[async_trait]
pub trait PaymentGateway: Send + Sync {
    /// Captures the charge identified by `token`.
    async fn collect(&self, token: &str) -> Result<PaymentReceipt, PaymentError>;

    /// Refunds the charge identified by `token`.
    async fn refund(&self, token: &str) -> Result<RefundConfirmation, PaymentError>;
}

/// Default charge when no price is configured.
pub const DEFAULT_PRICE: Money = Money::from_cents(15_000);

#[derive(Debug)]
struct InMemoryPaymentState {
    payments: HashMap<String, PaymentRecord>,
    price: Money,
    next_id: u32,
    collect_calls: usize,
    refund_calls: usize,
    fail_on_collect: Option<PaymentError>,
    fail_on_refund: bool,
    panic_on_collect: bool,
    collect_delay: Option<Duration>,
}

impl Default for InMemoryPaymentState {
    fn default() -> Self {
        Self {
            payments: HashMap::new(),
            price: DEFAULT_PRICE,
            next_id: 0,
            collect_calls: 0,
            refund_calls: 0,
            fail_on_collect: None,
            fail_on_refund: false,
            panic_on_collect: false,
            collect_delay: None,
        }
    }
}

/// Simulated payment gateway.
///
/// Every token is a pre-authorized charge of a fixed price that can be
/// captured once and refunded once.
#[derive(Debug, Clone, Default)]
pub struct InMemoryPaymentGateway {
    state: Arc<RwLock<InMemoryPaymentState>>,
}

impl InMemoryPaymentGateway {
    /// Creates a gateway charging [`DEFAULT_PRICE`].
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a gateway charging `price` for every collect.
    pub fn with_price(price: Money) -> Self {
        let gateway = Self::default();
        write(&gateway.state).price = price;
        gateway
    }

    /// Makes every collect decline.
    pub fn set_decline(&self, decline: bool) {
        write(&self.state).fail_on_collect =
            decline.then(|| PaymentError::Declined("card declined".to_string()));
    }

    /// Makes every collect fail as if the gateway were down.
    pub fn set_unavailable(&self, unavailable: bool) {
        write(&self.state).fail_on_collect = unavailable
            .then(|| PaymentError::GatewayUnavailable("connection refused".to_string()));
    }

    /// Makes every refund fail.
    pub fn set_fail_on_refund(&self, fail: bool) {
        write(&self.state).fail_on_refund = fail;
    }

    /// Makes collect panic after being called.
    pub fn set_panic_on_collect(&self, panic: bool) {
        write(&self.state).panic_on_collect = panic;
    }

    /// Delays every collect by `delay`.
    pub fn set_collect_delay(&self, delay: Option<Duration>) {
        write(&self.state).collect_delay = delay;
    }

    /// Returns the amount charged per collect.
    pub fn price(&self) -> Money {
        read(&self.state).price
    }

    /// Number of collect calls received, successful or not.
    pub fn collect_calls(&self) -> usize {
        read(&self.state).collect_calls
    }

    /// Number of refund calls received, successful or not.
    pub fn refund_calls(&self) -> usize {
        read(&self.state).refund_calls
    }

    /// Returns the charge held for `token`, if any.
    pub fn payment(&self, token: &str) -> Option<PaymentRecord> {
        read(&self.state).payments.get(token).cloned()
    }

    /// Number of charges currently captured and not refunded.
    pub fn captured_count(&self) -> usize {
        read(&self.state)
            .payments
            .values()
            .filter(|p| p.status == PaymentStatus::Captured)
            .count()
    }
}

#[async_trait]
impl PaymentGateway for InMemoryPaymentGateway {
    async fn collect(&self, token: &str) -> Result<PaymentReceipt, PaymentError> {
        let (delay, panic) = {
            let mut state = write(&self.state);
            state.collect_calls += 1;
            (state.collect_delay, state.panic_on_collect)
        };

        if let Some(delay) = delay {
            tokio::time::sleep(delay).await;
        }
        if panic {
            panic!("payment gateway crashed while collecting");
        }

        let mut state = write(&self.state);
        if let Some(error) = state.fail_on_collect.clone() {
            return Err(error);
        }
        if state.payments.contains_key(token) {
            return Err(PaymentError::Declined(format!(
                "charge for token '{token}' already captured"
            )));
        }

        state.next_id += 1;
        let charge_id = format!("ch_{:06}", state.next_id);
        let amount = state.price;
        state.payments.insert(
            token.to_string(),
            PaymentRecord {
                token: token.to_string(),
                charge_id: charge_id.clone(),
                amount,
                status: PaymentStatus::Captured,
            },
        );

        Ok(PaymentReceipt {
            receipt_url: format!("/receipts/{charge_id}"),
            charge_id,
            amount,
        })
    }

    async fn refund(&self, token: &str) -> Result<RefundConfirmation, PaymentError> {
        let mut state = write(&self.state);
        state.refund_calls += 1;

        if state.fail_on_refund {
            return Err(PaymentError::RefundFailed(
                "gateway rejected refund".to_string(),
            ));
        }

        let payment = state
            .payments
            .get_mut(token)
            .filter(|p| p.status == PaymentStatus::Captured)
            .ok_or_else(|| {
                PaymentError::RefundFailed(format!("no captured charge for token '{token}'"))
            })?;
        payment.status = PaymentStatus::Refunded;

        Ok(RefundConfirmation {
            refund_id: format!("re_{}", &payment.charge_id[3..]),
            amount: payment.amount,
        })
    }
}
