use crate::application::capacity::CapacityGate;
use crate::domain::money::Money;
use crate::domain::order::OrderPayload;
use crate::domain::submission::{Submission, SubmissionState};
use crate::error::Result;
use async_trait::async_trait;
use serde::Serialize;
use std::collections::{HashMap, HashSet};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::RwLock;
use tokio::time::Instant;

/// Default time a simulated payment holds its capacity slot.
pub const DEFAULT_PAYMENT_DELAY: Duration = Duration::from_secs(3);

/// Outcome of one processed order.
#[derive(Debug, Clone, Serialize)]
pub struct PaymentReceipt {
    pub order_id: String,
    pub amount: Money,
    /// Wall time from receipt to completion, capacity wait included.
    pub processing_time: Duration,
    /// True when the order had already been settled by an earlier delivery.
    pub duplicate: bool,
    pub states: Vec<SubmissionState>,
}

/// Something that can take an order payload to completion.
///
/// Both the synchronous gateway path and the queue consumer go through this
/// trait; handlers must tolerate being called more than once for the same
/// order.
#[async_trait]
pub trait OrderHandler: Send + Sync {
    async fn handle(&self, order: &OrderPayload) -> Result<PaymentReceipt>;
}

pub type OrderHandlerRef = Arc<dyn OrderHandler>;

#[derive(Default)]
struct Ledger {
    attempts: HashMap<String, u32>,
    settled: HashSet<String>,
    settlements: HashMap<String, u32>,
}

/// The fixed-delay payment simulator.
///
/// Each charge holds one [`CapacityGate`] slot for the configured delay. A
/// ledger of settled order ids makes redelivered orders a no-op.
#[derive(Clone)]
pub struct PaymentProcessor {
    gate: CapacityGate,
    delay: Duration,
    ledger: Arc<RwLock<Ledger>>,
}

impl PaymentProcessor {
    pub fn new(gate: CapacityGate, delay: Duration) -> Self {
        Self {
            gate,
            delay,
            ledger: Arc::new(RwLock::new(Ledger::default())),
        }
    }

    pub fn gate(&self) -> &CapacityGate {
        &self.gate
    }

    /// Validates and charges an order, waiting for capacity as long as it takes.
    pub async fn process(&self, order: &OrderPayload) -> Result<PaymentReceipt> {
        let started = Instant::now();
        let mut submission = Submission::received(order.order_id.clone());

        if let Err(e) = order.validate() {
            submission.advance(SubmissionState::Failed)?;
            tracing::warn!(order_id = %order.order_id, error = %e, "Order rejected");
            return Err(e);
        }
        submission.advance(SubmissionState::Validated)?;

        let duplicate = {
            let mut ledger = self.ledger.write().await;
            *ledger.attempts.entry(order.order_id.clone()).or_default() += 1;
            ledger.settled.contains(&order.order_id)
        };
        if duplicate {
            tracing::info!(order_id = %order.order_id, "Order already settled, skipping charge");
            return Ok(PaymentReceipt {
                order_id: order.order_id.clone(),
                amount: order.total(),
                processing_time: started.elapsed(),
                duplicate: true,
                states: submission.history().to_vec(),
            });
        }

        submission.advance(SubmissionState::AwaitingCapacity)?;
        let permit = self.gate.acquire().await;
        submission.advance(SubmissionState::Processing)?;

        tokio::time::sleep(self.delay).await;
        let first_settlement = self.settle(&order.order_id).await;
        drop(permit);

        submission.advance(SubmissionState::Completed)?;
        let processing_time = started.elapsed();
        tracing::info!(
            order_id = %order.order_id,
            amount = %order.total(),
            elapsed = ?processing_time,
            "Payment processed"
        );

        Ok(PaymentReceipt {
            order_id: order.order_id.clone(),
            amount: order.total(),
            processing_time,
            duplicate: !first_settlement,
            states: submission.history().to_vec(),
        })
    }

    /// Records a settlement; returns false if the order was settled already.
    async fn settle(&self, order_id: &str) -> bool {
        let mut ledger = self.ledger.write().await;
        if !ledger.settled.insert(order_id.to_string()) {
            tracing::warn!(order_id, "Concurrent delivery finished after settlement");
            return false;
        }
        *ledger.settlements.entry(order_id.to_string()).or_default() += 1;
        true
    }

    /// How many times `order_id` has been handed to the processor.
    pub async fn attempts(&self, order_id: &str) -> u32 {
        let ledger = self.ledger.read().await;
        ledger.attempts.get(order_id).copied().unwrap_or(0)
    }

    /// How many times `order_id` was actually charged. Never more than one.
    pub async fn settlements(&self, order_id: &str) -> u32 {
        let ledger = self.ledger.read().await;
        ledger.settlements.get(order_id).copied().unwrap_or(0)
    }

    pub async fn settled_count(&self) -> usize {
        self.ledger.read().await.settled.len()
    }
}

#[async_trait]
impl OrderHandler for PaymentProcessor {
    async fn handle(&self, order: &OrderPayload) -> Result<PaymentReceipt> {
        self.process(order).await
    }
}
