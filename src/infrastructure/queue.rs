use crate::domain::ports::{MessagePublisher, MessageQueue, ReceivedMessage, TopicEnvelope};
use crate::error::{IntakeError, Result};
use async_trait::async_trait;
use std::collections::VecDeque;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::{Mutex, Notify, RwLock};
use tokio::time::Instant;
use uuid::Uuid;

/// Default time a received message stays hidden from other receivers.
pub const DEFAULT_VISIBILITY_TIMEOUT: Duration = Duration::from_secs(30);

#[derive(Debug)]
struct StoredMessage {
    message_id: String,
    body: String,
    receive_count: u32,
    /// Set while the message is in flight.
    lease: Option<Lease>,
}

#[derive(Debug)]
struct Lease {
    receipt_handle: String,
    visible_at: Instant,
}

impl StoredMessage {
    fn is_visible(&self, now: Instant) -> bool {
        self.lease.as_ref().is_none_or(|lease| lease.visible_at <= now)
    }
}

struct QueueState {
    messages: Mutex<VecDeque<StoredMessage>>,
    arrivals: Notify,
    visibility_timeout: Duration,
}

/// An in-memory queue with at-least-once delivery.
///
/// A received message is leased for the visibility timeout. Deleting it with
/// the receipt handle of the current lease removes it; otherwise it becomes
/// visible again once the lease expires and is handed out once more with a
/// fresh receipt handle.
///
/// Clones share the same queue.
#[derive(Clone)]
pub struct InMemoryQueue {
    state: Arc<QueueState>,
}

impl Default for InMemoryQueue {
    fn default() -> Self {
        Self::new(DEFAULT_VISIBILITY_TIMEOUT)
    }
}

impl InMemoryQueue {
    pub fn new(visibility_timeout: Duration) -> Self {
        Self {
            state: Arc::new(QueueState {
                messages: Mutex::new(VecDeque::new()),
                arrivals: Notify::new(),
                visibility_timeout,
            }),
        }
    }

    pub fn visibility_timeout(&self) -> Duration {
        self.state.visibility_timeout
    }

    /// Appends a message and wakes any waiting receivers.
    pub async fn send(&self, message_id: impl Into<String>, body: impl Into<String>) {
        let mut messages = self.state.messages.lock().await;
        messages.push_back(StoredMessage {
            message_id: message_id.into(),
            body: body.into(),
            receive_count: 0,
            lease: None,
        });
        drop(messages);
        self.state.arrivals.notify_waiters();
    }

    /// Messages not yet deleted, in flight or not.
    pub async fn len(&self) -> usize {
        self.state.messages.lock().await.len()
    }

    /// True once every message has been acknowledged.
    pub async fn is_drained(&self) -> bool {
        self.len().await == 0
    }

    /// Messages currently leased to a receiver.
    pub async fn in_flight(&self) -> usize {
        let now = Instant::now();
        let messages = self.state.messages.lock().await;
        messages.iter().filter(|m| !m.is_visible(now)).count()
    }

    /// Leases up to `max` visible messages. When nothing is visible, returns
    /// the instant the earliest lease expires, if any.
    async fn lease_visible(&self, max: usize) -> (Vec<ReceivedMessage>, Option<Instant>) {
        let now = Instant::now();
        let visible_at = now + self.state.visibility_timeout;
        let mut messages = self.state.messages.lock().await;

        let mut received = Vec::new();
        for message in messages.iter_mut().filter(|m| m.is_visible(now)).take(max) {
            let receipt_handle = Uuid::new_v4().to_string();
            message.receive_count += 1;
            message.lease = Some(Lease {
                receipt_handle: receipt_handle.clone(),
                visible_at,
            });
            received.push(ReceivedMessage {
                message_id: message.message_id.clone(),
                receipt_handle,
                body: message.body.clone(),
                receive_count: message.receive_count,
            });
        }

        let next_expiry = messages
            .iter()
            .filter_map(|m| m.lease.as_ref().map(|lease| lease.visible_at))
            .min();
        (received, next_expiry)
    }
}

#[async_trait]
impl MessageQueue for InMemoryQueue {
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<ReceivedMessage>> {
        if max_messages == 0 {
            return Err(IntakeError::validation("max_messages must be at least 1"));
        }
        let deadline = Instant::now() + wait;

        loop {
            // Register interest before looking so a send in between is not missed.
            let arrival = self.state.arrivals.notified();
            tokio::pin!(arrival);
            arrival.as_mut().enable();

            let (received, next_expiry) = self.lease_visible(max_messages).await;
            if !received.is_empty() {
                return Ok(received);
            }
            if Instant::now() >= deadline {
                return Ok(Vec::new());
            }

            let wake_at = next_expiry.map_or(deadline, |expiry| expiry.min(deadline));
            tokio::select! {
                _ = &mut arrival => {}
                _ = tokio::time::sleep_until(wake_at) => {}
            }
        }
    }

    async fn delete(&self, receipt_handle: &str) -> Result<()> {
        let mut messages = self.state.messages.lock().await;
        let position = messages.iter().position(|m| {
            m.lease
                .as_ref()
                .is_some_and(|lease| lease.receipt_handle == receipt_handle)
        });
        match position {
            Some(index) => {
                messages.remove(index);
            }
            None => tracing::debug!(receipt_handle, "Delete with stale receipt handle ignored"),
        }
        Ok(())
    }
}

/// A fan-out topic delivering a copy of every publication to each
/// subscribed queue, wrapped in a [`TopicEnvelope`].
///
/// A publication with no subscribers is accepted and lost.
#[derive(Default, Clone)]
pub struct FanoutTopic {
    subscribers: Arc<RwLock<Vec<InMemoryQueue>>>,
}

impl FanoutTopic {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn subscribe(&self, queue: InMemoryQueue) {
        self.subscribers.write().await.push(queue);
    }

    pub async fn subscriber_count(&self) -> usize {
        self.subscribers.read().await.len()
    }
}

#[async_trait]
impl MessagePublisher for FanoutTopic {
    async fn publish(&self, subject: &str, body: String) -> Result<String> {
        let envelope = TopicEnvelope {
            message_id: Uuid::new_v4().to_string(),
            subject: subject.to_string(),
            message: body,
        };
        let encoded =
            serde_json::to_string(&envelope).map_err(|e| IntakeError::BackendError(Box::new(e)))?;

        let subscribers = self.subscribers.read().await;
        if subscribers.is_empty() {
            tracing::warn!(message_id = %envelope.message_id, subject, "Published with no subscribers");
        }
        for queue in subscribers.iter() {
            queue.send(envelope.message_id.clone(), encoded.clone()).await;
        }

        tracing::debug!(message_id = %envelope.message_id, subject, "Message published");
        Ok(envelope.message_id)
    }
}
