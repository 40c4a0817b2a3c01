use crate::application::processor::OrderHandlerRef;
use crate::domain::order::OrderPayload;
use crate::domain::ports::{MessageQueue, MessageQueueRef, ReceivedMessage, TopicEnvelope};
use crate::error::IntakeError;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;

/// Polling parameters of a [`QueueConsumer`].
#[derive(Debug, Clone, Copy)]
pub struct ConsumerConfig {
    /// Upper bound of messages taken per receive.
    pub batch_size: usize,
    /// Long-poll wait per receive.
    pub wait_time: Duration,
    /// Pause after a failed receive.
    pub receive_error_backoff: Duration,
}

impl Default for ConsumerConfig {
    fn default() -> Self {
        Self {
            batch_size: 10,
            wait_time: Duration::from_secs(20),
            receive_error_backoff: Duration::from_secs(5),
        }
    }
}

/// What became of one received message.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum Delivery {
    /// Processed and acknowledged.
    Acked,
    /// Undecodable or invalid, acknowledged without charging.
    Dropped,
    /// Processing failed; left for redelivery.
    Retained,
}

/// Long-polls a queue and hands each order to the handler on its own task.
///
/// A message is deleted after its handler returns `Ok`. Messages that fail
/// to decode, or that the handler rejects as invalid, are deleted without
/// retry. Anything else, a panicking handler included, stays on the queue
/// and comes back after the visibility timeout.
pub struct QueueConsumer {
    queue: MessageQueueRef,
    handler: OrderHandlerRef,
    config: ConsumerConfig,
}

impl QueueConsumer {
    pub fn new(queue: MessageQueueRef, handler: OrderHandlerRef, config: ConsumerConfig) -> Self {
        Self {
            queue,
            handler,
            config,
        }
    }

    /// Runs until `shutdown` fires, then waits for in-flight messages.
    pub async fn run(&self, shutdown: CancellationToken) {
        tracing::info!(
            batch_size = self.config.batch_size,
            wait_secs = self.config.wait_time.as_secs(),
            "Queue consumer started"
        );
        let mut tasks = JoinSet::new();

        loop {
            while let Some(joined) = tasks.try_join_next() {
                log_join(joined);
            }

            let received = tokio::select! {
                _ = shutdown.cancelled() => break,
                received = self.queue.receive(self.config.batch_size, self.config.wait_time) => received,
            };

            match received {
                Ok(messages) => {
                    for message in messages {
                        let queue = self.queue.clone();
                        let handler = self.handler.clone();
                        tasks.spawn(process_message(queue, handler, message));
                    }
                }
                Err(e) => {
                    tracing::error!(error = %e, "Failed to receive messages");
                    tokio::select! {
                        _ = shutdown.cancelled() => break,
                        _ = tokio::time::sleep(self.config.receive_error_backoff) => {}
                    }
                }
            }
        }

        while let Some(joined) = tasks.join_next().await {
            log_join(joined);
        }
        tracing::info!("Queue consumer stopped");
    }
}

fn log_join(joined: Result<Delivery, tokio::task::JoinError>) {
    if let Err(e) = joined {
        tracing::error!(error = %e, "Order processing task aborted; message left for redelivery");
    }
}

fn decode(message: &ReceivedMessage) -> crate::error::Result<OrderPayload> {
    let envelope: TopicEnvelope = serde_json::from_str(&message.body).map_err(|e| {
        IntakeError::validation(format!("invalid message envelope: {e}"))
    })?;
    OrderPayload::from_json(&envelope.message)
}

/// Handles one message end to end.
pub async fn process_message(
    queue: MessageQueueRef,
    handler: OrderHandlerRef,
    message: ReceivedMessage,
) -> Delivery {
    let order = match decode(&message) {
        Ok(order) => order,
        Err(e) => {
            tracing::warn!(message_id = %message.message_id, error = %e, "Dropping undecodable message");
            return drop_message(queue.as_ref(), &message).await;
        }
    };

    tracing::debug!(
        message_id = %message.message_id,
        order_id = %order.order_id,
        receive_count = message.receive_count,
        "Processing queued order"
    );

    match handler.handle(&order).await {
        Ok(_) => match queue.delete(&message.receipt_handle).await {
            Ok(()) => Delivery::Acked,
            Err(e) => {
                tracing::error!(order_id = %order.order_id, error = %e, "Failed to delete processed message");
                Delivery::Retained
            }
        },
        Err(e @ IntakeError::ValidationError(_)) => {
            tracing::warn!(order_id = %order.order_id, error = %e, "Dropping invalid order");
            drop_message(queue.as_ref(), &message).await
        }
        Err(e) => {
            tracing::error!(order_id = %order.order_id, error = %e, "Order processing failed");
            Delivery::Retained
        }
    }
}

async fn drop_message(queue: &dyn MessageQueue, message: &ReceivedMessage) -> Delivery {
    if let Err(e) = queue.delete(&message.receipt_handle).await {
        tracing::error!(message_id = %message.message_id, error = %e, "Failed to delete message");
    }
    Delivery::Dropped
}
