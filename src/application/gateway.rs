use crate::application::processor::OrderHandlerRef;
use crate::domain::order::{OrderPayload, OrderResponse, QueuedResponse};
use crate::domain::ports::MessagePublisherRef;
use crate::domain::submission::{Submission, SubmissionState};
use crate::error::Result;

/// Entry point for directly submitted orders.
///
/// The synchronous path runs the handler inline and answers only after the
/// payment completes. The asynchronous path validates, publishes the payload
/// and answers right away; the queue consumer charges it later through the
/// same capacity gate.
#[derive(Clone)]
pub struct OrderGateway {
    handler: OrderHandlerRef,
    publisher: MessagePublisherRef,
}

impl OrderGateway {
    pub fn new(handler: OrderHandlerRef, publisher: MessagePublisherRef) -> Self {
        Self { handler, publisher }
    }

    /// Blocks until the order is charged. There is no timeout on the wait
    /// for capacity.
    pub async fn submit_sync(&self, order: OrderPayload) -> Result<OrderResponse> {
        let receipt = self.handler.handle(&order).await?;
        Ok(OrderResponse {
            order_id: receipt.order_id,
            status: "completed".to_string(),
            processing_time: format!("{:.3?}", receipt.processing_time),
            message: "Order processed successfully".to_string(),
        })
    }

    /// Returns once the payload is handed to the topic.
    pub async fn submit_async(&self, order: OrderPayload) -> Result<QueuedResponse> {
        let mut submission = Submission::received(order.order_id.clone());
        if let Err(e) = order.validate() {
            submission.advance(SubmissionState::Failed)?;
            tracing::warn!(order_id = %order.order_id, error = %e, "Order rejected");
            return Err(e);
        }
        submission.advance(SubmissionState::Validated)?;

        let subject = format!("Order {}", order.order_id);
        let message_id = self.publisher.publish(&subject, order.to_json()?).await?;
        tracing::info!(order_id = %order.order_id, message_id = %message_id, "Order queued");

        Ok(QueuedResponse {
            order_id: order.order_id,
            status: "queued".to_string(),
            message: "Order queued for processing".to_string(),
        })
    }
}
