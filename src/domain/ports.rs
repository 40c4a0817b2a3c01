use super::cart::{Cart, CartWithItems};
use super::ids::{Id, IdKind};
use super::money::Quantity;
use super::order::Order;
use super::product::Product;
use crate::error::Result;
use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Cart persistence contract shared by every backend.
///
/// Identifiers are resolved into [`Id`] before they reach a store; a store
/// handed the wrong variant answers with a validation error.
#[async_trait]
pub trait CartStore: Send + Sync {
    /// The identifier shape this store hands out and accepts.
    fn id_kind(&self) -> IdKind;

    async fn create_cart(&self, customer_id: i64) -> Result<Cart>;
    async fn get_cart(&self, cart_id: &Id) -> Result<Cart>;
    async fn get_cart_with_items(&self, cart_id: &Id) -> Result<CartWithItems>;

    /// Inserts a line, or merges into the existing line for the same product
    /// by adding quantities.
    async fn add_or_update_item(
        &self,
        cart_id: &Id,
        product_id: i64,
        quantity: Quantity,
    ) -> Result<()>;

    /// Turns a non-empty cart into an order and empties or removes the cart.
    async fn checkout(&self, cart_id: &Id) -> Result<Order>;

    async fn get_order(&self, order_id: &Id) -> Result<Order>;

    async fn close(&self) {}
}

/// Product lookup used for price resolution.
#[async_trait]
pub trait Catalog: Send + Sync {
    async fn product(&self, product_id: i64) -> Result<Option<Product>>;
    async fn upsert(&self, product: Product) -> Result<()>;
}

/// Read visibility requested from a document table.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum ReadConsistency {
    /// May lag the latest write by a short replication window.
    Eventual,
    /// Reflects every write acknowledged before the read started.
    Strong,
}

/// A key/value table of serialized documents.
///
/// Every write replaces the whole document; there are no partial updates
/// and no transactions across keys or tables.
#[async_trait]
pub trait DocumentTable: Send + Sync {
    async fn get(&self, key: &str, consistency: ReadConsistency) -> Result<Option<Vec<u8>>>;
    async fn put(&self, key: &str, document: Vec<u8>) -> Result<()>;

    /// Conditional write: stores `document` only if the current value still
    /// equals `expected` (`None` meaning absent). Returns `false` and writes
    /// nothing when the condition fails.
    async fn put_if_unchanged(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        document: Vec<u8>,
    ) -> Result<bool>;

    async fn delete(&self, key: &str) -> Result<bool>;
    async fn keys(&self) -> Result<Vec<String>>;
}

/// Publish side of the durable fan-out topic.
#[async_trait]
pub trait MessagePublisher: Send + Sync {
    /// Returns the message id assigned by the topic.
    async fn publish(&self, subject: &str, body: String) -> Result<String>;
}

/// Notification envelope the topic wraps around every published body.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct TopicEnvelope {
    pub message_id: String,
    #[serde(default)]
    pub subject: String,
    pub message: String,
}

/// A message handed out by [`MessageQueue::receive`].
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ReceivedMessage {
    pub message_id: String,
    pub receipt_handle: String,
    pub body: String,
    /// How many times this message has been handed out, this one included.
    pub receive_count: u32,
}

/// Consumer side of a queue subscribed to the topic.
#[async_trait]
pub trait MessageQueue: Send + Sync {
    /// Long-polls for up to `max_messages`, waiting at most `wait` for the
    /// first one. Received messages stay hidden for the visibility timeout.
    async fn receive(&self, max_messages: usize, wait: Duration) -> Result<Vec<ReceivedMessage>>;

    /// Acknowledges a message. A stale receipt handle is not an error.
    async fn delete(&self, receipt_handle: &str) -> Result<()>;
}

pub type CartStoreRef = Arc<dyn CartStore>;
pub type CatalogRef = Arc<dyn Catalog>;
pub type DocumentTableRef = Arc<dyn DocumentTable>;
pub type MessagePublisherRef = Arc<dyn MessagePublisher>;
pub type MessageQueueRef = Arc<dyn MessageQueue>;
