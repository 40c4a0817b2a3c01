use crate::domain::cart::{Cart, CartLine, CartWithItems};
use crate::domain::ids::{Id, IdKind};
use crate::domain::money::{Money, Quantity};
use crate::domain::order::{Order, OrderLine};
use crate::domain::ports::{CartStore, CatalogRef, DocumentTableRef, ReadConsistency};
use crate::error::{IntakeError, Resource, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize, de::DeserializeOwned};
use std::time::Duration;
use uuid::Uuid;

/// Untouched carts are reclaimed after this long.
pub const DEFAULT_CART_RETENTION: Duration = Duration::from_secs(7 * 24 * 60 * 60);

/// Conditional write-backs tried before a contended merge gives up.
const MAX_WRITE_ATTEMPTS: usize = 16;

/// A line embedded in a cart document, with the price captured when the
/// product was first added.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct DocumentLine {
    product_id: i64,
    quantity: Quantity,
    product_name: String,
    product_price: Money,
}

/// One self-contained cart record.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
struct CartDocument {
    cart_id: String,
    customer_id: i64,
    items: Vec<DocumentLine>,
    item_count: u64,
    total_amount: Money,
    created_at: DateTime<Utc>,
    updated_at: DateTime<Utc>,
    /// Unix seconds after which the record counts as reclaimed.
    expiration_time: i64,
}

impl CartDocument {
    fn is_expired(&self, now: DateTime<Utc>) -> bool {
        self.expiration_time <= now.timestamp()
    }

    /// Recomputes the aggregates and pushes the expiry watermark out.
    fn touch(&mut self, now: DateTime<Utc>, retention: Duration) {
        self.item_count = self
            .items
            .iter()
            .map(|line| u64::from(line.quantity.value()))
            .sum();
        self.total_amount = self
            .items
            .iter()
            .map(|line| line.product_price * line.quantity)
            .sum();
        self.updated_at = now;
        self.expiration_time = expiry(now, retention);
    }

    fn to_cart(&self) -> Cart {
        Cart {
            id: Id::Token(self.cart_id.clone()),
            customer_id: self.customer_id,
            created_at: self.created_at,
            updated_at: self.updated_at,
        }
    }

    fn to_cart_with_items(&self) -> CartWithItems {
        let cart = self.to_cart();
        let items = self
            .items
            .iter()
            .zip(1..)
            .map(|(line, position)| CartLine {
                id: position,
                shopping_cart_id: cart.id.clone(),
                product_id: line.product_id,
                product_name: line.product_name.clone(),
                product_price: line.product_price,
                quantity: line.quantity,
                created_at: self.created_at,
                updated_at: self.updated_at,
            })
            .collect();
        CartWithItems { cart, items }
    }
}

fn expiry(now: DateTime<Utc>, retention: Duration) -> i64 {
    let retention = i64::try_from(retention.as_secs()).unwrap_or(i64::MAX);
    now.timestamp().saturating_add(retention)
}

fn encode<T: Serialize>(value: &T) -> Result<Vec<u8>> {
    serde_json::to_vec(value).map_err(|e| IntakeError::BackendError(Box::new(e)))
}

fn decode<T: DeserializeOwned>(bytes: &[u8]) -> Result<T> {
    serde_json::from_slice(bytes).map_err(|e| IntakeError::BackendError(Box::new(e)))
}

/// Cart store keeping one document per cart, keyed by a random token.
///
/// Plain reads use the configured read consistency (eventual by default).
/// Every mutation opens with a strong read, rebuilds the whole document
/// (merged lines, aggregates, timestamps, expiry) and writes it back in one
/// put. Lines carry a price snapshot taken from the catalog at add time.
///
/// Orders live in a second table. See [`DocumentCartStore::checkout`] for
/// the consequences.
pub struct DocumentCartStore {
    carts: DocumentTableRef,
    orders: DocumentTableRef,
    catalog: CatalogRef,
    retention: Duration,
    read_consistency: ReadConsistency,
}

impl DocumentCartStore {
    pub fn new(carts: DocumentTableRef, orders: DocumentTableRef, catalog: CatalogRef) -> Self {
        Self {
            carts,
            orders,
            catalog,
            retention: DEFAULT_CART_RETENTION,
            read_consistency: ReadConsistency::Eventual,
        }
    }

    pub fn with_retention(mut self, retention: Duration) -> Self {
        self.retention = retention;
        self
    }

    /// Consistency used by `get_cart`, `get_cart_with_items` and `get_order`.
    /// Mutations always read strongly.
    pub fn with_read_consistency(mut self, read_consistency: ReadConsistency) -> Self {
        self.read_consistency = read_consistency;
        self
    }

    async fn load(&self, token: &str, consistency: ReadConsistency) -> Result<Option<CartDocument>> {
        let Some(bytes) = self.carts.get(token, consistency).await? else {
            return Ok(None);
        };
        let document: CartDocument = decode(&bytes)?;
        if document.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some(document))
    }

    /// Strong read returning the decoded document together with the exact
    /// bytes it was decoded from, for a conditional write-back.
    async fn load_for_update(&self, token: &str) -> Result<Option<(CartDocument, Vec<u8>)>> {
        let Some(bytes) = self.carts.get(token, ReadConsistency::Strong).await? else {
            return Ok(None);
        };
        let document: CartDocument = decode(&bytes)?;
        if document.is_expired(Utc::now()) {
            return Ok(None);
        }
        Ok(Some((document, bytes)))
    }

    async fn save(&self, document: &CartDocument) -> Result<()> {
        self.carts.put(&document.cart_id, encode(document)?).await
    }

    /// Deletes every expired cart document, returning how many were removed.
    pub async fn reclaim_expired(&self) -> Result<usize> {
        let now = Utc::now();
        let mut reclaimed = 0;
        for key in self.carts.keys().await? {
            let Some(bytes) = self.carts.get(&key, ReadConsistency::Strong).await? else {
                continue;
            };
            let document: CartDocument = match decode(&bytes) {
                Ok(document) => document,
                Err(e) => {
                    tracing::warn!(cart_id = %key, error = %e, "Skipping undecodable cart");
                    continue;
                }
            };
            if document.is_expired(now) && self.carts.delete(&key).await? {
                reclaimed += 1;
            }
        }
        if reclaimed > 0 {
            tracing::info!(reclaimed, "Reclaimed expired carts");
        }
        Ok(reclaimed)
    }
}

#[async_trait]
impl CartStore for DocumentCartStore {
    fn id_kind(&self) -> IdKind {
        IdKind::Token
    }

    async fn create_cart(&self, customer_id: i64) -> Result<Cart> {
        let now = Utc::now();
        let document = CartDocument {
            cart_id: Uuid::new_v4().to_string(),
            customer_id,
            items: Vec::new(),
            item_count: 0,
            total_amount: Money::ZERO,
            created_at: now,
            updated_at: now,
            expiration_time: expiry(now, self.retention),
        };
        self.save(&document).await?;
        tracing::debug!(cart_id = %document.cart_id, customer_id, "Created cart");
        Ok(document.to_cart())
    }

    async fn get_cart(&self, cart_id: &Id) -> Result<Cart> {
        let token = cart_id.as_token()?;
        self.load(token, self.read_consistency)
            .await?
            .map(|document| document.to_cart())
            .ok_or(IntakeError::NotFound(Resource::Cart))
    }

    async fn get_cart_with_items(&self, cart_id: &Id) -> Result<CartWithItems> {
        let token = cart_id.as_token()?;
        self.load(token, self.read_consistency)
            .await?
            .map(|document| document.to_cart_with_items())
            .ok_or(IntakeError::NotFound(Resource::Cart))
    }

    async fn add_or_update_item(
        &self,
        cart_id: &Id,
        product_id: i64,
        quantity: Quantity,
    ) -> Result<()> {
        let token = cart_id.as_token()?;

        for _ in 0..MAX_WRITE_ATTEMPTS {
            let (mut document, current) = self
                .load_for_update(token)
                .await?
                .ok_or(IntakeError::NotFound(Resource::Cart))?;

            match document
                .items
                .iter_mut()
                .find(|line| line.product_id == product_id)
            {
                Some(line) => line.quantity = line.quantity.merge(quantity)?,
                None => {
                    let product = self
                        .catalog
                        .product(product_id)
                        .await?
                        .ok_or(IntakeError::NotFound(Resource::Product))?;
                    document.items.push(DocumentLine {
                        product_id,
                        quantity,
                        product_name: product.name,
                        product_price: product.price,
                    });
                }
            }

            document.touch(Utc::now(), self.retention);
            if self
                .carts
                .put_if_unchanged(token, Some(current.as_slice()), encode(&document)?)
                .await?
            {
                tracing::debug!(cart_id = token, product_id, quantity = quantity.value(), "Merged cart line");
                return Ok(());
            }
            tracing::debug!(cart_id = token, "Cart changed under a merge, retrying");
        }

        Err(IntakeError::backend(format!(
            "cart {token} kept changing; gave up after {MAX_WRITE_ATTEMPTS} attempts"
        )))
    }

    /// Checks a cart out against its snapshot prices.
    ///
    /// # Hazard: non-atomic dual write
    ///
    /// The order record and the cart record live in different tables and no
    /// transaction spans them. The order is written first, then the cart is
    /// deleted. If the delete fails, or the process dies in between, the
    /// order exists while the cart stays live with all its lines, and a retry
    /// produces a second order for the same cart.
    async fn checkout(&self, cart_id: &Id) -> Result<Order> {
        let token = cart_id.as_token()?;
        let document = self
            .load(token, ReadConsistency::Strong)
            .await?
            .ok_or(IntakeError::NotFound(Resource::Cart))?;

        if document.items.is_empty() {
            return Err(IntakeError::EmptyCart);
        }

        let lines = document
            .items
            .iter()
            .map(|line| OrderLine {
                product_id: line.product_id,
                quantity: line.quantity,
                unit_price: line.product_price,
            })
            .collect();
        let order = Order::from_lines(Id::new_token(), document.customer_id, lines);
        let order_key = order.order_id.to_string();

        self.orders.put(&order_key, encode(&order)?).await?;

        if let Err(e) = self.carts.delete(token).await {
            tracing::error!(
                cart_id = token,
                order_id = %order.order_id,
                error = %e,
                "Order recorded but cart deletion failed; cart is still live"
            );
            return Err(e);
        }

        tracing::info!(cart_id = token, order_id = %order.order_id, total = %order.total_amount.value(), "Checked out cart");
        Ok(order)
    }

    async fn get_order(&self, order_id: &Id) -> Result<Order> {
        let token = order_id.as_token()?;
        let bytes = self
            .orders
            .get(token, self.read_consistency)
            .await?
            .ok_or(IntakeError::NotFound(Resource::Order))?;
        decode(&bytes)
    }
}
