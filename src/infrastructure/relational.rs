use crate::domain::cart::{Cart, CartLine, CartWithItems};
use crate::domain::ids::{Id, IdKind};
use crate::domain::money::{Money, Quantity};
use crate::domain::order::{Order, OrderLine, OrderStatus};
use crate::domain::ports::{CartStore, Catalog};
use crate::domain::product::Product;
use crate::error::{IntakeError, Resource, Result};
use async_trait::async_trait;
use chrono::{DateTime, Utc};
use rust_decimal::Decimal;
use sqlx::migrate::Migrator;
use sqlx::sqlite::{
    SqliteConnectOptions, SqliteJournalMode, SqlitePool, SqlitePoolOptions, SqliteSynchronous,
};
use sqlx::{Executor, Sqlite};
use std::str::FromStr;
use std::time::Duration;

static MIGRATOR: Migrator = sqlx::migrate!("./migrations");

/// Connections kept by a file-backed pool.
const MAX_CONNECTIONS: u32 = 5;

type CartRow = (i64, i64, DateTime<Utc>, DateTime<Utc>);
type LineRow = (i64, i64, i64, DateTime<Utc>, DateTime<Utc>, String, String);

/// Normalized, transactional cart store over SQL.
///
/// Carts, cart lines and orders are separate tables; product names and
/// prices are joined from `products` whenever a cart is read or checked out,
/// so checkout always charges the current catalog price.
///
/// `Clone` shares the underlying pool.
#[derive(Clone)]
pub struct SqlCartStore {
    pool: SqlitePool,
}

impl SqlCartStore {
    /// Opens the database at `database_url` and applies the schema.
    ///
    /// `sqlite::memory:` gives every connection its own database, so an
    /// in-memory store runs on exactly one long-lived connection.
    pub async fn connect(database_url: &str) -> Result<Self> {
        let options = SqliteConnectOptions::from_str(database_url)?
            .create_if_missing(true)
            .foreign_keys(true)
            .busy_timeout(Duration::from_secs(5));

        let pool = if is_in_memory(database_url) {
            SqlitePoolOptions::new()
                .max_connections(1)
                .min_connections(1)
                .idle_timeout(None)
                .max_lifetime(None)
                .connect_with(options)
                .await?
        } else {
            SqlitePoolOptions::new()
                .max_connections(MAX_CONNECTIONS)
                .connect_with(
                    options
                        .journal_mode(SqliteJournalMode::Wal)
                        .synchronous(SqliteSynchronous::Normal),
                )
                .await?
        };

        MIGRATOR.run(&pool).await?;
        tracing::info!(database_url, "Relational cart store ready");

        Ok(Self { pool })
    }

    pub fn catalog(&self) -> SqlCatalog {
        SqlCatalog {
            pool: self.pool.clone(),
        }
    }

    /// Inserts seed products `1..=count`, leaving existing rows alone.
    pub async fn seed_products(&self, count: i64) -> Result<()> {
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;
        for id in 1..=count {
            let product = Product::seeded(id);
            sqlx::query(
                r#"
                INSERT INTO products (id, name, price, created_at, updated_at)
                VALUES (?, ?, ?, ?, ?)
                ON CONFLICT (id) DO NOTHING
                "#,
            )
            .bind(product.id)
            .bind(&product.name)
            .bind(product.price.value().to_string())
            .bind(now)
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }
        tx.commit().await?;
        tracing::info!(count, "Seeded product catalog");
        Ok(())
    }
}

fn is_in_memory(database_url: &str) -> bool {
    database_url.contains(":memory:") || database_url.contains("mode=memory")
}

fn parse_money(raw: &str) -> Result<Money> {
    Decimal::from_str(raw)
        .map(Money::new)
        .map_err(|e| IntakeError::backend(format!("corrupt decimal '{raw}': {e}")))
}

fn stored_quantity(raw: i64) -> Result<Quantity> {
    Quantity::new(raw).map_err(|_| IntakeError::backend(format!("corrupt quantity {raw}")))
}

fn cart_from_row((id, customer_id, created_at, updated_at): CartRow) -> Cart {
    Cart {
        id: Id::Numeric(id),
        customer_id,
        created_at,
        updated_at,
    }
}

async fn fetch_cart<'e, E>(executor: E, cart_id: i64) -> Result<Option<Cart>>
where
    E: Executor<'e, Database = Sqlite>,
{
    let row: Option<CartRow> = sqlx::query_as(
        r#"
        SELECT id, customer_id, created_at, updated_at
        FROM shopping_carts
        WHERE id = ?
        "#,
    )
    .bind(cart_id)
    .fetch_optional(executor)
    .await?;

    Ok(row.map(cart_from_row))
}

#[async_trait]
impl CartStore for SqlCartStore {
    fn id_kind(&self) -> IdKind {
        IdKind::Numeric
    }

    async fn create_cart(&self, customer_id: i64) -> Result<Cart> {
        let now = Utc::now();
        let row: CartRow = sqlx::query_as(
            r#"
            INSERT INTO shopping_carts (customer_id, created_at, updated_at)
            VALUES (?, ?, ?)
            RETURNING id, customer_id, created_at, updated_at
            "#,
        )
        .bind(customer_id)
        .bind(now)
        .bind(now)
        .fetch_one(&self.pool)
        .await?;

        let cart = cart_from_row(row);
        tracing::debug!(cart_id = %cart.id, customer_id, "Created cart");
        Ok(cart)
    }

    async fn get_cart(&self, cart_id: &Id) -> Result<Cart> {
        let cart_id = cart_id.as_numeric()?;
        fetch_cart(&self.pool, cart_id)
            .await?
            .ok_or(IntakeError::NotFound(Resource::Cart))
    }

    async fn get_cart_with_items(&self, cart_id: &Id) -> Result<CartWithItems> {
        let cart_id = cart_id.as_numeric()?;

        // Cart and lines are read inside one transaction so they come from the
        // same snapshot.
        let mut tx = self.pool.begin().await?;
        let cart = fetch_cart(&mut *tx, cart_id)
            .await?
            .ok_or(IntakeError::NotFound(Resource::Cart))?;

        let rows: Vec<LineRow> = sqlx::query_as(
            r#"
            SELECT
                ci.id,
                ci.product_id,
                ci.quantity,
                ci.created_at,
                ci.updated_at,
                COALESCE(p.name, ''),
                COALESCE(p.price, '0')
            FROM cart_items ci
            LEFT JOIN products p ON ci.product_id = p.id
            WHERE ci.shopping_cart_id = ?
            ORDER BY ci.created_at ASC, ci.id ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let items = rows
            .into_iter()
            .map(
                |(id, product_id, quantity, created_at, updated_at, name, price)| -> Result<CartLine> {
                    Ok(CartLine {
                        id,
                        shopping_cart_id: cart.id.clone(),
                        product_id,
                        product_name: name,
                        product_price: parse_money(&price)?,
                        quantity: stored_quantity(quantity)?,
                        created_at,
                        updated_at,
                    })
                },
            )
            .collect::<Result<Vec<_>>>()?;

        Ok(CartWithItems { cart, items })
    }

    async fn add_or_update_item(
        &self,
        cart_id: &Id,
        product_id: i64,
        quantity: Quantity,
    ) -> Result<()> {
        let cart_id = cart_id.as_numeric()?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        // Touching the cart first both proves it exists and takes the write
        // lock for the rest of the transaction.
        let touched = sqlx::query("UPDATE shopping_carts SET updated_at = ? WHERE id = ?")
            .bind(now)
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;
        if touched.rows_affected() == 0 {
            return Err(IntakeError::NotFound(Resource::Cart));
        }

        let product: Option<(i64,)> = sqlx::query_as("SELECT id FROM products WHERE id = ?")
            .bind(product_id)
            .fetch_optional(&mut *tx)
            .await?;
        if product.is_none() {
            return Err(IntakeError::NotFound(Resource::Product));
        }

        // A merge that would overflow the line quantity leaves the row alone.
        let merged = sqlx::query(
            r#"
            INSERT INTO cart_items (shopping_cart_id, product_id, quantity, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (shopping_cart_id, product_id)
            DO UPDATE SET
                quantity = cart_items.quantity + excluded.quantity,
                updated_at = excluded.updated_at
            WHERE cart_items.quantity + excluded.quantity <= ?
            "#,
        )
        .bind(cart_id)
        .bind(product_id)
        .bind(i64::from(quantity))
        .bind(now)
        .bind(now)
        .bind(i64::from(Quantity::MAX))
        .execute(&mut *tx)
        .await?;
        if merged.rows_affected() == 0 {
            return Err(IntakeError::validation("quantity is too large"));
        }

        tx.commit().await?;
        tracing::debug!(cart_id, product_id, quantity = quantity.value(), "Merged cart line");
        Ok(())
    }

    async fn checkout(&self, cart_id: &Id) -> Result<Order> {
        let cart_id = cart_id.as_numeric()?;
        let now = Utc::now();
        let mut tx = self.pool.begin().await?;

        let customer: Option<(i64,)> = sqlx::query_as(
            "UPDATE shopping_carts SET updated_at = ? WHERE id = ? RETURNING customer_id",
        )
        .bind(now)
        .bind(cart_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((customer_id,)) = customer else {
            return Err(IntakeError::NotFound(Resource::Cart));
        };

        // Prices come from the catalog as it is right now, not from add time.
        let rows: Vec<(i64, i64, String)> = sqlx::query_as(
            r#"
            SELECT ci.product_id, ci.quantity, p.price
            FROM cart_items ci
            JOIN products p ON ci.product_id = p.id
            WHERE ci.shopping_cart_id = ?
            ORDER BY ci.id ASC
            "#,
        )
        .bind(cart_id)
        .fetch_all(&mut *tx)
        .await?;

        if rows.is_empty() {
            // Dropping `tx` rolls back the timestamp touch.
            return Err(IntakeError::EmptyCart);
        }

        let lines = rows
            .into_iter()
            .map(|(product_id, quantity, price)| -> Result<OrderLine> {
                Ok(OrderLine {
                    product_id,
                    quantity: stored_quantity(quantity)?,
                    unit_price: parse_money(&price)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        let mut order = Order::from_lines(Id::Numeric(0), customer_id, lines);
        order.created_at = now;

        let (order_id,): (i64,) = sqlx::query_as(
            r#"
            INSERT INTO orders (customer_id, status, total_amount, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            RETURNING id
            "#,
        )
        .bind(customer_id)
        .bind(order.status.as_str())
        .bind(order.total_amount.value().to_string())
        .bind(now)
        .bind(now)
        .fetch_one(&mut *tx)
        .await?;
        order.order_id = Id::Numeric(order_id);

        for line in &order.items {
            sqlx::query(
                r#"
                INSERT INTO order_items (order_id, product_id, quantity, price, created_at)
                VALUES (?, ?, ?, ?, ?)
                "#,
            )
            .bind(order_id)
            .bind(line.product_id)
            .bind(i64::from(line.quantity))
            .bind(line.unit_price.value().to_string())
            .bind(now)
            .execute(&mut *tx)
            .await?;
        }

        // The cart row stays behind as an empty shell.
        sqlx::query("DELETE FROM cart_items WHERE shopping_cart_id = ?")
            .bind(cart_id)
            .execute(&mut *tx)
            .await?;

        tx.commit().await?;
        tracing::info!(cart_id, order_id, total = %order.total_amount.value(), "Checked out cart");
        Ok(order)
    }

    async fn get_order(&self, order_id: &Id) -> Result<Order> {
        let order_id = order_id.as_numeric()?;
        let mut tx = self.pool.begin().await?;

        let row: Option<(i64, String, String, DateTime<Utc>)> = sqlx::query_as(
            "SELECT customer_id, status, total_amount, created_at FROM orders WHERE id = ?",
        )
        .bind(order_id)
        .fetch_optional(&mut *tx)
        .await?;
        let Some((customer_id, status, total_amount, created_at)) = row else {
            return Err(IntakeError::NotFound(Resource::Order));
        };

        let items: Vec<(i64, i64, String)> = sqlx::query_as(
            "SELECT product_id, quantity, price FROM order_items WHERE order_id = ? ORDER BY id ASC",
        )
        .bind(order_id)
        .fetch_all(&mut *tx)
        .await?;
        tx.commit().await?;

        let status = OrderStatus::parse(&status)
            .ok_or_else(|| IntakeError::backend(format!("unknown order status '{status}'")))?;
        let items = items
            .into_iter()
            .map(|(product_id, quantity, price)| -> Result<OrderLine> {
                Ok(OrderLine {
                    product_id,
                    quantity: stored_quantity(quantity)?,
                    unit_price: parse_money(&price)?,
                })
            })
            .collect::<Result<Vec<_>>>()?;

        Ok(Order {
            order_id: Id::Numeric(order_id),
            customer_id,
            status,
            items,
            total_amount: parse_money(&total_amount)?,
            created_at,
        })
    }

    async fn close(&self) {
        self.pool.close().await;
    }
}

/// The `products` table seen through the [`Catalog`] port.
#[derive(Clone)]
pub struct SqlCatalog {
    pool: SqlitePool,
}

#[async_trait]
impl Catalog for SqlCatalog {
    async fn product(&self, product_id: i64) -> Result<Option<Product>> {
        let row: Option<(i64, String, String)> =
            sqlx::query_as("SELECT id, name, price FROM products WHERE id = ?")
                .bind(product_id)
                .fetch_optional(&self.pool)
                .await?;

        row.map(|(id, name, price)| -> Result<Product> {
            Ok(Product::new(id, name, parse_money(&price)?))
        })
        .transpose()
    }

    async fn upsert(&self, product: Product) -> Result<()> {
        let now = Utc::now();
        sqlx::query(
            r#"
            INSERT INTO products (id, name, price, created_at, updated_at)
            VALUES (?, ?, ?, ?, ?)
            ON CONFLICT (id) DO UPDATE SET
                name = excluded.name,
                price = excluded.price,
                updated_at = excluded.updated_at
            "#,
        )
        .bind(product.id)
        .bind(&product.name)
        .bind(product.price.value().to_string())
        .bind(now)
        .bind(now)
        .execute(&self.pool)
        .await?;
        Ok(())
    }
}
