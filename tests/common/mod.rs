#![allow(dead_code)]

use order_intake::domain::order::OrderPayload;
use order_intake::infrastructure::document::DocumentCartStore;
use order_intake::infrastructure::in_memory::{InMemoryCatalog, InMemoryDocumentTable};
use order_intake::infrastructure::relational::SqlCartStore;
use std::fs::File;
use std::io::{Error, Write};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;

pub const SEEDED_PRODUCTS: i64 = 100;

pub async fn relational_store() -> SqlCartStore {
    let store = SqlCartStore::connect("sqlite::memory:").await.unwrap();
    store.seed_products(SEEDED_PRODUCTS).await.unwrap();
    store
}

pub struct DocumentFixture {
    pub store: DocumentCartStore,
    pub catalog: InMemoryCatalog,
    pub carts: InMemoryDocumentTable,
    pub orders: InMemoryDocumentTable,
}

pub fn document_store(replica_lag: Duration) -> DocumentFixture {
    let catalog = InMemoryCatalog::seeded(SEEDED_PRODUCTS);
    let carts = InMemoryDocumentTable::with_replication_lag(replica_lag);
    let orders = InMemoryDocumentTable::with_replication_lag(replica_lag);
    let store = DocumentCartStore::new(
        Arc::new(carts.clone()),
        Arc::new(orders.clone()),
        Arc::new(catalog.clone()),
    );
    DocumentFixture {
        store,
        catalog,
        carts,
        orders,
    }
}

pub fn order_json(order_id: &str) -> String {
    format!(
        r#"{{"order_id":"{order_id}","customer_id":42,"items":[{{"product_id":"7","quantity":2,"price":8.07}}]}}"#
    )
}

pub fn order_payload(order_id: &str) -> OrderPayload {
    OrderPayload::from_json(&order_json(order_id)).unwrap()
}

pub fn write_lines(path: &Path, lines: &[String]) -> Result<(), Error> {
    let mut file = File::create(path)?;
    for line in lines {
        writeln!(file, "{line}")?;
    }
    file.flush()?;
    Ok(())
}
