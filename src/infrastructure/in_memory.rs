use crate::domain::ports::{Catalog, DocumentTable, ReadConsistency};
use crate::domain::product::Product;
use crate::error::Result;
use async_trait::async_trait;
use std::collections::HashMap;
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, Ordering};
use std::time::Duration;
use tokio::sync::RwLock;

/// A thread-safe in-memory product catalog.
///
/// Uses `Arc<RwLock<HashMap<i64, Product>>>` so clones share the same data.
#[derive(Default, Clone)]
pub struct InMemoryCatalog {
    products: Arc<RwLock<HashMap<i64, Product>>>,
}

impl InMemoryCatalog {
    /// Creates a new, empty catalog.
    pub fn new() -> Self {
        Self::default()
    }

    /// Creates a catalog holding seed products `1..=count`.
    pub fn seeded(count: i64) -> Self {
        let products = (1..=count)
            .map(|id| (id, Product::seeded(id)))
            .collect::<HashMap<_, _>>();
        Self {
            products: Arc::new(RwLock::new(products)),
        }
    }
}

#[async_trait]
impl Catalog for InMemoryCatalog {
    async fn product(&self, product_id: i64) -> Result<Option<Product>> {
        let products = self.products.read().await;
        Ok(products.get(&product_id).cloned())
    }

    async fn upsert(&self, product: Product) -> Result<()> {
        let mut products = self.products.write().await;
        products.insert(product.id, product);
        Ok(())
    }
}

/// A replicated value; `None` marks a deletion.
#[derive(Clone)]
struct Versioned {
    version: u64,
    document: Option<Vec<u8>>,
}

#[derive(Default)]
struct TableState {
    primary: RwLock<HashMap<String, Vec<u8>>>,
    replica: RwLock<HashMap<String, Versioned>>,
    version: AtomicU64,
    replication_lag: Duration,
}

impl TableState {
    async fn apply_to_replica(&self, key: String, update: Versioned) {
        let mut replica = self.replica.write().await;
        let newer = replica
            .get(&key)
            .is_none_or(|current| current.version < update.version);
        if newer {
            replica.insert(key, update);
        }
    }
}

/// An in-memory document table with a primary copy and a lagging read replica.
///
/// Writes land on the primary immediately and reach the replica after the
/// configured replication lag. [`ReadConsistency::Strong`] reads the primary,
/// [`ReadConsistency::Eventual`] reads the replica and may therefore observe
/// stale or missing documents while replication is in flight.
///
/// With the default zero lag both reads agree.
#[derive(Default, Clone)]
pub struct InMemoryDocumentTable {
    state: Arc<TableState>,
}

impl InMemoryDocumentTable {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn with_replication_lag(replication_lag: Duration) -> Self {
        Self {
            state: Arc::new(TableState {
                replication_lag,
                ..TableState::default()
            }),
        }
    }

    /// Number of documents on the primary.
    pub async fn len(&self) -> usize {
        self.state.primary.read().await.len()
    }

    pub async fn is_empty(&self) -> bool {
        self.len().await == 0
    }

    async fn replicate(&self, key: &str, update: Versioned) {
        let lag = self.state.replication_lag;
        if lag.is_zero() {
            self.state.apply_to_replica(key.to_string(), update).await;
            return;
        }

        let state = Arc::clone(&self.state);
        let key = key.to_string();
        tokio::spawn(async move {
            tokio::time::sleep(lag).await;
            state.apply_to_replica(key, update).await;
        });
    }
}

#[async_trait]
impl DocumentTable for InMemoryDocumentTable {
    async fn get(&self, key: &str, consistency: ReadConsistency) -> Result<Option<Vec<u8>>> {
        match consistency {
            ReadConsistency::Strong => {
                let primary = self.state.primary.read().await;
                Ok(primary.get(key).cloned())
            }
            ReadConsistency::Eventual => {
                let replica = self.state.replica.read().await;
                Ok(replica.get(key).and_then(|entry| entry.document.clone()))
            }
        }
    }

    async fn put(&self, key: &str, document: Vec<u8>) -> Result<()> {
        let version = {
            let mut primary = self.state.primary.write().await;
            primary.insert(key.to_string(), document.clone());
            self.state.version.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.replicate(
            key,
            Versioned {
                version,
                document: Some(document),
            },
        )
        .await;
        Ok(())
    }

    async fn put_if_unchanged(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        document: Vec<u8>,
    ) -> Result<bool> {
        let version = {
            let mut primary = self.state.primary.write().await;
            if primary.get(key).map(Vec::as_slice) != expected {
                return Ok(false);
            }
            primary.insert(key.to_string(), document.clone());
            self.state.version.fetch_add(1, Ordering::SeqCst) + 1
        };
        self.replicate(
            key,
            Versioned {
                version,
                document: Some(document),
            },
        )
        .await;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let (existed, version) = {
            let mut primary = self.state.primary.write().await;
            let existed = primary.remove(key).is_some();
            (existed, self.state.version.fetch_add(1, Ordering::SeqCst) + 1)
        };
        self.replicate(
            key,
            Versioned {
                version,
                document: None,
            },
        )
        .await;
        Ok(existed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let primary = self.state.primary.read().await;
        Ok(primary.keys().cloned().collect())
    }
}
