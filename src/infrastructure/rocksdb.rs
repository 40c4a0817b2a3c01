use crate::domain::ports::{DocumentTable, ReadConsistency};
use crate::error::{IntakeError, Result};
use async_trait::async_trait;
use rocksdb::{ColumnFamilyDescriptor, DB, IteratorMode, Options};
use std::path::Path;
use std::sync::Arc;
use tokio::sync::Mutex;

/// Column Family holding cart documents.
pub const CF_CARTS: &str = "carts";
/// Column Family holding order documents.
pub const CF_ORDERS: &str = "orders";

/// A persistent document table backed by one RocksDB Column Family.
///
/// A single RocksDB instance has no replicas, so strong and eventual reads
/// behave the same here.
///
/// This struct is thread-safe (`Clone` shares the underlying `Arc<DB>`).
#[derive(Clone)]
pub struct RocksDbDocumentTable {
    db: Arc<DB>,
    cf: &'static str,
    /// Serializes conditional writes; RocksDB has no compare-and-set.
    conditional: Arc<Mutex<()>>,
}

/// The cart and order tables of one RocksDB instance.
pub struct RocksDbTables {
    pub carts: RocksDbDocumentTable,
    pub orders: RocksDbDocumentTable,
}

impl RocksDbTables {
    /// Opens or creates a RocksDB instance at the specified path.
    ///
    /// Ensures that the "carts" and "orders" column families exist.
    pub fn open<P: AsRef<Path>>(path: P) -> Result<Self> {
        let mut opts = Options::default();
        opts.create_if_missing(true);
        opts.create_missing_column_families(true);

        let cf_carts = ColumnFamilyDescriptor::new(CF_CARTS, Options::default());
        let cf_orders = ColumnFamilyDescriptor::new(CF_ORDERS, Options::default());

        let db = Arc::new(DB::open_cf_descriptors(&opts, path, vec![cf_carts, cf_orders])?);
        tracing::info!("Opened RocksDB document tables");

        let conditional = Arc::new(Mutex::new(()));
        Ok(Self {
            carts: RocksDbDocumentTable {
                db: Arc::clone(&db),
                cf: CF_CARTS,
                conditional: Arc::clone(&conditional),
            },
            orders: RocksDbDocumentTable {
                db,
                cf: CF_ORDERS,
                conditional,
            },
        })
    }
}

impl RocksDbDocumentTable {
    fn missing_cf(&self) -> IntakeError {
        IntakeError::backend(format!("{} column family not found", self.cf))
    }
}

#[async_trait]
impl DocumentTable for RocksDbDocumentTable {
    async fn get(&self, key: &str, _consistency: ReadConsistency) -> Result<Option<Vec<u8>>> {
        let cf = self.db.cf_handle(self.cf).ok_or_else(|| self.missing_cf())?;
        Ok(self.db.get_cf(&cf, key.as_bytes())?)
    }

    async fn put(&self, key: &str, document: Vec<u8>) -> Result<()> {
        let _guard = self.conditional.lock().await;
        let cf = self.db.cf_handle(self.cf).ok_or_else(|| self.missing_cf())?;
        self.db.put_cf(&cf, key.as_bytes(), document)?;
        Ok(())
    }

    async fn put_if_unchanged(
        &self,
        key: &str,
        expected: Option<&[u8]>,
        document: Vec<u8>,
    ) -> Result<bool> {
        let _guard = self.conditional.lock().await;
        let cf = self.db.cf_handle(self.cf).ok_or_else(|| self.missing_cf())?;
        let current = self.db.get_pinned_cf(&cf, key.as_bytes())?;
        if current.as_deref() != expected {
            return Ok(false);
        }
        self.db.put_cf(&cf, key.as_bytes(), document)?;
        Ok(true)
    }

    async fn delete(&self, key: &str) -> Result<bool> {
        let _guard = self.conditional.lock().await;
        let cf = self.db.cf_handle(self.cf).ok_or_else(|| self.missing_cf())?;
        // Just check if the key exists without copying the value
        let existed = self.db.get_pinned_cf(&cf, key.as_bytes())?.is_some();
        self.db.delete_cf(&cf, key.as_bytes())?;
        Ok(existed)
    }

    async fn keys(&self) -> Result<Vec<String>> {
        let cf = self.db.cf_handle(self.cf).ok_or_else(|| self.missing_cf())?;

        let mut keys = Vec::new();
        for item in self.db.iterator_cf(&cf, IteratorMode::Start) {
            let (key, _value) = item?;
            let key = String::from_utf8(key.into_vec())
                .map_err(|e| IntakeError::BackendError(Box::new(e)))?;
            keys.push(key);
        }
        Ok(keys)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use tempfile::tempdir;

    #[tokio::test]
    async fn test_rocksdb_open_cf() {
        let dir = tempdir().unwrap();
        let tables = RocksDbTables::open(dir.path()).expect("Failed to open RocksDB");

        assert!(tables.carts.db.cf_handle(CF_CARTS).is_some());
        assert!(tables.orders.db.cf_handle(CF_ORDERS).is_some());
    }

    #[tokio::test]
    async fn test_rocksdb_tables_are_separate() {
        let dir = tempdir().unwrap();
        let tables = RocksDbTables::open(dir.path()).unwrap();

        tables.carts.put("k", b"cart".to_vec()).await.unwrap();
        tables.orders.put("k", b"order".to_vec()).await.unwrap();

        assert_eq!(
            tables.carts.get("k", ReadConsistency::Eventual).await.unwrap(),
            Some(b"cart".to_vec())
        );
        assert_eq!(
            tables.orders.get("k", ReadConsistency::Strong).await.unwrap(),
            Some(b"order".to_vec())
        );
        assert_eq!(tables.carts.keys().await.unwrap(), vec!["k".to_string()]);

        assert!(tables.carts.delete("k").await.unwrap());
        assert!(!tables.carts.delete("k").await.unwrap());
        assert!(tables.orders.get("k", ReadConsistency::Strong).await.unwrap().is_some());

        assert!(tables.carts.put_if_unchanged("k", None, b"v1".to_vec()).await.unwrap());
        assert!(!tables.carts.put_if_unchanged("k", None, b"v2".to_vec()).await.unwrap());
        assert!(
            tables
                .carts
                .put_if_unchanged("k", Some(&b"v1"[..]), b"v2".to_vec())
                .await
                .unwrap()
        );
    }
}
