pub mod document;
pub mod in_memory;
pub mod queue;
pub mod relational;
#[cfg(feature = "storage-rocksdb")]
pub mod rocksdb;
