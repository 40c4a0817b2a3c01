use crate::application::consumer::ConsumerConfig;
use crate::error::{IntakeError, Result};
use clap::{Parser, Subcommand, ValueEnum};
use std::path::PathBuf;
use std::time::Duration;

/// Which cart backend to run against.
#[derive(Debug, Clone, Copy, PartialEq, Eq, ValueEnum)]
pub enum StoreKind {
    /// Normalized SQL tables with live catalog pricing.
    #[value(alias = "postgres")]
    Relational,
    /// One document per cart with price snapshots.
    #[value(alias = "dynamodb")]
    Document,
}

#[derive(Debug, Parser)]
#[command(author, version, about = "Order intake: carts, checkout and capacity-bound payments", long_about = None)]
pub struct Cli {
    #[command(subcommand)]
    pub command: Command,

    #[command(flatten)]
    pub settings: Settings,
}

#[derive(Debug, Subcommand)]
pub enum Command {
    /// Run a JSON-lines cart script, one result line per command.
    Carts {
        /// Script file, one command per line
        script: PathBuf,
    },
    /// Submit a JSON-lines file of order payloads.
    Orders {
        /// Order payloads, one per line
        input: PathBuf,

        /// Publish to the queue and let the consumer charge them
        #[arg(long = "async")]
        asynchronous: bool,
    },
}

#[derive(Debug, Clone, clap::Args)]
pub struct Settings {
    /// Cart backend
    #[arg(long, env = "CART_STORE_TYPE", value_enum, default_value = "relational", global = true)]
    pub store: StoreKind,

    /// Connection string of the relational backend
    #[arg(long, env = "DATABASE_URL", default_value = "sqlite::memory:", global = true)]
    pub database_url: String,

    /// Directory for persistent document tables (needs the storage-rocksdb feature)
    #[arg(long, env = "DOCUMENT_DB_PATH", global = true)]
    pub document_db_path: Option<PathBuf>,

    /// Simulated replication lag of eventual reads on in-memory document tables
    #[arg(long, env = "READ_REPLICA_LAG_MS", default_value_t = 0, global = true)]
    pub read_replica_lag_ms: u64,

    /// Hours an untouched document cart lives before it expires
    #[arg(long, env = "CART_RETENTION_HOURS", default_value_t = 168, global = true)]
    pub cart_retention_hours: u64,

    /// Seed products 1..=N into the catalog at startup
    #[arg(long, env = "SEED_PRODUCTS", default_value_t = 1000, global = true)]
    pub seed_products: i64,

    /// Size of the payment capacity gate
    #[arg(long, env = "WORKER_COUNT", default_value_t = 1, global = true)]
    pub worker_count: usize,

    /// Time each payment holds a capacity slot
    #[arg(long, env = "PAYMENT_DELAY_MS", default_value_t = 3000, global = true)]
    pub payment_delay_ms: u64,

    /// Messages taken per queue receive
    #[arg(long, env = "QUEUE_BATCH_SIZE", default_value_t = 10, global = true)]
    pub batch_size: usize,

    /// Long-poll wait per queue receive
    #[arg(long, env = "QUEUE_WAIT_TIME_SECS", default_value_t = 20, global = true)]
    pub wait_time_secs: u64,

    /// Time a received message stays hidden before redelivery
    #[arg(long, env = "QUEUE_VISIBILITY_TIMEOUT_SECS", default_value_t = 30, global = true)]
    pub visibility_timeout_secs: u64,

    /// Pause after a failed queue receive
    #[arg(long, default_value_t = 5, global = true)]
    pub receive_error_backoff_secs: u64,
}

impl Settings {
    /// Rejects values that parse but make no sense.
    pub fn validate(&self) -> Result<()> {
        if self.worker_count == 0 {
            return Err(IntakeError::validation("worker count must be at least 1"));
        }
        if self.batch_size == 0 {
            return Err(IntakeError::validation("queue batch size must be at least 1"));
        }
        if self.seed_products < 0 {
            return Err(IntakeError::validation("seed product count must not be negative"));
        }
        Ok(())
    }

    pub fn payment_delay(&self) -> Duration {
        Duration::from_millis(self.payment_delay_ms)
    }

    pub fn read_replica_lag(&self) -> Duration {
        Duration::from_millis(self.read_replica_lag_ms)
    }

    pub fn cart_retention(&self) -> Duration {
        Duration::from_secs(self.cart_retention_hours.saturating_mul(60 * 60))
    }

    pub fn visibility_timeout(&self) -> Duration {
        Duration::from_secs(self.visibility_timeout_secs)
    }

    pub fn consumer(&self) -> ConsumerConfig {
        ConsumerConfig {
            batch_size: self.batch_size,
            wait_time: Duration::from_secs(self.wait_time_secs),
            receive_error_backoff: Duration::from_secs(self.receive_error_backoff_secs),
        }
    }
}
