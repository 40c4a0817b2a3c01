use clap::Parser;
use miette::{IntoDiagnostic, Result};
use order_intake::application::capacity::CapacityGate;
use order_intake::application::consumer::QueueConsumer;
use order_intake::application::gateway::OrderGateway;
use order_intake::application::processor::PaymentProcessor;
use order_intake::config::{Cli, Command, Settings, StoreKind};
use order_intake::domain::order::OrderPayload;
use order_intake::domain::ports::{CartStoreRef, CatalogRef, DocumentTableRef};
use order_intake::infrastructure::document::DocumentCartStore;
use order_intake::infrastructure::in_memory::{InMemoryCatalog, InMemoryDocumentTable};
use order_intake::infrastructure::queue::{FanoutTopic, InMemoryQueue};
use order_intake::infrastructure::relational::SqlCartStore;
use order_intake::interfaces::jsonl::reader::JsonLinesReader;
use order_intake::interfaces::jsonl::script::{CartCommand, CartScript};
use order_intake::interfaces::jsonl::writer::JsonLinesWriter;
use std::fs::File;
use std::io::{self, BufReader, IsTerminal};
use std::path::Path;
use std::sync::Arc;
use std::time::Duration;
use tokio::task::JoinSet;
use tokio_util::sync::CancellationToken;
use tracing_subscriber::EnvFilter;

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    init_tracing();
    cli.settings.validate().into_diagnostic()?;

    match cli.command {
        Command::Carts { script } => run_carts(&cli.settings, &script).await,
        Command::Orders {
            input,
            asynchronous,
        } => run_orders(&cli.settings, &input, asynchronous).await,
    }
}

fn init_tracing() {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("order_intake=info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .with_ansi(io::stderr().is_terminal())
        .init();
}

async fn build_store(settings: &Settings) -> Result<(CartStoreRef, CatalogRef)> {
    match settings.store {
        StoreKind::Relational => {
            let store = SqlCartStore::connect(&settings.database_url)
                .await
                .into_diagnostic()?;
            if settings.seed_products > 0 {
                store
                    .seed_products(settings.seed_products)
                    .await
                    .into_diagnostic()?;
            }
            let catalog: CatalogRef = Arc::new(store.catalog());
            let store: CartStoreRef = Arc::new(store);
            Ok((store, catalog))
        }
        StoreKind::Document => {
            let (carts, orders) = open_document_tables(settings)?;
            let catalog: CatalogRef = Arc::new(InMemoryCatalog::seeded(settings.seed_products));
            let store = DocumentCartStore::new(carts, orders, catalog.clone())
                .with_retention(settings.cart_retention());

            store.reclaim_expired().await.into_diagnostic()?;
            let store: CartStoreRef = Arc::new(store);
            Ok((store, catalog))
        }
    }
}

fn open_document_tables(settings: &Settings) -> Result<(DocumentTableRef, DocumentTableRef)> {
    if let Some(path) = &settings.document_db_path {
        #[cfg(feature = "storage-rocksdb")]
        {
            let tables = order_intake::infrastructure::rocksdb::RocksDbTables::open(path)
                .into_diagnostic()?;
            let carts: DocumentTableRef = Arc::new(tables.carts);
            let orders: DocumentTableRef = Arc::new(tables.orders);
            return Ok((carts, orders));
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        tracing::warn!(
            path = %path.display(),
            "Persistent document tables requested via --document-db-path, but 'storage-rocksdb' feature is not enabled. Falling back to in-memory tables."
        );
    }

    let lag = settings.read_replica_lag();
    let carts: DocumentTableRef = Arc::new(InMemoryDocumentTable::with_replication_lag(lag));
    let orders: DocumentTableRef = Arc::new(InMemoryDocumentTable::with_replication_lag(lag));
    Ok((carts, orders))
}

async fn run_carts(settings: &Settings, script_path: &Path) -> Result<()> {
    let file = File::open(script_path).into_diagnostic()?;
    let (store, catalog) = build_store(settings).await?;
    let mut script = CartScript::new(store.clone(), catalog);

    let stdout = io::stdout();
    let mut writer = JsonLinesWriter::new(stdout.lock());
    for (line, command) in JsonLinesReader::new(BufReader::new(file)).records::<CartCommand>() {
        let outcome = match command {
            Ok(command) => script.execute(command).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(result) => writer.write_result(line, &result).into_diagnostic()?,
            Err(e) => {
                tracing::warn!(line, error = %e, "Cart command failed");
                writer.write_error(line, &e).into_diagnostic()?;
            }
        }
    }

    store.close().await;
    Ok(())
}

async fn run_orders(settings: &Settings, input: &Path, asynchronous: bool) -> Result<()> {
    let file = File::open(input).into_diagnostic()?;

    let gate = CapacityGate::new(settings.worker_count).into_diagnostic()?;
    let processor = PaymentProcessor::new(gate, settings.payment_delay());
    let topic = FanoutTopic::new();
    let queue = InMemoryQueue::new(settings.visibility_timeout());
    topic.subscribe(queue.clone()).await;
    let gateway = OrderGateway::new(Arc::new(processor.clone()), Arc::new(topic));
    tracing::info!(
        capacity = settings.worker_count,
        delay_ms = settings.payment_delay_ms,
        asynchronous,
        "Order gateway ready"
    );

    let stdout = io::stdout();
    let mut writer = JsonLinesWriter::new(stdout.lock());
    let lines = JsonLinesReader::new(BufReader::new(file)).lines();

    if !asynchronous {
        let mut submissions = JoinSet::new();
        for (line, raw) in lines {
            let gateway = gateway.clone();
            submissions.spawn(async move {
                let order = match raw.and_then(|raw| OrderPayload::from_json(&raw)) {
                    Ok(order) => order,
                    Err(e) => return (line, Err(e)),
                };
                (line, gateway.submit_sync(order).await)
            });
        }

        let mut outcomes = Vec::new();
        while let Some(joined) = submissions.join_next().await {
            outcomes.push(joined.into_diagnostic()?);
        }
        outcomes.sort_by_key(|(line, _)| *line);
        for (line, outcome) in outcomes {
            match outcome {
                Ok(response) => writer.write_result(line, &response).into_diagnostic()?,
                Err(e) => writer.write_error(line, &e).into_diagnostic()?,
            }
        }
        return Ok(());
    }

    let shutdown = CancellationToken::new();
    let consumer = QueueConsumer::new(
        Arc::new(queue.clone()),
        Arc::new(processor.clone()),
        settings.consumer(),
    );
    let consumer_task = {
        let shutdown = shutdown.clone();
        tokio::spawn(async move { consumer.run(shutdown).await })
    };

    for (line, raw) in lines {
        let outcome = match raw.and_then(|raw| OrderPayload::from_json(&raw)) {
            Ok(order) => gateway.submit_async(order).await,
            Err(e) => Err(e),
        };
        match outcome {
            Ok(response) => writer.write_result(line, &response).into_diagnostic()?,
            Err(e) => writer.write_error(line, &e).into_diagnostic()?,
        }
    }

    while !queue.is_drained().await {
        tokio::time::sleep(Duration::from_millis(50)).await;
    }
    shutdown.cancel();
    consumer_task.await.into_diagnostic()?;
    tracing::info!(
        settled = processor.settled_count().await,
        "All queued orders processed"
    );
    Ok(())
}
