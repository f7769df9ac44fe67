use clap::Parser;
use miette::{IntoDiagnostic, Result};
use orderpay::application::engine::TransactionEngine;
use orderpay::config::PaymentConfig;
use orderpay::domain::ports::OrderStoreBox;
use orderpay::infrastructure::clock::SystemClock;
use orderpay::infrastructure::gateways::build_registry;
use orderpay::infrastructure::in_memory::InMemoryOrderStore;
use orderpay::infrastructure::random::ThreadRandom;
use orderpay::interfaces::csv::ledger_writer::LedgerWriter;
use orderpay::interfaces::script::command_reader::CommandReader;
use orderpay::interfaces::script::runner::ScriptRunner;
use std::fs::File;
use std::io::{self, BufReader};
use std::path::PathBuf;
use std::sync::Arc;
use tracing_subscriber::EnvFilter;

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// JSON-lines command script
    script: PathBuf,

    /// Gateway configuration file (JSON). Environment variables override it.
    #[arg(long)]
    config: Option<PathBuf>,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,
}

fn setup_tracing() {
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info"));
    tracing_subscriber::fmt()
        .with_env_filter(filter)
        .with_writer(io::stderr)
        .init();
}

fn open_store(db_path: Option<PathBuf>) -> Result<OrderStoreBox> {
    match db_path {
        #[cfg(feature = "storage-rocksdb")]
        Some(path) => {
            let store = orderpay::infrastructure::rocksdb::RocksDBStore::open(path).into_diagnostic()?;
            Ok(Box::new(store))
        }
        #[cfg(not(feature = "storage-rocksdb"))]
        Some(_) => {
            eprintln!(
                "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
            );
            Ok(Box::new(InMemoryOrderStore::new()))
        }
        None => Ok(Box::new(InMemoryOrderStore::new())),
    }
}

#[tokio::main]
async fn main() -> Result<()> {
    let cli = Cli::parse();
    setup_tracing();

    let config = PaymentConfig::load(cli.config.as_deref()).into_diagnostic()?;
    let clock = Arc::new(SystemClock);
    let registry = build_registry(&config, clock.clone(), Arc::new(ThreadRandom));
    let store = open_store(cli.db_path)?;
    let engine = TransactionEngine::from_config(store, registry, &config, clock);

    // Process commands
    let file = File::open(cli.script).into_diagnostic()?;
    let reader = CommandReader::new(BufReader::new(file));
    let mut runner = ScriptRunner::new(&engine);
    for command in reader.commands() {
        match command {
            Ok(command) => {
                if let Err(e) = runner.run(command).await {
                    eprintln!("Error processing command: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading command: {}", e);
            }
        }
    }

    // Output final state
    let (orders, payments) = runner.ledger().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = LedgerWriter::new(stdout.lock());
    writer.write_ledger(&orders, &payments).into_diagnostic()?;

    Ok(())
}
