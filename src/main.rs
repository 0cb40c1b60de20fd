use clap::Parser;
use miette::{IntoDiagnostic, Result};
use rust_decimal::Decimal;
use std::fs::File;
use std::io;
use std::path::{Path, PathBuf};
use std::sync::Arc;
use tracing_subscriber::EnvFilter;
use wallet_ledger::infrastructure::identity::StaticIdentityResolver;
use wallet_ledger::infrastructure::in_memory::InMemoryLedger;
use wallet_ledger::interfaces::csv::balance_writer::BalanceWriter;
use wallet_ledger::interfaces::csv::operation_reader::OperationReader;
use wallet_ledger::interfaces::csv::replay::Replay;
use wallet_ledger::{EngineConfig, WalletEngine};

#[derive(Parser)]
#[command(author, version, about, long_about = None)]
struct Cli {
    /// Input wallet operations CSV file
    input: PathBuf,

    /// Path to persistent database (optional). If provided, uses RocksDB.
    #[arg(long)]
    db_path: Option<PathBuf>,

    /// JSON file with engine settings. Flags below override it.
    #[arg(long, env = "WALLET_CONFIG")]
    config: Option<PathBuf>,

    /// Deadline for each engine operation, in milliseconds.
    #[arg(long, env = "WALLET_OPERATION_TIMEOUT_MS")]
    timeout_ms: Option<u64>,

    /// Smallest amount a transaction may move.
    #[arg(long, env = "WALLET_MIN_AMOUNT")]
    min_amount: Option<Decimal>,
}

impl Cli {
    fn engine_config(&self) -> Result<EngineConfig> {
        let mut config = match &self.config {
            Some(path) => EngineConfig::from_json_file(path).into_diagnostic()?,
            None => EngineConfig::default(),
        };
        if let Some(timeout_ms) = self.timeout_ms {
            config.operation_timeout_ms = timeout_ms;
        }
        if let Some(min_amount) = self.min_amount {
            config.min_amount = min_amount;
        }
        Ok(config)
    }
}

#[cfg(feature = "storage-rocksdb")]
fn build_engine(
    db_path: Option<&Path>,
    identities: Arc<StaticIdentityResolver>,
    config: EngineConfig,
) -> Result<WalletEngine> {
    use wallet_ledger::infrastructure::rocksdb::RocksDBLedger;

    match db_path {
        Some(path) => {
            let ledger = RocksDBLedger::open(path).into_diagnostic()?;
            Ok(WalletEngine::new(Arc::new(ledger), identities, config))
        }
        None => Ok(WalletEngine::new(
            Arc::new(InMemoryLedger::new()),
            identities,
            config,
        )),
    }
}

#[cfg(not(feature = "storage-rocksdb"))]
fn build_engine(
    db_path: Option<&Path>,
    identities: Arc<StaticIdentityResolver>,
    config: EngineConfig,
) -> Result<WalletEngine> {
    if db_path.is_some() {
        eprintln!(
            "WARNING: Persistent storage requested via --db-path, but 'storage-rocksdb' feature is not enabled. Falling back to In-Memory storage."
        );
    }
    Ok(WalletEngine::new(
        Arc::new(InMemoryLedger::new()),
        identities,
        config,
    ))
}

#[tokio::main]
async fn main() -> Result<()> {
    tracing_subscriber::fmt()
        .with_writer(io::stderr)
        .with_env_filter(
            EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("info")),
        )
        .init();

    let cli = Cli::parse();
    let config = cli.engine_config()?;

    let identities = Arc::new(StaticIdentityResolver::new());
    let engine = Arc::new(build_engine(
        cli.db_path.as_deref(),
        Arc::clone(&identities),
        config,
    )?);
    let _sweeper = engine.start_lock_sweeper();

    // Replay operations
    let mut replay = Replay::new(Arc::clone(&engine), identities);
    let file = File::open(&cli.input).into_diagnostic()?;
    let reader = OperationReader::new(file);
    for op_result in reader.operations() {
        match op_result {
            Ok(op) => {
                if let Err(e) = replay.apply(op).await {
                    eprintln!("Error processing operation: {}", e);
                }
            }
            Err(e) => {
                eprintln!("Error reading operation: {}", e);
            }
        }
    }

    // Output final balances
    let balances = replay.balances().await.into_diagnostic()?;
    let stdout = io::stdout();
    let mut writer = BalanceWriter::new(stdout.lock());
    writer.write_balances(balances).into_diagnostic()?;

    Ok(())
}
