//! Multisig node
//!
//! Hosts the multisignature engine: restores pending transactions, runs the
//! lifetime sweeper and saves the pool on shutdown.

use clap::{Parser, Subcommand};
use multisig_engine::config::EngineConfig;
use multisig_engine::crypto::KeyPair;
use multisig_engine::ledger::InMemoryLedger;
use multisig_engine::multisig::{MultisigEngine, PendingPool};
use multisig_engine::storage::{PoolStorage, StorageConfig};
use std::path::PathBuf;
use std::sync::Arc;

#[derive(Parser)]
#[command(name = "multisig-node")]
#[command(author = "Darshan")]
#[command(version = "0.1.0")]
#[command(about = "Multisignature keygroup authorization node", long_about = None)]
struct Cli {
    /// Data directory for the pending pool snapshot
    #[arg(short, long, default_value = ".multisig_data")]
    data_dir: PathBuf,

    /// JSON engine configuration (defaults apply when omitted)
    #[arg(short, long)]
    config: Option<PathBuf>,

    #[command(subcommand)]
    command: Option<Commands>,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the engine until Ctrl+C (default)
    Run,

    /// Generate a keypair for a keygroup member
    Keygen,

    /// Print the effective configuration as JSON
    Config,
}

fn main() -> Result<(), Box<dyn std::error::Error>> {
    // Initialize logger
    env_logger::Builder::from_env(env_logger::Env::default().default_filter_or("info")).init();

    let cli = Cli::parse();

    let config = match &cli.config {
        Some(path) => EngineConfig::from_file(path)?,
        None => EngineConfig::default(),
    };

    match cli.command.unwrap_or(Commands::Run) {
        Commands::Run => run(config, cli.data_dir),
        Commands::Keygen => {
            let keypair = KeyPair::generate();
            println!("Public key:  {}", keypair.public_key_hex());
            println!("Private key: {}", keypair.private_key_hex());
            println!("Address:     {}", keypair.address());
            Ok(())
        }
        Commands::Config => {
            println!("{}", serde_json::to_string_pretty(&config)?);
            Ok(())
        }
    }
}

fn run(config: EngineConfig, data_dir: PathBuf) -> Result<(), Box<dyn std::error::Error>> {
    let storage = PoolStorage::new(StorageConfig {
        data_dir,
        ..Default::default()
    })?;

    let pool = Arc::new(PendingPool::new(config.resolved_history_capacity));
    storage.load_into(&pool)?;

    let ledger = Arc::new(InMemoryLedger::new());
    let engine = Arc::new(MultisigEngine::new(config, ledger, pool.clone()));

    let rt = tokio::runtime::Runtime::new()?;
    rt.block_on(async {
        // Anything restored at quorum or past its deadline resolves here
        engine.sweep_expired();
        let sweeper = engine.spawn_sweeper();

        log::info!(
            "Multisig node running with {} pending transactions. Press Ctrl+C to stop.",
            pool.len()
        );
        if let Err(e) = tokio::signal::ctrl_c().await {
            log::error!("Failed to listen for Ctrl+C: {}", e);
        }

        log::info!("Shutting down...");
        sweeper.shutdown().await;
    });

    let saved = storage.save(&pool)?;
    log::info!("Saved {} pending transactions", saved);
    Ok(())
}
