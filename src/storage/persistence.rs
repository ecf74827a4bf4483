//! Pending pool persistence
//!
//! Saves the PENDING entries of a pool as JSON so they survive a restart.

use crate::multisig::{PendingPool, PendingTransaction};
use serde::{Deserialize, Serialize};
use std::fs;
use std::io::{self, BufReader, BufWriter};
use std::path::PathBuf;
use thiserror::Error;

/// Snapshot format version
const SNAPSHOT_VERSION: u32 = 1;

/// Storage errors
#[derive(Error, Debug)]
pub enum StorageError {
    #[error("IO error: {0}")]
    IoError(#[from] io::Error),
    #[error("Serialization error: {0}")]
    SerializationError(#[from] serde_json::Error),
    #[error("Invalid data: {0}")]
    InvalidData(String),
}

/// Storage configuration
#[derive(Debug, Clone)]
pub struct StorageConfig {
    pub data_dir: PathBuf,
    pub pool_file: String,
    pub backup_enabled: bool,
}

impl Default for StorageConfig {
    fn default() -> Self {
        Self {
            data_dir: PathBuf::from(".multisig_data"),
            pool_file: "pending_pool.json".to_string(),
            backup_enabled: true,
        }
    }
}

#[derive(Serialize, Deserialize)]
struct PoolSnapshot {
    version: u32,
    transactions: Vec<PendingTransaction>,
}

/// Reads and writes pool snapshots
pub struct PoolStorage {
    config: StorageConfig,
}

impl PoolStorage {
    pub fn new(config: StorageConfig) -> Result<Self, StorageError> {
        fs::create_dir_all(&config.data_dir)?;
        Ok(Self { config })
    }

    fn pool_path(&self) -> PathBuf {
        self.config.data_dir.join(&self.config.pool_file)
    }

    fn backup_path(&self) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.backup", self.config.pool_file))
    }

    fn temp_path(&self) -> PathBuf {
        self.config
            .data_dir
            .join(format!("{}.tmp", self.config.pool_file))
    }

    pub fn exists(&self) -> bool {
        self.pool_path().exists()
    }

    /// Save the pool's pending entries. Returns how many were written.
    pub fn save(&self, pool: &PendingPool) -> Result<usize, StorageError> {
        let path = self.pool_path();

        if self.config.backup_enabled && path.exists() {
            fs::copy(&path, self.backup_path())?;
        }

        let snapshot = PoolSnapshot {
            version: SNAPSHOT_VERSION,
            transactions: pool.snapshot(),
        };
        let count = snapshot.transactions.len();

        // Write to temporary file first
        let temp_path = self.temp_path();
        let mut writer = BufWriter::new(fs::File::create(&temp_path)?);
        serde_json::to_writer_pretty(&mut writer, &snapshot)?;
        let file = writer.into_inner().map_err(|e| e.into_error())?;
        file.sync_all()?;

        // Atomic rename, only once the data is on disk
        fs::rename(&temp_path, &path)?;

        log::debug!("Saved {} pending transactions to {}", count, path.display());
        Ok(count)
    }

    /// Load persisted entries into `pool`. A missing file restores nothing.
    pub fn load_into(&self, pool: &PendingPool) -> Result<usize, StorageError> {
        let path = self.pool_path();
        if !path.exists() {
            return Ok(0);
        }

        let reader = BufReader::new(fs::File::open(&path)?);
        let snapshot: PoolSnapshot = serde_json::from_reader(reader)?;
        if snapshot.version != SNAPSHOT_VERSION {
            return Err(StorageError::InvalidData(format!(
                "unsupported snapshot version {}",
                snapshot.version
            )));
        }

        let restored = pool.restore(snapshot.transactions);
        log::info!("Restored {} pending transactions from {}", restored, path.display());
        Ok(restored)
    }

    /// Delete the saved snapshot
    pub fn delete(&self) -> Result<(), StorageError> {
        let path = self.pool_path();
        if path.exists() {
            fs::remove_file(path)?;
        }
        Ok(())
    }
}
