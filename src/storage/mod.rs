//! Storage module for pending pool persistence

pub mod persistence;

pub use persistence::{PoolStorage, StorageConfig, StorageError};
