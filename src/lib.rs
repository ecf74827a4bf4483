//! Multisig Engine: N-of-M keygroup authorization for account ledgers
//!
//! This crate provides:
//! - Keygroup registration (turning an account into an M-of-N account)
//! - Transfer proposals held until enough keygroup members co-sign
//! - Signature collection with exactly-once execution at quorum
//! - Lifetime expiry through a background sweeper
//! - ECDSA signatures (secp256k1) and Base58Check addresses
//! - JSON persistence of the pending pool
//!
//! # Example
//!
//! ```rust
//! use multisig_engine::config::EngineConfig;
//! use multisig_engine::crypto::KeyPair;
//! use multisig_engine::ledger::InMemoryLedger;
//! use multisig_engine::multisig::{sign_pending, MultisigEngine, PendingPool, RegistrationRequest};
//! use std::sync::Arc;
//!
//! let ledger = Arc::new(InMemoryLedger::new());
//! let owner = KeyPair::generate();
//! ledger.open_account(&owner.public_key_hex()).unwrap();
//! ledger.credit(&owner.address(), 10_000_000_000).unwrap();
//!
//! let engine = MultisigEngine::new(
//!     EngineConfig::default(),
//!     ledger.clone(),
//!     Arc::new(PendingPool::default()),
//! );
//!
//! // Propose a 1-of-2 keygroup
//! let members = [KeyPair::generate(), KeyPair::generate()];
//! let keys = members.iter().map(|k| format!("+{}", k.public_key_hex())).collect();
//! let request = RegistrationRequest::signed(&owner, 1, 24, keys).unwrap();
//! let id = engine.register_multisig(&request).unwrap().transaction_id;
//!
//! // One member co-signs and the registration applies
//! let pending = engine.pending(&id).unwrap();
//! let signature = sign_pending(&pending, &members[0]).unwrap();
//! let outcome = engine
//!     .sign_transaction(&members[0].public_key_hex(), &id, &signature)
//!     .unwrap();
//! assert!(outcome.confirmed);
//! ```

pub mod config;
pub mod crypto;
pub mod ledger;
pub mod multisig;
pub mod storage;

// Re-export commonly used types
pub use config::{EngineConfig, FeeSchedule, QuorumRules, RegistrationQuorum};
pub use crypto::KeyPair;
pub use ledger::{Account, InMemoryLedger, Ledger, LedgerError, MultisigConfig};
pub use multisig::{
    ApiResponse, ErrorKind, MultisigEngine, MultisigError, PendingPool, PendingStatus,
    PendingSummary, PendingTransaction, RegistrationRequest, SignOutcome, TransactionStatus,
    TransferRequest,
};
pub use storage::{PoolStorage, StorageConfig, StorageError};
