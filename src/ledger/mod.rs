//! Account ledger boundary
//!
//! The ledger owns balances and multisignature configuration. The engine
//! reads accounts for validation and writes only through [`Ledger`], whose
//! mutating calls must be atomic and fail without partial state.

pub mod account;
pub mod memory;

pub use account::{Account, MultisigConfig};
pub use memory::InMemoryLedger;

use thiserror::Error;

/// Errors returned by a ledger
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum LedgerError {
    #[error("Account not found: {0}")]
    AccountNotFound(String),
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("Invalid key: {0}")]
    InvalidKey(String),
    #[error("Ledger conflict: {0}")]
    Conflict(String),
}

/// Operations the engine consumes from the account ledger
pub trait Ledger: Send + Sync {
    /// Fetch the account owned by a public key
    fn get_account(&self, public_key: &str) -> Result<Account, LedgerError>;

    /// Attach a multisig configuration to an account and charge the fee
    fn apply_multisig_registration(
        &self,
        address: &str,
        config: &MultisigConfig,
        fee: u64,
    ) -> Result<(), LedgerError>;

    /// Move `amount` from one address to another and charge `fee` to the sender
    fn apply_transfer(&self, from: &str, to: &str, amount: u64, fee: u64) -> Result<(), LedgerError>;
}
