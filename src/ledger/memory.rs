//! In-memory ledger
//!
//! A map of accounts behind a single `RwLock`. Every mutating call checks
//! all of its preconditions before touching any balance, so a failed call
//! leaves no partial state.

use crate::crypto::{address_from_public_key_hex, normalize_public_key};
use crate::ledger::{Account, Ledger, LedgerError, MultisigConfig};
use std::collections::HashMap;
use std::sync::{PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

/// Accounts keyed by address
#[derive(Debug, Default)]
pub struct InMemoryLedger {
    accounts: RwLock<HashMap<String, Account>>,
}

impl InMemoryLedger {
    pub fn new() -> Self {
        Self::default()
    }

    fn read(&self) -> RwLockReadGuard<'_, HashMap<String, Account>> {
        self.accounts.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, HashMap<String, Account>> {
        self.accounts.write().unwrap_or_else(PoisonError::into_inner)
    }

    /// Open (or fetch) the account owned by a public key
    pub fn open_account(&self, public_key: &str) -> Result<Account, LedgerError> {
        let public_key = normalize_public_key(public_key)
            .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        let address = address_from_public_key_hex(&public_key)
            .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;

        let mut accounts = self.write();
        let account = accounts
            .entry(address.clone())
            .or_insert_with(|| Account::new(address, None));
        account.public_key.get_or_insert(public_key);
        Ok(account.clone())
    }

    /// Add funds to an address, creating the account if needed
    pub fn credit(&self, address: &str, amount: u64) -> Result<u64, LedgerError> {
        let mut accounts = self.write();
        let account = accounts
            .entry(address.to_string())
            .or_insert_with(|| Account::new(address.to_string(), None));
        account.balance = account
            .balance
            .checked_add(amount)
            .ok_or_else(|| LedgerError::Conflict("balance overflow".to_string()))?;
        Ok(account.balance)
    }

    /// Look up an account by address
    pub fn account(&self, address: &str) -> Option<Account> {
        self.read().get(address).cloned()
    }

    pub fn balance(&self, address: &str) -> u64 {
        self.read().get(address).map(|a| a.balance).unwrap_or(0)
    }

    pub fn account_count(&self) -> usize {
        self.read().len()
    }
}

impl Ledger for InMemoryLedger {
    fn get_account(&self, public_key: &str) -> Result<Account, LedgerError> {
        let address = address_from_public_key_hex(public_key)
            .map_err(|e| LedgerError::InvalidKey(e.to_string()))?;
        self.read()
            .get(&address)
            .cloned()
            .ok_or(LedgerError::AccountNotFound(address))
    }

    fn apply_multisig_registration(
        &self,
        address: &str,
        config: &MultisigConfig,
        fee: u64,
    ) -> Result<(), LedgerError> {
        let mut accounts = self.write();
        let account = accounts
            .get_mut(address)
            .ok_or_else(|| LedgerError::AccountNotFound(address.to_string()))?;

        if account.multisig.is_some() {
            return Err(LedgerError::Conflict(format!(
                "account {} already has a multisignature configuration",
                address
            )));
        }
        if account.balance < fee {
            return Err(LedgerError::InsufficientFunds {
                needed: fee,
                available: account.balance,
            });
        }

        account.balance -= fee;
        account.multisig = Some(config.clone());
        Ok(())
    }

    fn apply_transfer(&self, from: &str, to: &str, amount: u64, fee: u64) -> Result<(), LedgerError> {
        let mut accounts = self.write();

        let needed = amount
            .checked_add(fee)
            .ok_or_else(|| LedgerError::Conflict("amount overflow".to_string()))?;
        let available = accounts
            .get(from)
            .ok_or_else(|| LedgerError::AccountNotFound(from.to_string()))?
            .balance;
        if available < needed {
            return Err(LedgerError::InsufficientFunds { needed, available });
        }

        let recipient_balance = accounts.get(to).map(|a| a.balance).unwrap_or(0);
        let credited = if from == to {
            available - fee
        } else {
            recipient_balance
                .checked_add(amount)
                .ok_or_else(|| LedgerError::Conflict("balance overflow".to_string()))?
        };

        if let Some(sender) = accounts.get_mut(from) {
            sender.balance = available - needed;
        }
        accounts
            .entry(to.to_string())
            .or_insert_with(|| Account::new(to.to_string(), None))
            .balance = credited;
        Ok(())
    }
}
