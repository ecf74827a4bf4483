//! Account model owned by the ledger

use serde::{Deserialize, Serialize};
use std::collections::BTreeSet;

/// Multisignature configuration attached to an account once its
/// registration has executed
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct MultisigConfig {
    /// Signatures required to spend (M in M-of-N)
    pub min: usize,
    /// How long a pending spend may wait for signatures
    pub lifetime_hours: u32,
    /// Compressed hex public keys of the co-signers
    pub keygroup: BTreeSet<String>,
}

impl MultisigConfig {
    pub fn is_member(&self, public_key: &str) -> bool {
        self.keygroup.contains(public_key)
    }

    /// Description like "2-of-3"
    pub fn description(&self) -> String {
        format!("{}-of-{}", self.min, self.keygroup.len())
    }
}

/// A ledger account
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Account {
    pub address: String,
    /// Unknown for accounts that have only ever received funds
    pub public_key: Option<String>,
    /// Balance in the smallest unit
    pub balance: u64,
    pub multisig: Option<MultisigConfig>,
}

impl Account {
    pub fn new(address: String, public_key: Option<String>) -> Self {
        Self {
            address,
            public_key,
            balance: 0,
            multisig: None,
        }
    }

    pub fn is_multisig(&self) -> bool {
        self.multisig.is_some()
    }
}
