//! Multisig engine errors
//!
//! Every rejected request maps to one machine-readable [`ErrorKind`].

use crate::ledger::LedgerError;
use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Machine-readable failure category reported to the transport
#[derive(Clone, Copy, Debug, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum ErrorKind {
    Validation,
    Unauthorized,
    NotFound,
    InvalidSigner,
    Duplicate,
    InsufficientFunds,
    Expired,
    Rejected,
}

/// Errors related to multisig operations
#[derive(Error, Debug, Clone, PartialEq, Eq)]
pub enum MultisigError {
    #[error("Invalid {field}: {reason}")]
    Validation { field: &'static str, reason: String },
    #[error("Signature verification failed: {0}")]
    Unauthorized(String),
    #[error("Transaction not found: {0}")]
    NotFound(String),
    #[error("Signer not in keygroup: {0}")]
    InvalidSigner(String),
    #[error("Duplicate: {0}")]
    Duplicate(String),
    #[error("Insufficient funds: need {needed}, have {available}")]
    InsufficientFunds { needed: u64, available: u64 },
    #[error("Transaction expired: {0}")]
    Expired(String),
    #[error("Transaction {id} rejected: {reason}")]
    Rejected { id: String, reason: String },
}

impl MultisigError {
    pub fn validation(field: &'static str, reason: impl Into<String>) -> Self {
        Self::Validation {
            field,
            reason: reason.into(),
        }
    }

    /// Map a ledger failure during execution of transaction `id`
    pub fn from_ledger(id: &str, err: LedgerError) -> Self {
        match err {
            LedgerError::InsufficientFunds { needed, available } => {
                Self::InsufficientFunds { needed, available }
            }
            other => Self::Rejected {
                id: id.to_string(),
                reason: other.to_string(),
            },
        }
    }

    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation { .. } => ErrorKind::Validation,
            Self::Unauthorized(_) => ErrorKind::Unauthorized,
            Self::NotFound(_) => ErrorKind::NotFound,
            Self::InvalidSigner(_) => ErrorKind::InvalidSigner,
            Self::Duplicate(_) => ErrorKind::Duplicate,
            Self::InsufficientFunds { .. } => ErrorKind::InsufficientFunds,
            Self::Expired(_) => ErrorKind::Expired,
            Self::Rejected { .. } => ErrorKind::Rejected,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_ledger_mapping() {
        let funds = MultisigError::from_ledger(
            "tx",
            LedgerError::InsufficientFunds {
                needed: 10,
                available: 1,
            },
        );
        assert_eq!(funds.kind(), ErrorKind::InsufficientFunds);

        let conflict = MultisigError::from_ledger("tx", LedgerError::Conflict("x".to_string()));
        assert_eq!(conflict.kind(), ErrorKind::Rejected);
    }

    #[test]
    fn test_kind_serializes_screaming_case() {
        let json = serde_json::to_string(&ErrorKind::InvalidSigner).unwrap();
        assert_eq!(json, "\"INVALID_SIGNER\"");
        let err = MultisigError::validation("min", "must be at least 1");
        assert_eq!(err.to_string(), "Invalid min: must be at least 1");
    }
}
