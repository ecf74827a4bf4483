//! Signature collection
//!
//! Accepts one co-signature at a time and runs the quorum evaluator before
//! returning, all under the entry's lock.

use crate::multisig::error::MultisigError;
use crate::multisig::pool::{lock_entry, PendingPool, Resolution};
use crate::multisig::quorum::{Evaluation, QuorumExecutor};
use crate::multisig::transaction::short_key;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

/// Result of an accepted signature
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct SignOutcome {
    pub transaction_id: String,
    /// Whether this signature completed the quorum
    pub confirmed: bool,
}

/// Feeds signatures into pooled transactions
pub struct SignatureCollector<'a> {
    pool: &'a PendingPool,
    executor: &'a QuorumExecutor,
}

impl<'a> SignatureCollector<'a> {
    pub fn new(pool: &'a PendingPool, executor: &'a QuorumExecutor) -> Self {
        Self { pool, executor }
    }

    /// Submit a co-signature from `signer` (normalized hex key).
    pub fn submit(
        &self,
        transaction_id: &str,
        signer: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<SignOutcome, MultisigError> {
        let entry = self.pool.get(transaction_id)?;

        let (evaluation, resolution) = {
            let mut tx = lock_entry(&entry);
            if !tx.is_pending() {
                return Err(MultisigError::NotFound(transaction_id.to_string()));
            }

            if tx.is_expired(now) {
                let evaluation = self.executor.evaluate(&mut tx, now);
                let resolution = Resolution::of(&tx);
                drop(tx);
                self.pool.retire(resolution);
                debug_assert_eq!(evaluation, Evaluation::Expired);
                return Err(MultisigError::Expired(transaction_id.to_string()));
            }

            tx.add_signature(signer, signature, now)?;
            log::debug!(
                "Signature from {} accepted for {} ({}/{})",
                short_key(signer),
                tx.id,
                tx.signature_count(),
                tx.required_min
            );

            let evaluation = self.executor.evaluate(&mut tx, now);
            let resolution = evaluation.is_resolution().then(|| Resolution::of(&tx));
            (evaluation, resolution)
        };

        if let Some(resolution) = resolution {
            self.pool.retire(resolution);
        }

        match evaluation {
            Evaluation::Confirmed => Ok(SignOutcome {
                transaction_id: transaction_id.to_string(),
                confirmed: true,
            }),
            Evaluation::StillPending | Evaluation::Unchanged => Ok(SignOutcome {
                transaction_id: transaction_id.to_string(),
                confirmed: false,
            }),
            Evaluation::Rejected(e) => Err(MultisigError::from_ledger(transaction_id, e)),
            Evaluation::Expired => Err(MultisigError::Expired(transaction_id.to_string())),
        }
    }
}
