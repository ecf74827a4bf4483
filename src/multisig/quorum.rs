//! Quorum evaluation and execution
//!
//! Callers hold the entry lock for the whole evaluation, so the status check,
//! the ledger call and the status write form one step. A second evaluator
//! that gets the lock afterwards sees a terminal status and does nothing.

use crate::ledger::{Ledger, LedgerError};
use crate::multisig::transaction::{short_key, Payload, PendingStatus, PendingTransaction};
use chrono::{DateTime, Utc};
use std::sync::Arc;

/// Result of evaluating one pending transaction
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Evaluation {
    /// Already left PENDING before this evaluation; nothing was done
    Unchanged,
    /// Below threshold and within its lifetime
    StillPending,
    /// Quorum reached and the effect was applied
    Confirmed,
    /// Deadline passed; the effect was not applied
    Expired,
    /// The ledger refused the effect
    Rejected(LedgerError),
}

impl Evaluation {
    /// Whether the transaction left PENDING during this evaluation
    pub fn is_resolution(&self) -> bool {
        matches!(
            self,
            Evaluation::Confirmed | Evaluation::Expired | Evaluation::Rejected(_)
        )
    }
}

/// Decides quorum and applies the effect through the ledger
#[derive(Clone)]
pub struct QuorumExecutor {
    ledger: Arc<dyn Ledger>,
}

impl QuorumExecutor {
    pub fn new(ledger: Arc<dyn Ledger>) -> Self {
        Self { ledger }
    }

    /// Evaluate a locked entry.
    ///
    /// Expiry is checked before quorum: at or past `expires_at` the entry
    /// expires even if it holds enough signatures.
    pub fn evaluate(&self, tx: &mut PendingTransaction, now: DateTime<Utc>) -> Evaluation {
        if !tx.is_pending() {
            return Evaluation::Unchanged;
        }

        if tx.is_expired(now) {
            tx.transition(PendingStatus::Expired, now);
            log::info!(
                "Multisig transaction {} expired with {}/{} signatures",
                tx.id,
                tx.signature_count(),
                tx.required_min
            );
            return Evaluation::Expired;
        }

        if !tx.has_quorum() {
            return Evaluation::StillPending;
        }

        match self.execute(tx) {
            Ok(()) => {
                tx.transition(PendingStatus::Confirmed, now);
                log::info!(
                    "Multisig transaction {} confirmed ({:?}, {}/{} signatures)",
                    tx.id,
                    tx.kind(),
                    tx.signature_count(),
                    tx.required_min
                );
                Evaluation::Confirmed
            }
            Err(e) => {
                tx.reject(e.to_string(), now);
                log::warn!("Multisig transaction {} rejected by ledger: {}", tx.id, e);
                Evaluation::Rejected(e)
            }
        }
    }

    fn execute(&self, tx: &PendingTransaction) -> Result<(), LedgerError> {
        match &tx.payload {
            Payload::Registration(config) => {
                log::debug!(
                    "Registering {} keygroup for sender {}",
                    config.description(),
                    short_key(&tx.sender_public_key)
                );
                self.ledger
                    .apply_multisig_registration(&tx.sender_address, config, tx.fee)
            }
            Payload::Transfer {
                amount,
                recipient_address,
            } => self
                .ledger
                .apply_transfer(&tx.sender_address, recipient_address, *amount, tx.fee),
        }
    }
}
