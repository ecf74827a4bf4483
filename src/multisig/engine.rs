//! Multisignature engine
//!
//! The four operations a transport calls: register a keygroup, propose a
//! spend from a multisig account, co-sign, and list what is pending. The
//! pool and ledger are injected so each node (or test) owns its own.

use crate::config::EngineConfig;
use crate::crypto::normalize_public_key;
use crate::ledger::{Ledger, LedgerError};
use crate::multisig::clock::{Clock, SystemClock};
use crate::multisig::collector::{SignOutcome, SignatureCollector};
use crate::multisig::error::MultisigError;
use crate::multisig::pool::{lock_entry, PendingPool, Resolution};
use crate::multisig::quorum::QuorumExecutor;
use crate::multisig::sweeper::{self, SweepReport, SweeperHandle};
use crate::multisig::transaction::{
    expiry_for, short_key, NewPending, Payload, PendingTransaction, RegistrationRequest,
    TransferRequest,
};
use crate::multisig::validator::KeygroupValidator;
use crate::multisig::view::PendingSummary;
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::sync::Arc;
use std::time::Duration;

/// Returned when a request is accepted into the pool
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Submitted {
    pub transaction_id: String,
}

/// Where a transaction currently stands
#[derive(Clone, Debug, Serialize)]
#[serde(tag = "state", rename_all = "snake_case")]
pub enum TransactionStatus {
    Pending(PendingTransaction),
    Resolved(Resolution),
}

/// The multisignature authorization engine
pub struct MultisigEngine {
    config: EngineConfig,
    ledger: Arc<dyn Ledger>,
    pool: Arc<PendingPool>,
    executor: QuorumExecutor,
    clock: Arc<dyn Clock>,
}

impl MultisigEngine {
    /// Create an engine on the wall clock
    pub fn new(config: EngineConfig, ledger: Arc<dyn Ledger>, pool: Arc<PendingPool>) -> Self {
        Self::with_clock(config, ledger, pool, Arc::new(SystemClock))
    }

    pub fn with_clock(
        config: EngineConfig,
        ledger: Arc<dyn Ledger>,
        pool: Arc<PendingPool>,
        clock: Arc<dyn Clock>,
    ) -> Self {
        Self {
            executor: QuorumExecutor::new(ledger.clone()),
            config,
            ledger,
            pool,
            clock,
        }
    }

    pub fn config(&self) -> &EngineConfig {
        &self.config
    }

    pub fn pool(&self) -> &Arc<PendingPool> {
        &self.pool
    }

    /// Propose turning the sender's account into a keygroup account
    pub fn register_multisig(
        &self,
        request: &RegistrationRequest,
    ) -> Result<Submitted, MultisigError> {
        let sender_key = parse_key("senderPublicKey", &request.sender_public_key)?;
        let account = self.sender_account(&sender_key)?;

        let validated = KeygroupValidator::new(&self.config).validate_registration(
            request,
            &account,
            &sender_key,
        )?;
        let config = validated.config;
        let required_min = self
            .config
            .quorum
            .registration_min(config.min, config.keygroup.len());
        let now = self.clock.now();
        check_deadline(now, config.lifetime_hours)?;

        let tx = PendingTransaction::new(
            NewPending {
                sender_public_key: sender_key.clone(),
                sender_address: account.address,
                min: config.min,
                lifetime_hours: config.lifetime_hours,
                required_min,
                eligible_signers: config.keygroup.clone(),
                fee: validated.fee,
                payload: Payload::Registration(config),
                request_signature: request.signature.clone(),
            },
            now,
        );
        let transaction_id = tx.id.clone();
        self.pool.insert(tx)?;

        log::info!(
            "Registration {} pending for sender {} (needs {} signatures)",
            transaction_id,
            short_key(&sender_key),
            required_min
        );
        Ok(Submitted { transaction_id })
    }

    /// Propose a spend from an account that already has a keygroup
    pub fn propose_transfer(&self, request: &TransferRequest) -> Result<Submitted, MultisigError> {
        let sender_key = parse_key("senderPublicKey", &request.sender_public_key)?;
        let account = self.sender_account(&sender_key)?;

        let validated = KeygroupValidator::new(&self.config).validate_transfer(request, &account)?;
        let required_min = self.config.quorum.transfer_min(validated.config.min);
        let now = self.clock.now();
        check_deadline(now, validated.config.lifetime_hours)?;

        let tx = PendingTransaction::new(
            NewPending {
                sender_public_key: sender_key.clone(),
                sender_address: account.address,
                payload: Payload::Transfer {
                    amount: validated.amount,
                    recipient_address: validated.recipient_address,
                },
                min: validated.config.min,
                lifetime_hours: validated.config.lifetime_hours,
                required_min,
                eligible_signers: validated.config.keygroup,
                fee: validated.fee,
                request_signature: request.signature.clone(),
            },
            now,
        );
        let transaction_id = tx.id.clone();
        self.pool.insert(tx)?;

        log::info!(
            "Transfer {} of {} pending from sender {} (needs {} signatures)",
            transaction_id,
            validated.amount,
            short_key(&sender_key),
            required_min
        );
        Ok(Submitted { transaction_id })
    }

    /// Add a co-signature; confirms the transaction if it completes quorum
    pub fn sign_transaction(
        &self,
        signer_public_key: &str,
        transaction_id: &str,
        signature: &str,
    ) -> Result<SignOutcome, MultisigError> {
        let signer = parse_key("signerPublicKey", signer_public_key)?;
        SignatureCollector::new(&self.pool, &self.executor).submit(
            transaction_id,
            &signer,
            signature,
            self.clock.now(),
        )
    }

    /// Pending transactions a key may sign or has sent; empty key lists all
    pub fn list_pending(&self, public_key: &str) -> Result<Vec<PendingSummary>, MultisigError> {
        let now = self.clock.now();
        if public_key.is_empty() {
            return Ok(self
                .pool
                .list_pending_for_signer("", now)
                .iter()
                .map(PendingSummary::from)
                .collect());
        }

        let key = parse_key("publicKey", public_key)?;
        let mut matching = self.pool.list_pending_for_signer(&key, now);
        for tx in self.pool.list_pending_for_sender(&key, now) {
            if !matching.iter().any(|m| m.id == tx.id) {
                matching.push(tx);
            }
        }
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        Ok(matching.iter().map(PendingSummary::from).collect())
    }

    /// Copy of a pending transaction
    pub fn pending(&self, transaction_id: &str) -> Result<PendingTransaction, MultisigError> {
        let entry = self.pool.get(transaction_id)?;
        let tx = lock_entry(&entry);
        if !tx.is_pending() {
            return Err(MultisigError::NotFound(transaction_id.to_string()));
        }
        Ok(tx.clone())
    }

    /// Pending entry, or the recorded outcome once it left the pool
    pub fn transaction_status(
        &self,
        transaction_id: &str,
    ) -> Result<TransactionStatus, MultisigError> {
        if let Ok(tx) = self.pending(transaction_id) {
            return Ok(TransactionStatus::Pending(tx));
        }
        self.pool
            .resolution(transaction_id)
            .map(TransactionStatus::Resolved)
            .ok_or_else(|| MultisigError::NotFound(transaction_id.to_string()))
    }

    /// Expire overdue entries and execute any that reached quorum
    pub fn sweep_expired(&self) -> SweepReport {
        sweeper::sweep(&self.pool, &self.executor, self.clock.now())
    }

    /// Start the background sweeper at the configured interval
    pub fn spawn_sweeper(self: &Arc<Self>) -> SweeperHandle {
        let period = Duration::from_secs(self.config.sweep_interval_secs);
        sweeper::spawn(self.clone(), period)
    }

    fn sender_account(&self, sender_key: &str) -> Result<crate::ledger::Account, MultisigError> {
        self.ledger.get_account(sender_key).map_err(|e| match e {
            LedgerError::AccountNotFound(address) => MultisigError::validation(
                "senderPublicKey",
                format!("no account at {}", address),
            ),
            other => MultisigError::validation("senderPublicKey", other.to_string()),
        })
    }
}

fn check_deadline(now: DateTime<Utc>, lifetime_hours: u32) -> Result<(), MultisigError> {
    expiry_for(now, lifetime_hours)
        .map(|_| ())
        .ok_or_else(|| MultisigError::validation("lifetime", "deadline is out of range"))
}

fn parse_key(field: &'static str, public_key: &str) -> Result<String, MultisigError> {
    normalize_public_key(public_key).map_err(|e| MultisigError::validation(field, e.to_string()))
}
