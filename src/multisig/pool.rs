//! Pending transaction pool
//!
//! Structural operations (insert/remove) take the map lock; each entry has
//! its own mutex for signature and status changes. The map lock is never
//! held while waiting on an entry lock.

use crate::multisig::error::MultisigError;
use crate::multisig::transaction::{PendingStatus, PendingTransaction, TransactionKind};
use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex, MutexGuard, PoisonError, RwLock};

/// A pool entry, shared between the pool and whoever is working on it
pub type SharedEntry = Arc<Mutex<PendingTransaction>>;

/// Lock an entry for exclusive access
pub fn lock_entry(entry: &SharedEntry) -> MutexGuard<'_, PendingTransaction> {
    entry.lock().unwrap_or_else(PoisonError::into_inner)
}

/// Record of how a transaction left the pool
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub struct Resolution {
    pub transaction_id: String,
    pub kind: TransactionKind,
    pub status: PendingStatus,
    pub reason: Option<String>,
    pub signatures: usize,
    pub resolved_at: DateTime<Utc>,
}

impl Resolution {
    pub fn of(tx: &PendingTransaction) -> Self {
        Self {
            transaction_id: tx.id.clone(),
            kind: tx.kind(),
            status: tx.status,
            reason: tx.failure_reason.clone(),
            signatures: tx.signature_count(),
            resolved_at: tx.updated_at,
        }
    }
}

#[derive(Default)]
struct PoolState {
    entries: HashMap<String, SharedEntry>,
    /// Sender key -> id of its pending registration
    registrations: HashMap<String, String>,
}

/// Store of transactions awaiting quorum
pub struct PendingPool {
    state: RwLock<PoolState>,
    resolved: Mutex<VecDeque<Resolution>>,
    history_capacity: usize,
}

impl PendingPool {
    /// Create an empty pool remembering up to `history_capacity` resolutions
    pub fn new(history_capacity: usize) -> Self {
        Self {
            state: RwLock::new(PoolState::default()),
            resolved: Mutex::new(VecDeque::new()),
            history_capacity,
        }
    }

    /// Insert a new PENDING transaction.
    ///
    /// Fails on a reused id (pooled or already resolved), and on a second
    /// registration from a sender that already has one pending.
    pub fn insert(&self, tx: PendingTransaction) -> Result<SharedEntry, MultisigError> {
        if !tx.is_pending() {
            return Err(MultisigError::validation(
                "status",
                format!("cannot pool a {:?} transaction", tx.status),
            ));
        }

        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        if state.entries.contains_key(&tx.id) {
            return Err(MultisigError::Duplicate(format!("transaction {} exists", tx.id)));
        }
        // retire() records history before removing, so a resolved id is
        // always visible in one of the two places
        if self.resolution(&tx.id).is_some() {
            return Err(MultisigError::Duplicate(format!(
                "transaction {} was already resolved",
                tx.id
            )));
        }
        if tx.kind() == TransactionKind::Registration {
            if let Some(existing) = state.registrations.get(&tx.sender_public_key) {
                return Err(MultisigError::Duplicate(format!(
                    "registration {} is already pending for this sender",
                    existing
                )));
            }
            state
                .registrations
                .insert(tx.sender_public_key.clone(), tx.id.clone());
        }

        let id = tx.id.clone();
        let entry = Arc::new(Mutex::new(tx));
        state.entries.insert(id, entry.clone());
        Ok(entry)
    }

    /// Get an entry by id
    pub fn get(&self, id: &str) -> Result<SharedEntry, MultisigError> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .get(id)
            .cloned()
            .ok_or_else(|| MultisigError::NotFound(id.to_string()))
    }

    /// Remove an entry, returning it if present
    pub fn remove(&self, id: &str) -> Option<SharedEntry> {
        let mut state = self.state.write().unwrap_or_else(PoisonError::into_inner);
        let entry = state.entries.remove(id)?;
        state.registrations.retain(|_, pending_id| pending_id != id);
        Some(entry)
    }

    /// Remove a resolved transaction and remember its outcome
    pub fn retire(&self, resolution: Resolution) {
        let id = resolution.transaction_id.clone();
        if self.history_capacity > 0 {
            let mut resolved = self.resolved.lock().unwrap_or_else(PoisonError::into_inner);
            while resolved.len() >= self.history_capacity {
                resolved.pop_front();
            }
            resolved.push_back(resolution);
        }
        self.remove(&id);
    }

    /// Outcome of a transaction that already left the pool
    pub fn resolution(&self, id: &str) -> Option<Resolution> {
        self.resolved
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .iter()
            .rev()
            .find(|r| r.transaction_id == id)
            .cloned()
    }

    /// Snapshot of the current entries, taken without holding any entry lock
    pub fn entries(&self) -> Vec<SharedEntry> {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .values()
            .cloned()
            .collect()
    }

    fn pending_matching<F>(&self, predicate: F) -> Vec<PendingTransaction>
    where
        F: Fn(&PendingTransaction) -> bool,
    {
        let mut matching: Vec<PendingTransaction> = self
            .entries()
            .iter()
            .filter_map(|entry| {
                let tx = lock_entry(entry);
                (tx.is_pending() && predicate(&tx)).then(|| tx.clone())
            })
            .collect();
        matching.sort_by(|a, b| a.created_at.cmp(&b.created_at).then(a.id.cmp(&b.id)));
        matching
    }

    /// Live PENDING entries the key may sign; an empty key returns all of them.
    /// Entries at or past their deadline are left out even before a sweep.
    pub fn list_pending_for_signer(
        &self,
        public_key: &str,
        now: DateTime<Utc>,
    ) -> Vec<PendingTransaction> {
        self.pending_matching(|tx| {
            !tx.is_expired(now)
                && (public_key.is_empty() || tx.eligible_signers.contains(public_key))
        })
    }

    /// Live PENDING entries created by the key
    pub fn list_pending_for_sender(
        &self,
        public_key: &str,
        now: DateTime<Utc>,
    ) -> Vec<PendingTransaction> {
        self.pending_matching(|tx| !tx.is_expired(now) && tx.sender_public_key == public_key)
    }

    pub fn len(&self) -> usize {
        self.state
            .read()
            .unwrap_or_else(PoisonError::into_inner)
            .entries
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Copies of every PENDING entry, overdue ones included, for persistence
    pub fn snapshot(&self) -> Vec<PendingTransaction> {
        self.pending_matching(|_| true)
    }

    /// Re-insert persisted entries. Terminal, conflicting or malformed ones
    /// are skipped. Returns how many were restored.
    pub fn restore(&self, transactions: Vec<PendingTransaction>) -> usize {
        let mut restored = 0;
        for tx in transactions {
            let id = tx.id.clone();
            match tx.check_integrity().and_then(|()| self.insert(tx)) {
                Ok(_) => restored += 1,
                Err(e) => log::warn!("Skipping persisted transaction {}: {}", id, e),
            }
        }
        restored
    }
}

impl Default for PendingPool {
    fn default() -> Self {
        Self::new(crate::config::DEFAULT_RESOLVED_HISTORY)
    }
}
