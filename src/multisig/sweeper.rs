//! Lifetime sweeper
//!
//! Periodically expires pending transactions whose deadline has passed.
//! Uses the same evaluator (and entry lock) as signature collection, so a
//! transaction is never both expired and confirmed.

use crate::multisig::engine::MultisigEngine;
use crate::multisig::pool::{lock_entry, PendingPool, Resolution};
use crate::multisig::quorum::{Evaluation, QuorumExecutor};
use chrono::{DateTime, Utc};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use tokio::task::JoinHandle;

/// What one sweep did
#[derive(Debug, Default, Clone, PartialEq, Eq)]
pub struct SweepReport {
    pub expired: Vec<String>,
    /// Entries found at quorum (e.g. restored from disk) and executed
    pub confirmed: Vec<String>,
    pub rejected: Vec<String>,
}

impl SweepReport {
    pub fn is_empty(&self) -> bool {
        self.expired.is_empty() && self.confirmed.is_empty() && self.rejected.is_empty()
    }
}

/// Run one sweep over every pooled entry
pub fn sweep(pool: &PendingPool, executor: &QuorumExecutor, now: DateTime<Utc>) -> SweepReport {
    let mut report = SweepReport::default();

    for entry in pool.entries() {
        let (evaluation, resolution) = {
            let mut tx = lock_entry(&entry);
            let evaluation = executor.evaluate(&mut tx, now);
            let resolution = evaluation.is_resolution().then(|| Resolution::of(&tx));
            (evaluation, resolution)
        };

        let Some(resolution) = resolution else {
            continue;
        };
        let id = resolution.transaction_id.clone();
        pool.retire(resolution);

        match evaluation {
            Evaluation::Expired => report.expired.push(id),
            Evaluation::Confirmed => report.confirmed.push(id),
            Evaluation::Rejected(_) => report.rejected.push(id),
            Evaluation::StillPending | Evaluation::Unchanged => {}
        }
    }

    if !report.is_empty() {
        log::info!(
            "Sweep: {} expired, {} confirmed, {} rejected, {} still pending",
            report.expired.len(),
            report.confirmed.len(),
            report.rejected.len(),
            pool.len()
        );
    }
    report
}

/// Handle to a running sweeper task
pub struct SweeperHandle {
    shutdown_tx: mpsc::Sender<()>,
    task: JoinHandle<()>,
}

impl SweeperHandle {
    /// Stop the sweeper and wait for the task to finish
    pub async fn shutdown(self) {
        let _ = self.shutdown_tx.send(()).await;
        if let Err(e) = self.task.await {
            log::warn!("Sweeper task ended abnormally: {}", e);
        }
    }
}

/// Spawn a task that sweeps the engine's pool every `period`
pub fn spawn(engine: Arc<MultisigEngine>, period: Duration) -> SweeperHandle {
    let (shutdown_tx, mut shutdown_rx) = mpsc::channel::<()>(1);

    let task = tokio::spawn(async move {
        let mut ticker = tokio::time::interval(period);
        ticker.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        log::info!("Sweeper started (every {:?})", period);

        loop {
            tokio::select! {
                _ = ticker.tick() => {
                    engine.sweep_expired();
                }
                _ = shutdown_rx.recv() => {
                    log::info!("Sweeper shutting down...");
                    break;
                }
            }
        }
    });

    SweeperHandle { shutdown_tx, task }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::config::EngineConfig;
    use crate::crypto::KeyPair;
    use crate::ledger::InMemoryLedger;
    use crate::multisig::clock::ManualClock;
    use crate::multisig::transaction::{sign_pending, NewPending, Payload, PendingStatus, PendingTransaction};
    use std::collections::BTreeSet;

    fn transfer(ledger: &InMemoryLedger, required_min: usize, lifetime_hours: u32) -> (PendingTransaction, Vec<KeyPair>) {
        let sender = KeyPair::generate();
        ledger.open_account(&sender.public_key_hex()).unwrap();
        ledger.credit(&sender.address(), 1_000).unwrap();
        let members: Vec<KeyPair> = (0..2).map(|_| KeyPair::generate()).collect();
        let tx = PendingTransaction::new(
            NewPending {
                sender_public_key: sender.public_key_hex(),
                sender_address: sender.address(),
                payload: Payload::Transfer {
                    amount: 100,
                    recipient_address: KeyPair::generate().address(),
                },
                min: required_min,
                lifetime_hours,
                required_min,
                eligible_signers: members.iter().map(|k| k.public_key_hex()).collect::<BTreeSet<_>>(),
                fee: 1,
                request_signature: hex::encode(rand::random::<[u8; 8]>()),
            },
            Utc::now(),
        );
        (tx, members)
    }

    #[test]
    fn test_sweep_expires_only_overdue() {
        let ledger = Arc::new(InMemoryLedger::new());
        let executor = QuorumExecutor::new(ledger.clone());
        let pool = PendingPool::new(16);

        let (short, _) = transfer(&ledger, 1, 1);
        let (long, _) = transfer(&ledger, 1, 3);
        let short_id = short.id.clone();
        let deadline = short.expires_at;
        pool.insert(short).unwrap();
        pool.insert(long).unwrap();

        let report = sweep(&pool, &executor, deadline);
        assert_eq!(report.expired, vec![short_id.clone()]);
        assert_eq!(pool.len(), 1);
        assert_eq!(pool.resolution(&short_id).unwrap().status, PendingStatus::Expired);

        assert!(sweep(&pool, &executor, deadline).is_empty());
    }

    #[test]
    fn test_sweep_executes_restored_quorum() {
        let ledger = Arc::new(InMemoryLedger::new());
        let executor = QuorumExecutor::new(ledger.clone());
        let pool = PendingPool::new(16);

        let (mut tx, members) = transfer(&ledger, 1, 1);
        let sig = sign_pending(&tx, &members[0]).unwrap();
        tx.add_signature(&members[0].public_key_hex(), &sig, Utc::now())
            .unwrap();
        let id = tx.id.clone();
        let created = tx.created_at;
        pool.restore(vec![tx]);

        let report = sweep(&pool, &executor, created);
        assert_eq!(report.confirmed, vec![id]);
        assert!(pool.is_empty());
    }

    #[test]
    fn test_sweep_and_sign_race_resolves_once() {
        use crate::multisig::collector::SignatureCollector;

        for _ in 0..20 {
            let ledger = Arc::new(InMemoryLedger::new());
            let executor = QuorumExecutor::new(ledger.clone());
            let pool = PendingPool::new(16);

            let (tx, members) = transfer(&ledger, 1, 1);
            let id = tx.id.clone();
            let recipient = match &tx.payload {
                Payload::Transfer {
                    recipient_address, ..
                } => recipient_address.clone(),
                Payload::Registration(_) => unreachable!(),
            };
            let signer = members[0].public_key_hex();
            let signature = sign_pending(&tx, &members[0]).unwrap();
            // The signer arrives just inside the lifetime, the sweeper right at the deadline
            let sign_at = tx.expires_at - chrono::Duration::nanoseconds(1);
            let sweep_at = tx.expires_at;
            pool.insert(tx).unwrap();

            let (signed, report) = std::thread::scope(|scope| {
                let signing = scope.spawn(|| {
                    SignatureCollector::new(&pool, &executor).submit(&id, &signer, &signature, sign_at)
                });
                let sweeping = scope.spawn(|| sweep(&pool, &executor, sweep_at));
                (signing.join().unwrap(), sweeping.join().unwrap())
            });

            let confirmed = matches!(&signed, Ok(outcome) if outcome.confirmed);
            let expired = report.expired.contains(&id);
            assert!(confirmed != expired, "signed={:?} report={:?}", signed, report);

            let status = pool.resolution(&id).unwrap().status;
            if confirmed {
                assert_eq!(status, PendingStatus::Confirmed);
                assert_eq!(ledger.balance(&recipient), 100);
            } else {
                assert_eq!(status, PendingStatus::Expired);
                assert_eq!(ledger.balance(&recipient), 0);
            }
            assert!(pool.is_empty());
        }
    }

    #[tokio::test]
    async fn test_spawned_sweeper_expires_and_stops() {
        let ledger = Arc::new(InMemoryLedger::new());
        let clock = Arc::new(ManualClock::new(Utc::now()));
        let pool = Arc::new(PendingPool::new(16));
        let engine = Arc::new(MultisigEngine::with_clock(
            EngineConfig::default(),
            ledger.clone(),
            pool.clone(),
            clock.clone(),
        ));

        let (tx, _) = transfer(&ledger, 1, 1);
        clock.set(tx.expires_at);
        pool.insert(tx).unwrap();

        let handle = spawn(engine, Duration::from_millis(10));
        for _ in 0..100 {
            if pool.is_empty() {
                break;
            }
            tokio::time::sleep(Duration::from_millis(10)).await;
        }
        handle.shutdown().await;
        assert!(pool.is_empty());
    }
}
