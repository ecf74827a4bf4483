//! Multisignature authorization
//!
//! Turns an account into an M-of-N keygroup account and holds spends from it
//! until enough keygroup members have co-signed.
//!
//! # Example
//!
//! ```ignore
//! use multisig_engine::multisig::{MultisigEngine, PendingPool, RegistrationRequest};
//!
//! let engine = MultisigEngine::new(config, ledger, Arc::new(PendingPool::default()));
//!
//! // Owner proposes a 2-of-3 keygroup
//! let request = RegistrationRequest::signed(&owner, 2, 24, keysgroup)?;
//! let id = engine.register_multisig(&request)?.transaction_id;
//!
//! // Members co-sign; the second signature applies the registration
//! engine.sign_transaction(&member1, &id, &sig1)?;
//! let outcome = engine.sign_transaction(&member2, &id, &sig2)?;
//! assert!(outcome.confirmed);
//! ```

pub mod clock;
pub mod collector;
pub mod engine;
pub mod error;
pub mod pool;
pub mod quorum;
pub mod sweeper;
pub mod transaction;
pub mod validator;
pub mod view;

pub use clock::{Clock, ManualClock, SystemClock};
pub use collector::{SignOutcome, SignatureCollector};
pub use engine::{MultisigEngine, Submitted, TransactionStatus};
pub use error::{ErrorKind, MultisigError};
pub use pool::{PendingPool, Resolution};
pub use quorum::{Evaluation, QuorumExecutor};
pub use sweeper::{SweepReport, SweeperHandle};
pub use transaction::{
    sign_pending, Payload, PendingStatus, PendingTransaction, RegistrationRequest,
    TransactionKind, TransferRequest,
};
pub use validator::KeygroupValidator;
pub use view::{ApiResponse, PendingListing, PendingSummary, TransactionView};
