//! Pending multi-signature transactions
//!
//! A registration or transfer waiting for keygroup co-signatures, plus the
//! signed requests that create them.

use crate::crypto::{digest_fields, sha256, KeyError, KeyPair};
use crate::ledger::MultisigConfig;
use crate::multisig::error::MultisigError;
use chrono::{DateTime, Duration, Utc};
use serde::{Deserialize, Serialize};
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet};

/// Kind of pending transaction
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum TransactionKind {
    Registration,
    Transfer,
}

/// Effect applied when quorum is reached
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq, Eq)]
#[serde(tag = "kind", rename_all = "snake_case")]
pub enum Payload {
    /// Attach this configuration to the sender's account
    Registration(MultisigConfig),
    /// Move funds out of the sender's multisig account
    Transfer {
        amount: u64,
        recipient_address: String,
    },
}

impl Payload {
    pub fn kind(&self) -> TransactionKind {
        match self {
            Payload::Registration(_) => TransactionKind::Registration,
            Payload::Transfer { .. } => TransactionKind::Transfer,
        }
    }

    /// Canonical fields covered by signatures over this payload
    fn signing_fields(&self) -> Vec<String> {
        match self {
            Payload::Registration(config) => {
                let keys: Vec<&str> = config.keygroup.iter().map(String::as_str).collect();
                vec![
                    "registration".to_string(),
                    config.min.to_string(),
                    config.lifetime_hours.to_string(),
                    keys.join(","),
                ]
            }
            Payload::Transfer {
                amount,
                recipient_address,
            } => vec![
                "transfer".to_string(),
                amount.to_string(),
                recipient_address.clone(),
            ],
        }
    }
}

/// Status of a pending multisig transaction
#[derive(Clone, Copy, Debug, Serialize, Deserialize, PartialEq, Eq, Hash)]
#[serde(rename_all = "SCREAMING_SNAKE_CASE")]
pub enum PendingStatus {
    /// Waiting for more signatures
    Pending,
    /// Quorum reached and the effect was applied
    Confirmed,
    /// Lifetime ran out before quorum
    Expired,
    /// The ledger refused to apply the effect
    Rejected,
}

impl PendingStatus {
    pub fn is_terminal(&self) -> bool {
        *self != PendingStatus::Pending
    }
}

/// A transaction pending signature collection
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PendingTransaction {
    /// Unique transaction ID
    pub id: String,
    pub sender_public_key: String,
    pub sender_address: String,
    pub payload: Payload,
    /// Threshold configured for the keygroup
    pub min: usize,
    pub lifetime_hours: u32,
    /// Signatures that must be collected before execution
    pub required_min: usize,
    pub eligible_signers: BTreeSet<String>,
    /// Collected signatures, signer key -> hex signature
    pub signatures: BTreeMap<String, String>,
    /// Fee the ledger charges on execution
    pub fee: u64,
    pub status: PendingStatus,
    pub failure_reason: Option<String>,
    pub created_at: DateTime<Utc>,
    pub expires_at: DateTime<Utc>,
    pub updated_at: DateTime<Utc>,
}

/// Everything needed to create a pending transaction
#[derive(Clone, Debug)]
pub struct NewPending {
    pub sender_public_key: String,
    pub sender_address: String,
    pub payload: Payload,
    pub min: usize,
    pub lifetime_hours: u32,
    pub required_min: usize,
    pub eligible_signers: BTreeSet<String>,
    pub fee: u64,
    /// Sender's request signature, mixed into the id
    pub request_signature: String,
}

impl PendingTransaction {
    /// Create a new pending transaction
    pub fn new(new: NewPending, now: DateTime<Utc>) -> Self {
        let mut id_fields = vec![new.sender_public_key.clone()];
        id_fields.extend(new.payload.signing_fields());
        id_fields.push(now.timestamp_nanos_opt().unwrap_or(0).to_string());
        id_fields.push(new.request_signature);
        // Resubmitting an identical signed request must still get a fresh id
        id_fields.push(hex::encode(rand::random::<[u8; 16]>()));
        let id = hex::encode(&digest_fields(&id_fields)[..16]);

        Self {
            id,
            sender_public_key: new.sender_public_key,
            sender_address: new.sender_address,
            payload: new.payload,
            min: new.min,
            lifetime_hours: new.lifetime_hours,
            required_min: new.required_min,
            eligible_signers: new.eligible_signers,
            signatures: BTreeMap::new(),
            fee: new.fee,
            status: PendingStatus::Pending,
            failure_reason: None,
            created_at: now,
            expires_at: expiry_for(now, new.lifetime_hours).unwrap_or(DateTime::<Utc>::MAX_UTC),
            updated_at: now,
        }
    }

    pub fn kind(&self) -> TransactionKind {
        self.payload.kind()
    }

    /// Digest every co-signer signs
    pub fn signing_digest(&self) -> Vec<u8> {
        let mut fields = vec![
            "multisig-sign".to_string(),
            self.id.clone(),
            self.sender_public_key.clone(),
        ];
        fields.extend(self.payload.signing_fields());
        digest_fields(&fields)
    }

    pub fn is_pending(&self) -> bool {
        self.status == PendingStatus::Pending
    }

    /// The deadline is inclusive: at `expires_at` the entry is already expired
    pub fn is_expired(&self, now: DateTime<Utc>) -> bool {
        now >= self.expires_at
    }

    pub fn signature_count(&self) -> usize {
        self.signatures.len()
    }

    pub fn has_quorum(&self) -> bool {
        self.signatures.len() >= self.required_min
    }

    /// Signers who have already signed
    pub fn signed_by(&self) -> Vec<&str> {
        self.signatures.keys().map(String::as_str).collect()
    }

    /// Add a signature from an eligible signer.
    ///
    /// Checks eligibility, then duplicates, then the proof itself. Nothing
    /// changes unless every check passes.
    pub fn add_signature(
        &mut self,
        signer: &str,
        signature: &str,
        now: DateTime<Utc>,
    ) -> Result<(), MultisigError> {
        if !self.is_pending() {
            return Err(MultisigError::NotFound(self.id.clone()));
        }
        if !self.eligible_signers.contains(signer) {
            return Err(MultisigError::InvalidSigner(signer.to_string()));
        }
        if self.signatures.contains_key(signer) {
            return Err(MultisigError::Duplicate(format!(
                "{} already signed {}",
                signer, self.id
            )));
        }

        let verified = crate::crypto::verify_signature(signer, &self.signing_digest(), signature)
            .map_err(|e| MultisigError::Unauthorized(e.to_string()))?;
        if !verified {
            return Err(MultisigError::Unauthorized(format!(
                "signature from {} does not match transaction {}",
                signer, self.id
            )));
        }

        self.signatures.insert(signer.to_string(), signature.to_string());
        self.updated_at = now;
        Ok(())
    }

    /// Re-check the invariants a freshly created entry holds by construction.
    /// Used on entries that come back from outside the engine (snapshots).
    pub fn check_integrity(&self) -> Result<(), MultisigError> {
        let eligible = self.eligible_signers.len();
        if self.required_min < 1 || self.required_min > eligible {
            return Err(MultisigError::validation(
                "requiredMin",
                format!("{} is outside 1..={}", self.required_min, eligible),
            ));
        }
        if self.min < 1 || self.min > eligible {
            return Err(MultisigError::validation(
                "min",
                format!("{} is outside 1..={}", self.min, eligible),
            ));
        }
        if self.eligible_signers.contains(&self.sender_public_key) {
            return Err(MultisigError::validation(
                "eligibleSigners",
                "the sender may not co-sign its own transaction",
            ));
        }
        if self.lifetime_hours < 1 || self.expires_at <= self.created_at {
            return Err(MultisigError::validation("lifetime", "deadline is not after creation"));
        }
        if let Payload::Registration(config) = &self.payload {
            if config.keygroup != self.eligible_signers || config.min != self.min {
                return Err(MultisigError::validation(
                    "payload",
                    "registration does not match its signer set",
                ));
            }
        }

        let digest = self.signing_digest();
        for (signer, signature) in &self.signatures {
            if !self.eligible_signers.contains(signer) {
                return Err(MultisigError::InvalidSigner(signer.clone()));
            }
            if !crate::crypto::verify_signature(signer, &digest, signature).unwrap_or(false) {
                return Err(MultisigError::Unauthorized(format!(
                    "stored signature from {} does not verify",
                    short_key(signer)
                )));
            }
        }
        Ok(())
    }

    /// Move out of PENDING. Returns false if the entry already left PENDING,
    /// in which case nothing changes.
    pub fn transition(&mut self, target: PendingStatus, now: DateTime<Utc>) -> bool {
        if !self.is_pending() || !target.is_terminal() {
            return false;
        }
        self.status = target;
        self.updated_at = now;
        true
    }

    /// Mark rejected with the ledger's reason
    pub fn reject(&mut self, reason: String, now: DateTime<Utc>) -> bool {
        if !self.transition(PendingStatus::Rejected, now) {
            return false;
        }
        self.failure_reason = Some(reason);
        true
    }
}

/// Deadline for an entry created at `now`, or `None` if it is past the
/// representable date range
pub fn expiry_for(now: DateTime<Utc>, lifetime_hours: u32) -> Option<DateTime<Utc>> {
    now.checked_add_signed(Duration::hours(i64::from(lifetime_hours)))
}

/// Helper to create a co-signature for a pending transaction
pub fn sign_pending(pending: &PendingTransaction, key_pair: &KeyPair) -> Result<String, KeyError> {
    key_pair.sign_digest(&pending.signing_digest())
}

/// Digest the sender signs for a registration request
pub fn registration_digest(
    sender_public_key: &str,
    timestamp: i64,
    min: i64,
    lifetime: i64,
    keysgroup: &[String],
) -> Vec<u8> {
    digest_fields([
        "multisig-register".to_string(),
        sender_public_key.to_string(),
        timestamp.to_string(),
        min.to_string(),
        lifetime.to_string(),
        keysgroup.join(","),
    ])
}

/// Digest the sender signs for a transfer proposal
pub fn transfer_digest(
    sender_public_key: &str,
    timestamp: i64,
    amount: u64,
    recipient_address: &str,
) -> Vec<u8> {
    digest_fields([
        "multisig-transfer",
        sender_public_key,
        timestamp.to_string().as_str(),
        amount.to_string().as_str(),
        recipient_address,
    ])
}

/// Registration request as received from the transport.
///
/// `min`, `lifetime` and `keysgroup` stay untyped until validation so that
/// missing, string and fractional values get a field-specific rejection.
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct RegistrationRequest {
    pub sender_public_key: String,
    /// Unix seconds at which the sender signed
    pub timestamp: i64,
    #[serde(default)]
    pub min: Option<Value>,
    /// Lifetime in hours
    #[serde(default)]
    pub lifetime: Option<Value>,
    /// Member keys, each optionally prefixed with `+` or `-`
    #[serde(default)]
    pub keysgroup: Option<Value>,
    pub signature: String,
}

impl RegistrationRequest {
    /// Build and sign a request
    pub fn signed(
        sender: &KeyPair,
        min: i64,
        lifetime: i64,
        keysgroup: Vec<String>,
    ) -> Result<Self, KeyError> {
        let sender_public_key = sender.public_key_hex();
        let timestamp = Utc::now().timestamp();
        let signature = sender.sign_digest(&registration_digest(
            &sender_public_key,
            timestamp,
            min,
            lifetime,
            &keysgroup,
        ))?;
        Ok(Self {
            sender_public_key,
            timestamp,
            min: Some(Value::from(min)),
            lifetime: Some(Value::from(lifetime)),
            keysgroup: Some(Value::from(keysgroup)),
            signature,
        })
    }
}

/// Spend proposal from an account that already has a keygroup
#[derive(Clone, Debug, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct TransferRequest {
    pub sender_public_key: String,
    /// Unix seconds at which the sender signed
    pub timestamp: i64,
    pub amount: u64,
    pub recipient_address: String,
    pub signature: String,
}

impl TransferRequest {
    pub fn signed(sender: &KeyPair, amount: u64, recipient_address: &str) -> Result<Self, KeyError> {
        let sender_public_key = sender.public_key_hex();
        let timestamp = Utc::now().timestamp();
        let signature = sender.sign_digest(&transfer_digest(
            &sender_public_key,
            timestamp,
            amount,
            recipient_address,
        ))?;
        Ok(Self {
            sender_public_key,
            timestamp,
            amount,
            recipient_address: recipient_address.to_string(),
            signature,
        })
    }
}

/// Short stable fingerprint of a key for log lines
pub(crate) fn short_key(public_key: &str) -> String {
    hex::encode(&sha256(public_key.as_bytes())[..4])
}
