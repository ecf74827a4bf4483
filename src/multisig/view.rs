//! Transport-facing views
//!
//! Serializable shapes handed to whatever transport sits in front of the
//! engine: the pending listing and the success/failure envelope.

use crate::multisig::error::{ErrorKind, MultisigError};
use crate::multisig::transaction::{Payload, PendingTransaction, TransactionKind};
use serde::{Deserialize, Serialize};
use serde_json::{json, Value};

/// Transaction details inside a pending listing
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct TransactionView {
    pub id: String,
    #[serde(rename = "type")]
    pub kind: TransactionKind,
    /// Zero for registrations
    pub amount: u64,
    pub fee: u64,
    pub sender_public_key: String,
    pub recipient_id: Option<String>,
    pub asset: Value,
    /// Creation time, unix seconds
    pub timestamp: i64,
    pub expires_at: i64,
    /// Keys that have co-signed so far
    pub signatures: Vec<String>,
}

/// One entry of `list_pending`
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
#[serde(rename_all = "camelCase")]
pub struct PendingSummary {
    pub transaction_id: String,
    /// Lifetime in hours
    pub lifetime: u32,
    pub min: usize,
    pub transaction: TransactionView,
}

impl From<&PendingTransaction> for PendingSummary {
    fn from(tx: &PendingTransaction) -> Self {
        let (amount, recipient_id, asset) = match &tx.payload {
            Payload::Registration(config) => {
                let keysgroup: Vec<String> =
                    config.keygroup.iter().map(|k| format!("+{}", k)).collect();
                (
                    0,
                    None,
                    json!({
                        "multisignature": {
                            "min": config.min,
                            "lifetime": config.lifetime_hours,
                            "keysgroup": keysgroup,
                        }
                    }),
                )
            }
            Payload::Transfer {
                amount,
                recipient_address,
            } => (*amount, Some(recipient_address.clone()), json!({})),
        };

        Self {
            transaction_id: tx.id.clone(),
            lifetime: tx.lifetime_hours,
            min: tx.min,
            transaction: TransactionView {
                id: tx.id.clone(),
                kind: tx.kind(),
                amount,
                fee: tx.fee,
                sender_public_key: tx.sender_public_key.clone(),
                recipient_id,
                asset,
                timestamp: tx.created_at.timestamp(),
                expires_at: tx.expires_at.timestamp(),
                signatures: tx.signatures.keys().cloned().collect(),
            },
        }
    }
}

/// Body of a pending listing response
#[derive(Clone, Debug, Serialize, Deserialize, PartialEq)]
pub struct PendingListing {
    pub transactions: Vec<PendingSummary>,
}

impl From<Vec<PendingSummary>> for PendingListing {
    fn from(transactions: Vec<PendingSummary>) -> Self {
        Self { transactions }
    }
}

/// Response envelope: `success` plus either the payload or a reason.
///
/// The payload is flattened into the envelope, so it must serialize as a map.
#[derive(Clone, Debug, Serialize, PartialEq)]
pub struct ApiResponse<T> {
    pub success: bool,
    #[serde(flatten)]
    pub data: Option<T>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub reason: Option<ErrorKind>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub error: Option<String>,
}

impl<T> From<Result<T, MultisigError>> for ApiResponse<T> {
    fn from(result: Result<T, MultisigError>) -> Self {
        match result {
            Ok(data) => Self {
                success: true,
                data: Some(data),
                reason: None,
                error: None,
            },
            Err(e) => Self {
                success: false,
                data: None,
                reason: Some(e.kind()),
                error: Some(e.to_string()),
            },
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::multisig::collector::SignOutcome;

    #[test]
    fn test_success_envelope_flattens_payload() {
        let response: ApiResponse<SignOutcome> = Ok(SignOutcome {
            transaction_id: "abc".to_string(),
            confirmed: true,
        })
        .into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert_eq!(json["transactionId"], "abc");
        assert_eq!(json["confirmed"], true);
        assert!(json.get("reason").is_none());
    }

    #[test]
    fn test_failure_envelope_has_reason() {
        let response: ApiResponse<SignOutcome> =
            Err(MultisigError::NotFound("abc".to_string())).into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], false);
        assert_eq!(json["reason"], "NOT_FOUND");
        assert!(json["error"].as_str().unwrap().contains("abc"));
    }

    #[test]
    fn test_listing_envelope() {
        let response: ApiResponse<PendingListing> = Ok(PendingListing::from(Vec::new())).into();
        let json = serde_json::to_value(&response).unwrap();
        assert_eq!(json["success"], true);
        assert!(json["transactions"].as_array().unwrap().is_empty());
    }
}
