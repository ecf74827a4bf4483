//! Keygroup validation and transfer admission
//!
//! Pure checks run before a request becomes a pending transaction. Nothing
//! here touches the pool or the ledger; a rejected request leaves no trace.

use crate::config::EngineConfig;
use crate::crypto::{is_valid_address, normalize_public_key, verify_signature};
use crate::ledger::{Account, MultisigConfig};
use crate::multisig::error::MultisigError;
use crate::multisig::transaction::{registration_digest, transfer_digest, RegistrationRequest, TransferRequest};
use serde_json::Value;
use std::collections::BTreeSet;

/// A registration that passed every check
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedRegistration {
    pub config: MultisigConfig,
    /// `base_fee * (|keygroup| + 1)`
    pub fee: u64,
}

/// A transfer proposal that passed admission
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct ValidatedTransfer {
    pub amount: u64,
    pub recipient_address: String,
    pub fee: u64,
    /// The sender's current keygroup configuration
    pub config: MultisigConfig,
}

/// Validates multisignature registrations and spends against the engine limits
pub struct KeygroupValidator<'a> {
    config: &'a EngineConfig,
}

impl<'a> KeygroupValidator<'a> {
    pub fn new(config: &'a EngineConfig) -> Self {
        Self { config }
    }

    /// Validate a registration request from `sender`.
    ///
    /// Checks run in order: existing configuration, keygroup, threshold,
    /// lifetime, balance, signature.
    pub fn validate_registration(
        &self,
        request: &RegistrationRequest,
        sender: &Account,
        sender_public_key: &str,
    ) -> Result<ValidatedRegistration, MultisigError> {
        if sender.is_multisig() {
            return Err(MultisigError::validation(
                "senderPublicKey",
                "account already has a multisignature configuration",
            ));
        }

        let (keygroup, raw_entries) = parse_keygroup(
            request.keysgroup.as_ref(),
            sender_public_key,
            self.config.max_keygroup_size,
        )?;
        let min = parse_bounded_int("min", request.min.as_ref(), 1, keygroup.len() as i64)?;
        let lifetime = parse_bounded_int(
            "lifetime",
            request.lifetime.as_ref(),
            1,
            self.config.max_lifetime_hours,
        )?;

        let fee = self.config.fees.registration_fee(keygroup.len());
        if sender.balance < fee {
            return Err(MultisigError::InsufficientFunds {
                needed: fee,
                available: sender.balance,
            });
        }

        let digest = registration_digest(
            &request.sender_public_key,
            request.timestamp,
            min,
            lifetime,
            &raw_entries,
        );
        check_sender_signature(&request.sender_public_key, &digest, &request.signature)?;

        Ok(ValidatedRegistration {
            config: MultisigConfig {
                min: min as usize,
                lifetime_hours: lifetime as u32,
                keygroup,
            },
            fee,
        })
    }

    /// Admission rules for a spend from an existing multisig account
    pub fn validate_transfer(
        &self,
        request: &TransferRequest,
        sender: &Account,
    ) -> Result<ValidatedTransfer, MultisigError> {
        let config = sender.multisig.clone().ok_or_else(|| {
            MultisigError::validation(
                "senderPublicKey",
                "account has no multisignature configuration",
            )
        })?;

        if request.amount == 0 {
            return Err(MultisigError::validation("amount", "must be greater than zero"));
        }
        if !is_valid_address(&request.recipient_address) {
            return Err(MultisigError::validation(
                "recipientAddress",
                format!("malformed address {}", request.recipient_address),
            ));
        }

        let fee = self.config.fees.transfer_fee;
        let needed = request.amount.saturating_add(fee);
        if sender.balance < needed {
            return Err(MultisigError::InsufficientFunds {
                needed,
                available: sender.balance,
            });
        }

        let digest = transfer_digest(
            &request.sender_public_key,
            request.timestamp,
            request.amount,
            &request.recipient_address,
        );
        check_sender_signature(&request.sender_public_key, &digest, &request.signature)?;

        Ok(ValidatedTransfer {
            amount: request.amount,
            recipient_address: request.recipient_address.clone(),
            fee,
            config,
        })
    }
}

fn check_sender_signature(
    public_key: &str,
    digest: &[u8],
    signature: &str,
) -> Result<(), MultisigError> {
    match verify_signature(public_key, digest, signature) {
        Ok(true) => Ok(()),
        Ok(false) => Err(MultisigError::Unauthorized(
            "sender signature does not match request".to_string(),
        )),
        Err(e) => Err(MultisigError::Unauthorized(e.to_string())),
    }
}

/// Parse an integer field and check `lo <= value <= hi`
pub fn parse_bounded_int(
    field: &'static str,
    value: Option<&Value>,
    lo: i64,
    hi: i64,
) -> Result<i64, MultisigError> {
    let value = match value {
        None | Some(Value::Null) => return Err(MultisigError::validation(field, "missing")),
        Some(value) => value,
    };
    let number = match value {
        Value::Number(n) => n
            .as_i64()
            .ok_or_else(|| MultisigError::validation(field, format!("{} is not an integer", n)))?,
        other => {
            return Err(MultisigError::validation(
                field,
                format!("expected an integer, got {}", other),
            ))
        }
    };

    if number < lo {
        return Err(MultisigError::validation(
            field,
            format!("{} is below the minimum of {}", number, lo),
        ));
    }
    if number > hi {
        return Err(MultisigError::validation(
            field,
            format!("{} exceeds the maximum of {}", number, hi),
        ));
    }
    Ok(number)
}

/// Parse a keygroup into its net member set.
///
/// Entries are applied in order to an empty set: `+key` or a bare key adds,
/// `-key` removes. Also returns the raw entries, which the sender signed.
pub fn parse_keygroup(
    value: Option<&Value>,
    sender_public_key: &str,
    max_size: usize,
) -> Result<(BTreeSet<String>, Vec<String>), MultisigError> {
    const FIELD: &str = "keysgroup";

    let entries = match value {
        None | Some(Value::Null) => return Err(MultisigError::validation(FIELD, "missing")),
        Some(Value::Array(entries)) => entries,
        Some(other) => {
            return Err(MultisigError::validation(
                FIELD,
                format!("expected an array, got {}", other),
            ))
        }
    };
    if entries.is_empty() {
        return Err(MultisigError::validation(FIELD, "must not be empty"));
    }

    let mut raw = Vec::with_capacity(entries.len());
    let mut members = BTreeSet::new();

    for entry in entries {
        let entry = entry
            .as_str()
            .ok_or_else(|| MultisigError::validation(FIELD, "entries must be strings"))?;
        raw.push(entry.to_string());

        let (adding, key) = match entry.as_bytes().first() {
            Some(b'+') => (true, &entry[1..]),
            Some(b'-') => (false, &entry[1..]),
            _ => (true, entry),
        };
        let key = normalize_public_key(key)
            .map_err(|e| MultisigError::validation(FIELD, format!("{}: {}", entry, e)))?;

        if key == sender_public_key {
            return Err(MultisigError::validation(
                FIELD,
                "the sender may not be a member of its own keygroup",
            ));
        }

        if adding {
            if !members.insert(key) {
                return Err(MultisigError::validation(
                    FIELD,
                    format!("duplicate member {}", entry),
                ));
            }
        } else if !members.remove(&key) {
            return Err(MultisigError::validation(
                FIELD,
                format!("cannot remove {}: not a member", entry),
            ));
        }
    }

    if members.is_empty() {
        return Err(MultisigError::validation(FIELD, "no members remain"));
    }
    if members.len() > max_size {
        return Err(MultisigError::validation(
            FIELD,
            format!("{} members exceeds the maximum of {}", members.len(), max_size),
        ));
    }

    Ok((members, raw))
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::KeyPair;
    use crate::multisig::error::ErrorKind;
    use serde_json::json;

    struct Fixture {
        config: EngineConfig,
        sender: KeyPair,
        account: Account,
        members: Vec<KeyPair>,
    }

    impl Fixture {
        fn new(member_count: usize) -> Self {
            let sender = KeyPair::generate();
            let mut account = Account::new(sender.address(), Some(sender.public_key_hex()));
            account.balance = u64::MAX / 2;
            Self {
                config: EngineConfig::default(),
                sender,
                account,
                members: (0..member_count).map(|_| KeyPair::generate()).collect(),
            }
        }

        fn keysgroup(&self) -> Vec<String> {
            self.members
                .iter()
                .map(|k| format!("+{}", k.public_key_hex()))
                .collect()
        }

        fn validate(&self, request: &RegistrationRequest) -> Result<ValidatedRegistration, MultisigError> {
            KeygroupValidator::new(&self.config).validate_registration(
                request,
                &self.account,
                &self.sender.public_key_hex(),
            )
        }

        fn raw(&self, min: Value, lifetime: Value, keysgroup: Value) -> RegistrationRequest {
            RegistrationRequest {
                sender_public_key: self.sender.public_key_hex(),
                timestamp: 0,
                min: Some(min),
                lifetime: Some(lifetime),
                keysgroup: Some(keysgroup),
                signature: String::new(),
            }
        }
    }

    fn field_of(err: MultisigError) -> &'static str {
        match err {
            MultisigError::Validation { field, .. } => field,
            other => panic!("expected validation error, got {:?}", other),
        }
    }

    #[test]
    fn test_valid_registration() {
        let fx = Fixture::new(5);
        let request = RegistrationRequest::signed(&fx.sender, 3, 1, fx.keysgroup()).unwrap();

        let validated = fx.validate(&request).unwrap();
        assert_eq!(validated.config.min, 3);
        assert_eq!(validated.config.lifetime_hours, 1);
        assert_eq!(validated.config.keygroup.len(), 5);
        assert_eq!(validated.fee, fx.config.fees.multisig_base_fee * 6);
    }

    #[test]
    fn test_sender_in_keygroup_rejected() {
        let fx = Fixture::new(3);
        let mut keys = fx.keysgroup();
        keys.push(format!("+{}", fx.sender.public_key_hex()));
        let request = RegistrationRequest::signed(&fx.sender, 2, 1, keys).unwrap();

        assert_eq!(field_of(fx.validate(&request).unwrap_err()), "keysgroup");
    }

    #[test]
    fn test_keysgroup_shape_rejected() {
        let fx = Fixture::new(3);
        let cases = vec![
            json!([]),
            json!("not-an-array"),
            json!([1, 2]),
            json!(["+1234"]),
        ];
        for keys in cases {
            let request = fx.raw(json!(1), json!(1), keys);
            assert_eq!(field_of(fx.validate(&request).unwrap_err()), "keysgroup");
        }

        let mut missing = fx.raw(json!(1), json!(1), json!([]));
        missing.keysgroup = None;
        assert_eq!(field_of(fx.validate(&missing).unwrap_err()), "keysgroup");
    }

    #[test]
    fn test_duplicate_and_removed_members() {
        let fx = Fixture::new(2);
        let a = fx.members[0].public_key_hex();
        let b = fx.members[1].public_key_hex();

        let dup = fx.raw(json!(1), json!(1), json!([format!("+{}", a), a.clone()]));
        assert_eq!(field_of(fx.validate(&dup).unwrap_err()), "keysgroup");

        let missing_removal = fx.raw(json!(1), json!(1), json!([format!("-{}", b)]));
        assert_eq!(field_of(fx.validate(&missing_removal).unwrap_err()), "keysgroup");

        let emptied = fx.raw(json!(1), json!(1), json!([format!("+{}", a), format!("-{}", a)]));
        assert_eq!(field_of(fx.validate(&emptied).unwrap_err()), "keysgroup");

        let (members, raw) = parse_keygroup(
            Some(&json!([format!("+{}", a), format!("+{}", b), format!("-{}", a)])),
            &fx.sender.public_key_hex(),
            15,
        )
        .unwrap();
        assert_eq!(members.into_iter().collect::<Vec<_>>(), vec![b]);
        assert_eq!(raw.len(), 3);
    }

    #[test]
    fn test_keygroup_size_limit() {
        let mut fx = Fixture::new(4);
        fx.config.max_keygroup_size = 3;
        let request = RegistrationRequest::signed(&fx.sender, 2, 1, fx.keysgroup()).unwrap();
        assert_eq!(field_of(fx.validate(&request).unwrap_err()), "keysgroup");
    }

    #[test]
    fn test_min_rejected() {
        let fx = Fixture::new(3);
        let keys = json!(fx.keysgroup());
        for min in [json!(0), json!(-1), json!(4), json!("2"), json!(1.5), Value::Null] {
            let request = fx.raw(min, json!(1), keys.clone());
            assert_eq!(field_of(fx.validate(&request).unwrap_err()), "min");
        }
    }

    #[test]
    fn test_lifetime_rejected() {
        let fx = Fixture::new(3);
        let keys = json!(fx.keysgroup());
        for lifetime in [json!(0), json!(-1), json!(99_999_999), json!("1"), Value::Null] {
            let request = fx.raw(json!(2), lifetime, keys.clone());
            assert_eq!(field_of(fx.validate(&request).unwrap_err()), "lifetime");
        }

        let at_max = RegistrationRequest::signed(&fx.sender, 2, 72, fx.keysgroup()).unwrap();
        assert!(fx.validate(&at_max).is_ok());
    }

    #[test]
    fn test_insufficient_balance_rejected() {
        let mut fx = Fixture::new(3);
        fx.account.balance = fx.config.fees.registration_fee(3) - 1;
        let request = RegistrationRequest::signed(&fx.sender, 2, 1, fx.keysgroup()).unwrap();
        assert_eq!(
            fx.validate(&request).unwrap_err().kind(),
            ErrorKind::InsufficientFunds
        );
    }

    #[test]
    fn test_bad_sender_signature_rejected() {
        let fx = Fixture::new(3);
        let mut request = RegistrationRequest::signed(&fx.sender, 2, 1, fx.keysgroup()).unwrap();
        request.min = Some(json!(1));
        assert_eq!(
            fx.validate(&request).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );
    }

    #[test]
    fn test_already_multisig_rejected() {
        let mut fx = Fixture::new(3);
        fx.account.multisig = Some(MultisigConfig {
            min: 1,
            lifetime_hours: 1,
            keygroup: BTreeSet::new(),
        });
        let request = RegistrationRequest::signed(&fx.sender, 2, 1, fx.keysgroup()).unwrap();
        assert_eq!(field_of(fx.validate(&request).unwrap_err()), "senderPublicKey");
    }

    #[test]
    fn test_transfer_admission() {
        let mut fx = Fixture::new(3);
        let validator = KeygroupValidator::new(&fx.config);
        let recipient = KeyPair::generate().address();

        let request = TransferRequest::signed(&fx.sender, 100, &recipient).unwrap();
        assert_eq!(
            field_of(validator.validate_transfer(&request, &fx.account).unwrap_err()),
            "senderPublicKey"
        );

        fx.account.multisig = Some(MultisigConfig {
            min: 2,
            lifetime_hours: 1,
            keygroup: fx.members.iter().map(|k| k.public_key_hex()).collect(),
        });
        let validator = KeygroupValidator::new(&fx.config);
        let admitted = validator.validate_transfer(&request, &fx.account).unwrap();
        assert_eq!(admitted.amount, 100);
        assert_eq!(admitted.config.min, 2);

        let zero = TransferRequest::signed(&fx.sender, 0, &recipient).unwrap();
        assert_eq!(field_of(validator.validate_transfer(&zero, &fx.account).unwrap_err()), "amount");

        let bad_address = TransferRequest::signed(&fx.sender, 1, "nowhere").unwrap();
        assert_eq!(
            field_of(validator.validate_transfer(&bad_address, &fx.account).unwrap_err()),
            "recipientAddress"
        );

        let mut forged = request.clone();
        forged.amount = 101;
        assert_eq!(
            validator.validate_transfer(&forged, &fx.account).unwrap_err().kind(),
            ErrorKind::Unauthorized
        );

        fx.account.balance = 50;
        let validator = KeygroupValidator::new(&fx.config);
        assert_eq!(
            validator.validate_transfer(&request, &fx.account).unwrap_err().kind(),
            ErrorKind::InsufficientFunds
        );
    }
}
