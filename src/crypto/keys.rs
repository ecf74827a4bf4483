//! secp256k1 key handling
//!
//! Key pairs, addresses and signature verification for keygroup members.
//! Public keys travel as compressed hex strings (66 characters); signatures
//! travel as hex-encoded compact ECDSA signatures.

use rand::rngs::OsRng;
use ripemd::Ripemd160;
use secp256k1::{ecdsa::Signature, Message, PublicKey, Secp256k1, SecretKey};
use sha2::Digest;
use thiserror::Error;

use super::hash::{double_sha256, sha256};

/// Length of a compressed public key in hex characters
pub const PUBLIC_KEY_HEX_LEN: usize = 66;

/// Version byte for account addresses
const ADDRESS_VERSION: u8 = 0x00;

/// Errors that can occur during key operations
#[derive(Error, Debug)]
pub enum KeyError {
    #[error("Invalid private key")]
    InvalidPrivateKey,
    #[error("Invalid public key: {0}")]
    InvalidPublicKey(String),
    #[error("Invalid signature encoding")]
    InvalidSignature,
    #[error("Secp256k1 error: {0}")]
    Secp256k1Error(#[from] secp256k1::Error),
}

/// A key pair consisting of a private key and its corresponding public key
#[derive(Clone)]
pub struct KeyPair {
    pub secret_key: SecretKey,
    pub public_key: PublicKey,
}

impl KeyPair {
    /// Generate a new random key pair
    pub fn generate() -> Self {
        let secp = Secp256k1::new();
        let (secret_key, public_key) = secp.generate_keypair(&mut OsRng);
        Self {
            secret_key,
            public_key,
        }
    }

    /// Create a key pair from a hex-encoded private key
    pub fn from_private_key_hex(hex_key: &str) -> Result<Self, KeyError> {
        let bytes = hex::decode(hex_key).map_err(|_| KeyError::InvalidPrivateKey)?;
        let secret_key =
            SecretKey::from_slice(&bytes).map_err(|_| KeyError::InvalidPrivateKey)?;
        let public_key = PublicKey::from_secret_key(&Secp256k1::new(), &secret_key);
        Ok(Self {
            secret_key,
            public_key,
        })
    }

    /// Private key as hex
    pub fn private_key_hex(&self) -> String {
        hex::encode(self.secret_key.secret_bytes())
    }

    /// Public key as compressed hex
    pub fn public_key_hex(&self) -> String {
        hex::encode(self.public_key.serialize())
    }

    /// Account address for this key
    pub fn address(&self) -> String {
        public_key_to_address(&self.public_key)
    }

    /// Sign a 32-byte digest, returning the hex-encoded compact signature
    pub fn sign_digest(&self, digest: &[u8]) -> Result<String, KeyError> {
        let message = to_message(digest)?;
        let signature = Secp256k1::new().sign_ecdsa(&message, &self.secret_key);
        Ok(hex::encode(signature.serialize_compact()))
    }
}

/// Convert a public key to a Base58Check account address
pub fn public_key_to_address(public_key: &PublicKey) -> String {
    let mut ripemd = Ripemd160::new();
    ripemd.update(sha256(&public_key.serialize()));
    let ripemd_hash = ripemd.finalize();

    let mut address_bytes = vec![ADDRESS_VERSION];
    address_bytes.extend_from_slice(&ripemd_hash);
    let checksum = double_sha256(&address_bytes);
    address_bytes.extend_from_slice(&checksum[..4]);

    bs58::encode(address_bytes).into_string()
}

/// Derive the address for a hex public key
pub fn address_from_public_key_hex(hex_key: &str) -> Result<String, KeyError> {
    Ok(public_key_to_address(&public_key_from_hex(hex_key)?))
}

/// Check that an address decodes with the right version byte and checksum
pub fn is_valid_address(address: &str) -> bool {
    let bytes = match bs58::decode(address).into_vec() {
        Ok(bytes) => bytes,
        Err(_) => return false,
    };
    if bytes.len() != 25 || bytes[0] != ADDRESS_VERSION {
        return false;
    }
    let (body, checksum) = bytes.split_at(21);
    double_sha256(body)[..4] == *checksum
}

/// Parse a compressed public key from hex
pub fn public_key_from_hex(hex_key: &str) -> Result<PublicKey, KeyError> {
    if hex_key.len() != PUBLIC_KEY_HEX_LEN {
        return Err(KeyError::InvalidPublicKey(format!(
            "expected {} hex characters, got {}",
            PUBLIC_KEY_HEX_LEN,
            hex_key.len()
        )));
    }
    let bytes =
        hex::decode(hex_key).map_err(|_| KeyError::InvalidPublicKey("not hex".to_string()))?;
    PublicKey::from_slice(&bytes)
        .map_err(|_| KeyError::InvalidPublicKey("not a curve point".to_string()))
}

/// Parse and re-encode a public key so equal keys compare equal as strings
pub fn normalize_public_key(hex_key: &str) -> Result<String, KeyError> {
    Ok(hex::encode(public_key_from_hex(hex_key)?.serialize()))
}

/// Verify a hex signature over a digest.
///
/// Returns `Ok(false)` for a well-formed signature that does not match;
/// malformed input is an error.
pub fn verify_signature(
    public_key_hex: &str,
    digest: &[u8],
    signature_hex: &str,
) -> Result<bool, KeyError> {
    let public_key = public_key_from_hex(public_key_hex)?;
    let sig_bytes = hex::decode(signature_hex).map_err(|_| KeyError::InvalidSignature)?;
    let signature = Signature::from_compact(&sig_bytes).map_err(|_| KeyError::InvalidSignature)?;
    let message = to_message(digest)?;

    Ok(Secp256k1::verification_only()
        .verify_ecdsa(&message, &signature, &public_key)
        .is_ok())
}

fn to_message(digest: &[u8]) -> Result<Message, KeyError> {
    let hash = if digest.len() == 32 {
        digest.to_vec()
    } else {
        sha256(digest)
    };
    Ok(Message::from_digest_slice(&hash)?)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_sign_and_verify() {
        let kp = KeyPair::generate();
        let digest = sha256(b"Hello, keygroup!");

        let signature = kp.sign_digest(&digest).unwrap();
        assert!(verify_signature(&kp.public_key_hex(), &digest, &signature).unwrap());

        let other = sha256(b"something else");
        assert!(!verify_signature(&kp.public_key_hex(), &other, &signature).unwrap());
    }

    #[test]
    fn test_wrong_signer_does_not_verify() {
        let kp = KeyPair::generate();
        let other = KeyPair::generate();
        let digest = sha256(b"payload");

        let signature = kp.sign_digest(&digest).unwrap();
        assert!(!verify_signature(&other.public_key_hex(), &digest, &signature).unwrap());
    }

    #[test]
    fn test_malformed_signature_is_error() {
        let kp = KeyPair::generate();
        let digest = sha256(b"payload");
        assert!(verify_signature(&kp.public_key_hex(), &digest, "zz").is_err());
        assert!(verify_signature(&kp.public_key_hex(), &digest, "abcd").is_err());
    }

    #[test]
    fn test_key_pair_from_hex() {
        let kp1 = KeyPair::generate();
        let private_hex = kp1.private_key_hex();

        let kp2 = KeyPair::from_private_key_hex(&private_hex).unwrap();
        assert_eq!(kp1.public_key_hex(), kp2.public_key_hex());
        assert_eq!(kp1.address(), kp2.address());
    }

    #[test]
    fn test_public_key_parsing() {
        let kp = KeyPair::generate();
        let hex_key = kp.public_key_hex();
        assert_eq!(hex_key.len(), PUBLIC_KEY_HEX_LEN);
        assert!(public_key_from_hex(&hex_key).is_ok());
        assert_eq!(
            normalize_public_key(&hex_key.to_uppercase()).unwrap(),
            hex_key
        );

        assert!(public_key_from_hex("1234").is_err());
        assert!(public_key_from_hex(&"zz".repeat(33)).is_err());
    }

    #[test]
    fn test_address_format() {
        let kp = KeyPair::generate();
        let address = kp.address();
        assert!(address.starts_with('1'));
        assert!(is_valid_address(&address));
        assert_eq!(
            address_from_public_key_hex(&kp.public_key_hex()).unwrap(),
            address
        );

        let mut tampered = address.clone();
        tampered.pop();
        tampered.push(if address.ends_with('2') { '3' } else { '2' });
        assert!(!is_valid_address(&tampered));
        assert!(!is_valid_address("not-an-address"));
    }
}
