//! Cryptographic utilities
//!
//! This module provides:
//! - SHA-256 hashing and field digests
//! - ECDSA key management (secp256k1)
//! - Base58Check account addresses

pub mod hash;
pub mod keys;

pub use hash::{digest_fields, double_sha256, sha256, sha256_hex};
pub use keys::{
    address_from_public_key_hex, is_valid_address, normalize_public_key, public_key_from_hex,
    public_key_to_address, verify_signature, KeyError, KeyPair, PUBLIC_KEY_HEX_LEN,
};
