//! # Hashing Utilities
//!
//! SHA-256, and only SHA-256. The downstream validator hashes with it, the
//! ECDSA signature is computed over its digest, and the hash-based identity
//! strategy uses it on the encoded public key. Adding a second hash function
//! here would only create a second way to disagree with the validator.

use sha2::{Digest, Sha256};

use crate::config::HASH_OUTPUT_LENGTH;

/// Compute the SHA-256 hash of the input data.
///
/// # Example
///
/// ```
/// use quill_protocol::crypto::sha256;
///
/// let hash = sha256(b"quill");
/// assert_eq!(hash.len(), 32);
/// ```
pub fn sha256(data: &[u8]) -> [u8; HASH_OUTPUT_LENGTH] {
    let mut hasher = Sha256::new();
    hasher.update(data);
    hasher.finalize().into()
}

/// SHA-256 rendered as lowercase hex. 64 characters.
pub fn sha256_hex(data: &[u8]) -> String {
    hex::encode(sha256(data))
}
