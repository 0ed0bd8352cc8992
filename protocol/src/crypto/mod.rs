//! # Cryptographic Primitives for Quill
//!
//! One curve, one hash, one signature scheme:
//!
//! - **secp256k1** for keys, because that is what the ledger registers.
//! - **SHA-256** for digests, because that is what the validator recomputes.
//! - **ECDSA** with RFC 6979 nonces and DER encoding for signatures.
//!
//! Everything here is a thin, typed wrapper over `k256` and `sha2`.

pub mod hash;
pub mod keys;
pub mod provider;
pub mod signatures;

pub use hash::{sha256, sha256_hex};
pub use keys::{EcdsaSignature, PublicKey, SigningKeypair};
pub use provider::{EnvKeyProvider, FileKeyProvider, KeyProvider, StaticKeyProvider};
pub use signatures::{sign, sign_and_check, verify};

/// Derive the public key for a private key. Pure function of the scalar.
pub fn derive_public_key(keypair: &SigningKeypair) -> PublicKey {
    keypair.public_key()
}
