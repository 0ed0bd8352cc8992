//! # Digital Signatures
//!
//! ECDSA over secp256k1 with SHA-256, the only signing backend in Quill.
//!
//! The free functions here are the whole signing surface: [`sign`] and
//! [`verify`] take canonical bytes, never a payload, so nothing can sneak a
//! non-canonical encoding into a signature.

use super::keys::{EcdsaSignature, PublicKey, SigningKeypair};
use crate::canonical::CanonicalBytes;
use crate::error::SubmitError;

/// Sign canonical payload bytes.
///
/// `h = SHA-256(bytes)`, then ECDSA over `h` with an RFC 6979 nonce. The
/// returned signature is DER; use [`EcdsaSignature::to_hex`] for the wire.
///
/// # Example
///
/// ```
/// use quill_protocol::canonical;
/// use quill_protocol::crypto::{sign, verify, SigningKeypair};
///
/// let kp = SigningKeypair::from_bytes(&[7u8; 32]).unwrap();
/// let bytes = canonical::encode(&serde_json::json!({"b": 2, "a": 1}));
/// let sig = sign(&bytes, &kp).unwrap();
/// assert!(verify(&bytes, &sig, &kp.public_key()));
/// ```
pub fn sign(bytes: &CanonicalBytes, keypair: &SigningKeypair) -> Result<EcdsaSignature, SubmitError> {
    keypair.sign(bytes.as_bytes())
}

/// Verify a signature over canonical bytes against a public key.
///
/// Returns `true` if the signature is valid, `false` otherwise.
pub fn verify(bytes: &CanonicalBytes, signature: &EcdsaSignature, public_key: &PublicKey) -> bool {
    public_key.verify(bytes.as_bytes(), signature)
}

/// Sign, then immediately verify against the locally derived public key.
///
/// A signature that does not verify here would never verify downstream, so
/// it aborts the run with [`SubmitError::Signing`] instead of being shipped.
pub fn sign_and_check(
    bytes: &CanonicalBytes,
    keypair: &SigningKeypair,
) -> Result<EcdsaSignature, SubmitError> {
    let signature = sign(bytes, keypair)?;
    if !verify(bytes, &signature, &keypair.public_key()) {
        tracing::error!("fresh signature failed self-verification");
        return Err(SubmitError::Signing(
            "signature failed self-verification against derived public key".into(),
        ));
    }
    Ok(signature)
}
