//! Turning a payload into a proof.
//!
//! Signing is kept apart from envelope construction so that a second
//! signer can co-sign an existing envelope without rebuilding it. Every
//! path through here canonicalizes first and self-verifies last.

use serde_json::Value;

use super::builder::{Envelope, Proof};
use crate::canonical::{self, CanonicalBytes};
use crate::crypto::keys::SigningKeypair;
use crate::crypto::signatures::sign_and_check;
use crate::error::SubmitError;
use crate::identity::{derive_identity, IdentityStrategy};

/// Canonicalize `payload`, sign it, and return the signed bytes with the proof.
///
/// The signature is verified against the locally derived public key before
/// it is returned; see [`sign_and_check`].
pub fn sign_payload(
    payload: &Value,
    keypair: &SigningKeypair,
    strategy: IdentityStrategy,
) -> Result<(CanonicalBytes, Proof), SubmitError> {
    let bytes = canonical::encode(payload);
    let proof = sign_bytes(&bytes, keypair, strategy)?;
    Ok((bytes, proof))
}

/// Produce a proof over bytes that are already canonical.
pub fn sign_bytes(
    bytes: &CanonicalBytes,
    keypair: &SigningKeypair,
    strategy: IdentityStrategy,
) -> Result<Proof, SubmitError> {
    let identity = derive_identity(&keypair.public_key(), strategy)?;
    let signature = sign_and_check(bytes, keypair)?;
    tracing::debug!(
        identity = %identity,
        strategy = %strategy,
        payload_len = bytes.len(),
        "payload signed"
    );
    Ok(Proof::new(identity, &signature))
}

/// Sign `payload` and wrap it in a single-proof envelope.
pub fn sign_envelope(
    payload: &Value,
    keypair: &SigningKeypair,
    strategy: IdentityStrategy,
) -> Result<Envelope, SubmitError> {
    let (bytes, proof) = sign_payload(payload, keypair, strategy)?;
    Envelope::build(bytes, vec![proof])
}

/// Add another signer's proof to an existing envelope.
///
/// The co-signer signs the canonical form of the envelope's value, which is
/// the exact value text for envelopes built by this crate. Envelopes whose
/// value is not canonical are refused, since their first proof covers
/// different bytes than ours would.
pub fn co_sign(
    envelope: &mut Envelope,
    keypair: &SigningKeypair,
    strategy: IdentityStrategy,
) -> Result<(), SubmitError> {
    let bytes = envelope.canonical_value()?;
    if bytes.as_str() != envelope.value_json() {
        return Err(SubmitError::Envelope(
            "cannot co-sign an envelope whose value is not canonical JSON".into(),
        ));
    }
    let proof = sign_bytes(&bytes, keypair, strategy)?;
    envelope.push_proof(proof);
    Ok(())
}
