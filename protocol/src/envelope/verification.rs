//! Offline envelope verification.
//!
//! Mirrors what the downstream validator does with an envelope: resolve each
//! proof's identity to a public key, re-hash the canonical value, and check
//! every signature. Checks run cheapest first.

use std::collections::HashMap;

use super::builder::Envelope;
use crate::crypto::keys::PublicKey;
use crate::error::SubmitError;
use crate::identity::{derive_identity, Identity, IdentityStrategy};

/// Maps a proof identity back to the public key that should verify it.
pub trait KeyResolver {
    fn resolve(&self, id: &Identity) -> Option<PublicKey>;
}

/// Resolves `raw-uncompressed` identities, which are the key itself.
#[derive(Debug, Clone, Copy, Default)]
pub struct RawIdentityResolver;

impl KeyResolver for RawIdentityResolver {
    fn resolve(&self, id: &Identity) -> Option<PublicKey> {
        PublicKey::from_hex(id.as_str()).ok()
    }
}

/// A set of known signers, keyed by identity. Works for any strategy.
#[derive(Debug, Clone, Default)]
pub struct KeyRegistry {
    keys: HashMap<Identity, PublicKey>,
}

impl KeyRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Register `public_key` under the identity `strategy` derives for it.
    pub fn register(
        &mut self,
        public_key: PublicKey,
        strategy: IdentityStrategy,
    ) -> Result<Identity, SubmitError> {
        let id = derive_identity(&public_key, strategy)?;
        self.keys.insert(id.clone(), public_key);
        Ok(id)
    }

    pub fn len(&self) -> usize {
        self.keys.len()
    }

    pub fn is_empty(&self) -> bool {
        self.keys.is_empty()
    }
}

impl KeyResolver for KeyRegistry {
    fn resolve(&self, id: &Identity) -> Option<PublicKey> {
        self.keys.get(id).copied()
    }
}

/// Verify every proof on `envelope`.
///
/// Returns the number of proofs checked. The first failing proof aborts with
/// [`SubmitError::Signing`] naming its index and identity.
pub fn verify_envelope(
    envelope: &Envelope,
    resolver: &dyn KeyResolver,
) -> Result<usize, SubmitError> {
    let bytes = envelope.canonical_value()?;

    for (index, proof) in envelope.proofs().iter().enumerate() {
        let public_key = resolver.resolve(&proof.id).ok_or_else(|| {
            SubmitError::Signing(format!("proof {index}: unknown signer {}", proof.id))
        })?;
        let signature = proof.parsed_signature().map_err(|e| {
            SubmitError::Signing(format!("proof {index}: malformed signature: {e}"))
        })?;
        if !public_key.verify(bytes.as_bytes(), &signature) {
            return Err(SubmitError::Signing(format!(
                "proof {index}: signature does not verify for {}",
                proof.id
            )));
        }
    }

    Ok(envelope.proofs().len())
}
