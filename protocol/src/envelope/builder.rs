//! Envelope construction.
//!
//! An [`Envelope`] is the unit submitted over the wire: the signed value and
//! one or more proofs over it. The value is stored as the exact canonical
//! JSON text that was hashed, and serialized verbatim, so the bytes the
//! validator re-hashes are the bytes we signed.

use serde::{Deserialize, Serialize};
use serde_json::value::RawValue;
use serde_json::Value;

use crate::canonical::CanonicalBytes;
use crate::crypto::keys::EcdsaSignature;
use crate::error::SubmitError;
use crate::identity::Identity;

// ---------------------------------------------------------------------------
// Proof
// ---------------------------------------------------------------------------

/// One signer's `{ id, signature }` pair.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Proof {
    /// Identity the validator resolves to a registered public key.
    pub id: Identity,
    /// Hex-encoded DER ECDSA signature over `SHA-256(value)`.
    pub signature: String,
}

impl Proof {
    pub fn new(id: Identity, signature: &EcdsaSignature) -> Self {
        Self {
            id,
            signature: signature.to_hex(),
        }
    }

    /// Parse the signature field back into DER.
    pub fn parsed_signature(&self) -> Result<EcdsaSignature, SubmitError> {
        EcdsaSignature::from_hex(&self.signature)
    }
}

// ---------------------------------------------------------------------------
// Envelope
// ---------------------------------------------------------------------------

/// A signed submission: `{ "value": <payload>, "proofs": [ ... ] }`.
///
/// Always carries at least one proof. Deserialization enforces the same
/// rule, so an `Envelope` read from disk is as trustworthy structurally as
/// one we built.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "EnvelopeWire")]
pub struct Envelope {
    value: Box<RawValue>,
    proofs: Vec<Proof>,
}

#[derive(Deserialize)]
struct EnvelopeWire {
    value: Box<RawValue>,
    proofs: Vec<Proof>,
}

impl TryFrom<EnvelopeWire> for Envelope {
    type Error = String;

    fn try_from(wire: EnvelopeWire) -> Result<Self, Self::Error> {
        if wire.proofs.is_empty() {
            return Err("envelope must carry at least one proof".into());
        }
        Ok(Self {
            value: wire.value,
            proofs: wire.proofs,
        })
    }
}

impl Envelope {
    /// Package signed bytes with their proofs.
    ///
    /// Fails with [`SubmitError::Envelope`] if `proofs` is empty.
    pub fn build(value: CanonicalBytes, proofs: Vec<Proof>) -> Result<Self, SubmitError> {
        if proofs.is_empty() {
            return Err(SubmitError::Envelope(
                "envelope must carry at least one proof".into(),
            ));
        }
        let value = RawValue::from_string(value.into_string())?;
        Ok(Self { value, proofs })
    }

    /// Parse an envelope from its JSON wire form.
    pub fn from_json(json: &str) -> Result<Self, SubmitError> {
        serde_json::from_str(json).map_err(|e| SubmitError::Envelope(e.to_string()))
    }

    /// Append another signer's proof. The value and existing proofs are
    /// left untouched.
    pub fn push_proof(&mut self, proof: Proof) {
        self.proofs.push(proof);
    }

    pub fn proofs(&self) -> &[Proof] {
        &self.proofs
    }

    /// The value exactly as it will appear on the wire.
    pub fn value_json(&self) -> &str {
        self.value.get()
    }

    /// The value parsed into a `serde_json::Value`.
    pub fn value(&self) -> Result<Value, SubmitError> {
        Ok(serde_json::from_str(self.value.get())?)
    }

    /// The value re-encoded canonically. Equal to [`value_json`](Self::value_json)
    /// for every envelope this crate builds.
    pub fn canonical_value(&self) -> Result<CanonicalBytes, SubmitError> {
        CanonicalBytes::from_json_str(self.value.get())
    }

    /// Compact JSON body for the ingestion endpoint.
    pub fn to_json_bytes(&self) -> Result<Vec<u8>, SubmitError> {
        Ok(serde_json::to_vec(self)?)
    }

    /// Indented JSON for humans. The value itself is emitted verbatim.
    pub fn to_json_pretty(&self) -> Result<String, SubmitError> {
        Ok(serde_json::to_string_pretty(self)?)
    }
}

// ---------------------------------------------------------------------------
// EnvelopeBuilder
// ---------------------------------------------------------------------------

/// Fluent builder for [`Envelope`].
///
/// ```rust,no_run
/// use quill_protocol::canonical;
/// use quill_protocol::envelope::{EnvelopeBuilder, Proof};
/// # fn proof() -> Proof { unimplemented!() }
///
/// let envelope = EnvelopeBuilder::new(canonical::encode(&serde_json::json!({"a": 1})))
///     .proof(proof())
///     .build()
///     .unwrap();
/// ```
#[derive(Debug, Clone)]
pub struct EnvelopeBuilder {
    value: CanonicalBytes,
    proofs: Vec<Proof>,
}

impl EnvelopeBuilder {
    pub fn new(value: CanonicalBytes) -> Self {
        Self {
            value,
            proofs: Vec::new(),
        }
    }

    pub fn proof(mut self, proof: Proof) -> Self {
        self.proofs.push(proof);
        self
    }

    pub fn proofs(mut self, proofs: impl IntoIterator<Item = Proof>) -> Self {
        self.proofs.extend(proofs);
        self
    }

    pub fn build(self) -> Result<Envelope, SubmitError> {
        Envelope::build(self.value, self.proofs)
    }
}
