//! # Identity Module
//!
//! The `id` field of a proof is how the downstream validator finds the key
//! that should verify the signature next to it. Known validators disagree on
//! what that value is, so the derivation is a strategy rather than a formula:
//!
//! ```text
//! PublicKey ──► SpkiSha256       hex(SHA-256(SubjectPublicKeyInfo DER))   64 chars
//!           └─► RawUncompressed  hex(0x04 || x || y)                     130 chars
//! ```
//!
//! Both are pure functions of the public key, which is itself a pure
//! function of the private scalar: the same key always yields the same
//! identity.
//!
//! The default is [`IdentityStrategy::RawUncompressed`], the form the data
//! L1's signed-envelope decoder resolves proofs with. Validators that register
//! signers by key fingerprint need [`IdentityStrategy::SpkiSha256`].

use serde::{Deserialize, Serialize};
use std::fmt;
use std::str::FromStr;

use crate::crypto::hash::sha256_hex;
use crate::crypto::keys::PublicKey;
use crate::error::SubmitError;

/// How a public key becomes a proof identity.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(rename_all = "kebab-case")]
pub enum IdentityStrategy {
    /// SHA-256 of the DER `SubjectPublicKeyInfo`, hex-encoded.
    SpkiSha256,
    /// The SEC1 uncompressed point itself, hex-encoded.
    #[default]
    RawUncompressed,
}

impl IdentityStrategy {
    /// Canonical spelling, as accepted by [`FromStr`] and shown in logs.
    pub fn as_str(&self) -> &'static str {
        match self {
            IdentityStrategy::SpkiSha256 => "spki-sha256",
            IdentityStrategy::RawUncompressed => "raw-uncompressed",
        }
    }

    /// Length in hex characters of identities produced by this strategy.
    pub fn identity_len(&self) -> usize {
        match self {
            IdentityStrategy::SpkiSha256 => 64,
            IdentityStrategy::RawUncompressed => 130,
        }
    }
}

impl fmt::Display for IdentityStrategy {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for IdentityStrategy {
    type Err = String;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "spki-sha256" | "hash" => Ok(IdentityStrategy::SpkiSha256),
            "raw-uncompressed" | "raw" => Ok(IdentityStrategy::RawUncompressed),
            other => Err(format!(
                "unknown identity strategy '{}': expected spki-sha256 or raw-uncompressed",
                other
            )),
        }
    }
}

/// A proof identity: lowercase hex, opaque to everything but the validator.
#[derive(Debug, Clone, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(transparent)]
pub struct Identity(String);

impl Identity {
    /// Wrap an identity received from elsewhere (e.g. a parsed envelope).
    pub fn new(value: impl Into<String>) -> Self {
        Self(value.into())
    }

    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for Identity {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

/// Derive the identity of `public_key` under `strategy`.
pub fn derive_identity(
    public_key: &PublicKey,
    strategy: IdentityStrategy,
) -> Result<Identity, SubmitError> {
    let id = match strategy {
        IdentityStrategy::SpkiSha256 => sha256_hex(&public_key.to_spki_der()?),
        IdentityStrategy::RawUncompressed => public_key.to_hex(),
    };
    Ok(Identity(id))
}
