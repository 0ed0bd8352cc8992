//! Where private keys come from.
//!
//! The pipeline never owns key material at rest. It asks a [`KeyProvider`]
//! for a [`SigningKeypair`] at the start of a run and drops it at the end.
//! Swapping a provider (environment, key file, secret store) never touches
//! signing code.

use std::env;
use std::path::PathBuf;

use super::keys::SigningKeypair;
use crate::config::ENV_PRIVATE_KEY;
use crate::error::SubmitError;

/// A source of signing keys.
///
/// Implementations must not cache the parsed key beyond the call; each
/// invocation of the pipeline loads its own.
pub trait KeyProvider: Send + Sync {
    /// Load and validate the private key.
    fn load(&self) -> Result<SigningKeypair, SubmitError>;

    /// Human-readable description of the source, for logs. Must not
    /// include key material.
    fn describe(&self) -> String;
}

/// Reads a hex key from an environment variable.
#[derive(Debug, Clone)]
pub struct EnvKeyProvider {
    var: String,
}

impl EnvKeyProvider {
    /// Provider bound to an arbitrary variable name.
    pub fn new(var: impl Into<String>) -> Self {
        Self { var: var.into() }
    }
}

impl Default for EnvKeyProvider {
    fn default() -> Self {
        Self::new(ENV_PRIVATE_KEY)
    }
}

impl KeyProvider for EnvKeyProvider {
    fn load(&self) -> Result<SigningKeypair, SubmitError> {
        let value = env::var(&self.var).map_err(|_| {
            SubmitError::KeyFormat(format!("environment variable {} is not set", self.var))
        })?;
        SigningKeypair::from_hex(&value)
    }

    fn describe(&self) -> String {
        format!("env:{}", self.var)
    }
}

/// Reads a hex key from a file. Whitespace around the key is ignored.
#[derive(Debug, Clone)]
pub struct FileKeyProvider {
    path: PathBuf,
}

impl FileKeyProvider {
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

impl KeyProvider for FileKeyProvider {
    fn load(&self) -> Result<SigningKeypair, SubmitError> {
        let contents = std::fs::read_to_string(&self.path).map_err(|e| {
            SubmitError::KeyFormat(format!(
                "cannot read key file {}: {}",
                self.path.display(),
                e
            ))
        })?;
        SigningKeypair::from_hex(&contents)
    }

    fn describe(&self) -> String {
        format!("file:{}", self.path.display())
    }
}

/// Holds a hex key handed over at runtime, e.g. from a CLI flag.
#[derive(Clone)]
pub struct StaticKeyProvider {
    hex: String,
}

impl StaticKeyProvider {
    pub fn new(hex: impl Into<String>) -> Self {
        Self { hex: hex.into() }
    }
}

impl std::fmt::Debug for StaticKeyProvider {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.write_str("StaticKeyProvider(<redacted>)")
    }
}

impl KeyProvider for StaticKeyProvider {
    fn load(&self) -> Result<SigningKeypair, SubmitError> {
        SigningKeypair::from_hex(&self.hex)
    }

    fn describe(&self) -> String {
        "static".to_string()
    }
}
