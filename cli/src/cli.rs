//! # CLI Interface
//!
//! Defines the command-line argument structure for `quill` using `clap`
//! derive. Every network location and key source can also be set through
//! the environment, so nothing deployment-specific has to be typed twice.

use clap::{Args, Parser, Subcommand};
use std::path::PathBuf;
use std::sync::Arc;
use std::time::Duration;

use quill_protocol::config;
use quill_protocol::crypto::{EnvKeyProvider, FileKeyProvider, KeyProvider, StaticKeyProvider};
use quill_protocol::network::PollPolicy;
use quill_protocol::IdentityStrategy;

/// Sign JSON records and submit them to a data L1 node.
#[derive(Parser, Debug)]
#[command(
    name = "quill",
    about = "Sign JSON records and submit them to a data L1 node",
    version,
    propagate_version = true
)]
pub struct QuillCli {
    /// Log output format: `pretty` or `json`.
    #[arg(long, global = true, env = config::ENV_LOG_FORMAT, default_value = "pretty")]
    pub log_format: String,

    /// Subcommand to execute.
    #[command(subcommand)]
    pub command: Commands,
}

/// Top-level subcommands for the `quill` binary.
#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Sign a template and print the envelope without sending it.
    Sign(SignArgs),
    /// Sign a template and POST the envelope to the ingestion endpoint.
    Submit(SubmitArgs),
    /// Print the public key and proof identity for the configured key.
    Identity(IdentityArgs),
    /// Check every proof of an envelope file offline.
    Verify(VerifyArgs),
    /// Ask the validation service to assess a circumstance change and wait
    /// for the result.
    Validate(ValidateArgs),
    /// List the providers known to the validation service.
    Providers(ProvidersArgs),
}

/// Where the signing key comes from.
///
/// Resolution order: `--private-key`, then `--key-file` (or
/// `QUILL_KEY_FILE`), then the `QUILL_PRIVATE_KEY` environment variable.
/// The flags do not conflict, so an exported key file never blocks an
/// explicit `--private-key`.
#[derive(Args, Debug, Clone)]
pub struct KeyArgs {
    /// Hex-encoded secp256k1 private key.
    ///
    /// Visible in the process list; prefer `QUILL_PRIVATE_KEY` or a key file.
    #[arg(long)]
    pub private_key: Option<String>,

    /// File holding the hex-encoded private key.
    #[arg(long, env = config::ENV_KEY_FILE)]
    pub key_file: Option<PathBuf>,

    /// How the proof `id` is derived from the public key.
    #[arg(long = "identity", env = config::ENV_IDENTITY_STRATEGY, default_value_t = IdentityStrategy::default())]
    pub strategy: IdentityStrategy,
}

impl KeyArgs {
    pub fn provider(&self) -> Arc<dyn KeyProvider> {
        match (&self.private_key, &self.key_file) {
            (Some(hex), _) => Arc::new(StaticKeyProvider::new(hex.clone())),
            (None, Some(path)) => Arc::new(FileKeyProvider::new(path.clone())),
            (None, None) => Arc::new(EnvKeyProvider::default()),
        }
    }
}

/// Arguments for the `sign` subcommand.
#[derive(Parser, Debug)]
pub struct SignArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// JSON template to sign.
    #[arg(default_value = "./test-template.json")]
    pub template: PathBuf,

    /// Pretty-print the envelope instead of emitting the exact wire bytes.
    #[arg(long)]
    pub pretty: bool,
}

/// Arguments for the `submit` subcommand.
#[derive(Parser, Debug)]
pub struct SubmitArgs {
    #[command(flatten)]
    pub key: KeyArgs,

    /// JSON template to sign and submit.
    #[arg(default_value = "./test-template.json")]
    pub template: PathBuf,

    /// Ingestion endpoint URL.
    #[arg(long, env = config::ENV_INGEST_URL, default_value = config::DEFAULT_INGEST_URL)]
    pub endpoint: String,
}

/// Arguments for the `identity` subcommand.
#[derive(Parser, Debug)]
pub struct IdentityArgs {
    #[command(flatten)]
    pub key: KeyArgs,
}

/// Arguments for the `verify` subcommand.
#[derive(Parser, Debug)]
pub struct VerifyArgs {
    /// Envelope file, as produced by `quill sign`.
    pub envelope: PathBuf,

    /// Hex public key of an expected signer. Needed for proofs whose id is
    /// a hash; repeat for several signers.
    #[arg(long = "signer")]
    pub signers: Vec<String>,

    /// Strategy the signers' ids were derived with.
    #[arg(long = "identity", env = config::ENV_IDENTITY_STRATEGY, default_value_t = IdentityStrategy::default())]
    pub strategy: IdentityStrategy,
}

/// Arguments for the `validate` subcommand.
#[derive(Parser, Debug)]
pub struct ValidateArgs {
    /// Provider whose contract template the change is checked against.
    pub provider: String,

    /// Free-text description of the circumstance change.
    pub circumstance: String,

    /// Validation service base URL.
    #[arg(long, env = config::ENV_VALIDATOR_URL, default_value = config::DEFAULT_VALIDATOR_URL)]
    pub api: String,

    /// Pause between status checks, in milliseconds.
    #[arg(long, default_value_t = config::POLL_INTERVAL.as_millis() as u64)]
    pub interval_ms: u64,

    /// Status checks before giving up.
    #[arg(long, default_value_t = config::POLL_MAX_ATTEMPTS)]
    pub max_attempts: u32,
}

impl ValidateArgs {
    pub fn poll_policy(&self) -> PollPolicy {
        PollPolicy::new(Duration::from_millis(self.interval_ms), self.max_attempts)
    }
}

/// Arguments for the `providers` subcommand.
#[derive(Parser, Debug)]
pub struct ProvidersArgs {
    /// Validation service base URL.
    #[arg(long, env = config::ENV_VALIDATOR_URL, default_value = config::DEFAULT_VALIDATOR_URL)]
    pub api: String,
}
