//! # Defaults & Constants
//!
//! Every default the pipeline and the validation client fall back to lives
//! here. None of these are secrets: the private key is never a constant, it
//! always arrives through a [`KeyProvider`](crate::crypto::KeyProvider).
//!
//! Deployments override the URLs and the identity strategy through the
//! environment variables named below (the CLI binds each flag to one).

use std::time::Duration;

// ---------------------------------------------------------------------------
// Environment Variables
// ---------------------------------------------------------------------------

/// Hex-encoded secp256k1 private key.
pub const ENV_PRIVATE_KEY: &str = "QUILL_PRIVATE_KEY";

/// Path to a file containing the hex-encoded private key.
pub const ENV_KEY_FILE: &str = "QUILL_KEY_FILE";

/// Ingestion endpoint that accepts signed envelopes.
pub const ENV_INGEST_URL: &str = "QUILL_INGEST_URL";

/// Identity derivation strategy (`spki-sha256` or `raw-uncompressed`).
pub const ENV_IDENTITY_STRATEGY: &str = "QUILL_IDENTITY_STRATEGY";

/// Base URL of the validation service.
pub const ENV_VALIDATOR_URL: &str = "QUILL_VALIDATOR_URL";

/// Log output format for the binary (`pretty` or `json`).
pub const ENV_LOG_FORMAT: &str = "QUILL_LOG_FORMAT";

// ---------------------------------------------------------------------------
// Endpoints
// ---------------------------------------------------------------------------

/// Data L1 `POST /data` endpoint of a local devnet.
pub const DEFAULT_INGEST_URL: &str = "http://localhost:9400/data";

/// Validation service of a local devnet.
pub const DEFAULT_VALIDATOR_URL: &str = "http://localhost:9000";

/// Path of the ingestion route on the validation service.
pub const DATA_PATH: &str = "/data";

/// Provider listing route.
pub const PROVIDERS_PATH: &str = "/providers";

/// Validation results live under this prefix, keyed by validation id.
pub const VALIDATIONS_PATH: &str = "/validations";

// ---------------------------------------------------------------------------
// Cryptographic Parameters
// ---------------------------------------------------------------------------

/// Private scalar length in bytes.
pub const PRIVATE_KEY_LENGTH: usize = 32;

/// SEC1 uncompressed point: `0x04 || x || y`.
pub const UNCOMPRESSED_PUBLIC_KEY_LENGTH: usize = 65;

/// SEC1 compressed point: `0x02|0x03 || x`.
pub const COMPRESSED_PUBLIC_KEY_LENGTH: usize = 33;

/// SHA-256 digest length.
pub const HASH_OUTPUT_LENGTH: usize = 32;

/// Upper bound on a DER-encoded secp256k1 ECDSA signature.
pub const MAX_DER_SIGNATURE_LENGTH: usize = 72;

// ---------------------------------------------------------------------------
// Validation Polling
// ---------------------------------------------------------------------------

/// Pause before each status check.
pub const POLL_INTERVAL: Duration = Duration::from_secs(2);

/// Number of status checks before giving up.
pub const POLL_MAX_ATTEMPTS: u32 = 10;

/// Hard ceiling on a polling run: every attempt plus one interval of slack
/// for slow responses.
pub const POLL_DEADLINE: Duration =
    Duration::from_secs(POLL_INTERVAL.as_secs() * (POLL_MAX_ATTEMPTS as u64 + 1));
