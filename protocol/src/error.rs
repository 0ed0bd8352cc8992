//! Error types for the submission pipeline and the validation client.
//!
//! Every failure is terminal for the invocation that produced it. Nothing in
//! this crate retries; callers that want a retry start a whole new run.

use thiserror::Error;

/// Errors that can occur while signing and submitting an envelope.
#[derive(Debug, Clone, Error)]
pub enum SubmitError {
    /// A private or public key is malformed, or a scalar is outside `[1, n-1]`.
    #[error("invalid key: {0}")]
    KeyFormat(String),

    /// The payload cannot be represented as canonical JSON.
    #[error("payload is not encodable: {0}")]
    Serialization(String),

    /// Signing failed, or the fresh signature did not verify locally.
    #[error("signing failed: {0}")]
    Signing(String),

    /// The envelope is structurally invalid (no proofs).
    #[error("invalid envelope: {0}")]
    Envelope(String),

    /// The request never got an HTTP response (refused, DNS, reset).
    #[error("network error: {0}")]
    Network(String),

    /// The endpoint answered with a non-2xx status.
    #[error("endpoint rejected submission with status {status}: {body}")]
    Protocol {
        /// HTTP status code returned by the endpoint.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },
}

impl SubmitError {
    /// Short machine-friendly name of the error kind, used as a log field.
    pub fn kind(&self) -> &'static str {
        match self {
            SubmitError::KeyFormat(_) => "key_format",
            SubmitError::Serialization(_) => "serialization",
            SubmitError::Signing(_) => "signing",
            SubmitError::Envelope(_) => "envelope",
            SubmitError::Network(_) => "network",
            SubmitError::Protocol { .. } => "protocol",
        }
    }
}

impl From<serde_json::Error> for SubmitError {
    fn from(err: serde_json::Error) -> Self {
        SubmitError::Serialization(err.to_string())
    }
}

/// Errors surfaced by the validation service client.
#[derive(Debug, Error)]
pub enum ValidationError {
    /// Transport failure talking to the validation service.
    #[error("network error: {0}")]
    Network(String),

    /// The service rejected the request.
    #[error("validation service returned status {status}: {body}")]
    Protocol {
        /// HTTP status code.
        status: u16,
        /// Response body, verbatim.
        body: String,
    },

    /// A response arrived but was not the JSON we expected.
    #[error("malformed response: {0}")]
    Decode(String),

    /// No result after the configured number of checks or deadline.
    #[error("validation timeout after {attempts} checks ({elapsed_ms}ms)")]
    Timeout {
        /// Status checks actually issued.
        attempts: u32,
        /// Milliseconds spent polling.
        elapsed_ms: u64,
    },

    /// The caller cancelled the polling task.
    #[error("validation polling cancelled")]
    Cancelled,
}

impl From<reqwest::Error> for ValidationError {
    fn from(err: reqwest::Error) -> Self {
        if err.is_decode() {
            ValidationError::Decode(err.to_string())
        } else {
            ValidationError::Network(err.to_string())
        }
    }
}
