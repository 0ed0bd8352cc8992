//! Single-shot envelope submission.
//!
//! One envelope, one `POST`, one answer. There is no retry and no timeout
//! beyond reqwest's defaults: whether to try again is the caller's decision,
//! and it makes it by starting a fresh run.

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;

use crate::envelope::Envelope;
use crate::error::SubmitError;

/// What the ingestion endpoint said when it accepted an envelope.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UploadResult {
    /// 2xx status code.
    pub status: u16,
    /// Response body, opaque, kept for logging.
    pub body: String,
}

/// Anything that can deliver an envelope to an endpoint.
///
/// [`Uploader`] is the HTTP implementation; the seam exists so the pipeline
/// can be driven against other transports.
#[async_trait]
pub trait Submitter: Send + Sync {
    async fn submit(&self, envelope: &Envelope, endpoint: &str) -> Result<UploadResult, SubmitError>;
}

/// HTTP uploader backed by a `reqwest` client.
#[derive(Debug, Clone, Default)]
pub struct Uploader {
    client: reqwest::Client,
}

impl Uploader {
    pub fn new() -> Self {
        Self::default()
    }

    /// Reuse an existing client (connection pool, TLS config, proxies).
    pub fn with_client(client: reqwest::Client) -> Self {
        Self { client }
    }
}

#[async_trait]
impl Submitter for Uploader {
    /// `POST` the envelope as `application/json`.
    ///
    /// - 2xx → [`UploadResult`]
    /// - any other status → [`SubmitError::Protocol`] with status and body
    /// - no response at all → [`SubmitError::Network`] with the transport cause
    async fn submit(&self, envelope: &Envelope, endpoint: &str) -> Result<UploadResult, SubmitError> {
        let body = envelope.to_json_bytes()?;
        tracing::info!(
            endpoint = %endpoint,
            body_len = body.len(),
            proofs = envelope.proofs().len(),
            "submitting envelope"
        );

        let response = self
            .client
            .post(endpoint)
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| SubmitError::Network(error_chain(&e)))?;

        let status = response.status();
        let text = response
            .text()
            .await
            .map_err(|e| SubmitError::Network(error_chain(&e)))?;

        if status.is_success() {
            tracing::info!(status = status.as_u16(), "envelope accepted");
            Ok(UploadResult {
                status: status.as_u16(),
                body: text,
            })
        } else {
            tracing::warn!(status = status.as_u16(), body = %text, "envelope rejected");
            Err(SubmitError::Protocol {
                status: status.as_u16(),
                body: text,
            })
        }
    }
}

/// Flatten an error and its sources into one line. reqwest's top-level
/// message ("error sending request") hides the part an operator needs
/// ("Connection refused").
pub(crate) fn error_chain(err: &dyn std::error::Error) -> String {
    let mut out = err.to_string();
    let mut source = err.source();
    while let Some(cause) = source {
        out.push_str(": ");
        out.push_str(&cause.to_string());
        source = cause.source();
    }
    out
}
