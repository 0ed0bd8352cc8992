//! # Submission Pipeline
//!
//! One invocation, start to finish, as an explicit state machine:
//!
//! ```text
//! Idle ─► Loaded(payload) ─► Signed(envelope) ─► Uploading ─┬─► Succeeded(response)
//!   │          │                    │                 └─► Failed(error)
//!   └──────────┴────────────────────┴──────────────────────────► Failed(error)
//! ```
//!
//! Terminal states never change. A pipeline runs once; a retry is a new
//! pipeline.

use std::fmt;
use std::sync::Arc;

use serde_json::Value;

use crate::crypto::provider::KeyProvider;
use crate::envelope::{sign_envelope, Envelope};
use crate::error::SubmitError;
use crate::identity::IdentityStrategy;
use crate::network::uploader::{Submitter, UploadResult};

/// Where a pipeline is in its single run.
#[derive(Debug, Clone)]
pub enum PipelineState {
    Idle,
    Loaded(Value),
    Signed(Envelope),
    Uploading,
    Succeeded(UploadResult),
    Failed(SubmitError),
}

impl PipelineState {
    pub fn name(&self) -> &'static str {
        match self {
            PipelineState::Idle => "idle",
            PipelineState::Loaded(_) => "loaded",
            PipelineState::Signed(_) => "signed",
            PipelineState::Uploading => "uploading",
            PipelineState::Succeeded(_) => "succeeded",
            PipelineState::Failed(_) => "failed",
        }
    }

    pub fn is_terminal(&self) -> bool {
        matches!(self, PipelineState::Succeeded(_) | PipelineState::Failed(_))
    }
}

impl fmt::Display for PipelineState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.name())
    }
}

/// Tag of a single-key command payload such as
/// `{"UploadContractTemplate": {"providerName": "Acme", ...}}`.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandTag<'a> {
    pub tag: &'a str,
    pub provider_name: Option<&'a str>,
}

/// Extract the command tag from a payload, if it has the tagged shape.
/// Only used to enrich log lines.
pub fn command_tag(payload: &Value) -> Option<CommandTag<'_>> {
    let object = payload.as_object()?;
    if object.len() != 1 {
        return None;
    }
    let (tag, body) = object.iter().next()?;
    Some(CommandTag {
        tag,
        provider_name: body.get("providerName").and_then(Value::as_str),
    })
}

/// Drives one signing-and-submission run.
pub struct SubmissionPipeline {
    keys: Arc<dyn KeyProvider>,
    submitter: Arc<dyn Submitter>,
    strategy: IdentityStrategy,
    endpoint: String,
    state: PipelineState,
}

impl SubmissionPipeline {
    pub fn new(
        keys: Arc<dyn KeyProvider>,
        submitter: Arc<dyn Submitter>,
        endpoint: impl Into<String>,
    ) -> Self {
        Self {
            keys,
            submitter,
            strategy: IdentityStrategy::default(),
            endpoint: endpoint.into(),
            state: PipelineState::Idle,
        }
    }

    pub fn with_strategy(mut self, strategy: IdentityStrategy) -> Self {
        self.strategy = strategy;
        self
    }

    pub fn state(&self) -> &PipelineState {
        &self.state
    }

    /// Sign `payload` and submit it. Any error leaves the pipeline in
    /// `Failed` and is returned.
    pub async fn run(&mut self, payload: Value) -> Result<UploadResult, SubmitError> {
        let envelope = self.sign_only(payload)?.clone();

        self.transition(PipelineState::Uploading);
        match self.submitter.submit(&envelope, &self.endpoint).await {
            Ok(result) => {
                self.transition(PipelineState::Succeeded(result.clone()));
                Ok(result)
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    /// Sign `payload` without submitting. The pipeline stops at `Signed`.
    pub fn sign_only(&mut self, payload: Value) -> Result<&Envelope, SubmitError> {
        if !matches!(self.state, PipelineState::Idle) {
            return Err(SubmitError::Envelope(format!(
                "pipeline already {}; start a new run",
                self.state
            )));
        }

        match command_tag(&payload) {
            Some(cmd) => tracing::info!(
                command = cmd.tag,
                provider = cmd.provider_name.unwrap_or("-"),
                key_source = %self.keys.describe(),
                "payload loaded"
            ),
            None => tracing::info!(key_source = %self.keys.describe(), "payload loaded"),
        }
        self.transition(PipelineState::Loaded(payload.clone()));

        let signed = self
            .keys
            .load()
            .and_then(|keypair| sign_envelope(&payload, &keypair, self.strategy));
        match signed {
            Ok(envelope) => {
                self.transition(PipelineState::Signed(envelope));
                match &self.state {
                    PipelineState::Signed(envelope) => Ok(envelope),
                    other => Err(SubmitError::Envelope(format!(
                        "pipeline unexpectedly {other} after signing"
                    ))),
                }
            }
            Err(err) => Err(self.fail(err)),
        }
    }

    fn fail(&mut self, err: SubmitError) -> SubmitError {
        tracing::error!(kind = err.kind(), error = %err, from = %self.state, "submission failed");
        self.transition(PipelineState::Failed(err.clone()));
        err
    }

    fn transition(&mut self, next: PipelineState) {
        if self.state.is_terminal() {
            tracing::warn!(current = %self.state, ignored = %next, "pipeline already finished");
            return;
        }
        tracing::debug!(from = %self.state, to = %next, "pipeline transition");
        self.state = next;
    }
}

impl fmt::Debug for SubmissionPipeline {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SubmissionPipeline")
            .field("keys", &self.keys.describe())
            .field("strategy", &self.strategy)
            .field("endpoint", &self.endpoint)
            .field("state", &self.state)
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::crypto::provider::StaticKeyProvider;
    use crate::network::uploader::Uploader;
    use async_trait::async_trait;
    use serde_json::json;
    use std::sync::Mutex;

    const KEY: &str = "0x2121212121212121212121212121212121212121212121212121212121212121";

    /// Submitter that records what it was given and answers from a script.
    struct Recording {
        seen: Mutex<Vec<(Vec<u8>, String)>>,
        reply: Result<UploadResult, SubmitError>,
    }

    impl Recording {
        fn ok() -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                reply: Ok(UploadResult {
                    status: 200,
                    body: "{\"hash\":\"h\"}".into(),
                }),
            })
        }

        fn failing(err: SubmitError) -> Arc<Self> {
            Arc::new(Self {
                seen: Mutex::new(Vec::new()),
                reply: Err(err),
            })
        }
    }

    #[async_trait]
    impl Submitter for Recording {
        async fn submit(&self, envelope: &Envelope, endpoint: &str) -> Result<UploadResult, SubmitError> {
            self.seen
                .lock()
                .unwrap()
                .push((envelope.to_json_bytes()?, endpoint.to_string()));
            self.reply.clone()
        }
    }

    fn keys() -> Arc<dyn KeyProvider> {
        Arc::new(StaticKeyProvider::new(KEY))
    }

    #[tokio::test]
    async fn successful_run_ends_succeeded() {
        let submitter = Recording::ok();
        let mut pipeline = SubmissionPipeline::new(keys(), submitter.clone(), "http://ingest/data");

        let result = pipeline
            .run(json!({"UploadContractTemplate": {"providerName": "Acme"}}))
            .await
            .unwrap();

        assert_eq!(result.status, 200);
        assert!(matches!(pipeline.state(), PipelineState::Succeeded(_)));
        let seen = submitter.seen.lock().unwrap();
        assert_eq!(seen.len(), 1);
        assert_eq!(seen[0].1, "http://ingest/data");
    }

    #[tokio::test]
    async fn unreachable_endpoint_fails_with_network_error() {
        let listener = tokio::net::TcpListener::bind("127.0.0.1:0").await.unwrap();
        let addr = listener.local_addr().unwrap();
        drop(listener);

        let mut pipeline = SubmissionPipeline::new(
            keys(),
            Arc::new(Uploader::new()),
            format!("http://{addr}/data"),
        );
        let err = pipeline.run(json!({"a": 1})).await.unwrap_err();

        assert!(matches!(err, SubmitError::Network(_)));
        assert!(matches!(pipeline.state(), PipelineState::Failed(SubmitError::Network(_))));
    }

    #[tokio::test]
    async fn rejection_is_terminal() {
        let submitter = Recording::failing(SubmitError::Protocol {
            status: 500,
            body: "bad request".into(),
        });
        let mut pipeline = SubmissionPipeline::new(keys(), submitter.clone(), "http://x/data");

        assert!(pipeline.run(json!({"a": 1})).await.is_err());
        assert_eq!(pipeline.state().name(), "failed");

        // A second run is refused and the failure stays recorded.
        assert!(pipeline.run(json!({"a": 1})).await.is_err());
        assert!(matches!(
            pipeline.state(),
            PipelineState::Failed(SubmitError::Protocol { status: 500, .. })
        ));
        assert_eq!(submitter.seen.lock().unwrap().len(), 1);
    }

    #[tokio::test]
    async fn bad_key_fails_before_upload() {
        let submitter = Recording::ok();
        let mut pipeline = SubmissionPipeline::new(
            Arc::new(StaticKeyProvider::new("zz")),
            submitter.clone(),
            "http://x/data",
        );

        let err = pipeline.run(json!({"a": 1})).await.unwrap_err();
        assert!(matches!(err, SubmitError::KeyFormat(_)));
        assert!(pipeline.state().is_terminal());
        assert!(submitter.seen.lock().unwrap().is_empty());
    }

    #[test]
    fn sign_only_stops_at_signed() {
        let mut pipeline = SubmissionPipeline::new(keys(), Recording::ok(), "http://x/data")
            .with_strategy(IdentityStrategy::SpkiSha256);

        let envelope = pipeline.sign_only(json!({"b": 2, "a": 1})).unwrap();
        assert_eq!(envelope.value_json(), r#"{"a":1,"b":2}"#);
        assert_eq!(envelope.proofs()[0].id.as_str().len(), 64);
        assert!(matches!(pipeline.state(), PipelineState::Signed(_)));
    }

    #[test]
    fn command_tag_reads_tagged_payloads() {
        let payload = json!({"UploadContractTemplate": {"providerName": "Acme", "rules": []}});
        assert_eq!(
            command_tag(&payload),
            Some(CommandTag {
                tag: "UploadContractTemplate",
                provider_name: Some("Acme"),
            })
        );

        let untagged = json!({"a": 1, "b": 2});
        assert_eq!(command_tag(&untagged), None);
        assert_eq!(command_tag(&json!([1])), None);
        assert_eq!(
            command_tag(&json!({"Ping": null})).map(|c| c.provider_name),
            Some(None)
        );
    }
}
