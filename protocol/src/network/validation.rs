//! Client for the downstream validation service.
//!
//! The validation service evaluates a "circumstance change" against an
//! insurance provider's registered contract template. The flow is
//! asynchronous on the service side:
//!
//! ```text
//! POST /data {"ValidateCircumstance": {...}}     → 2xx, evaluation starts
//! GET  /validations/{provider}-{millis}          → non-2xx while pending
//!                                                → 2xx {riskLevel, ...} when done
//! ```
//!
//! Polling runs as a cooperatively scheduled task: it sleeps between checks
//! instead of blocking, honours a [`CancellationToken`], and is bounded both
//! by an attempt count and by a wall-clock deadline.

use std::sync::atomic::{AtomicU32, Ordering};
use std::sync::Arc;
use std::time::Duration;

use async_trait::async_trait;
use reqwest::header::CONTENT_TYPE;
use serde::{Deserialize, Serialize};
use serde_json::Value;
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tokio_util::sync::CancellationToken;
use uuid::Uuid;

use super::uploader::error_chain;
use crate::config;
use crate::error::ValidationError;

// ---------------------------------------------------------------------------
// Wire Types
// ---------------------------------------------------------------------------

/// Request body of a validation command.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidateCircumstance {
    pub provider_name: String,
    pub circumstance_change: String,
    pub user_request_id: String,
}

/// Commands accepted on the validation service's `/data` route.
/// Externally tagged: `{"ValidateCircumstance": {...}}`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum ValidationCommand {
    ValidateCircumstance(ValidateCircumstance),
}

/// Risk assessment returned once a validation completes.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationOutcome {
    pub risk_level: String,
    pub justification: String,
    #[serde(default)]
    pub matched_categories: Vec<String>,
}

/// Handle on a validation that has been requested but not yet resolved.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ValidationTicket {
    /// Id to poll under `/validations/`.
    pub validation_id: String,
    /// Correlation id sent with the request.
    pub user_request_id: String,
}

// ---------------------------------------------------------------------------
// Poll Policy
// ---------------------------------------------------------------------------

/// Bounds on a polling run.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct PollPolicy {
    /// Pause before each check.
    pub interval: Duration,
    /// Checks to issue before giving up.
    pub max_attempts: u32,
    /// Wall-clock ceiling for the whole run, `None` for attempts only.
    pub deadline: Option<Duration>,
}

impl Default for PollPolicy {
    fn default() -> Self {
        Self {
            interval: config::POLL_INTERVAL,
            max_attempts: config::POLL_MAX_ATTEMPTS,
            deadline: Some(config::POLL_DEADLINE),
        }
    }
}

impl PollPolicy {
    /// Policy with the given interval and attempt count, and a deadline of
    /// `interval * (max_attempts + 1)`.
    pub fn new(interval: Duration, max_attempts: u32) -> Self {
        Self {
            interval,
            max_attempts,
            deadline: Some(interval * max_attempts.saturating_add(1)),
        }
    }
}

// ---------------------------------------------------------------------------
// Polling
// ---------------------------------------------------------------------------

/// One status check against the validation service.
#[async_trait]
pub trait StatusProbe: Send + Sync {
    /// `Ok(None)` while pending, `Ok(Some(_))` once the result exists.
    async fn check(&self, validation_id: &str) -> Result<Option<ValidationOutcome>, ValidationError>;
}

/// Poll `probe` until a result appears, the policy runs out, or `cancel`
/// fires.
///
/// Each attempt sleeps `interval` first and then checks once, so with the
/// default policy the tenth check lands at ~20s and an eleventh is never
/// issued. A transport error on any check ends the run immediately.
pub async fn poll_until_ready(
    probe: &dyn StatusProbe,
    validation_id: &str,
    policy: PollPolicy,
    cancel: &CancellationToken,
) -> Result<ValidationOutcome, ValidationError> {
    let started = Instant::now();
    let attempts = AtomicU32::new(0);

    let checks = async {
        while attempts.load(Ordering::Relaxed) < policy.max_attempts {
            tokio::time::sleep(policy.interval).await;
            let attempt = attempts.fetch_add(1, Ordering::Relaxed) + 1;
            match probe.check(validation_id).await.map_err(Some)? {
                Some(outcome) => {
                    tracing::info!(
                        validation_id,
                        attempt,
                        risk_level = %outcome.risk_level,
                        "validation result ready"
                    );
                    return Ok(outcome);
                }
                None => tracing::debug!(validation_id, attempt, "validation pending"),
            }
        }
        Err::<ValidationOutcome, Option<ValidationError>>(None)
    };

    let bounded = async {
        match policy.deadline {
            Some(deadline) => tokio::time::timeout(deadline, checks)
                .await
                .unwrap_or(Err(None)),
            None => checks.await,
        }
    };

    let result = tokio::select! {
        biased;
        _ = cancel.cancelled() => {
            tracing::info!(validation_id, "validation polling cancelled");
            return Err(ValidationError::Cancelled);
        }
        result = bounded => result,
    };

    result.map_err(|err: Option<ValidationError>| {
        err.unwrap_or_else(|| {
            let attempts = attempts.load(Ordering::Relaxed);
            let elapsed_ms = started.elapsed().as_millis() as u64;
            tracing::warn!(validation_id, attempts, elapsed_ms, "validation timed out");
            ValidationError::Timeout {
                attempts,
                elapsed_ms,
            }
        })
    })
}

/// A polling run on its own task.
#[derive(Debug)]
pub struct PollHandle {
    task: JoinHandle<Result<ValidationOutcome, ValidationError>>,
    cancel: CancellationToken,
}

impl PollHandle {
    /// Ask the task to stop. It resolves to [`ValidationError::Cancelled`]
    /// at its next await point.
    pub fn cancel(&self) {
        self.cancel.cancel();
    }

    /// Wait for the outcome.
    pub async fn join(self) -> Result<ValidationOutcome, ValidationError> {
        match self.task.await {
            Ok(result) => result,
            Err(join_err) if join_err.is_cancelled() => Err(ValidationError::Cancelled),
            Err(join_err) => Err(ValidationError::Network(format!(
                "polling task failed: {join_err}"
            ))),
        }
    }
}

/// Start [`poll_until_ready`] on a new tokio task, returning a handle that
/// can cancel or await it.
pub fn spawn_poll(
    probe: Arc<dyn StatusProbe>,
    validation_id: String,
    policy: PollPolicy,
    cancel: CancellationToken,
) -> PollHandle {
    let task_cancel = cancel.clone();
    let task = tokio::spawn(async move {
        poll_until_ready(probe.as_ref(), &validation_id, policy, &task_cancel).await
    });
    PollHandle { task, cancel }
}

// ---------------------------------------------------------------------------
// HTTP Client
// ---------------------------------------------------------------------------

/// HTTP client for the validation service.
#[derive(Debug, Clone)]
pub struct ValidationClient {
    http: reqwest::Client,
    base_url: String,
}

impl ValidationClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_client(reqwest::Client::new(), base_url)
    }

    pub fn with_client(http: reqwest::Client, base_url: impl Into<String>) -> Self {
        let base_url = base_url.into().trim_end_matches('/').to_string();
        Self { http, base_url }
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    fn url(&self, path: &str) -> String {
        format!("{}{}", self.base_url, path)
    }

    /// `GET /providers`. Items are returned as-is.
    pub async fn providers(&self) -> Result<Vec<Value>, ValidationError> {
        let response = self
            .http
            .get(self.url(config::PROVIDERS_PATH))
            .send()
            .await
            .map_err(|e| ValidationError::Network(error_chain(&e)))?;
        let status = response.status();
        let body = response.text().await?;
        if !status.is_success() {
            return Err(ValidationError::Protocol {
                status: status.as_u16(),
                body,
            });
        }
        serde_json::from_str(&body).map_err(|e| ValidationError::Decode(e.to_string()))
    }

    /// `POST /data` with a `ValidateCircumstance` command.
    ///
    /// The service does not echo an id; the one to poll is derived from the
    /// provider name and the request time, matching how the service keys
    /// its results.
    pub async fn request_validation(
        &self,
        provider_name: &str,
        circumstance_change: &str,
    ) -> Result<ValidationTicket, ValidationError> {
        let now_ms = chrono::Utc::now().timestamp_millis();
        let user_request_id = format!("{}-{}", now_ms, Uuid::new_v4());
        let command = ValidationCommand::ValidateCircumstance(ValidateCircumstance {
            provider_name: provider_name.to_string(),
            circumstance_change: circumstance_change.to_string(),
            user_request_id: user_request_id.clone(),
        });
        let body =
            serde_json::to_vec(&command).map_err(|e| ValidationError::Decode(e.to_string()))?;

        tracing::info!(provider = provider_name, %user_request_id, "requesting validation");
        let response = self
            .http
            .post(self.url(config::DATA_PATH))
            .header(CONTENT_TYPE, "application/json")
            .body(body)
            .send()
            .await
            .map_err(|e| ValidationError::Network(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            let body = response.text().await.unwrap_or_default();
            return Err(ValidationError::Protocol {
                status: status.as_u16(),
                body,
            });
        }

        Ok(ValidationTicket {
            validation_id: format!("{}-{}", provider_name, now_ms),
            user_request_id,
        })
    }

    /// Request a validation and poll until it resolves.
    pub async fn validate(
        &self,
        provider_name: &str,
        circumstance_change: &str,
        policy: PollPolicy,
        cancel: &CancellationToken,
    ) -> Result<ValidationOutcome, ValidationError> {
        let ticket = self
            .request_validation(provider_name, circumstance_change)
            .await?;
        poll_until_ready(self, &ticket.validation_id, policy, cancel).await
    }
}

#[async_trait]
impl StatusProbe for ValidationClient {
    async fn check(&self, validation_id: &str) -> Result<Option<ValidationOutcome>, ValidationError> {
        let url = self.url(&format!("{}/{}", config::VALIDATIONS_PATH, validation_id));
        let response = self
            .http
            .get(url)
            .send()
            .await
            .map_err(|e| ValidationError::Network(error_chain(&e)))?;

        let status = response.status();
        if !status.is_success() {
            tracing::trace!(validation_id, status = status.as_u16(), "not ready");
            return Ok(None);
        }

        let body = response.text().await?;
        serde_json::from_str(&body)
            .map(Some)
            .map_err(|e| ValidationError::Decode(e.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::sync::atomic::AtomicUsize;

    /// Probe that stays pending for `ready_after` checks, then answers.
    struct ScriptedProbe {
        calls: AtomicUsize,
        ready_after: Option<usize>,
    }

    impl ScriptedProbe {
        fn never() -> Self {
            Self {
                calls: AtomicUsize::new(0),
                ready_after: None,
            }
        }

        fn after(n: usize) -> Self {
            Self {
                calls: AtomicUsize::new(0),
                ready_after: Some(n),
            }
        }

        fn calls(&self) -> usize {
            self.calls.load(Ordering::SeqCst)
        }
    }

    #[async_trait]
    impl StatusProbe for ScriptedProbe {
        async fn check(&self, _id: &str) -> Result<Option<ValidationOutcome>, ValidationError> {
            let call = self.calls.fetch_add(1, Ordering::SeqCst) + 1;
            match self.ready_after {
                Some(n) if call > n => Ok(Some(outcome())),
                _ => Ok(None),
            }
        }
    }

    struct FailingProbe;

    #[async_trait]
    impl StatusProbe for FailingProbe {
        async fn check(&self, _id: &str) -> Result<Option<ValidationOutcome>, ValidationError> {
            Err(ValidationError::Network("connection reset".into()))
        }
    }

    fn outcome() -> ValidationOutcome {
        ValidationOutcome {
            risk_level: "LOW".into(),
            justification: "covered".into(),
            matched_categories: vec!["relocation".into()],
        }
    }

    #[tokio::test(start_paused = true)]
    async fn gives_up_after_ten_checks_at_two_second_intervals() {
        let probe = ScriptedProbe::never();
        let started = Instant::now();

        let err = poll_until_ready(&probe, "acme-1", PollPolicy::default(), &CancellationToken::new())
            .await
            .unwrap_err();

        let elapsed = started.elapsed();
        assert_eq!(probe.calls(), 10, "an eleventh check must never be issued");
        assert!(elapsed >= Duration::from_secs(20));
        assert!(elapsed <= Duration::from_secs(22));
        match err {
            ValidationError::Timeout { attempts, .. } => assert_eq!(attempts, 10),
            other => panic!("expected timeout, got {other:?}"),
        }
    }

    #[tokio::test(start_paused = true)]
    async fn returns_outcome_once_ready() {
        let probe = ScriptedProbe::after(3);
        let started = Instant::now();

        let result = poll_until_ready(&probe, "acme-2", PollPolicy::default(), &CancellationToken::new())
            .await
            .unwrap();

        assert_eq!(result, outcome());
        assert_eq!(probe.calls(), 4);
        assert_eq!(started.elapsed(), Duration::from_secs(8));
    }

    #[tokio::test(start_paused = true)]
    async fn deadline_cuts_off_slow_runs() {
        let probe = ScriptedProbe::never();
        let policy = PollPolicy {
            interval: Duration::from_secs(2),
            max_attempts: 100,
            deadline: Some(Duration::from_secs(5)),
        };

        let err = poll_until_ready(&probe, "acme-3", policy, &CancellationToken::new())
            .await
            .unwrap_err();

        assert_eq!(probe.calls(), 2);
        assert!(matches!(err, ValidationError::Timeout { attempts: 2, .. }));
    }

    #[tokio::test(start_paused = true)]
    async fn cancellation_stops_polling() {
        let probe = Arc::new(ScriptedProbe::never());
        let handle = spawn_poll(
            probe.clone(),
            "acme-4".into(),
            PollPolicy::default(),
            CancellationToken::new(),
        );

        tokio::time::sleep(Duration::from_secs(5)).await;
        handle.cancel();
        let err = handle.join().await.unwrap_err();

        assert!(matches!(err, ValidationError::Cancelled));
        assert_eq!(probe.calls(), 2);
    }

    #[tokio::test(start_paused = true)]
    async fn transport_error_ends_run() {
        let err = poll_until_ready(
            &FailingProbe,
            "acme-5",
            PollPolicy::default(),
            &CancellationToken::new(),
        )
        .await
        .unwrap_err();
        assert!(matches!(err, ValidationError::Network(_)));
    }

    #[test]
    fn command_is_externally_tagged_camel_case() {
        let cmd = ValidationCommand::ValidateCircumstance(ValidateCircumstance {
            provider_name: "Acme".into(),
            circumstance_change: "moved house".into(),
            user_request_id: "1-x".into(),
        });
        assert_eq!(
            serde_json::to_value(&cmd).unwrap(),
            serde_json::json!({
                "ValidateCircumstance": {
                    "providerName": "Acme",
                    "circumstanceChange": "moved house",
                    "userRequestId": "1-x"
                }
            })
        );
    }

    #[test]
    fn outcome_parses_service_response() {
        let parsed: ValidationOutcome = serde_json::from_str(
            r#"{"riskLevel":"HIGH","justification":"excluded","matchedCategories":["flood"]}"#,
        )
        .unwrap();
        assert_eq!(parsed.risk_level, "HIGH");
        assert_eq!(parsed.matched_categories, vec!["flood"]);

        let minimal: ValidationOutcome =
            serde_json::from_str(r#"{"riskLevel":"LOW","justification":"ok"}"#).unwrap();
        assert!(minimal.matched_categories.is_empty());
    }

    #[test]
    fn policy_new_derives_deadline() {
        let policy = PollPolicy::new(Duration::from_millis(100), 4);
        assert_eq!(policy.deadline, Some(Duration::from_millis(500)));
        assert_eq!(PollPolicy::default().deadline, Some(Duration::from_secs(22)));
    }

    #[test]
    fn base_url_trailing_slash_is_trimmed() {
        let client = ValidationClient::new("http://localhost:9000/");
        assert_eq!(client.base_url(), "http://localhost:9000");
        assert_eq!(client.url("/providers"), "http://localhost:9000/providers");
    }
}
