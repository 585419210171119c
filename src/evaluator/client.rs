use std::future::Future;
use std::sync::Arc;
use std::time::Duration;

use reqwest::Client;

use super::error::EvaluatorError;
use super::types::{EvaluationRequest, FeedbackResponse, InitialPayload, RevisionPayload};

pub const DEFAULT_BASE_URL: &str = "http://localhost:5000";

/// Anything that can turn an [`EvaluationRequest`] into feedback text.
///
/// The HTTP client implements it for production; tests plug in scripted fakes.
pub trait Evaluator: Send + Sync {
    fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> impl Future<Output = Result<String, EvaluatorError>> + Send;
}

/// HTTP client for the evaluation service.
pub struct EvaluatorClient {
    client: Client,
    base_url: String,
    api_key: Option<String>,
}

impl EvaluatorClient {
    pub fn new(base_url: impl Into<String>) -> Self {
        Self::with_timeout(base_url, Duration::from_secs(120))
    }

    /// Create a client with a custom per-request timeout.
    pub fn with_timeout(base_url: impl Into<String>, timeout: Duration) -> Self {
        let client = Client::builder()
            .connect_timeout(Duration::from_secs(10))
            .timeout(timeout)
            .build()
            .expect("failed to build HTTP client");
        Self {
            client,
            base_url: base_url.into().trim_end_matches('/').to_string(),
            api_key: None,
        }
    }

    /// Send `Authorization: Bearer <key>` with every request.
    pub fn with_api_key(mut self, api_key: impl Into<String>) -> Self {
        let key = api_key.into();
        self.api_key = if key.is_empty() { None } else { Some(key) };
        self
    }

    pub fn base_url(&self) -> &str {
        &self.base_url
    }

    async fn post(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
        let url = format!("{}{}", self.base_url, request.endpoint());
        let mut builder = self.client.post(&url);
        if let Some(key) = &self.api_key {
            builder = builder.bearer_auth(key);
        }
        builder = match request {
            EvaluationRequest::Initial { document, criteria } => builder.json(&InitialPayload {
                document: document.as_str(),
                criteria: criteria.as_str(),
            }),
            EvaluationRequest::Revision {
                reviewer_note,
                prior_feedback,
            } => builder.json(&RevisionPayload {
                reviewer_note: reviewer_note.as_str(),
                prior_feedback: prior_feedback.as_str(),
            }),
        };

        let response = builder.send().await?;
        let status = response.status();

        if !status.is_success() {
            let message = response
                .text()
                .await
                .unwrap_or_else(|_| "unknown error".to_string());
            return Err(EvaluatorError::Status {
                status: status.as_u16(),
                message,
            });
        }

        let body = response.text().await?;
        let parsed: FeedbackResponse = serde_json::from_str(&body)
            .map_err(|e| EvaluatorError::Malformed(e.to_string()))?;
        if parsed.feedback.trim().is_empty() {
            return Err(EvaluatorError::Malformed("empty feedback".into()));
        }
        Ok(parsed.feedback)
    }
}

impl Evaluator for EvaluatorClient {
    async fn evaluate(&self, request: &EvaluationRequest) -> Result<String, EvaluatorError> {
        self.post(request).await
    }
}

impl<T: Evaluator> Evaluator for Arc<T> {
    fn evaluate(
        &self,
        request: &EvaluationRequest,
    ) -> impl Future<Output = Result<String, EvaluatorError>> + Send {
        (**self).evaluate(request)
    }
}
