use std::env;
use std::sync::Arc;

use async_trait::async_trait;
use exam_core::model::{SubmissionRequest, SubmitAck, TestDefinition, TestId};
use reqwest::{Client, StatusCode};
use tracing::debug;

use crate::repository::{AttemptSubmitter, Backend, BackendError, TestCatalog};

pub mod wire;

use wire::{SubmitDto, SubmitResponseDto, TestDto};

#[derive(Clone, Debug)]
pub struct HttpBackendConfig {
    pub base_url: String,
    pub api_token: Option<String>,
}

impl HttpBackendConfig {
    #[must_use]
    pub fn new(base_url: impl Into<String>) -> Self {
        Self {
            base_url: base_url.into(),
            api_token: None,
        }
    }

    #[must_use]
    pub fn from_env() -> Option<Self> {
        let base_url = env::var("EXAM_API_URL").ok()?;
        if base_url.trim().is_empty() {
            return None;
        }
        let api_token = env::var("EXAM_API_TOKEN")
            .ok()
            .filter(|token| !token.trim().is_empty());
        Some(Self {
            base_url,
            api_token,
        })
    }
}

/// JSON-over-HTTP client for the test catalog and attempt submission endpoints.
#[derive(Clone)]
pub struct HttpBackend {
    client: Client,
    config: HttpBackendConfig,
}

impl HttpBackend {
    #[must_use]
    pub fn new(config: HttpBackendConfig) -> Self {
        Self {
            client: Client::new(),
            config,
        }
    }

    fn url(&self, path: &str) -> String {
        format!("{}/{path}", self.config.base_url.trim_end_matches('/'))
    }

    fn authorize(&self, request: reqwest::RequestBuilder) -> reqwest::RequestBuilder {
        match &self.config.api_token {
            Some(token) => request.bearer_auth(token),
            None => request,
        }
    }
}

impl Backend {
    /// Build a `Backend` that talks to the HTTP API.
    #[must_use]
    pub fn http(config: HttpBackendConfig) -> Self {
        let client = HttpBackend::new(config);
        let catalog: Arc<dyn TestCatalog> = Arc::new(client.clone());
        let submitter: Arc<dyn AttemptSubmitter> = Arc::new(client);
        Self { catalog, submitter }
    }
}

fn transport(e: reqwest::Error) -> BackendError {
    BackendError::Transport(e.to_string())
}

/// Map a `GET tests/{id}` response onto the catalog result.
fn fetch_outcome(status: StatusCode, body: &str) -> Result<TestDefinition, BackendError> {
    if status == StatusCode::NOT_FOUND {
        return Err(BackendError::NotFound);
    }
    if !status.is_success() {
        return Err(BackendError::Transport(format!("status {status}")));
    }
    serde_json::from_str::<TestDto>(body)
        .map_err(|e| BackendError::Decode(e.to_string()))?
        .into_definition()
}

/// Map a `POST attempts` response onto the submit result.
///
/// Business rejections come back as 4xx with the same body shape as a success.
fn submit_outcome(status: StatusCode, body: &str) -> Result<SubmitAck, BackendError> {
    if status.is_server_error() {
        return Err(BackendError::Transport(format!("status {status}")));
    }
    serde_json::from_str::<SubmitResponseDto>(body)
        .map_err(|e| BackendError::Decode(e.to_string()))?
        .into_ack()
}

#[async_trait]
impl TestCatalog for HttpBackend {
    async fn fetch_test(&self, id: TestId) -> Result<TestDefinition, BackendError> {
        let url = self.url(&format!("tests/{id}"));
        debug!(%url, "fetching test definition");
        let response = self
            .authorize(self.client.get(url))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        fetch_outcome(status, &body)
    }
}

#[async_trait]
impl AttemptSubmitter for HttpBackend {
    async fn submit_attempt(&self, request: &SubmissionRequest) -> Result<SubmitAck, BackendError> {
        let url = self.url("attempts");
        debug!(%url, test_id = %request.test_id, "submitting attempt");
        let response = self
            .authorize(self.client.post(url))
            .json(&SubmitDto::from(request))
            .send()
            .await
            .map_err(transport)?;
        let status = response.status();
        let body = response.text().await.map_err(transport)?;
        debug!(%status, "submit response");
        submit_outcome(status, &body)
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    const TEST_BODY: &str = r#"{
        "id": 4,
        "title": "Mock",
        "duration_minutes": 10,
        "questions": [
            { "id": 1, "text": "Q", "options": [{ "label": "A", "text": "yes" }] }
        ]
    }"#;

    #[test]
    fn fetch_maps_missing_and_failing_statuses() {
        assert_eq!(
            fetch_outcome(StatusCode::NOT_FOUND, "").unwrap_err(),
            BackendError::NotFound
        );
        assert!(matches!(
            fetch_outcome(StatusCode::BAD_GATEWAY, "").unwrap_err(),
            BackendError::Transport(_)
        ));
        let definition = fetch_outcome(StatusCode::OK, TEST_BODY).unwrap();
        assert_eq!(definition.id(), TestId::new(4));
        assert!(matches!(
            fetch_outcome(StatusCode::OK, "<html>").unwrap_err(),
            BackendError::Decode(_)
        ));
    }

    #[test]
    fn submit_maps_server_errors_to_transport() {
        let err = submit_outcome(StatusCode::SERVICE_UNAVAILABLE, "{}").unwrap_err();
        assert_eq!(err, BackendError::Transport("status 503 Service Unavailable".into()));
    }

    #[test]
    fn submit_passes_client_error_message_through() {
        let body = r#"{ "ok": false, "message": "Test window closed" }"#;
        assert_eq!(
            submit_outcome(StatusCode::CONFLICT, body).unwrap_err(),
            BackendError::Rejected("Test window closed".into())
        );
    }

    #[test]
    fn submit_reads_reference_from_success_body() {
        let body = r#"{ "ok": true, "reference": "R-12" }"#;
        let ack = submit_outcome(StatusCode::OK, body).unwrap();
        assert_eq!(ack.reference.as_deref(), Some("R-12"));
        assert!(matches!(
            submit_outcome(StatusCode::OK, "").unwrap_err(),
            BackendError::Decode(_)
        ));
    }
}
