use async_trait::async_trait;
use exam_core::model::{SubmissionRequest, SubmitAck, TestDefinition, TestId};
use std::collections::{HashMap, VecDeque};
use std::sync::{Arc, Mutex};
use thiserror::Error;

/// Errors surfaced by backend adapters.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum BackendError {
    #[error("not found")]
    NotFound,

    /// Business error from the backend; the message is shown to the user verbatim.
    #[error("{0}")]
    Rejected(String),

    #[error("transport error: {0}")]
    Transport(String),

    #[error("decode error: {0}")]
    Decode(String),
}

/// Read-only source of test definitions.
#[async_trait]
pub trait TestCatalog: Send + Sync {
    /// Fetch a test with its ordered questions.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::NotFound` if missing, or other backend errors.
    async fn fetch_test(&self, id: TestId) -> Result<TestDefinition, BackendError>;
}

/// Receiver of completed attempts.
#[async_trait]
pub trait AttemptSubmitter: Send + Sync {
    /// Submit an attempt snapshot.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Rejected` with the backend's message for business errors,
    /// or transport/decode errors.
    async fn submit_attempt(&self, request: &SubmissionRequest) -> Result<SubmitAck, BackendError>;
}

/// Simple in-memory backend for testing and prototyping.
///
/// Submissions succeed unless an outcome was queued with `push_submit_outcome`.
#[derive(Clone, Default)]
pub struct InMemoryBackend {
    tests: Arc<Mutex<HashMap<TestId, TestDefinition>>>,
    submissions: Arc<Mutex<Vec<SubmissionRequest>>>,
    scripted: Arc<Mutex<VecDeque<Result<SubmitAck, BackendError>>>>,
}

impl InMemoryBackend {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Register or replace a test definition.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Transport` if the internal lock is poisoned.
    pub fn insert_test(&self, test: TestDefinition) -> Result<(), BackendError> {
        let mut guard = self
            .tests
            .lock()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        guard.insert(test.id(), test);
        Ok(())
    }

    /// Queue the outcome of the next `submit_attempt` call.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Transport` if the internal lock is poisoned.
    pub fn push_submit_outcome(
        &self,
        outcome: Result<SubmitAck, BackendError>,
    ) -> Result<(), BackendError> {
        let mut guard = self
            .scripted
            .lock()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        guard.push_back(outcome);
        Ok(())
    }

    /// Every submission call received so far, including rejected ones.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Transport` if the internal lock is poisoned.
    pub fn submissions(&self) -> Result<Vec<SubmissionRequest>, BackendError> {
        let guard = self
            .submissions
            .lock()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        Ok(guard.clone())
    }
}

#[async_trait]
impl TestCatalog for InMemoryBackend {
    async fn fetch_test(&self, id: TestId) -> Result<TestDefinition, BackendError> {
        let guard = self
            .tests
            .lock()
            .map_err(|e| BackendError::Transport(e.to_string()))?;
        guard.get(&id).cloned().ok_or(BackendError::NotFound)
    }
}

#[async_trait]
impl AttemptSubmitter for InMemoryBackend {
    async fn submit_attempt(&self, request: &SubmissionRequest) -> Result<SubmitAck, BackendError> {
        self.submissions
            .lock()
            .map_err(|e| BackendError::Transport(e.to_string()))?
            .push(request.clone());

        let scripted = self
            .scripted
            .lock()
            .map_err(|e| BackendError::Transport(e.to_string()))?
            .pop_front();
        scripted.unwrap_or_else(|| {
            Ok(SubmitAck {
                reference: Some(format!("{}-{}", request.test_id, request.user_id)),
                message: None,
            })
        })
    }
}

/// Aggregates the collaborators behind trait objects for easy backend swapping.
#[derive(Clone)]
pub struct Backend {
    pub catalog: Arc<dyn TestCatalog>,
    pub submitter: Arc<dyn AttemptSubmitter>,
}

impl Backend {
    #[must_use]
    pub fn in_memory(backend: InMemoryBackend) -> Self {
        let catalog: Arc<dyn TestCatalog> = Arc::new(backend.clone());
        let submitter: Arc<dyn AttemptSubmitter> = Arc::new(backend);
        Self { catalog, submitter }
    }
}
