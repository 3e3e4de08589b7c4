use std::sync::Arc;

use backend::{AttemptSubmitter, Backend, TestCatalog};
use exam_core::model::TestId;
use tracing::info;

use super::controller::{SessionController, SubmissionTicket};
use super::driver::{SessionHandle, spawn_session};
use crate::Clock;
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::identity::IdentityProvider;

/// Wires the backend, identity and clock into test sessions.
#[derive(Clone)]
pub struct ExamSessionService {
    clock: Clock,
    config: SessionConfig,
    catalog: Arc<dyn TestCatalog>,
    submitter: Arc<dyn AttemptSubmitter>,
    identity: Arc<dyn IdentityProvider>,
}

impl ExamSessionService {
    #[must_use]
    pub fn new(
        clock: Clock,
        catalog: Arc<dyn TestCatalog>,
        submitter: Arc<dyn AttemptSubmitter>,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self {
            clock,
            config: SessionConfig::default(),
            catalog,
            submitter,
            identity,
        }
    }

    #[must_use]
    pub fn from_backend(
        clock: Clock,
        backend: &Backend,
        identity: Arc<dyn IdentityProvider>,
    ) -> Self {
        Self::new(
            clock,
            Arc::clone(&backend.catalog),
            Arc::clone(&backend.submitter),
            identity,
        )
    }

    #[must_use]
    pub fn with_config(mut self, config: SessionConfig) -> Self {
        self.config = config;
        self
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    /// Fetch the test once and prepare an attempt waiting on the instructions screen.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::Backend` if the definition cannot be fetched.
    pub async fn open_session(&self, test_id: TestId) -> Result<SessionController, SessionError> {
        let definition = self.catalog.fetch_test(test_id).await?;
        info!(
            %test_id,
            questions = definition.question_count(),
            minutes = definition.nominal_duration_minutes(),
            "test loaded"
        );
        Ok(SessionController::new(
            definition,
            Arc::clone(&self.identity),
            self.clock.clone(),
            self.config.clone(),
        ))
    }

    /// Deliver a submission ticket and apply the response to the controller.
    ///
    /// # Errors
    ///
    /// Returns the submission error after the attempt has been rolled back.
    pub async fn submit(
        &self,
        session: &mut SessionController,
        ticket: SubmissionTicket,
    ) -> Result<(), SessionError> {
        session
            .submit_with(Arc::clone(&self.submitter), ticket)
            .await
    }

    /// Run the session on its own task; see `spawn_session`.
    #[must_use]
    pub fn spawn(&self, session: SessionController) -> SessionHandle {
        spawn_session(session, Arc::clone(&self.submitter))
    }
}
