//! Shared error types for the services crate.

use thiserror::Error;

use backend::BackendError;
use exam_core::model::{AttemptError, QuestionId, TestDefinitionError};

/// Errors emitted by session services.
#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum SessionError {
    #[error("no signed-in user")]
    NotAuthenticated,
    #[error("attempt has no start time")]
    MissingTimingData,
    #[error("submission rejected: {0}")]
    SubmissionRejected(String),
    #[error("submission timed out after {secs}s")]
    SubmitTimedOut { secs: u64 },
    #[error("test has not started")]
    NotStarted,
    #[error("test already started")]
    AlreadyStarted,
    #[error("question {0} is not part of this test")]
    UnknownQuestion(QuestionId),
    #[error("no submission in flight")]
    NoSubmissionInFlight,
    #[error("time is up")]
    TimeUp,
    #[error(transparent)]
    Definition(#[from] TestDefinitionError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    Backend(#[from] BackendError),
}

impl SessionError {
    /// Map a submission failure from the backend, passing business messages through.
    #[must_use]
    pub fn from_submit(err: BackendError) -> Self {
        match err {
            BackendError::Rejected(message) => Self::SubmissionRejected(message),
            other => Self::Backend(other),
        }
    }

    /// Dismissible message for the person taking the test.
    #[must_use]
    pub fn user_message(&self) -> String {
        match self {
            Self::NotAuthenticated => "Please sign in to submit this test.".into(),
            Self::MissingTimingData => {
                "Something went wrong with this attempt's timer. Please restart the test.".into()
            }
            Self::SubmissionRejected(message) => message.clone(),
            Self::SubmitTimedOut { .. } => {
                "Submitting took too long. Check your connection and try again.".into()
            }
            Self::NotStarted => "Start the test before answering.".into(),
            Self::AlreadyStarted => "This test is already running.".into(),
            Self::UnknownQuestion(_) => "That question is not part of this test.".into(),
            Self::NoSubmissionInFlight => "Nothing is being submitted right now.".into(),
            Self::TimeUp => "Time is up. Answers can no longer be changed.".into(),
            Self::Definition(TestDefinitionError::WindowClosed { .. }) => {
                "This test is no longer open.".into()
            }
            Self::Definition(_) => "This test could not be loaded.".into(),
            Self::Attempt(AttemptError::Locked { .. }) => {
                "Answers can no longer be changed.".into()
            }
            Self::Attempt(err) => err.to_string(),
            Self::Backend(BackendError::NotFound) => "This test could not be found.".into(),
            Self::Backend(_) => "Could not reach the server. Please try again.".into(),
        }
    }
}
