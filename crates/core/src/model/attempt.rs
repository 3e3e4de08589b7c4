use std::fmt;

use chrono::{DateTime, Utc};
use thiserror::Error;

use crate::model::answers::AnswerStore;
use crate::model::ids::{QuestionId, TestId, UserId};
use crate::model::question::OptionLabel;
use crate::model::submission::SubmissionRequest;

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum AttemptError {
    #[error("cannot move attempt from {from} to {to}")]
    InvalidTransition {
        from: AttemptStatus,
        to: AttemptStatus,
    },

    #[error("answers are locked once the attempt is {status}")]
    Locked { status: AttemptStatus },

    #[error("attempt has no start time")]
    MissingStart,

    #[error("allotted duration must be > 0 seconds")]
    InvalidDuration,
}

//
// ─── STATUS ────────────────────────────────────────────────────────────────────
//

/// Lifecycle of one attempt.
///
/// Transitions only move forward, with one exception: a failed submission rolls
/// `Submitting` back to `InProgress` so the user can retry.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum AttemptStatus {
    NotStarted,
    InProgress,
    Submitting,
    Submitted,
    Abandoned,
}

impl AttemptStatus {
    /// True once answers may no longer change.
    #[must_use]
    pub fn is_locked(self) -> bool {
        matches!(self, Self::Submitting | Self::Submitted | Self::Abandoned)
    }

    #[must_use]
    pub fn is_terminal(self) -> bool {
        matches!(self, Self::Submitted | Self::Abandoned)
    }
}

impl fmt::Display for AttemptStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        let label = match self {
            Self::NotStarted => "not started",
            Self::InProgress => "in progress",
            Self::Submitting => "submitting",
            Self::Submitted => "submitted",
            Self::Abandoned => "abandoned",
        };
        f.write_str(label)
    }
}

//
// ─── ATTEMPT ───────────────────────────────────────────────────────────────────
//

/// One user's pass through a test.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestAttempt {
    test_id: TestId,
    started_at: Option<DateTime<Utc>>,
    duration_secs: u32,
    answers: AnswerStore,
    status: AttemptStatus,
}

impl TestAttempt {
    #[must_use]
    pub fn new(test_id: TestId) -> Self {
        Self {
            test_id,
            started_at: None,
            duration_secs: 0,
            answers: AnswerStore::new(),
            status: AttemptStatus::NotStarted,
        }
    }

    #[must_use]
    pub fn test_id(&self) -> TestId {
        self.test_id
    }

    #[must_use]
    pub fn started_at(&self) -> Option<DateTime<Utc>> {
        self.started_at
    }

    #[must_use]
    pub fn duration_secs(&self) -> u32 {
        self.duration_secs
    }

    #[must_use]
    pub fn answers(&self) -> &AnswerStore {
        &self.answers
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.status
    }

    /// Begin the attempt. `started_at` and `duration_secs` are fixed from here on.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` unless the attempt is `NotStarted`,
    /// and `AttemptError::InvalidDuration` for a zero duration.
    pub fn start(&mut self, now: DateTime<Utc>, duration_secs: u32) -> Result<(), AttemptError> {
        self.expect_status(AttemptStatus::NotStarted, AttemptStatus::InProgress)?;
        if duration_secs == 0 {
            return Err(AttemptError::InvalidDuration);
        }
        self.started_at = Some(now);
        self.duration_secs = duration_secs;
        self.status = AttemptStatus::InProgress;
        Ok(())
    }

    /// Record a choice for a question.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::Locked` once submission has begun (answers are unchanged),
    /// or `AttemptError::InvalidTransition` before the attempt has started.
    pub fn select_answer(
        &mut self,
        question: QuestionId,
        label: OptionLabel,
    ) -> Result<Option<OptionLabel>, AttemptError> {
        match self.status {
            AttemptStatus::InProgress => Ok(self.answers.select(question, label)),
            AttemptStatus::NotStarted => Err(AttemptError::InvalidTransition {
                from: AttemptStatus::NotStarted,
                to: AttemptStatus::InProgress,
            }),
            status => Err(AttemptError::Locked { status }),
        }
    }

    /// Snapshot the attempt for the submission collaborator.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::MissingStart` if the attempt never captured a start time.
    pub fn submission_request(
        &self,
        user_id: UserId,
        ended_at: DateTime<Utc>,
        elapsed_secs: u64,
    ) -> Result<SubmissionRequest, AttemptError> {
        let started_at = self.started_at.ok_or(AttemptError::MissingStart)?;
        Ok(SubmissionRequest {
            test_id: self.test_id,
            user_id,
            answers: self.answers.snapshot(),
            started_at,
            ended_at,
            elapsed_secs,
        })
    }

    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` unless the attempt is `InProgress`.
    pub fn begin_submit(&mut self) -> Result<(), AttemptError> {
        self.transition(AttemptStatus::InProgress, AttemptStatus::Submitting)
    }

    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` unless the attempt is `Submitting`.
    pub fn complete_submit(&mut self) -> Result<(), AttemptError> {
        self.transition(AttemptStatus::Submitting, AttemptStatus::Submitted)
    }

    /// Return a failed submission to `InProgress`; answers and start time are kept.
    ///
    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` unless the attempt is `Submitting`.
    pub fn rollback_submit(&mut self) -> Result<(), AttemptError> {
        self.transition(AttemptStatus::Submitting, AttemptStatus::InProgress)
    }

    /// # Errors
    ///
    /// Returns `AttemptError::InvalidTransition` once submission has begun.
    pub fn abandon(&mut self) -> Result<(), AttemptError> {
        match self.status {
            AttemptStatus::NotStarted | AttemptStatus::InProgress => {
                self.status = AttemptStatus::Abandoned;
                Ok(())
            }
            from => Err(AttemptError::InvalidTransition {
                from,
                to: AttemptStatus::Abandoned,
            }),
        }
    }

    fn transition(&mut self, from: AttemptStatus, to: AttemptStatus) -> Result<(), AttemptError> {
        self.expect_status(from, to)?;
        self.status = to;
        Ok(())
    }

    fn expect_status(&self, from: AttemptStatus, to: AttemptStatus) -> Result<(), AttemptError> {
        if self.status == from {
            Ok(())
        } else {
            Err(AttemptError::InvalidTransition {
                from: self.status,
                to,
            })
        }
    }
}
