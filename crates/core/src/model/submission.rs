use std::collections::BTreeMap;

use chrono::{DateTime, Utc};

use crate::model::ids::{QuestionId, TestId, UserId};
use crate::model::question::OptionLabel;

/// Snapshot of an attempt handed by value to the submission collaborator.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionRequest {
    pub test_id: TestId,
    pub user_id: UserId,
    pub answers: BTreeMap<QuestionId, OptionLabel>,
    pub started_at: DateTime<Utc>,
    pub ended_at: DateTime<Utc>,
    pub elapsed_secs: u64,
}

impl SubmissionRequest {
    /// Elapsed time as the decimal string the backend expects.
    #[must_use]
    pub fn elapsed_secs_string(&self) -> String {
        self.elapsed_secs.to_string()
    }
}

/// Backend acknowledgement of a stored attempt.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SubmitAck {
    /// Server-side reference for the stored attempt, when provided.
    pub reference: Option<String>,
    pub message: Option<String>,
}
