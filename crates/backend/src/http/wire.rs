use std::collections::BTreeMap;

use chrono::{DateTime, Utc};
use exam_core::model::{
    OptionLabel, Question, QuestionId, QuestionOption, SubmissionRequest, SubmitAck,
    TestDefinition, TestId,
};
use serde::{Deserialize, Serialize};

use crate::repository::BackendError;

fn decode<E: core::fmt::Display>(e: E) -> BackendError {
    BackendError::Decode(e.to_string())
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct TestDto {
    pub id: u64,
    pub title: String,
    pub duration_minutes: u32,
    #[serde(default)]
    pub window_closes_at: Option<DateTime<Utc>>,
    pub questions: Vec<QuestionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct QuestionDto {
    pub id: u64,
    pub text: String,
    #[serde(default)]
    pub marks: u32,
    #[serde(default)]
    pub section: String,
    pub options: Vec<OptionDto>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct OptionDto {
    pub label: String,
    pub text: String,
}

#[derive(Debug, Clone, Serialize)]
pub(crate) struct SubmitDto {
    test_id: u64,
    user_id: u64,
    answers: BTreeMap<String, String>,
    started_at: DateTime<Utc>,
    ended_at: DateTime<Utc>,
    elapsed_secs: String,
}

#[derive(Debug, Clone, Deserialize)]
pub(crate) struct SubmitResponseDto {
    ok: bool,
    #[serde(default)]
    message: Option<String>,
    #[serde(default)]
    reference: Option<String>,
}

impl TestDto {
    /// Convert the wire shape into a validated `TestDefinition`.
    ///
    /// # Errors
    ///
    /// Returns `BackendError::Decode` for unknown option labels or invalid definitions.
    pub fn into_definition(self) -> Result<TestDefinition, BackendError> {
        let questions = self
            .questions
            .into_iter()
            .map(QuestionDto::into_question)
            .collect::<Result<Vec<_>, _>>()?;
        TestDefinition::new(
            TestId::new(self.id),
            self.title,
            questions,
            self.duration_minutes,
            self.window_closes_at,
        )
        .map_err(|e| decode(exam_core::Error::from(e)))
    }
}

impl QuestionDto {
    fn into_question(self) -> Result<Question, BackendError> {
        let options = self
            .options
            .into_iter()
            .map(|opt| {
                let label: OptionLabel = opt
                    .label
                    .parse()
                    .map_err(|e| decode(exam_core::Error::from(e)))?;
                Ok(QuestionOption {
                    label,
                    text: opt.text,
                })
            })
            .collect::<Result<Vec<_>, BackendError>>()?;
        Ok(Question {
            id: QuestionId::new(self.id),
            text: self.text,
            options,
            marks: self.marks,
            section: self.section,
        })
    }
}

impl From<&SubmissionRequest> for SubmitDto {
    fn from(req: &SubmissionRequest) -> Self {
        Self {
            test_id: req.test_id.value(),
            user_id: req.user_id.value(),
            answers: req
                .answers
                .iter()
                .map(|(q, label)| (q.to_string(), label.to_string()))
                .collect(),
            started_at: req.started_at,
            ended_at: req.ended_at,
            elapsed_secs: req.elapsed_secs_string(),
        }
    }
}

impl SubmitResponseDto {
    pub(crate) fn into_ack(self) -> Result<SubmitAck, BackendError> {
        if self.ok {
            Ok(SubmitAck {
                reference: self.reference,
                message: self.message,
            })
        } else {
            Err(BackendError::Rejected(
                self.message
                    .unwrap_or_else(|| "submission was not accepted".into()),
            ))
        }
    }
}

/// Parse a test definition from its JSON wire form.
///
/// # Errors
///
/// Returns `BackendError::Decode` if the JSON is malformed or the definition is invalid.
pub fn test_from_json(raw: &str) -> Result<TestDefinition, BackendError> {
    serde_json::from_str::<TestDto>(raw)
        .map_err(decode)?
        .into_definition()
}
