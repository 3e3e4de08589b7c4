use std::collections::HashSet;
use std::fmt;
use std::str::FromStr;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use thiserror::Error;

use crate::model::ids::{QuestionId, TestId};

//
// ─── ERRORS ────────────────────────────────────────────────────────────────────
//

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[error("invalid option label: {0:?}")]
pub struct OptionLabelError(pub String);

#[derive(Debug, Error, Clone, PartialEq, Eq)]
#[non_exhaustive]
pub enum TestDefinitionError {
    #[error("test has no questions")]
    NoQuestions,

    #[error("nominal duration must be > 0 minutes")]
    InvalidDuration,

    #[error("duplicate question id {0}")]
    DuplicateQuestion(QuestionId),

    #[error("question {question} has {count} options (max {max})")]
    TooManyOptions {
        question: QuestionId,
        count: usize,
        max: usize,
    },

    #[error("question {question} repeats option {label}")]
    DuplicateOption {
        question: QuestionId,
        label: OptionLabel,
    },

    #[error("test window closed at {closed_at}")]
    WindowClosed { closed_at: DateTime<Utc> },
}

//
// ─── OPTION LABEL ──────────────────────────────────────────────────────────────
//

/// Label of one answer choice. Questions carry at most five.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
pub enum OptionLabel {
    A,
    B,
    C,
    D,
    E,
}

impl OptionLabel {
    pub const ALL: [OptionLabel; 5] = [Self::A, Self::B, Self::C, Self::D, Self::E];

    /// Zero-based position of the label (`A` = 0).
    #[must_use]
    pub fn index(self) -> usize {
        match self {
            Self::A => 0,
            Self::B => 1,
            Self::C => 2,
            Self::D => 3,
            Self::E => 4,
        }
    }

    #[must_use]
    pub fn as_str(self) -> &'static str {
        match self {
            Self::A => "A",
            Self::B => "B",
            Self::C => "C",
            Self::D => "D",
            Self::E => "E",
        }
    }
}

impl fmt::Display for OptionLabel {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for OptionLabel {
    type Err = OptionLabelError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_uppercase().as_str() {
            "A" => Ok(Self::A),
            "B" => Ok(Self::B),
            "C" => Ok(Self::C),
            "D" => Ok(Self::D),
            "E" => Ok(Self::E),
            _ => Err(OptionLabelError(s.to_owned())),
        }
    }
}

//
// ─── QUESTION ──────────────────────────────────────────────────────────────────
//

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct QuestionOption {
    pub label: OptionLabel,
    pub text: String,
}

/// One question of a test as delivered by the backend.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Question {
    pub id: QuestionId,
    pub text: String,
    pub options: Vec<QuestionOption>,
    pub marks: u32,
    pub section: String,
}

impl Question {
    pub const MAX_OPTIONS: usize = 5;

    #[must_use]
    pub fn option(&self, label: OptionLabel) -> Option<&QuestionOption> {
        self.options.iter().find(|opt| opt.label == label)
    }

    fn validate(&self) -> Result<(), TestDefinitionError> {
        if self.options.len() > Self::MAX_OPTIONS {
            return Err(TestDefinitionError::TooManyOptions {
                question: self.id,
                count: self.options.len(),
                max: Self::MAX_OPTIONS,
            });
        }
        let mut seen = HashSet::new();
        for opt in &self.options {
            if !seen.insert(opt.label) {
                return Err(TestDefinitionError::DuplicateOption {
                    question: self.id,
                    label: opt.label,
                });
            }
        }
        Ok(())
    }
}

//
// ─── TEST DEFINITION ───────────────────────────────────────────────────────────
//

/// Read-only description of a test, fetched once at session start.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TestDefinition {
    id: TestId,
    title: String,
    questions: Vec<Question>,
    nominal_duration_minutes: u32,
    window_closes_at: Option<DateTime<Utc>>,
}

impl TestDefinition {
    /// Build a validated test definition.
    ///
    /// # Errors
    ///
    /// Returns `TestDefinitionError` if there are no questions, the duration is zero,
    /// question ids repeat, or a question has too many / repeated options.
    pub fn new(
        id: TestId,
        title: impl Into<String>,
        questions: Vec<Question>,
        nominal_duration_minutes: u32,
        window_closes_at: Option<DateTime<Utc>>,
    ) -> Result<Self, TestDefinitionError> {
        if questions.is_empty() {
            return Err(TestDefinitionError::NoQuestions);
        }
        if nominal_duration_minutes == 0 {
            return Err(TestDefinitionError::InvalidDuration);
        }
        let mut ids = HashSet::with_capacity(questions.len());
        for question in &questions {
            if !ids.insert(question.id) {
                return Err(TestDefinitionError::DuplicateQuestion(question.id));
            }
            question.validate()?;
        }

        Ok(Self {
            id,
            title: title.into(),
            questions,
            nominal_duration_minutes,
            window_closes_at,
        })
    }

    #[must_use]
    pub fn id(&self) -> TestId {
        self.id
    }

    #[must_use]
    pub fn title(&self) -> &str {
        &self.title
    }

    #[must_use]
    pub fn questions(&self) -> &[Question] {
        &self.questions
    }

    #[must_use]
    pub fn question(&self, id: QuestionId) -> Option<&Question> {
        self.questions.iter().find(|q| q.id == id)
    }

    #[must_use]
    pub fn question_count(&self) -> usize {
        self.questions.len()
    }

    #[must_use]
    pub fn nominal_duration_minutes(&self) -> u32 {
        self.nominal_duration_minutes
    }

    #[must_use]
    pub fn window_closes_at(&self) -> Option<DateTime<Utc>> {
        self.window_closes_at
    }

    #[must_use]
    pub fn total_marks(&self) -> u32 {
        self.questions
            .iter()
            .fold(0_u32, |acc, q| acc.saturating_add(q.marks))
    }

    /// Section labels in first-appearance order.
    #[must_use]
    pub fn sections(&self) -> Vec<&str> {
        let mut out: Vec<&str> = Vec::new();
        for q in &self.questions {
            if !out.contains(&q.section.as_str()) {
                out.push(q.section.as_str());
            }
        }
        out
    }

    /// Effective allotted time for an attempt starting at `started_at`: the lesser of the
    /// nominal duration and the seconds left until the test window closes.
    ///
    /// # Errors
    ///
    /// Returns `TestDefinitionError::WindowClosed` if no time is left in the window.
    pub fn effective_duration_secs(
        &self,
        started_at: DateTime<Utc>,
    ) -> Result<u32, TestDefinitionError> {
        let nominal = self.nominal_duration_minutes.saturating_mul(60);
        let Some(closes_at) = self.window_closes_at else {
            return Ok(nominal);
        };

        let left = (closes_at - started_at).num_seconds();
        if left <= 0 {
            return Err(TestDefinitionError::WindowClosed {
                closed_at: closes_at,
            });
        }
        let left = u32::try_from(left).unwrap_or(u32::MAX);
        Ok(nominal.min(left))
    }
}
