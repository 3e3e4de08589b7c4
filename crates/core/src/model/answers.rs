use std::collections::BTreeMap;

use crate::model::ids::QuestionId;
use crate::model::question::OptionLabel;

/// The user's current choice per question.
///
/// Labels are not checked against the question's options; callers are expected to
/// offer only valid choices. Locking after submission is enforced by `TestAttempt`,
/// which owns the store.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct AnswerStore {
    selected: BTreeMap<QuestionId, OptionLabel>,
}

impl AnswerStore {
    #[must_use]
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a choice, returning the one it replaced.
    pub fn select(&mut self, question: QuestionId, label: OptionLabel) -> Option<OptionLabel> {
        self.selected.insert(question, label)
    }

    #[must_use]
    pub fn answer(&self, question: QuestionId) -> Option<OptionLabel> {
        self.selected.get(&question).copied()
    }

    #[must_use]
    pub fn answered_count(&self) -> usize {
        self.selected.len()
    }

    #[must_use]
    pub fn is_answered(&self, question: QuestionId) -> bool {
        self.selected.contains_key(&question)
    }

    pub fn iter(&self) -> impl Iterator<Item = (QuestionId, OptionLabel)> + '_ {
        self.selected.iter().map(|(q, l)| (*q, *l))
    }

    /// Owned copy of the current answers, in question-id order.
    #[must_use]
    pub fn snapshot(&self) -> BTreeMap<QuestionId, OptionLabel> {
        self.selected.clone()
    }
}
