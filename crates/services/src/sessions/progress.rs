use exam_core::model::AttemptStatus;

/// Aggregated view of session progress, useful for UI.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SessionProgress {
    pub status: AttemptStatus,
    pub total: usize,
    pub answered: usize,
    pub remaining_secs: Option<u32>,
    pub sections: Vec<SectionProgress>,
}

impl SessionProgress {
    #[must_use]
    pub fn unanswered(&self) -> usize {
        self.total.saturating_sub(self.answered)
    }
}

/// Answered count for one section label.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SectionProgress {
    pub name: String,
    pub total: usize,
    pub answered: usize,
}
