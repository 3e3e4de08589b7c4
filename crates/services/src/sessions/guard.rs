use exam_core::model::AttemptStatus;

/// What the host should do with a back / exit request.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum LeaveDecision {
    /// Nothing to protect; navigate away.
    Allow,
    /// Show the "submit and leave?" confirmation.
    Prompt,
    /// Swallow the request; a prompt or forced submission is already pending.
    /// Also returned while any submission is outstanding (`Submitting`).
    Suppress,
}

/// Intercepts navigation while an attempt is in progress.
///
/// `prompt_open` is the single in-flight flag that de-duplicates back presses
/// arriving from several sources at once.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub(crate) struct NavigationGuard {
    prompt_open: bool,
    leaving: bool,
    leave_ready: bool,
}

impl NavigationGuard {
    pub(crate) fn request(&mut self, status: AttemptStatus) -> LeaveDecision {
        match status {
            AttemptStatus::InProgress if self.prompt_open || self.leaving => {
                LeaveDecision::Suppress
            }
            AttemptStatus::InProgress => {
                self.prompt_open = true;
                LeaveDecision::Prompt
            }
            // a submission is outstanding; leaving now would drop its result
            AttemptStatus::Submitting => LeaveDecision::Suppress,
            AttemptStatus::NotStarted | AttemptStatus::Submitted | AttemptStatus::Abandoned => {
                LeaveDecision::Allow
            }
        }
    }

    /// Close the prompt; returns whether one was open.
    pub(crate) fn take_prompt(&mut self) -> bool {
        std::mem::take(&mut self.prompt_open)
    }

    pub(crate) fn set_leaving(&mut self, leaving: bool) {
        self.leaving = leaving;
    }

    pub(crate) fn settle(&mut self, submitted: bool) {
        if submitted && self.leaving {
            self.leave_ready = true;
        }
        self.leaving = false;
    }

    pub(crate) fn mark_ready(&mut self) {
        self.leave_ready = true;
    }

    pub(crate) fn leave_ready(&self) -> bool {
        self.leave_ready
    }
}
