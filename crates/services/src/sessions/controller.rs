use std::fmt;
use std::sync::Arc;
use std::time::Duration;

use backend::AttemptSubmitter;
use exam_core::model::{
    AttemptError, AttemptStatus, OptionLabel, Question, QuestionId, SubmissionRequest, SubmitAck,
    TestAttempt, TestDefinition,
};
use exam_core::{Clock, CountdownTimer};
use tracing::{debug, info, warn};

use super::guard::{LeaveDecision, NavigationGuard};
use super::progress::{SectionProgress, SessionProgress};
use crate::config::SessionConfig;
use crate::error::SessionError;
use crate::identity::IdentityProvider;

//
// ─── SUBMISSION TYPES ──────────────────────────────────────────────────────────
//

/// What caused a submission.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum SubmitTrigger {
    /// The user pressed submit (and confirmed, if asked).
    User,
    /// The countdown reached zero.
    TimeUp,
    /// The user confirmed leaving the test screen.
    NavigationAway,
}

impl fmt::Display for SubmitTrigger {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::User => "user",
            Self::TimeUp => "time-up",
            Self::NavigationAway => "navigation-away",
        })
    }
}

/// A submission the caller must deliver to the backend, then report back
/// through `SessionController::finish_submission`.
///
/// `request.elapsed_secs` was captured when the attempt entered `Submitting`.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SubmissionTicket {
    pub trigger: SubmitTrigger,
    pub request: SubmissionRequest,
}

/// Response to the user pressing submit.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum SubmitPrompt {
    /// Ask the user to confirm; `answered` of `total` questions have a choice.
    Confirm { answered: usize, total: usize },
    /// Submission has begun.
    Ready(SubmissionTicket),
    /// Nothing to do: the attempt is not in progress or already submitting.
    Ignored,
}

impl SubmitPrompt {
    /// Confirmation text such as "3 of 5 answered".
    #[must_use]
    pub fn message(&self) -> Option<String> {
        match self {
            Self::Confirm { answered, total } => Some(format!("{answered} of {total} answered")),
            _ => None,
        }
    }
}

/// Result of one timer tick.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct TickOutcome {
    pub remaining_secs: u32,
    pub time_up: bool,
    /// Forced submission started by this tick's time-up signal.
    pub submission: Option<SubmissionTicket>,
}

//
// ─── CONTROLLER ────────────────────────────────────────────────────────────────
//

/// Owns one attempt from instructions-accepted to submitted or abandoned.
///
/// Three triggers can submit: the user, the countdown, and the navigation guard.
/// Whichever reaches `begin_submission` first moves the attempt to `Submitting`;
/// the others become no-ops until the submission settles.
pub struct SessionController {
    definition: TestDefinition,
    identity: Arc<dyn IdentityProvider>,
    clock: Clock,
    config: SessionConfig,
    attempt: TestAttempt,
    timer: Option<CountdownTimer>,
    guard: NavigationGuard,
    confirm_pending: bool,
    in_flight: Option<SubmitTrigger>,
    ack: Option<SubmitAck>,
    cursor: usize,
}

impl SessionController {
    #[must_use]
    pub fn new(
        definition: TestDefinition,
        identity: Arc<dyn IdentityProvider>,
        clock: Clock,
        config: SessionConfig,
    ) -> Self {
        let attempt = TestAttempt::new(definition.id());
        Self {
            definition,
            identity,
            clock,
            config,
            attempt,
            timer: None,
            guard: NavigationGuard::default(),
            confirm_pending: false,
            in_flight: None,
            ack: None,
            cursor: 0,
        }
    }

    #[must_use]
    pub fn definition(&self) -> &TestDefinition {
        &self.definition
    }

    #[must_use]
    pub fn config(&self) -> &SessionConfig {
        &self.config
    }

    #[must_use]
    pub fn attempt(&self) -> &TestAttempt {
        &self.attempt
    }

    #[must_use]
    pub fn status(&self) -> AttemptStatus {
        self.attempt.status()
    }

    /// Backend acknowledgement, once submitted.
    #[must_use]
    pub fn ack(&self) -> Option<&SubmitAck> {
        self.ack.as_ref()
    }

    #[must_use]
    pub fn in_flight(&self) -> Option<SubmitTrigger> {
        self.in_flight
    }

    #[must_use]
    pub fn remaining_secs(&self) -> Option<u32> {
        self.timer
            .as_ref()
            .map(|timer| timer.remaining_secs(self.clock.now()))
    }

    #[must_use]
    pub fn elapsed_secs(&self) -> Option<u64> {
        self.timer
            .as_ref()
            .map(|timer| timer.elapsed_secs(self.clock.now()))
    }

    #[must_use]
    pub fn is_time_up(&self) -> bool {
        self.timer.as_ref().is_some_and(CountdownTimer::is_expired)
    }

    /// Start the attempt: fix the start instant and the effective duration.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::AlreadyStarted` unless the attempt is `NotStarted`,
    /// or `SessionError::Definition` if the test window has already closed.
    pub fn accept_instructions(&mut self) -> Result<u32, SessionError> {
        if self.status() != AttemptStatus::NotStarted {
            return Err(SessionError::AlreadyStarted);
        }
        let now = self.clock.now();
        let duration_secs = self.definition.effective_duration_secs(now)?;
        self.attempt.start(now, duration_secs)?;
        self.timer = Some(CountdownTimer::new(now, duration_secs));
        info!(
            test_id = %self.definition.id(),
            duration_secs,
            "attempt started"
        );
        Ok(duration_secs)
    }

    /// Record the user's choice for a question.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` before instructions are accepted,
    /// `SessionError::UnknownQuestion` for ids outside the test,
    /// `SessionError::TimeUp` once the allotted time has run out, and
    /// `SessionError::Attempt(AttemptError::Locked)` once submission has begun.
    pub fn select_answer(
        &mut self,
        question: QuestionId,
        label: OptionLabel,
    ) -> Result<(), SessionError> {
        if self.status() == AttemptStatus::NotStarted {
            return Err(SessionError::NotStarted);
        }
        if self.definition.question(question).is_none() {
            return Err(SessionError::UnknownQuestion(question));
        }
        // Answers close with the allotted time even if the forced submission did not land.
        if self.status() == AttemptStatus::InProgress && self.remaining_secs() == Some(0) {
            return Err(SessionError::TimeUp);
        }
        self.attempt.select_answer(question, label)?;
        Ok(())
    }

    /// Recompute the countdown from the start instant. The tick that first observes
    /// expiry begins a forced submission if the attempt is still in progress.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotStarted` before instructions are accepted, or the
    /// error that prevented the forced submission from starting.
    pub fn tick(&mut self) -> Result<TickOutcome, SessionError> {
        let now = self.clock.now();
        let timer = self.timer.as_mut().ok_or(SessionError::NotStarted)?;
        let tick = timer.tick(now);

        let mut submission = None;
        if tick.time_up {
            info!(test_id = %self.definition.id(), "time up");
            submission = self.begin_submission(SubmitTrigger::TimeUp)?;
        }

        Ok(TickOutcome {
            remaining_secs: tick.remaining_secs,
            time_up: tick.time_up,
            submission,
        })
    }

    /// The user pressed submit.
    ///
    /// # Errors
    ///
    /// Propagates errors from `begin_submission` when no confirmation is needed.
    pub fn request_submit(&mut self) -> Result<SubmitPrompt, SessionError> {
        if self.status() != AttemptStatus::InProgress {
            return Ok(SubmitPrompt::Ignored);
        }
        let answered = self.attempt.answers().answered_count();
        let total = self.definition.question_count();
        if answered < total || self.config.always_confirm_submit() {
            self.confirm_pending = true;
            return Ok(SubmitPrompt::Confirm { answered, total });
        }

        Ok(self
            .begin_submission(SubmitTrigger::User)?
            .map_or(SubmitPrompt::Ignored, SubmitPrompt::Ready))
    }

    /// The user confirmed the submit prompt.
    ///
    /// # Errors
    ///
    /// Propagates errors from `begin_submission`.
    pub fn confirm_submit(&mut self) -> Result<Option<SubmissionTicket>, SessionError> {
        if !std::mem::take(&mut self.confirm_pending) {
            return Ok(None);
        }
        self.begin_submission(SubmitTrigger::User)
    }

    pub fn cancel_submit(&mut self) {
        self.confirm_pending = false;
    }

    /// Move `InProgress` to `Submitting`, capturing elapsed time now.
    ///
    /// Returns `Ok(None)` when another trigger already won.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NotAuthenticated` when nobody is signed in and
    /// `SessionError::MissingTimingData` if the start instant is absent. In both
    /// cases the attempt stays `InProgress`.
    pub fn begin_submission(
        &mut self,
        trigger: SubmitTrigger,
    ) -> Result<Option<SubmissionTicket>, SessionError> {
        if self.status() != AttemptStatus::InProgress {
            debug!(%trigger, status = %self.status(), "submission trigger ignored");
            return Ok(None);
        }

        let user_id = self
            .identity
            .current_user()
            .ok_or(SessionError::NotAuthenticated)?;
        let timer = self.timer.as_ref().ok_or(SessionError::MissingTimingData)?;
        let now = self.clock.now();
        let elapsed_secs = timer.elapsed_secs(now);
        let request = self
            .attempt
            .submission_request(user_id, now, elapsed_secs)
            .map_err(|err| match err {
                AttemptError::MissingStart => SessionError::MissingTimingData,
                other => SessionError::Attempt(other),
            })?;

        self.attempt.begin_submit()?;
        self.confirm_pending = false;
        self.in_flight = Some(trigger);
        info!(
            test_id = %self.definition.id(),
            %trigger,
            elapsed_secs,
            answered = request.answers.len(),
            "submission started"
        );

        Ok(Some(SubmissionTicket { trigger, request }))
    }

    /// Apply the backend's response to an outstanding submission.
    ///
    /// On failure the attempt returns to `InProgress` with answers and start
    /// instant unchanged, and the error is handed back for display.
    ///
    /// # Errors
    ///
    /// Returns `SessionError::NoSubmissionInFlight` if nothing is submitting,
    /// otherwise the submission's own error.
    pub fn finish_submission(
        &mut self,
        result: Result<SubmitAck, SessionError>,
    ) -> Result<(), SessionError> {
        if self.status() != AttemptStatus::Submitting {
            return Err(SessionError::NoSubmissionInFlight);
        }
        let trigger = self.in_flight.take();

        match result {
            Ok(ack) => {
                self.attempt.complete_submit()?;
                self.guard.settle(true);
                info!(
                    test_id = %self.definition.id(),
                    trigger = ?trigger,
                    reference = ?ack.reference,
                    "attempt submitted"
                );
                self.ack = Some(ack);
                Ok(())
            }
            Err(err) => {
                self.attempt.rollback_submit()?;
                self.guard.settle(false);
                warn!(
                    test_id = %self.definition.id(),
                    trigger = ?trigger,
                    error = %err,
                    "submission failed; attempt resumed"
                );
                Err(err)
            }
        }
    }

    /// Deliver a ticket to `submitter` and apply the response.
    ///
    /// # Errors
    ///
    /// Same as `finish_submission`.
    pub async fn submit_with(
        &mut self,
        submitter: Arc<dyn AttemptSubmitter>,
        ticket: SubmissionTicket,
    ) -> Result<(), SessionError> {
        let result =
            send_submission(submitter, ticket.request, self.config.submit_timeout()).await;
        self.finish_submission(result)
    }

    //
    // ─── NAVIGATION ────────────────────────────────────────────────────────────
    //

    /// A back / exit request arrived from any source.
    pub fn on_leave_requested(&mut self) -> LeaveDecision {
        let decision = self.guard.request(self.status());
        match decision {
            LeaveDecision::Allow if self.status() == AttemptStatus::NotStarted => {
                if let Err(err) = self.attempt.abandon() {
                    warn!(error = %err, "could not abandon attempt");
                }
            }
            LeaveDecision::Prompt => {
                info!(test_id = %self.definition.id(), "navigation intercepted");
            }
            _ => {}
        }
        decision
    }

    /// The user chose to submit and leave.
    ///
    /// Returns a forced-submission ticket when this call started the submission.
    /// Navigation may proceed once `leave_ready` is true.
    ///
    /// # Errors
    ///
    /// Propagates errors from `begin_submission`; the attempt stays in progress.
    pub fn confirm_leave(&mut self) -> Result<Option<SubmissionTicket>, SessionError> {
        if !self.guard.take_prompt() {
            return Ok(None);
        }
        match self.status() {
            AttemptStatus::InProgress => {
                self.guard.set_leaving(true);
                let ticket = self.begin_submission(SubmitTrigger::NavigationAway);
                if !matches!(ticket, Ok(Some(_))) {
                    self.guard.set_leaving(false);
                }
                ticket
            }
            // another trigger got there first; leave once it settles
            AttemptStatus::Submitting => {
                self.guard.set_leaving(true);
                Ok(None)
            }
            _ => {
                self.guard.mark_ready();
                Ok(None)
            }
        }
    }

    /// The user chose to stay.
    pub fn cancel_leave(&mut self) {
        self.guard.take_prompt();
    }

    #[must_use]
    pub fn leave_ready(&self) -> bool {
        self.guard.leave_ready()
    }

    //
    // ─── QUESTION CURSOR ───────────────────────────────────────────────────────
    //

    #[must_use]
    pub fn current_index(&self) -> usize {
        self.cursor
    }

    #[must_use]
    pub fn current_question(&self) -> Option<&Question> {
        self.definition.questions().get(self.cursor)
    }

    pub fn next_question(&mut self) -> Option<&Question> {
        if self.cursor + 1 < self.definition.question_count() {
            self.cursor += 1;
            self.current_question()
        } else {
            None
        }
    }

    pub fn previous_question(&mut self) -> Option<&Question> {
        if self.cursor > 0 {
            self.cursor -= 1;
            self.current_question()
        } else {
            None
        }
    }

    /// # Errors
    ///
    /// Returns `SessionError::UnknownQuestion` if the id is not in this test.
    pub fn jump_to(&mut self, question: QuestionId) -> Result<&Question, SessionError> {
        let index = self
            .definition
            .questions()
            .iter()
            .position(|q| q.id == question)
            .ok_or(SessionError::UnknownQuestion(question))?;
        self.cursor = index;
        Ok(&self.definition.questions()[index])
    }

    /// Returns a summary of the current session progress.
    #[must_use]
    pub fn progress(&self) -> SessionProgress {
        let answers = self.attempt.answers();
        let sections = self
            .definition
            .sections()
            .into_iter()
            .map(|name| {
                let in_section = self
                    .definition
                    .questions()
                    .iter()
                    .filter(|q| q.section == name);
                let (total, answered) = in_section.fold((0, 0), |(total, answered), q| {
                    (total + 1, answered + usize::from(answers.is_answered(q.id)))
                });
                SectionProgress {
                    name: name.to_owned(),
                    total,
                    answered,
                }
            })
            .collect();

        SessionProgress {
            status: self.status(),
            total: self.definition.question_count(),
            answered: answers.answered_count(),
            remaining_secs: self.remaining_secs(),
            sections,
        }
    }
}

/// Call the submitter, bounded by `timeout`.
///
/// # Errors
///
/// Returns `SessionError::SubmitTimedOut` if the call does not finish in time,
/// `SessionError::SubmissionRejected` for business errors, or `SessionError::Backend`.
pub async fn send_submission(
    submitter: Arc<dyn AttemptSubmitter>,
    request: SubmissionRequest,
    timeout: Duration,
) -> Result<SubmitAck, SessionError> {
    match tokio::time::timeout(timeout, submitter.submit_attempt(&request)).await {
        Ok(result) => result.map_err(SessionError::from_submit),
        Err(_) => Err(SessionError::SubmitTimedOut {
            secs: timeout.as_secs(),
        }),
    }
}

impl fmt::Debug for SessionController {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("SessionController")
            .field("test_id", &self.definition.id())
            .field("status", &self.status())
            .field("started_at", &self.attempt.started_at())
            .field("answered", &self.attempt.answers().answered_count())
            .field("in_flight", &self.in_flight)
            .field("cursor", &self.cursor)
            .finish_non_exhaustive()
    }
}

//
// ─── TESTS ─────────────────────────────────────────────────────────────────────
//

#[cfg(test)]
mod tests {
    use super::*;
    use crate::identity::SessionIdentity;
    use backend::{BackendError, InMemoryBackend};
    use chrono::Duration as ChronoDuration;
    use exam_core::ManualClock;
    use exam_core::model::{QuestionOption, TestId, UserId};
    use exam_core::time::fixed_now;

    fn build_definition(questions: u64, minutes: u32) -> TestDefinition {
        let questions = (1..=questions)
            .map(|id| Question {
                id: QuestionId::new(id),
                text: format!("Q{id}"),
                options: OptionLabel::ALL
                    .iter()
                    .map(|label| QuestionOption {
                        label: *label,
                        text: label.to_string(),
                    })
                    .collect(),
                marks: 1,
                section: if id % 2 == 0 { "Maths" } else { "GK" }.into(),
            })
            .collect();
        TestDefinition::new(TestId::new(5), "Mock", questions, minutes, None).unwrap()
    }

    fn build_controller(questions: u64, minutes: u32) -> (SessionController, ManualClock) {
        let (clock, handle) = Clock::manual(fixed_now());
        let controller = SessionController::new(
            build_definition(questions, minutes),
            Arc::new(SessionIdentity::signed_in(UserId::new(9))),
            clock,
            SessionConfig::default(),
        );
        (controller, handle)
    }

    fn started(questions: u64, minutes: u32) -> (SessionController, ManualClock) {
        let (mut controller, handle) = build_controller(questions, minutes);
        controller.accept_instructions().unwrap();
        (controller, handle)
    }

    #[test]
    fn accept_instructions_starts_once() {
        let (mut controller, _clock) = build_controller(2, 1);
        assert_eq!(controller.accept_instructions().unwrap(), 60);
        assert_eq!(controller.status(), AttemptStatus::InProgress);
        assert_eq!(
            controller.accept_instructions().unwrap_err(),
            SessionError::AlreadyStarted
        );
    }

    #[test]
    fn answering_before_start_is_rejected() {
        let (mut controller, _clock) = build_controller(2, 1);
        let err = controller
            .select_answer(QuestionId::new(1), OptionLabel::A)
            .unwrap_err();
        assert_eq!(err, SessionError::NotStarted);
    }

    #[test]
    fn unknown_question_is_rejected() {
        let (mut controller, _clock) = started(2, 1);
        let err = controller
            .select_answer(QuestionId::new(99), OptionLabel::A)
            .unwrap_err();
        assert_eq!(err, SessionError::UnknownQuestion(QuestionId::new(99)));
    }

    #[test]
    fn time_up_submits_with_real_elapsed() {
        let (mut controller, clock) = started(3, 1);
        clock.advance(ChronoDuration::seconds(65));

        let outcome = controller.tick().unwrap();
        assert_eq!(outcome.remaining_secs, 0);
        assert!(outcome.time_up);
        let ticket = outcome.submission.unwrap();
        assert_eq!(ticket.trigger, SubmitTrigger::TimeUp);
        assert_eq!(ticket.request.elapsed_secs, 65);
        assert_eq!(controller.status(), AttemptStatus::Submitting);

        clock.advance(ChronoDuration::seconds(1));
        let again = controller.tick().unwrap();
        assert!(!again.time_up);
        assert!(again.submission.is_none());
    }

    #[test]
    fn first_trigger_wins() {
        let (mut controller, clock) = started(1, 1);
        controller
            .select_answer(QuestionId::new(1), OptionLabel::B)
            .unwrap();

        let prompt = controller.request_submit().unwrap();
        assert!(matches!(prompt, SubmitPrompt::Ready(_)));

        clock.advance(ChronoDuration::seconds(61));
        let outcome = controller.tick().unwrap();
        assert!(outcome.time_up);
        assert!(outcome.submission.is_none());
        assert!(controller
            .begin_submission(SubmitTrigger::NavigationAway)
            .unwrap()
            .is_none());
        assert_eq!(controller.in_flight(), Some(SubmitTrigger::User));
    }

    #[test]
    fn elapsed_is_captured_when_submitting_begins() {
        let (mut controller, clock) = started(1, 10);
        controller
            .select_answer(QuestionId::new(1), OptionLabel::A)
            .unwrap();
        clock.advance(ChronoDuration::seconds(30));
        let SubmitPrompt::Ready(ticket) = controller.request_submit().unwrap() else {
            panic!("expected immediate submission");
        };
        clock.advance(ChronoDuration::seconds(45));
        controller.finish_submission(Ok(SubmitAck::default())).unwrap();

        assert_eq!(ticket.request.elapsed_secs, 30);
        assert_eq!(ticket.request.ended_at, fixed_now() + ChronoDuration::seconds(30));
    }

    #[test]
    fn under_answered_submit_needs_confirmation() {
        let (mut controller, _clock) = started(5, 10);
        for id in 1..=3 {
            controller
                .select_answer(QuestionId::new(id), OptionLabel::C)
                .unwrap();
        }

        let prompt = controller.request_submit().unwrap();
        assert_eq!(prompt, SubmitPrompt::Confirm { answered: 3, total: 5 });
        assert_eq!(prompt.message().as_deref(), Some("3 of 5 answered"));
        assert_eq!(controller.status(), AttemptStatus::InProgress);

        let ticket = controller.confirm_submit().unwrap().unwrap();
        assert_eq!(ticket.request.answers.len(), 3);
        assert!(!ticket.request.answers.contains_key(&QuestionId::new(4)));
        assert!(!ticket.request.answers.contains_key(&QuestionId::new(5)));
    }

    #[test]
    fn cancelled_confirmation_does_not_submit() {
        let (mut controller, _clock) = started(2, 10);
        controller.request_submit().unwrap();
        controller.cancel_submit();
        assert!(controller.confirm_submit().unwrap().is_none());
        assert_eq!(controller.status(), AttemptStatus::InProgress);
    }

    #[test]
    fn always_confirm_applies_to_complete_attempts() {
        let (clock, _handle) = Clock::manual(fixed_now());
        let mut controller = SessionController::new(
            build_definition(1, 1),
            Arc::new(SessionIdentity::signed_in(UserId::new(1))),
            clock,
            SessionConfig::default().with_always_confirm_submit(true),
        );
        controller.accept_instructions().unwrap();
        controller
            .select_answer(QuestionId::new(1), OptionLabel::A)
            .unwrap();
        assert_eq!(
            controller.request_submit().unwrap(),
            SubmitPrompt::Confirm { answered: 1, total: 1 }
        );
    }

    #[test]
    fn answers_are_frozen_while_submitting() {
        let (mut controller, _clock) = started(2, 10);
        controller
            .select_answer(QuestionId::new(1), OptionLabel::A)
            .unwrap();
        let ticket = controller
            .begin_submission(SubmitTrigger::User)
            .unwrap()
            .unwrap();

        let err = controller
            .select_answer(QuestionId::new(2), OptionLabel::B)
            .unwrap_err();
        assert!(matches!(err, SessionError::Attempt(AttemptError::Locked { .. })));
        assert_eq!(ticket.request.answers.len(), 1);
        assert_eq!(controller.attempt().answers().answered_count(), 1);
    }

    #[test]
    fn answers_close_after_failed_time_up_submission() {
        let (mut controller, clock) = started(2, 1);
        controller
            .select_answer(QuestionId::new(1), OptionLabel::A)
            .unwrap();
        clock.advance(ChronoDuration::seconds(61));
        assert!(controller.tick().unwrap().submission.is_some());
        controller
            .finish_submission(Err(SessionError::SubmissionRejected("busy".into())))
            .unwrap_err();
        assert_eq!(controller.status(), AttemptStatus::InProgress);

        clock.advance(ChronoDuration::seconds(600));
        let outcome = controller.tick().unwrap();
        assert_eq!(outcome.remaining_secs, 0);
        assert!(!outcome.time_up);
        assert_eq!(
            controller
                .select_answer(QuestionId::new(2), OptionLabel::B)
                .unwrap_err(),
            SessionError::TimeUp
        );
        assert_eq!(controller.attempt().answers().answered_count(), 1);

        // the user can still hand in what they had
        assert_eq!(
            controller.request_submit().unwrap(),
            SubmitPrompt::Confirm { answered: 1, total: 2 }
        );
        let ticket = controller.confirm_submit().unwrap().unwrap();
        assert_eq!(ticket.request.answers.len(), 1);
        controller.finish_submission(Ok(SubmitAck::default())).unwrap();
        assert_eq!(controller.status(), AttemptStatus::Submitted);
    }

    #[test]
    fn answers_close_when_time_up_finds_nobody_signed_in() {
        let (clock, handle) = Clock::manual(fixed_now());
        let identity = SessionIdentity::anonymous();
        let mut controller = SessionController::new(
            build_definition(2, 1),
            Arc::new(identity.clone()),
            clock,
            SessionConfig::default(),
        );
        controller.accept_instructions().unwrap();
        handle.advance(ChronoDuration::seconds(61));
        assert_eq!(controller.tick().unwrap_err(), SessionError::NotAuthenticated);
        assert_eq!(controller.status(), AttemptStatus::InProgress);

        identity.sign_in(UserId::new(3));
        handle.advance(ChronoDuration::seconds(3600));
        assert!(!controller.tick().unwrap().time_up);
        assert_eq!(
            controller
                .select_answer(QuestionId::new(1), OptionLabel::A)
                .unwrap_err(),
            SessionError::TimeUp
        );
        assert_eq!(controller.attempt().answers().answered_count(), 0);

        assert!(matches!(
            controller.request_submit().unwrap(),
            SubmitPrompt::Confirm { answered: 0, total: 2 }
        ));
        let ticket = controller.confirm_submit().unwrap().unwrap();
        assert_eq!(ticket.request.user_id, UserId::new(3));
        assert_eq!(ticket.request.elapsed_secs, 3661);
    }

    #[test]
    fn rejected_submission_rolls_back() {
        let (mut controller, clock) = started(2, 1);
        controller
            .select_answer(QuestionId::new(1), OptionLabel::A)
            .unwrap();
        clock.advance(ChronoDuration::seconds(20));
        controller.begin_submission(SubmitTrigger::User).unwrap();

        let err = controller
            .finish_submission(Err(SessionError::SubmissionRejected("closed".into())))
            .unwrap_err();
        assert_eq!(err.user_message(), "closed");
        assert_eq!(controller.status(), AttemptStatus::InProgress);
        assert_eq!(controller.attempt().started_at(), Some(fixed_now()));
        assert_eq!(controller.attempt().answers().answered_count(), 1);

        clock.advance(ChronoDuration::seconds(10));
        assert_eq!(controller.tick().unwrap().remaining_secs, 30);
    }

    #[test]
    fn missing_identity_keeps_attempt_running() {
        let (clock, _handle) = Clock::manual(fixed_now());
        let identity = SessionIdentity::anonymous();
        let mut controller = SessionController::new(
            build_definition(1, 1),
            Arc::new(identity.clone()),
            clock,
            SessionConfig::default(),
        );
        controller.accept_instructions().unwrap();

        let err = controller
            .begin_submission(SubmitTrigger::User)
            .unwrap_err();
        assert_eq!(err, SessionError::NotAuthenticated);
        assert_eq!(controller.status(), AttemptStatus::InProgress);

        identity.sign_in(UserId::new(3));
        let ticket = controller
            .begin_submission(SubmitTrigger::User)
            .unwrap()
            .unwrap();
        assert_eq!(ticket.request.user_id, UserId::new(3));
    }

    #[test]
    fn finish_without_submission_is_an_error() {
        let (mut controller, _clock) = started(1, 1);
        assert_eq!(
            controller.finish_submission(Ok(SubmitAck::default())),
            Err(SessionError::NoSubmissionInFlight)
        );
    }

    #[test]
    fn cancelled_leave_changes_nothing() {
        let (mut controller, _clock) = started(2, 10);
        assert_eq!(controller.on_leave_requested(), LeaveDecision::Prompt);
        assert_eq!(controller.on_leave_requested(), LeaveDecision::Suppress);
        controller.cancel_leave();

        assert_eq!(controller.status(), AttemptStatus::InProgress);
        assert!(controller.in_flight().is_none());
        assert!(!controller.leave_ready());
    }

    #[test]
    fn confirmed_leave_forces_submission_then_releases() {
        let (mut controller, _clock) = started(2, 10);
        controller.on_leave_requested();
        let ticket = controller.confirm_leave().unwrap().unwrap();
        assert_eq!(ticket.trigger, SubmitTrigger::NavigationAway);
        assert_eq!(controller.on_leave_requested(), LeaveDecision::Suppress);
        assert!(!controller.leave_ready());

        controller.finish_submission(Ok(SubmitAck::default())).unwrap();
        assert!(controller.leave_ready());
        assert_eq!(controller.on_leave_requested(), LeaveDecision::Allow);
    }

    #[test]
    fn leaving_before_start_abandons() {
        let (mut controller, _clock) = build_controller(1, 1);
        assert_eq!(controller.on_leave_requested(), LeaveDecision::Allow);
        assert_eq!(controller.status(), AttemptStatus::Abandoned);
        assert!(controller.accept_instructions().is_err());
    }

    #[test]
    fn cursor_moves_within_bounds() {
        let (mut controller, _clock) = started(3, 1);
        assert_eq!(controller.current_question().unwrap().id, QuestionId::new(1));
        assert!(controller.previous_question().is_none());
        assert_eq!(controller.next_question().unwrap().id, QuestionId::new(2));
        assert_eq!(controller.jump_to(QuestionId::new(3)).unwrap().id, QuestionId::new(3));
        assert!(controller.next_question().is_none());
        assert_eq!(controller.current_index(), 2);
    }

    #[test]
    fn progress_counts_sections() {
        let (mut controller, _clock) = started(4, 1);
        controller
            .select_answer(QuestionId::new(2), OptionLabel::A)
            .unwrap();
        let progress = controller.progress();
        assert_eq!(progress.answered, 1);
        assert_eq!(progress.unanswered(), 3);
        assert_eq!(progress.remaining_secs, Some(60));
        let maths = progress.sections.iter().find(|s| s.name == "Maths").unwrap();
        assert_eq!((maths.total, maths.answered), (2, 1));
    }

    #[tokio::test]
    async fn submit_with_maps_rejection_and_retries() {
        let (mut controller, _clock) = started(1, 1);
        let backend = InMemoryBackend::new();
        backend
            .push_submit_outcome(Err(BackendError::Rejected("Server busy".into())))
            .unwrap();
        let submitter: Arc<dyn AttemptSubmitter> = Arc::new(backend.clone());

        let ticket = controller
            .begin_submission(SubmitTrigger::User)
            .unwrap()
            .unwrap();
        let err = controller
            .submit_with(Arc::clone(&submitter), ticket)
            .await
            .unwrap_err();
        assert_eq!(err, SessionError::SubmissionRejected("Server busy".into()));
        assert_eq!(controller.status(), AttemptStatus::InProgress);

        let ticket = controller
            .begin_submission(SubmitTrigger::User)
            .unwrap()
            .unwrap();
        controller.submit_with(submitter, ticket).await.unwrap();
        assert_eq!(controller.status(), AttemptStatus::Submitted);
        assert_eq!(backend.submissions().unwrap().len(), 2);
    }
}
