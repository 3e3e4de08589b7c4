mod controller;
mod driver;
mod guard;
mod progress;
mod workflow;

// Public API of the session subsystem.
pub use crate::error::SessionError;
pub use controller::{
    SessionController, SubmissionTicket, SubmitPrompt, SubmitTrigger, TickOutcome, send_submission,
};
pub use driver::{SessionCommand, SessionEvent, SessionHandle, spawn_session};
pub use guard::LeaveDecision;
pub use progress::{SectionProgress, SessionProgress};
pub use workflow::ExamSessionService;
