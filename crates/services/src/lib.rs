#![forbid(unsafe_code)]

pub mod config;
pub mod error;
pub mod identity;
pub mod sessions;

pub use exam_core::Clock;
pub use sessions as session;

pub use config::SessionConfig;
pub use error::SessionError;
pub use identity::{IdentityProvider, SessionIdentity};

pub use sessions::{
    ExamSessionService, LeaveDecision, SectionProgress, SessionCommand, SessionController,
    SessionEvent, SessionHandle, SessionProgress, SubmissionTicket, SubmitPrompt, SubmitTrigger,
    TickOutcome,
};
