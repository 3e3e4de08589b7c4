mod answers;
mod attempt;
mod ids;
mod question;
mod submission;

pub use ids::{QuestionId, TestId, UserId};

pub use answers::AnswerStore;
pub use attempt::{AttemptError, AttemptStatus, TestAttempt};
pub use question::{
    OptionLabel, OptionLabelError, Question, QuestionOption, TestDefinition, TestDefinitionError,
};
pub use submission::{SubmissionRequest, SubmitAck};
