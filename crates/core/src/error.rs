use thiserror::Error;

use crate::model::{AttemptError, OptionLabelError, TestDefinitionError};

#[derive(Debug, Error)]
#[non_exhaustive]
pub enum Error {
    #[error(transparent)]
    Definition(#[from] TestDefinitionError),
    #[error(transparent)]
    Attempt(#[from] AttemptError),
    #[error(transparent)]
    OptionLabel(#[from] OptionLabelError),
}
