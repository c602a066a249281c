//! Engine error types.

use shared_types::{ErrorKind, PtocError};
use thiserror::Error;

/// Engine error type, surfaced to callers of the engine API.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum EngineError {
    /// A required submission field is missing or malformed.
    #[error("Invalid transaction: {0}")]
    Validation(String),

    /// A collaborator failed; the wrapped error carries the kind.
    #[error(transparent)]
    Core(#[from] PtocError),
}

impl EngineError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Validation(_) => ErrorKind::Validation,
            Self::Core(e) => e.kind(),
        }
    }
}

impl From<EngineError> for PtocError {
    fn from(err: EngineError) -> Self {
        match err {
            EngineError::Validation(msg) => PtocError::validation(msg),
            EngineError::Core(e) => e,
        }
    }
}
