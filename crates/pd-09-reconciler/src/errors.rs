//! Reconciler error types.

use shared_types::{ErrorKind, PtocError};
use thiserror::Error;

/// Reconciler error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum ReconcilerError {
    /// No contract instance is registered for the batch's address.
    #[error("Event batch for unknown contract {0}")]
    UnknownContract(String),

    /// The domain's event handler failed.
    #[error("Domain event handling failed: {0}")]
    Domain(String),

    /// The batch could not be committed within the retry budget.
    #[error("Batch commit failed after {attempts} attempts: {cause}")]
    CommitFailed {
        /// Attempts made.
        attempts: u32,
        /// Final failure.
        cause: String,
    },
}

impl ReconcilerError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownContract(_) => ErrorKind::Validation,
            Self::Domain(_) => ErrorKind::Domain,
            Self::CommitFailed { .. } => ErrorKind::TransientIo,
        }
    }
}

impl From<ReconcilerError> for PtocError {
    fn from(err: ReconcilerError) -> Self {
        PtocError::new(err.kind(), err.to_string())
    }
}
