//! Public-transaction loop error types.

use shared_types::{ErrorKind, PtocError};
use thiserror::Error;

/// Public-transaction loop error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum PublicTxError {
    /// The signer's queue is full; the caller retries with backoff.
    #[error("Submission queue full for signer {0}")]
    QueueFull(String),

    /// The signer's loop has stopped.
    #[error("Signer loop stopped for {0}")]
    Stopped(String),

    /// The base-ledger client rejected the submission.
    #[error("Submission failed: {0}")]
    Submission(String),
}

impl PublicTxError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QueueFull(_) | Self::Stopped(_) | Self::Submission(_) => ErrorKind::TransientIo,
        }
    }
}

impl From<PublicTxError> for PtocError {
    fn from(err: PublicTxError) -> Self {
        PtocError::new(err.kind(), err.to_string())
    }
}
