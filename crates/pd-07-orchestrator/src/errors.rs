//! Orchestrator error types.

use shared_types::{ErrorKind, PtocError};
use thiserror::Error;
use uuid::Uuid;

/// Orchestrator error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum OrchestratorError {
    /// The event queue is at `max_pending_events`.
    #[error("Orchestrator queue full for contract {0}")]
    QueueFull(String),

    /// The orchestrator has stopped (stale timeout or engine shutdown).
    #[error("Orchestrator stopped for contract {0}")]
    Stopped(String),

    /// The transaction is not in flight on this orchestrator.
    #[error("Transaction not in flight: {0}")]
    UnknownTransaction(Uuid),
}

impl OrchestratorError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::QueueFull(_) | Self::Stopped(_) => ErrorKind::TransientIo,
            Self::UnknownTransaction(_) => ErrorKind::Validation,
        }
    }
}

impl From<OrchestratorError> for PtocError {
    fn from(err: OrchestratorError) -> Self {
        PtocError::new(err.kind(), err.to_string())
    }
}
