//! State-store error types.

use shared_types::{Bytes32, ErrorKind, PtocError};
use thiserror::Error;

/// State-store error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum StateStoreError {
    /// Schema JSON could not be parsed or registered.
    #[error("Invalid schema: {0}")]
    Schema(String),

    /// Schema ID is not registered.
    #[error("Unknown schema: {0}")]
    UnknownSchema(Bytes32),

    /// Query JSON is malformed or references unknown fields.
    #[error("Invalid query: {0}")]
    Query(String),

    /// State ID not present in the store.
    #[error("State not found: {0}")]
    NotFound(Bytes32),

    /// A confirm/spend transition would violate monotonicity.
    #[error("State {id} already {transition}")]
    AlreadyTransitioned {
        /// The state in question.
        id: Bytes32,
        /// The transition that was attempted twice.
        transition: &'static str,
    },

    /// A state is locked by a different in-flight transaction.
    #[error("State {0} locked by another transaction")]
    Locked(Bytes32),

    /// The backing storage is temporarily unavailable; callers retry.
    #[error("Storage unavailable: {0}")]
    Unavailable(String),
}

impl StateStoreError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Schema(_) | Self::UnknownSchema(_) => ErrorKind::Config,
            Self::Query(_) | Self::NotFound(_) | Self::Locked(_) => ErrorKind::Validation,
            Self::AlreadyTransitioned { .. } => ErrorKind::Fatal,
            Self::Unavailable(_) => ErrorKind::TransientIo,
        }
    }
}

impl From<StateStoreError> for PtocError {
    fn from(err: StateStoreError) -> Self {
        PtocError::new(err.kind(), err.to_string())
    }
}
