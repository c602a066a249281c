//! Identity-resolution error types.

use shared_types::{ErrorKind, PtocError};
use thiserror::Error;

/// Identity-resolution error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum IdentityError {
    /// The key manager does not know the lookup.
    #[error("Unknown identity: {0}")]
    UnknownIdentity(String),

    /// The lookup exists but not under the requested algorithm/verifier type.
    #[error("Identity {lookup} cannot produce a {verifier_type} verifier for {algorithm}")]
    UnsupportedAlgorithm {
        /// The lookup string.
        lookup: String,
        /// Requested algorithm.
        algorithm: String,
        /// Requested verifier type.
        verifier_type: String,
    },

    /// The key manager call failed; retryable.
    #[error("Key manager failure for {lookup}: {cause}")]
    ResolveFailed {
        /// The lookup string.
        lookup: String,
        /// One-line cause.
        cause: String,
    },

    /// The key manager call did not answer within the resolve timeout.
    #[error("Identity resolution timed out for {0}")]
    Timeout(String),

    /// Signing failed for a lookup this node owns.
    #[error("Signing failed for {lookup}: {cause}")]
    SignFailed {
        /// The lookup string.
        lookup: String,
        /// One-line cause.
        cause: String,
    },
}

impl IdentityError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::UnknownIdentity(_) | Self::UnsupportedAlgorithm { .. } => ErrorKind::Validation,
            Self::ResolveFailed { .. } | Self::SignFailed { .. } => ErrorKind::TransientIo,
            Self::Timeout(_) => ErrorKind::Timeout,
        }
    }
}

impl From<IdentityError> for PtocError {
    fn from(err: IdentityError) -> Self {
        PtocError::new(err.kind(), err.to_string())
    }
}
