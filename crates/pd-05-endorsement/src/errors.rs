//! Endorsement-gathering error types.

use pd_03_identity::IdentityError;
use pd_04_transport::TransportError;
use shared_types::{ErrorKind, PtocError};
use thiserror::Error;

/// Endorsement-gathering error type.
#[derive(Debug, Clone, Error)]
pub enum EndorsementError {
    /// Verifier resolution or signing failed.
    #[error(transparent)]
    Identity(#[from] IdentityError),

    /// The cross-node request could not be sent.
    #[error(transparent)]
    Transport(#[from] TransportError),

    /// The domain plugin failed while evaluating the endorsement.
    #[error("Domain endorsement call failed: {0}")]
    Domain(String),

    /// A wire payload could not be encoded or decoded.
    #[error("Endorsement wire codec failure: {0}")]
    Codec(String),

    /// The attestation request named no parties.
    #[error("Attestation request {0} has no parties")]
    NoParties(String),
}

impl EndorsementError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::Identity(e) => e.kind(),
            Self::Transport(e) => e.kind(),
            Self::Domain(_) => ErrorKind::Domain,
            Self::Codec(_) | Self::NoParties(_) => ErrorKind::Validation,
        }
    }
}

impl From<EndorsementError> for PtocError {
    fn from(err: EndorsementError) -> Self {
        PtocError::new(err.kind(), err.to_string())
    }
}
