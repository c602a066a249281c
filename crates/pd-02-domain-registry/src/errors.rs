//! Domain-registry error types.

use shared_types::{ErrorKind, PtocError};
use thiserror::Error;

/// Domain-registry error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum DomainRegistryError {
    /// No domain registered under the given name.
    #[error("Domain not found: {0}")]
    NotFound(String),

    /// No contract instance registered at the given address.
    #[error("No contract instance at {0}")]
    ContractNotFound(String),

    /// The domain failed init and is quarantined; the original init error
    /// is replayed to every caller.
    #[error("Domain {name} quarantined: {cause}")]
    Quarantined {
        /// Domain name.
        name: String,
        /// One-line init failure.
        cause: String,
    },

    /// Deploy preparation produced an invalid combination of outputs.
    #[error("Deploy preparation invalid: {0}")]
    DeployPrepare(String),

    /// The plugin returned an error from a dispatched call.
    #[error("Domain plugin error: {0}")]
    Plugin(String),

    /// Schema registration against the state store failed.
    #[error("Schema registration failed: {0}")]
    Schema(String),
}

impl DomainRegistryError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NotFound(_) | Self::ContractNotFound(_) => ErrorKind::Validation,
            Self::Quarantined { .. } | Self::Schema(_) => ErrorKind::Config,
            Self::DeployPrepare(_) => ErrorKind::Validation,
            Self::Plugin(_) => ErrorKind::Domain,
        }
    }
}

impl From<DomainRegistryError> for PtocError {
    fn from(err: DomainRegistryError) -> Self {
        PtocError::new(err.kind(), err.to_string())
    }
}
