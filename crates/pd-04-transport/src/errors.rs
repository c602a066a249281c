//! Transport error types.

use shared_types::{ErrorKind, PtocError};
use thiserror::Error;

/// Transport error type.
#[derive(Debug, Clone, Error, PartialEq, Eq)]
pub enum TransportError {
    /// The registry has no transport entries for the node.
    #[error("Node not found in registry: {0}")]
    NodeNotFound(String),

    /// No registry entry matches a locally loaded transport.
    #[error("No matching transport for node {0}")]
    NoTransport(String),

    /// Envelope validation failed (wrong node, bad component, bad IDs).
    #[error("Invalid transport message: {0}")]
    Validation(String),

    /// No client is registered for the component.
    #[error("No receiver for component: {0}")]
    NoReceiver(String),

    /// The transport plugin failed to accept the message.
    #[error("Transport send failed: {0}")]
    PluginFailure(String),

    /// The registry lookup failed.
    #[error("Registry lookup failed: {0}")]
    RegistryFailure(String),
}

impl TransportError {
    /// Classifies this error into the shared taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Self::NodeNotFound(_) | Self::NoTransport(_) => ErrorKind::Validation,
            Self::Validation(_) | Self::NoReceiver(_) => ErrorKind::Validation,
            Self::PluginFailure(_) | Self::RegistryFailure(_) => ErrorKind::TransientIo,
        }
    }
}

impl From<TransportError> for PtocError {
    fn from(err: TransportError) -> Self {
        PtocError::new(err.kind(), err.to_string())
    }
}
