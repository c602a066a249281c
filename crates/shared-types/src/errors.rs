//! # Error Taxonomy
//!
//! Shared error classification for the orchestration core. Component crates
//! define their own error enums and convert into [`PtocError`] at the engine
//! surface; the kind decides disposition:
//!
//! | Kind | Disposition |
//! |------|-------------|
//! | `Validation` | fail the caller, no retry |
//! | `Domain` | transaction REVERTED with reason, event published |
//! | `TransientIo` | retry with backoff inside the stage, then FAILED |
//! | `Timeout` | retry the stage, then FAILED |
//! | `Config` | domain quarantined; subsequent calls fail fast |
//! | `Fatal` | orchestrator stops; logged and alerted |
//!
//! The internal cause chain stays in logs; callers see the kind and a
//! one-line message.

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Classification of an orchestration-core error.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ErrorKind {
    /// Malformed input (address, JSON, verifier); not retryable.
    Validation,
    /// The domain plugin returned an error or REVERT.
    Domain,
    /// Transport send, state store, or key manager I/O failure.
    TransientIo,
    /// An awaited reply or acknowledgement did not arrive in time.
    Timeout,
    /// Domain init or schema parse failure; the domain is quarantined.
    Config,
    /// Persistence corruption or protocol invariant violation.
    Fatal,
}

impl ErrorKind {
    /// Whether a stage should retry after this error.
    pub fn retryable(&self) -> bool {
        matches!(self, Self::TransientIo | Self::Timeout)
    }
}

/// An orchestration-core error: a kind plus a one-line message.
#[derive(Clone, Debug, PartialEq, Eq, Error, Serialize, Deserialize)]
#[error("{kind:?}: {message}")]
pub struct PtocError {
    kind: ErrorKind,
    message: String,
}

impl PtocError {
    /// Creates an error of the given kind.
    pub fn new(kind: ErrorKind, message: impl Into<String>) -> Self {
        Self {
            kind,
            message: message.into(),
        }
    }

    /// A `Validation` error.
    pub fn validation(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Validation, message)
    }

    /// A `Domain` error carrying the plugin's reason.
    pub fn domain(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Domain, message)
    }

    /// A `TransientIo` error.
    pub fn transient(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::TransientIo, message)
    }

    /// A `Timeout` error.
    pub fn timeout(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Timeout, message)
    }

    /// A `Config` error.
    pub fn config(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Config, message)
    }

    /// A `Fatal` error.
    pub fn fatal(message: impl Into<String>) -> Self {
        Self::new(ErrorKind::Fatal, message)
    }

    /// The error classification.
    pub fn kind(&self) -> ErrorKind {
        self.kind
    }

    /// The one-line message.
    pub fn message(&self) -> &str {
        &self.message
    }
}
