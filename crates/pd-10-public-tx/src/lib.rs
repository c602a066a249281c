//! # Public-Transaction Loop
//!
//! Carries prepared base-ledger calls onto the chain, one pipeline per
//! signing address:
//!
//! - **Nonce continuity** - nonces are allocated monotonically per signer
//!   and a failed submission does not consume its nonce, so no gaps form.
//! - **Backpressure** - each signer's queue is bounded; a full queue rejects
//!   the submit with a retryable error rather than buffering unboundedly.
//! - **Confirmation polling** - submitted hashes are polled until the base
//!   ledger reports inclusion; duplicate or re-delivered confirmations are
//!   tolerated downstream (completion is anchored in the event stream, not
//!   here).

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod errors;
pub mod manager;
pub mod ports;

pub use config::PublicTxConfig;
pub use errors::PublicTxError;
pub use manager::PublicTxManager;
pub use ports::SigningClient;
