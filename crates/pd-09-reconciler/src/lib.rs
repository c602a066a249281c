//! # Event Reconciler
//!
//! Consumes confirmed-event batches from the block indexer, keyed by
//! contract address, and anchors transaction completion in the event stream:
//!
//! 1. The contract's domain maps the raw events to completed transactions,
//!    spent states, confirmed states, and auxiliary new local states.
//! 2. All four sets commit together; a failure retries the whole batch.
//!    Every commit step is idempotent, so a replayed batch is harmless.
//! 3. Completion receipts are written first-write-wins: a transaction
//!    confirms exactly once even when the same event is replayed after a
//!    restart.
//! 4. Newly completed transactions are published to subscribers and handed
//!    to the confirmation sink (the engine) for orchestrator routing.
//!
//! Reconciliation for a given contract is strictly serialized by the caller
//! (the block indexer delivers batches in order).

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod reconciler;

pub use errors::ReconcilerError;
pub use reconciler::{ConfirmationSink, EventReconciler, ReconcilerConfig};
