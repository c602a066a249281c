//! # Sequencer
//!
//! Per-contract producer-before-consumer ordering over UTXO state
//! dependencies.
//!
//! ## Ordering Rule
//!
//! A transaction consuming state X may dispatch only after X's producing
//! transaction has been endorsed and either dispatched to the base ledger
//! (default `EndorsedVisible` isolation) or confirmed on-ledger
//! (`ConfirmedVisible`).
//!
//! ## Provisional Outputs
//!
//! Endorsed outputs become locally visible to subsequent assembly but stay
//! *provisional* until the producing transaction confirms. If the producer
//! fails or reverts, every transitive dependent is invalidated and queued
//! for re-assembly in FIFO order.
//!
//! The sequencer is a plain data structure owned by one orchestrator; the
//! orchestrator's event loop serializes all access.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod graph;

pub use graph::{Sequencer, TxProgress, VisibilityPolicy};
