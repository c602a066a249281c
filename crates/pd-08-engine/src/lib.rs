//! # Engine
//!
//! The process-level coordinator of the orchestration core. Owns the
//! orchestrator and gatherer arenas (by contract address), routes inbound
//! transport messages and confirmed events, runs the synchronous deploy
//! flow, and fans lifecycle events out to subscribers.
//!
//! ## Ownership
//!
//! Engine → orchestrators/gatherers is arena-style: components are owned by
//! address in engine maps, and upward references go through the
//! [`pd_09_reconciler::ConfirmationSink`] seam by address lookup, never a
//! raw back-pointer.
//!
//! ## Lifecycle
//!
//! Orchestrators are created on the first transaction for a contract, stop
//! themselves when idle past their stale timeout, and are transparently
//! recreated on the next arrival. Engine stop signals every loop and waits
//! within a bounded shutdown timeout.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod engine;
pub mod errors;
pub mod ports;


pub use config::EngineConfig;
pub use engine::{Engine, EngineTransportClient};
pub use errors::EngineError;
pub use ports::{BaseLedgerClient, DeployedContract};
