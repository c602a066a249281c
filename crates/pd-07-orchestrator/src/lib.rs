//! # Contract Orchestrator
//!
//! One cooperative loop per contract instance, driving each private
//! transaction through its stages:
//!
//! ```text
//! NEW → PRE_ASSEMBLY_DONE → ASSEMBLY_DONE → ATTESTATION_COMPLETE → DISPATCH_SUBMITTED → CONFIRMED
//!                                    └── REVERTED (terminal, with reason)
//!                                    └── FAILED   (terminal, fatal)
//! ```
//!
//! ## Concurrency Bounds
//!
//! | Bound | Enforcement |
//! |-------|-------------|
//! | `max_concurrent_process` in-flight transactions | overflow queued in arrival order |
//! | `max_pending_events` queued events | `try_send` rejects beyond capacity |
//! | idle `stale_timeout` | loop exits; the engine starts a fresh one on demand |
//! | 3 consecutive storage failures | orchestrator quarantined for a cool-down |
//!
//! One `tokio::select!` over the event channel, the evaluation tick, and the
//! shutdown signal drives all transitions; stage work for a given
//! transaction is strictly serialized.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod config;
pub mod errors;
pub mod events;
pub mod orchestrator;
pub mod ports;
pub mod stage;

pub use config::OrchestratorConfig;
pub use errors::OrchestratorError;
pub use events::OrchestratorEvent;
pub use orchestrator::ContractOrchestrator;
pub use ports::DispatchSubmitter;
pub use stage::TxStage;
