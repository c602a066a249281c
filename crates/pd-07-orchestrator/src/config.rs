//! Configuration for contract orchestrators.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Orchestrator configuration, shared by every contract's loop.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct OrchestratorConfig {
    /// Maximum transactions processed concurrently per contract.
    pub max_concurrent_process: usize,
    /// Event-channel capacity; arrivals beyond it are rejected.
    pub max_pending_events: usize,
    /// How often the loop re-evaluates timeouts and stalled stages.
    pub evaluation_interval: Duration,
    /// How long an endorsement request may stay unanswered before the
    /// attestation stage retries.
    pub attestation_timeout: Duration,
    /// Retry budget for the attestation stage.
    pub attestation_retries: u32,
    /// How long a dispatch may wait on the base-ledger submitter.
    pub dispatch_timeout: Duration,
    /// Retry budget for transient stage failures (assembly I/O, dispatch).
    pub stage_retries: u32,
    /// An orchestrator idle this long stops itself.
    pub stale_timeout: Duration,
    /// Consecutive persistent-storage failures before quarantine.
    pub storage_failure_limit: u32,
    /// How long a quarantined orchestrator refuses work.
    pub quarantine_cooldown: Duration,
}

impl Default for OrchestratorConfig {
    fn default() -> Self {
        Self {
            max_concurrent_process: 500,
            max_pending_events: 500,
            evaluation_interval: Duration::from_millis(100),
            attestation_timeout: Duration::from_secs(30),
            attestation_retries: 3,
            dispatch_timeout: Duration::from_secs(60),
            stage_retries: 3,
            stale_timeout: Duration::from_secs(600),
            storage_failure_limit: 3,
            quarantine_cooldown: Duration::from_secs(60),
        }
    }
}
