//! Engine configuration.

use pd_07_orchestrator::OrchestratorConfig;
use serde::{Deserialize, Serialize};
use std::time::Duration;

/// The transport component name the engine registers under.
pub const DEFAULT_COMPONENT: &str = "ptx-engine";

/// Engine configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EngineConfig {
    /// This node's name in the registry.
    pub node_name: String,
    /// Base-ledger chain ID.
    pub chain_id: u64,
    /// Component name for inbound transport routing.
    pub component: String,
    /// Per-contract orchestrator settings.
    pub orchestrator: OrchestratorConfig,
    /// Cap on concurrently live orchestrators (distinct active contracts).
    pub max_active_contracts: usize,
    /// How long engine stop waits for orchestrator loops to exit.
    pub shutdown_timeout: Duration,
}

impl EngineConfig {
    /// A configuration for the given node with defaults elsewhere.
    pub fn for_node(node_name: impl Into<String>, chain_id: u64) -> Self {
        Self {
            node_name: node_name.into(),
            chain_id,
            component: DEFAULT_COMPONENT.to_string(),
            orchestrator: OrchestratorConfig::default(),
            max_active_contracts: 1000,
            shutdown_timeout: Duration::from_secs(10),
        }
    }
}
