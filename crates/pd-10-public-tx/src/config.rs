//! Configuration for the public-transaction loop.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Public-transaction loop configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PublicTxConfig {
    /// Bounded queue depth per signing address.
    pub max_queued_per_signer: usize,
    /// How often submitted hashes are polled for inclusion.
    pub poll_interval: Duration,
}

impl Default for PublicTxConfig {
    fn default() -> Self {
        Self {
            max_queued_per_signer: 100,
            poll_interval: Duration::from_millis(500),
        }
    }
}
