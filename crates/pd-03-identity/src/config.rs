//! Configuration for the identity resolver.

use serde::{Deserialize, Serialize};
use std::time::Duration;

/// Identity resolver configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct IdentityResolverConfig {
    /// Maximum cached verifier triples.
    pub cache_capacity: usize,
    /// How long a cached resolution stays valid.
    pub cache_ttl: Duration,
    /// Per-call key manager timeout.
    pub resolve_timeout: Duration,
}

impl Default for IdentityResolverConfig {
    fn default() -> Self {
        Self {
            cache_capacity: 1000,
            cache_ttl: Duration::from_secs(300),
            resolve_timeout: Duration::from_secs(10),
        }
    }
}
