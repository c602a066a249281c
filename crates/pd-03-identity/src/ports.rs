//! Outbound port to the key manager.

use crate::errors::IdentityError;
use async_trait::async_trait;

/// Key manager seam.
///
/// The key manager owns key material; the core only ever sees lookups,
/// verifiers, and signature bytes.
#[async_trait]
pub trait KeyManager: Send + Sync {
    /// Resolves a lookup to its public verifier under an algorithm and
    /// verifier type.
    async fn resolve_key(
        &self,
        lookup: &str,
        algorithm: &str,
        verifier_type: &str,
    ) -> Result<String, IdentityError>;

    /// Signs a payload with the key behind a lookup this node owns.
    async fn sign(
        &self,
        lookup: &str,
        algorithm: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, IdentityError>;

    /// Whether this node holds the key behind the lookup.
    fn is_local(&self, lookup: &str) -> bool;
}
