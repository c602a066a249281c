//! # Resolver
//!
//! Caching front-end over the key manager. One entry per
//! `(lookup, algorithm, verifier type)` triple; entries age out after the
//! configured TTL and can be dropped eagerly via [`IdentityResolver::invalidate`].

use crate::config::IdentityResolverConfig;
use crate::errors::IdentityError;
use crate::ports::KeyManager;
use lru::LruCache;
use shared_types::{ResolvedVerifier, VerifierRequest};
use std::num::NonZeroUsize;
use std::sync::Arc;
use std::sync::Mutex;
use std::time::Instant;
use tracing::debug;

#[derive(Clone, PartialEq, Eq, Hash)]
struct CacheKey {
    lookup: String,
    algorithm: String,
    verifier_type: String,
}

struct CacheEntry {
    verifier: String,
    resolved_at: Instant,
}

/// Caching identity resolver.
pub struct IdentityResolver {
    key_manager: Arc<dyn KeyManager>,
    cache: Mutex<LruCache<CacheKey, CacheEntry>>,
    config: IdentityResolverConfig,
}

impl IdentityResolver {
    /// Creates a resolver over the given key manager.
    pub fn new(key_manager: Arc<dyn KeyManager>, config: IdentityResolverConfig) -> Self {
        let capacity = NonZeroUsize::new(config.cache_capacity.max(1))
            .unwrap_or(NonZeroUsize::MIN);
        Self {
            key_manager,
            cache: Mutex::new(LruCache::new(capacity)),
            config,
        }
    }

    /// The key manager behind this resolver.
    pub fn key_manager(&self) -> &Arc<dyn KeyManager> {
        &self.key_manager
    }

    /// Resolves one lookup to its verifier, consulting the cache first.
    pub async fn resolve(
        &self,
        lookup: &str,
        algorithm: &str,
        verifier_type: &str,
    ) -> Result<ResolvedVerifier, IdentityError> {
        let key = CacheKey {
            lookup: lookup.to_string(),
            algorithm: algorithm.to_string(),
            verifier_type: verifier_type.to_string(),
        };

        if let Some(verifier) = self.cached(&key) {
            return Ok(ResolvedVerifier {
                lookup: lookup.to_string(),
                algorithm: algorithm.to_string(),
                verifier_type: verifier_type.to_string(),
                verifier,
            });
        }

        let resolved = tokio::time::timeout(
            self.config.resolve_timeout,
            self.key_manager.resolve_key(lookup, algorithm, verifier_type),
        )
        .await
        .map_err(|_| IdentityError::Timeout(lookup.to_string()))??;

        debug!(lookup, algorithm, verifier = %resolved, "Identity resolved");
        if let Ok(mut cache) = self.cache.lock() {
            cache.put(
                key,
                CacheEntry {
                    verifier: resolved.clone(),
                    resolved_at: Instant::now(),
                },
            );
        }

        Ok(ResolvedVerifier {
            lookup: lookup.to_string(),
            algorithm: algorithm.to_string(),
            verifier_type: verifier_type.to_string(),
            verifier: resolved,
        })
    }

    /// Resolves a whole requirement list, order preserved.
    pub async fn resolve_all(
        &self,
        requests: &[VerifierRequest],
    ) -> Result<Vec<ResolvedVerifier>, IdentityError> {
        let mut resolved = Vec::with_capacity(requests.len());
        for request in requests {
            resolved.push(
                self.resolve(&request.lookup, &request.algorithm, &request.verifier_type)
                    .await?,
            );
        }
        Ok(resolved)
    }

    /// Drops every cached resolution for a lookup, across all algorithm and
    /// verifier-type combinations.
    pub fn invalidate(&self, lookup: &str) {
        let Ok(mut cache) = self.cache.lock() else {
            return;
        };
        let stale: Vec<CacheKey> = cache
            .iter()
            .filter(|(key, _)| key.lookup == lookup)
            .map(|(key, _)| key.clone())
            .collect();
        for key in stale {
            cache.pop(&key);
        }
        debug!(lookup, "Identity cache invalidated");
    }

    fn cached(&self, key: &CacheKey) -> Option<String> {
        let mut cache = self.cache.lock().ok()?;
        match cache.get(key) {
            Some(entry) if entry.resolved_at.elapsed() < self.config.cache_ttl => {
                Some(entry.verifier.clone())
            }
            Some(_) => {
                cache.pop(key);
                None
            }
            None => None,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use async_trait::async_trait;
    use shared_types::{algorithms, verifier_types};
    use std::collections::HashMap;
    use std::sync::atomic::{AtomicUsize, Ordering};
    use std::time::Duration;

    struct MockKeyManager {
        verifiers: HashMap<String, String>,
        calls: AtomicUsize,
        hang: bool,
    }

    impl MockKeyManager {
        fn new() -> Self {
            let mut verifiers = HashMap::new();
            verifiers.insert(
                "alice".to_string(),
                "0x00000000000000000000000000000000000000a1".to_string(),
            );
            verifiers.insert(
                "node1.notary".to_string(),
                "0x00000000000000000000000000000000000000b2".to_string(),
            );
            Self {
                verifiers,
                calls: AtomicUsize::new(0),
                hang: false,
            }
        }
    }

    #[async_trait]
    impl KeyManager for MockKeyManager {
        async fn resolve_key(
            &self,
            lookup: &str,
            _algorithm: &str,
            _verifier_type: &str,
        ) -> Result<String, IdentityError> {
            self.calls.fetch_add(1, Ordering::SeqCst);
            if self.hang {
                tokio::time::sleep(Duration::from_secs(3600)).await;
            }
            self.verifiers
                .get(lookup)
                .cloned()
                .ok_or_else(|| IdentityError::UnknownIdentity(lookup.to_string()))
        }

        async fn sign(
            &self,
            lookup: &str,
            _algorithm: &str,
            _payload: &[u8],
        ) -> Result<Vec<u8>, IdentityError> {
            Err(IdentityError::SignFailed {
                lookup: lookup.to_string(),
                cause: "not under test".to_string(),
            })
        }

        fn is_local(&self, lookup: &str) -> bool {
            self.verifiers.contains_key(lookup)
        }
    }

    fn resolver_with(km: MockKeyManager, config: IdentityResolverConfig) -> (IdentityResolver, Arc<MockKeyManager>) {
        let km = Arc::new(km);
        (IdentityResolver::new(km.clone(), config), km)
    }

    #[tokio::test]
    async fn test_resolve_and_cache() {
        let (resolver, km) = resolver_with(MockKeyManager::new(), Default::default());
        let first = resolver
            .resolve("alice", algorithms::ECDSA_SECP256K1, verifier_types::ETH_ADDRESS)
            .await
            .unwrap();
        let second = resolver
            .resolve("alice", algorithms::ECDSA_SECP256K1, verifier_types::ETH_ADDRESS)
            .await
            .unwrap();
        assert_eq!(first.verifier, second.verifier);
        // Second call came from cache
        assert_eq!(km.calls.load(Ordering::SeqCst), 1);
    }

    #[tokio::test]
    async fn test_unknown_identity_fails() {
        let (resolver, _) = resolver_with(MockKeyManager::new(), Default::default());
        let err = resolver
            .resolve("mallory", algorithms::ECDSA_SECP256K1, verifier_types::ETH_ADDRESS)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::UnknownIdentity(_)));
    }

    #[tokio::test]
    async fn test_invalidate_forces_re_resolution() {
        let (resolver, km) = resolver_with(MockKeyManager::new(), Default::default());
        resolver
            .resolve("alice", algorithms::ECDSA_SECP256K1, verifier_types::ETH_ADDRESS)
            .await
            .unwrap();
        resolver.invalidate("alice");
        resolver
            .resolve("alice", algorithms::ECDSA_SECP256K1, verifier_types::ETH_ADDRESS)
            .await
            .unwrap();
        assert_eq!(km.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_ttl_expiry_re_resolves() {
        let config = IdentityResolverConfig {
            cache_ttl: Duration::from_millis(10),
            ..Default::default()
        };
        let (resolver, km) = resolver_with(MockKeyManager::new(), config);
        resolver
            .resolve("alice", algorithms::ECDSA_SECP256K1, verifier_types::ETH_ADDRESS)
            .await
            .unwrap();
        tokio::time::sleep(Duration::from_millis(20)).await;
        resolver
            .resolve("alice", algorithms::ECDSA_SECP256K1, verifier_types::ETH_ADDRESS)
            .await
            .unwrap();
        assert_eq!(km.calls.load(Ordering::SeqCst), 2);
    }

    #[tokio::test]
    async fn test_resolve_timeout() {
        let mut km = MockKeyManager::new();
        km.hang = true;
        let config = IdentityResolverConfig {
            resolve_timeout: Duration::from_millis(20),
            ..Default::default()
        };
        let (resolver, _) = resolver_with(km, config);
        let err = resolver
            .resolve("alice", algorithms::ECDSA_SECP256K1, verifier_types::ETH_ADDRESS)
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::Timeout(_)));
    }

    #[tokio::test]
    async fn test_resolve_all_preserves_order() {
        let (resolver, _) = resolver_with(MockKeyManager::new(), Default::default());
        let requests = vec![
            VerifierRequest {
                lookup: "node1.notary".to_string(),
                algorithm: algorithms::ECDSA_SECP256K1.to_string(),
                verifier_type: verifier_types::ETH_ADDRESS.to_string(),
            },
            VerifierRequest {
                lookup: "alice".to_string(),
                algorithm: algorithms::ECDSA_SECP256K1.to_string(),
                verifier_type: verifier_types::ETH_ADDRESS.to_string(),
            },
        ];
        let resolved = resolver.resolve_all(&requests).await.unwrap();
        assert_eq!(resolved.len(), 2);
        assert_eq!(resolved[0].lookup, "node1.notary");
        assert_eq!(resolved[1].lookup, "alice");
    }
}
