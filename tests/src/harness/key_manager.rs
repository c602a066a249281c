//! In-memory secp256k1 key manager.
//!
//! Keys are created on demand per lookup (so one-time-use signers resolve
//! without pre-registration); verifiers are Ethereum addresses derived from
//! the uncompressed public key.

use async_trait::async_trait;
use k256::ecdsa::{RecoveryId, Signature, SigningKey, VerifyingKey};
use pd_03_identity::{IdentityError, KeyManager};
use sha3::{Digest, Keccak256};
use std::collections::HashMap;
use std::sync::Mutex;

/// Ethereum address (0x-hex) of a verifying key.
pub fn eth_address(key: &VerifyingKey) -> String {
    let encoded = key.to_encoded_point(false);
    let hash = Keccak256::digest(&encoded.as_bytes()[1..]);
    format!("0x{}", hex::encode(&hash[12..]))
}

/// Recovers the signing address from a 65-byte r||s||v signature over a
/// 32-byte payload hash.
pub fn recover_address(payload_hash: &[u8; 32], signature: &[u8]) -> Option<String> {
    if signature.len() != 65 {
        return None;
    }
    let sig = Signature::from_slice(&signature[..64]).ok()?;
    let recovery = RecoveryId::from_byte(signature[64])?;
    let key = VerifyingKey::recover_from_prehash(payload_hash, &sig, recovery).ok()?;
    Some(eth_address(&key))
}

/// In-memory key manager for tests.
pub struct TestKeyManager {
    /// The node that owns this key manager; only unqualified lookups and
    /// lookups qualified with this node are local.
    node: String,
    keys: Mutex<HashMap<String, SigningKey>>,
    /// Lookups this manager refuses to know (negative testing).
    unknown: Vec<String>,
}

impl TestKeyManager {
    /// Creates a key manager for one node.
    pub fn new(node: impl Into<String>) -> Self {
        Self {
            node: node.into(),
            keys: Mutex::new(HashMap::new()),
            unknown: Vec::new(),
        }
    }

    /// Marks a lookup as unknown, so resolution fails.
    pub fn with_unknown(mut self, lookup: impl Into<String>) -> Self {
        self.unknown.push(lookup.into());
        self
    }

    /// The address a lookup resolves to (creating the key if needed).
    pub fn address_of(&self, lookup: &str) -> String {
        let mut keys = self.keys.lock().expect("key map poisoned");
        let key = keys
            .entry(local_identity(lookup, &self.node).to_string())
            .or_insert_with(|| SigningKey::random(&mut rand::rngs::OsRng));
        eth_address(key.verifying_key())
    }
}

/// Strips a `@node` qualifier when it names the local node.
fn local_identity<'a>(lookup: &'a str, node: &str) -> &'a str {
    match lookup.rsplit_once('@') {
        Some((identity, qualifier)) if qualifier == node => identity,
        _ => lookup,
    }
}

#[async_trait]
impl KeyManager for TestKeyManager {
    async fn resolve_key(
        &self,
        lookup: &str,
        _algorithm: &str,
        _verifier_type: &str,
    ) -> Result<String, IdentityError> {
        if self.unknown.iter().any(|u| u == lookup) {
            return Err(IdentityError::UnknownIdentity(lookup.to_string()));
        }
        Ok(self.address_of(lookup))
    }

    async fn sign(
        &self,
        lookup: &str,
        _algorithm: &str,
        payload: &[u8],
    ) -> Result<Vec<u8>, IdentityError> {
        let identity = local_identity(lookup, &self.node).to_string();
        let mut keys = self.keys.lock().map_err(|_| IdentityError::SignFailed {
            lookup: lookup.to_string(),
            cause: "key map poisoned".to_string(),
        })?;
        let key = keys
            .entry(identity)
            .or_insert_with(|| SigningKey::random(&mut rand::rngs::OsRng));

        let payload_hash: [u8; 32] = Keccak256::digest(payload).into();
        let (signature, recovery) = key
            .sign_prehash_recoverable(&payload_hash)
            .map_err(|e| IdentityError::SignFailed {
                lookup: lookup.to_string(),
                cause: e.to_string(),
            })?;
        let mut rsv = signature.to_bytes().to_vec();
        rsv.push(recovery.to_byte());
        Ok(rsv)
    }

    fn is_local(&self, lookup: &str) -> bool {
        match lookup.rsplit_once('@') {
            Some((_, qualifier)) => qualifier == self.node,
            None => true,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test]
    async fn test_sign_then_recover() {
        let km = TestKeyManager::new("node1");
        let payload = b"transfer payload";
        let signature = km.sign("alice", "ecdsa:secp256k1", payload).await.unwrap();
        assert_eq!(signature.len(), 65);

        let payload_hash: [u8; 32] = Keccak256::digest(payload).into();
        let recovered = recover_address(&payload_hash, &signature).unwrap();
        assert_eq!(recovered, km.address_of("alice"));
    }

    #[tokio::test]
    async fn test_node_qualified_lookup_resolves_local_identity() {
        let km = TestKeyManager::new("node1");
        assert_eq!(km.address_of("notary@node1"), km.address_of("notary"));
        assert!(km.is_local("notary@node1"));
        assert!(!km.is_local("notary@node2"));
    }

    #[tokio::test]
    async fn test_unknown_lookup_fails() {
        let km = TestKeyManager::new("node1").with_unknown("mallory");
        let err = km
            .resolve_key("mallory", "ecdsa:secp256k1", "eth_address")
            .await
            .unwrap_err();
        assert!(matches!(err, IdentityError::UnknownIdentity(_)));
    }
}
