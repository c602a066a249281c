//! # Router
//!
//! Outbound transport selection and inbound component demultiplexing.

use crate::errors::TransportError;
use crate::ports::{RegistryLookup, RegistryNodeTransportEntry, TransportClient, TransportPlugin};
use lru::LruCache;
use shared_types::TransportMessage;
use std::collections::HashMap;
use std::num::NonZeroUsize;
use std::sync::{Arc, Mutex};
use tokio::sync::RwLock;
use tracing::{debug, warn};
use uuid::Uuid;

const REGISTRY_CACHE_CAPACITY: usize = 256;

/// The per-node transport router.
pub struct TransportRouter {
    local_node: String,
    registry: Arc<dyn RegistryLookup>,
    transports: RwLock<HashMap<String, Arc<dyn TransportPlugin>>>,
    clients: RwLock<HashMap<String, Arc<dyn TransportClient>>>,
    registry_cache: Mutex<LruCache<String, Vec<RegistryNodeTransportEntry>>>,
}

impl TransportRouter {
    /// Creates a router for the local node over the given registry.
    pub fn new(local_node: impl Into<String>, registry: Arc<dyn RegistryLookup>) -> Self {
        Self {
            local_node: local_node.into(),
            registry,
            transports: RwLock::new(HashMap::new()),
            clients: RwLock::new(HashMap::new()),
            registry_cache: Mutex::new(LruCache::new(
                NonZeroUsize::new(REGISTRY_CACHE_CAPACITY).unwrap_or(NonZeroUsize::MIN),
            )),
        }
    }

    /// The local node name.
    pub fn local_node(&self) -> &str {
        &self.local_node
    }

    /// Loads a transport plugin, keyed by its name.
    pub async fn register_transport(&self, plugin: Arc<dyn TransportPlugin>) {
        let name = plugin.name().to_string();
        debug!(transport = %name, "Transport registered");
        self.transports.write().await.insert(name, plugin);
    }

    /// Registers an inbound client, keyed by its destination.
    pub async fn register_client(&self, client: Arc<dyn TransportClient>) {
        let destination = client.destination().to_string();
        debug!(component = %destination, "Transport client registered");
        self.clients.write().await.insert(destination, client);
    }

    /// Sends one message: registry lookup, transport selection, one plugin
    /// call. Never retries; the plugin's synchronous error is the caller's.
    pub async fn send(&self, message: TransportMessage) -> Result<(), TransportError> {
        if message.node.is_empty() {
            return Err(TransportError::Validation(
                "destination node missing".to_string(),
            ));
        }

        let entries = self.node_entries(&message.node).await?;
        let transports = self.transports.read().await;
        let selected = entries
            .iter()
            .find_map(|entry| transports.get(&entry.transport).map(|t| (entry, t.clone())));
        let Some((entry, transport)) = selected else {
            return Err(TransportError::NoTransport(message.node.clone()));
        };
        drop(transports);

        debug!(
            node = %message.node,
            transport = %entry.transport,
            message_type = %message.message_type,
            message_id = %message.message_id,
            "Sending transport message"
        );
        transport.send(&entry.details_json, message).await
    }

    /// Validates and dispatches one inbound message.
    pub async fn receive(&self, message: TransportMessage) -> Result<(), TransportError> {
        if message.node != self.local_node {
            return Err(TransportError::Validation(format!(
                "message for node {} received by {}",
                message.node, self.local_node
            )));
        }
        if !valid_component(&message.component) {
            return Err(TransportError::Validation(format!(
                "invalid component token: {:?}",
                message.component
            )));
        }
        if message.message_id == Uuid::nil() {
            return Err(TransportError::Validation("nil message id".to_string()));
        }
        if message.correlation_id == Some(Uuid::nil()) {
            return Err(TransportError::Validation("nil correlation id".to_string()));
        }

        let client = self.clients.read().await.get(&message.component).cloned();
        match client {
            Some(client) => {
                client.receive_transport_message(message).await;
                Ok(())
            }
            None => {
                warn!(component = %message.component, "Inbound message for unknown component dropped");
                Err(TransportError::NoReceiver(message.component))
            }
        }
    }

    async fn node_entries(
        &self,
        node: &str,
    ) -> Result<Vec<RegistryNodeTransportEntry>, TransportError> {
        if let Ok(mut cache) = self.registry_cache.lock() {
            if let Some(entries) = cache.get(node) {
                return Ok(entries.clone());
            }
        }

        let entries = self.registry.get_node_transports(node).await?;
        if entries.is_empty() {
            return Err(TransportError::NodeNotFound(node.to_string()));
        }
        if let Ok(mut cache) = self.registry_cache.lock() {
            cache.put(node.to_string(), entries.clone());
        }
        Ok(entries)
    }

    /// Drops the cached registry entries for a node, forcing a fresh lookup.
    pub fn flush_node(&self, node: &str) {
        if let Ok(mut cache) = self.registry_cache.lock() {
            cache.pop(node);
        }
    }
}

/// A component must be a non-empty printable-ASCII token with no spaces.
fn valid_component(component: &str) -> bool {
    !component.is_empty()
        && component
            .bytes()
            .all(|b| (0x21..=0x7e).contains(&b))
}
