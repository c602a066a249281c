//! Loopback transport network.
//!
//! Every node's router registers a `loopback` transport plugin backed by a
//! shared map of routers; sending delivers straight into the destination
//! router's `receive`. A node can be partitioned to simulate an unreachable
//! peer: sends are accepted (at-most-once, no error) and silently dropped.

use async_trait::async_trait;
use pd_04_transport::{
    RegistryLookup, RegistryNodeTransportEntry, TransportError, TransportPlugin, TransportRouter,
};
use shared_types::TransportMessage;
use std::collections::{HashMap, HashSet};
use std::sync::{Arc, Mutex};

/// The shared loopback fabric.
#[derive(Default)]
pub struct LoopbackNetwork {
    routers: Mutex<HashMap<String, Arc<TransportRouter>>>,
    partitioned: Mutex<HashSet<String>>,
}

impl LoopbackNetwork {
    /// Creates an empty network.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Attaches a node's router to the fabric.
    pub fn attach(&self, node: impl Into<String>, router: Arc<TransportRouter>) {
        self.routers
            .lock()
            .expect("router map poisoned")
            .insert(node.into(), router);
    }

    /// Drops all future traffic to a node.
    pub fn partition(&self, node: &str) {
        self.partitioned
            .lock()
            .expect("partition set poisoned")
            .insert(node.to_string());
    }

    /// Restores traffic to a node.
    pub fn heal(&self, node: &str) {
        self.partitioned
            .lock()
            .expect("partition set poisoned")
            .remove(node);
    }

    fn router_for(&self, node: &str) -> Option<Arc<TransportRouter>> {
        if self
            .partitioned
            .lock()
            .map(|p| p.contains(node))
            .unwrap_or(false)
        {
            return None;
        }
        self.routers
            .lock()
            .ok()
            .and_then(|routers| routers.get(node).cloned())
    }
}

/// The per-node loopback plugin.
pub struct LoopbackTransport {
    network: Arc<LoopbackNetwork>,
}

impl LoopbackTransport {
    /// Creates a plugin bound to the fabric.
    pub fn new(network: Arc<LoopbackNetwork>) -> Self {
        Self { network }
    }
}

#[async_trait]
impl TransportPlugin for LoopbackTransport {
    fn name(&self) -> &str {
        "loopback"
    }

    async fn send(
        &self,
        _details_json: &str,
        message: TransportMessage,
    ) -> Result<(), TransportError> {
        // A partitioned destination accepts and loses the message: the
        // at-most-once contract makes that indistinguishable from a crash
        let Some(router) = self.network.router_for(&message.node) else {
            return Ok(());
        };
        tokio::spawn(async move {
            let _ = router.receive(message).await;
        });
        Ok(())
    }
}

/// Static registry knowing every node over the loopback transport.
pub struct LoopbackRegistry;

#[async_trait]
impl RegistryLookup for LoopbackRegistry {
    async fn get_node_transports(
        &self,
        node: &str,
    ) -> Result<Vec<RegistryNodeTransportEntry>, TransportError> {
        Ok(vec![RegistryNodeTransportEntry {
            node: node.to_string(),
            transport: "loopback".to_string(),
            details_json: format!(r#"{{"endpoint":"loopback:{node}"}}"#),
        }])
    }
}
