//! Ports for the transport router.

use crate::errors::TransportError;
use async_trait::async_trait;
use shared_types::TransportMessage;

/// One registry entry: how to reach a node over one transport.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct RegistryNodeTransportEntry {
    /// Node name.
    pub node: String,
    /// Transport plugin name, e.g. `grpc`.
    pub transport: String,
    /// Opaque transport details JSON, handed back to the plugin verbatim.
    pub details_json: String,
}

/// Registry seam: node → transport-details lookup.
#[async_trait]
pub trait RegistryLookup: Send + Sync {
    /// Transport entries for a node; empty when the node is unknown.
    async fn get_node_transports(
        &self,
        node: &str,
    ) -> Result<Vec<RegistryNodeTransportEntry>, TransportError>;
}

/// A loaded transport plugin.
///
/// `send` accepts the message for carriage; immediate failures surface
/// synchronously, but acceptance is not delivery. The router never calls
/// `send` more than once per routed message.
#[async_trait]
pub trait TransportPlugin: Send + Sync {
    /// The transport name matched against registry entries.
    fn name(&self) -> &str;

    /// Accepts one wire message for at-most-once carriage.
    async fn send(
        &self,
        details_json: &str,
        message: TransportMessage,
    ) -> Result<(), TransportError>;
}

/// A component that can receive inbound messages from the router.
///
/// Delivery is at-most-once with no acknowledgement: implementations route
/// the message onto their own thread of control and return promptly.
#[async_trait]
pub trait TransportClient: Send + Sync {
    /// Matched against the `component` field of inbound messages.
    fn destination(&self) -> &str;

    /// Delivers one inbound message. Use it or lose it.
    async fn receive_transport_message(&self, message: TransportMessage);
}
