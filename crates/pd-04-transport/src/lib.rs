//! # Transport Router
//!
//! Node-to-node message carriage over pluggable transports.
//!
//! ## Outbound
//!
//! `send` looks the destination node up in the registry, picks the first
//! transport entry whose name matches a locally loaded plugin, and hands the
//! wire message to that plugin exactly once. There is no sender-side queue
//! and no retry: delivery is at-most-once, and recovery belongs to the
//! protocol layer (idempotent replies, event-anchored completion).
//!
//! ## Inbound
//!
//! `receive` validates the envelope (target node, component token, message
//! IDs) and dispatches to the registered client whose destination matches
//! the component. An unknown component is an error to the transport, never
//! a crash, and never a delivery.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod ports;
pub mod router;

pub use errors::TransportError;
pub use ports::{RegistryLookup, RegistryNodeTransportEntry, TransportClient, TransportPlugin};
pub use router::TransportRouter;
