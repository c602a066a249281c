//! # Transport Wire Envelope
//!
//! The universal wrapper for all node-to-node carriage. The transport layer
//! treats the payload as opaque bytes; routing happens on the envelope alone.
//!
//! - **Addressing**: `node` is the destination node, `component` selects the
//!   receiving client on that node.
//! - **Correlation**: request/response flows echo the request's `message_id`
//!   back as `correlation_id` and address the reply to `reply_to`.
//! - **Delivery**: at-most-once. The sender never retries; recovery is the
//!   caller's responsibility via stage-level re-issue.

use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Message-type discriminators carried on the envelope.
pub mod message_types {
    /// A request for a remote party to endorse an assembled transaction.
    pub const ENDORSEMENT_REQUEST: &str = "EndorsementRequest";
    /// The reply carrying an attestation result or revert reason.
    pub const ENDORSEMENT_RESPONSE: &str = "EndorsementResponse";
}

/// The wire envelope for one node-to-node message.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransportMessage {
    /// Unique identifier for this message.
    pub message_id: Uuid,
    /// For responses: the `message_id` of the request being answered.
    pub correlation_id: Option<Uuid>,
    /// Destination node name.
    pub node: String,
    /// Node to address replies to (the sender's node name).
    pub reply_to: String,
    /// Receiving component on the destination node.
    pub component: String,
    /// Message-type discriminator, see [`message_types`].
    pub message_type: String,
    /// Encoded message body, opaque to the transport layer.
    pub payload: Vec<u8>,
}

impl TransportMessage {
    /// Creates a request envelope with a fresh message ID.
    pub fn request(
        node: impl Into<String>,
        reply_to: impl Into<String>,
        component: impl Into<String>,
        message_type: impl Into<String>,
        payload: Vec<u8>,
    ) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            correlation_id: None,
            node: node.into(),
            reply_to: reply_to.into(),
            component: component.into(),
            message_type: message_type.into(),
            payload,
        }
    }

    /// Creates the reply envelope for this message, correlated to it and
    /// addressed to its `reply_to` node.
    pub fn reply(&self, message_type: impl Into<String>, payload: Vec<u8>) -> Self {
        Self {
            message_id: Uuid::new_v4(),
            correlation_id: Some(self.message_id),
            node: self.reply_to.clone(),
            reply_to: self.node.clone(),
            component: self.component.clone(),
            message_type: message_type.into(),
            payload,
        }
    }
}
