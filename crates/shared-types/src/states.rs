//! # Private States
//!
//! A state is an immutable, schema-typed record under a contract address,
//! addressable by the Keccak-256 of its schema ID plus data payload.
//!
//! Lifecycle is strictly monotonic:
//!
//! ```text
//! New ──confirm event──→ Confirmed ──spend event──→ Spent
//! ```
//!
//! A state may additionally be locked by at most one in-flight transaction
//! while that transaction is being assembled/endorsed; the lock is released
//! when the transaction reaches a terminal stage.

use crate::ids::{Bytes32, EthAddress, UtcMillis};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// A reference to an existing state (spend input).
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateRef {
    /// Content-addressed state ID.
    pub id: Bytes32,
    /// Schema the state was stored under.
    pub schema_id: Bytes32,
}

/// A state produced by assembly, before it has been given an ID.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct NewState {
    /// Schema the state belongs to.
    pub schema_id: Bytes32,
    /// Raw state data JSON.
    pub data_json: String,
    /// Identity lookups of parties the state should be distributed to.
    #[serde(default)]
    pub distribution_list: Vec<String>,
}

/// A stored state record.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct State {
    /// Content-addressed ID: Keccak-256 over schema ID + data JSON.
    pub id: Bytes32,
    /// Schema ID.
    pub schema_id: Bytes32,
    /// Contract the state belongs to.
    pub contract_address: EthAddress,
    /// Raw state data JSON.
    pub data_json: String,
    /// Milliseconds timestamp assigned at upsert (`.created` pseudo-field).
    pub created: UtcMillis,
    /// Set once a confirmation event has been processed.
    pub confirmed: bool,
    /// Set once a spend event has been processed.
    pub spent: bool,
    /// The in-flight transaction currently holding this state, if any.
    pub locked_by: Option<Uuid>,
}

impl State {
    /// Computes the content-addressed ID for a state payload.
    pub fn compute_id(schema_id: &Bytes32, data_json: &str) -> Bytes32 {
        let mut preimage = Vec::with_capacity(32 + data_json.len());
        preimage.extend_from_slice(schema_id.as_bytes());
        preimage.extend_from_slice(data_json.as_bytes());
        Bytes32::keccak(&preimage)
    }

    /// Reference form of this state.
    pub fn to_ref(&self) -> StateRef {
        StateRef {
            id: self.id,
            schema_id: self.schema_id,
        }
    }

    /// Available = confirmed-or-provisional, unspent, and not locked by a
    /// different transaction.
    pub fn available_to(&self, tx_id: Option<Uuid>) -> bool {
        !self.spent
            && match (self.locked_by, tx_id) {
                (None, _) => true,
                (Some(owner), Some(requester)) => owner == requester,
                (Some(_), None) => false,
            }
    }
}

/// A state transition reported by a domain's event-batch handler:
/// either a state confirmed or spent by a given confirming transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct StateUpdate {
    /// The state being confirmed or spent.
    pub id: Bytes32,
    /// The on-ledger transaction responsible for the transition.
    pub transaction_id: Uuid,
}
