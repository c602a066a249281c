//! # Endorsement Wire Messages
//!
//! Canonical payloads for the `EndorsementRequest` / `EndorsementResponse`
//! message types, bincode-encoded into the transport envelope.

use crate::errors::EndorsementError;
use pd_02_domain_registry::{EndorsableState, TransactionSpec};
use serde::{Deserialize, Serialize};
use shared_types::{
    AttestationRequest, AttestationResult, EthAddress, ResolvedVerifier,
};
use uuid::Uuid;

/// A cross-node request for one party to attest one plan entry.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndorsementRequestMessage {
    /// Contract the transaction runs against.
    pub contract_address: EthAddress,
    /// The transaction being attested.
    pub transaction_id: Uuid,
    /// Transaction view for the remote domain instance.
    pub transaction: TransactionSpec,
    /// Verifiers resolved for the transaction.
    pub resolved_verifiers: Vec<ResolvedVerifier>,
    /// Attestation results gathered so far (e.g. sender signatures).
    pub signatures: Vec<AttestationResult>,
    /// Full payloads of consumed states.
    pub input_states: Vec<EndorsableState>,
    /// Full payloads of produced states.
    pub output_states: Vec<EndorsableState>,
    /// The party asked to attest.
    pub party: String,
    /// The plan entry being satisfied.
    pub attestation_request: AttestationRequest,
}

/// The reply to an [`EndorsementRequestMessage`].
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndorsementResponseMessage {
    /// Contract the transaction runs against.
    pub contract_address: EthAddress,
    /// The transaction attested.
    pub transaction_id: Uuid,
    /// Plan entry name, for pending-reply correlation.
    pub attestation_name: String,
    /// The attesting party, for pending-reply correlation.
    pub party: String,
    /// The attestation, when the party approved.
    pub endorsement: Option<AttestationResult>,
    /// Revert reason, when the party rejected.
    pub revert_reason: Option<String>,
    /// Submission signer, for endorser-submission domains.
    pub signer: Option<String>,
}

impl EndorsementRequestMessage {
    /// Encodes into the envelope payload form.
    pub fn encode(&self) -> Result<Vec<u8>, EndorsementError> {
        bincode::serialize(self).map_err(|e| EndorsementError::Codec(e.to_string()))
    }

    /// Decodes from an envelope payload.
    pub fn decode(payload: &[u8]) -> Result<Self, EndorsementError> {
        bincode::deserialize(payload).map_err(|e| EndorsementError::Codec(e.to_string()))
    }
}

impl EndorsementResponseMessage {
    /// Encodes into the envelope payload form.
    pub fn encode(&self) -> Result<Vec<u8>, EndorsementError> {
        bincode::serialize(self).map_err(|e| EndorsementError::Codec(e.to_string()))
    }

    /// Decodes from an envelope payload.
    pub fn decode(payload: &[u8]) -> Result<Self, EndorsementError> {
        bincode::deserialize(payload).map_err(|e| EndorsementError::Codec(e.to_string()))
    }
}

/// Splits a qualified party lookup `identity@node` into its node part.
///
/// An unqualified lookup has no node and is evaluated wherever the key
/// manager owns it.
pub fn party_node(party: &str) -> Option<&str> {
    party
        .rsplit_once('@')
        .map(|(_, node)| node)
        .filter(|node| !node.is_empty())
}

/// Strips the node qualifier from a party lookup.
pub fn party_identity(party: &str) -> &str {
    party.rsplit_once('@').map(|(identity, _)| identity).unwrap_or(party)
}
