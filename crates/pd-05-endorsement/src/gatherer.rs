//! # Gatherer
//!
//! One gatherer per contract instance, owned by the engine alongside that
//! contract's orchestrator.

use crate::errors::EndorsementError;
use crate::wire::{party_identity, party_node, EndorsementRequestMessage, EndorsementResponseMessage};
use pd_02_domain_registry::{
    ContractInstance, EndorsableState, EndorseResult, EndorseTransactionRequest, TransactionSpec,
};
use pd_03_identity::IdentityResolver;
use pd_04_transport::TransportRouter;
use shared_types::{
    message_types, AttestationRequest, AttestationResult, AttestationType, EthAddress,
    ResolvedVerifier, TransportMessage,
};
use std::collections::HashSet;
use std::sync::{Arc, Mutex};
use tracing::{debug, warn};
use uuid::Uuid;

/// Outcome of gathering one `(plan entry, party)` pair.
#[derive(Clone, Debug)]
pub enum GatherOutcome {
    /// The attestation was produced in-process.
    Attested {
        /// The result to attach to the transaction.
        result: AttestationResult,
        /// Submission signer, when the endorser carries submit authority.
        signer: Option<String>,
    },
    /// The party rejected the transaction; terminal with reason.
    Reverted {
        /// Domain-supplied reason.
        reason: String,
    },
    /// A cross-node request is in flight; the response arrives as an event.
    Pending,
}

/// The resolution of a pending cross-node request, handed to the owning
/// orchestrator as a `TransactionEndorsed` event payload.
#[derive(Clone, Debug)]
pub struct EndorsementUpdate {
    /// The transaction attested.
    pub transaction_id: Uuid,
    /// Plan entry name.
    pub attestation_name: String,
    /// The attesting party.
    pub party: String,
    /// The attestation, when approved.
    pub endorsement: Option<AttestationResult>,
    /// Revert reason, when rejected.
    pub revert_reason: Option<String>,
    /// Submission signer, for endorser-submission domains.
    pub signer: Option<String>,
}

type PendingKey = (Uuid, String, String);

/// Per-contract endorsement gatherer.
pub struct EndorsementGatherer {
    contract: EthAddress,
    instance: ContractInstance,
    resolver: Arc<IdentityResolver>,
    router: Arc<TransportRouter>,
    /// Inbound component requests are addressed to on the remote node.
    component: String,
    pending: Mutex<HashSet<PendingKey>>,
}

impl EndorsementGatherer {
    /// Creates a gatherer for one contract instance.
    pub fn new(
        instance: ContractInstance,
        resolver: Arc<IdentityResolver>,
        router: Arc<TransportRouter>,
        component: impl Into<String>,
    ) -> Self {
        Self {
            contract: instance.address,
            instance,
            resolver,
            router,
            component: component.into(),
            pending: Mutex::new(HashSet::new()),
        }
    }

    /// The contract this gatherer serves.
    pub fn contract(&self) -> EthAddress {
        self.contract
    }

    /// Number of cross-node requests awaiting replies.
    pub fn pending_count(&self) -> usize {
        self.pending.lock().map(|p| p.len()).unwrap_or(0)
    }

    /// Satisfies one `(plan entry, party)` pair, locally or remotely.
    #[allow(clippy::too_many_arguments)]
    pub async fn gather(
        &self,
        spec: &TransactionSpec,
        verifiers: &[ResolvedVerifier],
        signatures: &[AttestationResult],
        inputs: &[EndorsableState],
        outputs: &[EndorsableState],
        party: &str,
        request: &AttestationRequest,
    ) -> Result<GatherOutcome, EndorsementError> {
        match party_node(party) {
            Some(node) if node != self.router.local_node() => {
                self.gather_remote(
                    spec, verifiers, signatures, inputs, outputs, party, request, node,
                )
                .await
            }
            _ => {
                self.gather_local(spec, verifiers, signatures, inputs, outputs, party, request)
                    .await
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn gather_local(
        &self,
        spec: &TransactionSpec,
        verifiers: &[ResolvedVerifier],
        signatures: &[AttestationResult],
        inputs: &[EndorsableState],
        outputs: &[EndorsableState],
        party: &str,
        request: &AttestationRequest,
    ) -> Result<GatherOutcome, EndorsementError> {
        let identity = party_identity(party);
        let verifier = self
            .resolver
            .resolve(identity, &request.algorithm, &request.verifier_type)
            .await?;
        // Results carry the party exactly as the plan names it
        let verifier = ResolvedVerifier {
            lookup: party.to_string(),
            ..verifier
        };

        match request.attestation_type {
            AttestationType::Sign => {
                let signature = self
                    .resolver
                    .key_manager()
                    .sign(identity, &request.algorithm, &request.payload)
                    .await?;
                debug!(
                    transaction = %spec.transaction_id,
                    attestation = %request.name,
                    party,
                    "Local signature gathered"
                );
                Ok(GatherOutcome::Attested {
                    result: AttestationResult {
                        name: request.name.clone(),
                        attestation_type: AttestationType::Sign,
                        verifier,
                        payload: signature,
                    },
                    signer: None,
                })
            }
            AttestationType::Endorse => {
                let response = self
                    .instance
                    .domain
                    .plugin
                    .endorse_transaction(EndorseTransactionRequest {
                        transaction: spec.clone(),
                        resolved_verifiers: verifiers.to_vec(),
                        inputs: inputs.to_vec(),
                        outputs: outputs.to_vec(),
                        signatures: signatures.to_vec(),
                        endorsement_request: request.clone(),
                        endorsement_verifier: verifier.clone(),
                    })
                    .await
                    .map_err(EndorsementError::Domain)?;

                match response.result {
                    EndorseResult::EndorserSubmit => {
                        debug!(
                            transaction = %spec.transaction_id,
                            attestation = %request.name,
                            party,
                            "Local endorsement gathered"
                        );
                        Ok(GatherOutcome::Attested {
                            result: AttestationResult {
                                name: request.name.clone(),
                                attestation_type: AttestationType::Endorse,
                                verifier,
                                payload: response.payload,
                            },
                            signer: response.signer,
                        })
                    }
                    EndorseResult::Revert => Ok(GatherOutcome::Reverted {
                        reason: response
                            .revert_reason
                            .unwrap_or_else(|| "endorsement rejected".to_string()),
                    }),
                }
            }
        }
    }

    #[allow(clippy::too_many_arguments)]
    async fn gather_remote(
        &self,
        spec: &TransactionSpec,
        verifiers: &[ResolvedVerifier],
        signatures: &[AttestationResult],
        inputs: &[EndorsableState],
        outputs: &[EndorsableState],
        party: &str,
        request: &AttestationRequest,
        node: &str,
    ) -> Result<GatherOutcome, EndorsementError> {
        let key = (
            spec.transaction_id,
            request.name.clone(),
            party.to_string(),
        );
        if let Ok(mut pending) = self.pending.lock() {
            pending.insert(key.clone());
        }

        let payload = EndorsementRequestMessage {
            contract_address: self.contract,
            transaction_id: spec.transaction_id,
            transaction: spec.clone(),
            resolved_verifiers: verifiers.to_vec(),
            signatures: signatures.to_vec(),
            input_states: inputs.to_vec(),
            output_states: outputs.to_vec(),
            party: party.to_string(),
            attestation_request: request.clone(),
        }
        .encode()?;

        let message = TransportMessage::request(
            node,
            self.router.local_node(),
            self.component.clone(),
            message_types::ENDORSEMENT_REQUEST,
            payload,
        );

        if let Err(e) = self.router.send(message).await {
            // Drop the pending entry so a stage retry re-registers cleanly
            if let Ok(mut pending) = self.pending.lock() {
                pending.remove(&key);
            }
            return Err(e.into());
        }

        debug!(
            transaction = %spec.transaction_id,
            attestation = %request.name,
            party,
            node,
            "Endorsement request sent"
        );
        Ok(GatherOutcome::Pending)
    }

    /// Resolves a pending entry from an inbound response.
    ///
    /// Returns `None` when no entry exists - a duplicate or stale response -
    /// in which case the message is dropped without effect.
    pub fn handle_response(
        &self,
        response: EndorsementResponseMessage,
    ) -> Option<EndorsementUpdate> {
        let key = (
            response.transaction_id,
            response.attestation_name.clone(),
            response.party.clone(),
        );
        let removed = self
            .pending
            .lock()
            .map(|mut pending| pending.remove(&key))
            .unwrap_or(false);
        if !removed {
            debug!(
                transaction = %response.transaction_id,
                attestation = %response.attestation_name,
                party = %response.party,
                "Duplicate or stale endorsement response dropped"
            );
            return None;
        }

        Some(EndorsementUpdate {
            transaction_id: response.transaction_id,
            attestation_name: response.attestation_name,
            party: response.party,
            endorsement: response.endorsement,
            revert_reason: response.revert_reason,
            signer: response.signer,
        })
    }

    /// Abandons a pending entry after an attestation timeout, so the stage
    /// retry can re-issue the request.
    pub fn abandon(&self, transaction_id: Uuid, attestation_name: &str, party: &str) -> bool {
        let key = (
            transaction_id,
            attestation_name.to_string(),
            party.to_string(),
        );
        let removed = self
            .pending
            .lock()
            .map(|mut pending| pending.remove(&key))
            .unwrap_or(false);
        if removed {
            warn!(
                transaction = %transaction_id,
                attestation = %attestation_name,
                party,
                "Pending endorsement abandoned after timeout"
            );
        }
        removed
    }

    /// Evaluates an inbound cross-node request on the endorsing node and
    /// builds the response message.
    pub async fn evaluate_inbound_request(
        &self,
        request: EndorsementRequestMessage,
    ) -> Result<EndorsementResponseMessage, EndorsementError> {
        let outcome = self
            .gather_local(
                &request.transaction,
                &request.resolved_verifiers,
                &request.signatures,
                &request.input_states,
                &request.output_states,
                &request.party,
                &request.attestation_request,
            )
            .await?;

        let (endorsement, revert_reason, signer) = match outcome {
            GatherOutcome::Attested { result, signer } => (Some(result), None, signer),
            GatherOutcome::Reverted { reason } => (None, Some(reason), None),
            GatherOutcome::Pending => {
                return Err(EndorsementError::Domain(
                    "inbound endorsement evaluated to a remote party".to_string(),
                ))
            }
        };

        Ok(EndorsementResponseMessage {
            contract_address: request.contract_address,
            transaction_id: request.transaction_id,
            attestation_name: request.attestation_request.name,
            party: request.party,
            endorsement,
            revert_reason,
            signer,
        })
    }
}
