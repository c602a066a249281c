//! # Domain Plugin Interface
//!
//! The capability set a domain implements, modeled as named request/response
//! pairs behind one async trait. The core treats plugins as untrusted: every
//! response is validated before it mutates transaction state, and plugin
//! state lives entirely on the plugin's side of the seam.

use async_trait::async_trait;
use pd_01_state_store::DomainContext;
use serde::{Deserialize, Serialize};
use shared_types::{
    AttestationRequest, AttestationResult, BaseLedgerTransaction, Bytes32, CompletedTransaction,
    EthAddress, EthDeployTransaction, NewState, OnChainLocation, ResolvedVerifier, StateRef,
    StateUpdate, VerifierRequest,
};
use uuid::Uuid;

/// How prepared transactions reach the base ledger for this domain.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum SubmitMode {
    /// Each submission uses a fresh one-time key derived under a prefix.
    OneTimeUseKeys {
        /// Lookup prefix for synthesized signers, e.g. `one-time-keys/`.
        prefix: String,
    },
    /// The endorsing party supplies the submission signer.
    EndorserSubmission,
}

/// Domain configuration returned by `configure_domain`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DomainConfig {
    /// ABI-tuple schema JSON for each state type the domain stores.
    pub abi_state_schemas_json: Vec<String>,
    /// ABI JSON of the base-ledger events the domain consumes.
    pub abi_events_json: String,
    /// Base-ledger submission mode.
    pub submit_mode: SubmitMode,
}

/// Request for `configure_domain`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigureDomainRequest {
    /// Registered domain name.
    pub name: String,
    /// Host-supplied domain configuration JSON.
    pub config_json: String,
    /// Base-ledger chain ID.
    pub chain_id: u64,
}

/// Response from `configure_domain`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ConfigureDomainResponse {
    /// The domain's configuration.
    pub domain_config: DomainConfig,
}

/// A registered schema echoed back to the domain at init.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct SchemaInfo {
    /// Content-addressed schema ID.
    pub id: Bytes32,
    /// Canonical signature string.
    pub signature: String,
}

/// Request for `init_domain`: the schema IDs assigned by the state store.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitDomainRequest {
    /// Registered schemas, in the order they were declared.
    pub abi_state_schemas: Vec<SchemaInfo>,
}

/// The deploy-time view of a transaction handed to the plugin.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct DeploySpec {
    /// Deployment transaction ID.
    pub transaction_id: Uuid,
    /// Constructor parameters JSON.
    pub constructor_params_json: String,
}

/// Request for `init_deploy`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitDeployRequest {
    /// The deployment being initialized.
    pub transaction: DeploySpec,
}

/// Response from `init_deploy`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitDeployResponse {
    /// Verifiers that must be resolved before `prepare_deploy`.
    pub required_verifiers: Vec<VerifierRequest>,
}

/// Request for `prepare_deploy`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareDeployRequest {
    /// The deployment being prepared.
    pub transaction: DeploySpec,
    /// Resolutions for the verifiers requested at init.
    pub resolved_verifiers: Vec<ResolvedVerifier>,
}

/// Response from `prepare_deploy`: exactly one of `deploy` / `transaction`.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct PrepareDeployResponse {
    /// Constructor deployment of a new base-ledger contract.
    pub deploy: Option<EthDeployTransaction>,
    /// Factory-style `newInstance` invocation.
    pub transaction: Option<BaseLedgerTransaction>,
    /// Submission signer; synthesized by the registry when absent under
    /// one-time-use-keys mode.
    pub signer: Option<String>,
}

/// The per-transaction view handed to the plugin for invoke operations.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct TransactionSpec {
    /// Private transaction ID.
    pub transaction_id: Uuid,
    /// Contract instance address.
    pub contract_address: EthAddress,
    /// Instance configuration JSON captured at deploy registration.
    pub contract_config_json: String,
    /// Function ABI entry JSON.
    pub function_abi_json: String,
    /// Function parameters JSON.
    pub function_params_json: String,
    /// Sender identity lookup.
    pub from: String,
}

/// Request for `init_transaction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitTransactionRequest {
    /// The transaction being initialized.
    pub transaction: TransactionSpec,
}

/// Response from `init_transaction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct InitTransactionResponse {
    /// Verifiers that must be resolved before assembly.
    pub required_verifiers: Vec<VerifierRequest>,
}

/// Request for `assemble_transaction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssembleTransactionRequest {
    /// The transaction being assembled.
    pub transaction: TransactionSpec,
    /// Resolutions for the verifiers requested at init.
    pub resolved_verifiers: Vec<ResolvedVerifier>,
}

/// The state transition produced by assembly.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct AssembledTransaction {
    /// States consumed.
    pub input_states: Vec<StateRef>,
    /// States produced (IDs assigned at upsert).
    pub output_states: Vec<NewState>,
}

/// Assembly outcome discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum AssemblyResult {
    /// Assembly succeeded; the attestation plan must be non-empty.
    Ok,
    /// The transaction cannot ever succeed; terminal with reason.
    Revert,
    /// Assembly cannot proceed yet (e.g. awaiting states); re-attempted on a
    /// sequencer wake-up.
    Park,
}

/// Response from `assemble_transaction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct AssembleTransactionResponse {
    /// Outcome discriminator.
    pub assembly_result: AssemblyResult,
    /// The assembled transition; required for `Ok`.
    pub assembled_transaction: Option<AssembledTransaction>,
    /// Attestations to gather; required non-empty for `Ok`.
    pub attestation_plan: Vec<AttestationRequest>,
    /// Reason for `Revert`.
    pub revert_reason: Option<String>,
}

/// A state with its full payload, as shipped to endorsers.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EndorsableState {
    /// Content-addressed state ID.
    pub id: Bytes32,
    /// Schema ID.
    pub schema_id: Bytes32,
    /// Raw state data JSON.
    pub data_json: String,
}

/// Request for `endorse_transaction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndorseTransactionRequest {
    /// The transaction being endorsed.
    pub transaction: TransactionSpec,
    /// Verifiers resolved for the transaction.
    pub resolved_verifiers: Vec<ResolvedVerifier>,
    /// Full payloads of the consumed states.
    pub inputs: Vec<EndorsableState>,
    /// Full payloads of the produced states.
    pub outputs: Vec<EndorsableState>,
    /// Attestation results gathered so far (e.g. the sender signature).
    pub signatures: Vec<AttestationResult>,
    /// The plan entry being evaluated.
    pub endorsement_request: AttestationRequest,
    /// The endorsing party's resolved verifier.
    pub endorsement_verifier: ResolvedVerifier,
}

/// Endorsement outcome discriminator.
#[derive(Clone, Copy, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum EndorseResult {
    /// Approved; under endorser-submission mode the endorser's key submits.
    EndorserSubmit,
    /// Rejected; the transaction is reverted with the reason.
    Revert,
}

/// Response from `endorse_transaction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct EndorseTransactionResponse {
    /// Outcome discriminator.
    pub result: EndorseResult,
    /// Attestation payload to attach (signature bytes where applicable).
    pub payload: Vec<u8>,
    /// Submission signer lookup, for endorser-submission domains.
    pub signer: Option<String>,
    /// Reason for `Revert`.
    pub revert_reason: Option<String>,
}

/// Request for `prepare_transaction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareTransactionRequest {
    /// The endorsed transaction.
    pub transaction: TransactionSpec,
    /// Full payloads of the consumed states.
    pub input_states: Vec<EndorsableState>,
    /// Full payloads of the produced states.
    pub output_states: Vec<EndorsableState>,
    /// The complete attestation results, plan order preserved.
    pub attestation_results: Vec<AttestationResult>,
}

/// Response from `prepare_transaction`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct PrepareTransactionResponse {
    /// The base-ledger call that anchors this transition.
    pub transaction: BaseLedgerTransaction,
}

/// One confirmed base-ledger event delivered to `handle_event_batch`.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct LedgerEvent {
    /// Solidity event signature, e.g. `UTXOTransfer(bytes32,bytes32[],bytes32[],bytes)`.
    pub solidity_signature: String,
    /// Decoded event data JSON.
    pub data_json: String,
    /// Hash of the base-ledger transaction that emitted the event.
    pub tx_hash: Bytes32,
    /// Where the event landed.
    pub location: OnChainLocation,
}

/// Request for `handle_event_batch`.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct HandleEventBatchRequest {
    /// Contract instance the batch belongs to.
    pub contract_address: EthAddress,
    /// Instance configuration JSON.
    pub contract_config_json: String,
    /// Confirmed events, ledger order preserved.
    pub events: Vec<LedgerEvent>,
}

/// Response from `handle_event_batch`; all four sets commit atomically.
#[derive(Clone, Debug, Default, Serialize, Deserialize)]
pub struct HandleEventBatchResponse {
    /// Private transactions completed by this batch.
    pub transactions_complete: Vec<CompletedTransaction>,
    /// Existing states consumed on-ledger.
    pub spent_states: Vec<StateUpdate>,
    /// Output states anchored on-ledger.
    pub confirmed_states: Vec<StateUpdate>,
    /// Auxiliary local states (e.g. merkle-tree nodes) to upsert.
    pub new_states: Vec<NewState>,
}

/// The domain plugin capability set.
///
/// Calls are synchronous request/response; the plugin is stateless from the
/// core's perspective. `assemble_transaction` receives a [`DomainContext`]
/// scoped to the transaction so coin selection observes in-flight locks.
#[async_trait]
pub trait DomainPlugin: Send + Sync {
    /// First contact: yields schemas, event ABI, and submit mode.
    async fn configure_domain(
        &self,
        req: ConfigureDomainRequest,
    ) -> Result<ConfigureDomainResponse, String>;

    /// Echoes registered schema IDs back to the domain.
    async fn init_domain(&self, req: InitDomainRequest) -> Result<(), String>;

    /// Declares the verifiers a deployment needs.
    async fn init_deploy(&self, req: InitDeployRequest) -> Result<InitDeployResponse, String>;

    /// Produces the base-ledger deploy or factory invoke.
    async fn prepare_deploy(
        &self,
        req: PrepareDeployRequest,
    ) -> Result<PrepareDeployResponse, String>;

    /// Declares the verifiers a transaction needs.
    async fn init_transaction(
        &self,
        req: InitTransactionRequest,
    ) -> Result<InitTransactionResponse, String>;

    /// Assembles the UTXO transition and attestation plan.
    async fn assemble_transaction(
        &self,
        req: AssembleTransactionRequest,
        states: &DomainContext,
    ) -> Result<AssembleTransactionResponse, String>;

    /// Evaluates an endorsement request against the assembled transition.
    async fn endorse_transaction(
        &self,
        req: EndorseTransactionRequest,
    ) -> Result<EndorseTransactionResponse, String>;

    /// Produces the base-ledger call for a fully attested transaction.
    async fn prepare_transaction(
        &self,
        req: PrepareTransactionRequest,
    ) -> Result<PrepareTransactionResponse, String>;

    /// Maps a confirmed event batch to completions and state transitions.
    async fn handle_event_batch(
        &self,
        req: HandleEventBatchRequest,
    ) -> Result<HandleEventBatchResponse, String>;
}
