//! # Private Transactions
//!
//! `PrivateTransaction` is the unit of work driven through the orchestrator
//! state machine. Each lifecycle stage attaches its own payload struct:
//!
//! | Stage | Payload |
//! |-------|---------|
//! | Intake | `TransactionInputs` (domain, contract, function, params, from) |
//! | Pre-assembly | `PreAssembly` (required + resolved verifiers) |
//! | Assembly | `PostAssembly` (input refs, outputs, attestation plan/results) |
//! | Dispatch | `Dispatch` (base-ledger call + signer) |
//! | Completion | `Completion` (on-chain location) |
//!
//! `PrivateContractDeploy` is the deploy-time counterpart handled
//! synchronously by the engine rather than through the orchestrator.

use crate::attestations::{AttestationRequest, AttestationResult, ResolvedVerifier, VerifierRequest};
use crate::ids::EthAddress;
use crate::receipts::OnChainLocation;
use crate::states::{NewState, State, StateRef};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// User-supplied inputs of a private transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct TransactionInputs {
    /// Domain name, e.g. `simple`.
    pub domain: String,
    /// Target contract instance address.
    pub to: Option<EthAddress>,
    /// Function ABI entry JSON.
    pub function_abi_json: String,
    /// Function parameters JSON (opaque to the core).
    pub params_json: String,
    /// Sender identity lookup.
    pub from: String,
}

/// Verifier requirements declared by the domain, and their resolutions.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PreAssembly {
    /// Verifiers the domain needs before assembly.
    pub required_verifiers: Vec<VerifierRequest>,
    /// Resolutions, index-aligned with `required_verifiers`.
    pub verifiers: Vec<ResolvedVerifier>,
}

/// The assembled UTXO state transition plus its attestation plan.
#[derive(Clone, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct PostAssembly {
    /// States consumed by this transaction.
    pub input_states: Vec<StateRef>,
    /// States produced, as returned by the domain (pre-upsert).
    pub output_states_potential: Vec<NewState>,
    /// States produced, with content-addressed IDs assigned at upsert.
    pub output_states: Vec<State>,
    /// Attestations that must be satisfied before dispatch.
    pub attestation_plan: Vec<AttestationRequest>,
    /// Results gathered so far, in arrival order.
    pub attestation_results: Vec<AttestationResult>,
}

impl PostAssembly {
    /// True when every `(name, party)` pair of the plan has exactly one
    /// matching result.
    pub fn attestation_complete(&self) -> bool {
        self.attestation_plan.iter().all(|request| {
            request.parties.iter().all(|party| {
                self.attestation_results
                    .iter()
                    .filter(|r| r.satisfies(request, party))
                    .count()
                    == 1
            })
        })
    }

    /// Plan entries (request, party) not yet satisfied by any result.
    pub fn outstanding_attestations(&self) -> Vec<(&AttestationRequest, &str)> {
        let mut outstanding = Vec::new();
        for request in &self.attestation_plan {
            for party in &request.parties {
                let satisfied = self
                    .attestation_results
                    .iter()
                    .any(|r| r.satisfies(request, party));
                if !satisfied {
                    outstanding.push((request, party.as_str()));
                }
            }
        }
        outstanding
    }
}

/// The prepared base-ledger submission for an endorsed transaction.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Dispatch {
    /// Base-ledger function call produced by the domain.
    pub transaction: BaseLedgerTransaction,
    /// Key lookup used to sign the base-ledger submission.
    pub signer: String,
}

/// On-chain completion details, written when the confirmation event arrives.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Completion {
    /// Where the confirming event landed on the base ledger.
    pub location: OnChainLocation,
}

/// A function invocation against the base ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct BaseLedgerTransaction {
    /// Function ABI entry JSON.
    pub function_abi_json: String,
    /// Target contract; `None` for factory calls resolved by the submitter.
    pub to: Option<EthAddress>,
    /// Call parameters JSON.
    pub params_json: String,
}

/// A contract-creation transaction against the base ledger.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct EthDeployTransaction {
    /// Constructor ABI entry JSON.
    pub constructor_abi_json: String,
    /// Contract creation bytecode.
    pub bytecode: Vec<u8>,
    /// Constructor parameters JSON.
    pub params_json: String,
}

/// One private transaction, created at submission and destroyed only after
/// event-confirmed completion has been persisted.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateTransaction {
    /// Transaction identity.
    pub id: Uuid,
    /// User-supplied inputs.
    pub inputs: TransactionInputs,
    /// Set by the domain's init + the identity resolver.
    pub pre_assembly: Option<PreAssembly>,
    /// Set by assembly; mutated as attestations arrive.
    pub post_assembly: Option<PostAssembly>,
    /// Set when the domain has prepared the base-ledger call.
    pub dispatch: Option<Dispatch>,
    /// Set when the confirmation event has been reconciled.
    pub completion: Option<Completion>,
}

impl PrivateTransaction {
    /// Creates a fresh transaction for the given inputs.
    pub fn new(inputs: TransactionInputs) -> Self {
        Self {
            id: Uuid::new_v4(),
            inputs,
            pre_assembly: None,
            post_assembly: None,
            dispatch: None,
            completion: None,
        }
    }

    /// Contract address this transaction runs against.
    pub fn contract_address(&self) -> Option<EthAddress> {
        self.inputs.to
    }
}

/// A private contract deployment, handled synchronously by the engine.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct PrivateContractDeploy {
    /// Deployment identity (also used to correlate the factory event).
    pub id: Uuid,
    /// Domain name.
    pub domain: String,
    /// Constructor parameters JSON.
    pub constructor_params_json: String,
    /// Verifiers the domain requires for deploy preparation.
    pub required_verifiers: Vec<VerifierRequest>,
    /// Resolutions, index-aligned with `required_verifiers`.
    pub verifiers: Vec<ResolvedVerifier>,
    /// Exactly one of `deploy_transaction` / `invoke_transaction` is set
    /// after `prepare_deploy`.
    pub deploy_transaction: Option<EthDeployTransaction>,
    /// Factory-style `newInstance` invocation.
    pub invoke_transaction: Option<BaseLedgerTransaction>,
    /// Key lookup used to sign the base-ledger submission.
    pub signer: Option<String>,
}

impl PrivateContractDeploy {
    /// Creates a fresh deploy request.
    pub fn new(domain: impl Into<String>, constructor_params_json: impl Into<String>) -> Self {
        Self {
            id: Uuid::new_v4(),
            domain: domain.into(),
            constructor_params_json: constructor_params_json.into(),
            required_verifiers: Vec::new(),
            verifiers: Vec::new(),
            deploy_transaction: None,
            invoke_transaction: None,
            signer: None,
        }
    }
}
