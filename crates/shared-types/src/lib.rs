//! # Shared Types - Core Data Model
//!
//! Defines the entities that flow between the orchestration-core crates.
//!
//! ## Clusters
//!
//! - **Identifiers**: `Bytes32`, `EthAddress`, timestamps
//! - **Private Transactions**: `PrivateTransaction`, `PrivateContractDeploy`,
//!   per-stage lifecycle payloads
//! - **States**: `State`, `StateRef`, `NewState`, `StateSchema`
//! - **Attestations**: `AttestationRequest`, `AttestationResult`,
//!   `ResolvedVerifier`
//! - **Wire**: `TransportMessage` envelope for node-to-node carriage
//! - **Receipts**: terminal transaction outcomes persisted to the receipt
//!   store
//!
//! All types are plain serde data; behavior lives in the component crates.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod attestations;
pub mod envelope;
pub mod errors;
pub mod ids;
pub mod receipts;
pub mod schema;
pub mod states;
pub mod transaction;

pub use attestations::{
    algorithms, verifier_types, AttestationRequest, AttestationResult, AttestationType,
    ResolvedVerifier, VerifierRequest,
};
pub use envelope::{message_types, TransportMessage};
pub use errors::{ErrorKind, PtocError};
pub use ids::{now_millis, Bytes32, EthAddress, UtcMillis};
pub use receipts::{CompletedTransaction, OnChainLocation, Receipt, ReceiptOutcome};
pub use schema::{LabelType, LabelValue, SchemaField, StateSchema};
pub use states::{NewState, State, StateRef, StateUpdate};
pub use transaction::{
    BaseLedgerTransaction, Completion, Dispatch, EthDeployTransaction, PostAssembly, PreAssembly,
    PrivateContractDeploy, PrivateTransaction, TransactionInputs,
};
