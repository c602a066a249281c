//! Ports for the state-store component.
//!
//! The `StateStore` trait is the seam the rest of the core depends on;
//! `DomainContext` binds it to one contract and one in-flight transaction
//! for the duration of an orchestrator stage.

pub mod receipts;

use crate::domain::errors::StateStoreError;
use async_trait::async_trait;
use shared_types::{Bytes32, EthAddress, NewState, State, StateSchema, StateUpdate};
use std::sync::Arc;
use uuid::Uuid;

/// The state-store seam.
///
/// Implementations must make `upsert_states` idempotent on content-addressed
/// IDs and must never return spent states or foreign-locked states from
/// `find_available_states`.
#[async_trait]
pub trait StateStore: Send + Sync {
    /// Parses and registers a domain's schemas, returning them with IDs
    /// assigned. Called once per domain at init; re-registration of an
    /// identical schema is a no-op.
    async fn ensure_schemas(
        &self,
        schemas_json: &[String],
    ) -> Result<Vec<StateSchema>, StateStoreError>;

    /// Looks up a registered schema.
    async fn get_schema(&self, schema_id: &Bytes32) -> Result<StateSchema, StateStoreError>;

    /// Evaluates a query over one contract's available states.
    ///
    /// `for_tx` identifies the in-flight transaction on whose behalf the
    /// query runs; that transaction's own locks count as available.
    async fn find_available_states(
        &self,
        contract: EthAddress,
        schema_id: &Bytes32,
        query_json: &str,
        for_tx: Option<Uuid>,
    ) -> Result<Vec<State>, StateStoreError>;

    /// Fetches states by ID, regardless of lock or spent status.
    async fn get_states(
        &self,
        contract: EthAddress,
        ids: &[Bytes32],
    ) -> Result<Vec<State>, StateStoreError>;

    /// Stores newly assembled states, assigning content-addressed IDs.
    /// When `for_tx` is set the new states are locked to that transaction.
    async fn upsert_states(
        &self,
        for_tx: Option<Uuid>,
        contract: EthAddress,
        new_states: &[NewState],
    ) -> Result<Vec<State>, StateStoreError>;

    /// Locks existing states (spend inputs) to an in-flight transaction.
    async fn lock_states(
        &self,
        contract: EthAddress,
        tx_id: Uuid,
        ids: &[Bytes32],
    ) -> Result<(), StateStoreError>;

    /// Releases the given states if held by the transaction; returns how
    /// many were released.
    async fn release_states(
        &self,
        contract: EthAddress,
        tx_id: Uuid,
        ids: &[Bytes32],
    ) -> Result<usize, StateStoreError>;

    /// Applies confirmed-state transitions from an event batch.
    async fn mark_confirmed(
        &self,
        contract: EthAddress,
        updates: &[StateUpdate],
    ) -> Result<(), StateStoreError>;

    /// Applies spent-state transitions from an event batch.
    async fn mark_spent(
        &self,
        contract: EthAddress,
        updates: &[StateUpdate],
    ) -> Result<(), StateStoreError>;
}

/// A contract- and transaction-scoped handle over the state store, held by
/// an orchestrator stage while it runs.
#[derive(Clone)]
pub struct DomainContext {
    store: Arc<dyn StateStore>,
    contract: EthAddress,
    tx_id: Option<Uuid>,
}

impl DomainContext {
    /// Binds the store to a contract and an optional in-flight transaction.
    pub fn new(store: Arc<dyn StateStore>, contract: EthAddress, tx_id: Option<Uuid>) -> Self {
        Self {
            store,
            contract,
            tx_id,
        }
    }

    /// The contract this context is bound to.
    pub fn contract(&self) -> EthAddress {
        self.contract
    }

    /// Queries available states under this context's visibility rules.
    pub async fn find_available_states(
        &self,
        schema_id: &Bytes32,
        query_json: &str,
    ) -> Result<Vec<State>, StateStoreError> {
        self.store
            .find_available_states(self.contract, schema_id, query_json, self.tx_id)
            .await
    }

    /// Stores assembled output states, locked to the bound transaction.
    pub async fn upsert_states(
        &self,
        new_states: &[NewState],
    ) -> Result<Vec<State>, StateStoreError> {
        self.store
            .upsert_states(self.tx_id, self.contract, new_states)
            .await
    }

    /// Locks spend inputs to the bound transaction.
    pub async fn lock_states(&self, ids: &[Bytes32]) -> Result<(), StateStoreError> {
        match self.tx_id {
            Some(tx_id) => self.store.lock_states(self.contract, tx_id, ids).await,
            None => Ok(()),
        }
    }
}
