//! # In-Memory State Store
//!
//! Backs the unified test suite and embedded single-process deployments.
//! All contracts share one schema registry; per-contract records live in
//! their own `ContractStates`.

use crate::domain::errors::StateStoreError;
use crate::domain::query::QueryJson;
use crate::domain::store::ContractStates;
use crate::ports::StateStore;
use async_trait::async_trait;
use shared_types::{
    now_millis, Bytes32, EthAddress, NewState, State, StateSchema, StateUpdate,
};
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// In-memory implementation of the state-store port.
#[derive(Default)]
pub struct InMemoryStateStore {
    schemas: RwLock<HashMap<Bytes32, StateSchema>>,
    contracts: RwLock<HashMap<EthAddress, ContractStates>>,
}

impl InMemoryStateStore {
    /// Creates an empty store.
    pub fn new() -> Self {
        Self::default()
    }
}

#[async_trait]
impl StateStore for InMemoryStateStore {
    async fn ensure_schemas(
        &self,
        schemas_json: &[String],
    ) -> Result<Vec<StateSchema>, StateStoreError> {
        let mut parsed = Vec::with_capacity(schemas_json.len());
        for schema_json in schemas_json {
            let schema = StateSchema::parse(schema_json)
                .map_err(|e| StateStoreError::Schema(e.message().to_string()))?;
            parsed.push(schema);
        }
        let mut schemas = self.schemas.write().await;
        for schema in &parsed {
            schemas.entry(schema.id()).or_insert_with(|| schema.clone());
            debug!(schema_id = %schema.id(), signature = %schema.signature(), "Schema registered");
        }
        Ok(parsed)
    }

    async fn get_schema(&self, schema_id: &Bytes32) -> Result<StateSchema, StateStoreError> {
        self.schemas
            .read()
            .await
            .get(schema_id)
            .cloned()
            .ok_or(StateStoreError::UnknownSchema(*schema_id))
    }

    async fn find_available_states(
        &self,
        contract: EthAddress,
        schema_id: &Bytes32,
        query_json: &str,
        for_tx: Option<Uuid>,
    ) -> Result<Vec<State>, StateStoreError> {
        let schema = self.get_schema(schema_id).await?;
        let query = QueryJson::parse(query_json)?;
        let contracts = self.contracts.read().await;
        match contracts.get(&contract) {
            Some(states) => states.find_available(&schema, schema_id, &query, for_tx),
            None => Ok(Vec::new()),
        }
    }

    async fn get_states(
        &self,
        contract: EthAddress,
        ids: &[Bytes32],
    ) -> Result<Vec<State>, StateStoreError> {
        let contracts = self.contracts.read().await;
        let states = contracts
            .get(&contract)
            .ok_or_else(|| StateStoreError::NotFound(ids.first().copied().unwrap_or_default()))?;
        ids.iter()
            .map(|id| {
                states
                    .get(id)
                    .map(|s| s.state.clone())
                    .ok_or(StateStoreError::NotFound(*id))
            })
            .collect()
    }

    async fn upsert_states(
        &self,
        for_tx: Option<Uuid>,
        contract: EthAddress,
        new_states: &[NewState],
    ) -> Result<Vec<State>, StateStoreError> {
        // Resolve schemas and extract labels before taking the write lock
        let mut prepared = Vec::with_capacity(new_states.len());
        for new_state in new_states {
            let schema = self.get_schema(&new_state.schema_id).await?;
            let labels = schema
                .extract_labels(&new_state.data_json)
                .map_err(|e| StateStoreError::Schema(e.message().to_string()))?;
            let state = State {
                id: State::compute_id(&new_state.schema_id, &new_state.data_json),
                schema_id: new_state.schema_id,
                contract_address: contract,
                data_json: new_state.data_json.clone(),
                created: now_millis(),
                confirmed: false,
                spent: false,
                locked_by: for_tx,
            };
            prepared.push((state, labels));
        }

        let mut contracts = self.contracts.write().await;
        let states = contracts.entry(contract).or_default();
        let mut results = Vec::with_capacity(prepared.len());
        for (state, labels) in prepared {
            let id = state.id;
            if !states.upsert(state, labels) {
                debug!(state_id = %id, "Duplicate upsert ignored");
            }
            // Return the stored record so duplicates reflect original timestamps
            results.push(
                states
                    .get(&id)
                    .map(|s| s.state.clone())
                    .ok_or(StateStoreError::NotFound(id))?,
            );
        }
        Ok(results)
    }

    async fn lock_states(
        &self,
        contract: EthAddress,
        tx_id: Uuid,
        ids: &[Bytes32],
    ) -> Result<(), StateStoreError> {
        let mut contracts = self.contracts.write().await;
        let states = contracts
            .get_mut(&contract)
            .ok_or_else(|| StateStoreError::NotFound(ids.first().copied().unwrap_or_default()))?;
        states.lock(tx_id, ids)
    }

    async fn release_states(
        &self,
        contract: EthAddress,
        tx_id: Uuid,
        ids: &[Bytes32],
    ) -> Result<usize, StateStoreError> {
        let mut contracts = self.contracts.write().await;
        Ok(contracts
            .get_mut(&contract)
            .map(|states| states.release(tx_id, ids))
            .unwrap_or(0))
    }

    async fn mark_confirmed(
        &self,
        contract: EthAddress,
        updates: &[StateUpdate],
    ) -> Result<(), StateStoreError> {
        let mut contracts = self.contracts.write().await;
        let states = contracts.entry(contract).or_default();
        for update in updates {
            states.mark_confirmed(update)?;
        }
        Ok(())
    }

    async fn mark_spent(
        &self,
        contract: EthAddress,
        updates: &[StateUpdate],
    ) -> Result<(), StateStoreError> {
        let mut contracts = self.contracts.write().await;
        let states = contracts.entry(contract).or_default();
        for update in updates {
            states.mark_spent(update)?;
        }
        Ok(())
    }
}
