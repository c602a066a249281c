//! # Reconciler
//!
//! Batch processing and the atomic-commit-with-retry loop.

use crate::errors::ReconcilerError;
use async_trait::async_trait;
use pd_01_state_store::{ReceiptStore, StateStore, StateStoreError};
use pd_02_domain_registry::{DomainRegistry, HandleEventBatchRequest, LedgerEvent};
use serde::{Deserialize, Serialize};
use shared_bus::{CoreEvent, EventPublisher};
use shared_types::{CompletedTransaction, EthAddress, OnChainLocation, Receipt};
use std::sync::Arc;
use std::time::Duration;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Upward seam to the engine: completed transactions are routed to the
/// owning orchestrator by contract address, never by back-pointer.
#[async_trait]
pub trait ConfirmationSink: Send + Sync {
    /// Notifies that a transaction confirmed at a location.
    async fn transaction_confirmed(
        &self,
        contract: EthAddress,
        transaction_id: Uuid,
        location: OnChainLocation,
    );
}

/// Reconciler configuration.
#[derive(Clone, Debug, Serialize, Deserialize)]
pub struct ReconcilerConfig {
    /// Whole-batch commit attempts before giving up.
    pub commit_attempts: u32,
    /// Delay between commit attempts.
    pub commit_backoff: Duration,
}

impl Default for ReconcilerConfig {
    fn default() -> Self {
        Self {
            commit_attempts: 3,
            commit_backoff: Duration::from_millis(50),
        }
    }
}

/// The event reconciler.
pub struct EventReconciler {
    config: ReconcilerConfig,
    domains: Arc<DomainRegistry>,
    state_store: Arc<dyn StateStore>,
    receipts: Arc<dyn ReceiptStore>,
    bus: Arc<dyn EventPublisher>,
    sink: Arc<dyn ConfirmationSink>,
}

impl EventReconciler {
    /// Creates a reconciler over the engine's stores and bus.
    pub fn new(
        config: ReconcilerConfig,
        domains: Arc<DomainRegistry>,
        state_store: Arc<dyn StateStore>,
        receipts: Arc<dyn ReceiptStore>,
        bus: Arc<dyn EventPublisher>,
        sink: Arc<dyn ConfirmationSink>,
    ) -> Self {
        Self {
            config,
            domains,
            state_store,
            receipts,
            bus,
            sink,
        }
    }

    /// Processes one confirmed-event batch for one contract.
    ///
    /// Returns the transactions newly completed by this batch (replayed
    /// completions are committed idempotently but not re-announced).
    pub async fn handle_event_batch(
        &self,
        contract: EthAddress,
        events: Vec<LedgerEvent>,
    ) -> Result<Vec<CompletedTransaction>, ReconcilerError> {
        if events.is_empty() {
            return Ok(Vec::new());
        }
        let instance = self
            .domains
            .get_by_address(contract)
            .await
            .map_err(|_| ReconcilerError::UnknownContract(contract.to_string()))?;

        let response = instance
            .domain
            .plugin
            .handle_event_batch(HandleEventBatchRequest {
                contract_address: contract,
                contract_config_json: instance.config_json.clone(),
                events,
            })
            .await
            .map_err(ReconcilerError::Domain)?;

        debug!(
            contract = %contract,
            completions = response.transactions_complete.len(),
            confirmed = response.confirmed_states.len(),
            spent = response.spent_states.len(),
            aux = response.new_states.len(),
            "Committing event batch"
        );

        // Whole-batch commit with retry: each step is idempotent, so a retry
        // that repeats already-applied steps converges rather than corrupts
        let mut newly_completed = Vec::new();
        let mut attempt = 0;
        loop {
            attempt += 1;
            match self.commit(contract, &response).await {
                Ok(completed) => {
                    newly_completed = completed;
                    break;
                }
                Err(e) if attempt < self.config.commit_attempts => {
                    warn!(
                        contract = %contract,
                        attempt,
                        error = %e,
                        "Batch commit failed, retrying"
                    );
                    tokio::time::sleep(self.config.commit_backoff).await;
                }
                Err(e) => {
                    return Err(ReconcilerError::CommitFailed {
                        attempts: attempt,
                        cause: e.to_string(),
                    })
                }
            }
        }

        for completion in &newly_completed {
            info!(
                contract = %contract,
                transaction = %completion.transaction_id,
                block = completion.location.block_number,
                "Transaction completed on-ledger"
            );
            self.bus
                .publish(CoreEvent::TransactionConfirmed {
                    contract,
                    transaction_id: completion.transaction_id,
                    location: completion.location,
                })
                .await;
            self.sink
                .transaction_confirmed(contract, completion.transaction_id, completion.location)
                .await;
        }
        Ok(newly_completed)
    }

    async fn commit(
        &self,
        contract: EthAddress,
        response: &pd_02_domain_registry::HandleEventBatchResponse,
    ) -> Result<Vec<CompletedTransaction>, StateStoreError> {
        if !response.spent_states.is_empty() {
            self.state_store
                .mark_spent(contract, &response.spent_states)
                .await?;
        }
        if !response.confirmed_states.is_empty() {
            self.state_store
                .mark_confirmed(contract, &response.confirmed_states)
                .await?;
        }
        if !response.new_states.is_empty() {
            // Auxiliary local states (e.g. merkle-tree nodes) ride in the
            // same commit, unlocked and immediately available
            self.state_store
                .upsert_states(None, contract, &response.new_states)
                .await?;
        }

        let mut newly_completed = Vec::new();
        for completion in &response.transactions_complete {
            let receipt = Receipt::success(
                completion.transaction_id,
                completion.tx_hash,
                completion.location,
            );
            if self.receipts.write_receipt(receipt).await? {
                newly_completed.push(completion.clone());
            } else {
                debug!(
                    transaction = %completion.transaction_id,
                    "Completion replayed, receipt already written"
                );
            }
        }
        Ok(newly_completed)
    }
}
