//! # Engine
//!
//! The coordinator itself plus its transport-client adapter.

use crate::config::EngineConfig;
use crate::errors::EngineError;
use crate::ports::BaseLedgerClient;
use async_trait::async_trait;
use pd_01_state_store::{ReceiptStore, StateStore};
use pd_02_domain_registry::{
    ContractInstance, DomainRegistry, InitDeployRequest, InitTransactionRequest, TransactionSpec,
};
use pd_03_identity::IdentityResolver;
use pd_04_transport::{TransportClient, TransportRouter};
use pd_05_endorsement::{
    EndorsementGatherer, EndorsementRequestMessage, EndorsementResponseMessage,
};
use pd_07_orchestrator::{
    ContractOrchestrator, DispatchSubmitter, OrchestratorEvent, TxStage,
};
use pd_09_reconciler::ConfirmationSink;
use shared_bus::{CoreEvent, EventFilter, EventPublisher, InMemoryEventBus, Subscription};
use shared_types::{
    message_types, EthAddress, OnChainLocation, PreAssembly, PrivateContractDeploy,
    PrivateTransaction, TransportMessage,
};
use std::collections::HashMap;
use std::sync::{Arc, Mutex as StdMutex};
use tracing::{debug, error, info, warn};
use uuid::Uuid;

/// The orchestration-core engine, one per host process.
pub struct Engine {
    config: EngineConfig,
    domains: Arc<DomainRegistry>,
    resolver: Arc<IdentityResolver>,
    router: Arc<TransportRouter>,
    state_store: Arc<dyn StateStore>,
    receipts: Arc<dyn ReceiptStore>,
    submitter: Arc<dyn DispatchSubmitter>,
    base_ledger: Arc<dyn BaseLedgerClient>,
    bus: Arc<InMemoryEventBus>,
    orchestrators: StdMutex<HashMap<EthAddress, Arc<ContractOrchestrator>>>,
    gatherers: StdMutex<HashMap<EthAddress, Arc<EndorsementGatherer>>>,
}

impl Engine {
    /// Wires an engine over its collaborators.
    #[allow(clippy::too_many_arguments)]
    pub fn new(
        config: EngineConfig,
        domains: Arc<DomainRegistry>,
        resolver: Arc<IdentityResolver>,
        router: Arc<TransportRouter>,
        state_store: Arc<dyn StateStore>,
        receipts: Arc<dyn ReceiptStore>,
        submitter: Arc<dyn DispatchSubmitter>,
        base_ledger: Arc<dyn BaseLedgerClient>,
    ) -> Arc<Self> {
        Arc::new(Self {
            config,
            domains,
            resolver,
            router,
            state_store,
            receipts,
            submitter,
            base_ledger,
            bus: Arc::new(InMemoryEventBus::new()),
            orchestrators: StdMutex::new(HashMap::new()),
            gatherers: StdMutex::new(HashMap::new()),
        })
    }

    /// The domain registry behind this engine.
    pub fn domains(&self) -> &Arc<DomainRegistry> {
        &self.domains
    }

    /// The lifecycle event bus; the reconciler publishes completions here so
    /// subscribers observe one ordered stream per engine.
    pub fn event_bus(&self) -> Arc<InMemoryEventBus> {
        self.bus.clone()
    }

    /// Registers this engine as the router's inbound client for its
    /// component name.
    pub async fn register_with_router(self: &Arc<Self>) {
        self.router
            .register_client(Arc::new(EngineTransportClient(self.clone())))
            .await;
    }

    /// Accepts a new private transaction: validates, initializes against the
    /// domain, resolves verifiers synchronously, and queues it on the
    /// contract's orchestrator.
    pub async fn handle_new_tx(&self, mut tx: PrivateTransaction) -> Result<Uuid, EngineError> {
        if tx.inputs.domain.is_empty() {
            return Err(EngineError::Validation("domain not provided".to_string()));
        }
        let Some(contract) = tx.inputs.to.filter(|to| !to.is_zero()) else {
            return Err(EngineError::Validation(
                "contract address not provided".to_string(),
            ));
        };
        if tx.inputs.from.is_empty() {
            return Err(EngineError::Validation(
                "from identity not provided".to_string(),
            ));
        }

        let instance = self
            .domains
            .get_by_address(contract)
            .await
            .map_err(|e| EngineError::Core(e.into()))?;
        instance.domain.check_initialized().map_err(|e| EngineError::Core(e.into()))?;

        let init = instance
            .domain
            .plugin
            .init_transaction(InitTransactionRequest {
                transaction: TransactionSpec {
                    transaction_id: tx.id,
                    contract_address: contract,
                    contract_config_json: instance.config_json.clone(),
                    function_abi_json: tx.inputs.function_abi_json.clone(),
                    function_params_json: tx.inputs.params_json.clone(),
                    from: tx.inputs.from.clone(),
                },
            })
            .await
            .map_err(|e| EngineError::Core(shared_types::PtocError::domain(e)))?;

        // Resolve verifiers inline so a bad identity fails the caller before
        // any orchestration or network I/O happens
        let verifiers = self
            .resolver
            .resolve_all(&init.required_verifiers)
            .await
            .map_err(|e| EngineError::Core(e.into()))?;
        tx.pre_assembly = Some(PreAssembly {
            required_verifiers: init.required_verifiers,
            verifiers,
        });

        let tx_id = tx.id;
        let orchestrator = self.orchestrator_for(&instance)?;
        orchestrator
            .queue_transaction(tx)
            .map_err(|e| EngineError::Core(e.into()))?;
        debug!(contract = %contract, transaction = %tx_id, "Transaction queued");
        Ok(tx_id)
    }

    /// Runs the synchronous deploy flow: InitDeploy → resolve verifiers →
    /// PrepareDeploy → base-ledger submit → wait for the factory event →
    /// register the instance.
    pub async fn handle_deploy_tx(
        &self,
        mut deploy: PrivateContractDeploy,
    ) -> Result<(Uuid, EthAddress), EngineError> {
        if deploy.domain.is_empty() {
            return Err(EngineError::Validation("domain not provided".to_string()));
        }
        let handle = self
            .domains
            .get_by_name(&deploy.domain)
            .await
            .map_err(|e| EngineError::Core(e.into()))?;
        handle.check_initialized().map_err(|e| EngineError::Core(e.into()))?;

        let init = handle
            .plugin
            .init_deploy(InitDeployRequest {
                transaction: pd_02_domain_registry::DeploySpec {
                    transaction_id: deploy.id,
                    constructor_params_json: deploy.constructor_params_json.clone(),
                },
            })
            .await
            .map_err(|e| EngineError::Core(shared_types::PtocError::domain(e)))?;
        deploy.required_verifiers = init.required_verifiers;
        deploy.verifiers = self
            .resolver
            .resolve_all(&deploy.required_verifiers)
            .await
            .map_err(|e| EngineError::Core(e.into()))?;

        self.domains
            .prepare_deploy(&handle, &mut deploy)
            .await
            .map_err(|e| EngineError::Core(e.into()))?;

        let signer = deploy
            .signer
            .clone()
            .ok_or_else(|| EngineError::Validation("deploy signer missing".to_string()))?;
        let tx_hash = match (&deploy.deploy_transaction, &deploy.invoke_transaction) {
            (Some(constructor), None) => self
                .base_ledger
                .send_deploy(&signer, constructor)
                .await
                .map_err(EngineError::Core)?,
            (None, Some(invoke)) => self
                .base_ledger
                .send_transaction(&signer, invoke)
                .await
                .map_err(EngineError::Core)?,
            _ => {
                return Err(EngineError::Validation(
                    "deploy preparation incomplete".to_string(),
                ))
            }
        };
        debug!(deploy = %deploy.id, tx_hash = %tx_hash, "Deploy submitted to base ledger");

        let deployed = self
            .base_ledger
            .wait_for_deploy(deploy.id)
            .await
            .map_err(EngineError::Core)?;
        self.domains
            .register_contract(deployed.address, &deploy.domain, deployed.config_json)
            .await
            .map_err(|e| EngineError::Core(e.into()))?;

        if let Err(e) = self
            .receipts
            .write_receipt(shared_types::Receipt {
                transaction_id: deploy.id,
                outcome: shared_types::ReceiptOutcome::Success { tx_hash },
                on_chain: None,
                contract_address: Some(deployed.address),
            })
            .await
        {
            warn!(deploy = %deploy.id, error = %e, "Deploy receipt write failed");
        }
        info!(
            domain = %deploy.domain,
            contract = %deployed.address,
            deploy = %deploy.id,
            "Contract instance deployed"
        );
        self.bus
            .publish(CoreEvent::ContractDeployed {
                domain: deploy.domain.clone(),
                contract: deployed.address,
                transaction_id: deploy.id,
            })
            .await;
        Ok((deploy.id, deployed.address))
    }

    /// Routes an event to the contract's orchestrator. Events for contracts
    /// with no live orchestrator are dropped with a warning; the next
    /// transaction re-hydrates the orchestrator and recovery replays from
    /// the receipt store.
    pub fn handle_new_event(&self, contract: EthAddress, event: OrchestratorEvent) {
        let orchestrator = self
            .orchestrators
            .lock()
            .ok()
            .and_then(|map| map.get(&contract).cloned())
            .filter(|o| !o.is_stopped());
        match orchestrator {
            Some(orchestrator) => {
                if let Err(e) = orchestrator.handle_event(event) {
                    warn!(contract = %contract, error = %e, "Orchestrator rejected event");
                }
            }
            None => {
                warn!(
                    contract = %contract,
                    "Event for contract with no live orchestrator dropped; check the stale timeout if frequent"
                );
            }
        }
    }

    /// Subscribes to lifecycle events.
    pub fn subscribe(&self, filter: EventFilter) -> Subscription {
        self.bus.subscribe(filter)
    }

    /// The last observed stage of a transaction on a contract.
    pub fn get_tx_status(&self, contract: EthAddress, transaction_id: Uuid) -> Option<TxStage> {
        self.orchestrators
            .lock()
            .ok()
            .and_then(|map| map.get(&contract).cloned())
            .and_then(|o| o.stage_of(transaction_id))
    }

    /// Stops every orchestrator, bounded by the shutdown timeout.
    pub async fn stop(&self) {
        let orchestrators: Vec<Arc<ContractOrchestrator>> = self
            .orchestrators
            .lock()
            .map(|map| map.values().cloned().collect())
            .unwrap_or_default();
        let shutdown = async {
            for orchestrator in orchestrators {
                orchestrator.stop().await;
            }
        };
        if tokio::time::timeout(self.config.shutdown_timeout, shutdown)
            .await
            .is_err()
        {
            error!("Engine shutdown timed out; orchestrator tasks abandoned");
        }
    }

    /// Handles one inbound wire message. Called from the transport client on
    /// a spawned task per message.
    pub async fn receive_transport_message(self: Arc<Self>, message: TransportMessage) {
        match message.message_type.as_str() {
            message_types::ENDORSEMENT_REQUEST => self.handle_endorsement_request(message).await,
            message_types::ENDORSEMENT_RESPONSE => self.handle_endorsement_response(message).await,
            other => {
                error!(message_type = %other, "Unknown transport message type dropped");
            }
        }
    }

    async fn handle_endorsement_request(&self, message: TransportMessage) {
        let request = match EndorsementRequestMessage::decode(&message.payload) {
            Ok(request) => request,
            Err(e) => {
                error!(error = %e, "Failed to decode endorsement request");
                return;
            }
        };
        let contract = request.contract_address;
        let gatherer = match self.gatherer_for_address(contract).await {
            Ok(gatherer) => gatherer,
            Err(e) => {
                error!(contract = %contract, error = %e, "No gatherer for endorsement request");
                return;
            }
        };
        let response = match gatherer.evaluate_inbound_request(request).await {
            Ok(response) => response,
            Err(e) => {
                error!(contract = %contract, error = %e, "Endorsement evaluation failed");
                return;
            }
        };
        let payload = match response.encode() {
            Ok(payload) => payload,
            Err(e) => {
                error!(error = %e, "Failed to encode endorsement response");
                return;
            }
        };
        let reply = message.reply(message_types::ENDORSEMENT_RESPONSE, payload);
        if let Err(e) = self.router.send(reply).await {
            error!(contract = %contract, error = %e, "Failed to send endorsement response");
        }
    }

    async fn handle_endorsement_response(&self, message: TransportMessage) {
        let response = match EndorsementResponseMessage::decode(&message.payload) {
            Ok(response) => response,
            Err(e) => {
                error!(error = %e, "Failed to decode endorsement response");
                return;
            }
        };
        let contract = response.contract_address;
        let gatherer = self
            .gatherers
            .lock()
            .ok()
            .and_then(|map| map.get(&contract).cloned());
        let Some(gatherer) = gatherer else {
            debug!(contract = %contract, "Endorsement response for unknown contract dropped");
            return;
        };
        // Duplicate responses find no pending entry and are dropped here
        if let Some(update) = gatherer.handle_response(response) {
            self.handle_new_event(contract, OrchestratorEvent::EndorsementReceived(update));
        }
    }

    /// Gets the live orchestrator for a contract, creating (or recreating a
    /// stopped) one on demand. Live orchestrators are capped at
    /// `max_active_contracts`; stopped entries are reaped to make room.
    fn orchestrator_for(
        &self,
        instance: &ContractInstance,
    ) -> Result<Arc<ContractOrchestrator>, EngineError> {
        let gatherer = self.gatherer_for_instance(instance);
        let mut map = match self.orchestrators.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        if let Some(existing) = map.get(&instance.address) {
            if !existing.is_stopped() {
                return Ok(existing.clone());
            }
            debug!(contract = %instance.address, "Recreating stopped orchestrator");
        }
        map.retain(|_, orchestrator| !orchestrator.is_stopped());
        if map.len() >= self.config.max_active_contracts {
            return Err(EngineError::Core(shared_types::PtocError::transient(
                format!(
                    "active contract cap reached ({})",
                    self.config.max_active_contracts
                ),
            )));
        }
        let orchestrator = Arc::new(ContractOrchestrator::start(
            self.config.orchestrator.clone(),
            instance.clone(),
            self.state_store.clone(),
            self.receipts.clone(),
            gatherer,
            self.submitter.clone(),
            self.bus.clone(),
        ));
        map.insert(instance.address, orchestrator.clone());
        Ok(orchestrator)
    }

    fn gatherer_for_instance(&self, instance: &ContractInstance) -> Arc<EndorsementGatherer> {
        let mut map = match self.gatherers.lock() {
            Ok(map) => map,
            Err(poisoned) => poisoned.into_inner(),
        };
        map.entry(instance.address)
            .or_insert_with(|| {
                Arc::new(EndorsementGatherer::new(
                    instance.clone(),
                    self.resolver.clone(),
                    self.router.clone(),
                    self.config.component.clone(),
                ))
            })
            .clone()
    }

    async fn gatherer_for_address(
        &self,
        contract: EthAddress,
    ) -> Result<Arc<EndorsementGatherer>, EngineError> {
        if let Some(gatherer) = self
            .gatherers
            .lock()
            .ok()
            .and_then(|map| map.get(&contract).cloned())
        {
            return Ok(gatherer);
        }
        let instance = self
            .domains
            .get_by_address(contract)
            .await
            .map_err(|e| EngineError::Core(e.into()))?;
        Ok(self.gatherer_for_instance(&instance))
    }
}

#[async_trait]
impl ConfirmationSink for Engine {
    async fn transaction_confirmed(
        &self,
        contract: EthAddress,
        transaction_id: Uuid,
        location: OnChainLocation,
    ) {
        self.handle_new_event(
            contract,
            OrchestratorEvent::ConfirmationReceived {
                transaction_id,
                location,
            },
        );
    }
}

/// Adapter registering the engine as a transport client.
pub struct EngineTransportClient(pub Arc<Engine>);

#[async_trait]
impl TransportClient for EngineTransportClient {
    fn destination(&self) -> &str {
        &self.0.config.component
    }

    async fn receive_transport_message(&self, message: TransportMessage) {
        // Quick handover: the engine decides the thread of control
        let engine = self.0.clone();
        tokio::spawn(async move {
            engine.receive_transport_message(message).await;
        });
    }
}
