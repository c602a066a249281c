//! One fully wired node: engine, reconciler, stores, router, and loopback
//! attachment.

use crate::harness::key_manager::TestKeyManager;
use crate::harness::ledger::FakeChain;
use crate::harness::network::{LoopbackNetwork, LoopbackRegistry, LoopbackTransport};
use crate::harness::simple_token::SimpleTokenDomain;
use pd_01_state_store::{InMemoryReceiptStore, InMemoryStateStore, ReceiptStore, StateStore};
use pd_02_domain_registry::DomainRegistry;
use pd_03_identity::{IdentityResolver, IdentityResolverConfig};
use pd_04_transport::TransportRouter;
use pd_07_orchestrator::OrchestratorConfig;
use pd_08_engine::{Engine, EngineConfig};
use pd_09_reconciler::{EventReconciler, ReconcilerConfig};
use pd_10_public_tx::{PublicTxConfig, PublicTxManager};
use shared_types::EthAddress;
use std::sync::Arc;
use std::time::Duration;
use uuid::Uuid;

/// One node of the test network.
pub struct TestNode {
    /// Node name in the registry.
    pub name: String,
    /// The engine under test.
    pub engine: Arc<Engine>,
    /// Reconciler wired to this node's engine.
    pub reconciler: EventReconciler,
    /// Shared-or-private state store (shared in restart scenarios).
    pub store: Arc<InMemoryStateStore>,
    /// Receipt store.
    pub receipts: Arc<InMemoryReceiptStore>,
    /// This node's key manager.
    pub key_manager: Arc<TestKeyManager>,
    /// This node's transport router.
    pub router: Arc<TransportRouter>,
    /// The shared fake chain.
    pub chain: Arc<FakeChain>,
    /// The domain registry.
    pub domains: Arc<DomainRegistry>,
}

impl TestNode {
    /// Builds a node with fresh stores and attaches it to the network.
    pub async fn start(
        name: &str,
        network: &Arc<LoopbackNetwork>,
        chain: Arc<FakeChain>,
    ) -> TestNode {
        Self::start_with_stores(
            name,
            network,
            chain,
            Arc::new(InMemoryStateStore::new()),
            Arc::new(InMemoryReceiptStore::new()),
            fast_orchestrator_config(),
        )
        .await
    }

    /// Builds a node over existing stores (restart simulation) or custom
    /// orchestrator settings.
    pub async fn start_with_stores(
        name: &str,
        network: &Arc<LoopbackNetwork>,
        chain: Arc<FakeChain>,
        store: Arc<InMemoryStateStore>,
        receipts: Arc<InMemoryReceiptStore>,
        orchestrator: OrchestratorConfig,
    ) -> TestNode {
        let key_manager = Arc::new(TestKeyManager::new(name));
        let resolver = Arc::new(IdentityResolver::new(
            key_manager.clone(),
            IdentityResolverConfig::default(),
        ));
        let router = Arc::new(TransportRouter::new(name, Arc::new(LoopbackRegistry)));
        router
            .register_transport(Arc::new(LoopbackTransport::new(network.clone())))
            .await;
        network.attach(name, router.clone());

        let domains = Arc::new(DomainRegistry::new(
            store.clone() as Arc<dyn StateStore>,
            1337,
        ));
        domains
            .register("simple", r#"{"some":"config"}"#, Arc::new(SimpleTokenDomain::new()))
            .await;

        let submitter = Arc::new(PublicTxManager::new(
            PublicTxConfig::default(),
            chain.clone(),
        ));

        let mut config = EngineConfig::for_node(name, 1337);
        config.orchestrator = orchestrator;
        let engine = Engine::new(
            config,
            domains.clone(),
            resolver,
            router.clone(),
            store.clone() as Arc<dyn StateStore>,
            receipts.clone() as Arc<dyn ReceiptStore>,
            submitter,
            chain.clone(),
        );
        engine.register_with_router().await;

        let reconciler = EventReconciler::new(
            ReconcilerConfig::default(),
            domains.clone(),
            store.clone() as Arc<dyn StateStore>,
            receipts.clone() as Arc<dyn ReceiptStore>,
            engine.event_bus(),
            engine.clone(),
        );

        TestNode {
            name: name.to_string(),
            engine,
            reconciler,
            store,
            receipts,
            key_manager,
            router,
            chain,
            domains,
        }
    }

    /// Registers an already-deployed contract instance on this node
    /// (cross-node instances are observed via the shared factory, which the
    /// fake chain stands in for).
    pub async fn observe_contract(&self, address: EthAddress, notary_locator: &str) {
        self.domains
            .register_contract(
                address,
                "simple",
                format!(r#"{{"notaryLocator":"{notary_locator}"}}"#),
            )
            .await
            .expect("contract registration failed");
    }

    /// Mines pending notarized submissions and reconciles the events.
    pub async fn mine_and_reconcile(&self) -> usize {
        let mut completed = 0;
        for (contract, event) in self.chain.mine_transfer_events() {
            completed += self
                .reconciler
                .handle_event_batch(contract, vec![event])
                .await
                .map(|c| c.len())
                .unwrap_or(0);
        }
        completed
    }

    /// Polls a transaction's stage until the predicate holds.
    pub async fn wait_for_stage(
        &self,
        contract: EthAddress,
        id: Uuid,
        pred: impl Fn(Option<pd_07_orchestrator::TxStage>) -> bool,
    ) {
        tokio::time::timeout(Duration::from_secs(5), async {
            loop {
                if pred(self.engine.get_tx_status(contract, id)) {
                    return;
                }
                tokio::time::sleep(Duration::from_millis(10)).await;
            }
        })
        .await
        .expect("stage condition not reached in time");
    }
}

/// Short timeouts so failure paths complete quickly in tests.
pub fn fast_orchestrator_config() -> OrchestratorConfig {
    OrchestratorConfig {
        evaluation_interval: Duration::from_millis(20),
        attestation_timeout: Duration::from_millis(200),
        attestation_retries: 2,
        dispatch_timeout: Duration::from_secs(5),
        stale_timeout: Duration::from_secs(600),
        ..Default::default()
    }
}
