//! Single-node end-to-end scenarios: deploy, mint, transfer with change,
//! insufficient funds, restart replay, and boundary behaviors.

use crate::harness::node::fast_orchestrator_config;
use crate::harness::{FakeChain, LoopbackNetwork, TestNode};
use pd_01_state_store::{ReceiptStore, StateStore};
use pd_07_orchestrator::TxStage;
use pd_09_reconciler::ReconcilerError;
use shared_types::{EthAddress, PrivateContractDeploy, PrivateTransaction, TransactionInputs};
use uuid::Uuid;

const TRANSFER_ABI: &str = r#"{
    "type": "function",
    "name": "transfer",
    "inputs": [
        {"name": "from", "type": "string"},
        {"name": "to", "type": "string"},
        {"name": "amount", "type": "uint256"}
    ]
}"#;

fn transfer_tx(
    contract: EthAddress,
    submitter: &str,
    from: &str,
    to: &str,
    amount: u64,
) -> PrivateTransaction {
    PrivateTransaction::new(TransactionInputs {
        domain: "simple".to_string(),
        to: Some(contract),
        function_abi_json: TRANSFER_ABI.to_string(),
        params_json: format!(r#"{{"from":"{from}","to":"{to}","amount":{amount}}}"#),
        from: submitter.to_string(),
    })
}

async fn deploy_token(node: &TestNode, notary: &str) -> EthAddress {
    let deploy = PrivateContractDeploy::new(
        "simple",
        format!(r#"{{"notary":"{notary}","name":"FT1","symbol":"FT1"}}"#),
    );
    let (_, address) = node
        .engine
        .handle_deploy_tx(deploy)
        .await
        .expect("deploy failed");
    address
}

/// Mints `amount` to `owner` and waits for on-ledger confirmation.
async fn mint(node: &TestNode, contract: EthAddress, owner: &str, amount: u64) -> Uuid {
    let tx = transfer_tx(contract, owner, "", owner, amount);
    let id = node.engine.handle_new_tx(tx).await.expect("mint rejected");
    node.wait_for_stage(contract, id, |s| {
        matches!(s, Some(TxStage::DispatchSubmitted))
    })
    .await;
    assert_eq!(node.mine_and_reconcile().await, 1);
    node.wait_for_stage(contract, id, |s| matches!(s, Some(TxStage::Confirmed)))
        .await;
    id
}

async fn available_amounts(node: &TestNode, contract: EthAddress, owner_addr: &str) -> Vec<u128> {
    let schemas = node
        .store
        .ensure_schemas(&[crate::harness::simple_token::SIMPLE_COIN_SCHEMA.to_string()])
        .await
        .unwrap();
    let query = format!(
        r#"{{"eq":[{{"field":"owner","value":"{owner_addr}"}}],"sort":["amount"]}}"#
    );
    node.store
        .find_available_states(contract, &schemas[0].id(), &query, None)
        .await
        .unwrap()
        .iter()
        .map(|s| {
            serde_json::from_str::<serde_json::Value>(&s.data_json).unwrap()["amount"]
                .as_str()
                .unwrap()
                .parse()
                .unwrap()
        })
        .collect()
}

#[tokio::test]
async fn test_deploy_token() {
    let network = LoopbackNetwork::new();
    let chain = FakeChain::new();
    let node = TestNode::start("node1", &network, chain.clone()).await;

    let deploy = PrivateContractDeploy::new(
        "simple",
        r#"{"notary":"node1.notary","name":"FT1","symbol":"FT1"}"#,
    );
    let deploy_id = deploy.id;
    let (returned_id, address) = node.engine.handle_deploy_tx(deploy).await.unwrap();

    assert_eq!(returned_id, deploy_id);
    assert!(!address.is_zero());
    // The factory invocation was signed by a synthesized one-time key
    assert_eq!(chain.submission_count(), 1);

    let receipt = node
        .receipts
        .get_receipt(deploy_id)
        .await
        .unwrap()
        .expect("deploy receipt missing");
    assert!(receipt.is_success());
    assert_eq!(receipt.contract_address, Some(address));

    // The instance is immediately routable
    let instance = node.domains.get_by_address(address).await.unwrap();
    assert!(instance.config_json.contains("node1.notary"));
}

#[tokio::test]
async fn test_transfer_with_change() {
    let network = LoopbackNetwork::new();
    let chain = FakeChain::new();
    let node = TestNode::start("node1", &network, chain.clone()).await;
    let contract = deploy_token(&node, "node1.notary").await;

    mint(&node, contract, "alice", 100).await;

    let tx = transfer_tx(contract, "alice", "alice", "bob", 40);
    let id = node.engine.handle_new_tx(tx).await.unwrap();
    node.wait_for_stage(contract, id, |s| {
        matches!(s, Some(TxStage::DispatchSubmitted))
    })
    .await;
    assert_eq!(node.mine_and_reconcile().await, 1);
    node.wait_for_stage(contract, id, |s| matches!(s, Some(TxStage::Confirmed)))
        .await;

    // The 100-coin was spent; alice keeps 60, bob holds 40
    let alice = node.key_manager.address_of("alice");
    let bob = node.key_manager.address_of("bob");
    assert_eq!(available_amounts(&node, contract, &alice).await, vec![60]);
    assert_eq!(available_amounts(&node, contract, &bob).await, vec![40]);

    let receipt = node.receipts.get_receipt(id).await.unwrap().unwrap();
    assert!(receipt.is_success());
}

#[tokio::test]
async fn test_mint_produces_exactly_one_output() {
    let network = LoopbackNetwork::new();
    let chain = FakeChain::new();
    let node = TestNode::start("node1", &network, chain.clone()).await;
    let contract = deploy_token(&node, "node1.notary").await;

    // Empty input states + positive amount: exactly one output of that amount
    mint(&node, contract, "alice", 42).await;
    let alice = node.key_manager.address_of("alice");
    assert_eq!(available_amounts(&node, contract, &alice).await, vec![42]);
}

#[tokio::test]
async fn test_insufficient_funds_reverts() {
    let network = LoopbackNetwork::new();
    let chain = FakeChain::new();
    let node = TestNode::start("node1", &network, chain.clone()).await;
    let contract = deploy_token(&node, "node1.notary").await;

    mint(&node, contract, "alice", 10).await;
    let submissions_before = chain.submission_count();

    let tx = transfer_tx(contract, "alice", "alice", "bob", 40);
    let id = node.engine.handle_new_tx(tx).await.unwrap();
    node.wait_for_stage(contract, id, |s| {
        matches!(s, Some(TxStage::Reverted { .. }))
    })
    .await;
    match node.engine.get_tx_status(contract, id) {
        Some(TxStage::Reverted { reason }) => {
            assert!(reason.contains("insufficient funds (available=10)"), "{reason}")
        }
        other => panic!("unexpected stage: {other:?}"),
    }
    // Nothing reached the base ledger, and the 10-coin is still spendable
    assert_eq!(chain.submission_count(), submissions_before);
    let alice = node.key_manager.address_of("alice");
    assert_eq!(available_amounts(&node, contract, &alice).await, vec![10]);
}

#[tokio::test]
async fn test_restart_replay_confirms_exactly_once() {
    let network = LoopbackNetwork::new();
    let chain = FakeChain::new();
    let node = TestNode::start("node1", &network, chain.clone()).await;
    let contract = deploy_token(&node, "node1.notary").await;
    mint(&node, contract, "alice", 100).await;

    // Dispatch, then crash before the confirmation event arrives
    let tx = transfer_tx(contract, "alice", "alice", "bob", 40);
    let id = node.engine.handle_new_tx(tx).await.unwrap();
    node.wait_for_stage(contract, id, |s| {
        matches!(s, Some(TxStage::DispatchSubmitted))
    })
    .await;
    node.engine.stop().await;

    // Restart: fresh engine over the same stores and chain
    let restarted = TestNode::start_with_stores(
        "node1",
        &network,
        chain.clone(),
        node.store.clone(),
        node.receipts.clone(),
        fast_orchestrator_config(),
    )
    .await;
    restarted.observe_contract(contract, "node1.notary").await;

    let events = chain.mine_transfer_events();
    assert_eq!(events.len(), 1);
    let (event_contract, event) = events.into_inner_single();

    let completed = restarted
        .reconciler
        .handle_event_batch(event_contract, vec![event.clone()])
        .await
        .unwrap();
    assert_eq!(completed.len(), 1);
    assert_eq!(completed[0].transaction_id, id);

    // The same event delivered again transitions nothing a second time
    let replayed = restarted
        .reconciler
        .handle_event_batch(event_contract, vec![event])
        .await
        .unwrap();
    assert!(replayed.is_empty());

    let receipt = restarted.receipts.get_receipt(id).await.unwrap().unwrap();
    assert!(receipt.is_success());
}

#[tokio::test]
async fn test_event_for_unknown_contract_is_dropped_whole() {
    let network = LoopbackNetwork::new();
    let chain = FakeChain::new();
    let node = TestNode::start("node1", &network, chain.clone()).await;
    let contract = deploy_token(&node, "node1.notary").await;
    mint(&node, contract, "alice", 100).await;

    let tx = transfer_tx(contract, "alice", "alice", "bob", 40);
    let id = node.engine.handle_new_tx(tx).await.unwrap();
    node.wait_for_stage(contract, id, |s| {
        matches!(s, Some(TxStage::DispatchSubmitted))
    })
    .await;

    let events = chain.mine_transfer_events();
    let (_, event) = events.into_inner_single();
    let err = node
        .reconciler
        .handle_event_batch(EthAddress::from_keccak(b"not-deployed"), vec![event])
        .await
        .unwrap_err();
    assert!(matches!(err, ReconcilerError::UnknownContract(_)));
    // No partial commit: the transfer is still unconfirmed
    assert!(node.receipts.get_receipt(id).await.unwrap().is_none());
}

#[tokio::test]
async fn test_domain_reregistration_routes_new_plugin() {
    let network = LoopbackNetwork::new();
    let chain = FakeChain::new();
    let node = TestNode::start("node1", &network, chain.clone()).await;
    let contract = deploy_token(&node, "node1.notary").await;
    mint(&node, contract, "alice", 100).await;

    // Replace the domain plugin under the same name
    node.domains
        .register(
            "simple",
            r#"{"some":"config"}"#,
            std::sync::Arc::new(crate::harness::SimpleTokenDomain::new()),
        )
        .await;

    // Existing instances route to the replacement and keep working
    let tx = transfer_tx(contract, "alice", "alice", "bob", 25);
    let id = node.engine.handle_new_tx(tx).await.unwrap();
    node.wait_for_stage(contract, id, |s| {
        matches!(s, Some(TxStage::DispatchSubmitted))
    })
    .await;
    assert_eq!(node.mine_and_reconcile().await, 1);
}

trait SingleEvent {
    fn into_inner_single(self) -> (EthAddress, pd_02_domain_registry::LedgerEvent);
}

impl SingleEvent for Vec<(EthAddress, pd_02_domain_registry::LedgerEvent)> {
    fn into_inner_single(mut self) -> (EthAddress, pd_02_domain_registry::LedgerEvent) {
        assert_eq!(self.len(), 1, "expected exactly one mined event");
        self.remove(0)
    }
}
