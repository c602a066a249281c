//! Instant-mining fake base ledger.
//!
//! Records every signed submission, confirms immediately, and lets tests
//! "mine" recorded `executeNotarized` calls into confirmed event batches for
//! the reconciler.

use async_trait::async_trait;
use pd_02_domain_registry::LedgerEvent;
use pd_08_engine::{BaseLedgerClient, DeployedContract};
use pd_10_public_tx::SigningClient;
use shared_types::{
    BaseLedgerTransaction, Bytes32, EthAddress, EthDeployTransaction, OnChainLocation, PtocError,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::{Arc, Mutex};
use uuid::Uuid;

/// The event signature emitted by notarized transfers.
pub const UTXO_TRANSFER_SIGNATURE: &str = "UTXOTransfer(bytes32,bytes32[],bytes32[],bytes)";

struct Submission {
    tx: BaseLedgerTransaction,
    tx_hash: Bytes32,
    mined: bool,
}

/// The fake chain shared by every node in a test.
#[derive(Default)]
pub struct FakeChain {
    submissions: Mutex<Vec<Submission>>,
    nonces: Mutex<HashMap<String, u64>>,
    block_number: AtomicU64,
    /// When set, `sign_and_send` rejects everything.
    refuse_submissions: Mutex<bool>,
}

impl FakeChain {
    /// Creates an empty chain.
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Makes every subsequent submission fail (transient outage).
    pub fn set_refuse_submissions(&self, refuse: bool) {
        *self.refuse_submissions.lock().expect("flag poisoned") = refuse;
    }

    /// Number of accepted submissions.
    pub fn submission_count(&self) -> usize {
        self.submissions.lock().expect("submissions poisoned").len()
    }

    /// Mines every unmined `executeNotarized` submission into one confirmed
    /// event per call, keyed by contract.
    pub fn mine_transfer_events(&self) -> Vec<(EthAddress, LedgerEvent)> {
        let mut events = Vec::new();
        let mut submissions = self.submissions.lock().expect("submissions poisoned");
        for submission in submissions.iter_mut().filter(|s| !s.mined) {
            let Some(contract) = submission.tx.to else {
                continue;
            };
            submission.mined = true;
            let block_number = self.block_number.fetch_add(1, Ordering::SeqCst) + 1;
            events.push((
                contract,
                LedgerEvent {
                    solidity_signature: UTXO_TRANSFER_SIGNATURE.to_string(),
                    data_json: submission.tx.params_json.clone(),
                    tx_hash: submission.tx_hash,
                    location: OnChainLocation {
                        block_number,
                        transaction_index: 0,
                        log_index: 0,
                    },
                },
            ));
        }
        events
    }

    fn record(&self, signer: &str, nonce: u64, tx: BaseLedgerTransaction) -> Bytes32 {
        let tx_hash = Bytes32::keccak(format!("{signer}:{nonce}:{}", tx.params_json).as_bytes());
        self.submissions
            .lock()
            .expect("submissions poisoned")
            .push(Submission {
                tx,
                tx_hash,
                mined: false,
            });
        tx_hash
    }
}

#[async_trait]
impl SigningClient for FakeChain {
    async fn get_transaction_count(&self, signer: &str) -> Result<u64, PtocError> {
        Ok(*self
            .nonces
            .lock()
            .expect("nonces poisoned")
            .entry(signer.to_string())
            .or_insert(0))
    }

    async fn sign_and_send(
        &self,
        signer: &str,
        nonce: u64,
        transaction: &BaseLedgerTransaction,
    ) -> Result<Bytes32, PtocError> {
        if *self.refuse_submissions.lock().expect("flag poisoned") {
            return Err(PtocError::transient("base ledger unavailable"));
        }
        self.nonces
            .lock()
            .expect("nonces poisoned")
            .insert(signer.to_string(), nonce + 1);
        Ok(self.record(signer, nonce, transaction.clone()))
    }

    async fn get_confirmation(
        &self,
        _tx_hash: Bytes32,
    ) -> Result<Option<OnChainLocation>, PtocError> {
        // Instant mining
        Ok(Some(OnChainLocation::default()))
    }
}

#[async_trait]
impl BaseLedgerClient for FakeChain {
    async fn send_deploy(
        &self,
        signer: &str,
        deploy: &EthDeployTransaction,
    ) -> Result<Bytes32, PtocError> {
        Ok(self.record(
            signer,
            0,
            BaseLedgerTransaction {
                function_abi_json: deploy.constructor_abi_json.clone(),
                to: None,
                params_json: deploy.params_json.clone(),
            },
        ))
    }

    async fn send_transaction(
        &self,
        signer: &str,
        transaction: &BaseLedgerTransaction,
    ) -> Result<Bytes32, PtocError> {
        Ok(self.record(signer, 0, transaction.clone()))
    }

    async fn wait_for_deploy(&self, deploy_id: Uuid) -> Result<DeployedContract, PtocError> {
        // The factory event carries the instance configuration; here it is
        // recovered from the recorded newInstance parameters
        let submissions = self.submissions.lock().expect("submissions poisoned");
        let deploy_tx = submissions
            .iter()
            .rev()
            .find(|s| {
                serde_json::from_str::<serde_json::Value>(&s.tx.params_json)
                    .ok()
                    .and_then(|v| v["txId"].as_str().map(|id| id == deploy_id.to_string()))
                    .unwrap_or(false)
            })
            .ok_or_else(|| PtocError::timeout("deploy transaction never landed"))?;
        let params: serde_json::Value = serde_json::from_str(&deploy_tx.tx.params_json)
            .map_err(|e| PtocError::validation(format!("bad deploy params: {e}")))?;
        let notary_locator = params["notaryLocator"].as_str().unwrap_or_default();
        Ok(DeployedContract {
            address: EthAddress::from_keccak(deploy_id.as_bytes()),
            config_json: format!(r#"{{"notaryLocator":"{notary_locator}"}}"#),
        })
    }
}
