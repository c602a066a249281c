//! # Manager
//!
//! One submission loop per signing address, created on first use. The
//! manager is the engine's [`DispatchSubmitter`]: orchestrators hand it
//! prepared calls and receive the assigned transaction hash once the loop
//! has accepted and broadcast the submission.

use crate::config::PublicTxConfig;
use crate::errors::PublicTxError;
use crate::ports::SigningClient;
use async_trait::async_trait;
use pd_07_orchestrator::DispatchSubmitter;
use shared_types::{BaseLedgerTransaction, Bytes32, PtocError};
use std::collections::HashMap;
use tokio::sync::{mpsc, oneshot, Mutex};
use std::sync::Arc;
use tracing::{debug, info, warn};

struct SubmitRequest {
    transaction: BaseLedgerTransaction,
    reply: oneshot::Sender<Result<Bytes32, PublicTxError>>,
}

struct SignerHandle {
    queue: mpsc::Sender<SubmitRequest>,
}

/// The public-transaction manager.
pub struct PublicTxManager {
    config: PublicTxConfig,
    client: Arc<dyn SigningClient>,
    signers: Mutex<HashMap<String, SignerHandle>>,
}

impl PublicTxManager {
    /// Creates a manager over the given signing client.
    pub fn new(config: PublicTxConfig, client: Arc<dyn SigningClient>) -> Self {
        Self {
            config,
            client,
            signers: Mutex::new(HashMap::new()),
        }
    }

    /// Submits one call under a signer, spawning that signer's loop on
    /// first use.
    pub async fn submit_tx(
        &self,
        signer: &str,
        transaction: BaseLedgerTransaction,
    ) -> Result<Bytes32, PublicTxError> {
        let queue = self.signer_queue(signer).await;
        let (reply_tx, reply_rx) = oneshot::channel();
        queue
            .try_send(SubmitRequest {
                transaction,
                reply: reply_tx,
            })
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => PublicTxError::QueueFull(signer.to_string()),
                mpsc::error::TrySendError::Closed(_) => PublicTxError::Stopped(signer.to_string()),
            })?;
        reply_rx
            .await
            .map_err(|_| PublicTxError::Stopped(signer.to_string()))?
    }

    async fn signer_queue(&self, signer: &str) -> mpsc::Sender<SubmitRequest> {
        let mut signers = self.signers.lock().await;
        if let Some(handle) = signers.get(signer) {
            if !handle.queue.is_closed() {
                return handle.queue.clone();
            }
        }
        let (queue_tx, queue_rx) = mpsc::channel(self.config.max_queued_per_signer.max(1));
        let mut signer_loop = SignerLoop {
            signer: signer.to_string(),
            client: self.client.clone(),
            poll_interval: self.config.poll_interval,
            nonce: None,
            in_flight: Vec::new(),
        };
        tokio::spawn(async move {
            signer_loop.run(queue_rx).await;
        });
        signers.insert(
            signer.to_string(),
            SignerHandle {
                queue: queue_tx.clone(),
            },
        );
        queue_tx
    }
}

#[async_trait]
impl DispatchSubmitter for PublicTxManager {
    async fn submit(
        &self,
        signer: &str,
        transaction: &BaseLedgerTransaction,
    ) -> Result<Bytes32, PtocError> {
        self.submit_tx(signer, transaction.clone())
            .await
            .map_err(Into::into)
    }
}

struct SignerLoop {
    signer: String,
    client: Arc<dyn SigningClient>,
    poll_interval: std::time::Duration,
    /// Next nonce; fetched from the chain on first submission.
    nonce: Option<u64>,
    /// Submitted, not yet confirmed.
    in_flight: Vec<Bytes32>,
}

impl SignerLoop {
    async fn run(&mut self, mut queue: mpsc::Receiver<SubmitRequest>) {
        info!(signer = %self.signer, "Signer loop started");
        let mut poll = tokio::time::interval(self.poll_interval);
        poll.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        loop {
            tokio::select! {
                maybe_request = queue.recv() => {
                    match maybe_request {
                        Some(request) => self.process(request).await,
                        None => break,
                    }
                }
                _ = poll.tick() => self.poll_confirmations().await,
            }
        }
        info!(signer = %self.signer, "Signer loop stopped");
    }

    async fn process(&mut self, request: SubmitRequest) {
        let nonce = match self.next_nonce().await {
            Ok(nonce) => nonce,
            Err(e) => {
                let _ = request.reply.send(Err(e));
                return;
            }
        };
        match self
            .client
            .sign_and_send(&self.signer, nonce, &request.transaction)
            .await
        {
            Ok(tx_hash) => {
                // Nonce consumed only on acceptance, so failures leave no gap
                self.nonce = Some(nonce + 1);
                self.in_flight.push(tx_hash);
                debug!(
                    signer = %self.signer,
                    nonce,
                    tx_hash = %tx_hash,
                    "Base-ledger submission accepted"
                );
                let _ = request.reply.send(Ok(tx_hash));
            }
            Err(e) => {
                warn!(signer = %self.signer, nonce, error = %e, "Base-ledger submission failed");
                let _ = request
                    .reply
                    .send(Err(PublicTxError::Submission(e.message().to_string())));
            }
        }
    }

    async fn next_nonce(&mut self) -> Result<u64, PublicTxError> {
        match self.nonce {
            Some(nonce) => Ok(nonce),
            None => {
                let fetched = self
                    .client
                    .get_transaction_count(&self.signer)
                    .await
                    .map_err(|e| PublicTxError::Submission(e.message().to_string()))?;
                self.nonce = Some(fetched);
                Ok(fetched)
            }
        }
    }

    async fn poll_confirmations(&mut self) {
        let mut still_pending = Vec::with_capacity(self.in_flight.len());
        for tx_hash in self.in_flight.drain(..) {
            match self.client.get_confirmation(tx_hash).await {
                Ok(Some(location)) => {
                    debug!(
                        signer = %self.signer,
                        tx_hash = %tx_hash,
                        block = location.block_number,
                        "Submission confirmed"
                    );
                }
                Ok(None) => still_pending.push(tx_hash),
                Err(e) => {
                    warn!(signer = %self.signer, tx_hash = %tx_hash, error = %e, "Confirmation poll failed");
                    still_pending.push(tx_hash);
                }
            }
        }
        self.in_flight = still_pending;
    }
}
