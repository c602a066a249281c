//! # Orchestrator Loop
//!
//! The handle/loop split: [`ContractOrchestrator`] is the engine-facing
//! handle; the spawned loop owns all mutable state (in-flight set,
//! sequencer, overflow queue) so no lock is held across a suspension point.

use crate::config::OrchestratorConfig;
use crate::errors::OrchestratorError;
use crate::events::OrchestratorEvent;
use crate::ports::DispatchSubmitter;
use crate::stage::{InFlight, TxStage};
use pd_01_state_store::{DomainContext, ReceiptStore, StateStore, StateStoreError};
use pd_02_domain_registry::{
    AssembleTransactionRequest, AssemblyResult, ContractInstance, EndorsableState,
    PrepareTransactionRequest, SubmitMode, TransactionSpec,
};
use pd_05_endorsement::{EndorsementGatherer, EndorsementUpdate, GatherOutcome};
use pd_06_sequencer::Sequencer;
use shared_bus::{CoreEvent, EventPublisher};
use shared_types::{Dispatch, EthAddress, PrivateTransaction, Receipt, State};
use std::collections::{HashMap, VecDeque};
use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex as StdMutex};
use tokio::sync::{mpsc, oneshot};
use tokio::task::JoinHandle;
use tokio::time::Instant;
use tracing::{debug, info, warn};
use uuid::Uuid;

/// Engine-facing handle to one contract's orchestrator loop.
pub struct ContractOrchestrator {
    contract: EthAddress,
    events_tx: mpsc::Sender<OrchestratorEvent>,
    status: Arc<StdMutex<HashMap<Uuid, TxStage>>>,
    stopped: Arc<AtomicBool>,
    shutdown_tx: StdMutex<Option<oneshot::Sender<()>>>,
    join: StdMutex<Option<JoinHandle<()>>>,
}

impl ContractOrchestrator {
    /// Spawns the loop for one contract instance.
    #[allow(clippy::too_many_arguments)]
    pub fn start(
        config: OrchestratorConfig,
        instance: ContractInstance,
        state_store: Arc<dyn StateStore>,
        receipts: Arc<dyn ReceiptStore>,
        gatherer: Arc<EndorsementGatherer>,
        submitter: Arc<dyn DispatchSubmitter>,
        bus: Arc<dyn EventPublisher>,
    ) -> Self {
        let contract = instance.address;
        let (events_tx, events_rx) = mpsc::channel(config.max_pending_events.max(1));
        let (shutdown_tx, shutdown_rx) = oneshot::channel();
        let status = Arc::new(StdMutex::new(HashMap::new()));
        let stopped = Arc::new(AtomicBool::new(false));

        let mut inner = Loop {
            contract,
            config,
            instance,
            state_store,
            receipts,
            gatherer,
            submitter,
            bus,
            sequencer: Sequencer::new(contract),
            in_flight: HashMap::new(),
            overflow: VecDeque::new(),
            work: VecDeque::new(),
            status: status.clone(),
            last_activity: Instant::now(),
            storage_failures: 0,
            quarantined_until: None,
        };
        let stopped_flag = stopped.clone();
        let join = tokio::spawn(async move {
            inner.run(events_rx, shutdown_rx).await;
            stopped_flag.store(true, Ordering::SeqCst);
            info!(contract = %inner.contract, "Orchestrator stopped");
        });

        Self {
            contract,
            events_tx,
            status,
            stopped,
            shutdown_tx: StdMutex::new(Some(shutdown_tx)),
            join: StdMutex::new(Some(join)),
        }
    }

    /// The contract this orchestrator drives.
    pub fn contract(&self) -> EthAddress {
        self.contract
    }

    /// Queues a new transaction; fails when the event queue is full or the
    /// loop has stopped.
    pub fn queue_transaction(&self, tx: PrivateTransaction) -> Result<(), OrchestratorError> {
        self.handle_event(OrchestratorEvent::NewTransaction(Box::new(tx)))
    }

    /// Delivers an event to the loop without blocking.
    pub fn handle_event(&self, event: OrchestratorEvent) -> Result<(), OrchestratorError> {
        if self.is_stopped() {
            return Err(OrchestratorError::Stopped(self.contract.to_string()));
        }
        self.events_tx
            .try_send(event)
            .map_err(|e| match e {
                mpsc::error::TrySendError::Full(_) => {
                    OrchestratorError::QueueFull(self.contract.to_string())
                }
                mpsc::error::TrySendError::Closed(_) => {
                    OrchestratorError::Stopped(self.contract.to_string())
                }
            })
    }

    /// The last observed stage of a transaction on this orchestrator.
    pub fn stage_of(&self, transaction_id: Uuid) -> Option<TxStage> {
        self.status
            .lock()
            .ok()
            .and_then(|s| s.get(&transaction_id).cloned())
    }

    /// True once the loop has exited (stale timeout or stop).
    pub fn is_stopped(&self) -> bool {
        self.stopped.load(Ordering::SeqCst)
    }

    /// Stops the loop and waits for it to exit.
    pub async fn stop(&self) {
        let shutdown = self.shutdown_tx.lock().ok().and_then(|mut s| s.take());
        if let Some(shutdown) = shutdown {
            let _ = shutdown.send(());
        }
        let join = self.join.lock().ok().and_then(|mut j| j.take());
        if let Some(join) = join {
            let _ = join.await;
        }
    }
}

struct Loop {
    contract: EthAddress,
    config: OrchestratorConfig,
    instance: ContractInstance,
    state_store: Arc<dyn StateStore>,
    receipts: Arc<dyn ReceiptStore>,
    gatherer: Arc<EndorsementGatherer>,
    submitter: Arc<dyn DispatchSubmitter>,
    bus: Arc<dyn EventPublisher>,
    sequencer: Sequencer,
    in_flight: HashMap<Uuid, InFlight>,
    /// Arrivals beyond `max_concurrent_process`, admitted FIFO.
    overflow: VecDeque<PrivateTransaction>,
    /// Transactions with a stage step to run; drained after every event.
    work: VecDeque<Uuid>,
    status: Arc<StdMutex<HashMap<Uuid, TxStage>>>,
    last_activity: Instant,
    storage_failures: u32,
    quarantined_until: Option<Instant>,
}

impl Loop {
    async fn run(
        &mut self,
        mut events_rx: mpsc::Receiver<OrchestratorEvent>,
        mut shutdown_rx: oneshot::Receiver<()>,
    ) {
        let mut tick = tokio::time::interval(self.config.evaluation_interval);
        tick.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);
        info!(contract = %self.contract, "Orchestrator started");

        loop {
            tokio::select! {
                _ = &mut shutdown_rx => break,
                maybe_event = events_rx.recv() => {
                    match maybe_event {
                        Some(event) => {
                            self.last_activity = Instant::now();
                            self.handle_event(event).await;
                        }
                        None => break,
                    }
                }
                _ = tick.tick() => {
                    if self.evaluate().await {
                        break;
                    }
                }
            }
        }
    }

    async fn handle_event(&mut self, event: OrchestratorEvent) {
        let quarantined = self
            .quarantined_until
            .is_some_and(|until| Instant::now() < until);
        match event {
            OrchestratorEvent::NewTransaction(tx) if quarantined => {
                warn!(contract = %self.contract, transaction = %tx.id, "Orchestrator quarantined, arrival queued");
                self.overflow.push_back(*tx);
            }
            OrchestratorEvent::NewTransaction(tx) => self.accept(*tx).await,
            OrchestratorEvent::EndorsementReceived(update) => {
                self.endorsement_received(update).await
            }
            OrchestratorEvent::ConfirmationReceived {
                transaction_id,
                location,
            } => self.confirmation_received(transaction_id, location).await,
        }
        self.drain_work().await;
    }

    /// Periodic evaluation; returns true when the loop should exit.
    async fn evaluate(&mut self) -> bool {
        let now = Instant::now();
        if let Some(until) = self.quarantined_until {
            if now < until {
                return false;
            }
            info!(contract = %self.contract, "Orchestrator quarantine lifted");
            self.quarantined_until = None;
            self.admit_overflow();
        }

        if self.in_flight.is_empty()
            && self.overflow.is_empty()
            && self.last_activity.elapsed() >= self.config.stale_timeout
        {
            debug!(contract = %self.contract, "Stale timeout reached, stopping");
            return true;
        }

        // Attestation reply timeouts
        let expired: Vec<Uuid> = self
            .in_flight
            .iter()
            .filter(|(_, f)| {
                f.stage == TxStage::AssemblyDone
                    && f.attestation_deadline.is_some_and(|d| now >= d)
            })
            .map(|(id, _)| *id)
            .collect();
        for id in expired {
            self.attestation_expired(id).await;
        }

        // Dependency-gated transactions re-check dispatchability; un-parked
        // pre-assembly transactions retry their assembly
        let retryable: Vec<Uuid> = self
            .in_flight
            .iter()
            .filter(|(id, f)| match f.stage {
                TxStage::AttestationComplete => true,
                TxStage::PreAssemblyDone => !self.sequencer.is_parked(**id),
                _ => false,
            })
            .map(|(id, _)| *id)
            .collect();
        for id in retryable {
            self.schedule(id);
        }

        self.drain_work().await;
        false
    }

    fn schedule(&mut self, id: Uuid) {
        if !self.work.contains(&id) {
            self.work.push_back(id);
        }
    }

    async fn drain_work(&mut self) {
        while let Some(id) = self.work.pop_front() {
            self.step(id).await;
        }
    }

    async fn step(&mut self, id: Uuid) {
        let Some(stage) = self.in_flight.get(&id).map(|f| f.stage.clone()) else {
            return;
        };
        match stage {
            TxStage::PreAssemblyDone => self.assemble(id).await,
            TxStage::AssemblyDone => self.gather_attestations(id).await,
            TxStage::AttestationComplete => self.try_dispatch(id).await,
            _ => {}
        }
    }

    async fn accept(&mut self, tx: PrivateTransaction) {
        if self.in_flight.len() >= self.config.max_concurrent_process {
            debug!(
                contract = %self.contract,
                transaction = %tx.id,
                "In-flight set full, transaction queued"
            );
            self.overflow.push_back(tx);
            return;
        }
        let id = tx.id;
        let in_flight = InFlight::new(tx);
        self.set_stage(id, in_flight.stage.clone());
        self.in_flight.insert(id, in_flight);
        self.bus
            .publish(CoreEvent::TransactionQueued {
                contract: self.contract,
                transaction_id: id,
            })
            .await;
        // A fresh transaction can unblock parked assemblies
        self.wake_parked();
        self.schedule(id);
    }

    fn admit_overflow(&mut self) {
        while self.in_flight.len() < self.config.max_concurrent_process {
            let Some(tx) = self.overflow.pop_front() else {
                return;
            };
            let id = tx.id;
            let in_flight = InFlight::new(tx);
            self.set_stage(id, in_flight.stage.clone());
            self.in_flight.insert(id, in_flight);
            self.schedule(id);
        }
    }

    fn wake_parked(&mut self) {
        for id in self.sequencer.wake_parked() {
            self.schedule(id);
        }
    }

    // =========================================================================
    // STAGE: ASSEMBLY
    // =========================================================================

    async fn assemble(&mut self, id: Uuid) {
        let Some(spec) = self.spec_for(id) else {
            return;
        };
        let Some(verifiers) = self
            .in_flight
            .get(&id)
            .and_then(|f| f.tx.pre_assembly.as_ref())
            .map(|p| p.verifiers.clone())
        else {
            self.fail(id, "pre-assembly missing at assembly stage").await;
            return;
        };

        let ctx = DomainContext::new(self.state_store.clone(), self.contract, Some(id));
        let response = self
            .instance
            .domain
            .plugin
            .assemble_transaction(
                AssembleTransactionRequest {
                    transaction: spec,
                    resolved_verifiers: verifiers,
                },
                &ctx,
            )
            .await;

        let response = match response {
            Ok(response) => response,
            Err(reason) => {
                // The domain decides viability; its error is a revert
                self.revert(id, reason).await;
                return;
            }
        };

        match response.assembly_result {
            AssemblyResult::Park => {
                debug!(contract = %self.contract, transaction = %id, "Assembly parked");
                self.sequencer.park(id);
            }
            AssemblyResult::Revert => {
                let reason = response
                    .revert_reason
                    .unwrap_or_else(|| "assembly reverted".to_string());
                self.revert(id, reason).await;
            }
            AssemblyResult::Ok => {
                let Some(assembled) = response.assembled_transaction else {
                    self.fail(id, "assembly returned OK without a transaction").await;
                    return;
                };
                if response.attestation_plan.is_empty() {
                    self.fail(id, "assembly returned an empty attestation plan").await;
                    return;
                }

                let outputs = match ctx.upsert_states(&assembled.output_states).await {
                    Ok(outputs) => {
                        self.storage_failures = 0;
                        outputs
                    }
                    Err(e) => {
                        self.storage_error(id, e).await;
                        return;
                    }
                };
                let input_ids: Vec<_> = assembled.input_states.iter().map(|s| s.id).collect();
                if let Err(e) = ctx.lock_states(&input_ids).await {
                    match e {
                        StateStoreError::Locked(state) => {
                            // Lost a selection race; re-assemble with a
                            // fresh view of available states
                            debug!(
                                contract = %self.contract,
                                transaction = %id,
                                state = %state,
                                "Input lock contention, re-assembling"
                            );
                            self.retry_or_fail(id, "input state lock contention").await;
                        }
                        other => self.storage_error(id, other).await,
                    }
                    return;
                }

                let output_ids: Vec<_> = outputs.iter().map(|s| s.id).collect();
                if let Some(f) = self.in_flight.get_mut(&id) {
                    f.tx.post_assembly = Some(shared_types::PostAssembly {
                        input_states: assembled.input_states.clone(),
                        output_states_potential: assembled.output_states,
                        output_states: outputs,
                        attestation_plan: response.attestation_plan,
                        attestation_results: Vec::new(),
                    });
                    f.stage = TxStage::AssemblyDone;
                }
                self.set_stage(id, TxStage::AssemblyDone);
                self.sequencer
                    .mark_assembled(id, &assembled.input_states, &output_ids);
                self.bus
                    .publish(CoreEvent::TransactionAssembled {
                        contract: self.contract,
                        transaction_id: id,
                    })
                    .await;
                self.schedule(id);
            }
        }
    }

    // =========================================================================
    // STAGE: ATTESTATION
    // =========================================================================

    async fn gather_attestations(&mut self, id: Uuid) {
        let Some(spec) = self.spec_for(id) else {
            return;
        };
        let Some(post) = self
            .in_flight
            .get(&id)
            .and_then(|f| f.tx.post_assembly.as_ref())
            .cloned()
        else {
            self.fail(id, "post-assembly missing at attestation stage").await;
            return;
        };
        let Some(verifiers) = self
            .in_flight
            .get(&id)
            .and_then(|f| f.tx.pre_assembly.as_ref())
            .map(|p| p.verifiers.clone())
        else {
            return;
        };

        let inputs = match self.endorsable_inputs(&post).await {
            Ok(inputs) => inputs,
            Err(e) => {
                self.storage_error(id, e).await;
                return;
            }
        };
        let outputs = endorsable_outputs(&post.output_states);

        let outstanding: Vec<_> = post
            .outstanding_attestations()
            .into_iter()
            .map(|(req, party)| (req.clone(), party.to_string()))
            .collect();
        let mut any_pending = false;
        for (request, party) in outstanding {
            // Results gathered earlier in this pass (e.g. the sender's
            // signature) ride along with later requests in plan order
            let signatures = self
                .in_flight
                .get(&id)
                .and_then(|f| f.tx.post_assembly.as_ref())
                .map(|p| p.attestation_results.clone())
                .unwrap_or_default();
            let outcome = self
                .gatherer
                .gather(
                    &spec,
                    &verifiers,
                    &signatures,
                    &inputs,
                    &outputs,
                    &party,
                    &request,
                )
                .await;
            match outcome {
                Ok(GatherOutcome::Attested { result, signer }) => {
                    if let Some(f) = self.in_flight.get_mut(&id) {
                        if let Some(post) = f.tx.post_assembly.as_mut() {
                            post.attestation_results.push(result);
                        }
                        if signer.is_some() {
                            f.signer = signer;
                        }
                    }
                    self.bus
                        .publish(CoreEvent::TransactionEndorsed {
                            contract: self.contract,
                            transaction_id: id,
                            attestation_name: request.name.clone(),
                            party: party.clone(),
                        })
                        .await;
                }
                Ok(GatherOutcome::Reverted { reason }) => {
                    self.revert(id, reason).await;
                    return;
                }
                Ok(GatherOutcome::Pending) => {
                    any_pending = true;
                }
                Err(e) => {
                    // Left outstanding; the attestation deadline drives the
                    // bounded retry
                    warn!(
                        contract = %self.contract,
                        transaction = %id,
                        attestation = %request.name,
                        party = %party,
                        error = %e,
                        "Attestation gather failed, will retry"
                    );
                    any_pending = true;
                }
            }
        }

        self.check_attestation_complete(id, any_pending).await;
    }

    async fn check_attestation_complete(&mut self, id: Uuid, any_pending: bool) {
        let complete = self
            .in_flight
            .get(&id)
            .and_then(|f| f.tx.post_assembly.as_ref())
            .is_some_and(|p| p.attestation_complete());
        if complete {
            if let Some(f) = self.in_flight.get_mut(&id) {
                f.stage = TxStage::AttestationComplete;
                f.attestation_deadline = None;
            }
            self.set_stage(id, TxStage::AttestationComplete);
            self.sequencer.mark_endorsed(id);
            self.schedule(id);
        } else if any_pending {
            let deadline = Instant::now() + self.config.attestation_timeout;
            if let Some(f) = self.in_flight.get_mut(&id) {
                f.attestation_deadline = Some(deadline);
            }
        }
    }

    async fn attestation_expired(&mut self, id: Uuid) {
        let Some(f) = self.in_flight.get_mut(&id) else {
            return;
        };
        f.attestation_retries += 1;
        f.attestation_deadline = None;
        let retries = f.attestation_retries;
        let budget = self.config.attestation_retries;

        let outstanding: Vec<(String, String)> = f
            .tx
            .post_assembly
            .as_ref()
            .map(|p| {
                p.outstanding_attestations()
                    .into_iter()
                    .map(|(req, party)| (req.name.clone(), party.to_string()))
                    .collect()
            })
            .unwrap_or_default();
        for (name, party) in &outstanding {
            self.gatherer.abandon(id, name, party);
        }

        if retries > budget {
            self.fail(
                id,
                format!("attestation timed out after {retries} attempts"),
            )
            .await;
        } else {
            warn!(
                contract = %self.contract,
                transaction = %id,
                attempt = retries,
                "Attestation timed out, re-issuing requests"
            );
            self.schedule(id);
        }
    }

    async fn endorsement_received(&mut self, update: EndorsementUpdate) {
        let id = update.transaction_id;
        if !self.in_flight.contains_key(&id) {
            debug!(
                contract = %self.contract,
                transaction = %id,
                "Endorsement for unknown transaction dropped"
            );
            return;
        }
        if let Some(reason) = update.revert_reason {
            self.revert(id, reason).await;
            return;
        }
        let Some(endorsement) = update.endorsement else {
            debug!(transaction = %id, "Endorsement response carried no result, dropped");
            return;
        };

        let accepted = {
            let Some(f) = self.in_flight.get_mut(&id) else {
                return;
            };
            let Some(post) = f.tx.post_assembly.as_mut() else {
                return;
            };
            let satisfies_outstanding = post
                .outstanding_attestations()
                .iter()
                .any(|(req, party)| endorsement.satisfies(req, party));
            if satisfies_outstanding {
                post.attestation_results.push(endorsement);
                if update.signer.is_some() {
                    f.signer = update.signer.clone();
                }
            }
            satisfies_outstanding
        };
        if !accepted {
            debug!(
                transaction = %id,
                attestation = %update.attestation_name,
                "Endorsement does not match an outstanding plan entry, dropped"
            );
            return;
        }
        self.bus
            .publish(CoreEvent::TransactionEndorsed {
                contract: self.contract,
                transaction_id: id,
                attestation_name: update.attestation_name,
                party: update.party,
            })
            .await;
        self.check_attestation_complete(id, false).await;
    }

    // =========================================================================
    // STAGE: DISPATCH
    // =========================================================================

    async fn try_dispatch(&mut self, id: Uuid) {
        if !self.sequencer.can_dispatch(id) {
            return;
        }
        let Some(spec) = self.spec_for(id) else {
            return;
        };
        let Some(post) = self
            .in_flight
            .get(&id)
            .and_then(|f| f.tx.post_assembly.as_ref())
            .cloned()
        else {
            return;
        };

        let inputs = match self.endorsable_inputs(&post).await {
            Ok(inputs) => inputs,
            Err(e) => {
                self.storage_error(id, e).await;
                return;
            }
        };
        let prepared = self
            .instance
            .domain
            .plugin
            .prepare_transaction(PrepareTransactionRequest {
                transaction: spec,
                input_states: inputs,
                output_states: endorsable_outputs(&post.output_states),
                attestation_results: post.attestation_results.clone(),
            })
            .await;
        let prepared = match prepared {
            Ok(prepared) => prepared,
            Err(reason) => {
                self.revert(id, reason).await;
                return;
            }
        };

        let signer = self.in_flight.get(&id).and_then(|f| f.signer.clone());
        let submit_mode = self.instance.domain.submit_mode().cloned();
        let signer = match signer {
            Some(signer) => signer,
            None => match submit_mode {
                Ok(SubmitMode::OneTimeUseKeys { prefix }) => format!("{prefix}{id}"),
                Ok(SubmitMode::EndorserSubmission) => {
                    self.fail(id, "no submission signer supplied by endorser").await;
                    return;
                }
                Err(e) => {
                    self.fail(id, e.to_string()).await;
                    return;
                }
            },
        };

        let submitted = tokio::time::timeout(
            self.config.dispatch_timeout,
            self.submitter.submit(&signer, &prepared.transaction),
        )
        .await;
        match submitted {
            Err(_) => {
                self.retry_or_fail(id, "base-ledger submission timed out").await;
            }
            Ok(Err(e)) if e.kind().retryable() => {
                self.retry_or_fail(id, e.message().to_string()).await;
            }
            Ok(Err(e)) => {
                self.fail(id, e.message().to_string()).await;
            }
            Ok(Ok(tx_hash)) => {
                debug!(
                    contract = %self.contract,
                    transaction = %id,
                    tx_hash = %tx_hash,
                    signer = %signer,
                    "Dispatch submitted"
                );
                // Outputs become visible to dependent assemblies; inputs
                // stay locked until the spend confirms
                let output_ids: Vec<_> = post.output_states.iter().map(|s| s.id).collect();
                if let Err(e) = self
                    .state_store
                    .release_states(self.contract, id, &output_ids)
                    .await
                {
                    warn!(transaction = %id, error = %e, "Output release failed");
                }
                if let Some(f) = self.in_flight.get_mut(&id) {
                    f.tx.dispatch = Some(Dispatch {
                        transaction: prepared.transaction,
                        signer,
                    });
                    f.stage = TxStage::DispatchSubmitted;
                    f.stage_retries = 0;
                }
                self.set_stage(id, TxStage::DispatchSubmitted);
                self.bus
                    .publish(CoreEvent::TransactionDispatched {
                        contract: self.contract,
                        transaction_id: id,
                    })
                    .await;
                for woken in self.sequencer.mark_dispatched(id) {
                    self.schedule(woken);
                }
                self.wake_parked();
            }
        }
    }

    // =========================================================================
    // COMPLETION & TERMINALS
    // =========================================================================

    async fn confirmation_received(
        &mut self,
        id: Uuid,
        location: shared_types::OnChainLocation,
    ) {
        {
            let Some(f) = self.in_flight.get_mut(&id) else {
                debug!(
                    contract = %self.contract,
                    transaction = %id,
                    "Confirmation for transaction not in flight, dropped"
                );
                return;
            };
            f.tx.completion = Some(shared_types::Completion { location });
            f.stage = TxStage::Confirmed;
        }
        self.set_stage(id, TxStage::Confirmed);
        info!(contract = %self.contract, transaction = %id, "Transaction confirmed");

        for woken in self.sequencer.mark_confirmed(id) {
            self.schedule(woken);
        }
        self.in_flight.remove(&id);
        self.wake_parked();
        self.admit_overflow();
    }

    async fn revert(&mut self, id: Uuid, reason: String) {
        info!(contract = %self.contract, transaction = %id, reason = %reason, "Transaction reverted");
        self.finalize(
            id,
            TxStage::Reverted {
                reason: reason.clone(),
            },
        )
        .await;
        self.bus
            .publish(CoreEvent::TransactionReverted {
                contract: self.contract,
                transaction_id: id,
                reason,
            })
            .await;
    }

    async fn fail(&mut self, id: Uuid, reason: impl Into<String>) {
        let reason = reason.into();
        warn!(contract = %self.contract, transaction = %id, reason = %reason, "Transaction failed");
        self.finalize(
            id,
            TxStage::Failed {
                reason: reason.clone(),
            },
        )
        .await;
        self.bus
            .publish(CoreEvent::TransactionFailed {
                contract: self.contract,
                transaction_id: id,
                reason,
            })
            .await;
    }

    async fn finalize(&mut self, id: Uuid, stage: TxStage) {
        let reason = match &stage {
            TxStage::Reverted { reason } | TxStage::Failed { reason } => reason.clone(),
            _ => String::new(),
        };
        self.set_stage(id, stage.clone());
        if let Some(f) = self.in_flight.get_mut(&id) {
            f.stage = stage;
        }

        // Input locks are returned to the pool; output locks are kept so the
        // dead transaction's unconfirmed outputs never become selectable
        let input_ids: Vec<_> = self
            .in_flight
            .get(&id)
            .and_then(|f| f.tx.post_assembly.as_ref())
            .map(|p| p.input_states.iter().map(|s| s.id).collect())
            .unwrap_or_default();
        if !input_ids.is_empty() {
            if let Err(e) = self.state_store.release_states(self.contract, id, &input_ids).await {
                warn!(transaction = %id, error = %e, "Input release failed");
            }
        }

        match self
            .receipts
            .write_receipt(Receipt::failed(id, reason))
            .await
        {
            Ok(_) => self.storage_failures = 0,
            Err(e) => {
                warn!(transaction = %id, error = %e, "Receipt write failed");
                self.count_storage_failure();
            }
        }

        let dependents = self.sequencer.mark_failed(id);
        for dependent in dependents {
            let dep_inputs: Vec<_> = match self.in_flight.get_mut(&dependent) {
                Some(f) => {
                    let inputs = f
                        .tx
                        .post_assembly
                        .as_ref()
                        .map(|p| p.input_states.iter().map(|s| s.id).collect())
                        .unwrap_or_default();
                    f.reset_for_reassembly();
                    inputs
                }
                None => continue,
            };
            self.set_stage(dependent, TxStage::PreAssemblyDone);
            if !dep_inputs.is_empty() {
                if let Err(e) = self
                    .state_store
                    .release_states(self.contract, dependent, &dep_inputs)
                    .await
                {
                    warn!(transaction = %dependent, error = %e, "Dependent input release failed");
                }
            }
            self.schedule(dependent);
        }

        self.in_flight.remove(&id);
        self.admit_overflow();
    }

    // =========================================================================
    // HELPERS
    // =========================================================================

    async fn retry_or_fail(&mut self, id: Uuid, reason: impl Into<String>) {
        let reason = reason.into();
        let Some(f) = self.in_flight.get_mut(&id) else {
            return;
        };
        f.stage_retries += 1;
        if f.stage_retries > self.config.stage_retries {
            self.fail(id, format!("{reason} (retries exhausted)")).await;
        } else {
            debug!(
                contract = %self.contract,
                transaction = %id,
                attempt = self.in_flight.get(&id).map(|f| f.stage_retries).unwrap_or(0),
                reason = %reason,
                "Stage retrying"
            );
            // The evaluation tick re-schedules the stage
        }
    }

    async fn storage_error(&mut self, id: Uuid, error: StateStoreError) {
        if matches!(error, StateStoreError::Unavailable(_)) {
            self.count_storage_failure();
            self.retry_or_fail(id, error.to_string()).await;
        } else {
            self.fail(id, error.to_string()).await;
        }
    }

    fn count_storage_failure(&mut self) {
        self.storage_failures += 1;
        if self.storage_failures >= self.config.storage_failure_limit {
            warn!(
                contract = %self.contract,
                failures = self.storage_failures,
                "Repeated storage failures, quarantining orchestrator"
            );
            self.quarantined_until = Some(Instant::now() + self.config.quarantine_cooldown);
            self.storage_failures = 0;
        }
    }

    fn spec_for(&self, id: Uuid) -> Option<TransactionSpec> {
        self.in_flight.get(&id).map(|f| TransactionSpec {
            transaction_id: id,
            contract_address: self.contract,
            contract_config_json: self.instance.config_json.clone(),
            function_abi_json: f.tx.inputs.function_abi_json.clone(),
            function_params_json: f.tx.inputs.params_json.clone(),
            from: f.tx.inputs.from.clone(),
        })
    }

    async fn endorsable_inputs(
        &self,
        post: &shared_types::PostAssembly,
    ) -> Result<Vec<EndorsableState>, StateStoreError> {
        let ids: Vec<_> = post.input_states.iter().map(|s| s.id).collect();
        if ids.is_empty() {
            return Ok(Vec::new());
        }
        let states = self.state_store.get_states(self.contract, &ids).await?;
        Ok(states.iter().map(endorsable).collect())
    }

    fn set_stage(&self, id: Uuid, stage: TxStage) {
        if let Ok(mut status) = self.status.lock() {
            status.insert(id, stage);
        }
    }
}

fn endorsable(state: &State) -> EndorsableState {
    EndorsableState {
        id: state.id,
        schema_id: state.schema_id,
        data_json: state.data_json.clone(),
    }
}

fn endorsable_outputs(outputs: &[State]) -> Vec<EndorsableState> {
    outputs.iter().map(endorsable).collect()
}
