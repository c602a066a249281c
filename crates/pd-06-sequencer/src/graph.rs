//! # Dependency Graph
//!
//! Tracks which transaction produced each provisional state and which
//! transactions consume it, and answers "may this transaction dispatch yet".

use shared_types::{Bytes32, EthAddress, StateRef};
use std::collections::{HashMap, HashSet, VecDeque};
use tracing::debug;
use uuid::Uuid;

/// When a producer's outputs become consumable by dependents.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub enum VisibilityPolicy {
    /// Outputs are consumable once the producer is endorsed and dispatched.
    EndorsedVisible,
    /// Outputs are consumable only after on-ledger confirmation.
    ConfirmedVisible,
}

/// Producer progress relevant to dependency gating.
#[derive(Clone, Copy, Debug, PartialEq, Eq, PartialOrd, Ord)]
pub enum TxProgress {
    /// Assembled; outputs exist but are not consumable.
    Assembled,
    /// Every attestation in the plan is satisfied.
    Endorsed,
    /// Accepted by the base-ledger submitter.
    Dispatched,
    /// Confirmed on-ledger; outputs are no longer provisional.
    Confirmed,
}

/// Per-contract sequencer state.
pub struct Sequencer {
    contract: EthAddress,
    policy: VisibilityPolicy,
    /// Provisional output state → producing transaction.
    produced: HashMap<Bytes32, Uuid>,
    /// Producer progress for gating decisions.
    progress: HashMap<Uuid, TxProgress>,
    /// Consumer → producers it waits on.
    waits_on: HashMap<Uuid, HashSet<Uuid>>,
    /// Producer → consumers waiting on it.
    dependents: HashMap<Uuid, HashSet<Uuid>>,
    /// Parked transactions awaiting an assembly wake-up, FIFO.
    parked: VecDeque<Uuid>,
}

impl Sequencer {
    /// Creates a sequencer with the default endorsed-visible policy.
    pub fn new(contract: EthAddress) -> Self {
        Self::with_policy(contract, VisibilityPolicy::EndorsedVisible)
    }

    /// Creates a sequencer with an explicit visibility policy.
    pub fn with_policy(contract: EthAddress, policy: VisibilityPolicy) -> Self {
        Self {
            contract,
            policy,
            produced: HashMap::new(),
            progress: HashMap::new(),
            waits_on: HashMap::new(),
            dependents: HashMap::new(),
            parked: VecDeque::new(),
        }
    }

    /// The contract this sequencer orders.
    pub fn contract(&self) -> EthAddress {
        self.contract
    }

    /// Registers an assembled transaction: its outputs become provisional
    /// productions, and its inputs create edges to any in-flight producers.
    pub fn mark_assembled(
        &mut self,
        tx_id: Uuid,
        input_states: &[StateRef],
        output_states: &[Bytes32],
    ) {
        self.progress.insert(tx_id, TxProgress::Assembled);
        for output in output_states {
            self.produced.insert(*output, tx_id);
        }
        for input in input_states {
            let Some(&producer) = self.produced.get(&input.id) else {
                continue;
            };
            if producer == tx_id {
                continue;
            }
            if self.satisfies_policy(producer) && self.policy_is_final(producer) {
                continue;
            }
            self.waits_on.entry(tx_id).or_default().insert(producer);
            self.dependents.entry(producer).or_default().insert(tx_id);
            debug!(
                contract = %self.contract,
                consumer = %tx_id,
                producer = %producer,
                state = %input.id,
                "State dependency recorded"
            );
        }
    }

    /// Whether a transaction's producers have all reached the visibility
    /// threshold, making it eligible for dispatch.
    pub fn can_dispatch(&self, tx_id: Uuid) -> bool {
        match self.waits_on.get(&tx_id) {
            None => true,
            Some(producers) => producers.iter().all(|p| self.satisfies_policy(*p)),
        }
    }

    /// Records endorsement completion.
    pub fn mark_endorsed(&mut self, tx_id: Uuid) {
        self.progress.insert(tx_id, TxProgress::Endorsed);
    }

    /// Records base-ledger dispatch; returns consumers that just became
    /// dispatchable under the policy.
    pub fn mark_dispatched(&mut self, tx_id: Uuid) -> Vec<Uuid> {
        self.progress.insert(tx_id, TxProgress::Dispatched);
        self.newly_dispatchable(tx_id)
    }

    /// Records on-ledger confirmation; the outputs stop being provisional
    /// and all graph state for the transaction is dropped. Returns consumers
    /// that just became dispatchable.
    pub fn mark_confirmed(&mut self, tx_id: Uuid) -> Vec<Uuid> {
        self.progress.insert(tx_id, TxProgress::Confirmed);
        let woken = self.newly_dispatchable(tx_id);
        self.detach_producer(tx_id);
        self.progress.remove(&tx_id);
        woken
    }

    /// Records producer failure or revert; every transitive dependent is
    /// invalidated and must re-assemble. Returns the invalidated set in
    /// FIFO discovery order.
    pub fn mark_failed(&mut self, tx_id: Uuid) -> Vec<Uuid> {
        let mut invalidated = Vec::new();
        let mut queue: VecDeque<Uuid> = VecDeque::new();
        queue.push_back(tx_id);
        let mut seen: HashSet<Uuid> = HashSet::new();
        seen.insert(tx_id);

        while let Some(failed) = queue.pop_front() {
            if let Some(consumers) = self.dependents.remove(&failed) {
                for consumer in consumers {
                    if seen.insert(consumer) {
                        invalidated.push(consumer);
                        queue.push_back(consumer);
                    }
                }
            }
            // Drop the failed producer's outputs and progress
            self.produced.retain(|_, producer| *producer != failed);
            self.progress.remove(&failed);
            self.waits_on.remove(&failed);
        }
        if !invalidated.is_empty() {
            debug!(
                contract = %self.contract,
                failed = %tx_id,
                dependents = invalidated.len(),
                "Producer failed, dependents invalidated"
            );
        }
        invalidated
    }

    /// Parks a transaction whose assembly returned PARK.
    pub fn park(&mut self, tx_id: Uuid) {
        if !self.parked.contains(&tx_id) {
            self.parked.push_back(tx_id);
        }
    }

    /// Drains parked transactions for re-assembly, FIFO. Called whenever new
    /// states may have become available.
    pub fn wake_parked(&mut self) -> Vec<Uuid> {
        self.parked.drain(..).collect()
    }

    /// Number of parked transactions.
    pub fn parked_count(&self) -> usize {
        self.parked.len()
    }

    /// Whether a transaction is parked awaiting a wake-up.
    pub fn is_parked(&self, tx_id: Uuid) -> bool {
        self.parked.contains(&tx_id)
    }

    fn satisfies_policy(&self, producer: Uuid) -> bool {
        let progress = self.progress.get(&producer).copied();
        match self.policy {
            VisibilityPolicy::EndorsedVisible => {
                // A producer absent from the map has confirmed and been
                // cleaned up; its outputs are final.
                progress.map_or(true, |p| p >= TxProgress::Dispatched)
            }
            VisibilityPolicy::ConfirmedVisible => {
                progress.map_or(true, |p| p >= TxProgress::Confirmed)
            }
        }
    }

    fn policy_is_final(&self, producer: Uuid) -> bool {
        // Only a fully confirmed (cleaned-up) producer needs no edge at all;
        // a dispatched-but-unconfirmed producer can still fail and must keep
        // its dependents reachable for invalidation.
        !self.progress.contains_key(&producer)
    }

    fn newly_dispatchable(&mut self, producer: Uuid) -> Vec<Uuid> {
        let Some(consumers) = self.dependents.get(&producer) else {
            return Vec::new();
        };
        let candidates: Vec<Uuid> = consumers.iter().copied().collect();
        candidates
            .into_iter()
            .filter(|consumer| self.can_dispatch(*consumer))
            .collect()
    }

    fn detach_producer(&mut self, tx_id: Uuid) {
        self.produced.retain(|_, producer| *producer != tx_id);
        if let Some(consumers) = self.dependents.remove(&tx_id) {
            for consumer in consumers {
                if let Some(producers) = self.waits_on.get_mut(&consumer) {
                    producers.remove(&tx_id);
                    if producers.is_empty() {
                        self.waits_on.remove(&consumer);
                    }
                }
            }
        }
        self.waits_on.remove(&tx_id);
    }
}
