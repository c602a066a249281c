//! Per-transaction stage tracking.

use serde::{Deserialize, Serialize};
use shared_types::PrivateTransaction;
use tokio::time::Instant;

/// The stage a transaction has reached.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum TxStage {
    /// Accepted, verifiers not yet attached.
    New,
    /// All required verifiers resolved.
    PreAssemblyDone,
    /// Assembly produced states and a non-empty attestation plan.
    AssemblyDone,
    /// Every attestation in the plan is satisfied.
    AttestationComplete,
    /// The base-ledger submitter accepted the prepared call.
    DispatchSubmitted,
    /// Confirmed on-ledger (terminal).
    Confirmed,
    /// The domain reverted the transaction (terminal).
    Reverted {
        /// Domain-supplied reason.
        reason: String,
    },
    /// Retry budget exhausted or fatal error (terminal).
    Failed {
        /// One-line failure message.
        reason: String,
    },
}

impl TxStage {
    /// True for CONFIRMED / REVERTED / FAILED.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::Confirmed | Self::Reverted { .. } | Self::Failed { .. }
        )
    }
}

/// One in-flight transaction and its bookkeeping.
pub struct InFlight {
    /// The transaction being driven.
    pub tx: PrivateTransaction,
    /// Current stage.
    pub stage: TxStage,
    /// Attestation-stage retry counter.
    pub attestation_retries: u32,
    /// Transient-failure retry counter for the current stage.
    pub stage_retries: u32,
    /// Deadline for outstanding endorsement replies, when any are pending.
    pub attestation_deadline: Option<Instant>,
    /// Submission signer captured from an endorser or synthesized.
    pub signer: Option<String>,
}

impl InFlight {
    /// Wraps an accepted transaction at its initial stage.
    pub fn new(tx: PrivateTransaction) -> Self {
        let stage = match &tx.pre_assembly {
            Some(pre) if pre.verifiers.len() == pre.required_verifiers.len() => {
                TxStage::PreAssemblyDone
            }
            _ => TxStage::New,
        };
        Self {
            tx,
            stage,
            attestation_retries: 0,
            stage_retries: 0,
            attestation_deadline: None,
            signer: None,
        }
    }

    /// Resets assembly products for re-assembly after a dependency
    /// invalidation; retry counters restart.
    pub fn reset_for_reassembly(&mut self) {
        self.tx.post_assembly = None;
        self.tx.dispatch = None;
        self.stage = TxStage::PreAssemblyDone;
        self.attestation_retries = 0;
        self.stage_retries = 0;
        self.attestation_deadline = None;
        self.signer = None;
    }
}
