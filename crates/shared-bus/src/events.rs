//! # Lifecycle Events
//!
//! Events published by the engine, orchestrators, and the event reconciler
//! as transactions move through their stages. Terminal events (confirmed,
//! reverted, failed) are always published; intermediate events are
//! informational.

use serde::{Deserialize, Serialize};
use shared_types::{EthAddress, OnChainLocation};
use uuid::Uuid;

/// Coarse routing topic for an event.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
pub enum EventTopic {
    /// Private transaction lifecycle.
    Transaction,
    /// Contract deployment lifecycle.
    Deploy,
}

/// All events that can be published to the bus.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub enum CoreEvent {
    /// A transaction was accepted and queued on its contract's orchestrator.
    TransactionQueued {
        /// Contract instance address.
        contract: EthAddress,
        /// Transaction identity.
        transaction_id: Uuid,
    },

    /// Assembly produced input/output states and an attestation plan.
    TransactionAssembled {
        /// Contract instance address.
        contract: EthAddress,
        /// Transaction identity.
        transaction_id: Uuid,
    },

    /// One attestation result was attached to the transaction.
    TransactionEndorsed {
        /// Contract instance address.
        contract: EthAddress,
        /// Transaction identity.
        transaction_id: Uuid,
        /// Attestation-plan entry name.
        attestation_name: String,
        /// The attesting party's lookup.
        party: String,
    },

    /// The prepared base-ledger call was accepted for submission.
    TransactionDispatched {
        /// Contract instance address.
        contract: EthAddress,
        /// Transaction identity.
        transaction_id: Uuid,
    },

    /// The confirming on-ledger event was reconciled.
    TransactionConfirmed {
        /// Contract instance address.
        contract: EthAddress,
        /// Transaction identity.
        transaction_id: Uuid,
        /// Where the confirming event landed.
        location: OnChainLocation,
    },

    /// The domain reverted the transaction (terminal).
    TransactionReverted {
        /// Contract instance address.
        contract: EthAddress,
        /// Transaction identity.
        transaction_id: Uuid,
        /// Domain-supplied revert reason.
        reason: String,
    },

    /// The transaction exhausted its retry budget or hit a fatal error
    /// (terminal).
    TransactionFailed {
        /// Contract instance address.
        contract: EthAddress,
        /// Transaction identity.
        transaction_id: Uuid,
        /// One-line failure message.
        reason: String,
    },

    /// A contract instance finished deploying.
    ContractDeployed {
        /// Domain the instance belongs to.
        domain: String,
        /// The new contract address.
        contract: EthAddress,
        /// Deployment transaction identity.
        transaction_id: Uuid,
    },
}

impl CoreEvent {
    /// The routing topic for this event.
    pub fn topic(&self) -> EventTopic {
        match self {
            Self::ContractDeployed { .. } => EventTopic::Deploy,
            _ => EventTopic::Transaction,
        }
    }

    /// The contract address the event belongs to.
    pub fn contract(&self) -> EthAddress {
        match self {
            Self::TransactionQueued { contract, .. }
            | Self::TransactionAssembled { contract, .. }
            | Self::TransactionEndorsed { contract, .. }
            | Self::TransactionDispatched { contract, .. }
            | Self::TransactionConfirmed { contract, .. }
            | Self::TransactionReverted { contract, .. }
            | Self::TransactionFailed { contract, .. }
            | Self::ContractDeployed { contract, .. } => *contract,
        }
    }

    /// The transaction the event belongs to.
    pub fn transaction_id(&self) -> Uuid {
        match self {
            Self::TransactionQueued { transaction_id, .. }
            | Self::TransactionAssembled { transaction_id, .. }
            | Self::TransactionEndorsed { transaction_id, .. }
            | Self::TransactionDispatched { transaction_id, .. }
            | Self::TransactionConfirmed { transaction_id, .. }
            | Self::TransactionReverted { transaction_id, .. }
            | Self::TransactionFailed { transaction_id, .. }
            | Self::ContractDeployed { transaction_id, .. } => *transaction_id,
        }
    }

    /// True for CONFIRMED / REVERTED / FAILED outcomes.
    pub fn is_terminal(&self) -> bool {
        matches!(
            self,
            Self::TransactionConfirmed { .. }
                | Self::TransactionReverted { .. }
                | Self::TransactionFailed { .. }
        )
    }
}

/// Subscription filter over topics and contract address.
#[derive(Debug, Clone, Default)]
pub struct EventFilter {
    /// Topics to receive; empty means all topics.
    pub topics: Vec<EventTopic>,
    /// Restrict to one contract instance, if set.
    pub contract: Option<EthAddress>,
}

impl EventFilter {
    /// Receive every event.
    pub fn all() -> Self {
        Self::default()
    }

    /// Receive only the given topics.
    pub fn topics(topics: Vec<EventTopic>) -> Self {
        Self {
            topics,
            contract: None,
        }
    }

    /// Receive only events for one contract instance.
    pub fn contract(contract: EthAddress) -> Self {
        Self {
            topics: Vec::new(),
            contract: Some(contract),
        }
    }

    /// Whether an event passes this filter.
    pub fn matches(&self, event: &CoreEvent) -> bool {
        if !self.topics.is_empty() && !self.topics.contains(&event.topic()) {
            return false;
        }
        match self.contract {
            Some(contract) => event.contract() == contract,
            None => true,
        }
    }
}
