//! Events consumed by an orchestrator's select loop.

use pd_05_endorsement::EndorsementUpdate;
use shared_types::{OnChainLocation, PrivateTransaction};
use uuid::Uuid;

/// One event on an orchestrator's channel.
#[derive(Debug)]
pub enum OrchestratorEvent {
    /// A new transaction, verifiers already resolved by the engine.
    NewTransaction(Box<PrivateTransaction>),
    /// A cross-node endorsement response was correlated by the gatherer.
    EndorsementReceived(EndorsementUpdate),
    /// The event reconciler confirmed the transaction on-ledger.
    ConfirmationReceived {
        /// The confirmed transaction.
        transaction_id: Uuid,
        /// Where the confirming event landed.
        location: OnChainLocation,
    },
}
