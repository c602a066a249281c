//! Outbound ports of the engine.

use async_trait::async_trait;
use shared_types::{BaseLedgerTransaction, Bytes32, EthAddress, EthDeployTransaction, PtocError};
use uuid::Uuid;

/// A contract instance observed on the base ledger after deployment.
#[derive(Clone, Debug, PartialEq, Eq)]
pub struct DeployedContract {
    /// The new instance address.
    pub address: EthAddress,
    /// Instance configuration captured from the factory event, handed to
    /// every subsequent plugin call for this instance.
    pub config_json: String,
}

/// Base-ledger client seam used by the synchronous deploy flow.
///
/// Signs and submits raw transactions and waits for inclusion; the block
/// indexer behind `wait_for_deploy` correlates the factory event by the
/// deployment's transaction ID.
#[async_trait]
pub trait BaseLedgerClient: Send + Sync {
    /// Signs and submits a contract-creation transaction.
    async fn send_deploy(
        &self,
        signer: &str,
        deploy: &EthDeployTransaction,
    ) -> Result<Bytes32, PtocError>;

    /// Signs and submits a function invocation (e.g. a factory
    /// `newInstance` call).
    async fn send_transaction(
        &self,
        signer: &str,
        transaction: &BaseLedgerTransaction,
    ) -> Result<Bytes32, PtocError>;

    /// Waits for the deployment's confirmation event and returns the new
    /// instance.
    async fn wait_for_deploy(&self, deploy_id: Uuid) -> Result<DeployedContract, PtocError>;
}
