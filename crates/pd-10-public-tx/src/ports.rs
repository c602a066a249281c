//! Outbound port to the base-ledger signing client.

use async_trait::async_trait;
use shared_types::{BaseLedgerTransaction, Bytes32, OnChainLocation, PtocError};

/// The signing/submission seam to the base-ledger client.
#[async_trait]
pub trait SigningClient: Send + Sync {
    /// The confirmed transaction count for a signer (its next nonce).
    async fn get_transaction_count(&self, signer: &str) -> Result<u64, PtocError>;

    /// Signs and broadcasts one call under an explicit nonce.
    async fn sign_and_send(
        &self,
        signer: &str,
        nonce: u64,
        transaction: &BaseLedgerTransaction,
    ) -> Result<Bytes32, PtocError>;

    /// Inclusion status of a submitted hash; `None` while unconfirmed.
    async fn get_confirmation(
        &self,
        tx_hash: Bytes32,
    ) -> Result<Option<OnChainLocation>, PtocError>;
}
