//! Outbound ports of the orchestrator.

use async_trait::async_trait;
use shared_types::{BaseLedgerTransaction, Bytes32, PtocError};

/// Seam to the public-transaction loop that carries prepared calls onto the
/// base ledger.
///
/// `submit` returns once the loop has accepted the transaction and assigned
/// it a hash; acceptance is backpressured, may be slow, and the eventual
/// confirmation arrives through the block indexer, never through this call.
#[async_trait]
pub trait DispatchSubmitter: Send + Sync {
    /// Submits a prepared base-ledger call under the given signing key.
    async fn submit(
        &self,
        signer: &str,
        transaction: &BaseLedgerTransaction,
    ) -> Result<Bytes32, PtocError>;
}
