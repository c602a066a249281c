//! Receipt-store port.
//!
//! Terminal outcomes are written exactly once per transaction; the first
//! write wins and later writes report `false` so replayed confirmations and
//! late timeouts cannot double-finalize a transaction.

use crate::domain::errors::StateStoreError;
use async_trait::async_trait;
use shared_types::Receipt;
use uuid::Uuid;

/// The receipt-table seam of the persistence layer.
#[async_trait]
pub trait ReceiptStore: Send + Sync {
    /// Writes a terminal receipt. Returns `true` when newly written, `false`
    /// when a receipt for the transaction already exists (the write is a
    /// no-op).
    async fn write_receipt(&self, receipt: Receipt) -> Result<bool, StateStoreError>;

    /// Fetches the receipt for a transaction, if one exists.
    async fn get_receipt(&self, transaction_id: Uuid) -> Result<Option<Receipt>, StateStoreError>;
}
