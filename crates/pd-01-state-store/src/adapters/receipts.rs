//! In-memory receipt store.

use crate::domain::errors::StateStoreError;
use crate::ports::receipts::ReceiptStore;
use async_trait::async_trait;
use shared_types::Receipt;
use std::collections::HashMap;
use tokio::sync::RwLock;
use tracing::debug;
use uuid::Uuid;

/// In-memory implementation of the receipt-store port.
#[derive(Default)]
pub struct InMemoryReceiptStore {
    receipts: RwLock<HashMap<Uuid, Receipt>>,
}

impl InMemoryReceiptStore {
    /// Creates an empty receipt store.
    pub fn new() -> Self {
        Self::default()
    }

    /// Number of receipts held.
    pub async fn len(&self) -> usize {
        self.receipts.read().await.len()
    }

    /// True when no receipts are held.
    pub async fn is_empty(&self) -> bool {
        self.receipts.read().await.is_empty()
    }
}

#[async_trait]
impl ReceiptStore for InMemoryReceiptStore {
    async fn write_receipt(&self, receipt: Receipt) -> Result<bool, StateStoreError> {
        let mut receipts = self.receipts.write().await;
        if receipts.contains_key(&receipt.transaction_id) {
            debug!(transaction = %receipt.transaction_id, "Receipt already written, ignoring");
            return Ok(false);
        }
        receipts.insert(receipt.transaction_id, receipt);
        Ok(true)
    }

    async fn get_receipt(&self, transaction_id: Uuid) -> Result<Option<Receipt>, StateStoreError> {
        Ok(self.receipts.read().await.get(&transaction_id).cloned())
    }
}
