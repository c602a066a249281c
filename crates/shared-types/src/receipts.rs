//! # Receipts
//!
//! Terminal transaction outcomes persisted to the receipt store. A receipt
//! is written exactly once per transaction that reaches a terminal stage,
//! and is the record restart recovery replays from.

use crate::ids::{Bytes32, EthAddress};
use serde::{Deserialize, Serialize};
use uuid::Uuid;

/// Where an event or transaction landed on the base ledger.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct OnChainLocation {
    /// Block number of the confirming transaction.
    pub block_number: u64,
    /// Index of the transaction within the block.
    pub transaction_index: u64,
    /// Index of the event log within the transaction.
    pub log_index: u64,
}

/// The outcome recorded in a receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub enum ReceiptOutcome {
    /// Confirmed on-ledger; carries the base-ledger transaction hash.
    Success {
        /// Hash of the confirming base-ledger transaction.
        tx_hash: Bytes32,
    },
    /// Reverted on-ledger; raw revert data for later decoding.
    FailedOnChainWithRevertData {
        /// ABI-encoded revert payload.
        revert_data: Vec<u8>,
    },
    /// Failed off-chain with a pre-translated message.
    FailedWithMessage {
        /// Human-readable failure message.
        message: String,
    },
}

/// One persisted receipt.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct Receipt {
    /// The private transaction the receipt belongs to.
    pub transaction_id: Uuid,
    /// Terminal outcome.
    pub outcome: ReceiptOutcome,
    /// On-chain location, for on-chain outcomes.
    pub on_chain: Option<OnChainLocation>,
    /// Deployed contract address (deployments only).
    pub contract_address: Option<EthAddress>,
}

impl Receipt {
    /// A success receipt for a confirmed transaction.
    pub fn success(transaction_id: Uuid, tx_hash: Bytes32, location: OnChainLocation) -> Self {
        Self {
            transaction_id,
            outcome: ReceiptOutcome::Success { tx_hash },
            on_chain: Some(location),
            contract_address: None,
        }
    }

    /// A failure receipt with a pre-translated message.
    pub fn failed(transaction_id: Uuid, message: impl Into<String>) -> Self {
        Self {
            transaction_id,
            outcome: ReceiptOutcome::FailedWithMessage {
                message: message.into(),
            },
            on_chain: None,
            contract_address: None,
        }
    }

    /// True for `Success` outcomes.
    pub fn is_success(&self) -> bool {
        matches!(self.outcome, ReceiptOutcome::Success { .. })
    }
}

/// A completed-transaction notice extracted from a confirmed event batch.
#[derive(Clone, Debug, PartialEq, Eq, Serialize, Deserialize)]
pub struct CompletedTransaction {
    /// The private transaction confirmed by the event.
    pub transaction_id: Uuid,
    /// Hash of the confirming base-ledger transaction.
    pub tx_hash: Bytes32,
    /// Where the confirming event landed.
    pub location: OnChainLocation,
}
