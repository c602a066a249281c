//! # Orchestration-Core Test Suite
//!
//! Unified test crate containing:
//!
//! ```text
//! tests/src/
//! ├── harness/          # Reusable fixtures
//! │   ├── simple_token.rs  # Notarized UTXO token domain
//! │   ├── key_manager.rs   # secp256k1 in-memory key manager
//! │   ├── network.rs       # Loopback transport + static registry
//! │   └── ledger.rs        # Instant-mining fake base ledger
//! │
//! └── integration/      # End-to-end scenarios across nodes
//! ```
//!
//! ## Running Tests
//!
//! ```bash
//! cargo test -p pd-tests
//! cargo test -p pd-tests integration::
//! ```

pub mod harness;

#[cfg(test)]
mod integration;
