//! # State-Store Adapter
//!
//! Schema-typed UTXO state records per contract, with a JSON query language
//! over indexed labels and in-flight locking for coin selection.
//!
//! ## Domain Invariants
//!
//! | Invariant | Enforcement |
//! |-----------|-------------|
//! | A state is locked by at most one in-flight transaction | `domain/store.rs` - `lock_states()` |
//! | New → Confirmed → Spent is monotonic | `domain/store.rs` - `mark_confirmed()`/`mark_spent()` |
//! | Duplicate upserts are idempotent | content-addressed IDs in `upsert_states()` |
//! | Queries never see spent states or foreign locks | `domain/store.rs` - availability filter |
//!
//! ## Query Language
//!
//! `eq, neq, lt, lte, gt, gte, in, nin, like, null` over schema-declared
//! indexed labels plus the pseudo-field `.created`, with `sort` and `limit`.
//! `like` is valid only for string-typed labels.
//!
//! ## Module Structure
//!
//! ```text
//! ports/    - StateStore + ReceiptStore traits, DomainContext handle
//! domain/   - query model, matcher, in-memory record store
//! adapters/ - InMemoryStateStore / InMemoryReceiptStore
//! ```
//!
//! The receipt table rides in this crate because it is the other half of
//! the persistence seam: terminal outcomes are first-write-wins, which is
//! what makes replayed confirmation events idempotent.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod adapters;
pub mod domain;
pub mod ports;

pub use adapters::{InMemoryReceiptStore, InMemoryStateStore};
pub use domain::errors::StateStoreError;
pub use domain::query::QueryJson;
pub use ports::receipts::ReceiptStore;
pub use ports::{DomainContext, StateStore};
