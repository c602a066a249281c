//! # Endorsement Gatherer
//!
//! Satisfies one attestation-plan entry for one party:
//!
//! - **Local SIGN** — the key manager signs the request payload in-process.
//! - **Local ENDORSE** — the domain's `endorse_transaction` runs in-process;
//!   the result either approves (optionally naming the submitting signer
//!   under endorser-submission mode) or reverts with a reason.
//! - **Remote party** — the request is marshalled to its canonical wire form
//!   and sent to the party's node; a pending entry keyed by
//!   `(transaction, attestation name, party)` awaits the response.
//!
//! Responses are idempotent: the pending entry resolves exactly once, and a
//! duplicate response finds no entry and is dropped. Nothing is persisted;
//! after a restart the orchestrator re-enters the attestation stage and
//! re-issues whatever is still outstanding.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod gatherer;
pub mod wire;

pub use errors::EndorsementError;
pub use gatherer::{EndorsementGatherer, EndorsementUpdate, GatherOutcome};
pub use wire::{party_node, EndorsementRequestMessage, EndorsementResponseMessage};
