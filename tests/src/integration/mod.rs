//! Cross-component end-to-end scenarios.

mod scenarios;
mod two_node;
