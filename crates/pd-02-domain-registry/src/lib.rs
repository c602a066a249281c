//! # Domain Registry
//!
//! Tracks active domain plugins and dispatches the nine plugin operations:
//! Configure / Init / InitDeploy / PrepareDeploy / InitTransaction /
//! Assemble / Endorse / Prepare / HandleEventBatch.
//!
//! ## Lifecycle
//!
//! ```text
//! register(name, plugin)
//!   └─→ ConfigureDomain ──→ ensure schemas in state store ──→ InitDomain
//!          │ error                                               │ error
//!          └─────────────── quarantined (init_error) ←───────────┘
//! ```
//!
//! A quarantined domain stays registered; every subsequent call fails fast
//! with the recorded init error. Re-registering the same name atomically
//! replaces the entry: in-flight calls against the prior handle complete,
//! new calls route to the replacement.
//!
//! ## Deploy preparation
//!
//! `PrepareDeploy` must produce exactly one of a constructor deploy or a
//! factory invoke. The submission signer comes from the plugin, or is
//! synthesized as `<one-time-prefix><txId>` under one-time-use-keys mode;
//! endorser-submission mode requires the plugin to name the signer.

// Allow in tests
#![cfg_attr(test, allow(clippy::unwrap_used))]
#![cfg_attr(test, allow(clippy::expect_used))]

pub mod errors;
pub mod plugin;
pub mod registry;

pub use errors::DomainRegistryError;
pub use plugin::{
    AssembledTransaction, AssembleTransactionRequest, AssembleTransactionResponse, AssemblyResult,
    ConfigureDomainRequest, ConfigureDomainResponse, DeploySpec, DomainConfig, DomainPlugin,
    EndorsableState,
    EndorseResult, EndorseTransactionRequest, EndorseTransactionResponse, HandleEventBatchRequest,
    HandleEventBatchResponse, InitDeployRequest, InitDeployResponse, InitDomainRequest,
    InitTransactionRequest, InitTransactionResponse, LedgerEvent, PrepareDeployRequest,
    PrepareDeployResponse, PrepareTransactionRequest, PrepareTransactionResponse, SchemaInfo,
    SubmitMode, TransactionSpec,
};
pub use registry::{ContractInstance, DomainHandle, DomainRegistry};
