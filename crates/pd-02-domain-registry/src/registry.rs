//! # Registry
//!
//! Holds domain handles by name and contract instances by address, and
//! performs the configure → schema registration → init lifecycle.

use crate::errors::DomainRegistryError;
use crate::plugin::{
    ConfigureDomainRequest, DomainConfig, DomainPlugin, InitDomainRequest, PrepareDeployRequest,
    SchemaInfo, SubmitMode,
};
use pd_01_state_store::StateStore;
use shared_types::{EthAddress, PrivateContractDeploy, StateSchema};
use std::collections::HashMap;
use std::sync::Arc;
use tokio::sync::RwLock;
use tracing::{debug, info, warn};

/// A registered domain: plugin handle plus post-init metadata.
pub struct DomainHandle {
    /// Registered name.
    pub name: String,
    /// The plugin behind this handle.
    pub plugin: Arc<dyn DomainPlugin>,
    /// Configuration returned by `configure_domain`; `None` when init
    /// failed before configuration completed.
    pub config: Option<DomainConfig>,
    /// Schemas registered with the state store.
    pub schemas: Vec<StateSchema>,
    /// Recorded init failure; when set the domain is quarantined.
    pub init_error: Option<String>,
}

impl DomainHandle {
    /// Fails fast with the recorded init error, if any.
    pub fn check_initialized(&self) -> Result<(), DomainRegistryError> {
        match &self.init_error {
            Some(cause) => Err(DomainRegistryError::Quarantined {
                name: self.name.clone(),
                cause: cause.clone(),
            }),
            None => Ok(()),
        }
    }

    /// The domain's submit mode; only valid after successful init.
    pub fn submit_mode(&self) -> Result<&SubmitMode, DomainRegistryError> {
        self.check_initialized()?;
        self.config
            .as_ref()
            .map(|c| &c.submit_mode)
            .ok_or_else(|| DomainRegistryError::Quarantined {
                name: self.name.clone(),
                cause: "domain not configured".to_string(),
            })
    }
}

/// A deployed contract instance bound to its domain.
#[derive(Clone)]
pub struct ContractInstance {
    /// Instance address on the base ledger.
    pub address: EthAddress,
    /// The owning domain handle at registration time.
    pub domain: Arc<DomainHandle>,
    /// Instance configuration JSON handed to plugin calls.
    pub config_json: String,
}

/// The process-wide domain registry, scoped to one engine instance.
pub struct DomainRegistry {
    state_store: Arc<dyn StateStore>,
    chain_id: u64,
    by_name: RwLock<HashMap<String, Arc<DomainHandle>>>,
    by_address: RwLock<HashMap<EthAddress, ContractInstance>>,
}

impl DomainRegistry {
    /// Creates a registry backed by the given state store.
    pub fn new(state_store: Arc<dyn StateStore>, chain_id: u64) -> Self {
        Self {
            state_store,
            chain_id,
            by_name: RwLock::new(HashMap::new()),
            by_address: RwLock::new(HashMap::new()),
        }
    }

    /// Registers (or replaces) a domain plugin and runs its init lifecycle.
    ///
    /// Init failures do not unregister the domain: the handle is stored
    /// quarantined and every subsequent call replays the same error.
    pub async fn register(
        &self,
        name: impl Into<String>,
        config_json: impl Into<String>,
        plugin: Arc<dyn DomainPlugin>,
    ) -> Arc<DomainHandle> {
        let name = name.into();
        let config_json = config_json.into();

        let handle = match self.run_init(&name, &config_json, plugin.clone()).await {
            Ok((config, schemas)) => {
                info!(domain = %name, schemas = schemas.len(), "Domain initialized");
                DomainHandle {
                    name: name.clone(),
                    plugin,
                    config: Some(config),
                    schemas,
                    init_error: None,
                }
            }
            Err(cause) => {
                warn!(domain = %name, error = %cause, "Domain init failed, quarantining");
                DomainHandle {
                    name: name.clone(),
                    plugin,
                    config: None,
                    schemas: Vec::new(),
                    init_error: Some(cause),
                }
            }
        };

        let handle = Arc::new(handle);
        // Atomic replacement: in-flight calls hold the prior Arc and finish
        // against it; new lookups see the replacement.
        self.by_name.write().await.insert(name, handle.clone());
        handle
    }

    async fn run_init(
        &self,
        name: &str,
        config_json: &str,
        plugin: Arc<dyn DomainPlugin>,
    ) -> Result<(DomainConfig, Vec<StateSchema>), String> {
        let configured = plugin
            .configure_domain(ConfigureDomainRequest {
                name: name.to_string(),
                config_json: config_json.to_string(),
                chain_id: self.chain_id,
            })
            .await?;
        let config = configured.domain_config;

        let schemas = self
            .state_store
            .ensure_schemas(&config.abi_state_schemas_json)
            .await
            .map_err(|e| e.to_string())?;

        plugin
            .init_domain(InitDomainRequest {
                abi_state_schemas: schemas
                    .iter()
                    .map(|s| SchemaInfo {
                        id: s.id(),
                        signature: s.signature(),
                    })
                    .collect(),
            })
            .await?;

        Ok((config, schemas))
    }

    /// Looks up a domain by name.
    pub async fn get_by_name(&self, name: &str) -> Result<Arc<DomainHandle>, DomainRegistryError> {
        self.by_name
            .read()
            .await
            .get(name)
            .cloned()
            .ok_or_else(|| DomainRegistryError::NotFound(name.to_string()))
    }

    /// Binds a deployed contract address to its domain.
    pub async fn register_contract(
        &self,
        address: EthAddress,
        domain_name: &str,
        config_json: impl Into<String>,
    ) -> Result<ContractInstance, DomainRegistryError> {
        let domain = self.get_by_name(domain_name).await?;
        domain.check_initialized()?;
        let instance = ContractInstance {
            address,
            domain,
            config_json: config_json.into(),
        };
        self.by_address.write().await.insert(address, instance.clone());
        debug!(contract = %address, domain = %domain_name, "Contract instance registered");
        Ok(instance)
    }

    /// Looks up a contract instance by address.
    ///
    /// The instance's domain handle is refreshed from the name map so a
    /// re-registered plugin receives all subsequent calls for existing
    /// instances.
    pub async fn get_by_address(
        &self,
        address: EthAddress,
    ) -> Result<ContractInstance, DomainRegistryError> {
        let mut instance = self
            .by_address
            .read()
            .await
            .get(&address)
            .cloned()
            .ok_or_else(|| DomainRegistryError::ContractNotFound(address.to_string()))?;
        if let Some(current) = self.by_name.read().await.get(&instance.domain.name) {
            instance.domain = current.clone();
        }
        Ok(instance)
    }

    /// Runs `prepare_deploy` and validates/normalizes the result onto the
    /// deploy record.
    ///
    /// Exactly one of `deploy` / `transaction` must be produced. The signer
    /// is taken from the plugin, or synthesized as `<prefix><txId>` under
    /// one-time-use-keys mode; endorser-submission mode requires the plugin
    /// to supply it.
    pub async fn prepare_deploy(
        &self,
        handle: &DomainHandle,
        deploy: &mut PrivateContractDeploy,
    ) -> Result<(), DomainRegistryError> {
        handle.check_initialized()?;
        let response = handle
            .plugin
            .prepare_deploy(PrepareDeployRequest {
                transaction: crate::plugin::DeploySpec {
                    transaction_id: deploy.id,
                    constructor_params_json: deploy.constructor_params_json.clone(),
                },
                resolved_verifiers: deploy.verifiers.clone(),
            })
            .await
            .map_err(DomainRegistryError::Plugin)?;

        match (&response.deploy, &response.transaction) {
            (Some(_), None) | (None, Some(_)) => {}
            (None, None) => {
                return Err(DomainRegistryError::DeployPrepare(
                    "neither deploy nor invoke produced".to_string(),
                ))
            }
            (Some(_), Some(_)) => {
                return Err(DomainRegistryError::DeployPrepare(
                    "both deploy and invoke produced".to_string(),
                ))
            }
        }

        let signer = match (response.signer, handle.submit_mode()?) {
            (Some(signer), _) => signer,
            (None, SubmitMode::OneTimeUseKeys { prefix }) => {
                format!("{}{}", prefix, deploy.id)
            }
            (None, SubmitMode::EndorserSubmission) => {
                return Err(DomainRegistryError::DeployPrepare(
                    "endorser-submission deploy requires a signer".to_string(),
                ))
            }
        };

        deploy.deploy_transaction = response.deploy;
        deploy.invoke_transaction = response.transaction;
        deploy.signer = Some(signer);
        Ok(())
    }
}
