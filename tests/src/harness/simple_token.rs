//! A notarized UTXO token domain.
//!
//! Transfers spend the sender's oldest coins first, produce a change coin
//! and a transfer coin, and require two attestations: the sender's
//! signature over the transition payload and the notary's endorsement. An
//! empty `from` mints; an empty `to` burns.

use async_trait::async_trait;
use pd_01_state_store::DomainContext;
use pd_02_domain_registry::{
    AssembleTransactionRequest, AssembleTransactionResponse, AssembledTransaction, AssemblyResult,
    ConfigureDomainRequest, ConfigureDomainResponse, DomainConfig, DomainPlugin,
    EndorsableState, EndorseResult, EndorseTransactionRequest, EndorseTransactionResponse,
    HandleEventBatchRequest, HandleEventBatchResponse, InitDeployRequest, InitDeployResponse,
    InitDomainRequest, InitTransactionRequest, InitTransactionResponse, PrepareDeployRequest,
    PrepareDeployResponse, PrepareTransactionRequest, PrepareTransactionResponse, SubmitMode,
};
use crate::harness::key_manager::recover_address;
use crate::harness::ledger::UTXO_TRANSFER_SIGNATURE;
use serde::{Deserialize, Serialize};
use sha3::{Digest, Keccak256};
use shared_types::{
    algorithms, verifier_types, AttestationRequest, AttestationType, BaseLedgerTransaction,
    Bytes32, CompletedTransaction, NewState, ResolvedVerifier, StateRef, StateUpdate,
    VerifierRequest,
};
use std::sync::Mutex;
use uuid::Uuid;

/// The coin schema: owner and amount are queryable labels.
pub const SIMPLE_COIN_SCHEMA: &str = r#"{
    "type": "tuple",
    "internalType": "struct SimpleCoin",
    "components": [
        {"name": "salt", "type": "bytes32"},
        {"name": "owner", "type": "address", "indexed": true},
        {"name": "amount", "type": "uint256", "indexed": true}
    ]
}"#;

const UTXO_TRANSFER_EVENT_ABI: &str = r#"[{
    "type": "event",
    "name": "UTXOTransfer",
    "inputs": [
        {"name": "txId", "type": "bytes32"},
        {"name": "inputs", "type": "bytes32[]"},
        {"name": "outputs", "type": "bytes32[]"},
        {"name": "signature", "type": "bytes"}
    ]
}]"#;

#[derive(Clone, Serialize, Deserialize)]
struct Coin {
    salt: String,
    owner: String,
    amount: String,
}

impl Coin {
    fn amount(&self) -> u128 {
        self.amount.parse().unwrap_or(0)
    }
}

#[derive(Deserialize)]
struct TransferParams {
    #[serde(default)]
    from: String,
    #[serde(default)]
    to: String,
    amount: u128,
}

#[derive(Deserialize)]
struct ConstructorParams {
    notary: String,
    #[serde(default)]
    name: String,
    #[serde(default)]
    symbol: String,
}

#[derive(Deserialize)]
struct ContractConfig {
    #[serde(rename = "notaryLocator")]
    notary_locator: String,
}

#[derive(Serialize, Deserialize)]
struct ExecuteNotarizedParams {
    #[serde(rename = "txId")]
    tx_id: String,
    inputs: Vec<String>,
    outputs: Vec<String>,
    signature: String,
}

/// The test domain plugin.
pub struct SimpleTokenDomain {
    schema_id: Mutex<Option<Bytes32>>,
}

impl SimpleTokenDomain {
    /// Creates the domain.
    pub fn new() -> Self {
        Self {
            schema_id: Mutex::new(None),
        }
    }

    fn schema_id(&self) -> Result<Bytes32, String> {
        self.schema_id
            .lock()
            .map_err(|_| "schema lock poisoned".to_string())?
            .ok_or_else(|| "domain not initialized".to_string())
    }

    fn verifier_for<'a>(
        verifiers: &'a [ResolvedVerifier],
        lookup: &str,
    ) -> Result<&'a str, String> {
        verifiers
            .iter()
            .find(|v| v.lookup == lookup)
            .map(|v| v.verifier.as_str())
            .ok_or_else(|| format!("no resolved verifier for {lookup}"))
    }

    /// The signing payload over the full transition, bound to the contract.
    fn transfer_payload(contract: &str, inputs: &[Coin], outputs: &[Coin]) -> Vec<u8> {
        let canonical = serde_json::json!({
            "contract": contract,
            "inputs": inputs.iter().map(|c| serde_json::json!({
                "salt": c.salt, "owner": c.owner, "amount": c.amount,
            })).collect::<Vec<_>>(),
            "outputs": outputs.iter().map(|c| serde_json::json!({
                "salt": c.salt, "owner": c.owner, "amount": c.amount,
            })).collect::<Vec<_>>(),
        });
        canonical.to_string().into_bytes()
    }

    /// Oldest-coin-first selection until the target amount is covered.
    async fn select_coins(
        &self,
        states: &DomainContext,
        schema_id: &Bytes32,
        owner: &str,
        target: u128,
    ) -> Result<(Vec<Coin>, Vec<StateRef>, u128), String> {
        let mut total: u128 = 0;
        let mut coins = Vec::new();
        let mut refs = Vec::new();
        let mut last_created: Option<u64> = None;
        loop {
            let query = match last_created {
                None => format!(
                    r#"{{"limit":10,"sort":[".created"],"eq":[{{"field":"owner","value":"{owner}"}}]}}"#
                ),
                Some(cursor) => format!(
                    r#"{{"limit":10,"sort":[".created"],"eq":[{{"field":"owner","value":"{owner}"}}],"gt":[{{"field":".created","value":{cursor}}}]}}"#
                ),
            };
            let found = states
                .find_available_states(schema_id, &query)
                .await
                .map_err(|e| e.to_string())?;
            if found.is_empty() {
                return Err(format!("insufficient funds (available={total})"));
            }
            for state in found {
                last_created = Some(state.created);
                let coin: Coin = serde_json::from_str(&state.data_json)
                    .map_err(|e| format!("coin {} is invalid: {e}", state.id))?;
                total += coin.amount();
                refs.push(state.to_ref());
                coins.push(coin);
                if total >= target {
                    return Ok((coins, refs, total - target));
                }
            }
        }
    }

    fn parse_coins(states: &[EndorsableState]) -> Result<Vec<Coin>, String> {
        states
            .iter()
            .map(|s| {
                serde_json::from_str(&s.data_json)
                    .map_err(|e| format!("state {} is invalid: {e}", s.id))
            })
            .collect()
    }

    fn random_salt() -> String {
        let salt: [u8; 32] = rand::random();
        format!("0x{}", hex::encode(salt))
    }
}

impl Default for SimpleTokenDomain {
    fn default() -> Self {
        Self::new()
    }
}

#[async_trait]
impl DomainPlugin for SimpleTokenDomain {
    async fn configure_domain(
        &self,
        _req: ConfigureDomainRequest,
    ) -> Result<ConfigureDomainResponse, String> {
        Ok(ConfigureDomainResponse {
            domain_config: DomainConfig {
                abi_state_schemas_json: vec![SIMPLE_COIN_SCHEMA.to_string()],
                abi_events_json: UTXO_TRANSFER_EVENT_ABI.to_string(),
                submit_mode: SubmitMode::OneTimeUseKeys {
                    prefix: "one-time-keys/".to_string(),
                },
            },
        })
    }

    async fn init_domain(&self, req: InitDomainRequest) -> Result<(), String> {
        let schema = req
            .abi_state_schemas
            .first()
            .ok_or("no schemas registered")?;
        *self
            .schema_id
            .lock()
            .map_err(|_| "schema lock poisoned".to_string())? = Some(schema.id);
        Ok(())
    }

    async fn init_deploy(&self, req: InitDeployRequest) -> Result<InitDeployResponse, String> {
        let params: ConstructorParams =
            serde_json::from_str(&req.transaction.constructor_params_json)
                .map_err(|e| format!("bad constructor params: {e}"))?;
        Ok(InitDeployResponse {
            required_verifiers: vec![VerifierRequest {
                lookup: params.notary,
                algorithm: algorithms::ECDSA_SECP256K1.to_string(),
                verifier_type: verifier_types::ETH_ADDRESS.to_string(),
            }],
        })
    }

    async fn prepare_deploy(
        &self,
        req: PrepareDeployRequest,
    ) -> Result<PrepareDeployResponse, String> {
        let params: ConstructorParams =
            serde_json::from_str(&req.transaction.constructor_params_json)
                .map_err(|e| format!("bad constructor params: {e}"))?;
        let notary_verifier = Self::verifier_for(&req.resolved_verifiers, &params.notary)?;
        Ok(PrepareDeployResponse {
            deploy: None,
            transaction: Some(BaseLedgerTransaction {
                function_abi_json: r#"{"type":"function","name":"newSimpleTokenNotarized"}"#
                    .to_string(),
                to: None,
                params_json: serde_json::json!({
                    "txId": req.transaction.transaction_id.to_string(),
                    "notary": notary_verifier,
                    "notaryLocator": params.notary,
                    "name": params.name,
                    "symbol": params.symbol,
                })
                .to_string(),
            }),
            signer: None,
        })
    }

    async fn init_transaction(
        &self,
        req: InitTransactionRequest,
    ) -> Result<InitTransactionResponse, String> {
        let params: TransferParams = serde_json::from_str(&req.transaction.function_params_json)
            .map_err(|e| format!("bad transfer params: {e}"))?;
        if params.amount == 0 {
            return Err("transfer amount must be positive".to_string());
        }
        let config: ContractConfig = serde_json::from_str(&req.transaction.contract_config_json)
            .map_err(|e| format!("bad contract config: {e}"))?;

        let mut lookups = vec![req.transaction.from.clone(), config.notary_locator];
        if !params.from.is_empty() {
            lookups.push(params.from);
        }
        if !params.to.is_empty() {
            lookups.push(params.to);
        }
        lookups.dedup();
        Ok(InitTransactionResponse {
            required_verifiers: lookups
                .into_iter()
                .map(|lookup| VerifierRequest {
                    lookup,
                    algorithm: algorithms::ECDSA_SECP256K1.to_string(),
                    verifier_type: verifier_types::ETH_ADDRESS.to_string(),
                })
                .collect(),
        })
    }

    async fn assemble_transaction(
        &self,
        req: AssembleTransactionRequest,
        states: &DomainContext,
    ) -> Result<AssembleTransactionResponse, String> {
        let schema_id = self.schema_id()?;
        let params: TransferParams = serde_json::from_str(&req.transaction.function_params_json)
            .map_err(|e| format!("bad transfer params: {e}"))?;
        let config: ContractConfig = serde_json::from_str(&req.transaction.contract_config_json)
            .map_err(|e| format!("bad contract config: {e}"))?;

        let mut input_coins = Vec::new();
        let mut input_refs = Vec::new();
        let mut change: u128 = 0;
        let from_addr = if params.from.is_empty() {
            None
        } else {
            Some(Self::verifier_for(&req.resolved_verifiers, &params.from)?.to_string())
        };
        if let Some(from_addr) = &from_addr {
            let (coins, refs, to_keep) = self
                .select_coins(states, &schema_id, from_addr, params.amount)
                .await?;
            input_coins = coins;
            input_refs = refs;
            change = to_keep;
        }

        let mut output_coins = Vec::new();
        let mut output_states = Vec::new();
        if let Some(from_addr) = &from_addr {
            if change > 0 {
                let coin = Coin {
                    salt: Self::random_salt(),
                    owner: from_addr.clone(),
                    amount: change.to_string(),
                };
                output_states.push(NewState {
                    schema_id,
                    data_json: serde_json::to_string(&coin).map_err(|e| e.to_string())?,
                    distribution_list: vec![params.from.clone()],
                });
                output_coins.push(coin);
            }
        }
        if !params.to.is_empty() {
            let to_addr = Self::verifier_for(&req.resolved_verifiers, &params.to)?;
            let coin = Coin {
                salt: Self::random_salt(),
                owner: to_addr.to_string(),
                amount: params.amount.to_string(),
            };
            output_states.push(NewState {
                schema_id,
                data_json: serde_json::to_string(&coin).map_err(|e| e.to_string())?,
                distribution_list: vec![params.to.clone()],
            });
            output_coins.push(coin);
        }

        let payload = Self::transfer_payload(
            &req.transaction.contract_address.to_string(),
            &input_coins,
            &output_coins,
        );
        Ok(AssembleTransactionResponse {
            assembly_result: AssemblyResult::Ok,
            assembled_transaction: Some(AssembledTransaction {
                input_states: input_refs,
                output_states,
            }),
            attestation_plan: vec![
                AttestationRequest {
                    name: "sender".to_string(),
                    attestation_type: AttestationType::Sign,
                    algorithm: algorithms::ECDSA_SECP256K1.to_string(),
                    verifier_type: verifier_types::ETH_ADDRESS.to_string(),
                    payload: payload.clone(),
                    parties: vec![req.transaction.from.clone()],
                },
                AttestationRequest {
                    name: "notary".to_string(),
                    attestation_type: AttestationType::Endorse,
                    algorithm: algorithms::ECDSA_SECP256K1.to_string(),
                    verifier_type: verifier_types::ETH_ADDRESS.to_string(),
                    payload,
                    parties: vec![config.notary_locator],
                },
            ],
            revert_reason: None,
        })
    }

    async fn endorse_transaction(
        &self,
        req: EndorseTransactionRequest,
    ) -> Result<EndorseTransactionResponse, String> {
        let params: TransferParams = serde_json::from_str(&req.transaction.function_params_json)
            .map_err(|e| format!("bad transfer params: {e}"))?;
        let input_coins = Self::parse_coins(&req.inputs)?;
        let output_coins = Self::parse_coins(&req.outputs)?;

        // Conservation: a transfer preserves value, a mint has no inputs
        if !params.from.is_empty() && !params.to.is_empty() {
            let in_total: u128 = input_coins.iter().map(Coin::amount).sum();
            let out_total: u128 = output_coins.iter().map(Coin::amount).sum();
            if in_total != out_total {
                return Ok(EndorseTransactionResponse {
                    result: EndorseResult::Revert,
                    payload: vec![],
                    signer: None,
                    revert_reason: Some(format!(
                        "value not conserved: inputs={in_total} outputs={out_total}"
                    )),
                });
            }
        } else if params.from.is_empty() && !input_coins.is_empty() {
            return Ok(EndorseTransactionResponse {
                result: EndorseResult::Revert,
                payload: vec![],
                signer: None,
                revert_reason: Some("mint must not consume states".to_string()),
            });
        }

        // The sender's signature must recover to the sender's verifier
        let payload = Self::transfer_payload(
            &req.transaction.contract_address.to_string(),
            &input_coins,
            &output_coins,
        );
        let sender_result = req
            .signatures
            .iter()
            .find(|r| r.name == "sender" && r.attestation_type == AttestationType::Sign)
            .ok_or("sender signature missing")?;
        let payload_hash: [u8; 32] = Keccak256::digest(&payload).into();
        let recovered = recover_address(&payload_hash, &sender_result.payload)
            .ok_or("sender signature unrecoverable")?;
        if !recovered.eq_ignore_ascii_case(&sender_result.verifier.verifier) {
            return Ok(EndorseTransactionResponse {
                result: EndorseResult::Revert,
                payload: vec![],
                signer: None,
                revert_reason: Some("sender signature does not match verifier".to_string()),
            });
        }

        Ok(EndorseTransactionResponse {
            result: EndorseResult::EndorserSubmit,
            payload: vec![],
            signer: None,
            revert_reason: None,
        })
    }

    async fn prepare_transaction(
        &self,
        req: PrepareTransactionRequest,
    ) -> Result<PrepareTransactionResponse, String> {
        let signature = req
            .attestation_results
            .iter()
            .find(|r| r.name == "sender" && r.attestation_type == AttestationType::Sign)
            .map(|r| hex::encode(&r.payload))
            .unwrap_or_default();
        Ok(PrepareTransactionResponse {
            transaction: BaseLedgerTransaction {
                function_abi_json: r#"{"type":"function","name":"executeNotarized"}"#.to_string(),
                to: Some(req.transaction.contract_address),
                params_json: serde_json::to_string(&ExecuteNotarizedParams {
                    tx_id: req.transaction.transaction_id.to_string(),
                    inputs: req.input_states.iter().map(|s| s.id.to_string()).collect(),
                    outputs: req.output_states.iter().map(|s| s.id.to_string()).collect(),
                    signature: format!("0x{signature}"),
                })
                .map_err(|e| e.to_string())?,
            },
        })
    }

    async fn handle_event_batch(
        &self,
        req: HandleEventBatchRequest,
    ) -> Result<HandleEventBatchResponse, String> {
        let mut res = HandleEventBatchResponse::default();
        for event in &req.events {
            if event.solidity_signature != UTXO_TRANSFER_SIGNATURE {
                continue;
            }
            let Ok(transfer) = serde_json::from_str::<ExecuteNotarizedParams>(&event.data_json)
            else {
                continue;
            };
            let Ok(tx_id) = transfer.tx_id.parse::<Uuid>() else {
                continue;
            };
            res.transactions_complete.push(CompletedTransaction {
                transaction_id: tx_id,
                tx_hash: event.tx_hash,
                location: event.location,
            });
            for input in &transfer.inputs {
                res.spent_states.push(StateUpdate {
                    id: input.parse().map_err(|_| "bad input state id")?,
                    transaction_id: tx_id,
                });
            }
            for output in &transfer.outputs {
                res.confirmed_states.push(StateUpdate {
                    id: output.parse().map_err(|_| "bad output state id")?,
                    transaction_id: tx_id,
                });
            }
        }
        Ok(res)
    }
}
