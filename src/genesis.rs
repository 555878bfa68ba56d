//! Genesis Generator - Base Document + Override Layer
//!
//! `generate` never fails: a fault becomes the document text so the
//! pipeline always has something to publish.

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};
use serde_json::{json, Map, Value};
use thiserror::Error;
use tracing::{debug, warn};

use crate::address::{alloc_key, format_address, parse_address, storage_word, ZERO_ADDRESS, ZERO_HASH};
use crate::allowlist::PrecompileKind;
use crate::catalog::{entry, ContractArtifacts, PreinstallId, PreinstallSelections};
use crate::config::{L1Config, WarpConfig};
use crate::hashing::canonical_json_pretty;

/// Base-denomination units per whole token.
pub const WEI_PER_TOKEN: u128 = 1_000_000_000_000_000_000;

/// EIP-1967 admin slot of a transparent proxy.
pub const PROXY_ADMIN_SLOT: &str = "0xb53127684a568b3173ae13b9f8a6016e243e63b6e8ee1178d6a717850b5d6103";
/// Slot 0 of the proxy admin holds its owner.
pub const OWNER_SLOT: &str = ZERO_HASH;

const FORK_BLOCKS: [&str; 9] = [
    "homesteadBlock",
    "eip150Block",
    "eip155Block",
    "eip158Block",
    "byzantiumBlock",
    "constantinopleBlock",
    "petersburgBlock",
    "istanbulBlock",
    "muirGlacierBlock",
];

#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("At least one token allocation is required")]
    NoAllocations,

    #[error("Invalid owner address '{0}'")]
    InvalidOwner(String),

    #[error("Invalid allocation address '{0}'")]
    InvalidAllocationAddress(String),

    #[error("Balance overflow for {0}")]
    BalanceOverflow(String),

    #[error("No bytecode registered for preinstall '{0}'")]
    MissingBytecode(PreinstallId),

    #[error("Catalog entry '{0}' has a malformed address")]
    CatalogAddress(PreinstallId),

    #[error("Gas limit {0} cannot be encoded")]
    InvalidGasLimit(i64),

    #[error("Target block rate {0} is not a finite number")]
    InvalidBlockRate(f64),

    #[error("Serialization error: {0}")]
    Serialization(#[from] serde_json::Error),
}

/// Everything a generation run needs, as one JSON payload.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct GenesisRequest {
    pub config: L1Config,
    #[serde(default)]
    pub preinstalls: PreinstallSelections,
}

impl From<L1Config> for GenesisRequest {
    fn from(config: L1Config) -> Self {
        Self { config, preinstalls: PreinstallSelections::none() }
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct CompiledGenesis {
    pub value: Value,
    pub json: String,
    pub owner: String,
    pub timestamp: u64,
}

/// What the pipeline publishes in the document slot.
#[derive(Debug, Clone, PartialEq)]
pub enum GenesisOutput {
    Compiled(CompiledGenesis),
    Fault(String),
    /// Strict gating cleared the document because of validation errors.
    Cleared,
}

impl GenesisOutput {
    pub fn text(&self) -> &str {
        match self {
            GenesisOutput::Compiled(genesis) => &genesis.json,
            GenesisOutput::Fault(message) => message,
            GenesisOutput::Cleared => "",
        }
    }

    pub fn compiled(&self) -> Option<&CompiledGenesis> {
        match self {
            GenesisOutput::Compiled(genesis) => Some(genesis),
            _ => None,
        }
    }

    pub fn is_fault(&self) -> bool {
        matches!(self, GenesisOutput::Fault(_))
    }
}

fn hex_quantity(value: u64) -> String {
    format!("{:#x}", value)
}

fn block_rate_value(rate: f64) -> Result<Value, GenerateError> {
    if !rate.is_finite() {
        return Err(GenerateError::InvalidBlockRate(rate));
    }
    if rate.fract() == 0.0 && rate.abs() < i64::MAX as f64 {
        Ok(Value::from(rate as i64))
    } else {
        Ok(Value::from(rate))
    }
}

/// Genesis generator - stateless apart from the artifact registry
#[derive(Debug, Clone, Default)]
pub struct GenesisGenerator {
    artifacts: ContractArtifacts,
}

impl GenesisGenerator {
    pub fn new(artifacts: ContractArtifacts) -> Self {
        Self { artifacts }
    }

    pub fn generate(&self, config: &L1Config, selections: &PreinstallSelections) -> GenesisOutput {
        self.generate_at(config, selections, Utc::now())
    }

    pub fn generate_at(
        &self,
        config: &L1Config,
        selections: &PreinstallSelections,
        now: DateTime<Utc>,
    ) -> GenesisOutput {
        match self.try_generate_at(config, selections, now) {
            Ok(genesis) => GenesisOutput::Compiled(genesis),
            Err(e) => {
                warn!(error = %e, "genesis generation failed");
                GenesisOutput::Fault(format!("Error generating genesis: {}", e))
            }
        }
    }

    pub fn try_generate(
        &self,
        config: &L1Config,
        selections: &PreinstallSelections,
    ) -> Result<CompiledGenesis, GenerateError> {
        self.try_generate_at(config, selections, Utc::now())
    }

    pub fn try_generate_at(
        &self,
        config: &L1Config,
        selections: &PreinstallSelections,
        now: DateTime<Utc>,
    ) -> Result<CompiledGenesis, GenerateError> {
        let first = config.token_allocations.first().ok_or(GenerateError::NoAllocations)?;
        let owner = parse_address(&first.address)
            .ok_or_else(|| GenerateError::InvalidOwner(first.address.clone()))?;

        let timestamp = u64::try_from(now.timestamp()).unwrap_or(0);

        let mut genesis = self.build_base(config, selections, &owner)?;
        apply_overrides(&mut genesis, config, timestamp)?;

        let gas_limit = u64::try_from(config.gas_limit)
            .map_err(|_| GenerateError::InvalidGasLimit(config.gas_limit))?;
        genesis["gasLimit"] = json!(hex_quantity(gas_limit));
        genesis["timestamp"] = json!(hex_quantity(timestamp));

        let json = canonical_json_pretty(&genesis)?;
        debug!(bytes = json.len(), chain_id = config.evm_chain_id, "genesis compiled");

        Ok(CompiledGenesis {
            value: genesis,
            json,
            owner: format_address(&owner),
            timestamp,
        })
    }

    fn build_base(
        &self,
        config: &L1Config,
        selections: &PreinstallSelections,
        owner: &[u8; 20],
    ) -> Result<Value, GenerateError> {
        let mut alloc = allocation_accounts(config)?;
        self.add_preinstalls(&mut alloc, selections, owner)?;

        let mut chain = Map::new();
        chain.insert("chainId".into(), json!(config.evm_chain_id));
        for fork in FORK_BLOCKS {
            chain.insert(fork.into(), json!(0));
        }
        chain.insert("allowFeeRecipients".into(), json!(false));
        chain.insert("feeConfig".into(), json!({ "gasLimit": config.gas_limit }));
        chain.insert(
            "warpConfig".into(),
            json!({ "blockTimestamp": 0, "quorumNumerator": WarpConfig::POLICY.quorum_numerator }),
        );

        for kind in PrecompileKind::ALL.into_iter().filter(|k| k.uses_role_tiers()) {
            let allowlist = config.allowlist(kind);
            if allowlist.activated {
                chain.insert(
                    kind.genesis_key().into(),
                    json!({
                        "blockTimestamp": 0,
                        "adminAddresses": allowlist.addresses.admin,
                        "managerAddresses": allowlist.addresses.manager,
                        "enabledAddresses": allowlist.addresses.enabled,
                    }),
                );
            }
        }

        Ok(json!({
            "config": chain,
            "alloc": alloc,
            "nonce": "0x0",
            "timestamp": "0x0",
            "extraData": "0x",
            "gasLimit": "0x0",
            "difficulty": "0x0",
            "mixHash": ZERO_HASH,
            "coinbase": ZERO_ADDRESS,
            "number": "0x0",
            "gasUsed": "0x0",
            "parentHash": ZERO_HASH,
        }))
    }

    fn add_preinstalls(
        &self,
        alloc: &mut Map<String, Value>,
        selections: &PreinstallSelections,
        owner: &[u8; 20],
    ) -> Result<(), GenerateError> {
        for id in selections.selected() {
            let code = self.artifacts.get(id).ok_or(GenerateError::MissingBytecode(id))?;
            let address = catalog_address(id)?;

            let mut storage = Map::new();
            match id {
                PreinstallId::Proxy => {
                    let admin = catalog_address(PreinstallId::ProxyAdmin)?;
                    storage.insert(PROXY_ADMIN_SLOT.into(), json!(storage_word(&admin)));
                }
                PreinstallId::ProxyAdmin => {
                    storage.insert(OWNER_SLOT.into(), json!(storage_word(owner)));
                }
                _ => {}
            }

            let key = alloc_key(&address);
            let account = alloc.entry(key).or_insert_with(|| json!({ "balance": "0x0" }));
            if account.get("code").is_some() {
                warn!(preinstall = %id, "preinstall address already has code, overwriting");
            }
            account["code"] = json!(code);
            account["nonce"] = json!("0x1");
            account["storage"] = Value::Object(storage);
        }
        Ok(())
    }
}

fn catalog_address(id: PreinstallId) -> Result<[u8; 20], GenerateError> {
    parse_address(entry(id).address).ok_or(GenerateError::CatalogAddress(id))
}

/// Allocation balances keyed by unprefixed lowercase address; repeats are summed.
fn allocation_accounts(config: &L1Config) -> Result<Map<String, Value>, GenerateError> {
    let mut balances: Vec<(String, u128)> = Vec::new();
    for allocation in &config.token_allocations {
        let address = parse_address(&allocation.address)
            .ok_or_else(|| GenerateError::InvalidAllocationAddress(allocation.address.clone()))?;
        let key = alloc_key(&address);
        let amount = u128::from(allocation.amount)
            .checked_mul(WEI_PER_TOKEN)
            .ok_or_else(|| GenerateError::BalanceOverflow(allocation.address.clone()))?;

        match balances.iter_mut().find(|(k, _)| *k == key) {
            Some((_, balance)) => {
                *balance = balance
                    .checked_add(amount)
                    .ok_or_else(|| GenerateError::BalanceOverflow(allocation.address.clone()))?;
            }
            None => balances.push((key, amount)),
        }
    }

    Ok(balances
        .into_iter()
        .map(|(key, balance)| (key, json!({ "balance": format!("{:#x}", balance) })))
        .collect())
}

/// Current fee policy, fixed warp policy, and the manager precompiles.
fn apply_overrides(genesis: &mut Value, config: &L1Config, timestamp: u64) -> Result<(), GenerateError> {
    let fee = &config.fee_config;
    let mut fee_block = Map::new();
    fee_block.insert("gasLimit".into(), json!(config.gas_limit));
    fee_block.insert("targetBlockRate".into(), block_rate_value(config.target_block_rate)?);
    fee_block.insert("minBaseFee".into(), json!(fee.min_base_fee));
    fee_block.insert("targetGas".into(), json!(fee.target_gas));
    fee_block.insert("baseFeeChangeDenominator".into(), json!(fee.base_fee_change_denominator));
    fee_block.insert("minBlockGasCost".into(), json!(fee.min_block_gas_cost));
    fee_block.insert("maxBlockGasCost".into(), json!(fee.max_block_gas_cost));
    fee_block.insert("blockGasCostStep".into(), json!(fee.block_gas_cost_step));

    let chain = &mut genesis["config"];
    if let Some(existing) = chain.get_mut("feeConfig").and_then(Value::as_object_mut) {
        existing.extend(fee_block);
    } else {
        chain["feeConfig"] = Value::Object(fee_block);
    }

    chain["warpConfig"] = json!({
        "blockTimestamp": timestamp,
        "quorumNumerator": WarpConfig::POLICY.quorum_numerator,
        "requirePrimaryNetworkSigners": WarpConfig::POLICY.require_primary_network_signers,
    });

    for kind in [PrecompileKind::FeeManager, PrecompileKind::RewardManager] {
        let allowlist = config.allowlist(kind);
        if allowlist.activated {
            chain[kind.genesis_key()] = json!({
                "adminAddresses": allowlist.addresses.union(),
                "blockTimestamp": timestamp,
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::allowlist::{AllowlistConfig, Role};
    use crate::config::TokenAllocation;
    use chrono::TimeZone;

    const OWNER: &str = "0x1111111111111111111111111111111111111111";

    fn config() -> L1Config {
        let mut config = L1Config::with_chain_id(888_888);
        config.token_allocations = vec![TokenAllocation::new(OWNER, 1_000_000)];
        config
    }

    fn at(secs: i64) -> DateTime<Utc> {
        Utc.timestamp_opt(secs, 0).unwrap()
    }

    fn compile(config: &L1Config, selections: &PreinstallSelections) -> CompiledGenesis {
        GenesisGenerator::default()
            .try_generate_at(config, selections, at(1_700_000_000))
            .unwrap()
    }

    #[test]
    fn hex_header_fields() {
        let genesis = compile(&config(), &PreinstallSelections::none());
        assert_eq!(genesis.value["gasLimit"], "0xb71b00");
        assert_eq!(genesis.value["timestamp"], "0x6553f100");
        assert_eq!(genesis.timestamp, 1_700_000_000);
    }

    #[test]
    fn balance_is_scaled_to_wei() {
        let genesis = compile(&config(), &PreinstallSelections::none());
        let balance = genesis.value["alloc"]["1111111111111111111111111111111111111111"]["balance"]
            .as_str()
            .unwrap();
        let wei = u128::from_str_radix(balance.trim_start_matches("0x"), 16).unwrap();
        assert_eq!(wei, 1_000_000 * WEI_PER_TOKEN);
    }

    #[test]
    fn repeated_addresses_are_summed() {
        let mut config = config();
        config.token_allocations.push(TokenAllocation::new(OWNER.to_uppercase().replace("0X", "0x"), 1));
        let genesis = compile(&config, &PreinstallSelections::none());
        let alloc = genesis.value["alloc"].as_object().unwrap();
        assert_eq!(alloc.len(), 1);
        assert_eq!(
            alloc["1111111111111111111111111111111111111111"]["balance"],
            format!("{:#x}", 1_000_001 * WEI_PER_TOKEN)
        );
    }

    #[test]
    fn fee_block_carries_all_fields() {
        let mut config = config();
        config.target_block_rate = 2.5;
        let genesis = compile(&config, &PreinstallSelections::none());
        let fee = &genesis.value["config"]["feeConfig"];
        assert_eq!(fee.as_object().unwrap().len(), 8);
        assert_eq!(fee["gasLimit"], 12_000_000);
        assert_eq!(fee["targetBlockRate"], 2.5);
        assert_eq!(fee["minBaseFee"], 25_000_000_000i64);
        assert_eq!(fee["blockGasCostStep"], 200_000);
    }

    #[test]
    fn integral_block_rate_is_an_integer() {
        let genesis = compile(&config(), &PreinstallSelections::none());
        assert!(genesis.value["config"]["feeConfig"]["targetBlockRate"].is_i64());
    }

    #[test]
    fn inverted_gas_costs_are_not_swapped() {
        let mut config = config();
        config.fee_config.min_block_gas_cost = 900;
        config.fee_config.max_block_gas_cost = 100;
        let genesis = compile(&config, &PreinstallSelections::none());
        let fee = &genesis.value["config"]["feeConfig"];
        assert_eq!(fee["minBlockGasCost"], 900);
        assert_eq!(fee["maxBlockGasCost"], 100);
    }

    #[test]
    fn warp_block_is_policy_plus_timestamp() {
        let genesis = compile(&config(), &PreinstallSelections::none());
        assert_eq!(
            genesis.value["config"]["warpConfig"],
            json!({
                "blockTimestamp": 1_700_000_000u64,
                "quorumNumerator": 67,
                "requirePrimaryNetworkSigners": true,
            })
        );
    }

    #[test]
    fn role_tier_allowlists_only_when_activated() {
        let mut config = config();
        config.tx_allow_list = AllowlistConfig::activated_with(Role::Manager, OWNER);
        config.native_minter.addresses.admin.push(OWNER.into());
        let genesis = compile(&config, &PreinstallSelections::none());
        let chain = &genesis.value["config"];
        assert_eq!(chain["txAllowListConfig"]["managerAddresses"], json!([OWNER]));
        assert_eq!(chain["txAllowListConfig"]["adminAddresses"], json!([]));
        assert_eq!(chain["txAllowListConfig"]["blockTimestamp"], 0);
        assert!(chain.get("contractNativeMinterConfig").is_none());
    }

    #[test]
    fn manager_precompiles_flatten_roles() {
        let mut config = config();
        config.fee_manager.activated = true;
        config.fee_manager.addresses.admin.push(OWNER.into());
        config.fee_manager.addresses.enabled.push("0x2222222222222222222222222222222222222222".into());
        config.fee_manager.addresses.manager.push(OWNER.into());
        let genesis = compile(&config, &PreinstallSelections::none());
        let chain = &genesis.value["config"];
        assert_eq!(
            chain["feeManagerConfig"],
            json!({
                "adminAddresses": [OWNER, "0x2222222222222222222222222222222222222222"],
                "blockTimestamp": 1_700_000_000u64,
            })
        );
        assert!(chain.get("rewardManagerConfig").is_none());
    }

    #[test]
    fn proxy_pair_references_owner() {
        let mut selections = PreinstallSelections::none();
        selections.set(PreinstallId::Proxy, true);
        let mut artifacts = ContractArtifacts::builtin();
        artifacts.register(PreinstallId::Proxy, "0x60806040");
        artifacts.register(PreinstallId::ProxyAdmin, "0x60806041");

        let genesis = GenesisGenerator::new(artifacts)
            .try_generate_at(&config(), &selections, at(1))
            .unwrap();
        let alloc = &genesis.value["alloc"];
        let admin = &alloc["dad0000000000000000000000000000000000000"];
        assert_eq!(admin["code"], "0x60806041");
        assert_eq!(
            admin["storage"][OWNER_SLOT],
            "0x0000000000000000000000001111111111111111111111111111111111111111"
        );
        let proxy = &alloc["facade0000000000000000000000000000000000"];
        assert_eq!(
            proxy["storage"][PROXY_ADMIN_SLOT],
            "0x000000000000000000000000dad0000000000000000000000000000000000000"
        );
        assert_eq!(proxy["nonce"], "0x1");
    }

    #[test]
    fn missing_bytecode_is_a_fault() {
        let mut selections = PreinstallSelections::none();
        selections.set(PreinstallId::Multicall, true);
        let output = GenesisGenerator::default().generate(&config(), &selections);
        assert!(output.is_fault());
        assert!(output.text().contains("multicall"));
    }

    #[test]
    fn bad_owner_becomes_fault_text() {
        let mut config = config();
        config.token_allocations[0].address = "not-an-address".into();
        let output = GenesisGenerator::default().generate(&config, &PreinstallSelections::none());
        assert_eq!(
            output.text(),
            "Error generating genesis: Invalid owner address 'not-an-address'"
        );
    }

    #[test]
    fn negative_gas_limit_is_a_fault() {
        let mut config = config();
        config.gas_limit = -1;
        let output = GenesisGenerator::default().generate(&config, &PreinstallSelections::none());
        assert!(output.is_fault());
    }

    #[test]
    fn output_is_canonically_ordered() {
        let genesis = compile(&config(), &PreinstallSelections::none());
        let reparsed: Value = serde_json::from_str(&genesis.json).unwrap();
        assert_eq!(canonical_json_pretty(&reparsed).unwrap(), genesis.json);
        assert!(genesis.json.find("\"alloc\"").unwrap() < genesis.json.find("\"config\"").unwrap());
    }

    #[test]
    fn cleared_output_is_empty_text() {
        assert_eq!(GenesisOutput::Cleared.text(), "");
        assert!(GenesisOutput::Cleared.compiled().is_none());
    }
}
