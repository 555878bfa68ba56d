//! Config Model - User-Chosen Chain Parameters
//!
//! Holds values and defaults only. Every judgement about those values
//! belongs to the validator.

use std::fmt;
use std::ops::Range;
use std::str::FromStr;

use rand::Rng;
use serde::{Deserialize, Deserializer, Serialize, Serializer};
use serde_json::Value;
use thiserror::Error;

use crate::address::{is_valid_address, ZERO_ADDRESS};
use crate::allowlist::{AllowlistConfig, PrecompileKind};
use crate::limits::{EngineLimits, DEFAULT_CHAIN_ID_RANGE, GWEI};

pub const PLACEHOLDER_OWNER: &str = ZERO_ADDRESS;

#[derive(Debug, Error)]
pub enum ConfigError {
    #[error("Unknown field: {0}")]
    UnknownField(String),

    #[error("Invalid value for {field}: {reason}")]
    InvalidValue { field: FieldKey, reason: String },
}

/// Stable identifier a finding or an edit is attached to.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash)]
pub enum FieldKey {
    EvmChainId,
    TokenName,
    TokenSymbol,
    GasLimit,
    TargetBlockRate,
    MinBaseFee,
    TargetGas,
    BaseFeeChangeDenominator,
    MinBlockGasCost,
    MaxBlockGasCost,
    BlockGasCostStep,
    TokenAllocations,
    Precompile(PrecompileKind),
}

impl FieldKey {
    pub const ALL: [FieldKey; 17] = [
        FieldKey::EvmChainId,
        FieldKey::TokenName,
        FieldKey::TokenSymbol,
        FieldKey::GasLimit,
        FieldKey::TargetBlockRate,
        FieldKey::MinBaseFee,
        FieldKey::TargetGas,
        FieldKey::BaseFeeChangeDenominator,
        FieldKey::MinBlockGasCost,
        FieldKey::MaxBlockGasCost,
        FieldKey::BlockGasCostStep,
        FieldKey::TokenAllocations,
        FieldKey::Precompile(PrecompileKind::ContractDeployerAllowList),
        FieldKey::Precompile(PrecompileKind::NativeMinter),
        FieldKey::Precompile(PrecompileKind::TxAllowList),
        FieldKey::Precompile(PrecompileKind::FeeManager),
        FieldKey::Precompile(PrecompileKind::RewardManager),
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            FieldKey::EvmChainId => "evmChainId",
            FieldKey::TokenName => "tokenName",
            FieldKey::TokenSymbol => "tokenSymbol",
            FieldKey::GasLimit => "gasLimit",
            FieldKey::TargetBlockRate => "targetBlockRate",
            FieldKey::MinBaseFee => "minBaseFee",
            FieldKey::TargetGas => "targetGas",
            FieldKey::BaseFeeChangeDenominator => "baseFeeChangeDenominator",
            FieldKey::MinBlockGasCost => "minBlockGasCost",
            FieldKey::MaxBlockGasCost => "maxBlockGasCost",
            FieldKey::BlockGasCostStep => "blockGasCostStep",
            FieldKey::TokenAllocations => "tokenAllocations",
            FieldKey::Precompile(PrecompileKind::ContractDeployerAllowList) => {
                "contractDeployerAllowList"
            }
            FieldKey::Precompile(PrecompileKind::NativeMinter) => "nativeMinter",
            FieldKey::Precompile(PrecompileKind::TxAllowList) => "txAllowList",
            FieldKey::Precompile(PrecompileKind::FeeManager) => "feeManager",
            FieldKey::Precompile(PrecompileKind::RewardManager) => "rewardManager",
        }
    }
}

impl fmt::Display for FieldKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for FieldKey {
    type Err = ConfigError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        FieldKey::ALL
            .into_iter()
            .find(|key| key.as_str() == s)
            .ok_or_else(|| ConfigError::UnknownField(s.to_string()))
    }
}

impl Serialize for FieldKey {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_str(self.as_str())
    }
}

impl<'de> Deserialize<'de> for FieldKey {
    fn deserialize<D: Deserializer<'de>>(deserializer: D) -> Result<Self, D::Error> {
        let raw = String::deserialize(deserializer)?;
        raw.parse().map_err(serde::de::Error::custom)
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct FeeConfig {
    #[serde(default = "default_min_base_fee")]
    pub min_base_fee: i64,
    #[serde(default = "default_target_gas")]
    pub target_gas: i64,
    #[serde(default = "default_base_fee_change_denominator")]
    pub base_fee_change_denominator: i64,
    #[serde(default)]
    pub min_block_gas_cost: i64,
    #[serde(default = "default_max_block_gas_cost")]
    pub max_block_gas_cost: i64,
    #[serde(default = "default_block_gas_cost_step")]
    pub block_gas_cost_step: i64,
}

fn default_min_base_fee() -> i64 { 25 * GWEI }
fn default_target_gas() -> i64 { 20_000_000 }
fn default_base_fee_change_denominator() -> i64 { 36 }
fn default_max_block_gas_cost() -> i64 { 1_000_000 }
fn default_block_gas_cost_step() -> i64 { 200_000 }

impl Default for FeeConfig {
    fn default() -> Self {
        Self {
            min_base_fee: default_min_base_fee(),
            target_gas: default_target_gas(),
            base_fee_change_denominator: default_base_fee_change_denominator(),
            min_block_gas_cost: 0,
            max_block_gas_cost: default_max_block_gas_cost(),
            block_gas_cost_step: default_block_gas_cost_step(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct TokenAllocation {
    pub address: String,
    /// Whole tokens; the generator scales to 18 decimals.
    pub amount: u64,
}

impl TokenAllocation {
    pub fn new(address: impl Into<String>, amount: u64) -> Self {
        Self { address: address.into(), amount }
    }
}

/// Warp messaging is fixed by policy and not editable here.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct WarpConfig {
    pub quorum_numerator: u64,
    pub require_primary_network_signers: bool,
}

impl WarpConfig {
    pub const POLICY: WarpConfig = WarpConfig {
        quorum_numerator: 67,
        require_primary_network_signers: true,
    };
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase", default)]
pub struct L1Config {
    pub evm_chain_id: u64,
    pub token_name: String,
    pub token_symbol: String,
    pub gas_limit: i64,
    pub target_block_rate: f64,
    pub fee_config: FeeConfig,
    pub token_allocations: Vec<TokenAllocation>,
    pub contract_deployer_allow_list: AllowlistConfig,
    pub native_minter: AllowlistConfig,
    pub tx_allow_list: AllowlistConfig,
    pub fee_manager: AllowlistConfig,
    pub reward_manager: AllowlistConfig,
    #[serde(skip)]
    adopted_wallet: Option<String>,
}

impl L1Config {
    pub fn new() -> Self {
        Self::with_rng(&mut rand::thread_rng())
    }

    pub fn with_rng<R: Rng + ?Sized>(rng: &mut R) -> Self {
        Self::with_rng_in(rng, DEFAULT_CHAIN_ID_RANGE)
    }

    /// Fresh config with a chain ID drawn from `band`. An empty band falls back to the default one.
    pub fn with_rng_in<R: Rng + ?Sized>(rng: &mut R, band: Range<u64>) -> Self {
        let band = if band.is_empty() { DEFAULT_CHAIN_ID_RANGE } else { band };
        Self::with_chain_id(rng.gen_range(band))
    }

    pub fn for_limits(limits: &EngineLimits) -> Self {
        Self::with_rng_in(&mut rand::thread_rng(), limits.default_chain_id_band.clone())
    }

    pub fn with_chain_id(evm_chain_id: u64) -> Self {
        Self {
            evm_chain_id,
            token_name: "Test Token".to_string(),
            token_symbol: "TEST".to_string(),
            gas_limit: 12_000_000,
            target_block_rate: 2.0,
            fee_config: FeeConfig::default(),
            token_allocations: vec![TokenAllocation::new(PLACEHOLDER_OWNER, 1_000_000)],
            contract_deployer_allow_list: AllowlistConfig::default(),
            native_minter: AllowlistConfig::default(),
            tx_allow_list: AllowlistConfig::default(),
            fee_manager: AllowlistConfig::default(),
            reward_manager: AllowlistConfig::default(),
            adopted_wallet: None,
        }
    }

    pub fn allowlist(&self, kind: PrecompileKind) -> &AllowlistConfig {
        match kind {
            PrecompileKind::ContractDeployerAllowList => &self.contract_deployer_allow_list,
            PrecompileKind::NativeMinter => &self.native_minter,
            PrecompileKind::TxAllowList => &self.tx_allow_list,
            PrecompileKind::FeeManager => &self.fee_manager,
            PrecompileKind::RewardManager => &self.reward_manager,
        }
    }

    pub fn allowlist_mut(&mut self, kind: PrecompileKind) -> &mut AllowlistConfig {
        match kind {
            PrecompileKind::ContractDeployerAllowList => &mut self.contract_deployer_allow_list,
            PrecompileKind::NativeMinter => &mut self.native_minter,
            PrecompileKind::TxAllowList => &mut self.tx_allow_list,
            PrecompileKind::FeeManager => &mut self.fee_manager,
            PrecompileKind::RewardManager => &mut self.reward_manager,
        }
    }

    /// Address of the first allocation, the genesis owner by convention.
    pub fn owner_address(&self) -> Option<&str> {
        self.token_allocations.first().map(|a| a.address.as_str())
    }

    pub fn apply(&mut self, edit: ConfigEdit) {
        match edit {
            ConfigEdit::EvmChainId(v) => self.evm_chain_id = v,
            ConfigEdit::TokenName(v) => self.token_name = v,
            ConfigEdit::TokenSymbol(v) => self.token_symbol = v,
            ConfigEdit::GasLimit(v) => self.gas_limit = v,
            ConfigEdit::TargetBlockRate(v) => self.target_block_rate = v,
            ConfigEdit::MinBaseFee(v) => self.fee_config.min_base_fee = v,
            ConfigEdit::TargetGas(v) => self.fee_config.target_gas = v,
            ConfigEdit::BaseFeeChangeDenominator(v) => self.fee_config.base_fee_change_denominator = v,
            ConfigEdit::MinBlockGasCost(v) => self.fee_config.min_block_gas_cost = v,
            ConfigEdit::MaxBlockGasCost(v) => self.fee_config.max_block_gas_cost = v,
            ConfigEdit::BlockGasCostStep(v) => self.fee_config.block_gas_cost_step = v,
            ConfigEdit::TokenAllocations(v) => self.token_allocations = v,
            ConfigEdit::Allowlist(kind, v) => *self.allowlist_mut(kind) = v,
        }
    }

    /// String-keyed entry point for the form layer. A rejected value leaves the model untouched.
    pub fn set_field(&mut self, key: FieldKey, value: Value) -> Result<(), ConfigError> {
        let edit = ConfigEdit::from_json(key, value)?;
        self.apply(edit);
        Ok(())
    }

    /// Wallet address seen by the first successful `adopt_wallet_address` call.
    pub fn adopted_wallet(&self) -> Option<&str> {
        self.adopted_wallet.as_deref()
    }

    /// Swaps the placeholder owner for the connected wallet. Only the first call can do anything.
    pub fn adopt_wallet_address(&mut self, address: &str) -> bool {
        if self.adopted_wallet.is_some() || !is_valid_address(address) {
            return false;
        }
        self.adopted_wallet = Some(address.to_string());

        match self.token_allocations.first_mut() {
            Some(first) if first.address == PLACEHOLDER_OWNER => {
                first.address = address.to_string();
                true
            }
            _ => false,
        }
    }
}

impl Default for L1Config {
    fn default() -> Self {
        Self::new()
    }
}

/// A typed mutation of one field.
#[derive(Debug, Clone, PartialEq)]
pub enum ConfigEdit {
    EvmChainId(u64),
    TokenName(String),
    TokenSymbol(String),
    GasLimit(i64),
    TargetBlockRate(f64),
    MinBaseFee(i64),
    TargetGas(i64),
    BaseFeeChangeDenominator(i64),
    MinBlockGasCost(i64),
    MaxBlockGasCost(i64),
    BlockGasCostStep(i64),
    TokenAllocations(Vec<TokenAllocation>),
    Allowlist(PrecompileKind, AllowlistConfig),
}

impl ConfigEdit {
    pub fn from_json(key: FieldKey, value: Value) -> Result<Self, ConfigError> {
        fn parse<T: serde::de::DeserializeOwned>(key: FieldKey, value: Value) -> Result<T, ConfigError> {
            serde_json::from_value(value).map_err(|e| ConfigError::InvalidValue {
                field: key,
                reason: e.to_string(),
            })
        }

        Ok(match key {
            FieldKey::EvmChainId => ConfigEdit::EvmChainId(parse(key, value)?),
            FieldKey::TokenName => ConfigEdit::TokenName(parse(key, value)?),
            FieldKey::TokenSymbol => ConfigEdit::TokenSymbol(parse(key, value)?),
            FieldKey::GasLimit => ConfigEdit::GasLimit(parse(key, value)?),
            FieldKey::TargetBlockRate => ConfigEdit::TargetBlockRate(parse(key, value)?),
            FieldKey::MinBaseFee => ConfigEdit::MinBaseFee(parse(key, value)?),
            FieldKey::TargetGas => ConfigEdit::TargetGas(parse(key, value)?),
            FieldKey::BaseFeeChangeDenominator => {
                ConfigEdit::BaseFeeChangeDenominator(parse(key, value)?)
            }
            FieldKey::MinBlockGasCost => ConfigEdit::MinBlockGasCost(parse(key, value)?),
            FieldKey::MaxBlockGasCost => ConfigEdit::MaxBlockGasCost(parse(key, value)?),
            FieldKey::BlockGasCostStep => ConfigEdit::BlockGasCostStep(parse(key, value)?),
            FieldKey::TokenAllocations => ConfigEdit::TokenAllocations(parse(key, value)?),
            FieldKey::Precompile(kind) => ConfigEdit::Allowlist(kind, parse(key, value)?),
        })
    }

    pub fn field(&self) -> FieldKey {
        match self {
            ConfigEdit::EvmChainId(_) => FieldKey::EvmChainId,
            ConfigEdit::TokenName(_) => FieldKey::TokenName,
            ConfigEdit::TokenSymbol(_) => FieldKey::TokenSymbol,
            ConfigEdit::GasLimit(_) => FieldKey::GasLimit,
            ConfigEdit::TargetBlockRate(_) => FieldKey::TargetBlockRate,
            ConfigEdit::MinBaseFee(_) => FieldKey::MinBaseFee,
            ConfigEdit::TargetGas(_) => FieldKey::TargetGas,
            ConfigEdit::BaseFeeChangeDenominator(_) => FieldKey::BaseFeeChangeDenominator,
            ConfigEdit::MinBlockGasCost(_) => FieldKey::MinBlockGasCost,
            ConfigEdit::MaxBlockGasCost(_) => FieldKey::MaxBlockGasCost,
            ConfigEdit::BlockGasCostStep(_) => FieldKey::BlockGasCostStep,
            ConfigEdit::TokenAllocations(_) => FieldKey::TokenAllocations,
            ConfigEdit::Allowlist(kind, _) => kind.field_key(),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use rand::rngs::StdRng;
    use rand::SeedableRng;
    use serde_json::json;

    #[test]
    fn defaults_draw_chain_id_from_band() {
        let mut rng = StdRng::seed_from_u64(7);
        for _ in 0..32 {
            let config = L1Config::with_rng(&mut rng);
            assert!(DEFAULT_CHAIN_ID_RANGE.contains(&config.evm_chain_id));
        }
    }

    #[test]
    fn chain_id_band_comes_from_limits() {
        let mut limits = EngineLimits::default();
        limits.default_chain_id_band = 7_000..7_001;
        assert_eq!(L1Config::for_limits(&limits).evm_chain_id, 7_000);

        let mut rng = StdRng::seed_from_u64(3);
        let config = L1Config::with_rng_in(&mut rng, 5..5);
        assert!(DEFAULT_CHAIN_ID_RANGE.contains(&config.evm_chain_id));
    }

    #[test]
    fn defaults_are_non_empty() {
        let config = L1Config::with_chain_id(123_456);
        assert_eq!(config.token_symbol, "TEST");
        assert_eq!(config.token_allocations.len(), 1);
        assert_eq!(config.owner_address(), Some(PLACEHOLDER_OWNER));
        assert!(PrecompileKind::ALL.iter().all(|k| !config.allowlist(*k).activated));
    }

    #[test]
    fn field_keys_round_trip_through_strings() {
        for key in FieldKey::ALL {
            assert_eq!(key.as_str().parse::<FieldKey>().unwrap(), key);
        }
        assert!(matches!("nope".parse::<FieldKey>(), Err(ConfigError::UnknownField(_))));
    }

    #[test]
    fn set_field_applies_typed_value() {
        let mut config = L1Config::with_chain_id(1);
        config.set_field(FieldKey::GasLimit, json!(20_000_000)).unwrap();
        config.set_field(FieldKey::TargetBlockRate, json!(0.5)).unwrap();
        config
            .set_field(
                FieldKey::Precompile(PrecompileKind::FeeManager),
                json!({"activated": true, "addresses": {"Admin": ["0x1111111111111111111111111111111111111111"]}}),
            )
            .unwrap();
        assert_eq!(config.gas_limit, 20_000_000);
        assert_eq!(config.target_block_rate, 0.5);
        assert!(config.fee_manager.activated);
    }

    #[test]
    fn set_field_rejects_wrong_type_without_mutation() {
        let mut config = L1Config::with_chain_id(1);
        let before = config.clone();
        let err = config.set_field(FieldKey::GasLimit, json!("lots")).unwrap_err();
        assert!(err.to_string().contains("gasLimit"));
        assert_eq!(config, before);
    }

    #[test]
    fn wallet_replaces_placeholder_exactly_once() {
        let mut config = L1Config::with_chain_id(1);
        assert!(config.adopt_wallet_address("0x1111111111111111111111111111111111111111"));
        assert!(!config.adopt_wallet_address("0x2222222222222222222222222222222222222222"));
        assert_eq!(
            config.owner_address(),
            Some("0x1111111111111111111111111111111111111111")
        );
    }

    #[test]
    fn wallet_leaves_user_owner_alone() {
        let mut config = L1Config::with_chain_id(1);
        config.apply(ConfigEdit::TokenAllocations(vec![TokenAllocation::new(
            "0x3333333333333333333333333333333333333333",
            5,
        )]));
        assert!(!config.adopt_wallet_address("0x1111111111111111111111111111111111111111"));
        assert_eq!(
            config.owner_address(),
            Some("0x3333333333333333333333333333333333333333")
        );
    }

    #[test]
    fn partial_json_fills_defaults() {
        let config: L1Config =
            serde_json::from_value(json!({"evmChainId": 555_555, "tokenSymbol": "AVAX"})).unwrap();
        assert_eq!(config.evm_chain_id, 555_555);
        assert_eq!(config.token_symbol, "AVAX");
        assert_eq!(config.fee_config, FeeConfig::default());
    }
}
