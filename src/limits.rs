//! Engine Limits - One Immutable Bounds Value
//!
//! Every numeric bound the validator and size checker use lives here.
//! Nothing else in the crate hardcodes a floor, ceiling or band.

use std::ops::Range;

use serde::{Deserialize, Serialize};

pub const GWEI: i64 = 1_000_000_000;

/// Band a fresh config draws its chain ID from.
pub const DEFAULT_CHAIN_ID_RANGE: Range<u64> = 100_000..1_000_000;

/// Transport ceiling of the downstream chain-creation channel.
pub const GENESIS_SIZE_CEILING: usize = 64 * 1024;

/// Which of the two embedding modes the limits are tuned for.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum EngineMode {
    /// Standalone genesis builder
    Standalone,
    /// Step inside the chain-creation wizard
    Embedded,
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct EngineLimits {
    pub mode: EngineMode,

    pub max_chain_id: u64,
    pub default_chain_id_band: Range<u64>,
    pub reserved_chain_ids: Vec<(u64, String)>,

    pub max_token_name_len: usize,
    pub min_token_symbol_len: usize,
    pub max_token_symbol_len: usize,

    pub min_gas_limit: i64,
    pub max_gas_limit: i64,
    pub recommended_min_gas_limit: i64,
    pub recommended_max_gas_limit: i64,

    pub min_target_block_rate: f64,
    pub max_target_block_rate: f64,
    pub recommended_max_target_block_rate: f64,

    pub max_min_base_fee: i64,
    pub recommended_min_base_fee: i64,
    pub recommended_max_min_base_fee: i64,

    pub recommended_min_target_gas: i64,

    pub min_base_fee_change_denominator: i64,
    pub recommended_min_base_fee_change_denominator: i64,
    pub recommended_max_base_fee_change_denominator: i64,

    pub recommended_max_min_block_gas_cost: i64,
    pub recommended_max_max_block_gas_cost: i64,
    pub recommended_max_block_gas_cost_step: i64,

    /// targetGas above threshold * this factor is no longer "just static"
    pub static_pricing_band: f64,

    pub size_ceiling: usize,
    pub caution_ratio: f64,
    pub critical_ratio: f64,
}

impl EngineLimits {
    pub fn standalone() -> Self {
        Self {
            mode: EngineMode::Standalone,
            max_chain_id: u32::MAX as u64,
            default_chain_id_band: DEFAULT_CHAIN_ID_RANGE,
            reserved_chain_ids: reserved_chain_ids(),
            max_token_name_len: 50,
            min_token_symbol_len: 2,
            max_token_symbol_len: 6,
            min_gas_limit: 1_000_000,
            max_gas_limit: 100_000_000,
            recommended_min_gas_limit: 15_000_000,
            recommended_max_gas_limit: 50_000_000,
            min_target_block_rate: 0.1,
            max_target_block_rate: 60.0,
            recommended_max_target_block_rate: 10.0,
            max_min_base_fee: 10_000 * GWEI,
            recommended_min_base_fee: GWEI,
            recommended_max_min_base_fee: 500 * GWEI,
            recommended_min_target_gas: 1_000_000,
            min_base_fee_change_denominator: 1,
            recommended_min_base_fee_change_denominator: 8,
            recommended_max_base_fee_change_denominator: 1_000,
            recommended_max_min_block_gas_cost: 1_000_000_000,
            recommended_max_max_block_gas_cost: 10_000_000_000,
            recommended_max_block_gas_cost_step: 5_000_000,
            static_pricing_band: 1.5,
            size_ceiling: GENESIS_SIZE_CEILING,
            caution_ratio: 0.75,
            critical_ratio: 0.90,
        }
    }

    /// The wizard accepts smaller chains before nagging about gas limit.
    pub fn embedded() -> Self {
        Self {
            mode: EngineMode::Embedded,
            recommended_min_gas_limit: 8_000_000,
            ..Self::standalone()
        }
    }

    pub fn for_mode(mode: EngineMode) -> Self {
        match mode {
            EngineMode::Standalone => Self::standalone(),
            EngineMode::Embedded => Self::embedded(),
        }
    }

    pub fn reserved_chain_name(&self, chain_id: u64) -> Option<&str> {
        self.reserved_chain_ids
            .iter()
            .find(|(id, _)| *id == chain_id)
            .map(|(_, name)| name.as_str())
    }
}

impl Default for EngineLimits {
    fn default() -> Self {
        Self::standalone()
    }
}

fn reserved_chain_ids() -> Vec<(u64, String)> {
    [
        (1, "Ethereum Mainnet"),
        (5, "Goerli"),
        (10, "Optimism"),
        (56, "BNB Smart Chain"),
        (137, "Polygon"),
        (1337, "local development"),
        (8453, "Base"),
        (31337, "Hardhat"),
        (42161, "Arbitrum One"),
        (43113, "Avalanche Fuji C-Chain"),
        (43114, "Avalanche C-Chain"),
        (11155111, "Sepolia"),
    ]
    .into_iter()
    .map(|(id, name)| (id, name.to_string()))
    .collect()
}
