//! Validation Engine - Rule/Policy Separation
//!
//! Rules produce keyed findings. The validator folds them into the
//! error and warning maps; the pipeline decides what an error blocks.
//! Every run starts from an empty result.

use std::collections::{BTreeMap, HashSet};

use serde::{Deserialize, Serialize};
use tracing::debug;

use crate::address::{is_valid_address, is_zero_address};
use crate::allowlist::{PrecompileKind, Role};
use crate::config::{FieldKey, L1Config};
use crate::limits::{EngineLimits, GWEI};

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq, Eq)]
#[serde(rename_all = "snake_case")]
pub enum Severity {
    Error,
    Warning,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Finding {
    pub field: FieldKey,
    pub severity: Severity,
    pub message: String,
}

impl Finding {
    pub fn error(field: FieldKey, message: impl Into<String>) -> Self {
        Self { field, severity: Severity::Error, message: message.into() }
    }

    pub fn warning(field: FieldKey, message: impl Into<String>) -> Self {
        Self { field, severity: Severity::Warning, message: message.into() }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct ValidationResult {
    pub errors: BTreeMap<FieldKey, String>,
    pub warnings: BTreeMap<FieldKey, String>,
}

impl ValidationResult {
    pub fn has_errors(&self) -> bool {
        !self.errors.is_empty()
    }

    pub fn is_valid(&self) -> bool {
        self.errors.is_empty()
    }

    pub fn error(&self, field: FieldKey) -> Option<&str> {
        self.errors.get(&field).map(String::as_str)
    }

    pub fn warning(&self, field: FieldKey) -> Option<&str> {
        self.warnings.get(&field).map(String::as_str)
    }

    /// An input that never reached the model. It replaces whatever the rules said
    /// about the stale value still held for `field`.
    pub fn reject(&mut self, field: FieldKey, message: impl Into<String>) {
        self.errors.insert(field, message.into());
    }

    /// First finding per key and severity wins.
    fn record(&mut self, finding: Finding) {
        let map = match finding.severity {
            Severity::Error => &mut self.errors,
            Severity::Warning => &mut self.warnings,
        };
        map.entry(finding.field).or_insert(finding.message);
    }
}

/// Validation rule trait - produces findings
pub trait ValidationRule: Send + Sync {
    fn name(&self) -> &'static str;
    fn check(&self, config: &L1Config, limits: &EngineLimits) -> Vec<Finding>;
}

// --- Concrete Rules ---

pub struct ChainIdRule;

impl ValidationRule for ChainIdRule {
    fn name(&self) -> &'static str { "chain_id" }

    fn check(&self, config: &L1Config, limits: &EngineLimits) -> Vec<Finding> {
        let id = config.evm_chain_id;
        if id == 0 || id > limits.max_chain_id {
            return vec![Finding::error(
                FieldKey::EvmChainId,
                format!("Chain ID must be between 1 and {}", limits.max_chain_id),
            )];
        }
        match limits.reserved_chain_name(id) {
            Some(name) => vec![Finding::warning(
                FieldKey::EvmChainId,
                format!("Chain ID {} is already used by {}", id, name),
            )],
            None => vec![],
        }
    }
}

pub struct TokenIdentityRule;

impl ValidationRule for TokenIdentityRule {
    fn name(&self) -> &'static str { "token_identity" }

    fn check(&self, config: &L1Config, limits: &EngineLimits) -> Vec<Finding> {
        let mut findings = vec![];

        let name = &config.token_name;
        if name.trim().is_empty() {
            findings.push(Finding::error(FieldKey::TokenName, "Token name is required"));
        } else if name.chars().count() > limits.max_token_name_len {
            findings.push(Finding::error(
                FieldKey::TokenName,
                format!("Token name must be at most {} characters", limits.max_token_name_len),
            ));
        } else if !name.chars().all(|c| c.is_ascii_alphanumeric() || c == ' ') {
            findings.push(Finding::error(
                FieldKey::TokenName,
                "Token name may only contain letters, numbers and spaces",
            ));
        }

        let symbol = &config.token_symbol;
        let len = symbol.chars().count();
        if len < limits.min_token_symbol_len || len > limits.max_token_symbol_len {
            findings.push(Finding::error(
                FieldKey::TokenSymbol,
                format!(
                    "Token symbol must be {}-{} characters",
                    limits.min_token_symbol_len, limits.max_token_symbol_len
                ),
            ));
        } else if !symbol.chars().all(|c| c.is_ascii_uppercase() || c.is_ascii_digit()) {
            findings.push(Finding::error(
                FieldKey::TokenSymbol,
                "Token symbol may only contain uppercase letters and numbers",
            ));
        }

        findings
    }
}

pub struct GasLimitRule;

impl ValidationRule for GasLimitRule {
    fn name(&self) -> &'static str { "gas_limit" }

    fn check(&self, config: &L1Config, limits: &EngineLimits) -> Vec<Finding> {
        let gas_limit = config.gas_limit;
        if gas_limit < limits.min_gas_limit {
            vec![Finding::error(
                FieldKey::GasLimit,
                format!("Gas limit must be at least {}", limits.min_gas_limit),
            )]
        } else if gas_limit > limits.max_gas_limit {
            vec![Finding::error(
                FieldKey::GasLimit,
                format!("Gas limit must be at most {}", limits.max_gas_limit),
            )]
        } else if gas_limit < limits.recommended_min_gas_limit {
            vec![Finding::warning(
                FieldKey::GasLimit,
                format!(
                    "Gas limit below {} may limit throughput",
                    limits.recommended_min_gas_limit
                ),
            )]
        } else if gas_limit > limits.recommended_max_gas_limit {
            vec![Finding::warning(
                FieldKey::GasLimit,
                format!(
                    "Gas limit above {} may strain validator hardware",
                    limits.recommended_max_gas_limit
                ),
            )]
        } else {
            vec![]
        }
    }
}

pub struct BlockRateRule;

impl ValidationRule for BlockRateRule {
    fn name(&self) -> &'static str { "target_block_rate" }

    fn check(&self, config: &L1Config, limits: &EngineLimits) -> Vec<Finding> {
        let rate = config.target_block_rate;
        if !rate.is_finite() || rate < limits.min_target_block_rate {
            vec![Finding::error(
                FieldKey::TargetBlockRate,
                format!(
                    "Target block rate must be at least {} seconds",
                    limits.min_target_block_rate
                ),
            )]
        } else if rate > limits.max_target_block_rate {
            vec![Finding::error(
                FieldKey::TargetBlockRate,
                format!(
                    "Target block rate must be at most {} seconds",
                    limits.max_target_block_rate
                ),
            )]
        } else if rate > limits.recommended_max_target_block_rate {
            vec![Finding::warning(
                FieldKey::TargetBlockRate,
                format!(
                    "Block times above {} seconds make the chain feel slow",
                    limits.recommended_max_target_block_rate
                ),
            )]
        } else {
            vec![]
        }
    }
}

pub struct FeeConfigRule;

impl FeeConfigRule {
    fn non_negative(findings: &mut Vec<Finding>, field: FieldKey, value: i64) -> bool {
        if value < 0 {
            findings.push(Finding::error(field, format!("{} cannot be negative", field)));
            return false;
        }
        true
    }

    fn soft_max(findings: &mut Vec<Finding>, field: FieldKey, value: i64, max: i64) {
        if value > max {
            findings.push(Finding::warning(
                field,
                format!("{} above {} is unusually high", field, max),
            ));
        }
    }
}

impl ValidationRule for FeeConfigRule {
    fn name(&self) -> &'static str { "fee_config" }

    fn check(&self, config: &L1Config, limits: &EngineLimits) -> Vec<Finding> {
        let fee = &config.fee_config;
        let mut findings = vec![];

        if Self::non_negative(&mut findings, FieldKey::MinBaseFee, fee.min_base_fee) {
            if fee.min_base_fee > limits.max_min_base_fee {
                findings.push(Finding::error(
                    FieldKey::MinBaseFee,
                    format!("Min base fee must be at most {} gwei", limits.max_min_base_fee / GWEI),
                ));
            } else if fee.min_base_fee < limits.recommended_min_base_fee {
                findings.push(Finding::warning(
                    FieldKey::MinBaseFee,
                    format!(
                        "Min base fee below {} gwei leaves the chain open to spam",
                        limits.recommended_min_base_fee / GWEI
                    ),
                ));
            } else if fee.min_base_fee > limits.recommended_max_min_base_fee {
                findings.push(Finding::warning(
                    FieldKey::MinBaseFee,
                    format!(
                        "Min base fee above {} gwei makes transactions expensive",
                        limits.recommended_max_min_base_fee / GWEI
                    ),
                ));
            }
        }

        if Self::non_negative(&mut findings, FieldKey::TargetGas, fee.target_gas)
            && fee.target_gas < limits.recommended_min_target_gas
        {
            findings.push(Finding::warning(
                FieldKey::TargetGas,
                format!(
                    "Target gas below {} makes fees rise under light load",
                    limits.recommended_min_target_gas
                ),
            ));
        }

        let denominator = fee.base_fee_change_denominator;
        if denominator < limits.min_base_fee_change_denominator {
            findings.push(Finding::error(
                FieldKey::BaseFeeChangeDenominator,
                format!(
                    "Base fee change denominator must be at least {}",
                    limits.min_base_fee_change_denominator
                ),
            ));
        } else if denominator < limits.recommended_min_base_fee_change_denominator {
            findings.push(Finding::warning(
                FieldKey::BaseFeeChangeDenominator,
                "Small denominators make the base fee swing sharply between blocks",
            ));
        } else if denominator > limits.recommended_max_base_fee_change_denominator {
            findings.push(Finding::warning(
                FieldKey::BaseFeeChangeDenominator,
                "Large denominators make the base fee slow to react to load",
            ));
        }

        let min_ok = Self::non_negative(&mut findings, FieldKey::MinBlockGasCost, fee.min_block_gas_cost);
        if min_ok {
            Self::soft_max(
                &mut findings,
                FieldKey::MinBlockGasCost,
                fee.min_block_gas_cost,
                limits.recommended_max_min_block_gas_cost,
            );
        }

        if Self::non_negative(&mut findings, FieldKey::MaxBlockGasCost, fee.max_block_gas_cost) {
            if min_ok && fee.max_block_gas_cost < fee.min_block_gas_cost {
                findings.push(Finding::error(
                    FieldKey::MaxBlockGasCost,
                    "Max block gas cost must be greater than or equal to min block gas cost",
                ));
            } else {
                Self::soft_max(
                    &mut findings,
                    FieldKey::MaxBlockGasCost,
                    fee.max_block_gas_cost,
                    limits.recommended_max_max_block_gas_cost,
                );
            }
        }

        if Self::non_negative(&mut findings, FieldKey::BlockGasCostStep, fee.block_gas_cost_step) {
            Self::soft_max(
                &mut findings,
                FieldKey::BlockGasCostStep,
                fee.block_gas_cost_step,
                limits.recommended_max_block_gas_cost_step,
            );
        }

        findings
    }
}

/// Gas a chain can burn per 10 second window at full blocks.
pub fn static_pricing_threshold(gas_limit: i64, target_block_rate: f64) -> Option<f64> {
    if gas_limit <= 0 || !target_block_rate.is_finite() || target_block_rate <= 0.0 {
        return None;
    }
    Some((gas_limit as f64 * 10.0 / target_block_rate).ceil())
}

pub struct StaticPricingRule;

impl ValidationRule for StaticPricingRule {
    fn name(&self) -> &'static str { "static_pricing" }

    fn check(&self, config: &L1Config, limits: &EngineLimits) -> Vec<Finding> {
        let in_bounds = (limits.min_gas_limit..=limits.max_gas_limit).contains(&config.gas_limit)
            && config.target_block_rate >= limits.min_target_block_rate
            && config.target_block_rate <= limits.max_target_block_rate;
        if !in_bounds {
            return vec![];
        }
        let Some(threshold) = static_pricing_threshold(config.gas_limit, config.target_block_rate) else {
            return vec![];
        };

        let target_gas = config.fee_config.target_gas as f64;
        if target_gas < threshold {
            vec![]
        } else if target_gas <= threshold * limits.static_pricing_band {
            vec![Finding::warning(
                FieldKey::TargetGas,
                format!(
                    "Info: target gas is at or above the {} gas full blocks can use per 10s; \
                     the base fee will stay at its minimum (static gas pricing)",
                    threshold
                ),
            )]
        } else {
            vec![Finding::warning(
                FieldKey::TargetGas,
                format!(
                    "Target gas is far above the {} gas full blocks can use per 10s and can never be reached",
                    threshold
                ),
            )]
        }
    }
}

pub struct AllocationRule;

impl ValidationRule for AllocationRule {
    fn name(&self) -> &'static str { "token_allocations" }

    fn check(&self, config: &L1Config, _limits: &EngineLimits) -> Vec<Finding> {
        let allocations = &config.token_allocations;
        if allocations.is_empty() {
            return vec![Finding::error(
                FieldKey::TokenAllocations,
                "At least one token allocation is required",
            )];
        }

        let mut findings = vec![];
        let mut seen = HashSet::new();
        for (index, allocation) in allocations.iter().enumerate() {
            let position = index + 1;
            if !is_valid_address(&allocation.address) {
                findings.push(Finding::error(
                    FieldKey::TokenAllocations,
                    format!("Allocation #{} has an invalid address '{}'", position, allocation.address),
                ));
                continue;
            }
            if allocation.amount == 0 {
                findings.push(Finding::error(
                    FieldKey::TokenAllocations,
                    format!("Allocation #{} amount must be greater than 0", position),
                ));
            }
            if is_zero_address(&allocation.address) {
                findings.push(Finding::warning(
                    FieldKey::TokenAllocations,
                    format!("Allocation #{} sends tokens to the zero address", position),
                ));
            }
            if !seen.insert(allocation.address.to_ascii_lowercase()) {
                findings.push(Finding::warning(
                    FieldKey::TokenAllocations,
                    format!("Allocation #{} repeats an address; balances will be summed", position),
                ));
            }
        }
        findings
    }
}

/// One error per activated precompile at most.
pub struct AllowlistRule;

impl ValidationRule for AllowlistRule {
    fn name(&self) -> &'static str { "allowlists" }

    fn check(&self, config: &L1Config, _limits: &EngineLimits) -> Vec<Finding> {
        let mut findings = vec![];
        for kind in PrecompileKind::ALL {
            let allowlist = config.allowlist(kind);
            if !allowlist.activated {
                continue;
            }
            if allowlist.addresses.is_empty() {
                findings.push(Finding::error(
                    kind.field_key(),
                    format!("{} is activated but has no addresses", kind.display_name()),
                ));
                continue;
            }
            let invalid = [Role::Admin, Role::Manager, Role::Enabled]
                .into_iter()
                .flat_map(|role| {
                    allowlist.addresses.role(role).iter().map(move |address| (role, address))
                })
                .find(|(_, address)| !is_valid_address(address));
            if let Some((role, address)) = invalid {
                findings.push(Finding::error(
                    kind.field_key(),
                    format!(
                        "{}: invalid {:?} address '{}'",
                        kind.display_name(),
                        role,
                        address
                    ),
                ));
            }
        }
        findings
    }
}

/// Validator orchestrates rules against one set of limits
pub struct Validator {
    limits: EngineLimits,
    rules: Vec<Box<dyn ValidationRule>>,
}

impl Validator {
    pub fn new(limits: EngineLimits) -> Self {
        Self {
            limits,
            rules: vec![
                Box::new(ChainIdRule),
                Box::new(TokenIdentityRule),
                Box::new(GasLimitRule),
                Box::new(BlockRateRule),
                // ahead of FeeConfigRule so its targetGas advisory is the one kept
                Box::new(StaticPricingRule),
                Box::new(FeeConfigRule),
                Box::new(AllocationRule),
                Box::new(AllowlistRule),
            ],
        }
    }

    pub fn limits(&self) -> &EngineLimits {
        &self.limits
    }

    pub fn validate(&self, config: &L1Config) -> ValidationResult {
        let mut result = ValidationResult::default();

        for rule in &self.rules {
            let findings = rule.check(config, &self.limits);
            if !findings.is_empty() {
                debug!(rule = rule.name(), count = findings.len(), "rule produced findings");
            }
            for finding in findings {
                result.record(finding);
            }
        }

        result
    }
}

impl Default for Validator {
    fn default() -> Self {
        Self::new(EngineLimits::default())
    }
}
