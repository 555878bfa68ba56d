//! Allowlist Sub-model - Admin / Manager / Enabled roles
//!
//! Shared by the five access-control precompiles.

use serde::{Deserialize, Serialize};

use crate::config::FieldKey;

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PrecompileKind {
    ContractDeployerAllowList,
    NativeMinter,
    TxAllowList,
    FeeManager,
    RewardManager,
}

impl PrecompileKind {
    pub const ALL: [PrecompileKind; 5] = [
        PrecompileKind::ContractDeployerAllowList,
        PrecompileKind::NativeMinter,
        PrecompileKind::TxAllowList,
        PrecompileKind::FeeManager,
        PrecompileKind::RewardManager,
    ];

    /// Key of the precompile's block under `config` in the genesis document.
    pub fn genesis_key(self) -> &'static str {
        match self {
            PrecompileKind::ContractDeployerAllowList => "contractDeployerAllowListConfig",
            PrecompileKind::NativeMinter => "contractNativeMinterConfig",
            PrecompileKind::TxAllowList => "txAllowListConfig",
            PrecompileKind::FeeManager => "feeManagerConfig",
            PrecompileKind::RewardManager => "rewardManagerConfig",
        }
    }

    pub fn display_name(self) -> &'static str {
        match self {
            PrecompileKind::ContractDeployerAllowList => "Contract deployer allowlist",
            PrecompileKind::NativeMinter => "Native minter",
            PrecompileKind::TxAllowList => "Transaction allowlist",
            PrecompileKind::FeeManager => "Fee manager",
            PrecompileKind::RewardManager => "Reward manager",
        }
    }

    pub fn field_key(self) -> FieldKey {
        FieldKey::Precompile(self)
    }

    /// Fee and reward managers collapse all roles into one admin list.
    pub fn uses_role_tiers(self) -> bool {
        !matches!(self, PrecompileKind::FeeManager | PrecompileKind::RewardManager)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum Role {
    Admin,
    Manager,
    Enabled,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "PascalCase")]
pub struct RoleAddresses {
    #[serde(default)]
    pub admin: Vec<String>,
    #[serde(default)]
    pub manager: Vec<String>,
    #[serde(default)]
    pub enabled: Vec<String>,
}

impl RoleAddresses {
    pub fn role(&self, role: Role) -> &[String] {
        match role {
            Role::Admin => &self.admin,
            Role::Manager => &self.manager,
            Role::Enabled => &self.enabled,
        }
    }

    pub fn role_mut(&mut self, role: Role) -> &mut Vec<String> {
        match role {
            Role::Admin => &mut self.admin,
            Role::Manager => &mut self.manager,
            Role::Enabled => &mut self.enabled,
        }
    }

    /// Admin, then Manager, then Enabled, in insertion order.
    pub fn iter(&self) -> impl Iterator<Item = &String> {
        self.admin.iter().chain(&self.manager).chain(&self.enabled)
    }

    pub fn is_empty(&self) -> bool {
        self.admin.is_empty() && self.manager.is_empty() && self.enabled.is_empty()
    }

    /// All three roles flattened, keeping first occurrence (case-insensitive).
    pub fn union(&self) -> Vec<String> {
        let mut seen: Vec<String> = Vec::new();
        let mut out = Vec::new();
        for address in self.iter() {
            let folded = address.to_ascii_lowercase();
            if !seen.contains(&folded) {
                seen.push(folded);
                out.push(address.clone());
            }
        }
        out
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct AllowlistConfig {
    #[serde(default)]
    pub activated: bool,
    #[serde(default)]
    pub addresses: RoleAddresses,
}

impl AllowlistConfig {
    pub fn activated_with(role: Role, address: &str) -> Self {
        let mut config = Self {
            activated: true,
            addresses: RoleAddresses::default(),
        };
        config.addresses.role_mut(role).push(address.to_string());
        config
    }
}
