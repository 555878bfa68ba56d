//! Preinstall Catalog - Optional Standard Contracts
//!
//! Fixed addresses and toggles for the contracts a chain can ship with
//! at genesis. Runtime bytecode comes from an artifact registry.

use std::collections::{BTreeMap, HashMap};
use std::fmt;
use std::fs;
use std::path::Path;
use std::str::FromStr;

use serde::{Deserialize, Serialize};
use thiserror::Error;
use tracing::warn;

#[derive(Debug, Error)]
pub enum CatalogError {
    #[error("Unknown preinstall: {0}")]
    UnknownContract(String),

    #[error("Failed to read artifacts: {0}")]
    Io(#[from] std::io::Error),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub enum PreinstallId {
    Proxy,
    ProxyAdmin,
    Multicall,
    Create2Deployer,
    SafeSingletonFactory,
    InterchainMessenger,
    WrappedNativeToken,
}

impl PreinstallId {
    pub const ALL: [PreinstallId; 7] = [
        PreinstallId::Proxy,
        PreinstallId::ProxyAdmin,
        PreinstallId::Multicall,
        PreinstallId::Create2Deployer,
        PreinstallId::SafeSingletonFactory,
        PreinstallId::InterchainMessenger,
        PreinstallId::WrappedNativeToken,
    ];

    pub fn as_str(self) -> &'static str {
        match self {
            PreinstallId::Proxy => "proxy",
            PreinstallId::ProxyAdmin => "proxyAdmin",
            PreinstallId::Multicall => "multicall",
            PreinstallId::Create2Deployer => "create2Deployer",
            PreinstallId::SafeSingletonFactory => "safeSingletonFactory",
            PreinstallId::InterchainMessenger => "interchainMessenger",
            PreinstallId::WrappedNativeToken => "wrappedNativeToken",
        }
    }

    /// The other half of a lockstep pair.
    pub fn linked(self) -> Option<PreinstallId> {
        match self {
            PreinstallId::Proxy => Some(PreinstallId::ProxyAdmin),
            PreinstallId::ProxyAdmin => Some(PreinstallId::Proxy),
            _ => None,
        }
    }
}

impl fmt::Display for PreinstallId {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

impl FromStr for PreinstallId {
    type Err = CatalogError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        PreinstallId::ALL
            .into_iter()
            .find(|id| id.as_str() == s)
            .ok_or_else(|| CatalogError::UnknownContract(s.to_string()))
    }
}

#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CatalogEntry {
    pub id: PreinstallId,
    pub name: &'static str,
    pub address: &'static str,
    pub description: &'static str,
}

pub const CATALOG: [CatalogEntry; 7] = [
    CatalogEntry {
        id: PreinstallId::Proxy,
        name: "TransparentUpgradeableProxy",
        address: "0xfacade0000000000000000000000000000000000",
        description: "Upgradeable proxy administered by the proxy admin",
    },
    CatalogEntry {
        id: PreinstallId::ProxyAdmin,
        name: "ProxyAdmin",
        address: "0xdad0000000000000000000000000000000000000",
        description: "Admin contract owned by the genesis owner",
    },
    CatalogEntry {
        id: PreinstallId::Multicall,
        name: "Multicall3",
        address: "0xcA11bde05977b3631167028862bE2a173976CA11",
        description: "Batch read calls in a single request",
    },
    CatalogEntry {
        id: PreinstallId::Create2Deployer,
        name: "Deterministic Deployment Proxy",
        address: "0x4e59b44847b379578588920ca78fbf26c0b4956c",
        description: "CREATE2 factory for deterministic addresses",
    },
    CatalogEntry {
        id: PreinstallId::SafeSingletonFactory,
        name: "Safe Singleton Factory",
        address: "0x914d7Fec6aaC8cd542e72Bca78B30650d45643d7",
        description: "Factory used to deploy Safe multisig singletons",
    },
    CatalogEntry {
        id: PreinstallId::InterchainMessenger,
        name: "TeleporterMessenger",
        address: "0x253b2784c75e510dD0fF1da844684a1aC0aa5fcf",
        description: "Interchain messaging over Warp",
    },
    CatalogEntry {
        id: PreinstallId::WrappedNativeToken,
        name: "WrappedNativeToken",
        address: "0x1000000000000000000000000000000000000001",
        description: "ERC-20 wrapper around the native gas token",
    },
];

pub fn entry(id: PreinstallId) -> &'static CatalogEntry {
    // CATALOG is declared in PreinstallId::ALL order
    &CATALOG[id as usize]
}

/// Runtime code of the deterministic deployment proxy, shared by the Safe factory.
const DETERMINISTIC_DEPLOYER_CODE: &str = "0x7fffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffffe03601600081602082378035828234f58015156039578182fd5b8082525050506014600cf3";

/// On/off flags keyed by contract id. Proxy and proxy admin move together.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "BTreeMap<PreinstallId, bool>", into = "BTreeMap<PreinstallId, bool>")]
pub struct PreinstallSelections {
    enabled: BTreeMap<PreinstallId, bool>,
}

impl PreinstallSelections {
    pub fn none() -> Self {
        Self::default()
    }

    pub fn is_enabled(&self, id: PreinstallId) -> bool {
        self.enabled.get(&id).copied().unwrap_or(false)
    }

    pub fn set(&mut self, id: PreinstallId, on: bool) {
        self.enabled.insert(id, on);
        if let Some(partner) = id.linked() {
            self.enabled.insert(partner, on);
        }
    }

    pub fn toggle(&mut self, id: PreinstallId) {
        let on = !self.is_enabled(id);
        self.set(id, on);
    }

    /// Selected ids in catalog order.
    pub fn selected(&self) -> impl Iterator<Item = PreinstallId> + '_ {
        PreinstallId::ALL.into_iter().filter(|id| self.is_enabled(*id))
    }
}

impl From<BTreeMap<PreinstallId, bool>> for PreinstallSelections {
    /// A half-enabled linked pair comes out fully enabled.
    fn from(raw: BTreeMap<PreinstallId, bool>) -> Self {
        let mut selections = Self::default();
        for (id, on) in &raw {
            let partner_on = id.linked().map_or(false, |p| raw.get(&p).copied().unwrap_or(false));
            selections.set(*id, *on || partner_on);
        }
        selections
    }
}

impl From<PreinstallSelections> for BTreeMap<PreinstallId, bool> {
    fn from(selections: PreinstallSelections) -> Self {
        selections.enabled
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ContractArtifact {
    pub id: PreinstallId,
    pub deployed_bytecode: String,
}

fn is_bytecode(code: &str) -> bool {
    code.strip_prefix("0x")
        .map_or(false, |body| !body.is_empty() && hex::decode(body).is_ok())
}

/// Artifact registry - runtime bytecode per preinstall
#[derive(Debug, Clone)]
pub struct ContractArtifacts {
    bytecode: HashMap<PreinstallId, String>,
}

impl ContractArtifacts {
    pub fn empty() -> Self {
        Self { bytecode: HashMap::new() }
    }

    /// Artifacts that ship with the engine.
    pub fn builtin() -> Self {
        let mut artifacts = Self::empty();
        artifacts.register(PreinstallId::Create2Deployer, DETERMINISTIC_DEPLOYER_CODE);
        artifacts.register(PreinstallId::SafeSingletonFactory, DETERMINISTIC_DEPLOYER_CODE);
        artifacts
    }

    /// Builtins overlaid with every `*.json` artifact in `dir`. Unreadable files are skipped.
    pub fn load_from_dir(dir: &Path) -> Result<Self, CatalogError> {
        let mut artifacts = Self::builtin();
        if dir.exists() {
            for entry in fs::read_dir(dir)? {
                let path = entry?.path();
                if path.extension().map_or(false, |e| e == "json") {
                    let parsed = fs::read_to_string(&path)
                        .ok()
                        .and_then(|content| serde_json::from_str::<ContractArtifact>(&content).ok());
                    match parsed {
                        Some(artifact) if is_bytecode(&artifact.deployed_bytecode) => {
                            artifacts.bytecode.insert(artifact.id, artifact.deployed_bytecode);
                        }
                        _ => warn!(path = %path.display(), "skipping unusable contract artifact"),
                    }
                }
            }
        }
        Ok(artifacts)
    }

    pub fn register(&mut self, id: PreinstallId, code: impl Into<String>) {
        self.bytecode.insert(id, code.into());
    }

    pub fn get(&self, id: PreinstallId) -> Option<&str> {
        self.bytecode.get(&id).map(String::as_str)
    }
}

impl Default for ContractArtifacts {
    fn default() -> Self {
        Self::builtin()
    }
}
