//! L1 Genesis Core - Genesis Document Compiler
//!
//! # Guarantees
//! 1. Validation is pure and rebuilt from scratch on every run
//! 2. Generation never throws; faults become readable document text
//! 3. Output is canonical: same config, same bytes (timestamps aside)
//! 4. Every document is measured against the 64 KiB transport ceiling
//! 5. Only the last edit of a burst is ever published

pub mod address;
pub mod allowlist;
pub mod catalog;
pub mod config;
pub mod genesis;
pub mod hashing;
pub mod limits;
pub mod pipeline;
pub mod size;
pub mod validation;

pub use allowlist::{AllowlistConfig, PrecompileKind, Role, RoleAddresses};
pub use catalog::{ContractArtifacts, PreinstallId, PreinstallSelections};
pub use config::{ConfigEdit, ConfigError, FeeConfig, FieldKey, L1Config, TokenAllocation, WarpConfig};
pub use genesis::{CompiledGenesis, GenerateError, GenesisGenerator, GenesisOutput, GenesisRequest};
pub use hashing::{canonical_json, content_digest, document_digest};
pub use limits::{EngineLimits, EngineMode};
pub use pipeline::{spawn_pipeline, EditSession, PipelineEvent, PipelineHandle, PipelineSettings, PipelineState, PublishedGenesis};
pub use size::{SizeBudget, SizeReport, SizeTier};
pub use validation::{ValidationResult, Validator};

pub const ENGINE_VERSION: &str = env!("CARGO_PKG_VERSION");
