//! L1 Genesis CLI - Bridge interface for tooling
//!
//! Commands: catalog, validate, generate, size
//! Outputs JSON to stdout, logs to stderr
//! Returns 2 on validation failure or a generation fault

use clap::{Parser, Subcommand};
use serde_json::{json, Value};
use std::fs;
use std::path::{Path, PathBuf};
use std::process::ExitCode;
use tracing_subscriber::EnvFilter;

use l1_genesis_core::{
    catalog::{ContractArtifacts, CATALOG},
    content_digest, EditSession, EngineLimits, EngineMode, GenesisGenerator, GenesisOutput,
    GenesisRequest, PipelineSettings, SizeBudget, Validator, ENGINE_VERSION,
};

#[derive(Parser)]
#[command(name = "l1-genesis-cli")]
#[command(about = "L1 Genesis CLI - Genesis Document Compiler")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Use the chain-creation wizard limits instead of standalone ones
    #[arg(long)]
    embedded: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// List the preinstall catalog
    Catalog,

    /// Validate a request
    Validate {
        /// JSON file (GenesisRequest)
        #[arg(short, long)]
        request: PathBuf,
    },

    /// Generate a genesis document
    Generate {
        /// JSON file (GenesisRequest)
        #[arg(short, long)]
        request: PathBuf,

        /// Directory of contract artifact JSON files
        #[arg(short, long)]
        artifacts: Option<PathBuf>,

        /// Write the genesis document here
        #[arg(short, long)]
        out: Option<PathBuf>,

        /// Generate even when validation reports errors
        #[arg(long)]
        always_generate: bool,
    },

    /// Measure an existing genesis file against the size ceiling
    Size {
        #[arg(short, long)]
        document: PathBuf,
    },
}

fn print_json(value: &Value) {
    match serde_json::to_string_pretty(value) {
        Ok(text) => println!("{}", text),
        Err(e) => println!(r#"{{"error": "Failed to render output: {}"}}"#, e),
    }
}

fn load_request(path: &Path) -> Result<GenesisRequest, String> {
    let content = fs::read_to_string(path)
        .map_err(|e| format!("Failed to read {}: {}", path.display(), e))?;
    serde_json::from_str(&content).map_err(|e| format!("Invalid request: {}", e))
}

fn main() -> ExitCode {
    tracing_subscriber::fmt()
        .with_env_filter(EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new("warn")))
        .with_writer(std::io::stderr)
        .init();

    let cli = Cli::parse();
    let limits = EngineLimits::for_mode(if cli.embedded {
        EngineMode::Embedded
    } else {
        EngineMode::Standalone
    });

    match cli.command {
        Commands::Catalog => {
            let entries: Vec<_> = CATALOG
                .iter()
                .map(|entry| json!({
                    "id": entry.id,
                    "name": entry.name,
                    "address": entry.address,
                    "description": entry.description,
                    "linkedWith": entry.id.linked(),
                }))
                .collect();
            print_json(&Value::Array(entries));
            ExitCode::SUCCESS
        }

        Commands::Validate { request } => {
            let request = match load_request(&request) {
                Ok(r) => r,
                Err(e) => {
                    print_json(&json!({ "valid": false, "error": e }));
                    return ExitCode::FAILURE;
                }
            };

            let result = Validator::new(limits).validate(&request.config);
            print_json(&json!({
                "valid": result.is_valid(),
                "errors": result.errors,
                "warnings": result.warnings,
            }));
            if result.is_valid() {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::Generate { request, artifacts, out, always_generate } => {
            let request = match load_request(&request) {
                Ok(r) => r,
                Err(e) => {
                    print_json(&json!({ "success": false, "error": e }));
                    return ExitCode::FAILURE;
                }
            };

            let artifacts = match artifacts {
                Some(dir) => match ContractArtifacts::load_from_dir(&dir) {
                    Ok(a) => a,
                    Err(e) => {
                        print_json(&json!({ "success": false, "error": e.to_string() }));
                        return ExitCode::FAILURE;
                    }
                },
                None => ContractArtifacts::builtin(),
            };

            let settings = PipelineSettings { always_generate, ..Default::default() };
            let session = EditSession::new(request, limits, GenesisGenerator::new(artifacts), settings);
            let published = session.latest();

            let (success, document) = match &published.document {
                GenesisOutput::Compiled(genesis) => (true, genesis.value.clone()),
                GenesisOutput::Fault(message) => (false, json!(message)),
                GenesisOutput::Cleared => (false, json!("Validation failed; no document generated")),
            };

            if let (Some(path), Some(genesis)) = (out, published.document.compiled()) {
                if let Err(e) = fs::write(&path, &genesis.json) {
                    print_json(&json!({
                        "success": false,
                        "error": format!("Failed to write {}: {}", path.display(), e),
                    }));
                    return ExitCode::FAILURE;
                }
            }

            let content = published
                .document
                .compiled()
                .and_then(|genesis| content_digest(&genesis.value).ok());

            print_json(&json!({
                "success": success,
                "engineVersion": ENGINE_VERSION,
                "document": document,
                "validation": published.validation,
                "size": published.size,
                "digest": published.digest,
                "contentDigest": content,
            }));
            if success {
                ExitCode::SUCCESS
            } else {
                ExitCode::from(2)
            }
        }

        Commands::Size { document } => match fs::read_to_string(&document) {
            Ok(text) => {
                let report = SizeBudget::from_limits(&limits).measure(&text);
                print_json(&json!(report));
                ExitCode::SUCCESS
            }
            Err(e) => {
                print_json(&json!({
                    "error": format!("Failed to read {}: {}", document.display(), e),
                }));
                ExitCode::FAILURE
            }
        },
    }
}
