//! # Validate Subcommand
//!
//! Validates a document against a type from a schema directory. A valid
//! document is then relabeled with an optional ID mapping, sorted into
//! canonical form and hashed.
//!
//! The mapping file is a flat JSON object of `"original": "replacement"`
//! pairs, applied to every ID type.
//!
//! When the type declares `metadata-ws` on its root, the extracted metadata
//! is printed as a JSON object after the summary line.

use std::collections::BTreeMap;
use std::path::PathBuf;

use anyhow::{Context, Result};
use clap::Args;

use typedobj_core::{EngineConfig, JsonSource};
use typedobj_idref::IdMapping;
use typedobj_schema::{SchemaRegistry, TypeDefId, TypedObjectValidator};
use typedobj_store::{CanonicalPayload, MetadataSelection};

/// Arguments for the `typedobj validate` subcommand.
#[derive(Args, Debug)]
pub struct ValidateArgs {
    /// Directory of `*.schema.json` type definitions.
    #[arg(long = "schemas", value_name = "DIR")]
    pub schema_dir: PathBuf,

    /// Type to validate against, e.g. `Geo.Point-1.0`.
    #[arg(long = "type", value_name = "TYPE")]
    pub type_id: String,

    /// Document to validate.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// JSON object mapping original IDs to their replacements.
    #[arg(long, value_name = "FILE")]
    pub mapping: Option<PathBuf>,

    /// Write the canonical document here.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Largest extracted object metadata accepted, in bytes.
    #[arg(long, value_name = "BYTES", default_value_t = DEFAULT_MAX_METADATA_SIZE)]
    pub max_metadata_size: u64,
}

/// Default limit for extracted object metadata.
pub const DEFAULT_MAX_METADATA_SIZE: u64 = 16_000;

/// Execute the validate subcommand.
pub fn run_validate(args: &ValidateArgs, config: &EngineConfig) -> Result<u8> {
    let type_id: TypeDefId = args.type_id.parse()?;
    let registry = SchemaRegistry::from_dir(&args.schema_dir)
        .with_context(|| format!("loading schemas from {}", args.schema_dir.display()))?;
    tracing::info!(schemas = registry.len(), "schema registry loaded");

    let source = JsonSource::file(&args.input);
    let validator = TypedObjectValidator::from_config(registry, config);
    let report = validator
        .validate(&type_id, source.open()?)
        .with_context(|| format!("validating {}", args.input.display()))?;

    if !report.is_valid() {
        for error in report.errors() {
            eprintln!("  ERROR: {error}");
        }
        eprintln!(
            "FAIL: {} is not a valid {type_id} ({} errors)",
            args.input.display(),
            report.error_count()
        );
        return Ok(1);
    }

    let id_count = report.id_references().len();
    let selection = report
        .root_metadata_selection()
        .map(MetadataSelection::from_value)
        .transpose()?;
    let mapping = match &args.mapping {
        Some(path) => load_mapping(path)?,
        None => IdMapping::new(),
    };
    let temp_files = crate::temp_files(config)?;

    let mut payload = CanonicalPayload::new(source, report.into_tracker(), mapping);
    if let Some(selection) = selection {
        payload = payload.with_metadata_selection(selection);
    }
    payload.sort(config.sort_budget_bytes, temp_files.as_ref())?;
    println!(
        "OK: {} is a valid {type_id} (size {}, md5 {}, {id_count} id references)",
        args.input.display(),
        payload.size()?,
        payload.md5()?,
    );
    let metadata = payload.extract_metadata(args.max_metadata_size)?;
    if !metadata.is_empty() {
        println!("{}", serde_json::to_string(&metadata)?);
    }
    if let Some(output) = &args.output {
        crate::emit(payload.reader()?, Some(output.as_path()))?;
    }
    payload.destroy();
    Ok(0)
}

fn load_mapping(path: &std::path::Path) -> Result<IdMapping> {
    let text = std::fs::read_to_string(path)
        .with_context(|| format!("reading id mapping {}", path.display()))?;
    let pairs: BTreeMap<String, String> = serde_json::from_str(&text)
        .with_context(|| format!("parsing id mapping {}", path.display()))?;
    Ok(pairs.into_iter().collect())
}
