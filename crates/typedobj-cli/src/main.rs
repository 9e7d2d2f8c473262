//! # typedobj CLI entry point
//!
//! Parses command-line arguments, sets up logging and dispatches to the
//! subcommand handlers.

use std::path::PathBuf;
use std::process::ExitCode;

use clap::{Parser, Subcommand};
use tracing_subscriber::EnvFilter;

use typedobj_cli::canonicalize::{run_canonicalize, CanonicalizeArgs};
use typedobj_cli::extract::{run_extract, ExtractArgs};
use typedobj_cli::resolve_config;
use typedobj_cli::validate::{run_validate, ValidateArgs};

/// Typed-object validation, canonicalization and extraction.
#[derive(Parser, Debug)]
#[command(name = "typedobj", version, about, long_about = None)]
struct Cli {
    /// Enable verbose output. Repeat for more verbosity (-v, -vv, -vvv).
    #[arg(short, long, action = clap::ArgAction::Count, global = true)]
    verbose: u8,

    /// Path to a YAML engine configuration file.
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Key-sorting memory budget in bytes.
    #[arg(long, global = true, value_name = "BYTES")]
    sort_budget: Option<u64>,

    /// Spool payloads to this directory instead of keeping them in memory.
    #[arg(long, global = true, value_name = "DIR")]
    temp_dir: Option<PathBuf>,

    /// Emit logs as JSON lines.
    #[arg(long, global = true)]
    log_json: bool,

    #[command(subcommand)]
    command: Commands,
}

#[derive(Subcommand, Debug)]
enum Commands {
    /// Validate a document against a schema type, then canonicalize it.
    Validate(ValidateArgs),

    /// Sort a document into canonical form and print its MD5.
    Canonicalize(CanonicalizeArgs),

    /// Copy selected paths out of a document.
    Extract(ExtractArgs),
}

fn main() -> ExitCode {
    let cli = Cli::parse();

    // RUST_LOG wins over -v when set.
    let filter = EnvFilter::try_from_default_env().unwrap_or_else(|_| match cli.verbose {
        0 => EnvFilter::new("warn"),
        1 => EnvFilter::new("info"),
        2 => EnvFilter::new("debug"),
        _ => EnvFilter::new("trace"),
    });

    if cli.log_json {
        tracing_subscriber::fmt()
            .json()
            .with_env_filter(filter)
            .with_writer(std::io::stderr)
            .init();
    } else {
        tracing_subscriber::fmt()
            .with_env_filter(filter)
            .with_target(false)
            .with_writer(std::io::stderr)
            .init();
    }

    tracing::debug!("typedobj CLI starting");

    let result = resolve_config(cli.config.as_deref(), cli.sort_budget, cli.temp_dir).and_then(
        |config| match &cli.command {
            Commands::Validate(args) => run_validate(args, &config),
            Commands::Canonicalize(args) => run_canonicalize(args, &config),
            Commands::Extract(args) => run_extract(args, &config),
        },
    );

    match result {
        Ok(code) => ExitCode::from(code),
        Err(e) => {
            tracing::error!("{e:#}");
            ExitCode::from(1)
        }
    }
}
