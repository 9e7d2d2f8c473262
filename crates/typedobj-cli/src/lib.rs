#![deny(missing_docs)]

//! # typedobj-cli — Command-Line Driver for the Typed-Object Engine
//!
//! Provides the `typedobj` command. Each subcommand is a thin layer over
//! the library crates; all real work happens there.
//!
//! ## Subcommands
//!
//! - `typedobj validate`: Validate a document against a type from a schema
//!   directory, then relabel, sort and hash it.
//! - `typedobj canonicalize`: Sort and hash a document with no schema.
//! - `typedobj extract`: Copy selected paths (or one root value) out of a
//!   document.
//!
//! ```bash
//! typedobj validate --schemas schemas/ --type Geo.Point-1.0 point.json
//! typedobj --temp-dir /tmp/spool canonicalize big.json -o big.sorted.json
//! typedobj extract doc.json --path /a/b --path /c
//! ```
//!
//! ## Configuration
//!
//! Settings come from an optional YAML file (`--config`), then `TYPEDOBJ_*`
//! environment variables, then command-line flags. See
//! [`typedobj_core::EngineConfig`].

pub mod canonicalize;
pub mod extract;
pub mod validate;

use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Arc;

use anyhow::{Context, Result};
use typedobj_core::EngineConfig;
use typedobj_store::TempFilesManager;

/// Load configuration and apply command-line overrides on top of it.
pub fn resolve_config(
    config: Option<&Path>,
    sort_budget: Option<u64>,
    temp_dir: Option<PathBuf>,
) -> Result<EngineConfig> {
    let mut resolved = EngineConfig::load(config).context("loading configuration")?;
    if let Some(budget) = sort_budget {
        resolved.sort_budget_bytes = budget;
    }
    if temp_dir.is_some() {
        resolved.temp_dir = temp_dir;
    }
    tracing::debug!(
        sort_budget = resolved.sort_budget_bytes,
        max_unique_ids = resolved.max_unique_ids,
        temp_dir = ?resolved.temp_dir,
        "resolved configuration"
    );
    Ok(resolved)
}

/// The spool manager for `config`, or `None` when running in memory.
pub fn temp_files(config: &EngineConfig) -> Result<Option<Arc<TempFilesManager>>> {
    config
        .temp_dir
        .as_deref()
        .map(|dir| {
            TempFilesManager::new(dir)
                .with_context(|| format!("preparing spool directory {}", dir.display()))
        })
        .transpose()
}

/// Copy `reader` to `path`, or to stdout (newline-terminated) when `path`
/// is `None`.
pub(crate) fn emit(mut reader: impl Read, path: Option<&Path>) -> Result<u64> {
    match path {
        Some(path) => {
            let mut file = std::fs::File::create(path)
                .with_context(|| format!("creating {}", path.display()))?;
            Ok(std::io::copy(&mut reader, &mut file)?)
        }
        None => {
            let mut stdout = std::io::stdout().lock();
            let written = std::io::copy(&mut reader, &mut stdout)?;
            stdout.write_all(b"\n")?;
            stdout.flush()?;
            Ok(written)
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn flags_override_config_file() {
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("engine.yaml");
        std::fs::write(&path, "sort_budget_bytes: 10\nmax_unique_ids: 3\n").unwrap();

        let config = resolve_config(Some(&path), None, None).unwrap();
        assert_eq!(config.max_unique_ids, 3);

        let spool = dir.path().join("spool");
        let config = resolve_config(Some(&path), Some(99), Some(spool.clone())).unwrap();
        assert_eq!(config.sort_budget_bytes, 99);
        assert_eq!(config.temp_dir.as_deref(), Some(spool.as_path()));
        assert!(temp_files(&config).unwrap().is_some());
        assert!(spool.is_dir());
    }

    #[test]
    fn missing_config_file_is_an_error() {
        let err = resolve_config(Some(Path::new("/nonexistent/engine.yaml")), None, None).unwrap_err();
        assert!(format!("{err:#}").contains("loading configuration"));
    }
}
