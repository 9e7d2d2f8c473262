//! # Canonicalize Subcommand
//!
//! Sorts a document into canonical form and prints its MD5, without schema
//! validation or relabeling.

use std::path::PathBuf;

use anyhow::Result;
use clap::Args;

use typedobj_core::{EngineConfig, JsonSource};
use typedobj_idref::{IdMapping, IdReferenceTracker};
use typedobj_store::CanonicalPayload;

/// Arguments for the `typedobj canonicalize` subcommand.
#[derive(Args, Debug)]
pub struct CanonicalizeArgs {
    /// Document to canonicalize.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Write the canonical document here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,

    /// Only print the digest and size.
    #[arg(long)]
    pub digest_only: bool,
}

/// Execute the canonicalize subcommand.
pub fn run_canonicalize(args: &CanonicalizeArgs, config: &EngineConfig) -> Result<u8> {
    let temp_files = crate::temp_files(config)?;
    let mut payload = CanonicalPayload::new(
        JsonSource::file(&args.input),
        IdReferenceTracker::new(),
        IdMapping::new(),
    );
    payload.sort(config.sort_budget_bytes, temp_files.as_ref())?;

    if !args.digest_only {
        crate::emit(payload.reader()?, args.output.as_deref())?;
    }
    let summary = format!(
        "md5 {} size {}{}",
        payload.md5()?,
        payload.size()?,
        if payload.is_naturally_sorted()? { " (already sorted)" } else { "" }
    );
    if args.digest_only || args.output.is_some() {
        println!("{summary}");
    } else {
        eprintln!("{summary}");
    }
    payload.destroy();
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn sorts_into_output_file() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.json");
        let output = dir.path().join("out.json");
        std::fs::write(&input, r#"{"z": "a", "b": ["d", {"y": 1, "x": 2}]}"#).unwrap();
        let args = CanonicalizeArgs {
            input,
            output: Some(output.clone()),
            digest_only: false,
        };
        assert_eq!(run_canonicalize(&args, &EngineConfig::default()).unwrap(), 0);
        assert_eq!(
            std::fs::read_to_string(output).unwrap(),
            r#"{"b":["d",{"x":2,"y":1}],"z":"a"}"#
        );
    }

    #[test]
    fn budget_too_small_is_an_error() {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.json");
        std::fs::write(&input, r#"{"z": "a", "b": "d"}"#).unwrap();
        let spool = dir.path().join("spool");
        let config = EngineConfig {
            sort_budget_bytes: 100,
            temp_dir: Some(spool.clone()),
            ..EngineConfig::default()
        };
        let args = CanonicalizeArgs {
            input,
            output: None,
            digest_only: true,
        };
        let err = run_canonicalize(&args, &config).unwrap_err();
        assert!(err.to_string().contains("exceeds the limit 100 bytes"));
        assert_eq!(std::fs::read_dir(spool).unwrap().count(), 0);
    }

    #[test]
    fn missing_input_is_an_error() {
        let args = CanonicalizeArgs {
            input: PathBuf::from("/nonexistent/doc.json"),
            output: None,
            digest_only: true,
        };
        assert!(run_canonicalize(&args, &EngineConfig::default()).is_err());
    }
}
