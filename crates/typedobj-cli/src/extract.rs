//! # Extract Subcommand
//!
//! Copies parts of a document out into a new one, chosen either by a set
//! of JSON pointer paths (`--path`, repeatable; `*` matches any key and
//! `[*]` any array position) or by a single `--root` value.

use std::fs::File;
use std::path::PathBuf;

use anyhow::{bail, Context, Result};
use clap::Args;

use typedobj_core::EngineConfig;
use typedobj_store::{PayloadManager, SubsetSelection};

/// Arguments for the `typedobj extract` subcommand.
#[derive(Args, Debug)]
pub struct ExtractArgs {
    /// Document to extract from.
    #[arg(value_name = "FILE")]
    pub input: PathBuf,

    /// Path to keep, e.g. `/features/*/name`. Repeat for several.
    #[arg(long = "path", value_name = "POINTER")]
    pub paths: Vec<String>,

    /// Fail when a selected object key is missing.
    #[arg(long)]
    pub strict_maps: bool,

    /// Tolerate selected array positions that do not exist.
    #[arg(long)]
    pub no_strict_arrays: bool,

    /// Extract the single value at this `/`-separated path instead.
    #[arg(long, value_name = "PATH", conflicts_with = "paths")]
    pub root: Option<String>,

    /// Write the result here instead of stdout.
    #[arg(short, long, value_name = "FILE")]
    pub output: Option<PathBuf>,
}

/// Execute the extract subcommand.
pub fn run_extract(args: &ExtractArgs, config: &EngineConfig) -> Result<u8> {
    if args.paths.is_empty() && args.root.is_none() {
        bail!("nothing to extract: give --path or --root");
    }
    let manager = PayloadManager::new(crate::temp_files(config)?);
    let input = File::open(&args.input)
        .with_context(|| format!("opening {}", args.input.display()))?;
    let parent = manager.create(input, false, false)?;

    let subset = match &args.root {
        Some(root) => manager.get_sub_object(&parent, root),
        None => {
            let selection = SubsetSelection::new(&args.paths)?
                .with_strict_maps(args.strict_maps)
                .with_strict_arrays(!args.no_strict_arrays);
            manager.get_subdata_extraction(&parent, &selection)
        }
    };
    let subset = match subset {
        Ok(subset) => subset,
        Err(e) => {
            parent.destroy();
            return Err(e.into());
        }
    };
    tracing::info!(size = subset.size()?, "extracted subset");

    let written = crate::emit(subset.reader()?, args.output.as_deref());
    subset.destroy();
    written?;
    Ok(0)
}

#[cfg(test)]
mod tests {
    use super::*;

    const DOC: &str = r#"{"a": {"b": [1, 2, 3], "c": "x"}, "d": true}"#;

    fn fixture() -> (tempfile::TempDir, ExtractArgs) {
        let dir = tempfile::tempdir().unwrap();
        let input = dir.path().join("doc.json");
        std::fs::write(&input, DOC).unwrap();
        let output = dir.path().join("out.json");
        let args = ExtractArgs {
            input,
            paths: Vec::new(),
            strict_maps: false,
            no_strict_arrays: false,
            root: None,
            output: Some(output),
        };
        (dir, args)
    }

    fn output(args: &ExtractArgs) -> String {
        std::fs::read_to_string(args.output.as_ref().unwrap()).unwrap()
    }

    #[test]
    fn extracts_selected_paths() {
        let (_dir, mut args) = fixture();
        args.paths = vec!["/a/b/1".to_string(), "/d".to_string()];
        assert_eq!(run_extract(&args, &EngineConfig::default()).unwrap(), 0);
        assert_eq!(output(&args), r#"{"a":{"b":[2]},"d":true}"#);
    }

    #[test]
    fn extracts_root_value_through_spool() {
        let (dir, mut args) = fixture();
        let spool = dir.path().join("spool");
        args.root = Some("a/c".to_string());
        let config = EngineConfig {
            temp_dir: Some(spool.clone()),
            ..EngineConfig::default()
        };
        assert_eq!(run_extract(&args, &config).unwrap(), 0);
        assert_eq!(output(&args), r#""x""#);
        assert_eq!(std::fs::read_dir(spool).unwrap().count(), 0);
    }

    #[test]
    fn strictness_flags_apply() {
        let (_dir, mut args) = fixture();
        args.paths = vec!["/a/b/7".to_string(), "/q".to_string()];
        assert!(run_extract(&args, &EngineConfig::default()).is_err());

        args.no_strict_arrays = true;
        assert_eq!(run_extract(&args, &EngineConfig::default()).unwrap(), 0);
        assert_eq!(output(&args), r#"{"a":{"b":[]}}"#);

        args.strict_maps = true;
        assert!(run_extract(&args, &EngineConfig::default()).is_err());
    }

    #[test]
    fn requires_a_selection() {
        let (_dir, args) = fixture();
        assert!(run_extract(&args, &EngineConfig::default()).is_err());
    }
}
