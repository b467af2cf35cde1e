//! Convert command implementation.
//!
//! Rewrites a first generation (marshal) cdict in the current layout and
//! encoding, optionally renaming threads from a CSV thread map. A current
//! cdict is only accepted together with a thread map.

use super::models::ConvertArgs;
use super::utils::load_thread_map;
use crate::cdict::{remap_threads, upgrade_legacy, CdictFormat};
use crate::output::{cdict_path, read_cdict, write_cdict, CdictSummary};
use anyhow::{Context, Result};
use log::info;
use std::path::{Path, PathBuf};

/// Execute the convert command
///
/// **Public** - main entry point called from main.rs
///
/// # Errors
/// * Input cannot be read, or is already current and no thread map is given
/// * Thread map cannot be loaded
/// * Output cannot be written
pub fn execute_convert(args: ConvertArgs) -> Result<CdictSummary> {
    info!("Step 1/3: Reading {}...", args.input.display());
    let (log, format) = read_cdict(&args.input)
        .with_context(|| format!("Failed to read cdict {}", args.input.display()))?;

    if format == CdictFormat::MessagePack && args.thread_map.is_none() {
        anyhow::bail!(
            "{} is already in the current encoding, nothing to convert",
            args.input.display()
        );
    }
    info!("Read {} {} entries", log.len(), format.name());

    info!("Step 2/3: Rewriting records...");
    let mut converted = if format == CdictFormat::Marshal {
        let (upgraded, stats) = upgrade_legacy(&log);
        info!(
            "{} runtime records folded into {} switches",
            stats.runtime_records_folded, stats.switches_updated
        );
        upgraded
    } else {
        log
    };
    if let Some(path) = &args.thread_map {
        let map = load_thread_map(path)?;
        converted = remap_threads(&converted, &map).0;
    }

    let output = args
        .output
        .clone()
        .unwrap_or_else(|| default_output(&args.input));

    info!("Step 3/3: Writing {}...", output.display());
    let summary = write_cdict(&converted, &output).context("Failed to write converted cdict")?;

    info!("✓ Converted {} entries into {}", summary.entries, summary.path.display());
    Ok(summary)
}

/// `perf.cdict` becomes `perf.v2.cdict`
///
/// **Private** - internal helper for execute_convert
fn default_output(input: &Path) -> PathBuf {
    let resolved = cdict_path(input);
    let stem = resolved
        .file_stem()
        .map(|s| s.to_string_lossy().into_owned())
        .unwrap_or_else(|| "converted".to_string());
    resolved.with_file_name(format!("{}.v2", stem))
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_default_output() {
        assert_eq!(
            default_output(Path::new("/tmp/run/perf.cdict")),
            PathBuf::from("/tmp/run/perf.v2")
        );
        assert_eq!(default_output(Path::new("perf")), PathBuf::from("perf.v2"));
    }
}
