//! Decode command implementation.
//!
//! The decode command:
//! 1. Opens the trace input and settles its format
//! 2. Sets up thread naming (procfs, name map)
//! 3. Runs every occurrence through one decode session
//! 4. Writes the cdict file (and the run report)

use super::models::DecodeArgs;
use crate::decoder::{decode_stream, EventDispatcher};
use crate::naming::{NameCache, ProcfsMetadata, UuidNameMap};
use crate::output::{write_cdict, write_report, RunReport};
use crate::parser::InputFormat;
use anyhow::{Context, Result};
use log::{debug, info, warn};
use std::fs::File;
use std::io::BufReader;
use std::time::Instant;

/// Execute the decode command
///
/// **Public** - main entry point called from main.rs
///
/// # Arguments
/// * `args` - Decode command arguments
///
/// # Returns
/// The run report, also written to disk when requested
///
/// # Errors
/// * Input file cannot be opened or holds a malformed line
/// * Name map cannot be loaded
/// * cdict or report cannot be written
pub fn execute_decode(args: DecodeArgs) -> Result<RunReport> {
    let start_time = Instant::now();

    info!("Decoding trace: {}", args.input.display());

    // Step 1: Open input
    info!("Step 1/4: Opening trace input...");
    let file = File::open(&args.input)
        .with_context(|| format!("Failed to open trace input {}", args.input.display()))?;
    let mut reader = BufReader::new(file);
    let format = match args.format.fixed() {
        Some(format) => format,
        None => InputFormat::detect(&mut reader).context("Failed to read trace input")?,
    };
    info!("Input format: {}", format.name());

    // Step 2: Thread naming
    info!("Step 2/4: Preparing thread naming...");
    let mut names = if args.use_procfs {
        NameCache::new(Box::new(ProcfsMetadata::new()))
    } else {
        debug!("procfs lookups disabled, thread names kept as traced");
        NameCache::offline()
    };
    if let Some(path) = &args.name_map {
        let map = UuidNameMap::load(path)
            .with_context(|| format!("Failed to load name map {}", path.display()))?;
        names = names.with_strategy(Box::new(map));
    }

    // Step 3: Decode
    info!("Step 3/4: Decoding occurrences...");
    let mut dispatcher = EventDispatcher::new(names);
    let occurrences = decode_stream(reader, format, &mut dispatcher)
        .with_context(|| format!("Failed to decode {}", args.input.display()))?;
    let session = dispatcher.finish();

    debug!(
        "{} occurrences read, {} records stored",
        occurrences,
        session.log.len()
    );
    if session.stats.dropped_runtime_samples > 0 {
        warn!(
            "{} runtime samples arrived before the first switch on their cpu and were dropped",
            session.stats.dropped_runtime_samples
        );
    }
    if session.tally.total_unhandled() > 0 {
        warn!(
            "{} occurrences of {} unhandled event kinds were ignored",
            session.tally.total_unhandled(),
            session.tally.unhandled.len()
        );
    }

    // Step 4: Write outputs
    info!("Step 4/4: Writing output files...");
    let summary = write_cdict(&session.log, &args.output).context("Failed to write cdict file")?;

    let report = RunReport::new(
        args.input.display().to_string(),
        format.name(),
        summary.path.display().to_string(),
        occurrences,
        summary.compressed_size,
        &session,
    );

    if let Some(report_path) = &args.report {
        write_report(&report, report_path).context("Failed to write run report")?;
        info!("✓ Run report written to: {}", report_path.display());
    }

    if args.print_summary {
        println!("\n{}", "=".repeat(80));
        println!("DECODE SUMMARY");
        println!("{}", "=".repeat(80));
        print!("{}", report.summary());
        println!("{}", "=".repeat(80));
    }

    let elapsed = start_time.elapsed();
    info!("Decode completed in {:.2}s", elapsed.as_secs_f64());

    Ok(report)
}

/// Validate decode arguments
///
/// **Public** - can be called before execute_decode for early validation
pub fn validate_args(args: &DecodeArgs) -> Result<()> {
    if args.input.as_os_str().is_empty() {
        anyhow::bail!("Input path cannot be empty");
    }

    if !args.input.is_file() {
        anyhow::bail!("Input file not found: {}", args.input.display());
    }

    if args.output.as_os_str().is_empty() {
        anyhow::bail!("Output path cannot be empty");
    }

    if let Some(path) = &args.name_map {
        if !path.is_file() {
            anyhow::bail!("Name map not found: {}", path.display());
        }
    }

    if args.report.as_ref().is_some_and(|report| report.as_os_str().is_empty()) {
        anyhow::bail!("Report path cannot be empty");
    }

    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::path::PathBuf;

    #[test]
    fn test_validate_args_missing_input() {
        let args = DecodeArgs {
            input: PathBuf::from("/nonexistent/trace.txt"),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_empty_input() {
        assert!(validate_args(&DecodeArgs::default()).is_err());
    }

    #[test]
    fn test_validate_args_missing_name_map() {
        let input = tempfile::NamedTempFile::new().unwrap();
        let args = DecodeArgs {
            input: input.path().to_path_buf(),
            name_map: Some(PathBuf::from("/nonexistent/names.toml")),
            ..Default::default()
        };
        assert!(validate_args(&args).is_err());
    }

    #[test]
    fn test_validate_args_valid() {
        let input = tempfile::NamedTempFile::new().unwrap();
        let args = DecodeArgs {
            input: input.path().to_path_buf(),
            ..Default::default()
        };
        assert!(validate_args(&args).is_ok());
    }
}
