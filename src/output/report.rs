//! Run report of a decode session.
//!
//! The report is versioned so downstream tooling can check what it reads.

use super::prepare_output_path;
use crate::decoder::{sorted_by_count, DecodeOutput, EventTally};
use crate::utils::config::REPORT_SCHEMA_VERSION;
use crate::utils::error::OutputError;
use chrono::Utc;
use log::{debug, info};
use serde::{Deserialize, Serialize};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::Path;

/// End-of-run report written next to the cdict file
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RunReport {
    /// Schema version for compatibility checking
    pub version: String,

    /// Timestamp when the report was generated
    pub generated_at: String,

    /// Trace input that was decoded
    pub input: String,

    /// Input format used (`perf-text` or `raw`)
    pub input_format: String,

    /// cdict file written
    pub output: String,

    /// Occurrences read from the input
    pub occurrences: u64,

    /// Records stored in the cdict
    pub entries: usize,

    /// Size of the cdict file in bytes
    pub compressed_size: usize,

    /// Absolute time (usecs) the stored `usecs` column is relative to
    #[serde(skip_serializing_if = "Option::is_none")]
    pub epoch_usecs: Option<u64>,

    /// Threads resolved to a display name
    pub named_threads: usize,

    /// Threads recognized as qemu vcpu/emulator threads
    pub virt_threads: usize,

    /// Threads that entered or exited a guest
    #[serde(default)]
    pub kvm_threads: usize,

    /// Runtime samples seen before the first switch on their cpu
    pub dropped_runtime_samples: u64,

    /// Per-event handled / stored / dropped / unhandled counts
    pub events: EventTally,
}

impl RunReport {
    /// Build a report from a finished session
    ///
    /// **Public** - called once the cdict file is written
    pub fn new(
        input: impl Into<String>,
        input_format: impl Into<String>,
        output: impl Into<String>,
        occurrences: u64,
        compressed_size: usize,
        session: &DecodeOutput,
    ) -> Self {
        Self {
            version: REPORT_SCHEMA_VERSION.to_string(),
            generated_at: Utc::now().to_rfc3339(),
            input: input.into(),
            input_format: input_format.into(),
            output: output.into(),
            occurrences,
            entries: session.log.len(),
            compressed_size,
            epoch_usecs: session.stats.epoch_usecs,
            named_threads: session.stats.named_threads,
            virt_threads: session.stats.virt_threads,
            kvm_threads: session.stats.kvm_threads,
            dropped_runtime_samples: session.stats.dropped_runtime_samples,
            events: session.tally.clone(),
        }
    }

    /// Get human-readable summary
    ///
    /// **Public** - printed by `decode --summary`
    pub fn summary(&self) -> String {
        let mut out = String::new();
        out.push_str(&format!("Input:        {} ({})\n", self.input, self.input_format));
        out.push_str(&format!("Output:       {}\n", self.output));
        out.push_str(&format!("Occurrences:  {}\n", self.occurrences));
        out.push_str(&format!(
            "Stored:       {} entries, {} bytes compressed\n",
            self.entries, self.compressed_size
        ));
        out.push_str(&format!(
            "Threads:      {} named, {} virtual, {} in kvm\n",
            self.named_threads, self.virt_threads, self.kvm_threads
        ));
        if self.dropped_runtime_samples > 0 {
            out.push_str(&format!(
                "Runtime samples before first switch: {}\n",
                self.dropped_runtime_samples
            ));
        }
        out.push('\n');

        if !self.events.handled.is_empty() {
            out.push_str("Handled events:\n");
            for (name, count) in sorted_by_count(&self.events.handled) {
                out.push_str(&format!("   {:>8} {}\n", count, name));
            }
            out.push('\n');
        }
        out.push_str(&self.events.summary());
        out
    }
}

/// Write a run report to a JSON file
///
/// **Public** - main entry point for report output
///
/// # Errors
/// * `OutputError::InvalidPath` - path cannot be created or is invalid
/// * `OutputError::WriteFailed` - I/O error during write
/// * `OutputError::SerializationFailed` - JSON serialization error
pub fn write_report(report: &RunReport, output_path: impl AsRef<Path>) -> Result<(), OutputError> {
    let output_path = output_path.as_ref();

    info!("Writing run report to: {}", output_path.display());
    prepare_output_path(output_path)?;

    let file = File::create(output_path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);
    serde_json::to_writer_pretty(&mut writer, report)?;
    writer.flush().map_err(OutputError::WriteFailed)?;

    Ok(())
}

/// Read a run report from a JSON file
///
/// **Public** - useful for tests and tooling
///
/// # Errors
/// * `OutputError::ReadFailed` - file read error
/// * `OutputError::SerializationFailed` - JSON parse error
pub fn read_report(input_path: impl AsRef<Path>) -> Result<RunReport, OutputError> {
    let input_path = input_path.as_ref();

    debug!("Reading run report from: {}", input_path.display());

    let file = File::open(input_path).map_err(OutputError::ReadFailed)?;
    let report: RunReport = serde_json::from_reader(file)?;

    debug!(
        "Run report loaded: version {}, {} entries",
        report.version, report.entries
    );

    Ok(report)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdict::EventLog;
    use crate::decoder::SessionStats;
    use pretty_assertions::assert_eq;
    use tempfile::NamedTempFile;

    fn create_test_session() -> DecodeOutput {
        let mut tally = EventTally::new();
        tally.count_handled("sched_switch");
        tally.count_stored("sched-switch");
        tally.count_dropped("sched_wakeup");
        DecodeOutput {
            log: EventLog::new(),
            tally,
            stats: SessionStats {
                epoch_usecs: Some(622_048_897_809),
                named_threads: 3,
                virt_threads: 1,
                dropped_runtime_samples: 2,
                kvm_threads: 4,
            },
        }
    }

    #[test]
    fn test_write_and_read_report() {
        let report = RunReport::new("trace.txt", "perf-text", "perf.cdict", 10, 64, &create_test_session());
        let temp_file = NamedTempFile::new().unwrap();

        write_report(&report, temp_file.path()).unwrap();
        let loaded = read_report(temp_file.path()).unwrap();

        assert_eq!(loaded, report);
        assert_eq!(loaded.version, REPORT_SCHEMA_VERSION);
    }

    #[test]
    fn test_summary_lists_sections() {
        let report = RunReport::new("trace.txt", "perf-text", "perf.cdict", 10, 64, &create_test_session());
        let summary = report.summary();
        assert!(summary.contains("Handled events:"));
        assert!(summary.contains("sched_wakeup"));
        assert!(summary.contains("Runtime samples before first switch: 2"));
        assert!(summary.contains("3 named, 1 virtual, 4 in kvm"));
    }

    #[test]
    fn test_written_report_is_complete_json() {
        let report = RunReport::new("trace.txt", "perf-text", "perf.cdict", 10, 64, &create_test_session());
        let dir = tempfile::tempdir().unwrap();
        let path = dir.path().join("nested/report.json");

        write_report(&report, &path).unwrap();

        let text = std::fs::read_to_string(&path).unwrap();
        assert!(text.trim_end().ends_with('}'));
        let value: serde_json::Value = serde_json::from_str(&text).unwrap();
        assert_eq!(value["kvm_threads"], 4);
    }

    #[test]
    fn test_write_report_below_a_file_is_an_error() {
        let report = RunReport::new("trace.txt", "perf-text", "perf.cdict", 10, 64, &create_test_session());
        let file = NamedTempFile::new().unwrap();
        // a regular file cannot be a parent directory
        let path = file.path().join("report.json");
        assert!(matches!(
            write_report(&report, &path),
            Err(OutputError::WriteFailed(_))
        ));
    }
}
