//! Output writers for cdict files and run reports.
//!
//! This module handles writing data to disk:
//! - Compressed cdict event logs (and reading them back)
//! - JSON run reports
//! - Text summaries

pub mod cdict_file;
pub mod report;

use crate::utils::error::OutputError;
use log::debug;
use std::path::Path;

// Re-export main functions
pub use cdict_file::{cdict_path, read_cdict, write_cdict, CdictSummary};
pub use report::{read_report, write_report, RunReport};

/// Validate that output path is writable and create its parent directories
///
/// **Private** - shared by the writers of this module
fn prepare_output_path(path: &Path) -> Result<(), OutputError> {
    if path.as_os_str().is_empty() {
        return Err(OutputError::InvalidPath("Path is empty".to_string()));
    }

    if path.is_dir() {
        return Err(OutputError::InvalidPath(format!(
            "Path is a directory: {}",
            path.display()
        )));
    }

    if let Some(parent) = path.parent() {
        if !parent.as_os_str().is_empty() && !parent.exists() {
            debug!("Creating parent directories: {}", parent.display());
            std::fs::create_dir_all(parent).map_err(|e| {
                OutputError::InvalidPath(format!(
                    "Cannot create directory {}: {}",
                    parent.display(),
                    e
                ))
            })?;
        }
    }

    Ok(())
}
