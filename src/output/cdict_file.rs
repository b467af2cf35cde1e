//! cdict file writer and reader.
//!
//! A cdict file is the zlib compressed event log, nothing else: no header,
//! no magic. The `.cdict` extension is the only marker.

use super::prepare_output_path;
use crate::cdict::{decode_with_format, encode, CdictFormat, EventLog};
use crate::utils::config::CDICT_EXTENSION;
use crate::utils::error::OutputError;
use log::{debug, info};
use std::fs::File;
use std::io::{BufWriter, Write};
use std::path::{Path, PathBuf};

/// What was written by write_cdict
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdictSummary {
    /// Final path, extension included
    pub path: PathBuf,
    pub entries: usize,
    /// Compressed size in bytes
    pub compressed_size: usize,
}

/// Append the `.cdict` extension unless `path` already carries it
pub fn cdict_path(path: impl AsRef<Path>) -> PathBuf {
    let path = path.as_ref();
    if path.extension().is_some_and(|ext| ext == CDICT_EXTENSION) {
        return path.to_path_buf();
    }
    let mut name = path.as_os_str().to_owned();
    name.push(".");
    name.push(CDICT_EXTENSION);
    PathBuf::from(name)
}

/// Encode an event log and write it to a cdict file
///
/// **Public** - main entry point for cdict output
///
/// # Arguments
/// * `log` - Event log to persist
/// * `output_path` - Destination, `.cdict` is appended when missing
///
/// # Returns
/// Final path, entry count and compressed size
///
/// # Errors
/// * `OutputError::Codec` - encoding failed
/// * `OutputError::InvalidPath` - path is empty, a directory, or its parent cannot be created
/// * `OutputError::WriteFailed` - I/O error during write
pub fn write_cdict(log: &EventLog, output_path: impl AsRef<Path>) -> Result<CdictSummary, OutputError> {
    let path = cdict_path(output_path);
    prepare_output_path(&path)?;

    let compressed = encode(log)?;

    let file = File::create(&path).map_err(OutputError::WriteFailed)?;
    let mut writer = BufWriter::new(file);
    writer
        .write_all(&compressed)
        .and_then(|_| writer.flush())
        .map_err(OutputError::WriteFailed)?;

    info!(
        "Compressed dictionary written to {} {} entries size={} bytes",
        path.display(),
        log.len(),
        compressed.len()
    );

    Ok(CdictSummary {
        path,
        entries: log.len(),
        compressed_size: compressed.len(),
    })
}

/// Read a cdict file in either encoding
///
/// **Public** - used by convert, inspect and downstream tools
///
/// `input_path` may omit the `.cdict` extension.
///
/// # Errors
/// * `OutputError::ReadFailed` - file cannot be read
/// * `OutputError::Codec` - content is not a cdict container
pub fn read_cdict(input_path: impl AsRef<Path>) -> Result<(EventLog, CdictFormat), OutputError> {
    let input_path = input_path.as_ref();
    let path = if input_path.exists() {
        input_path.to_path_buf()
    } else {
        cdict_path(input_path)
    };

    debug!("Reading cdict from: {}", path.display());

    let bytes = std::fs::read(&path).map_err(OutputError::ReadFailed)?;
    let (log, format) = decode_with_format(&bytes)?;

    debug!(
        "cdict loaded: {} entries, {} encoding",
        log.len(),
        format.name()
    );

    Ok((log, format))
}
