//! Trace input parsing.
//!
//! This module handles:
//! - Reading `perf script` text output
//! - Reading raw positional occurrences (JSON lines)
//! - Normalizing the two historical payload shapes
//! - Detecting the input format of a file

pub mod occurrence;
pub mod payload;
pub mod perf_text;
pub mod raw;

use std::io::BufRead;

// Re-export main types
pub use occurrence::{short_event_name, CommonFields, Occurrence, OccurrenceKind, Tracepoint};
pub use payload::{adapt, FieldValue, PayloadShape, RawOccurrence};
pub use perf_text::{parse_perf_line, PerfTextReader};
pub use raw::{RawLine, RawLineReader};

/// Supported trace input formats
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum InputFormat {
    /// `perf script` text output
    PerfText,
    /// JSON lines of positional payloads
    Raw,
}

impl InputFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::PerfText => "perf-text",
            Self::Raw => "raw",
        }
    }

    /// Detect the format from the first meaningful line of `reader`
    ///
    /// Only buffered data is inspected and nothing is consumed, so the same
    /// reader can be handed to the matching reader afterwards. Empty input
    /// is treated as perf text.
    pub fn detect<R: BufRead>(reader: &mut R) -> std::io::Result<Self> {
        let buffer = reader.fill_buf()?;
        let text = String::from_utf8_lossy(buffer);
        let first = text
            .lines()
            .map(str::trim)
            .find(|line| !line.is_empty() && !line.starts_with('#'));
        Ok(match first {
            Some(line) if line.starts_with('{') => Self::Raw,
            _ => Self::PerfText,
        })
    }
}
