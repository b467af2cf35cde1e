//! Reader for raw positional occurrences, one JSON object per line.
//!
//! ```text
//! {"event": "kvm__kvm_entry", "fields": [6, 622048, 897809000, 27637, "qemu-system-x86", 0]}
//! ```
//!
//! The fields are exactly what a perf scripting callback receives, in either
//! payload shape; they are normalized later by the payload adapter.

use super::payload::RawOccurrence;
use crate::utils::error::ParseError;
use std::io::BufRead;

/// One raw occurrence with the line it came from
#[derive(Debug, Clone, PartialEq)]
pub struct RawLine {
    pub line: usize,
    pub occurrence: RawOccurrence,
}

/// Iterator over the raw occurrences of a JSON-lines stream
pub struct RawLineReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
}

impl<R: BufRead> RawLineReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
        }
    }
}

impl<R: BufRead> Iterator for RawLineReader<R> {
    type Item = Result<RawLine, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(ParseError::Io(e))),
            };
            self.line_no += 1;
            let trimmed = text.trim();
            if trimmed.is_empty() || trimmed.starts_with('#') {
                continue;
            }
            let line = self.line_no;
            return Some(
                serde_json::from_str(trimmed)
                    .map(|occurrence| RawLine { line, occurrence })
                    .map_err(|source| ParseError::Json { line, source }),
            );
        }
    }
}
