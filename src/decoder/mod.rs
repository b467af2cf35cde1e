//! Trace decoding sessions.
//!
//! This module handles:
//! - Routing occurrences to the scheduler and kvm handlers
//! - Tallying handled, dropped and unhandled events
//! - Feeding a whole input stream through one session

pub mod dispatcher;
pub mod tally;

use crate::parser::{InputFormat, PerfTextReader, RawLineReader};
use crate::utils::error::ParseError;
use log::debug;
use std::io::BufRead;

// Re-export main types
pub use dispatcher::{DecodeOutput, EventDispatcher, SessionStats};
pub use tally::{sorted_by_count, EventTally};

/// Feed every occurrence of `reader` to `dispatcher`
///
/// **Public** - main entry point for decoding an input stream
///
/// # Arguments
/// * `reader` - Trace input
/// * `format` - Layout of the input
/// * `dispatcher` - Session receiving the occurrences
///
/// # Returns
/// Number of occurrences read
///
/// # Errors
/// * `ParseError` - the first malformed line stops the run
pub fn decode_stream<R: BufRead>(
    reader: R,
    format: InputFormat,
    dispatcher: &mut EventDispatcher,
) -> Result<u64, ParseError> {
    let mut count = 0u64;
    match format {
        InputFormat::PerfText => {
            let mut lines = PerfTextReader::new(reader);
            for occurrence in lines.by_ref() {
                dispatcher.dispatch(occurrence?);
                count += 1;
            }
            debug!("{} non-sample lines skipped", lines.skipped_lines());
        }
        InputFormat::Raw => {
            for raw in RawLineReader::new(reader) {
                let raw = raw?;
                dispatcher
                    .dispatch_raw(&raw.occurrence)
                    .map_err(|source| ParseError::Payload {
                        line: raw.line,
                        source,
                    })?;
                count += 1;
            }
        }
    }
    Ok(count)
}
