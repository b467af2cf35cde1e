//! Per-event tallies for the end-of-run summary.

use serde::{Deserialize, Serialize};
use std::collections::BTreeMap;

/// Running counts of what happened to each kind of occurrence
///
/// **Public** - returned from EventDispatcher::finish
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct EventTally {
    /// Occurrences consumed by a handler, by tracepoint name
    pub handled: BTreeMap<String, u64>,

    /// Records appended to the event log, by event tag
    pub stored: BTreeMap<String, u64>,

    /// Known tracepoints discarded on purpose, by tracepoint name
    pub dropped: BTreeMap<String, u64>,

    /// Tracepoints without any handler, by tracepoint name
    pub unhandled: BTreeMap<String, u64>,
}

impl EventTally {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn count_handled(&mut self, name: &str) {
        bump(&mut self.handled, name);
    }

    pub fn count_stored(&mut self, tag: &str) {
        bump(&mut self.stored, tag);
    }

    pub fn count_dropped(&mut self, name: &str) {
        bump(&mut self.dropped, name);
    }

    pub fn count_unhandled(&mut self, name: &str) {
        bump(&mut self.unhandled, name);
    }

    /// Total records appended to the log
    pub fn total_stored(&self) -> u64 {
        self.stored.values().sum()
    }

    pub fn total_dropped(&self) -> u64 {
        self.dropped.values().sum()
    }

    pub fn total_unhandled(&self) -> u64 {
        self.unhandled.values().sum()
    }

    /// Get human-readable summary
    ///
    /// **Public** - printed at the end of a decode run
    ///
    /// Each section is sorted by decreasing count.
    pub fn summary(&self) -> String {
        let mut out = String::new();
        for (title, counts) in [
            ("Dropped events (not stored in cdict file):", &self.dropped),
            ("Unhandled events:", &self.unhandled),
            ("Events stored in cdict file:", &self.stored),
        ] {
            if counts.is_empty() {
                continue;
            }
            out.push_str(title);
            out.push('\n');
            for (name, count) in sorted_by_count(counts) {
                out.push_str(&format!("   {:>8} {}\n", count, name));
            }
            out.push('\n');
        }
        out
    }
}

/// **Private** - internal helper for the count_* methods
fn bump(counts: &mut BTreeMap<String, u64>, name: &str) {
    match counts.get_mut(name) {
        Some(count) => *count += 1,
        None => {
            counts.insert(name.to_string(), 1);
        }
    }
}

/// Entries sorted by decreasing count, ties by name
pub fn sorted_by_count(counts: &BTreeMap<String, u64>) -> Vec<(&str, u64)> {
    let mut entries: Vec<(&str, u64)> = counts
        .iter()
        .map(|(name, count)| (name.as_str(), *count))
        .collect();
    entries.sort_by(|a, b| b.1.cmp(&a.1).then_with(|| a.0.cmp(b.0)));
    entries
}
