//! Columnar event log stored in cdict files.
//!
//! The log keeps one sequence per record field so the serialized form is a
//! map of eight column names to equally long arrays, ready to be loaded as a
//! dataframe by analysis tools.

use crate::utils::error::CodecError;
use serde::{Deserialize, Serialize};

/// Kind of record stored in the `event` column
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum EventKind {
    /// Context switch, duration is the run time of the outgoing task
    SchedSwitch,
    /// Time a task slept before being woken up
    SchedSleepWake,
    /// Time a task waited on I/O
    SchedIowait,
    /// Time a vcpu thread spent outside the guest
    KvmEntry,
    /// Time a vcpu thread spent inside the guest
    KvmExit,
}

impl EventKind {
    /// Tag written to the `event` column
    pub fn tag(self) -> &'static str {
        match self {
            Self::SchedSwitch => "sched-switch",
            Self::SchedSleepWake => "sched-runtime-sleep-wake",
            Self::SchedIowait => "sched-runtime-iowait",
            Self::KvmEntry => "kvm-entry",
            Self::KvmExit => "kvm-exit",
        }
    }

    /// Map a tag back to a kind, accepting the names older cdict files used
    pub fn from_tag(tag: &str) -> Option<Self> {
        match tag {
            "sched-switch" | "sched__sched_switch" | "sched:sched_switch" => Some(Self::SchedSwitch),
            "sched-runtime-sleep-wake" | "sched__sched_stat_sleep" | "sched:sched_stat_sleep" => {
                Some(Self::SchedSleepWake)
            }
            "sched-runtime-iowait" | "sched__sched_stat_iowait" | "sched:sched_stat_iowait" => {
                Some(Self::SchedIowait)
            }
            "kvm-entry" | "kvm_entry" | "kvm__kvm_entry" => Some(Self::KvmEntry),
            "kvm-exit" | "kvm_exit" | "kvm__kvm_exit" => Some(Self::KvmExit),
            _ => None,
        }
    }
}

/// One normalized record (a row of the event log)
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct NormalizedRecord {
    pub event: String,
    pub cpu: u32,
    /// Microseconds since the first record of the run
    pub usecs: u64,
    /// Thread the record is attributed to (0 = idle)
    pub pid: i32,
    pub task_name: String,
    /// Duration in microseconds
    pub duration: u64,
    pub next_pid: Option<i32>,
    /// Incoming task name for switches, exit reason for kvm exits
    pub next_comm: Option<String>,
}

/// Append-only columnar buffer of normalized records
///
/// All eight columns always have the same length.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(from = "StoredColumns")]
pub struct EventLog {
    event: Vec<String>,
    cpu: Vec<u32>,
    usecs: Vec<u64>,
    pid: Vec<i32>,
    task_name: Vec<String>,
    duration: Vec<u64>,
    next_pid: Vec<Option<i32>>,
    next_comm: Vec<Option<String>>,
}

impl EventLog {
    /// Create an empty log
    pub fn new() -> Self {
        Self::default()
    }

    /// Append one record, pushing a value onto every column
    pub fn append(&mut self, record: NormalizedRecord) {
        self.event.push(record.event);
        self.cpu.push(record.cpu);
        self.usecs.push(record.usecs);
        self.pid.push(record.pid);
        self.task_name.push(record.task_name);
        self.duration.push(record.duration);
        self.next_pid.push(record.next_pid);
        self.next_comm.push(record.next_comm);
    }

    /// Number of records
    pub fn len(&self) -> usize {
        self.event.len()
    }

    pub fn is_empty(&self) -> bool {
        self.event.is_empty()
    }

    /// Rebuild the record at `index`
    pub fn get(&self, index: usize) -> Option<NormalizedRecord> {
        if index >= self.len() {
            return None;
        }
        Some(NormalizedRecord {
            event: self.event[index].clone(),
            cpu: self.cpu[index],
            usecs: self.usecs[index],
            pid: self.pid[index],
            task_name: self.task_name[index].clone(),
            duration: self.duration[index],
            next_pid: self.next_pid[index],
            next_comm: self.next_comm[index].clone(),
        })
    }

    /// Iterate over all records in append order
    pub fn iter(&self) -> impl Iterator<Item = NormalizedRecord> + '_ {
        (0..self.len()).filter_map(move |index| self.get(index))
    }

    pub fn events(&self) -> &[String] {
        &self.event
    }

    pub fn cpus(&self) -> &[u32] {
        &self.cpu
    }

    pub fn usecs(&self) -> &[u64] {
        &self.usecs
    }

    pub fn pids(&self) -> &[i32] {
        &self.pid
    }

    pub fn task_names(&self) -> &[String] {
        &self.task_name
    }

    pub fn durations(&self) -> &[u64] {
        &self.duration
    }

    pub fn next_pids(&self) -> &[Option<i32>] {
        &self.next_pid
    }

    pub fn next_comms(&self) -> &[Option<String>] {
        &self.next_comm
    }

    /// Check the equal-length invariant on a log built from untrusted data
    pub(crate) fn check_columns(&self) -> Result<(), CodecError> {
        let expected = self.event.len();
        let columns = [
            ("cpu", self.cpu.len()),
            ("usecs", self.usecs.len()),
            ("pid", self.pid.len()),
            ("task_name", self.task_name.len()),
            ("duration", self.duration.len()),
            ("next_pid", self.next_pid.len()),
            ("next_comm", self.next_comm.len()),
        ];
        for (column, found) in columns {
            if found != expected {
                return Err(CodecError::ColumnLength {
                    column,
                    expected,
                    found,
                });
            }
        }
        Ok(())
    }
}

/// Value of a stored `next_comm` cell
///
/// Earlier writers put the numeric exit reason code of kvm exits there, and
/// table conversions filled the gaps of other rows with 0.
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
#[serde(untagged)]
pub(crate) enum StoredComm {
    Name(String),
    Code(i64),
}

impl StoredComm {
    /// Resolve the cell against the event tag of its row
    pub(crate) fn into_comm(self, event: &str) -> Option<String> {
        match self {
            Self::Name(name) => Some(name),
            Self::Code(0) if EventKind::from_tag(event) != Some(EventKind::KvmExit) => None,
            Self::Code(code) => Some(code.to_string()),
        }
    }
}

/// On-disk column layout, before `next_comm` cells are resolved
#[derive(Deserialize)]
struct StoredColumns {
    event: Vec<String>,
    cpu: Vec<u32>,
    usecs: Vec<u64>,
    pid: Vec<i32>,
    task_name: Vec<String>,
    duration: Vec<u64>,
    next_pid: Vec<Option<i32>>,
    next_comm: Vec<Option<StoredComm>>,
}

impl From<StoredColumns> for EventLog {
    fn from(stored: StoredColumns) -> Self {
        // keeps the column length so check_columns still sees a mismatch
        let next_comm = stored
            .next_comm
            .into_iter()
            .enumerate()
            .map(|(index, cell)| {
                let event = stored.event.get(index).map(String::as_str).unwrap_or_default();
                cell.and_then(|cell| cell.into_comm(event))
            })
            .collect();
        Self {
            event: stored.event,
            cpu: stored.cpu,
            usecs: stored.usecs,
            pid: stored.pid,
            task_name: stored.task_name,
            duration: stored.duration,
            next_pid: stored.next_pid,
            next_comm,
        }
    }
}

impl FromIterator<NormalizedRecord> for EventLog {
    fn from_iter<I: IntoIterator<Item = NormalizedRecord>>(iter: I) -> Self {
        let mut log = EventLog::new();
        for record in iter {
            log.append(record);
        }
        log
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn record(event: EventKind, usecs: u64) -> NormalizedRecord {
        NormalizedRecord {
            event: event.tag().to_string(),
            cpu: 1,
            usecs,
            pid: 42,
            task_name: "bash".to_string(),
            duration: 7,
            next_pid: Some(0),
            next_comm: Some("swapper/1".to_string()),
        }
    }

    #[test]
    fn test_append_keeps_columns_aligned() {
        let mut log = EventLog::new();
        for i in 0..5 {
            log.append(record(EventKind::SchedSwitch, i));
            assert_eq!(log.len(), i as usize + 1);
            assert!(log.check_columns().is_ok());
        }
        assert_eq!(log.usecs(), &[0, 1, 2, 3, 4]);
    }

    #[test]
    fn test_get_out_of_range() {
        let log: EventLog = vec![record(EventKind::KvmExit, 3)].into_iter().collect();
        assert_eq!(log.get(0), Some(record(EventKind::KvmExit, 3)));
        assert!(log.get(1).is_none());
    }

    #[test]
    fn test_legacy_tags_map_to_kinds() {
        assert_eq!(
            EventKind::from_tag("sched__sched_switch"),
            Some(EventKind::SchedSwitch)
        );
        assert_eq!(EventKind::from_tag("kvm_exit"), Some(EventKind::KvmExit));
        assert_eq!(
            EventKind::from_tag(EventKind::SchedIowait.tag()),
            Some(EventKind::SchedIowait)
        );
        assert_eq!(EventKind::from_tag("sched__sched_stat_runtime"), None);
    }

    #[test]
    fn test_numeric_comm_cells() {
        assert_eq!(
            StoredComm::Code(12).into_comm("kvm_exit").as_deref(),
            Some("12")
        );
        // reason code 0 is a real exit reason
        assert_eq!(StoredComm::Code(0).into_comm("kvm-exit").as_deref(), Some("0"));
        assert_eq!(StoredComm::Code(0).into_comm("sched-switch"), None);
        assert_eq!(
            StoredComm::Name("bash".to_string()).into_comm("sched-switch").as_deref(),
            Some("bash")
        );
    }
}
