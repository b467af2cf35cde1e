//! Canonical in-memory shape of one trace occurrence.
//!
//! Every input reader produces these; the dispatcher only ever sees this
//! shape, whatever the wire layout of the source was.

/// Fields every tracepoint callback carries
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CommonFields {
    pub cpu: u32,
    pub secs: u64,
    /// Nanoseconds within `secs`
    pub nsecs: u64,
    pub pid: i32,
    pub comm: String,
}

impl CommonFields {
    /// Absolute timestamp in microseconds
    pub fn usecs(&self) -> u64 {
        self.secs
            .saturating_mul(1_000_000)
            .saturating_add(self.nsecs / 1000)
    }
}

/// Tracepoints with a dedicated handler
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Tracepoint {
    SchedSwitch,
    SchedStatRuntime,
    SchedStatSleep,
    SchedStatIowait,
    KvmEntry,
    KvmExit,
}

impl Tracepoint {
    /// Look up a tracepoint by its short name (`sched_switch`, `kvm_exit`...)
    pub fn from_name(name: &str) -> Option<Self> {
        match name {
            "sched_switch" => Some(Self::SchedSwitch),
            "sched_stat_runtime" => Some(Self::SchedStatRuntime),
            "sched_stat_sleep" => Some(Self::SchedStatSleep),
            "sched_stat_iowait" => Some(Self::SchedStatIowait),
            "kvm_entry" => Some(Self::KvmEntry),
            "kvm_exit" => Some(Self::KvmExit),
            _ => None,
        }
    }

    pub fn name(self) -> &'static str {
        match self {
            Self::SchedSwitch => "sched_switch",
            Self::SchedStatRuntime => "sched_stat_runtime",
            Self::SchedStatSleep => "sched_stat_sleep",
            Self::SchedStatIowait => "sched_stat_iowait",
            Self::KvmEntry => "kvm_entry",
            Self::KvmExit => "kvm_exit",
        }
    }

    /// Number of tracepoint specific fields following the common ones
    pub fn field_count(self) -> usize {
        match self {
            // prev_comm, prev_pid, prev_prio, prev_state, next_comm, next_pid, next_prio
            Self::SchedSwitch => 7,
            // comm, pid, runtime, vruntime
            Self::SchedStatRuntime => 4,
            // comm, pid, delay
            Self::SchedStatSleep | Self::SchedStatIowait => 3,
            // vcpu_id
            Self::KvmEntry => 1,
            // exit_reason, guest_rip, isa, info1, info2
            Self::KvmExit => 5,
        }
    }
}

/// Strip the subsystem from an event name
///
/// Accepts `sched:sched_switch` (perf text), `sched__sched_switch` (perf
/// scripting handler names) and bare `sched_switch`.
pub fn short_event_name(event: &str) -> &str {
    if let Some((_, name)) = event.split_once(':') {
        name
    } else if let Some((_, name)) = event.split_once("__") {
        name
    } else {
        event
    }
}

/// Tracepoint specific part of an occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum OccurrenceKind {
    SchedSwitch {
        prev_comm: String,
        prev_pid: i32,
        next_comm: String,
        next_pid: i32,
    },
    SchedStatRuntime {
        comm: String,
        pid: i32,
        runtime_ns: u64,
    },
    SchedStatSleep {
        comm: String,
        pid: i32,
        delay_ns: u64,
    },
    SchedStatIowait {
        comm: String,
        pid: i32,
        delay_ns: u64,
    },
    KvmEntry {
        vcpu_id: u32,
    },
    KvmExit {
        exit_reason: String,
    },
    /// Any tracepoint without a dedicated handler
    Other {
        name: String,
    },
}

/// One decoded trace occurrence
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Occurrence {
    pub common: CommonFields,
    pub kind: OccurrenceKind,
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_short_event_name() {
        assert_eq!(short_event_name("sched:sched_switch"), "sched_switch");
        assert_eq!(short_event_name("kvm__kvm_exit"), "kvm_exit");
        assert_eq!(short_event_name("kvm_entry"), "kvm_entry");
    }

    #[test]
    fn test_usecs_truncates_nanoseconds() {
        let common = CommonFields {
            cpu: 0,
            secs: 622048,
            nsecs: 897_809_999,
            pid: 1,
            comm: "init".to_string(),
        };
        assert_eq!(common.usecs(), 622_048_897_809);
    }

    #[test]
    fn test_tracepoint_names_round_trip() {
        for tp in [
            Tracepoint::SchedSwitch,
            Tracepoint::SchedStatRuntime,
            Tracepoint::SchedStatSleep,
            Tracepoint::SchedStatIowait,
            Tracepoint::KvmEntry,
            Tracepoint::KvmExit,
        ] {
            assert_eq!(Tracepoint::from_name(tp.name()), Some(tp));
        }
    }
}
