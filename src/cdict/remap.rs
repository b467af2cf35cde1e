//! Renaming the threads of an existing event log from a thread map.

use super::event_log::EventLog;
use crate::naming::ThreadMap;
use log::info;

/// Statistics of one remap pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct RemapStats {
    pub task_names: usize,
    pub next_comms: usize,
}

impl RemapStats {
    pub fn total(&self) -> usize {
        self.task_names + self.next_comms
    }
}

/// Rewrite `task_name` by `pid` and `next_comm` by `next_pid`
///
/// **Public** - used by the convert and inspect commands
///
/// Threads missing from the map keep their names. Records without a
/// `next_pid` (kvm records) keep their `next_comm`, which holds the exit
/// reason.
pub fn remap_threads(log: &EventLog, map: &ThreadMap) -> (EventLog, RemapStats) {
    let mut stats = RemapStats::default();
    let remapped = log
        .iter()
        .map(|mut record| {
            if let Some(name) = map.name_of(record.pid) {
                record.task_name = name.to_string();
                stats.task_names += 1;
            }
            if let Some(name) = record.next_pid.and_then(|pid| map.name_of(pid)) {
                record.next_comm = Some(name.to_string());
                stats.next_comms += 1;
            }
            record
        })
        .collect();

    info!("Remapped {} task names", stats.total());
    (remapped, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdict::event_log::NormalizedRecord;

    fn record(event: &str, pid: i32, next_pid: Option<i32>, next_comm: Option<&str>) -> NormalizedRecord {
        NormalizedRecord {
            event: event.to_string(),
            cpu: 0,
            usecs: 0,
            pid,
            task_name: "qemu-system-x86".to_string(),
            duration: 1,
            next_pid,
            next_comm: next_comm.map(str::to_string),
        }
    }

    #[test]
    fn test_remap_by_pid_and_next_pid() {
        let map = ThreadMap::from_reader("700,instance-1,vcpu0,u,FULL,3,CSR\n".as_bytes()).unwrap();
        let log: EventLog = vec![
            record("sched-switch", 700, Some(0), Some("swapper/0")),
            record("sched-switch", 0, Some(700), Some("qemu-system-x86")),
            record("kvm-exit", 700, None, Some("HLT")),
            record("sched-switch", 5, Some(6), Some("bash")),
        ]
        .into_iter()
        .collect();

        let (remapped, stats) = remap_threads(&log, &map);
        assert_eq!(
            remapped.task_names(),
            ["CSR.03.vcpu0", "qemu-system-x86", "CSR.03.vcpu0", "qemu-system-x86"]
        );
        assert_eq!(remapped.next_comms()[1].as_deref(), Some("CSR.03.vcpu0"));
        assert_eq!(remapped.next_comms()[2].as_deref(), Some("HLT"));
        assert_eq!(stats, RemapStats { task_names: 2, next_comms: 1 });
        assert_eq!(remapped.len(), log.len());
    }
}
