//! Upgrade of first generation cdict logs to the current record layout.
//!
//! Old logs stored every `sched_stat_runtime` as its own record and left
//! the duration of switches at 0. The upgrade folds those runtime records
//! into the next switch on the same cpu, drops them, and renames the old
//! event tags.

use super::event_log::{EventKind, EventLog};
use crate::aggregator::RuntimeAggregator;
use log::{debug, info};

/// Tags old logs used for runtime samples
const LEGACY_RUNTIME_TAGS: &[&str] = &["sched__sched_stat_runtime", "sched:sched_stat_runtime"];

/// Statistics of one upgrade pass
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct UpgradeStats {
    pub runtime_records_folded: usize,
    pub switches_updated: usize,
    pub tags_renamed: usize,
}

/// Rewrite a legacy event log in the current layout
///
/// **Public** - used by the convert command
///
/// Runtime durations are already in microseconds in old logs, so they are
/// fed to the aggregator scaled back to nanoseconds. Switches away from the
/// idle task (pid 0) keep their stored duration but still reset the cpu
/// accumulator.
pub fn upgrade_legacy(log: &EventLog) -> (EventLog, UpgradeStats) {
    let mut runtime = RuntimeAggregator::new();
    let mut stats = UpgradeStats::default();
    let mut upgraded = EventLog::new();

    for mut record in log.iter() {
        if LEGACY_RUNTIME_TAGS.contains(&record.event.as_str()) {
            runtime.on_runtime_sample(record.cpu, record.duration.saturating_mul(1000));
            stats.runtime_records_folded += 1;
            continue;
        }

        let kind = EventKind::from_tag(&record.event);
        if kind == Some(EventKind::SchedSwitch) {
            let folded = runtime.on_switch(record.cpu);
            if record.pid != 0 {
                if let Some(duration) = folded {
                    record.duration = duration;
                    stats.switches_updated += 1;
                }
            }
        }

        if let Some(kind) = kind {
            if record.event != kind.tag() {
                record.event = kind.tag().to_string();
                stats.tags_renamed += 1;
            }
        }
        upgraded.append(record);
    }

    debug!(
        "{} runtime samples dropped before the first switch of their cpu",
        runtime.dropped_samples()
    );
    info!(
        "Upgrade folded {} runtime records into {} switches, renamed {} tags",
        stats.runtime_records_folded, stats.switches_updated, stats.tags_renamed
    );
    (upgraded, stats)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::cdict::event_log::NormalizedRecord;

    fn legacy(event: &str, cpu: u32, usecs: u64, pid: i32, duration: u64) -> NormalizedRecord {
        NormalizedRecord {
            event: event.to_string(),
            cpu,
            usecs,
            pid,
            task_name: format!("task-{}", pid),
            duration,
            next_pid: Some(0),
            next_comm: None,
        }
    }

    #[test]
    fn test_runtime_folded_into_switch() {
        let log: EventLog = vec![
            legacy("sched__sched_switch", 0, 0, 0, 0),
            legacy("sched__sched_stat_runtime", 0, 10, 42, 30),
            legacy("sched__sched_stat_runtime", 0, 20, 42, 12),
            legacy("sched__sched_switch", 0, 25, 42, 0),
        ]
        .into_iter()
        .collect();

        let (upgraded, stats) = upgrade_legacy(&log);

        assert_eq!(upgraded.len(), 2);
        assert_eq!(upgraded.events(), &["sched-switch", "sched-switch"]);
        assert_eq!(upgraded.durations(), &[0, 42]);
        assert_eq!(stats.runtime_records_folded, 2);
        assert_eq!(stats.switches_updated, 1);
        assert_eq!(stats.tags_renamed, 2);
    }

    #[test]
    fn test_idle_switch_keeps_duration_and_resets() {
        let log: EventLog = vec![
            legacy("sched__sched_switch", 1, 0, 5, 0),
            legacy("sched__sched_stat_runtime", 1, 1, 0, 99),
            legacy("sched__sched_switch", 1, 2, 0, 7),
            legacy("sched__sched_switch", 1, 3, 5, 0),
        ]
        .into_iter()
        .collect();

        let (upgraded, _) = upgrade_legacy(&log);

        assert_eq!(upgraded.durations(), &[0, 7, 0]);
    }

    #[test]
    fn test_other_records_pass_through() {
        let log: EventLog = vec![
            legacy("kvm_exit", 2, 0, 77, 150),
            legacy("sched-runtime-iowait", 2, 5, 77, 9),
            legacy("custom-event", 2, 6, 77, 1),
        ]
        .into_iter()
        .collect();

        let (upgraded, stats) = upgrade_legacy(&log);

        assert_eq!(
            upgraded.events(),
            &["kvm-exit", "sched-runtime-iowait", "custom-event"]
        );
        assert_eq!(upgraded.durations(), &[150, 9, 1]);
        assert_eq!(stats.tags_renamed, 1);
    }
}
