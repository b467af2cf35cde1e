//! Routing of trace occurrences to their handlers.
//!
//! One `EventDispatcher` owns the whole state of a decode session: the
//! epoch, the name cache, the per-cpu runtime accumulators, the per-thread
//! kvm state and the event log being built. Occurrences must be fed in
//! trace order.

use super::tally::EventTally;
use crate::aggregator::{KvmPairingTracker, RuntimeAggregator};
use crate::cdict::{EventKind, EventLog, NormalizedRecord};
use crate::naming::NameCache;
use crate::parser::occurrence::{short_event_name, CommonFields, Occurrence, OccurrenceKind, Tracepoint};
use crate::parser::payload::{adapt, RawOccurrence};
use crate::utils::config::DROPPED_EVENT_NAMES;
use crate::utils::error::PayloadError;
use log::{debug, info};

/// Everything a finished session produced
#[derive(Debug)]
pub struct DecodeOutput {
    pub log: EventLog,
    pub tally: EventTally,
    pub stats: SessionStats,
}

/// Session counters that are not per event kind
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct SessionStats {
    /// Absolute timestamp (usecs) of the first stored record
    pub epoch_usecs: Option<u64>,
    pub named_threads: usize,
    pub virt_threads: usize,
    /// Runtime samples seen before the first switch on their cpu
    pub dropped_runtime_samples: u64,
    /// Threads with kvm entry/exit pairing state
    pub kvm_threads: usize,
}

/// Per-session decoder state
#[derive(Debug)]
pub struct EventDispatcher {
    epoch: Option<u64>,
    names: NameCache,
    runtime: RuntimeAggregator,
    kvm: KvmPairingTracker,
    log: EventLog,
    tally: EventTally,
}

impl EventDispatcher {
    /// Start a session resolving thread names through `names`
    pub fn new(names: NameCache) -> Self {
        Self {
            epoch: None,
            names,
            runtime: RuntimeAggregator::new(),
            kvm: KvmPairingTracker::new(),
            log: EventLog::new(),
            tally: EventTally::new(),
        }
    }

    /// Handle one canonical occurrence
    ///
    /// **Public** - main entry point of the session
    ///
    /// Never fails: occurrences without a handler are only tallied.
    pub fn dispatch(&mut self, occurrence: Occurrence) {
        let Occurrence { common, kind } = occurrence;
        match kind {
            OccurrenceKind::SchedSwitch {
                prev_comm,
                prev_pid,
                next_comm,
                next_pid,
            } => {
                self.tally.count_handled(Tracepoint::SchedSwitch.name());
                self.on_switch(&common, &prev_comm, prev_pid, &next_comm, next_pid);
            }
            OccurrenceKind::SchedStatRuntime { runtime_ns, .. } => {
                self.tally.count_handled(Tracepoint::SchedStatRuntime.name());
                self.runtime.on_runtime_sample(common.cpu, runtime_ns);
            }
            OccurrenceKind::SchedStatSleep { comm, pid, delay_ns } => {
                self.tally.count_handled(Tracepoint::SchedStatSleep.name());
                self.on_delay(EventKind::SchedSleepWake, &common, &comm, pid, delay_ns);
            }
            OccurrenceKind::SchedStatIowait { comm, pid, delay_ns } => {
                self.tally.count_handled(Tracepoint::SchedStatIowait.name());
                self.on_delay(EventKind::SchedIowait, &common, &comm, pid, delay_ns);
            }
            OccurrenceKind::KvmEntry { .. } => {
                self.tally.count_handled(Tracepoint::KvmEntry.name());
                if let Some(outside) = self.kvm.on_entry(common.pid, common.usecs()) {
                    self.emit_kvm(EventKind::KvmEntry, &common, outside, None);
                }
            }
            OccurrenceKind::KvmExit { exit_reason } => {
                self.tally.count_handled(Tracepoint::KvmExit.name());
                if let Some(inside) = self.kvm.on_exit(common.pid, common.usecs()) {
                    self.emit_kvm(EventKind::KvmExit, &common, inside, Some(exit_reason));
                }
            }
            OccurrenceKind::Other { name } => self.skip(&name),
        }
    }

    /// Handle one positional occurrence, normalizing its payload first
    ///
    /// **Public** - entry point for raw payloads
    ///
    /// # Errors
    /// * `PayloadError` - the payload matches neither known shape; nothing
    ///   was recorded for it
    pub fn dispatch_raw(&mut self, raw: &RawOccurrence) -> Result<(), PayloadError> {
        let name = short_event_name(&raw.event);
        match Tracepoint::from_name(name) {
            Some(tracepoint) => {
                let occurrence = adapt(tracepoint, raw)?;
                self.dispatch(occurrence);
            }
            None => self.skip(name),
        }
        Ok(())
    }

    /// Records appended so far
    pub fn log(&self) -> &EventLog {
        &self.log
    }

    pub fn tally(&self) -> &EventTally {
        &self.tally
    }

    /// Close the session
    ///
    /// **Public** - consumes the dispatcher so no state outlives the run
    pub fn finish(self) -> DecodeOutput {
        let stats = SessionStats {
            epoch_usecs: self.epoch,
            named_threads: self.names.len(),
            virt_threads: self.names.virt_threads(),
            dropped_runtime_samples: self.runtime.dropped_samples(),
            kvm_threads: self.kvm.tracked_threads(),
        };
        info!(
            "Session finished: {} records, {} threads named ({} virtual, {} in kvm)",
            self.log.len(),
            stats.named_threads,
            stats.virt_threads,
            stats.kvm_threads
        );
        if stats.dropped_runtime_samples > 0 {
            debug!(
                "{} runtime samples preceded the first switch on their cpu",
                stats.dropped_runtime_samples
            );
        }
        DecodeOutput {
            log: self.log,
            tally: self.tally,
            stats,
        }
    }

    /// **Private** - internal helper for dispatch
    fn on_switch(
        &mut self,
        common: &CommonFields,
        prev_comm: &str,
        prev_pid: i32,
        next_comm: &str,
        next_pid: i32,
    ) {
        // First switch on a cpu only opens the accumulator
        let Some(duration) = self.runtime.on_switch(common.cpu) else {
            return;
        };
        let task_name = self.names.resolve(prev_pid, prev_comm);
        let next_name = self.names.resolve(next_pid, next_comm);
        self.emit(
            EventKind::SchedSwitch,
            common,
            prev_pid,
            task_name,
            duration,
            Some(next_pid),
            Some(next_name),
        );
    }

    /// The delay belongs to the woken task, not to the current one
    ///
    /// **Private** - internal helper for dispatch
    fn on_delay(&mut self, kind: EventKind, common: &CommonFields, comm: &str, pid: i32, delay_ns: u64) {
        let task_name = self.names.resolve(pid, comm);
        self.emit(kind, common, pid, task_name, delay_ns / 1000, Some(0), None);
    }

    /// **Private** - internal helper for dispatch
    fn emit_kvm(&mut self, kind: EventKind, common: &CommonFields, duration: u64, reason: Option<String>) {
        let task_name = self.names.resolve(common.pid, &common.comm);
        self.emit(kind, common, common.pid, task_name, duration, None, reason);
    }

    /// Append one record, anchoring the epoch on the first one
    ///
    /// **Private** - internal helper for the handlers
    #[allow(clippy::too_many_arguments)]
    fn emit(
        &mut self,
        kind: EventKind,
        common: &CommonFields,
        pid: i32,
        task_name: String,
        duration: u64,
        next_pid: Option<i32>,
        next_comm: Option<String>,
    ) {
        let now = common.usecs();
        let epoch = *self.epoch.get_or_insert(now);
        self.log.append(NormalizedRecord {
            event: kind.tag().to_string(),
            cpu: common.cpu,
            usecs: now.saturating_sub(epoch),
            pid,
            task_name,
            duration,
            next_pid,
            next_comm,
        });
        self.tally.count_stored(kind.tag());
    }

    /// **Private** - internal helper for dispatch and dispatch_raw
    fn skip(&mut self, name: &str) {
        if DROPPED_EVENT_NAMES.contains(&name) {
            self.tally.count_dropped(name);
        } else {
            if !self.tally.unhandled.contains_key(name) {
                debug!("unhandled event {}", name);
            }
            self.tally.count_unhandled(name);
        }
    }
}
