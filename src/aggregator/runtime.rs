//! Per-cpu run time reconstruction.
//!
//! `sched_switch` carries no usable duration, so the run time of the task
//! being switched out is rebuilt from the `sched_stat_runtime` samples
//! delivered on the same cpu since the previous switch.

use log::debug;
use std::collections::HashMap;

/// Accumulates runtime samples per cpu between two switches
#[derive(Debug, Default)]
pub struct RuntimeAggregator {
    /// Nanoseconds accumulated since the last switch, by cpu
    runtime_by_cpu: HashMap<u32, u64>,
    dropped_samples: u64,
}

impl RuntimeAggregator {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a runtime sample to the cpu accumulator
    ///
    /// Samples seen before the first switch on a cpu have no accumulator
    /// yet and are dropped.
    pub fn on_runtime_sample(&mut self, cpu: u32, runtime_ns: u64) {
        match self.runtime_by_cpu.get_mut(&cpu) {
            Some(total) => *total = total.saturating_add(runtime_ns),
            None => {
                self.dropped_samples += 1;
                debug!("cpu {}: runtime sample before first switch dropped", cpu);
            }
        }
    }

    /// Close the current run on `cpu`
    ///
    /// Returns the run time of the outgoing task in microseconds (truncated),
    /// or `None` for the first switch seen on that cpu. The accumulator is
    /// reset to zero in both cases.
    pub fn on_switch(&mut self, cpu: u32) -> Option<u64> {
        self.runtime_by_cpu
            .insert(cpu, 0)
            .map(|runtime_ns| runtime_ns / 1000)
    }

    /// Number of samples dropped because their cpu had no accumulator
    pub fn dropped_samples(&self) -> u64 {
        self.dropped_samples
    }
}
