//! Pairing of KVM guest entries and exits per vcpu thread.
//!
//! Entries and exits strictly alternate on a vcpu thread. The time between
//! an exit and the next entry is spent in the host (exit handling plus
//! scheduling delay); the time between an entry and the next exit is spent
//! running the guest.

use std::collections::HashMap;

/// Last confirmed guest boundaries of one thread, in absolute microseconds
#[derive(Debug, Default, Clone, Copy, PartialEq, Eq)]
struct KvmThreadState {
    entry_time: Option<u64>,
    exit_time: Option<u64>,
}

/// Per-thread kvm_entry / kvm_exit state machine
#[derive(Debug, Default)]
pub struct KvmPairingTracker {
    threads: HashMap<i32, KvmThreadState>,
}

impl KvmPairingTracker {
    pub fn new() -> Self {
        Self::default()
    }

    /// Record a guest entry at `usecs`
    ///
    /// Returns the time spent outside the guest since the previous exit, or
    /// `None` when this thread has not exited the guest yet.
    pub fn on_entry(&mut self, tid: i32, usecs: u64) -> Option<u64> {
        let state = self.threads.entry(tid).or_default();
        let outside = state.exit_time.map(|exit| usecs.saturating_sub(exit));
        state.entry_time = Some(usecs);
        outside
    }

    /// Record a guest exit at `usecs`
    ///
    /// Returns the time spent in the guest since the previous entry, or
    /// `None` when this thread has not entered the guest yet.
    pub fn on_exit(&mut self, tid: i32, usecs: u64) -> Option<u64> {
        let state = self.threads.entry(tid).or_default();
        let inside = state.entry_time.map(|entry| usecs.saturating_sub(entry));
        state.exit_time = Some(usecs);
        inside
    }

    /// Number of threads seen entering or exiting the guest
    pub fn tracked_threads(&self) -> usize {
        self.threads.len()
    }
}
