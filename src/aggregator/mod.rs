//! Stateful reconstruction of durations the raw trace does not carry.
//!
//! This module holds the two per-session state machines:
//! - Per-cpu run time between scheduler switches
//! - Per-thread guest entry/exit pairing for KVM vcpu threads

pub mod kvm;
pub mod runtime;

// Re-export main types
pub use kvm::KvmPairingTracker;
pub use runtime::RuntimeAggregator;
