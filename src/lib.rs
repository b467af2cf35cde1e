//! sched-cdict
//!
//! Decodes kernel scheduler and KVM trace occurrences into a compact,
//! columnar, zlib compressed event log (a "cdict") for offline analysis.
//!
//! This crate provides the core implementation for the `mkcdict` CLI tool.
//!
//! ## Getting Started
//!
//! ```bash
//! perf record -e sched:sched_switch -e sched:sched_stat_runtime \
//!     -e kvm:kvm_entry -e kvm:kvm_exit -a sleep 5
//! perf script > trace.txt
//! mkcdict decode trace.txt -o perf.cdict --summary
//! ```
//!
//! ## Library use
//!
//! ```ignore
//! use sched_cdict::decoder::{decode_stream, EventDispatcher};
//! use sched_cdict::naming::NameCache;
//! use sched_cdict::parser::InputFormat;
//!
//! let mut dispatcher = EventDispatcher::new(NameCache::offline());
//! decode_stream(reader, InputFormat::PerfText, &mut dispatcher)?;
//! let session = dispatcher.finish();
//! sched_cdict::output::write_cdict(&session.log, "perf.cdict")?;
//! ```

pub mod aggregator;
pub mod cdict;
pub mod commands;
pub mod decoder;
pub mod naming;
pub mod output;
pub mod parser;
pub mod utils;
