//! The cdict event log and its binary container.
//!
//! This module handles:
//! - The append-only columnar event log
//! - Encoding to and decoding from compressed cdict blobs
//! - Reading the legacy marshal encoding
//! - Upgrading legacy logs to the current record layout
//! - Renaming threads from a thread map

pub mod codec;
pub mod event_log;
pub mod legacy;
pub mod remap;
pub mod upgrade;

// Re-export main types
pub use codec::{decode, decode_with_format, encode, CdictFormat};
pub use event_log::{EventKind, EventLog, NormalizedRecord};
pub use remap::{remap_threads, RemapStats};
pub use upgrade::{upgrade_legacy, UpgradeStats};
