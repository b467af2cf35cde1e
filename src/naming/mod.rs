//! Thread naming.
//!
//! This module handles:
//! - Memoizing one display name per thread id
//! - Recognizing libvirt qemu threads from process metadata
//! - Optional plugins renaming virtual machine threads
//! - CSV thread maps renaming threads of finished logs

pub mod cache;
pub mod plugin;
pub mod procfs;
pub mod thread_map;

// Re-export main types
pub use cache::NameCache;
pub use plugin::{NamingStrategy, UuidNameMap};
pub use procfs::{classify, ProcessMetadata, ProcfsMetadata, ThreadMetadata, VirtThread};
pub use thread_map::{ThreadMap, ThreadMapEntry};
