//! Memoized thread display names.
//!
//! Every record referencing a thread must show the same name for it, so
//! the first resolution of a thread id is kept for the whole run even if
//! the process metadata changes (or disappears) afterwards.

use super::plugin::NamingStrategy;
use super::procfs::{classify, ProcessMetadata, VirtThread};
use log::debug;
use std::collections::HashMap;

/// Thread id to display name cache
pub struct NameCache {
    names: HashMap<i32, String>,
    metadata: Option<Box<dyn ProcessMetadata>>,
    strategy: Option<Box<dyn NamingStrategy>>,
    virt_threads: usize,
}

impl NameCache {
    /// Create a cache that inspects threads through `metadata`
    pub fn new(metadata: Box<dyn ProcessMetadata>) -> Self {
        Self {
            names: HashMap::new(),
            metadata: Some(metadata),
            strategy: None,
            virt_threads: 0,
        }
    }

    /// Create a cache that treats every thread as an ordinary thread
    ///
    /// Used when decoding a trace captured on another host.
    pub fn offline() -> Self {
        Self {
            names: HashMap::new(),
            metadata: None,
            strategy: None,
            virt_threads: 0,
        }
    }

    /// Install a naming plugin for virtualization threads
    pub fn with_strategy(mut self, strategy: Box<dyn NamingStrategy>) -> Self {
        self.strategy = Some(strategy);
        self
    }

    /// Resolve the display name of `tid`
    ///
    /// Thread id 0 (idle) is returned unchanged and never cached.
    pub fn resolve(&mut self, tid: i32, raw_name: &str) -> String {
        if tid == 0 {
            return raw_name.to_string();
        }
        if let Some(name) = self.names.get(&tid) {
            return name.clone();
        }

        let name = match self.lookup_virt_thread(tid) {
            Some(thread) => {
                self.virt_threads += 1;
                let base = match self.strategy.as_mut() {
                    Some(strategy) => strategy.convert_name(raw_name, tid, &thread),
                    None => raw_name.to_string(),
                };
                format!("{}.{}", base, thread.role)
            }
            None => raw_name.to_string(),
        };

        self.names.insert(tid, name.clone());
        name
    }

    /// Look up and classify a thread, absorbing lookup failures
    ///
    /// **Private** - internal helper for resolve
    fn lookup_virt_thread(&self, tid: i32) -> Option<VirtThread> {
        let metadata = self.metadata.as_ref()?;
        match metadata.thread_metadata(tid) {
            Ok(meta) => classify(&meta),
            Err(e) => {
                debug!("tid {}: metadata unavailable ({}), keeping raw name", tid, e);
                None
            }
        }
    }

    /// Whether `tid` already has a cached name
    pub fn contains(&self, tid: i32) -> bool {
        self.names.contains_key(&tid)
    }

    /// Number of cached thread names
    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    /// Number of threads recognized as virtualization threads
    pub fn virt_threads(&self) -> usize {
        self.virt_threads
    }
}

impl std::fmt::Debug for NameCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NameCache")
            .field("names", &self.names.len())
            .field("metadata", &self.metadata.is_some())
            .field("strategy", &self.strategy.is_some())
            .field("virt_threads", &self.virt_threads)
            .finish()
    }
}
