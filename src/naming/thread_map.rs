//! CSV thread map used to rename the threads of an existing cdict.
//!
//! Each row describes one host thread, without a header line:
//!
//! ```text
//! 19236,instance-000019f4,emulator,8f81e3a1-3ebd-4015-bbee-e291f0672d02,FULL,5,CSR
//! ```
//!
//! The mapped display name is `<service>.<chain id, two digits>.<role>`,
//! e.g. `CSR.05.emulator`.

use crate::utils::error::ConfigError;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::fs::File;
use std::io::Read;
use std::path::Path;

/// One row of the thread map file
#[derive(Debug, Clone, PartialEq, Eq, Deserialize)]
pub struct ThreadMapEntry {
    pub tid: i32,
    /// libvirt instance, e.g. `instance-000019f4`
    pub libvirt_id: String,
    /// Thread role inside qemu (`emulator`, `vcpu0`, ...)
    pub thread_type: String,
    pub uuid: String,
    pub chain_type: String,
    pub chain_id: u32,
    /// Service running in the VM
    pub nvf_name: String,
}

impl ThreadMapEntry {
    pub fn display_name(&self) -> String {
        format!("{}.{:02}.{}", self.nvf_name, self.chain_id, self.thread_type)
    }
}

/// Display names indexed by thread id
#[derive(Debug, Clone, Default)]
pub struct ThreadMap {
    names: HashMap<i32, String>,
}

impl ThreadMap {
    /// Load a thread map from a CSV file
    ///
    /// # Errors
    /// * `ConfigError::Read` - file cannot be opened
    /// * `ConfigError::Csv` - a row is not a valid thread map entry
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let file = File::open(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let map = Self::from_reader(file)?;
        info!("Thread map loaded with {} threads from {}", map.len(), path.display());
        Ok(map)
    }

    /// Parse thread map rows from any reader
    pub fn from_reader<R: Read>(reader: R) -> Result<Self, ConfigError> {
        let mut csv = csv::ReaderBuilder::new()
            .has_headers(false)
            .trim(csv::Trim::All)
            .comment(Some(b'#'))
            .from_reader(reader);

        let mut names = HashMap::new();
        for row in csv.deserialize::<ThreadMapEntry>() {
            let entry = row?;
            debug!("tid {} -> {}", entry.tid, entry.display_name());
            names.insert(entry.tid, entry.display_name());
        }
        Ok(Self { names })
    }

    /// Display name of `tid`, if mapped
    pub fn name_of(&self, tid: i32) -> Option<&str> {
        self.names.get(&tid).map(String::as_str)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }
}
