//! Optional naming plugins for virtualization threads.
//!
//! A plugin replaces the base name of a qemu thread (usually just
//! `qemu-system-x86`) with something meaningful for the analysis, such as
//! the service that VM runs. The role suffix is appended by the name cache
//! afterwards.

use super::procfs::VirtThread;
use crate::utils::error::ConfigError;
use log::{debug, info};
use serde::Deserialize;
use std::collections::HashMap;
use std::path::Path;

/// Converts the base name of a virtualization thread
pub trait NamingStrategy {
    fn convert_name(&mut self, raw_name: &str, tid: i32, thread: &VirtThread) -> String;
}

impl<F> NamingStrategy for F
where
    F: FnMut(&str, i32, &VirtThread) -> String,
{
    fn convert_name(&mut self, raw_name: &str, tid: i32, thread: &VirtThread) -> String {
        self(raw_name, tid, thread)
    }
}

/// Layout of the name map file
///
/// ```toml
/// [instances]
/// "5a7e2f3c-1b2d-4c3e-9f10-aabbccddeeff" = "CSR.01"
/// ```
#[derive(Debug, Default, Deserialize)]
struct NameMapFile {
    #[serde(default)]
    instances: HashMap<String, String>,
}

/// Names VM threads after their instance uuid
///
/// Unknown uuids take the raw name of the first thread seen for them, so
/// every thread of one VM shares a base name.
#[derive(Debug, Default, Clone)]
pub struct UuidNameMap {
    by_uuid: HashMap<String, String>,
}

impl UuidNameMap {
    pub fn new() -> Self {
        Self::default()
    }

    /// Load a name map from a TOML file
    ///
    /// # Errors
    /// * `ConfigError::Read` - file cannot be read
    /// * `ConfigError::Toml` - file is not a valid name map
    pub fn load(path: impl AsRef<Path>) -> Result<Self, ConfigError> {
        let path = path.as_ref();
        let text = std::fs::read_to_string(path).map_err(|source| ConfigError::Read {
            path: path.display().to_string(),
            source,
        })?;
        let map = Self::from_toml(&text)?;
        info!(
            "Name map loaded with {} instance names from {}",
            map.len(),
            path.display()
        );
        Ok(map)
    }

    /// Parse a name map from TOML text
    pub fn from_toml(text: &str) -> Result<Self, ConfigError> {
        let file: NameMapFile = toml::from_str(text)?;
        Ok(Self {
            by_uuid: file.instances,
        })
    }

    pub fn insert(&mut self, uuid: impl Into<String>, name: impl Into<String>) {
        self.by_uuid.insert(uuid.into(), name.into());
    }

    pub fn len(&self) -> usize {
        self.by_uuid.len()
    }

    pub fn is_empty(&self) -> bool {
        self.by_uuid.is_empty()
    }
}

impl NamingStrategy for UuidNameMap {
    fn convert_name(&mut self, raw_name: &str, tid: i32, thread: &VirtThread) -> String {
        self.by_uuid
            .entry(thread.uuid.clone())
            .or_insert_with(|| {
                debug!("tid {}: no name for uuid {}, using {}", tid, thread.uuid, raw_name);
                raw_name.to_string()
            })
            .clone()
    }
}
