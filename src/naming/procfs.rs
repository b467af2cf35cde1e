//! Process metadata lookup used to recognize virtualization threads.
//!
//! A libvirt-managed qemu thread is identified by its command line
//! (`/usr/bin/qemu-system-* ... -uuid <uuid> ...`) and its cpuset path
//! (`/machine/instance-<hex>.libvirt-qemu/<role>`).

use crate::utils::config::{CPUSET_PATTERN, QEMU_CMDLINE_PREFIX, QEMU_UUID_PATTERN};
use crate::utils::error::MetadataError;
use log::debug;
use regex::Regex;
use std::io::ErrorKind;
use std::path::PathBuf;
use std::sync::LazyLock;

static UUID_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(QEMU_UUID_PATTERN).expect("Invalid qemu uuid regex pattern"));

static CPUSET_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(CPUSET_PATTERN).expect("Invalid cpuset regex pattern"));

/// Raw metadata of one thread
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ThreadMetadata {
    /// Command line with NUL separators replaced by spaces
    pub cmdline: String,
    /// cpuset cgroup path, absent on hosts without the cpuset file
    pub cpuset: Option<String>,
}

/// A thread recognized as part of a hosted virtual machine
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct VirtThread {
    /// libvirt instance name, e.g. `instance-000065d7`
    pub instance_id: String,
    pub uuid: String,
    /// Thread role inside qemu, e.g. `emulator` or `vcpu0`
    pub role: String,
}

/// Source of thread metadata
pub trait ProcessMetadata {
    /// Look up the metadata of `tid`
    ///
    /// Fails when the thread no longer exists.
    fn thread_metadata(&self, tid: i32) -> Result<ThreadMetadata, MetadataError>;
}

/// Reads thread metadata from a procfs mount
#[derive(Debug, Clone)]
pub struct ProcfsMetadata {
    root: PathBuf,
}

impl Default for ProcfsMetadata {
    fn default() -> Self {
        Self {
            root: PathBuf::from("/proc"),
        }
    }
}

impl ProcfsMetadata {
    pub fn new() -> Self {
        Self::default()
    }

    /// Read from another procfs-like tree (used by tests and sysroots)
    pub fn with_root(root: impl Into<PathBuf>) -> Self {
        Self { root: root.into() }
    }
}

impl ProcessMetadata for ProcfsMetadata {
    fn thread_metadata(&self, tid: i32) -> Result<ThreadMetadata, MetadataError> {
        let dir = self.root.join(tid.to_string());
        let cmdline = match std::fs::read(dir.join("cmdline")) {
            Ok(bytes) => String::from_utf8_lossy(&bytes).replace('\0', " "),
            Err(e) if e.kind() == ErrorKind::NotFound => {
                return Err(MetadataError::NoSuchThread(tid));
            }
            Err(e) => return Err(MetadataError::Io(e)),
        };
        let cpuset = std::fs::read_to_string(dir.join("cpuset")).ok();

        Ok(ThreadMetadata { cmdline, cpuset })
    }
}

/// Decide whether a thread belongs to a libvirt qemu process
///
/// **Public** - used by the name cache on every miss
pub fn classify(metadata: &ThreadMetadata) -> Option<VirtThread> {
    if !metadata.cmdline.starts_with(QEMU_CMDLINE_PREFIX) {
        return None;
    }
    let uuid = extract_uuid(&metadata.cmdline)?;
    let cpuset = metadata.cpuset.as_deref()?;
    let (instance_id, role) = parse_cpuset(cpuset)?;

    debug!("qemu thread of {} ({}) role {}", instance_id, uuid, role);
    Some(VirtThread {
        instance_id,
        uuid,
        role,
    })
}

/// Extract the value of `-uuid` from a qemu command line
///
/// **Private** - internal helper for classify
fn extract_uuid(cmdline: &str) -> Option<String> {
    UUID_RE
        .captures(cmdline)
        .map(|caps| caps[1].to_string())
}

/// Split `/machine/instance-<hex>.libvirt-qemu/<role>` into instance and role
///
/// **Private** - internal helper for classify
fn parse_cpuset(cpuset: &str) -> Option<(String, String)> {
    let caps = CPUSET_RE.captures(cpuset)?;
    Some((caps[1].to_string(), caps[2].to_string()))
}

#[cfg(test)]
mod tests {
    use super::*;

    const QEMU_CMDLINE: &str = "/usr/bin/qemu-system-x86_64 -name instance-000065d3 \
        -uuid 5a7e2f3c-1b2d-4c3e-9f10-aabbccddeeff -smp 4";

    fn metadata(cmdline: &str, cpuset: Option<&str>) -> ThreadMetadata {
        ThreadMetadata {
            cmdline: cmdline.to_string(),
            cpuset: cpuset.map(str::to_string),
        }
    }

    #[test]
    fn test_classify_vcpu_thread() {
        let thread = classify(&metadata(
            QEMU_CMDLINE,
            Some("/machine/instance-000065d3.libvirt-qemu/vcpu0\n"),
        ))
        .unwrap();
        assert_eq!(thread.instance_id, "instance-000065d3");
        assert_eq!(thread.uuid, "5a7e2f3c-1b2d-4c3e-9f10-aabbccddeeff");
        assert_eq!(thread.role, "vcpu0");
    }

    #[test]
    fn test_classify_emulator_thread() {
        let thread = classify(&metadata(
            QEMU_CMDLINE,
            Some("/machine/instance-000065d7.libvirt-qemu/emulator"),
        ))
        .unwrap();
        assert_eq!(thread.role, "emulator");
    }

    #[test]
    fn test_not_qemu() {
        assert!(classify(&metadata(
            "/usr/sbin/sshd -D",
            Some("/machine/instance-000065d3.libvirt-qemu/vcpu0")
        ))
        .is_none());
    }

    #[test]
    fn test_qemu_without_uuid_or_cpuset() {
        assert!(classify(&metadata("/usr/bin/qemu-system-x86_64 -smp 2", Some("/"))).is_none());
        assert!(classify(&metadata(QEMU_CMDLINE, None)).is_none());
        assert!(classify(&metadata(QEMU_CMDLINE, Some("/user.slice"))).is_none());
    }

    #[test]
    fn test_cpuset_separator_is_any_character() {
        assert_eq!(
            parse_cpuset("/machine/instance-00ab_libvirt-qemu/vcpu12\n"),
            Some(("instance-00ab".to_string(), "vcpu12".to_string()))
        );
        assert_eq!(parse_cpuset("/machine.slice/instance-00ab.libvirt-qemu/vcpu1"), None);
    }

    #[test]
    fn test_procfs_reads_tree() {
        let root = tempfile::tempdir().unwrap();
        let dir = root.path().join("4242");
        std::fs::create_dir_all(&dir).unwrap();
        std::fs::write(dir.join("cmdline"), "/usr/bin/qemu-system-x86_64\0-uuid\0abcd-12\0").unwrap();
        std::fs::write(dir.join("cpuset"), "/machine/instance-0a.libvirt-qemu/vcpu1\n").unwrap();

        let procfs = ProcfsMetadata::with_root(root.path());
        let meta = procfs.thread_metadata(4242).unwrap();
        assert_eq!(meta.cmdline, "/usr/bin/qemu-system-x86_64 -uuid abcd-12 ");
        assert_eq!(classify(&meta).unwrap().uuid, "abcd-12");

        assert!(matches!(
            procfs.thread_metadata(1),
            Err(MetadataError::NoSuchThread(1))
        ));
    }
}
