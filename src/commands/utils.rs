use crate::cdict::{remap_threads, EventLog};
use crate::naming::ThreadMap;
use crate::output::read_cdict;
use crate::utils::config::REPORT_SCHEMA_VERSION;
use anyhow::{Context, Result};
use std::collections::{BTreeMap, BTreeSet};
use std::path::{Path, PathBuf};

/// Overview of a cdict file
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct CdictOverview {
    pub format: &'static str,
    pub entries: usize,
    /// Last `usecs` value (the first is the epoch)
    pub span_usecs: u64,
    pub cpus: usize,
    pub threads: usize,
    /// Distinct task names, after any thread map was applied
    pub task_names: usize,
    pub by_event: BTreeMap<String, u64>,
}

impl CdictOverview {
    pub fn from_log(log: &EventLog, format: &'static str) -> Self {
        let mut by_event = BTreeMap::new();
        for event in log.events() {
            *by_event.entry(event.clone()).or_insert(0) += 1;
        }
        Self {
            format,
            entries: log.len(),
            span_usecs: log.usecs().iter().copied().max().unwrap_or(0),
            cpus: log.cpus().iter().collect::<BTreeSet<_>>().len(),
            threads: log.pids().iter().collect::<BTreeSet<_>>().len(),
            task_names: log.task_names().iter().collect::<BTreeSet<_>>().len(),
            by_event,
        }
    }
}

/// Load a CSV thread map
///
/// **Public** - shared by convert and inspect
pub fn load_thread_map(path: &Path) -> Result<ThreadMap> {
    ThreadMap::load(path).with_context(|| format!("Failed to load thread map {}", path.display()))
}

/// Inspect a cdict file
///
/// **Public** - prints format, size and per-event counts
///
/// # Arguments
/// * `file_path` - cdict file, extension optional
/// * `thread_map` - CSV thread map applied before counting (optional)
pub fn inspect_cdict_file(file_path: PathBuf, thread_map: Option<PathBuf>) -> Result<CdictOverview> {
    println!("Inspecting cdict: {}", file_path.display());

    let (mut log, format) = read_cdict(&file_path)
        .with_context(|| format!("Failed to read cdict {}", file_path.display()))?;
    if let Some(path) = &thread_map {
        let map = load_thread_map(path)?;
        let (remapped, stats) = remap_threads(&log, &map);
        println!("  Remapped {} task names", stats.total());
        log = remapped;
    }
    let overview = CdictOverview::from_log(&log, format.name());

    println!("✓ Valid cdict");
    println!("  Encoding: {}", overview.format);
    println!("  Entries: {}", overview.entries);
    println!(
        "  Time span: {:.6}s",
        overview.span_usecs as f64 / 1_000_000.0
    );
    println!("  CPUs: {}", overview.cpus);
    println!("  Threads: {}", overview.threads);
    println!("  Task names: {}", overview.task_names);
    println!("  Events:");
    let mut counts: Vec<_> = overview.by_event.iter().collect();
    counts.sort_by(|a, b| b.1.cmp(a.1).then_with(|| a.0.cmp(b.0)));
    for (event, count) in counts {
        println!("   {:>8} {}", count, event);
    }

    Ok(overview)
}

/// Display version information
pub fn display_version() {
    println!("mkcdict v{}", env!("CARGO_PKG_VERSION"));
    println!("Run Report Schema: v{}", REPORT_SCHEMA_VERSION);
    println!();
    println!("Decodes scheduler and KVM traces into compressed cdict event logs.");
}
