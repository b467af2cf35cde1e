//! Reader for `perf script` text output.
//!
//! Each sample line looks like
//!
//! ```text
//!  qemu-system-x86 27637 [006] 622048.897809: kvm:kvm_exit: reason HLT rip 0xffffffff8104f6e6 info 0 0
//! ```
//!
//! i.e. comm, tid (or `pid/tid`), `[cpu]`, timestamp, event name and the
//! tracepoint's formatted arguments. Call-chain frame lines (when the trace
//! was recorded with `-g`), comments and blank lines are skipped.

use super::occurrence::{short_event_name, CommonFields, Occurrence, OccurrenceKind, Tracepoint};
use crate::utils::error::ParseError;
use regex::Regex;
use std::collections::HashMap;
use std::io::BufRead;
use std::str::FromStr;
use std::sync::LazyLock;

/// `comm [pid/]tid [cpu] secs[.frac]: event: args`; comm may contain spaces
static SAMPLE_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<comm>.+?)\s+(?:\d+/)?(?P<tid>\d+)\s+\[(?P<cpu>\d+)\]\s+(?P<secs>\d+)(?:\.(?P<frac>\d+))?:\s+(?P<event>\S+?):(?:\s+(?P<args>.*?))?\s*$",
    )
    .expect("Invalid perf sample regex pattern")
});

/// Call-chain frame: `ffffffff8108a1b0 finish_task_switch+0x80 ([kernel.kallsyms])`
static FRAME_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"^\s*[0-9a-fA-F]+(?:\s|$)").expect("Invalid call-chain frame regex pattern"));

/// Start of a `key=` token
static KEY_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)(\w+)=").expect("Invalid key=value regex pattern"));

/// libtraceevent switch form: `prev:123 [120] S ==> next:456 [120]`
static PLUGIN_SWITCH_RE: LazyLock<Regex> = LazyLock::new(|| {
    Regex::new(
        r"^\s*(?P<prev_comm>.+):(?P<prev_pid>\d+)(?:\s+\[-?\d+\])?.*?==>\s*(?P<next_comm>.+):(?P<next_pid>\d+)(?:\s+\[-?\d+\])?\s*$",
    )
    .expect("Invalid sched_switch plugin regex pattern")
});

static VCPU_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)vcpu\s+(\d+)").expect("Invalid vcpu regex pattern"));

static REASON_RE: LazyLock<Regex> =
    LazyLock::new(|| Regex::new(r"(?:^|\s)reason\s+(\S+)").expect("Invalid exit reason regex pattern"));

/// Iterator over the occurrences of a `perf script` text stream
pub struct PerfTextReader<R> {
    lines: std::io::Lines<R>,
    line_no: usize,
    skipped: usize,
}

impl<R: BufRead> PerfTextReader<R> {
    pub fn new(reader: R) -> Self {
        Self {
            lines: reader.lines(),
            line_no: 0,
            skipped: 0,
        }
    }

    /// Number of comment, blank and call-chain lines skipped so far
    pub fn skipped_lines(&self) -> usize {
        self.skipped
    }
}

impl<R: BufRead> Iterator for PerfTextReader<R> {
    type Item = Result<Occurrence, ParseError>;

    fn next(&mut self) -> Option<Self::Item> {
        loop {
            let text = match self.lines.next()? {
                Ok(text) => text,
                Err(e) => return Some(Err(ParseError::Io(e))),
            };
            self.line_no += 1;
            match parse_perf_line(&text, self.line_no) {
                Ok(Some(occurrence)) => return Some(Ok(occurrence)),
                Ok(None) => self.skipped += 1,
                Err(e) => return Some(Err(e)),
            }
        }
    }
}

/// Parse one line of `perf script` output
///
/// **Public** - used by the reader, exposed for callers feeding lines
/// from other sources
///
/// # Arguments
/// * `text` - The raw line
/// * `line` - 1-based line number, for error reporting
///
/// # Returns
/// `Ok(None)` for lines carrying no occurrence (comments, blanks, call-chain
/// frames)
///
/// # Errors
/// * `ParseError::MalformedLine` - the line is neither a sample nor skippable
pub fn parse_perf_line(text: &str, line: usize) -> Result<Option<Occurrence>, ParseError> {
    let trimmed = text.trim();
    if trimmed.is_empty() || trimmed.starts_with('#') {
        return Ok(None);
    }

    let malformed = |reason: String| ParseError::MalformedLine { line, reason };

    let Some(caps) = SAMPLE_RE.captures(text) else {
        if FRAME_RE.is_match(trimmed) {
            return Ok(None);
        }
        return Err(malformed(
            "expected 'comm tid [cpu] timestamp: event:'".to_string(),
        ));
    };

    let tid = &caps["tid"];
    let pid = tid
        .parse()
        .map_err(|_| malformed(format!("invalid thread id '{}'", tid)))?;
    let cpu = caps["cpu"]
        .parse()
        .map_err(|_| malformed(format!("invalid cpu '{}'", &caps["cpu"])))?;
    let frac = caps.name("frac").map_or("", |m| m.as_str());
    let (secs, nsecs) = parse_timestamp(&caps["secs"], frac).map_err(&malformed)?;

    let common = CommonFields {
        cpu,
        secs,
        nsecs,
        pid,
        comm: caps["comm"].to_string(),
    };
    let short = short_event_name(&caps["event"]);
    let args = caps.name("args").map_or("", |m| m.as_str());
    let kind = match Tracepoint::from_name(short) {
        Some(tracepoint) => parse_args(tracepoint, args).map_err(|reason| {
            malformed(format!("{}: {}", tracepoint.name(), reason))
        })?,
        None => OccurrenceKind::Other {
            name: short.to_string(),
        },
    };

    Ok(Some(Occurrence { common, kind }))
}

/// `622048` + `897809` (usecs) or `897809123` (nsecs)
///
/// **Private** - internal helper for parse_perf_line
fn parse_timestamp(secs: &str, frac: &str) -> Result<(u64, u64), String> {
    let invalid = || format!("invalid timestamp '{}.{}'", secs, frac);
    let secs = secs.parse().map_err(|_| invalid())?;
    if frac.len() > 9 {
        return Err(invalid());
    }
    let nsecs = if frac.is_empty() {
        0
    } else {
        let scale = 10u64.pow(9 - frac.len() as u32);
        frac.parse::<u64>().map_err(|_| invalid())? * scale
    };
    Ok((secs, nsecs))
}

/// Parse the formatted arguments of a handled tracepoint
///
/// **Private** - internal helper for parse_perf_line
fn parse_args(tracepoint: Tracepoint, args: &str) -> Result<OccurrenceKind, String> {
    match tracepoint {
        Tracepoint::SchedSwitch => parse_switch(args),
        Tracepoint::SchedStatRuntime => {
            let kv = KeyValues::parse(args);
            Ok(OccurrenceKind::SchedStatRuntime {
                comm: kv.text("comm")?,
                pid: kv.number("pid")?,
                runtime_ns: kv.number("runtime")?,
            })
        }
        Tracepoint::SchedStatSleep => {
            let kv = KeyValues::parse(args);
            Ok(OccurrenceKind::SchedStatSleep {
                comm: kv.text("comm")?,
                pid: kv.number("pid")?,
                delay_ns: kv.number("delay")?,
            })
        }
        Tracepoint::SchedStatIowait => {
            let kv = KeyValues::parse(args);
            Ok(OccurrenceKind::SchedStatIowait {
                comm: kv.text("comm")?,
                pid: kv.number("pid")?,
                delay_ns: kv.number("delay")?,
            })
        }
        Tracepoint::KvmEntry => {
            let caps = VCPU_RE.captures(args).ok_or("missing 'vcpu N'")?;
            let vcpu_id = caps[1]
                .parse()
                .map_err(|_| format!("invalid vcpu '{}'", &caps[1]))?;
            Ok(OccurrenceKind::KvmEntry { vcpu_id })
        }
        Tracepoint::KvmExit => {
            let caps = REASON_RE.captures(args).ok_or("missing 'reason R'")?;
            Ok(OccurrenceKind::KvmExit {
                exit_reason: caps[1].to_string(),
            })
        }
    }
}

/// Both the raw `key=value` form and the libtraceevent plugin form
///
/// **Private** - internal helper for parse_args
fn parse_switch(args: &str) -> Result<OccurrenceKind, String> {
    if args.contains("prev_pid=") {
        let kv = KeyValues::parse(args);
        return Ok(OccurrenceKind::SchedSwitch {
            prev_comm: kv.text("prev_comm")?,
            prev_pid: kv.number("prev_pid")?,
            next_comm: kv.text("next_comm")?,
            next_pid: kv.number("next_pid")?,
        });
    }

    let caps = PLUGIN_SWITCH_RE
        .captures(args)
        .ok_or("expected 'prev_pid=' or 'comm:pid ... ==> comm:pid'")?;
    let pid = |name: &str| {
        caps[name]
            .parse::<i32>()
            .map_err(|_| format!("invalid {} '{}'", name, &caps[name]))
    };
    Ok(OccurrenceKind::SchedSwitch {
        prev_comm: caps["prev_comm"].to_string(),
        prev_pid: pid("prev_pid")?,
        next_comm: caps["next_comm"].to_string(),
        next_pid: pid("next_pid")?,
    })
}

/// `key=value` arguments; a value runs until the next `key=` token so
/// task names containing spaces survive
///
/// **Private** - internal helper for parse_args
struct KeyValues<'a> {
    values: HashMap<&'a str, &'a str>,
}

impl<'a> KeyValues<'a> {
    fn parse(args: &'a str) -> Self {
        let keys: Vec<(&'a str, usize, usize)> = KEY_RE
            .captures_iter(args)
            .filter_map(|caps| {
                let token = caps.get(0)?;
                Some((caps.get(1)?.as_str(), token.start(), token.end()))
            })
            .collect();

        let mut values = HashMap::with_capacity(keys.len());
        for (index, (key, _, value_start)) in keys.iter().enumerate() {
            let value_end = keys.get(index + 1).map_or(args.len(), |(_, start, _)| *start);
            values.insert(*key, args[*value_start..value_end].trim());
        }
        Self { values }
    }

    fn text(&self, key: &str) -> Result<String, String> {
        self.values
            .get(key)
            .map(|value| value.to_string())
            .ok_or_else(|| format!("missing '{}='", key))
    }

    /// Numbers are followed by unit tokens such as `[ns]`; only the first
    /// word counts
    fn number<T: FromStr>(&self, key: &str) -> Result<T, String> {
        let value = self
            .values
            .get(key)
            .ok_or_else(|| format!("missing '{}='", key))?;
        let first = value.split_whitespace().next().unwrap_or("");
        first
            .parse()
            .map_err(|_| format!("invalid {} '{}'", key, first))
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    fn parse(text: &str) -> Occurrence {
        parse_perf_line(text, 1).unwrap().unwrap()
    }

    #[test]
    fn test_kvm_entry_line() {
        let occ = parse(" qemu-system-x86 27637 [006] 622048.897809: kvm:kvm_entry: vcpu 0");
        assert_eq!(occ.common.comm, "qemu-system-x86");
        assert_eq!(occ.common.pid, 27637);
        assert_eq!(occ.common.cpu, 6);
        assert_eq!(occ.common.secs, 622048);
        assert_eq!(occ.common.nsecs, 897_809_000);
        assert_eq!(occ.kind, OccurrenceKind::KvmEntry { vcpu_id: 0 });
    }

    #[test]
    fn test_kvm_exit_line() {
        let occ = parse(
            " qemu-system-x86 27637 [006] 622048.897817: kvm:kvm_exit: reason EXTERNAL_INTERRUPT rip 0xffffffff8104f6e6 info 0 800000fd",
        );
        assert_eq!(
            occ.kind,
            OccurrenceKind::KvmExit {
                exit_reason: "EXTERNAL_INTERRUPT".to_string()
            }
        );
    }

    #[test]
    fn test_switch_key_value_form() {
        let occ = parse(
            "  Web Content 1234/1240 [001] 100.000000001: sched:sched_switch: prev_comm=Web Content prev_pid=1240 prev_prio=120 prev_state=S ==> next_comm=swapper/1 next_pid=0 next_prio=120",
        );
        assert_eq!(occ.common.comm, "Web Content");
        assert_eq!(occ.common.pid, 1240);
        assert_eq!(occ.common.nsecs, 1);
        assert_eq!(
            occ.kind,
            OccurrenceKind::SchedSwitch {
                prev_comm: "Web Content".to_string(),
                prev_pid: 1240,
                next_comm: "swapper/1".to_string(),
                next_pid: 0,
            }
        );
    }

    #[test]
    fn test_switch_plugin_form() {
        let occ = parse(
            "            perf 4242 [002] 55.5: sched:sched_switch: perf:4242 [120] R ==> kworker/2:1:77 [120]",
        );
        assert_eq!(
            occ.kind,
            OccurrenceKind::SchedSwitch {
                prev_comm: "perf".to_string(),
                prev_pid: 4242,
                next_comm: "kworker/2:1".to_string(),
                next_pid: 77,
            }
        );
    }

    #[test]
    fn test_stat_runtime_with_units() {
        let occ = parse(
            "bash 99 [003] 10.000100: sched:sched_stat_runtime: comm=bash pid=99 runtime=2000 [ns] vruntime=123456 [ns]",
        );
        assert_eq!(
            occ.kind,
            OccurrenceKind::SchedStatRuntime {
                comm: "bash".to_string(),
                pid: 99,
                runtime_ns: 2000,
            }
        );
    }

    #[test]
    fn test_unknown_event_passes_through() {
        let occ = parse("bash 99 [003] 10.0: sched:sched_wakeup: comm=sshd pid=12 prio=120 target_cpu=003");
        assert_eq!(
            occ.kind,
            OccurrenceKind::Other {
                name: "sched_wakeup".to_string()
            }
        );
    }

    #[test]
    fn test_skipped_lines() {
        assert!(parse_perf_line("", 1).unwrap().is_none());
        assert!(parse_perf_line("# ========", 1).unwrap().is_none());
        assert!(parse_perf_line(
            "\t    ffffffff8108a1b0 finish_task_switch+0x80 ([kernel.kallsyms])",
            1
        )
        .unwrap()
        .is_none());
    }

    #[test]
    fn test_malformed_line_reports_number() {
        let err = parse_perf_line("this is not perf output", 17).unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { line: 17, .. }));
    }

    #[test]
    fn test_missing_argument_is_malformed() {
        let err = parse_perf_line("bash 99 [003] 10.0: sched:sched_stat_sleep: comm=bash pid=99", 3)
            .unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { line: 3, .. }));
    }

    #[test]
    fn test_key_values_keep_spaces_in_names() {
        let kv = KeyValues::parse("comm=Web Content pid=7 delay=120 [ns]");
        assert_eq!(kv.text("comm").unwrap(), "Web Content");
        assert_eq!(kv.number::<i32>("pid").unwrap(), 7);
        assert_eq!(kv.number::<u64>("delay").unwrap(), 120);
        assert!(kv.text("prio").is_err());
    }

    #[test]
    fn test_overlong_fraction_is_malformed() {
        let err = parse_perf_line("bash 1 [000] 1.0123456789: kvm:kvm_entry: vcpu 0", 4).unwrap_err();
        assert!(matches!(err, ParseError::MalformedLine { line: 4, .. }));
    }

    #[test]
    fn test_reader_iterates_and_counts_skips() {
        let input = "# header\n\nbash 1 [000] 1.0: kvm:kvm_entry: vcpu 2\n\tffff sym (dso)\nbash 1 [000] 1.5: kvm:kvm_exit: reason HLT\n";
        let mut reader = PerfTextReader::new(input.as_bytes());
        let occurrences: Vec<_> = reader.by_ref().collect::<Result<_, _>>().unwrap();
        assert_eq!(occurrences.len(), 2);
        assert_eq!(reader.skipped_lines(), 3);
    }
}
