//! Positional tracepoint payloads and their normalization.
//!
//! Perf scripting callbacks receive their fields positionally. Newer perf
//! releases insert a `common_callchain` field right after `common_comm`, so
//! the same tracepoint arrives in one of two shapes:
//!
//! - `cpu, secs, nsecs, pid, comm, <tracepoint fields>`
//! - `cpu, secs, nsecs, pid, comm, callchain, <tracepoint fields>`
//!
//! The adapter here detects the shape from the field count and turns either
//! one into a canonical [`Occurrence`]. Any other field count is an error.

use super::occurrence::{CommonFields, Occurrence, OccurrenceKind, Tracepoint};
use crate::utils::config::{CALLCHAIN_FIELD_INDEX, COMMON_FIELD_COUNT};
use crate::utils::error::PayloadError;
use serde::{Deserialize, Serialize};

/// One positional field value
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum FieldValue {
    Int(i64),
    /// Unsigned values above `i64::MAX` (guest addresses)
    UInt(u64),
    Str(String),
    List(Vec<FieldValue>),
    Null,
}

impl FieldValue {
    fn kind(&self) -> &'static str {
        match self {
            Self::Int(_) | Self::UInt(_) => "integer",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Null => "null",
        }
    }
}

/// Raw positional occurrence, as handed over by the trace source
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct RawOccurrence {
    /// Event name, e.g. `sched__sched_switch` or `kvm:kvm_exit`
    pub event: String,
    pub fields: Vec<FieldValue>,
}

/// Layout of a positional payload
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PayloadShape {
    /// Common fields directly followed by tracepoint fields
    Plain,
    /// Call-chain placeholder between common and tracepoint fields
    WithCallchain,
}

impl PayloadShape {
    /// Detect the shape of a payload of `len` fields for `tracepoint`
    pub fn detect(tracepoint: Tracepoint, len: usize) -> Option<Self> {
        let plain = COMMON_FIELD_COUNT + tracepoint.field_count();
        if len == plain {
            Some(Self::Plain)
        } else if len == plain + 1 {
            Some(Self::WithCallchain)
        } else {
            None
        }
    }
}

/// Normalize a positional payload into a canonical occurrence
///
/// **Public** - the single place where payload shapes are reconciled
///
/// # Errors
/// * `PayloadError::ArityMismatch` - field count matches neither shape
/// * `PayloadError::FieldType` - a field has the wrong type or range
pub fn adapt(tracepoint: Tracepoint, raw: &RawOccurrence) -> Result<Occurrence, PayloadError> {
    let shape = PayloadShape::detect(tracepoint, raw.fields.len()).ok_or_else(|| {
        PayloadError::ArityMismatch {
            event: raw.event.clone(),
            expected: COMMON_FIELD_COUNT + tracepoint.field_count(),
            found: raw.fields.len(),
        }
    })?;

    let values: Vec<&FieldValue> = raw
        .fields
        .iter()
        .enumerate()
        .filter(|(index, _)| shape == PayloadShape::Plain || *index != CALLCHAIN_FIELD_INDEX)
        .map(|(_, value)| value)
        .collect();
    let fields = Fields {
        event: &raw.event,
        values,
    };

    let common = CommonFields {
        cpu: fields.int(0, "common_cpu")?,
        secs: fields.int(1, "common_secs")?,
        nsecs: fields.int(2, "common_nsecs")?,
        pid: fields.int(3, "common_pid")?,
        comm: fields.text(4, "common_comm")?,
    };

    let base = COMMON_FIELD_COUNT;
    let kind = match tracepoint {
        Tracepoint::SchedSwitch => OccurrenceKind::SchedSwitch {
            prev_comm: fields.text(base, "prev_comm")?,
            prev_pid: fields.int(base + 1, "prev_pid")?,
            next_comm: fields.text(base + 4, "next_comm")?,
            next_pid: fields.int(base + 5, "next_pid")?,
        },
        Tracepoint::SchedStatRuntime => OccurrenceKind::SchedStatRuntime {
            comm: fields.text(base, "comm")?,
            pid: fields.int(base + 1, "pid")?,
            runtime_ns: fields.int(base + 2, "runtime")?,
        },
        Tracepoint::SchedStatSleep => OccurrenceKind::SchedStatSleep {
            comm: fields.text(base, "comm")?,
            pid: fields.int(base + 1, "pid")?,
            delay_ns: fields.int(base + 2, "delay")?,
        },
        Tracepoint::SchedStatIowait => OccurrenceKind::SchedStatIowait {
            comm: fields.text(base, "comm")?,
            pid: fields.int(base + 1, "pid")?,
            delay_ns: fields.int(base + 2, "delay")?,
        },
        Tracepoint::KvmEntry => OccurrenceKind::KvmEntry {
            vcpu_id: fields.int(base, "vcpu_id")?,
        },
        Tracepoint::KvmExit => OccurrenceKind::KvmExit {
            exit_reason: fields.reason(base, "exit_reason")?,
        },
    };

    Ok(Occurrence { common, kind })
}

/// Typed access to the canonical field list
///
/// **Private** - internal helper for adapt
struct Fields<'a> {
    event: &'a str,
    values: Vec<&'a FieldValue>,
}

impl<'a> Fields<'a> {
    fn type_error(&self, index: usize, name: &'static str, expected: &'static str) -> PayloadError {
        PayloadError::FieldType {
            event: self.event.to_string(),
            index,
            name,
            expected,
            found: self
                .values
                .get(index)
                .map(|v| v.kind())
                .unwrap_or("nothing")
                .to_string(),
        }
    }

    fn int<T>(&self, index: usize, name: &'static str) -> Result<T, PayloadError>
    where
        T: TryFrom<i64> + TryFrom<u64>,
    {
        let value = match self.values.get(index) {
            Some(FieldValue::Int(v)) => <T as TryFrom<i64>>::try_from(*v).ok(),
            Some(FieldValue::UInt(v)) => <T as TryFrom<u64>>::try_from(*v).ok(),
            _ => None,
        };
        value.ok_or_else(|| self.type_error(index, name, "an integer in range"))
    }

    fn text(&self, index: usize, name: &'static str) -> Result<String, PayloadError> {
        match self.values.get(index) {
            Some(FieldValue::Str(s)) => Ok(s.clone()),
            _ => Err(self.type_error(index, name, "a string")),
        }
    }

    /// Exit reasons arrive as numeric codes or as symbolic names
    fn reason(&self, index: usize, name: &'static str) -> Result<String, PayloadError> {
        match self.values.get(index) {
            Some(FieldValue::Str(s)) => Ok(s.clone()),
            Some(FieldValue::Int(v)) => Ok(v.to_string()),
            Some(FieldValue::UInt(v)) => Ok(v.to_string()),
            _ => Err(self.type_error(index, name, "a string or integer")),
        }
    }
}
