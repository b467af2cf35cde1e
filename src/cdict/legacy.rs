//! Reader for the legacy cdict payload (Python `marshal` encoding).
//!
//! The first cdict files were a zlib-compressed `marshal.dumps` of the
//! column dictionary. Only the subset of marshal needed for that dictionary
//! is understood: dicts, lists/tuples, ints and longs, byte and unicode
//! strings (including interned strings and back references), `None` and
//! booleans. Both the Python 2 layout and the Python 3 reference flag are
//! accepted.

use super::event_log::{EventLog, NormalizedRecord, StoredComm};
use crate::utils::config::MAX_MARSHAL_DEPTH;
use crate::utils::error::LegacyError;
use log::debug;

const FLAG_REF: u8 = 0x80;

/// Decoded marshal object
#[derive(Debug, Clone, PartialEq)]
enum MarshalValue {
    Null,
    None,
    Bool(bool),
    Int(i64),
    Str(String),
    List(Vec<MarshalValue>),
    Dict(Vec<(MarshalValue, MarshalValue)>),
}

impl MarshalValue {
    fn describe(&self) -> &'static str {
        match self {
            Self::Null => "null marker",
            Self::None => "None",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::Str(_) => "string",
            Self::List(_) => "list",
            Self::Dict(_) => "dict",
        }
    }
}

struct MarshalReader<'a> {
    data: &'a [u8],
    pos: usize,
    /// Python 2 interned strings, addressed by 'R'
    interned: Vec<String>,
    /// Python 3 flagged objects, addressed by 'r'; containers keep an
    /// empty slot instead of a copy
    refs: Vec<Option<MarshalValue>>,
}

impl<'a> MarshalReader<'a> {
    fn new(data: &'a [u8]) -> Self {
        Self {
            data,
            pos: 0,
            interned: Vec::new(),
            refs: Vec::new(),
        }
    }

    fn take(&mut self, len: usize) -> Result<&'a [u8], LegacyError> {
        let end = self
            .pos
            .checked_add(len)
            .filter(|end| *end <= self.data.len())
            .ok_or(LegacyError::Truncated(self.pos))?;
        let bytes = &self.data[self.pos..end];
        self.pos = end;
        Ok(bytes)
    }

    fn read_u8(&mut self) -> Result<u8, LegacyError> {
        Ok(self.take(1)?[0])
    }

    fn read_i32(&mut self) -> Result<i32, LegacyError> {
        let bytes = self.take(4)?;
        Ok(i32::from_le_bytes([bytes[0], bytes[1], bytes[2], bytes[3]]))
    }

    fn read_i64(&mut self) -> Result<i64, LegacyError> {
        let bytes = self.take(8)?;
        let mut buf = [0u8; 8];
        buf.copy_from_slice(bytes);
        Ok(i64::from_le_bytes(buf))
    }

    fn read_len(&mut self) -> Result<usize, LegacyError> {
        let offset = self.pos;
        let len = self.read_i32()?;
        usize::try_from(len)
            .map_err(|_| LegacyError::Layout(format!("negative length {} at offset {}", len, offset)))
    }

    fn read_string(&mut self, len: usize) -> Result<String, LegacyError> {
        let offset = self.pos;
        let bytes = self.take(len)?;
        String::from_utf8(bytes.to_vec()).map_err(|_| LegacyError::InvalidUtf8(offset))
    }

    /// Python longs are stored as base 2**15 digits, least significant first
    fn read_long(&mut self) -> Result<i64, LegacyError> {
        let offset = self.pos;
        let count = self.read_i32()?;
        let mut value: i64 = 0;
        for index in 0..count.unsigned_abs() {
            let bytes = self.take(2)?;
            if index >= 4 {
                return Err(LegacyError::Layout(format!("long too large at offset {}", offset)));
            }
            let digit = i64::from(u16::from_le_bytes([bytes[0], bytes[1]]));
            value |= digit << (15 * index);
        }
        Ok(if count < 0 { -value } else { value })
    }

    fn read_items(&mut self, count: usize, depth: usize) -> Result<Vec<MarshalValue>, LegacyError> {
        // a corrupt count must not trigger a huge allocation
        let mut items = Vec::with_capacity(count.min(self.data.len()));
        for _ in 0..count {
            items.push(self.read_nested(depth)?);
        }
        Ok(items)
    }

    fn read_value(&mut self) -> Result<MarshalValue, LegacyError> {
        self.read_nested(1)
    }

    fn read_nested(&mut self, depth: usize) -> Result<MarshalValue, LegacyError> {
        let offset = self.pos;
        if depth > MAX_MARSHAL_DEPTH {
            return Err(LegacyError::Layout(format!(
                "containers nested deeper than {} levels at offset {}",
                MAX_MARSHAL_DEPTH, offset
            )));
        }
        let byte = self.read_u8()?;
        let flagged = byte & FLAG_REF != 0;
        let code = byte & !FLAG_REF;

        let slot = if flagged {
            self.refs.push(None);
            Some(self.refs.len() - 1)
        } else {
            None
        };

        let value = match code {
            b'0' => MarshalValue::Null,
            b'N' => MarshalValue::None,
            b'T' => MarshalValue::Bool(true),
            b'F' => MarshalValue::Bool(false),
            b'i' => MarshalValue::Int(i64::from(self.read_i32()?)),
            b'I' => MarshalValue::Int(self.read_i64()?),
            b'l' => MarshalValue::Int(self.read_long()?),
            b's' | b'u' | b'a' | b'A' => {
                let len = self.read_len()?;
                MarshalValue::Str(self.read_string(len)?)
            }
            b't' => {
                let len = self.read_len()?;
                let text = self.read_string(len)?;
                self.interned.push(text.clone());
                MarshalValue::Str(text)
            }
            b'z' | b'Z' => {
                let len = usize::from(self.read_u8()?);
                MarshalValue::Str(self.read_string(len)?)
            }
            b'R' => {
                let index = self.read_len()?;
                let text = self
                    .interned
                    .get(index)
                    .cloned()
                    .ok_or(LegacyError::BadReference(index))?;
                MarshalValue::Str(text)
            }
            b'r' => {
                let index = self.read_len()?;
                // cdict writers only share strings and numbers
                return self
                    .refs
                    .get(index)
                    .cloned()
                    .flatten()
                    .ok_or(LegacyError::BadReference(index));
            }
            b'(' | b'[' | b'<' | b'>' => {
                let count = self.read_len()?;
                MarshalValue::List(self.read_items(count, depth + 1)?)
            }
            b')' => {
                let count = usize::from(self.read_u8()?);
                MarshalValue::List(self.read_items(count, depth + 1)?)
            }
            b'{' => {
                let mut pairs = Vec::new();
                loop {
                    let key = self.read_nested(depth + 1)?;
                    if key == MarshalValue::Null {
                        break;
                    }
                    let value = self.read_nested(depth + 1)?;
                    pairs.push((key, value));
                }
                MarshalValue::Dict(pairs)
            }
            _ => return Err(LegacyError::UnsupportedType { code: byte, offset }),
        };

        if let Some(slot) = slot {
            if !matches!(value, MarshalValue::List(_) | MarshalValue::Dict(_)) {
                self.refs[slot] = Some(value.clone());
            }
        }
        Ok(value)
    }
}

/// Decode an uncompressed legacy payload into an event log
///
/// **Public** - fallback path of `codec::decode`
///
/// # Errors
/// * `LegacyError::UnsupportedType` - payload is not a marshal stream
/// * `LegacyError::Layout` - marshal stream is not a cdict column dictionary
pub fn decode_legacy(raw: &[u8]) -> Result<EventLog, LegacyError> {
    let mut reader = MarshalReader::new(raw);
    let root = reader.read_value()?;
    if reader.pos != raw.len() {
        return Err(LegacyError::TrailingBytes(reader.pos));
    }

    let MarshalValue::Dict(pairs) = root else {
        return Err(LegacyError::Layout(format!(
            "top level object is a {}, expected dict",
            root.describe()
        )));
    };

    let columns = LegacyColumns::new(pairs)?;
    let count = columns.get("event")?.len();
    debug!("Legacy cdict holds {} entries", count);

    let event = strings(columns.get("event")?, "event")?;
    let cpu = ints(columns.get("cpu")?, "cpu")?;
    let usecs = ints(columns.get("usecs")?, "usecs")?;
    let pid = ints(columns.get("pid")?, "pid")?;
    let task_name = strings(columns.get("task_name")?, "task_name")?;
    let duration = ints(columns.get("duration")?, "duration")?;
    let next_pid = optional_ints(columns.get("next_pid")?, "next_pid")?;
    let next_comm = comm_cells(columns.get("next_comm")?, &event)?;

    for (name, len) in [
        ("cpu", cpu.len()),
        ("usecs", usecs.len()),
        ("pid", pid.len()),
        ("task_name", task_name.len()),
        ("duration", duration.len()),
        ("next_pid", next_pid.len()),
        ("next_comm", next_comm.len()),
    ] {
        if len != count {
            return Err(LegacyError::Layout(format!(
                "column '{}' has {} entries, expected {}",
                name, len, count
            )));
        }
    }

    let mut log = EventLog::new();
    for index in 0..count {
        log.append(NormalizedRecord {
            event: event[index].clone(),
            cpu: narrow(cpu[index], "cpu")?,
            usecs: narrow(usecs[index], "usecs")?,
            pid: narrow(pid[index], "pid")?,
            task_name: task_name[index].clone(),
            duration: narrow(duration[index], "duration")?,
            next_pid: next_pid[index].map(|v| narrow(v, "next_pid")).transpose()?,
            next_comm: next_comm[index].clone(),
        });
    }
    Ok(log)
}

/// Column lists of the legacy dictionary, looked up by name
struct LegacyColumns {
    pairs: Vec<(String, Vec<MarshalValue>)>,
}

impl LegacyColumns {
    fn new(pairs: Vec<(MarshalValue, MarshalValue)>) -> Result<Self, LegacyError> {
        let mut columns = Vec::with_capacity(pairs.len());
        for (key, value) in pairs {
            let (MarshalValue::Str(name), MarshalValue::List(items)) = (key, value) else {
                return Err(LegacyError::Layout(
                    "dictionary entries must map names to lists".to_string(),
                ));
            };
            columns.push((name, items));
        }
        Ok(Self { pairs: columns })
    }

    fn get(&self, name: &str) -> Result<&[MarshalValue], LegacyError> {
        self.pairs
            .iter()
            .find(|(key, _)| key == name)
            .map(|(_, items)| items.as_slice())
            .ok_or_else(|| LegacyError::Layout(format!("missing column '{}'", name)))
    }
}

fn int_value(value: &MarshalValue, column: &str) -> Result<i64, LegacyError> {
    match value {
        MarshalValue::Int(v) => Ok(*v),
        MarshalValue::Bool(b) => Ok(i64::from(*b)),
        // the text-mode capture path stored numeric fields as strings
        MarshalValue::Str(s) => s.trim().parse().map_err(|_| {
            LegacyError::Layout(format!("column '{}' holds non-numeric string '{}'", column, s))
        }),
        other => Err(LegacyError::Layout(format!(
            "column '{}' holds a {}, expected int",
            column,
            other.describe()
        ))),
    }
}

fn ints(items: &[MarshalValue], column: &str) -> Result<Vec<i64>, LegacyError> {
    items.iter().map(|v| int_value(v, column)).collect()
}

fn optional_ints(items: &[MarshalValue], column: &str) -> Result<Vec<Option<i64>>, LegacyError> {
    items
        .iter()
        .map(|v| match v {
            MarshalValue::None => Ok(None),
            other => int_value(other, column).map(Some),
        })
        .collect()
}

fn strings(items: &[MarshalValue], column: &str) -> Result<Vec<String>, LegacyError> {
    items
        .iter()
        .map(|v| match v {
            MarshalValue::Str(s) => Ok(s.clone()),
            other => Err(LegacyError::Layout(format!(
                "column '{}' holds a {}, expected string",
                column,
                other.describe()
            ))),
        })
        .collect()
}

/// `next_comm` holds names, numeric exit reasons or fill zeros
fn comm_cells(items: &[MarshalValue], events: &[String]) -> Result<Vec<Option<String>>, LegacyError> {
    items
        .iter()
        .enumerate()
        .map(|(index, v)| {
            let cell = match v {
                MarshalValue::None => return Ok(None),
                MarshalValue::Str(s) => StoredComm::Name(s.clone()),
                MarshalValue::Int(code) => StoredComm::Code(*code),
                other => {
                    return Err(LegacyError::Layout(format!(
                        "column 'next_comm' holds a {}, expected string, int or None",
                        other.describe()
                    )))
                }
            };
            let event = events.get(index).map(String::as_str).unwrap_or_default();
            Ok(cell.into_comm(event))
        })
        .collect()
}

fn narrow<T: TryFrom<i64>>(value: i64, column: &str) -> Result<T, LegacyError> {
    T::try_from(value)
        .map_err(|_| LegacyError::Layout(format!("value {} out of range for column '{}'", value, column)))
}
