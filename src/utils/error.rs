//! Error types for the entire application.
//!
//! We use `thiserror` for library-style errors with custom types,
//! and `anyhow` for application-level error propagation in main.rs and commands.

use thiserror::Error;

/// Errors raised when an occurrence payload matches no known shape
#[derive(Error, Debug)]
pub enum PayloadError {
    #[error("{event}: expected {expected} fields (or {} with call chain), found {found}", .expected + 1)]
    ArityMismatch {
        event: String,
        expected: usize,
        found: usize,
    },

    #[error("{event}: field {index} ({name}) must be {expected}, found {found}")]
    FieldType {
        event: String,
        index: usize,
        name: &'static str,
        expected: &'static str,
        found: String,
    },
}

/// Errors that can occur while reading trace input files
#[derive(Error, Debug)]
pub enum ParseError {
    #[error("line {line}: {reason}")]
    MalformedLine { line: usize, reason: String },

    #[error("line {line}: JSON deserialization failed: {source}")]
    Json {
        line: usize,
        #[source]
        source: serde_json::Error,
    },

    #[error("line {line}: {source}")]
    Payload {
        line: usize,
        #[source]
        source: PayloadError,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}

/// Errors from the legacy (Python marshal) cdict reader
#[derive(Error, Debug)]
pub enum LegacyError {
    #[error("unexpected end of marshal data at offset {0}")]
    Truncated(usize),

    #[error("unsupported marshal type code 0x{code:02x} at offset {offset}")]
    UnsupportedType { code: u8, offset: usize },

    #[error("invalid marshal back reference {0}")]
    BadReference(usize),

    #[error("invalid UTF-8 in marshal string at offset {0}")]
    InvalidUtf8(usize),

    #[error("trailing bytes after marshal object at offset {0}")]
    TrailingBytes(usize),

    #[error("unexpected cdict layout: {0}")]
    Layout(String),
}

/// Errors that can occur while encoding or decoding a cdict container
#[derive(Error, Debug)]
pub enum CodecError {
    #[error("zlib compression failed: {0}")]
    Compress(#[source] std::io::Error),

    #[error("zlib decompression failed: {0}")]
    Decompress(#[source] std::io::Error),

    #[error("MessagePack encoding failed: {0}")]
    Encode(#[from] rmp_serde::encode::Error),

    #[error("MessagePack decoding failed: {0}")]
    Decode(#[from] rmp_serde::decode::Error),

    #[error("payload does not start with a MessagePack map")]
    NotCurrentFormat,

    #[error("payload matches neither cdict encoding: {0}")]
    Legacy(#[from] LegacyError),

    #[error("column '{column}' has {found} entries, expected {expected}")]
    ColumnLength {
        column: &'static str,
        expected: usize,
        found: usize,
    },
}

/// Errors that can occur during file input/output
#[derive(Error, Debug)]
pub enum OutputError {
    #[error("Failed to write file: {0}")]
    WriteFailed(#[source] std::io::Error),

    #[error("Failed to read file: {0}")]
    ReadFailed(#[source] std::io::Error),

    #[error("Invalid cdict container: {0}")]
    Codec(#[from] CodecError),

    #[error("Failed to serialize JSON: {0}")]
    SerializationFailed(#[from] serde_json::Error),

    #[error("Invalid output path: {0}")]
    InvalidPath(String),
}

/// Errors loading the name map and thread map files
#[derive(Error, Debug)]
pub enum ConfigError {
    #[error("Failed to read {path}: {source}")]
    Read {
        path: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Invalid name map: {0}")]
    Toml(#[from] toml::de::Error),

    #[error("Invalid thread map: {0}")]
    Csv(#[from] csv::Error),
}

/// Process metadata lookup failures (never fatal to a decode run)
#[derive(Error, Debug)]
pub enum MetadataError {
    #[error("thread {0} no longer exists")]
    NoSuchThread(i32),

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),
}
