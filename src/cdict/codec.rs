//! cdict container encoding and decoding.
//!
//! A cdict is a zlib stream wrapping a dictionary of the eight event log
//! columns. Current files serialize the dictionary with MessagePack; the
//! first generation used Python `marshal`, which is still readable here.

use super::event_log::EventLog;
use super::legacy::decode_legacy;
use crate::utils::error::CodecError;
use flate2::read::ZlibDecoder;
use flate2::write::ZlibEncoder;
use flate2::Compression;
use log::{debug, info};
use rmp::Marker;
use std::io::{Read, Write};

/// Object encoding found inside a cdict container
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum CdictFormat {
    /// First generation, Python marshal
    Marshal,
    /// Current, MessagePack
    MessagePack,
}

impl CdictFormat {
    pub fn name(self) -> &'static str {
        match self {
            Self::Marshal => "marshal (legacy)",
            Self::MessagePack => "msgpack",
        }
    }
}

/// Encode an event log into a compressed cdict blob
///
/// **Public** - main entry point for persisting a decode run
///
/// # Errors
/// * `CodecError::Encode` - MessagePack serialization failed
/// * `CodecError::Compress` - zlib stream could not be written
pub fn encode(log: &EventLog) -> Result<Vec<u8>, CodecError> {
    debug!("Packing {} entries", log.len());
    let packed = rmp_serde::to_vec_named(log)?;

    let mut encoder = ZlibEncoder::new(Vec::with_capacity(packed.len() / 4), Compression::default());
    encoder.write_all(&packed).map_err(CodecError::Compress)?;
    let compressed = encoder.finish().map_err(CodecError::Compress)?;

    info!(
        "Compressed dictionary: {} entries, size={} bytes (packed {} bytes)",
        log.len(),
        compressed.len(),
        packed.len()
    );
    Ok(compressed)
}

/// Decode a compressed cdict blob, whichever encoding it uses
///
/// **Public** - main entry point for reading cdict files
pub fn decode(bytes: &[u8]) -> Result<EventLog, CodecError> {
    decode_with_format(bytes).map(|(log, _)| log)
}

/// Decode a compressed cdict blob and report which encoding it used
///
/// The MessagePack reader runs first. Only when the payload does not start
/// with a MessagePack map is the legacy marshal reader tried; any other
/// MessagePack failure is returned as is.
///
/// # Errors
/// * `CodecError::Decompress` - not a zlib stream
/// * `CodecError::Decode` - a MessagePack map that is not a cdict
/// * `CodecError::Legacy` - neither encoding matched
pub fn decode_with_format(bytes: &[u8]) -> Result<(EventLog, CdictFormat), CodecError> {
    let raw = decompress(bytes)?;
    debug!("Decompressed {} bytes into {} bytes", bytes.len(), raw.len());

    match decode_current(&raw) {
        Ok(log) => Ok((log, CdictFormat::MessagePack)),
        Err(CodecError::NotCurrentFormat) => {
            debug!("Payload is not a MessagePack map, trying legacy marshal encoding");
            let log = decode_legacy(&raw)?;
            Ok((log, CdictFormat::Marshal))
        }
        Err(e) => Err(e),
    }
}

/// Inflate a zlib stream
///
/// **Private** - internal helper for decode_with_format
fn decompress(bytes: &[u8]) -> Result<Vec<u8>, CodecError> {
    let mut raw = Vec::with_capacity(bytes.len() * 4);
    ZlibDecoder::new(bytes)
        .read_to_end(&mut raw)
        .map_err(CodecError::Decompress)?;
    Ok(raw)
}

/// Read the current MessagePack encoding
///
/// **Private** - internal helper for decode_with_format
fn decode_current(raw: &[u8]) -> Result<EventLog, CodecError> {
    match raw.first().copied().map(Marker::from_u8) {
        Some(Marker::FixMap(_)) | Some(Marker::Map16) | Some(Marker::Map32) => {}
        _ => return Err(CodecError::NotCurrentFormat),
    }

    let log: EventLog = rmp_serde::from_slice(raw)?;
    log.check_columns()?;
    Ok(log)
}
