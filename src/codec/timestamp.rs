//! Timestamp encoding for entry times and timestamp values inside records.
//!
//! Collectors accept two encodings: a `float64` of seconds since the Unix
//! epoch (keeps the sub-second part) and an integer of whole seconds. Both are
//! read back by [`decode_timestamp`], along with the MessagePack timestamp
//! extension (type `-1`) and Fluentd's `EventTime` extension (type `0`).

use chrono::{DateTime, Utc};
use rmp::Marker;

use crate::error::{DecodeError, EncodeError};

use super::primitive::Packer;

const NANOS_PER_SEC: f64 = 1_000_000_000.0;
/// Extension type of the MessagePack timestamp.
pub const MSGPACK_TIMESTAMP_EXT: i8 = -1;
/// Extension type of Fluentd's `EventTime`.
pub const EVENT_TIME_EXT: i8 = 0;

/// How instants are written to the wire.
#[derive(Clone, Copy, Debug, Default, PartialEq, Eq)]
pub enum TimestampMode {
    /// `float64` seconds since the epoch, sub-second precision kept.
    #[default]
    Float,
    /// Integer whole seconds since the epoch, sub-second part dropped.
    Integer,
}

/// Seconds since the epoch as a float, negative before 1970.
pub fn unix_seconds_f64(instant: &DateTime<Utc>) -> f64 {
    instant.timestamp() as f64 + f64::from(instant.timestamp_subsec_nanos()) / NANOS_PER_SEC
}

/// Write `instant` using `mode`, returning the number of bytes written.
pub fn encode_timestamp(
    packer: &mut Packer<'_>,
    instant: &DateTime<Utc>,
    mode: TimestampMode,
) -> Result<usize, EncodeError> {
    match mode {
        TimestampMode::Float => packer.write_f64(unix_seconds_f64(instant)),
        TimestampMode::Integer => packer.write_i64(instant.timestamp()),
    }
}

/// Read one timestamp from the start of `bytes`.
///
/// Returns the instant in UTC and the number of bytes consumed.
///
/// # Errors
///
/// Fails when the leading value is not a number or a known timestamp
/// extension, when the input is truncated, or when the value does not map to
/// a representable instant.
pub fn decode_timestamp(bytes: &[u8]) -> Result<(DateTime<Utc>, usize), DecodeError> {
    let first = *bytes
        .first()
        .ok_or_else(|| DecodeError::Read("empty input".into()))?;
    let mut rd = bytes;
    let instant = match Marker::from_u8(first) {
        Marker::F32 => from_float_seconds(f64::from(rmp::decode::read_f32(&mut rd)?))?,
        Marker::F64 => from_float_seconds(rmp::decode::read_f64(&mut rd)?)?,
        Marker::FixPos(_)
        | Marker::FixNeg(_)
        | Marker::U8
        | Marker::U16
        | Marker::U32
        | Marker::U64
        | Marker::I8
        | Marker::I16
        | Marker::I32
        | Marker::I64 => from_whole_seconds(rmp::decode::read_int::<i64, _>(&mut rd)?)?,
        Marker::FixExt1
        | Marker::FixExt2
        | Marker::FixExt4
        | Marker::FixExt8
        | Marker::FixExt16
        | Marker::Ext8
        | Marker::Ext16
        | Marker::Ext32 => {
            let meta = rmp::decode::read_ext_meta(&mut rd)?;
            let len = meta.size as usize;
            if rd.len() < len {
                return Err(DecodeError::Read(format!(
                    "extension needs {len} bytes, {} available",
                    rd.len()
                )));
            }
            let (payload, rest) = rd.split_at(len);
            rd = rest;
            decode_extension(meta.typeid, payload)?
        }
        other => return Err(DecodeError::UnexpectedMarker(other.to_u8())),
    };
    Ok((instant, bytes.len() - rd.len()))
}

fn decode_extension(type_id: i8, payload: &[u8]) -> Result<DateTime<Utc>, DecodeError> {
    let unsupported = || DecodeError::UnsupportedExtension {
        type_id,
        len: payload.len() as u32,
    };
    match (type_id, payload.len()) {
        (MSGPACK_TIMESTAMP_EXT, 4) => {
            let secs = u32::from_be_bytes(array(&payload[..4]));
            from_parts(i64::from(secs), 0)
        }
        (MSGPACK_TIMESTAMP_EXT, 8) => {
            let data = u64::from_be_bytes(array(payload));
            let nanos = (data >> 34) as u32;
            let secs = (data & 0x0000_0003_ffff_ffff) as i64;
            from_parts(secs, nanos)
        }
        (MSGPACK_TIMESTAMP_EXT, 12) => {
            let nanos = u32::from_be_bytes(array(&payload[..4]));
            let secs = i64::from_be_bytes(array(&payload[4..]));
            from_parts(secs, nanos)
        }
        (EVENT_TIME_EXT, 8) => {
            let secs = u32::from_be_bytes(array(&payload[..4]));
            let nanos = u32::from_be_bytes(array(&payload[4..]));
            from_parts(i64::from(secs), nanos)
        }
        _ => Err(unsupported()),
    }
}

fn array<const N: usize>(bytes: &[u8]) -> [u8; N] {
    let mut out = [0u8; N];
    out.copy_from_slice(bytes);
    out
}

fn from_parts(secs: i64, nanos: u32) -> Result<DateTime<Utc>, DecodeError> {
    if nanos >= 1_000_000_000 {
        return Err(DecodeError::OutOfRange(format!("{secs}s {nanos}ns")));
    }
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .ok_or_else(|| DecodeError::OutOfRange(format!("{secs}s {nanos}ns")))
}

fn from_whole_seconds(secs: i64) -> Result<DateTime<Utc>, DecodeError> {
    from_parts(secs, 0)
}

fn from_float_seconds(value: f64) -> Result<DateTime<Utc>, DecodeError> {
    if !value.is_finite() || value < i64::MIN as f64 || value >= i64::MAX as f64 {
        return Err(DecodeError::OutOfRange(value.to_string()));
    }
    let mut secs = value.floor();
    let mut nanos = ((value - secs) * NANOS_PER_SEC).round();
    if nanos >= NANOS_PER_SEC {
        secs += 1.0;
        nanos = 0.0;
    }
    from_parts(secs as i64, nanos as u32)
}
