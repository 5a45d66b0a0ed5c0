//! MessagePack building blocks used by the record encoder.

mod primitive;
mod timestamp;

pub use primitive::Packer;
pub use timestamp::{
    EVENT_TIME_EXT, MSGPACK_TIMESTAMP_EXT, TimestampMode, decode_timestamp, encode_timestamp,
    unix_seconds_f64,
};
