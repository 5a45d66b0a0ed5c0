//! Framing of `[tag, time, record]` entries.
//!
//! An entry is always a three element MessagePack array: the tag as text, the
//! event time through the timestamp codec, then the encoded record. Framing
//! performs no I/O; the resulting buffer is handed to a transport whole.

use std::fmt;

use chrono::{DateTime, TimeZone, Utc};
use serde::Serialize;

use crate::{
    codec::{Packer, encode_timestamp},
    encoder::{EncoderConfig, RecordEncoder},
    error::EncodeError,
    value::DynamicValue,
};

/// Source of the current instant for entries framed without a time.
pub type Clock = Box<dyn Fn() -> DateTime<Utc> + Send + Sync>;

/// Returns the system clock's current UTC instant.
pub fn system_clock() -> DateTime<Utc> {
    Utc::now()
}

/// A single event destined for the collector.
#[derive(Clone, Debug, PartialEq)]
pub struct Entry {
    /// Routing tag; must not be empty.
    pub tag: String,
    /// When the event happened, in UTC.
    pub time: DateTime<Utc>,
    /// Event payload, usually a record or mapping.
    pub record: DynamicValue,
}

impl Entry {
    /// Build an entry; `time` is converted to UTC.
    pub fn new<Tz: TimeZone>(
        tag: impl Into<String>,
        time: DateTime<Tz>,
        record: impl Into<DynamicValue>,
    ) -> Self {
        Self {
            tag: tag.into(),
            time: time.with_timezone(&Utc),
            record: record.into(),
        }
    }
}

/// Frames entries into contiguous MessagePack buffers.
pub struct EntryFramer {
    encoder: RecordEncoder,
    clock: Clock,
}

impl EntryFramer {
    /// Framer using the system clock.
    pub fn new(config: EncoderConfig) -> Self {
        Self::with_clock(config, Box::new(system_clock))
    }

    /// Framer reading the current instant from `clock`.
    pub fn with_clock(config: EncoderConfig, clock: Clock) -> Self {
        Self {
            encoder: RecordEncoder::new(config),
            clock,
        }
    }

    /// The encoder used for record payloads.
    pub fn encoder(&self) -> &RecordEncoder {
        &self.encoder
    }

    /// Frame `record` under `tag`, stamped with `when` or the clock's current
    /// instant.
    ///
    /// # Errors
    ///
    /// Returns [`EncodeError::EmptyTag`] before writing anything when `tag`
    /// is empty, or the record encoder's error when `record` cannot be
    /// encoded.
    pub fn frame<Tz: TimeZone>(
        &self,
        tag: &str,
        when: Option<DateTime<Tz>>,
        record: &DynamicValue,
    ) -> Result<Vec<u8>, EncodeError> {
        if tag.is_empty() {
            return Err(EncodeError::EmptyTag);
        }
        let time = when.map_or_else(|| (self.clock)(), |t| t.with_timezone(&Utc));
        self.write_entry(tag, &time, record)
    }

    /// Frame `record` stamped with the clock's current instant.
    pub fn frame_now(&self, tag: &str, record: &DynamicValue) -> Result<Vec<u8>, EncodeError> {
        self.frame(tag, None::<DateTime<Utc>>, record)
    }

    /// Frame a prepared [`Entry`].
    pub fn frame_entry(&self, entry: &Entry) -> Result<Vec<u8>, EncodeError> {
        self.frame(&entry.tag, Some(entry.time), &entry.record)
    }

    /// Frame any serialisable record stamped with the current instant.
    ///
    /// The encoder's nesting limit applies while the record is converted.
    pub fn frame_serialize<T: Serialize + ?Sized>(
        &self,
        tag: &str,
        record: &T,
    ) -> Result<Vec<u8>, EncodeError> {
        if tag.is_empty() {
            return Err(EncodeError::EmptyTag);
        }
        let record = self.encoder.to_dynamic(record)?;
        self.frame_now(tag, &record)
    }

    fn write_entry(
        &self,
        tag: &str,
        time: &DateTime<Utc>,
        record: &DynamicValue,
    ) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::with_capacity(64 + tag.len());
        let mut packer = Packer::new(&mut buf);
        packer.write_array_header(3)?;
        packer.write_text(tag)?;
        encode_timestamp(&mut packer, time, self.encoder.config().timestamp_mode)?;
        self.encoder.encode_with(&mut packer, record)?;
        Ok(buf)
    }
}

impl Default for EntryFramer {
    fn default() -> Self {
        Self::new(EncoderConfig::default())
    }
}

impl fmt::Debug for EntryFramer {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("EntryFramer")
            .field("encoder", &self.encoder)
            .finish_non_exhaustive()
    }
}
