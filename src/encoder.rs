//! Recursive MessagePack encoder for [`DynamicValue`] graphs.
//!
//! The encoder walks a value exactly once, writing headers before their
//! children. A failed encode leaves the output buffer as it was before the
//! call.

use std::{borrow::Cow, collections::HashSet};

use serde::Serialize;

use crate::{
    codec::{Packer, TimestampMode, encode_timestamp},
    error::{EncodeError, PathSegment, ValuePath},
    value::{DynamicValue, to_dynamic_with_depth},
};

/// Default nesting limit applied by [`EncoderConfig`].
pub const DEFAULT_MAX_DEPTH: usize = 128;

/// Settings fixed for the lifetime of a [`RecordEncoder`].
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EncoderConfig {
    /// How entry times and nested timestamps are written.
    pub timestamp_mode: TimestampMode,
    /// Deepest nesting level accepted; the record root is level zero.
    pub max_depth: usize,
}

impl Default for EncoderConfig {
    fn default() -> Self {
        Self {
            timestamp_mode: TimestampMode::default(),
            max_depth: DEFAULT_MAX_DEPTH,
        }
    }
}

impl EncoderConfig {
    /// Override how timestamps are written.
    pub fn with_timestamp_mode(mut self, mode: TimestampMode) -> Self {
        self.timestamp_mode = mode;
        self
    }

    /// Override the nesting limit.
    pub fn with_max_depth(mut self, max_depth: usize) -> Self {
        self.max_depth = max_depth;
        self
    }
}

/// Encodes dynamic values into MessagePack.
///
/// The encoder holds only its configuration, so a single instance can be
/// shared across threads.
#[derive(Clone, Debug, Default)]
pub struct RecordEncoder {
    config: EncoderConfig,
}

impl RecordEncoder {
    /// Encoder applying `config` to every call.
    pub fn new(config: EncoderConfig) -> Self {
        Self { config }
    }

    /// The settings this encoder was built with.
    pub fn config(&self) -> &EncoderConfig {
        &self.config
    }

    /// Append `value` to `buf`, returning the number of bytes written.
    ///
    /// # Errors
    ///
    /// Fails when a container or string is too long for MessagePack or the
    /// value nests deeper than [`EncoderConfig::max_depth`]. `buf` is left
    /// unchanged on failure.
    pub fn encode(&self, value: &DynamicValue, buf: &mut Vec<u8>) -> Result<usize, EncodeError> {
        self.encode_with(&mut Packer::new(buf), value)
    }

    /// Convert a serialisable value and encode it.
    ///
    /// The nesting limit is applied during conversion, before anything is
    /// written.
    pub fn encode_serialize<T: Serialize + ?Sized>(
        &self,
        value: &T,
        buf: &mut Vec<u8>,
    ) -> Result<usize, EncodeError> {
        let value = self.to_dynamic(value)?;
        self.encode(&value, buf)
    }

    /// Convert a serialisable value under this encoder's nesting limit.
    pub fn to_dynamic<T: Serialize + ?Sized>(
        &self,
        value: &T,
    ) -> Result<DynamicValue, EncodeError> {
        to_dynamic_with_depth(value, self.config.max_depth)
    }

    /// Encode `value` into a fresh buffer.
    pub fn to_vec(&self, value: &DynamicValue) -> Result<Vec<u8>, EncodeError> {
        let mut buf = Vec::with_capacity(128);
        self.encode(value, &mut buf)?;
        Ok(buf)
    }

    pub(crate) fn encode_with(
        &self,
        packer: &mut Packer<'_>,
        value: &DynamicValue,
    ) -> Result<usize, EncodeError> {
        let start = packer.position();
        match self.write_value(packer, value, 0) {
            Ok(written) => Ok(written),
            Err(err) => {
                packer.rollback(start);
                Err(err)
            }
        }
    }

    fn write_value(
        &self,
        packer: &mut Packer<'_>,
        value: &DynamicValue,
        depth: usize,
    ) -> Result<usize, EncodeError> {
        if depth > self.config.max_depth {
            return Err(EncodeError::DepthExceeded {
                path: ValuePath::root(),
                limit: self.config.max_depth,
            });
        }
        match value {
            DynamicValue::Nil => packer.write_nil(),
            DynamicValue::Bool(b) => packer.write_bool(*b),
            DynamicValue::Int(i) => packer.write_i64(*i),
            DynamicValue::UInt(u) => packer.write_u64(*u),
            DynamicValue::F32(f) => packer.write_f32(*f),
            DynamicValue::F64(f) => packer.write_f64(*f),
            DynamicValue::Str(s) => packer.write_text(s),
            DynamicValue::Bin(b) => packer.write_bin(b),
            DynamicValue::Timestamp(t) => encode_timestamp(packer, t, self.config.timestamp_mode),
            DynamicValue::Enumerated(name) => packer.write_text(name),
            DynamicValue::Sequence(items) => {
                let mut written = packer.write_array_header(items.len())?;
                for (index, item) in items.iter().enumerate() {
                    written += self
                        .write_value(packer, item, depth + 1)
                        .map_err(|e| e.within(PathSegment::Index(index)))?;
                }
                Ok(written)
            }
            DynamicValue::Mapping(entries) => self.write_map(
                packer,
                entries.len(),
                entries.iter().map(|(key, value)| (key.as_str(), value)),
                depth,
            ),
            DynamicValue::Record(fields) => {
                ensure_unique_names(fields)?;
                self.write_map(
                    packer,
                    fields.len(),
                    fields.iter().map(|(name, value)| (&**name, value)),
                    depth,
                )
            }
        }
    }

    fn write_map<'v>(
        &self,
        packer: &mut Packer<'_>,
        len: usize,
        entries: impl Iterator<Item = (&'v str, &'v DynamicValue)>,
        depth: usize,
    ) -> Result<usize, EncodeError> {
        let mut written = packer.write_map_header(len)?;
        for (key, value) in entries {
            let within = || PathSegment::Key(key.to_owned());
            written += packer.write_text(key).map_err(|e| e.within(within()))?;
            written += self
                .write_value(packer, value, depth + 1)
                .map_err(|e| e.within(within()))?;
        }
        Ok(written)
    }
}

fn ensure_unique_names(fields: &[(Cow<'static, str>, DynamicValue)]) -> Result<(), EncodeError> {
    let mut seen: HashSet<&str> = HashSet::with_capacity(fields.len());
    for (name, _) in fields {
        if !seen.insert(name) {
            return Err(EncodeError::DuplicateField {
                path: ValuePath::root(),
                name: name.to_string(),
            });
        }
    }
    Ok(())
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::record;
    use chrono::{TimeZone, Utc};
    use rstest::{fixture, rstest};
    use std::collections::BTreeMap;

    #[fixture]
    fn encoder() -> RecordEncoder {
        RecordEncoder::default()
    }

    fn mapping(entries: Vec<(&str, DynamicValue)>) -> DynamicValue {
        DynamicValue::Mapping(
            entries
                .into_iter()
                .map(|(k, v)| (k.to_owned(), v))
                .collect::<BTreeMap<_, _>>(),
        )
    }

    #[rstest]
    fn nested_mapping_layout_is_exact(encoder: RecordEncoder) {
        let value = mapping(vec![(
            "a",
            mapping(vec![(
                "b",
                DynamicValue::from(vec![
                    DynamicValue::Int(1),
                    DynamicValue::from("x"),
                    DynamicValue::Bool(true),
                ]),
            )]),
        )]);
        let buf = encoder.to_vec(&value).expect("encode nested");
        assert_eq!(
            buf,
            vec![0x81, 0xa1, b'a', 0x81, 0xa1, b'b', 0x93, 0x01, 0xa1, b'x', 0xc3]
        );
    }

    #[rstest]
    fn enumerated_matches_its_name(encoder: RecordEncoder) {
        let by_name = encoder
            .to_vec(&DynamicValue::enumerated("Dictionary"))
            .expect("encode enum");
        let as_text = encoder
            .to_vec(&DynamicValue::from("Dictionary"))
            .expect("encode text");
        assert_eq!(by_name, as_text);
    }

    #[rstest]
    fn record_and_mapping_share_wire_shape(encoder: RecordEncoder) {
        let as_record = encoder
            .to_vec(&record! { "id" => 7, "ok" => true })
            .expect("encode record");
        let as_mapping = encoder
            .to_vec(&mapping(vec![
                ("id", DynamicValue::Int(7)),
                ("ok", DynamicValue::Bool(true)),
            ]))
            .expect("encode mapping");
        assert_eq!(as_record, as_mapping);
        assert_eq!(as_record, vec![0x82, 0xa2, b'i', b'd', 0x07, 0xa2, b'o', b'k', 0xc3]);
    }

    #[rstest]
    fn empty_record_is_empty_map(encoder: RecordEncoder) {
        assert_eq!(encoder.to_vec(&record! {}).expect("encode"), vec![0x80]);
    }

    #[rstest]
    fn timestamp_arrays_use_the_timestamp_codec() {
        let encoder =
            RecordEncoder::new(EncoderConfig::default().with_timestamp_mode(TimestampMode::Integer));
        let first = Utc.timestamp_opt(10, 900_000_000).unwrap();
        let second = Utc.timestamp_opt(20, 0).unwrap();
        let buf = encoder
            .to_vec(&DynamicValue::from(vec![first, second]))
            .expect("encode instants");
        assert_eq!(buf, vec![0x92, 0x0a, 0x14]);
    }

    #[rstest]
    fn returns_bytes_written_and_appends(encoder: RecordEncoder) {
        let mut buf = vec![0xff];
        let written = encoder
            .encode(&DynamicValue::from("hi"), &mut buf)
            .expect("encode text");
        assert_eq!(written, 3);
        assert_eq!(buf, vec![0xff, 0xa2, b'h', b'i']);
    }

    #[rstest]
    fn depth_limit_rolls_back_and_reports_path() {
        let encoder = RecordEncoder::new(EncoderConfig::default().with_max_depth(2));
        let value = mapping(vec![(
            "outer",
            DynamicValue::from(vec![DynamicValue::from(vec![1])]),
        )]);
        let mut buf = vec![0x01];
        let err = encoder.encode(&value, &mut buf).expect_err("too deep");
        assert!(matches!(err, EncodeError::DepthExceeded { limit: 2, .. }));
        assert_eq!(err.path().expect("path").to_string(), "$.outer[0][0]");
        assert_eq!(buf, vec![0x01]);
    }

    #[rstest]
    fn encode_serialize_matches_manual_record(encoder: RecordEncoder) {
        #[derive(Serialize)]
        struct Event {
            id: i32,
            ok: bool,
        }
        let mut via_serde = Vec::new();
        encoder
            .encode_serialize(&Event { id: 7, ok: true }, &mut via_serde)
            .expect("encode struct");
        let manual = encoder
            .to_vec(&record! { "id" => 7, "ok" => true })
            .expect("encode record");
        assert_eq!(via_serde, manual);
    }

    #[derive(Serialize)]
    enum Chain {
        Link(u32, Box<Chain>),
        End,
    }

    fn chain(len: u32) -> Chain {
        (0..len).fold(Chain::End, |tail, n| Chain::Link(n, Box::new(tail)))
    }

    #[rstest]
    fn serialize_depth_is_bounded_during_conversion() {
        let encoder = RecordEncoder::new(EncoderConfig::default().with_max_depth(16));
        let mut buf = vec![0x01];
        let err = encoder
            .encode_serialize(&chain(200), &mut buf)
            .expect_err("chain exceeds the limit");
        assert!(matches!(err, EncodeError::DepthExceeded { limit: 16, .. }));
        assert!(err.path().expect("path").to_string().starts_with("$.Link[1]"));
        assert_eq!(buf, vec![0x01]);
    }

    #[rstest]
    fn very_deep_serialize_input_fails_without_exhausting_the_stack(encoder: RecordEncoder) {
        let deep = chain(10_000);
        let handle = std::thread::Builder::new()
            .stack_size(2 * 1024 * 1024)
            .spawn(move || {
                let result = encoder.encode_serialize(&deep, &mut Vec::new());
                std::mem::forget(deep);
                result
            })
            .expect("spawn encoder thread");
        let err = handle
            .join()
            .expect("encoder thread completes")
            .expect_err("chain exceeds the default limit");
        assert!(matches!(err, EncodeError::DepthExceeded { limit: DEFAULT_MAX_DEPTH, .. }));
    }

    #[rstest]
    fn serialize_limit_matches_encoder_limit() {
        // `Link(0, End)` is a record holding a sequence holding scalars: depth 2.
        let encoder = RecordEncoder::new(EncoderConfig::default().with_max_depth(2));
        assert!(encoder.encode_serialize(&chain(1), &mut Vec::new()).is_ok());
        let manual = encoder.to_dynamic(&chain(1)).expect("shallow chain converts");
        assert!(encoder.to_vec(&manual).is_ok());
        assert!(matches!(
            encoder.encode_serialize(&chain(2), &mut Vec::new()),
            Err(EncodeError::DepthExceeded { .. })
        ));
    }

    #[rstest]
    fn repeated_record_fields_are_rejected(encoder: RecordEncoder) {
        let value = mapping(vec![("user", record! { "k" => 1, "k" => 2 })]);
        let mut buf = Vec::new();
        let err = encoder.encode(&value, &mut buf).expect_err("duplicate field");
        assert!(matches!(err, EncodeError::DuplicateField { ref name, .. } if name == "k"));
        assert_eq!(err.path().expect("path").to_string(), "$.user");
        assert!(buf.is_empty());
    }

    #[rstest]
    fn timestamps_and_records_nest_inside_mappings(encoder: RecordEncoder) {
        let at = Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap();
        let value = mapping(vec![
            ("at", DynamicValue::from(at)),
            ("user", record! { "id" => 7 }),
        ]);
        let mut expected = vec![0x82, 0xa2, b'a', b't', 0xcb];
        expected.extend_from_slice(&1_609_459_200.0f64.to_be_bytes());
        expected.extend_from_slice(&[0xa4, b'u', b's', b'e', b'r', 0x81, 0xa2, b'i', b'd', 0x07]);
        assert_eq!(encoder.to_vec(&value).expect("encode nested"), expected);
    }

    #[rstest]
    fn encoding_is_deterministic(encoder: RecordEncoder) {
        let value = mapping(vec![
            ("z", DynamicValue::F64(1.5)),
            ("a", DynamicValue::bytes(vec![1, 2, 3])),
            ("m", DynamicValue::from(vec![None, Some(-3)])),
        ]);
        assert_eq!(
            encoder.to_vec(&value).expect("first"),
            encoder.to_vec(&value).expect("second")
        );
    }
}
