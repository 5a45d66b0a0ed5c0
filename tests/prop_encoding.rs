//! Property-based tests for timestamps and container shapes.
//!
//! Generated instants, mappings and sequences are encoded and read back with
//! `rmp` and `rmp-serde` to check the wire layout the collector relies on.

use std::collections::BTreeMap;

use chrono::{DateTime, TimeDelta, Utc};
use fluentd_client::{
    DynamicValue, RecordEncoder, TimestampMode, codec::Packer, decode_timestamp, encode_timestamp,
};
use proptest::prelude::*;

fn instant() -> impl Strategy<Value = DateTime<Utc>> {
    (-2_000_000_000i64..4_000_000_000, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
        DateTime::<Utc>::from_timestamp(secs, nanos).expect("instant in range")
    })
}

fn encode_instant(instant: &DateTime<Utc>, mode: TimestampMode) -> Vec<u8> {
    let mut buf = Vec::new();
    encode_timestamp(&mut Packer::new(&mut buf), instant, mode).expect("encode instant");
    buf
}

proptest! {
    #[test]
    fn float_timestamps_round_trip_within_a_microsecond(instant in instant()) {
        let buf = encode_instant(&instant, TimestampMode::Float);
        let (decoded, consumed) = decode_timestamp(&buf).expect("decode instant");
        prop_assert_eq!(consumed, buf.len());
        prop_assert!((decoded - instant).abs() <= TimeDelta::microseconds(1));
    }

    #[test]
    fn integer_timestamps_keep_whole_seconds(instant in instant()) {
        let buf = encode_instant(&instant, TimestampMode::Integer);
        let (decoded, consumed) = decode_timestamp(&buf).expect("decode instant");
        prop_assert_eq!(consumed, buf.len());
        prop_assert_eq!(decoded.timestamp(), instant.timestamp());
        prop_assert_eq!(decoded.timestamp_subsec_nanos(), 0);
    }

    #[test]
    fn mapping_header_counts_entries(
        entries in proptest::collection::btree_map("[a-z]{1,12}", any::<i64>(), 0..40)
    ) {
        let value = DynamicValue::from(entries.clone());
        let buf = RecordEncoder::default().to_vec(&value).expect("encode mapping");
        let len = rmp::decode::read_map_len(&mut buf.as_slice()).expect("map header");
        prop_assert_eq!(len as usize, entries.len());
        let decoded: BTreeMap<String, i64> = rmp_serde::from_slice(&buf).expect("decode mapping");
        prop_assert_eq!(decoded, entries);
    }

    #[test]
    fn sequence_header_counts_items_in_order(items in proptest::collection::vec(any::<i64>(), 0..40)) {
        let value = DynamicValue::from(items.clone());
        let buf = RecordEncoder::default().to_vec(&value).expect("encode sequence");
        let len = rmp::decode::read_array_len(&mut buf.as_slice()).expect("array header");
        prop_assert_eq!(len as usize, items.len());
        let decoded: Vec<i64> = rmp_serde::from_slice(&buf).expect("decode sequence");
        prop_assert_eq!(decoded, items);
    }

    #[test]
    fn text_values_keep_their_bytes(text in "\\PC{0,64}") {
        let buf = RecordEncoder::default()
            .to_vec(&DynamicValue::from(text.as_str()))
            .expect("encode text");
        let decoded: String = rmp_serde::from_slice(&buf).expect("decode text");
        prop_assert_eq!(decoded, text);
    }

    #[test]
    fn equal_values_encode_identically(
        entries in proptest::collection::btree_map("[a-z]{1,8}", "[ -~]{0,16}", 0..16)
    ) {
        let first = DynamicValue::from(entries.clone());
        let second = DynamicValue::from(entries);
        let encoder = RecordEncoder::default();
        prop_assert_eq!(
            encoder.to_vec(&first).expect("encode first"),
            encoder.to_vec(&second).expect("encode second")
        );
    }
}
