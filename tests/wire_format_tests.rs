//! Byte-level checks of framed entries through the public API.

use std::collections::HashMap;

use chrono::{DateTime, TimeZone, Utc};
use fluentd_client::{
    DynamicValue, EncodeError, EncoderConfig, Entry, EntryFramer, PathSegment, RecordEncoder,
    TimestampMode, as_timestamp, decode_timestamp, record,
};
use rstest::{fixture, rstest};
use serde::{Deserialize, Serialize};

fn new_year() -> DateTime<Utc> {
    Utc.with_ymd_and_hms(2021, 1, 1, 0, 0, 0).unwrap()
}

#[fixture]
fn framer() -> EntryFramer {
    EntryFramer::with_clock(EncoderConfig::default(), Box::new(new_year))
}

#[rstest]
fn app_event_frame_is_byte_exact(framer: EntryFramer) {
    let buf = framer
        .frame("app.event", Some(new_year()), &record! { "id" => 7, "ok" => true })
        .expect("frame entry");

    let mut expected = vec![0x93, 0xa9];
    expected.extend_from_slice(b"app.event");
    expected.push(0xcb);
    expected.extend_from_slice(&1_609_459_200.0f64.to_be_bytes());
    expected.extend_from_slice(&[0x82, 0xa2, b'i', b'd', 0x07, 0xa2, b'o', b'k', 0xc3]);
    assert_eq!(buf, expected);

    let (time, consumed) = decode_timestamp(&buf[11..]).expect("decode entry time");
    assert_eq!(time, new_year());
    assert_eq!(consumed, 9);
}

#[rstest]
fn nested_mapping_layout_is_exact() {
    let value = DynamicValue::from(serde_json::json!({"a": {"b": [1, "x", true]}}));
    let buf = RecordEncoder::default().to_vec(&value).expect("encode nested");
    assert_eq!(
        buf,
        vec![0x81, 0xa1, b'a', 0x81, 0xa1, b'b', 0x93, 0x01, 0xa1, b'x', 0xc3]
    );
}

#[derive(Clone, Copy, Debug, Serialize)]
enum Severity {
    Notice,
}

#[derive(Serialize)]
struct Audit {
    actor: &'static str,
    severity: Severity,
    #[serde(serialize_with = "as_timestamp::serialize")]
    at: DateTime<Utc>,
    #[serde(serialize_with = "as_timestamp::option::serialize")]
    revoked_at: Option<DateTime<Utc>>,
    scopes: Vec<&'static str>,
}

#[derive(Debug, Deserialize, PartialEq)]
struct AuditWire {
    actor: String,
    severity: String,
    at: i64,
    revoked_at: Option<i64>,
    scopes: Vec<String>,
}

#[rstest]
fn structs_arrive_as_named_maps() {
    let framer = EntryFramer::with_clock(
        EncoderConfig::default().with_timestamp_mode(TimestampMode::Integer),
        Box::new(new_year),
    );
    let audit = Audit {
        actor: "ada",
        severity: Severity::Notice,
        at: Utc.timestamp_opt(1_600_000_000, 250).unwrap(),
        revoked_at: None,
        scopes: vec!["read", "write"],
    };
    let buf = framer
        .frame_serialize("security.audit", &audit)
        .expect("frame struct");

    let (tag, time, record): (String, i64, AuditWire) =
        rmp_serde::from_slice(&buf).expect("decode entry");
    assert_eq!(tag, "security.audit");
    assert_eq!(time, 1_609_459_200);
    assert_eq!(
        record,
        AuditWire {
            actor: "ada".into(),
            severity: "Notice".into(),
            at: 1_600_000_000,
            revoked_at: None,
            scopes: vec!["read".into(), "write".into()],
        }
    );
}

#[rstest]
fn entry_with_bin_and_float_payload(framer: EntryFramer) {
    let entry = Entry::new(
        "blob.stored",
        new_year(),
        record! { "digest" => DynamicValue::bytes(vec![0xde, 0xad]), "ratio" => 0.5f32 },
    );
    let buf = framer.frame_entry(&entry).expect("frame entry");
    let expected_record = [
        0x82, 0xa6, b'd', b'i', b'g', b'e', b's', b't', 0xc4, 0x02, 0xde, 0xad, 0xa5, b'r', b'a',
        b't', b'i', b'o', 0xca, 0x3f, 0x00, 0x00, 0x00,
    ];
    assert!(buf.ends_with(&expected_record));
    assert_eq!(buf.len(), 2 + "blob.stored".len() + 9 + expected_record.len());
}

#[rstest]
fn failures_carry_the_offending_path(framer: EntryFramer) {
    let mut codes = HashMap::new();
    codes.insert(404u16, "missing");
    let err = framer
        .frame_serialize("http.codes", &HashMap::from([("codes", codes)]))
        .expect_err("integer keys are rejected");
    assert!(matches!(err, EncodeError::NonTextKey { .. }));
    let path = err.path().expect("path");
    assert_eq!(path.to_string(), "$.codes");
    assert!(!path.is_root());
    assert_eq!(
        path.segments().collect::<Vec<_>>(),
        vec![&PathSegment::Key("codes".into())]
    );

    let err = framer
        .frame_serialize("t", &record! { "id" => 1, "id" => 2 })
        .expect_err("repeated field");
    assert!(err.path().expect("path").is_root());
}

#[rstest]
#[case::empty_record(record! {}, vec![0x80])]
#[case::nil_record(DynamicValue::Nil, vec![0xc0])]
#[case::scalar_record(DynamicValue::from(-1), vec![0xff])]
fn any_value_can_be_the_record(
    framer: EntryFramer,
    #[case] record: DynamicValue,
    #[case] tail: Vec<u8>,
) {
    let buf = framer.frame_now("t", &record).expect("frame entry");
    assert_eq!(buf[..3], [0x93, 0xa1, b't']);
    assert_eq!(buf[12..], tail[..]);
}

#[rstest]
fn equal_records_differ_only_in_the_time_span(framer: EntryFramer) {
    let record = record! { "id" => 7, "ok" => true };
    let first = framer
        .frame("app.event", Some(new_year()), &record)
        .expect("frame first");
    let later = Utc.with_ymd_and_hms(2024, 2, 29, 13, 45, 10).unwrap();
    let second = framer
        .frame("app.event", Some(later), &record.clone())
        .expect("frame second");
    assert_eq!(first.len(), second.len());
    assert_eq!(first[..11], second[..11]);
    assert_ne!(first[11..20], second[11..20]);
    assert_eq!(first[20..], second[20..]);
}
