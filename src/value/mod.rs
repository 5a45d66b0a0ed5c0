//! The dynamic value model accepted by the record encoder.
//!
//! [`DynamicValue`] is a closed set of shapes: nil, scalars, timestamps,
//! enumerated names, sequences, text-keyed mappings and struct-like records.
//! Values reach it through the `From` conversions below, the [`record!`]
//! macro, `serde_json::Value`, or any `Serialize` type via [`to_dynamic`].

use std::{
    borrow::Cow,
    collections::{BTreeMap, HashMap},
    hash::BuildHasher,
    time::SystemTime,
};

use chrono::{DateTime, TimeZone, Utc};
use serde::ser::{Serialize, SerializeMap, SerializeSeq, Serializer};

mod ser;

pub use ser::{EventTimestamp, as_timestamp, to_dynamic, to_dynamic_with_depth};

use ser::{ENUMERATED_TOKEN, RECORD_TOKEN};

/// A value whose shape is only known at run time.
#[derive(Clone, Debug, PartialEq)]
pub enum DynamicValue {
    /// Absent value; written as nil.
    Nil,
    Bool(bool),
    /// Signed integer, written in the most compact form.
    Int(i64),
    /// Unsigned integer, written in the most compact form.
    UInt(u64),
    /// Single precision float, kept as `float 32` on the wire.
    F32(f32),
    /// Double precision float.
    F64(f64),
    /// UTF-8 text.
    Str(String),
    /// Raw bytes, written as a MessagePack `bin`.
    Bin(Vec<u8>),
    /// An instant, written by the timestamp codec rather than as a scalar.
    Timestamp(DateTime<Utc>),
    /// The declared name of an enumerated constant.
    Enumerated(Cow<'static, str>),
    /// Ordered items, written as an array.
    Sequence(Vec<DynamicValue>),
    /// Text-keyed mapping; entries are written in key order.
    Mapping(BTreeMap<String, DynamicValue>),
    /// Struct-like value; fields are written in declaration order.
    Record(Vec<(Cow<'static, str>, DynamicValue)>),
}

impl DynamicValue {
    /// Wrap raw bytes. `Vec<u8>` converts to a sequence of integers instead.
    pub fn bytes(bytes: impl Into<Vec<u8>>) -> Self {
        Self::Bin(bytes.into())
    }

    /// An enumerated constant identified by its declared name.
    pub fn enumerated(name: impl Into<Cow<'static, str>>) -> Self {
        Self::Enumerated(name.into())
    }

    /// Short name of the variant, used in diagnostics.
    pub fn kind(&self) -> &'static str {
        match self {
            Self::Nil => "nil",
            Self::Bool(_) => "bool",
            Self::Int(_) => "int",
            Self::UInt(_) => "uint",
            Self::F32(_) => "f32",
            Self::F64(_) => "f64",
            Self::Str(_) => "str",
            Self::Bin(_) => "bin",
            Self::Timestamp(_) => "timestamp",
            Self::Enumerated(_) => "enumerated",
            Self::Sequence(_) => "sequence",
            Self::Mapping(_) => "mapping",
            Self::Record(_) => "record",
        }
    }

    /// Whether this is [`DynamicValue::Nil`].
    pub fn is_nil(&self) -> bool {
        matches!(self, Self::Nil)
    }
}

/// Build a [`DynamicValue::Record`] from `name => value` pairs.
///
/// Names must be unique; the encoder rejects a record that repeats one with
/// [`EncodeError::DuplicateField`](crate::EncodeError::DuplicateField).
///
/// ```rust
/// use fluentd_client::{DynamicValue, record};
///
/// let value = record! { "id" => 7, "ok" => true };
/// assert_eq!(value.kind(), "record");
/// assert_eq!(record! {}, DynamicValue::Record(Vec::new()));
/// ```
#[macro_export]
macro_rules! record {
    () => {
        $crate::DynamicValue::Record(::std::vec::Vec::new())
    };
    ($($name:expr => $value:expr),+ $(,)?) => {
        $crate::DynamicValue::Record(::std::vec![
            $((::std::borrow::Cow::from($name), $crate::DynamicValue::from($value))),+
        ])
    };
}

macro_rules! from_scalar {
    ($variant:ident: $($ty:ty),+) => {
        $(
            impl From<$ty> for DynamicValue {
                fn from(value: $ty) -> Self {
                    Self::$variant(value.into())
                }
            }
        )+
    };
}

from_scalar!(Bool: bool);
from_scalar!(Int: i8, i16, i32, i64);
from_scalar!(UInt: u8, u16, u32, u64);
from_scalar!(F32: f32);
from_scalar!(F64: f64);
from_scalar!(Str: String, &str, char);

impl From<isize> for DynamicValue {
    fn from(value: isize) -> Self {
        Self::Int(value as i64)
    }
}

impl From<usize> for DynamicValue {
    fn from(value: usize) -> Self {
        Self::UInt(value as u64)
    }
}

impl From<Cow<'_, str>> for DynamicValue {
    fn from(value: Cow<'_, str>) -> Self {
        Self::Str(value.into_owned())
    }
}

impl<Tz: TimeZone> From<DateTime<Tz>> for DynamicValue {
    fn from(value: DateTime<Tz>) -> Self {
        Self::Timestamp(value.with_timezone(&Utc))
    }
}

impl From<SystemTime> for DynamicValue {
    fn from(value: SystemTime) -> Self {
        Self::Timestamp(DateTime::<Utc>::from(value))
    }
}

impl<T: Into<DynamicValue>> From<Option<T>> for DynamicValue {
    fn from(value: Option<T>) -> Self {
        value.map_or(Self::Nil, Into::into)
    }
}

impl<T: Into<DynamicValue>> From<Vec<T>> for DynamicValue {
    fn from(value: Vec<T>) -> Self {
        value.into_iter().collect()
    }
}

impl<T: Into<DynamicValue>> FromIterator<T> for DynamicValue {
    fn from_iter<I: IntoIterator<Item = T>>(iter: I) -> Self {
        Self::Sequence(iter.into_iter().map(Into::into).collect())
    }
}

impl<K: Into<String>, V: Into<DynamicValue>> From<BTreeMap<K, V>> for DynamicValue {
    fn from(value: BTreeMap<K, V>) -> Self {
        Self::Mapping(value.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl<K: Into<String>, V: Into<DynamicValue>, S: BuildHasher> From<HashMap<K, V, S>>
    for DynamicValue
{
    fn from(value: HashMap<K, V, S>) -> Self {
        Self::Mapping(value.into_iter().map(|(k, v)| (k.into(), v.into())).collect())
    }
}

impl From<serde_json::Value> for DynamicValue {
    fn from(value: serde_json::Value) -> Self {
        use serde_json::Value;
        match value {
            Value::Null => Self::Nil,
            Value::Bool(b) => Self::Bool(b),
            Value::Number(n) => {
                if let Some(i) = n.as_i64() {
                    Self::Int(i)
                } else if let Some(u) = n.as_u64() {
                    Self::UInt(u)
                } else if let Some(f) = n.as_f64() {
                    Self::F64(f)
                } else {
                    Self::Str(n.to_string())
                }
            }
            Value::String(s) => Self::Str(s),
            Value::Array(items) => items.into_iter().collect(),
            Value::Object(fields) => Self::Mapping(
                fields
                    .into_iter()
                    .map(|(k, v)| (k, Self::from(v)))
                    .collect(),
            ),
        }
    }
}

/// Other serializers see records as maps and enumerated names as strings.
/// [`to_dynamic`] recognises both and returns the value unchanged.
impl Serialize for DynamicValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            Self::Nil => serializer.serialize_unit(),
            Self::Bool(b) => serializer.serialize_bool(*b),
            Self::Int(i) => serializer.serialize_i64(*i),
            Self::UInt(u) => serializer.serialize_u64(*u),
            Self::F32(f) => serializer.serialize_f32(*f),
            Self::F64(f) => serializer.serialize_f64(*f),
            Self::Str(s) => serializer.serialize_str(s),
            Self::Bin(b) => serializer.serialize_bytes(b),
            Self::Timestamp(t) => EventTimestamp(*t).serialize(serializer),
            Self::Enumerated(name) => {
                serializer.serialize_newtype_struct(ENUMERATED_TOKEN, &**name)
            }
            Self::Sequence(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(item)?;
                }
                seq.end()
            }
            Self::Mapping(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, value)?;
                }
                map.end()
            }
            Self::Record(fields) => {
                serializer.serialize_newtype_struct(RECORD_TOKEN, &RecordFields(fields))
            }
        }
    }
}

/// Serialises record fields as a map in declaration order.
struct RecordFields<'a>(&'a [(Cow<'static, str>, DynamicValue)]);

impl Serialize for RecordFields<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let mut map = serializer.serialize_map(Some(self.0.len()))?;
        for (name, value) in self.0 {
            map.serialize_entry(name, value)?;
        }
        map.end()
    }
}
