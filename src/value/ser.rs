//! Serde bridge from any `Serialize` type to [`DynamicValue`].
//!
//! Derived `Serialize` implementations hand over their field names in
//! declaration order, so structs become [`DynamicValue::Record`] without any
//! run-time type inspection. Unit enum variants become their declared name.
//! Instants are recognised through [`EventTimestamp`] and [`as_timestamp`];
//! a bare `chrono` value would otherwise arrive as a string.

use std::borrow::Cow;
use std::collections::BTreeMap;

use chrono::{DateTime, TimeZone, Utc};
use serde::ser::{self, Impossible, Serialize, Serializer};

use crate::{
    encoder::DEFAULT_MAX_DEPTH,
    error::{EncodeError, PathSegment, ValuePath},
};

use super::DynamicValue;

pub(super) const TIMESTAMP_TOKEN: &str = "$fluentd_client::private::Timestamp";
pub(super) const RECORD_TOKEN: &str = "$fluentd_client::private::Record";
pub(super) const ENUMERATED_TOKEN: &str = "$fluentd_client::private::Enumerated";

/// Convert any serialisable value into a [`DynamicValue`].
///
/// # Errors
///
/// Returns [`EncodeError::NonTextKey`] when a map key does not serialise to
/// text, [`EncodeError::Unsupported`] for integers wider than 64 bits, and
/// [`EncodeError::Custom`] when the `Serialize` implementation itself fails.
/// Every error carries the path to the offending value. Values nested deeper
/// than [`DEFAULT_MAX_DEPTH`] fail with [`EncodeError::DepthExceeded`]; use
/// [`to_dynamic_with_depth`] for another limit.
///
/// ```rust
/// use fluentd_client::{DynamicValue, to_dynamic};
/// use serde::Serialize;
///
/// #[derive(Serialize)]
/// enum Kind { Click }
///
/// #[derive(Serialize)]
/// struct Event { id: u32, kind: Kind }
///
/// let value = to_dynamic(&Event { id: 1, kind: Kind::Click }).unwrap();
/// let DynamicValue::Record(fields) = value else { unreachable!() };
/// assert_eq!(fields[1].1, DynamicValue::enumerated("Click"));
/// ```
pub fn to_dynamic<T: Serialize + ?Sized>(value: &T) -> Result<DynamicValue, EncodeError> {
    to_dynamic_with_depth(value, DEFAULT_MAX_DEPTH)
}

/// [`to_dynamic`] with an explicit nesting limit; the root is level zero.
///
/// The limit is enforced while the value is built, so arbitrarily deep input
/// fails with [`EncodeError::DepthExceeded`] instead of exhausting the stack.
pub fn to_dynamic_with_depth<T: Serialize + ?Sized>(
    value: &T,
    max_depth: usize,
) -> Result<DynamicValue, EncodeError> {
    value.serialize(ValueSerializer::root(max_depth))
}

/// Marks an instant so it is written by the timestamp codec.
#[derive(Clone, Copy, Debug, PartialEq, Eq)]
pub struct EventTimestamp(pub DateTime<Utc>);

impl<Tz: TimeZone> From<DateTime<Tz>> for EventTimestamp {
    fn from(value: DateTime<Tz>) -> Self {
        Self(value.with_timezone(&Utc))
    }
}

impl Serialize for EventTimestamp {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        let parts = (self.0.timestamp(), self.0.timestamp_subsec_nanos());
        serializer.serialize_newtype_struct(TIMESTAMP_TOKEN, &parts)
    }
}

/// `#[serde(serialize_with = "as_timestamp::serialize")]` helper for `chrono`
/// fields.
pub mod as_timestamp {
    use chrono::{DateTime, TimeZone};
    use serde::{Serialize, Serializer};

    use super::EventTimestamp;

    /// Serialise `value` as an event timestamp.
    pub fn serialize<S, Tz>(value: &DateTime<Tz>, serializer: S) -> Result<S::Ok, S::Error>
    where
        S: Serializer,
        Tz: TimeZone,
    {
        EventTimestamp::from(value.clone()).serialize(serializer)
    }

    /// Variant for `Option<DateTime<_>>` fields; `None` becomes nil.
    pub mod option {
        use chrono::{DateTime, TimeZone};
        use serde::{Serialize, Serializer};

        use super::EventTimestamp;

        pub fn serialize<S, Tz>(
            value: &Option<DateTime<Tz>>,
            serializer: S,
        ) -> Result<S::Ok, S::Error>
        where
            S: Serializer,
            Tz: TimeZone,
        {
            value
                .as_ref()
                .map(|instant| EventTimestamp::from(instant.clone()))
                .serialize(serializer)
        }
    }
}

fn timestamp_from_parts(parts: DynamicValue) -> Result<DynamicValue, EncodeError> {
    let invalid = || EncodeError::Custom {
        path: ValuePath::root(),
        message: "malformed timestamp marker".into(),
    };
    let DynamicValue::Sequence(items) = parts else {
        return Err(invalid());
    };
    let (secs, nanos) = match items.as_slice() {
        [DynamicValue::Int(secs), DynamicValue::UInt(nanos)] => (*secs, *nanos),
        [DynamicValue::UInt(secs), DynamicValue::UInt(nanos)] => {
            (i64::try_from(*secs).map_err(|_| invalid())?, *nanos)
        }
        _ => return Err(invalid()),
    };
    let nanos = u32::try_from(nanos).map_err(|_| invalid())?;
    DateTime::<Utc>::from_timestamp(secs, nanos)
        .map(DynamicValue::Timestamp)
        .ok_or_else(invalid)
}

#[derive(Clone, Copy)]
struct ValueSerializer {
    depth: usize,
    max_depth: usize,
    /// Build the next map as a [`DynamicValue::Record`], keeping entry order.
    ordered_map: bool,
}

impl ValueSerializer {
    fn root(max_depth: usize) -> Self {
        Self {
            depth: 0,
            max_depth,
            ordered_map: false,
        }
    }

    /// Serializer for a value one level below this one.
    fn nested(self) -> Result<Self, EncodeError> {
        let depth = self.depth + 1;
        if depth > self.max_depth {
            return Err(EncodeError::DepthExceeded {
                path: ValuePath::root(),
                limit: self.max_depth,
            });
        }
        Ok(Self {
            depth,
            max_depth: self.max_depth,
            ordered_map: false,
        })
    }
}

impl Serializer for ValueSerializer {
    type Ok = DynamicValue;
    type Error = EncodeError;
    type SerializeSeq = SequenceBuilder;
    type SerializeTuple = SequenceBuilder;
    type SerializeTupleStruct = SequenceBuilder;
    type SerializeTupleVariant = VariantSequenceBuilder;
    type SerializeMap = MappingBuilder;
    type SerializeStruct = RecordBuilder;
    type SerializeStructVariant = VariantRecordBuilder;

    fn serialize_bool(self, v: bool) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Int(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Int(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Int(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Int(v))
    }

    fn serialize_i128(self, v: i128) -> Result<DynamicValue, EncodeError> {
        if let Ok(i) = i64::try_from(v) {
            Ok(DynamicValue::Int(i))
        } else if let Ok(u) = u64::try_from(v) {
            Ok(DynamicValue::UInt(u))
        } else {
            Err(EncodeError::Unsupported {
                path: ValuePath::root(),
                type_name: "i128",
            })
        }
    }

    fn serialize_u8(self, v: u8) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::UInt(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::UInt(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::UInt(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::UInt(v))
    }

    fn serialize_u128(self, v: u128) -> Result<DynamicValue, EncodeError> {
        u64::try_from(v)
            .map(DynamicValue::UInt)
            .map_err(|_| EncodeError::Unsupported {
                path: ValuePath::root(),
                type_name: "u128",
            })
    }

    fn serialize_f32(self, v: f32) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::F32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::F64(v))
    }

    fn serialize_char(self, v: char) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Str(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Str(v.to_owned()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Bin(v.to_vec()))
    }

    fn serialize_none(self) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Nil)
    }

    fn serialize_some<T: Serialize + ?Sized>(
        self,
        value: &T,
    ) -> Result<DynamicValue, EncodeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Nil)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Nil)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Enumerated(Cow::Borrowed(variant)))
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        name: &'static str,
        value: &T,
    ) -> Result<DynamicValue, EncodeError> {
        match name {
            // The (secs, nanos) parts sit below the instant, not below the caller's value.
            TIMESTAMP_TOKEN => timestamp_from_parts(value.serialize(ValueSerializer::root(1))?),
            RECORD_TOKEN => value.serialize(Self {
                ordered_map: true,
                ..self
            }),
            ENUMERATED_TOKEN => match value.serialize(self)? {
                DynamicValue::Str(name) => Ok(DynamicValue::Enumerated(Cow::Owned(name))),
                _ => Err(<EncodeError as ser::Error>::custom(
                    "malformed enumerated marker",
                )),
            },
            _ => value.serialize(self),
        }
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<DynamicValue, EncodeError> {
        let inner = self
            .nested()
            .and_then(|payload| value.serialize(payload))
            .map_err(|e| e.within(PathSegment::Key(variant.to_owned())))?;
        Ok(DynamicValue::Record(vec![(Cow::Borrowed(variant), inner)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SequenceBuilder, EncodeError> {
        Ok(SequenceBuilder::new(self, len.unwrap_or(0)))
    }

    fn serialize_tuple(self, len: usize) -> Result<SequenceBuilder, EncodeError> {
        Ok(SequenceBuilder::new(self, len))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SequenceBuilder, EncodeError> {
        Ok(SequenceBuilder::new(self, len))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantSequenceBuilder, EncodeError> {
        let payload = self
            .nested()
            .map_err(|e| e.within(PathSegment::Key(variant.to_owned())))?;
        Ok(VariantSequenceBuilder {
            variant,
            items: SequenceBuilder::new(payload, len),
        })
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<MappingBuilder, EncodeError> {
        Ok(MappingBuilder::new(self))
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<RecordBuilder, EncodeError> {
        Ok(RecordBuilder::new(self, len))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantRecordBuilder, EncodeError> {
        let payload = self
            .nested()
            .map_err(|e| e.within(PathSegment::Key(variant.to_owned())))?;
        Ok(VariantRecordBuilder {
            variant,
            fields: RecordBuilder::new(payload, len),
        })
    }
}

struct SequenceBuilder {
    parent: ValueSerializer,
    items: Vec<DynamicValue>,
}

impl SequenceBuilder {
    fn new(parent: ValueSerializer, len: usize) -> Self {
        Self {
            parent,
            items: Vec::with_capacity(len),
        }
    }

    fn push<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        let index = self.items.len();
        let item = self
            .parent
            .nested()
            .and_then(|element| value.serialize(element))
            .map_err(|e| e.within(PathSegment::Index(index)))?;
        self.items.push(item);
        Ok(())
    }
}

impl ser::SerializeSeq for SequenceBuilder {
    type Ok = DynamicValue;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Sequence(self.items))
    }
}

impl ser::SerializeTuple for SequenceBuilder {
    type Ok = DynamicValue;
    type Error = EncodeError;

    fn serialize_element<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Sequence(self.items))
    }
}

impl ser::SerializeTupleStruct for SequenceBuilder {
    type Ok = DynamicValue;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Sequence(self.items))
    }
}

struct VariantSequenceBuilder {
    variant: &'static str,
    items: SequenceBuilder,
}

impl ser::SerializeTupleVariant for VariantSequenceBuilder {
    type Ok = DynamicValue;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.items
            .push(value)
            .map_err(|e| e.within(PathSegment::Key(self.variant.to_owned())))
    }

    fn end(self) -> Result<DynamicValue, EncodeError> {
        let payload = DynamicValue::Sequence(self.items.items);
        Ok(DynamicValue::Record(vec![(
            Cow::Borrowed(self.variant),
            payload,
        )]))
    }
}

struct MappingBuilder {
    parent: ValueSerializer,
    entries: Vec<(String, DynamicValue)>,
    pending_key: Option<String>,
}

impl MappingBuilder {
    fn new(parent: ValueSerializer) -> Self {
        Self {
            parent,
            entries: Vec::new(),
            pending_key: None,
        }
    }
}

impl ser::SerializeMap for MappingBuilder {
    type Ok = DynamicValue;
    type Error = EncodeError;

    fn serialize_key<T: Serialize + ?Sized>(&mut self, key: &T) -> Result<(), EncodeError> {
        self.pending_key = Some(key.serialize(KeySerializer)?);
        Ok(())
    }

    fn serialize_value<T: Serialize + ?Sized>(&mut self, value: &T) -> Result<(), EncodeError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| <EncodeError as ser::Error>::custom("map value without a key"))?;
        let item = self
            .parent
            .nested()
            .and_then(|entry| value.serialize(entry))
            .map_err(|e| e.within(PathSegment::Key(key.clone())))?;
        self.entries.push((key, item));
        Ok(())
    }

    fn end(self) -> Result<DynamicValue, EncodeError> {
        if self.parent.ordered_map {
            let fields = self
                .entries
                .into_iter()
                .map(|(name, value)| (Cow::Owned(name), value))
                .collect();
            return Ok(DynamicValue::Record(fields));
        }
        Ok(DynamicValue::Mapping(
            self.entries.into_iter().collect::<BTreeMap<_, _>>(),
        ))
    }
}

struct RecordBuilder {
    parent: ValueSerializer,
    fields: Vec<(Cow<'static, str>, DynamicValue)>,
}

impl RecordBuilder {
    fn new(parent: ValueSerializer, len: usize) -> Self {
        Self {
            parent,
            fields: Vec::with_capacity(len),
        }
    }

    fn push<T: Serialize + ?Sized>(
        &mut self,
        name: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        let item = self
            .parent
            .nested()
            .and_then(|field| value.serialize(field))
            .map_err(|e| e.within(PathSegment::Key(name.to_owned())))?;
        self.fields.push((Cow::Borrowed(name), item));
        Ok(())
    }
}

impl ser::SerializeStruct for RecordBuilder {
    type Ok = DynamicValue;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.push(key, value)
    }

    fn end(self) -> Result<DynamicValue, EncodeError> {
        Ok(DynamicValue::Record(self.fields))
    }
}

struct VariantRecordBuilder {
    variant: &'static str,
    fields: RecordBuilder,
}

impl ser::SerializeStructVariant for VariantRecordBuilder {
    type Ok = DynamicValue;
    type Error = EncodeError;

    fn serialize_field<T: Serialize + ?Sized>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.fields
            .push(key, value)
            .map_err(|e| e.within(PathSegment::Key(self.variant.to_owned())))
    }

    fn end(self) -> Result<DynamicValue, EncodeError> {
        let payload = DynamicValue::Record(self.fields.fields);
        Ok(DynamicValue::Record(vec![(
            Cow::Borrowed(self.variant),
            payload,
        )]))
    }
}

/// Accepts only keys that serialise to text.
struct KeySerializer;

fn non_text_key() -> EncodeError {
    EncodeError::NonTextKey {
        path: ValuePath::root(),
    }
}

macro_rules! reject_key {
    ($($method:ident($($arg:ty),*)),+ $(,)?) => {
        $(
            fn $method(self, $(_: $arg),*) -> Result<String, EncodeError> {
                Err(non_text_key())
            }
        )+
    };
}

impl Serializer for KeySerializer {
    type Ok = String;
    type Error = EncodeError;
    type SerializeSeq = Impossible<String, EncodeError>;
    type SerializeTuple = Impossible<String, EncodeError>;
    type SerializeTupleStruct = Impossible<String, EncodeError>;
    type SerializeTupleVariant = Impossible<String, EncodeError>;
    type SerializeMap = Impossible<String, EncodeError>;
    type SerializeStruct = Impossible<String, EncodeError>;
    type SerializeStructVariant = Impossible<String, EncodeError>;

    reject_key!(
        serialize_bool(bool),
        serialize_i8(i8),
        serialize_i16(i16),
        serialize_i32(i32),
        serialize_i64(i64),
        serialize_u8(u8),
        serialize_u16(u16),
        serialize_u32(u32),
        serialize_u64(u64),
        serialize_f32(f32),
        serialize_f64(f64),
        serialize_bytes(&[u8]),
        serialize_none(),
        serialize_unit(),
        serialize_unit_struct(&'static str),
    );

    fn serialize_char(self, v: char) -> Result<String, EncodeError> {
        Ok(v.to_string())
    }

    fn serialize_str(self, v: &str) -> Result<String, EncodeError> {
        Ok(v.to_owned())
    }

    fn serialize_some<T: Serialize + ?Sized>(self, value: &T) -> Result<String, EncodeError> {
        value.serialize(self)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        variant: &'static str,
    ) -> Result<String, EncodeError> {
        Ok(variant.to_owned())
    }

    fn serialize_newtype_struct<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<String, EncodeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: Serialize + ?Sized>(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _value: &T,
    ) -> Result<String, EncodeError> {
        Err(non_text_key())
    }

    fn serialize_seq(self, _len: Option<usize>) -> Result<Self::SerializeSeq, EncodeError> {
        Err(non_text_key())
    }

    fn serialize_tuple(self, _len: usize) -> Result<Self::SerializeTuple, EncodeError> {
        Err(non_text_key())
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleStruct, EncodeError> {
        Err(non_text_key())
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeTupleVariant, EncodeError> {
        Err(non_text_key())
    }

    fn serialize_map(self, _len: Option<usize>) -> Result<Self::SerializeMap, EncodeError> {
        Err(non_text_key())
    }

    fn serialize_struct(
        self,
        _name: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStruct, EncodeError> {
        Err(non_text_key())
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _variant_index: u32,
        _variant: &'static str,
        _len: usize,
    ) -> Result<Self::SerializeStructVariant, EncodeError> {
        Err(non_text_key())
    }
}
