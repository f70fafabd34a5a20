//! Value conversion across the record/document boundary.
//!
//! [`Value`] is the host-side value model. [`wrap`] turns it into the store's
//! native BSON representation and [`unwrap`] turns stored BSON back into a
//! [`Value`]. Every value written through a record is wrapped first and every
//! value read back is unwrapped, so `unwrap(wrap(v)) == v` for all values.
//!
//! BSON has no counterpart for nanosecond timestamps, so sub-millisecond
//! datetimes are stored as a tagged embedded document. Store kinds with no host
//! counterpart (object ids, regular expressions, timestamps, ...) unwrap to
//! [`Value::Other`] and wrap back unchanged.

use std::collections::BTreeMap;

use bson::{
    Binary, Bson, DateTime as BsonDateTime, Decimal128, Document, Uuid,
    de::deserialize_from_bson, doc, ser::serialize_to_bson, spec::BinarySubtype,
};
use chrono::{DateTime, Duration, Utc};
use serde::{Serialize, de::DeserializeOwned};

use crate::error::{DocumentStoreError, DocumentStoreResult};

const DATETIME_TAG: &str = "__datetime";
const NANOS_TAG: &str = "__nanos";
const RESERVED_KEYS: [&str; 2] = [DATETIME_TAG, NANOS_TAG];

/// A value as seen by the host side of a record.
#[derive(Debug, Clone, PartialEq)]
pub enum Value {
    Null,
    Bool(bool),
    Int(i64),
    Float(f64),
    /// IEEE 754-2008 128-bit decimal.
    Decimal(Decimal128),
    String(String),
    /// A symbolic name, stored as a BSON symbol rather than a plain string.
    Symbol(String),
    /// A UTC timestamp with nanosecond precision.
    DateTime(DateTime<Utc>),
    Uuid(Uuid),
    Bytes(Vec<u8>),
    Array(Vec<Value>),
    Map(BTreeMap<String, Value>),
    /// A stored value with no host counterpart, carried through untouched.
    Other(Bson),
}

impl Value {
    /// Creates a symbolic value.
    pub fn symbol(name: impl Into<String>) -> Self {
        Value::Symbol(name.into())
    }

    /// Converts any serializable value into a [`Value`].
    ///
    /// # Errors
    ///
    /// Returns [`DocumentStoreError::UnsupportedValueKind`] if the value cannot be
    /// represented in BSON (for example a `u64` above `i64::MAX`).
    pub fn from_serializable<T: Serialize + ?Sized>(value: &T) -> DocumentStoreResult<Self> {
        serialize_to_bson(value)
            .map(unwrap)
            .map_err(|err| DocumentStoreError::UnsupportedValueKind(err.to_string()))
    }

    /// Deserializes this value into a concrete type.
    ///
    /// # Errors
    ///
    /// Returns an error if the value cannot be wrapped or does not match the shape of `T`.
    pub fn deserialize_into<T: DeserializeOwned>(self) -> DocumentStoreResult<T> {
        Ok(deserialize_from_bson(wrap(&self)?)?)
    }

    pub fn is_null(&self) -> bool {
        matches!(self, Value::Null)
    }

    pub fn as_bool(&self) -> Option<bool> {
        match self {
            Value::Bool(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_i64(&self) -> Option<i64> {
        match self {
            Value::Int(value) => Some(*value),
            _ => None,
        }
    }

    pub fn as_f64(&self) -> Option<f64> {
        match self {
            Value::Float(value) => Some(*value),
            Value::Int(value) => Some(*value as f64),
            _ => None,
        }
    }

    /// Returns the text of a string or symbol value.
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Value::String(value) | Value::Symbol(value) => Some(value),
            _ => None,
        }
    }

    pub fn as_array(&self) -> Option<&[Value]> {
        match self {
            Value::Array(items) => Some(items),
            _ => None,
        }
    }

    pub fn as_map(&self) -> Option<&BTreeMap<String, Value>> {
        match self {
            Value::Map(entries) => Some(entries),
            _ => None,
        }
    }
}

/// Converts a host value into its stored BSON form.
///
/// # Errors
///
/// Returns [`DocumentStoreError::UnsupportedValueKind`] for map keys that contain a
/// NUL byte or collide with the codec's reserved wrapper keys.
pub fn wrap(value: &Value) -> DocumentStoreResult<Bson> {
    Ok(match value {
        Value::Null => Bson::Null,
        Value::Bool(value) => Bson::Boolean(*value),
        Value::Int(value) => Bson::Int64(*value),
        Value::Float(value) => Bson::Double(*value),
        Value::Decimal(value) => Bson::Decimal128(*value),
        Value::String(value) => Bson::String(value.clone()),
        Value::Symbol(value) => Bson::Symbol(value.clone()),
        Value::DateTime(value) => wrap_datetime(value),
        Value::Uuid(value) => Bson::from(*value),
        Value::Bytes(bytes) => Bson::Binary(Binary {
            subtype: BinarySubtype::Generic,
            bytes: bytes.clone(),
        }),
        Value::Array(items) => Bson::Array(
            items
                .iter()
                .map(wrap)
                .collect::<DocumentStoreResult<Vec<_>>>()?,
        ),
        Value::Map(entries) => Bson::Document(wrap_map(entries)?),
        Value::Other(value) => value.clone(),
    })
}

/// Converts a stored BSON value back into a host value. Never fails.
pub fn unwrap(value: Bson) -> Value {
    match value {
        Bson::Null => Value::Null,
        Bson::Boolean(value) => Value::Bool(value),
        Bson::Int32(value) => Value::Int(i64::from(value)),
        Bson::Int64(value) => Value::Int(value),
        Bson::Double(value) => Value::Float(value),
        Bson::Decimal128(value) => Value::Decimal(value),
        Bson::String(value) => Value::String(value),
        Bson::Symbol(value) => Value::Symbol(value),
        Bson::DateTime(value) => Value::DateTime(value.to_chrono()),
        Bson::Binary(binary) => unwrap_binary(binary),
        Bson::Array(items) => Value::Array(items.into_iter().map(unwrap).collect()),
        Bson::Document(document) => unwrap_document(document),
        other => Value::Other(other),
    }
}

fn wrap_datetime(value: &DateTime<Utc>) -> Bson {
    let stored = BsonDateTime::from_chrono(*value);
    let nanos = value.timestamp_subsec_nanos() % 1_000_000;

    if nanos == 0 {
        Bson::DateTime(stored)
    } else {
        Bson::Document(doc! {
            DATETIME_TAG: stored,
            NANOS_TAG: nanos as i32,
        })
    }
}

fn wrap_map(entries: &BTreeMap<String, Value>) -> DocumentStoreResult<Document> {
    entries
        .iter()
        .map(|(key, value)| {
            if key.contains('\0') {
                return Err(DocumentStoreError::UnsupportedValueKind(format!(
                    "map key {key:?} contains a NUL byte"
                )));
            }
            if RESERVED_KEYS.contains(&key.as_str()) {
                return Err(DocumentStoreError::UnsupportedValueKind(format!(
                    "map key {key:?} is reserved"
                )));
            }

            Ok((key.clone(), wrap(value)?))
        })
        .collect()
}

fn unwrap_binary(binary: Binary) -> Value {
    match binary.subtype {
        BinarySubtype::Uuid => match <[u8; 16]>::try_from(binary.bytes.as_slice()) {
            Ok(bytes) => Value::Uuid(Uuid::from_bytes(bytes)),
            Err(_) => Value::Other(Bson::Binary(binary)),
        },
        BinarySubtype::Generic => Value::Bytes(binary.bytes),
        _ => Value::Other(Bson::Binary(binary)),
    }
}

fn unwrap_document(document: Document) -> Value {
    if let Some(datetime) = unwrap_tagged_datetime(&document) {
        return Value::DateTime(datetime);
    }

    Value::Map(
        document
            .into_iter()
            .map(|(key, value)| (key, unwrap(value)))
            .collect(),
    )
}

fn unwrap_tagged_datetime(document: &Document) -> Option<DateTime<Utc>> {
    if document.len() != RESERVED_KEYS.len() {
        return None;
    }

    match (document.get(DATETIME_TAG), document.get(NANOS_TAG)) {
        (Some(Bson::DateTime(stored)), Some(Bson::Int32(nanos)))
            if (0..1_000_000).contains(nanos) =>
        {
            stored
                .to_chrono()
                .checked_add_signed(Duration::nanoseconds(i64::from(*nanos)))
        }
        _ => None,
    }
}

impl From<bool> for Value {
    fn from(value: bool) -> Self {
        Value::Bool(value)
    }
}

macro_rules! impl_from_int {
    ($($ty:ty),*) => {
        $(
            impl From<$ty> for Value {
                fn from(value: $ty) -> Self {
                    Value::Int(i64::from(value))
                }
            }
        )*
    };
}

impl_from_int!(i8, i16, i32, i64, u8, u16, u32);

impl From<f32> for Value {
    fn from(value: f32) -> Self {
        Value::Float(f64::from(value))
    }
}

impl From<f64> for Value {
    fn from(value: f64) -> Self {
        Value::Float(value)
    }
}

impl From<&str> for Value {
    fn from(value: &str) -> Self {
        Value::String(value.to_string())
    }
}

impl From<String> for Value {
    fn from(value: String) -> Self {
        Value::String(value)
    }
}

impl From<Decimal128> for Value {
    fn from(value: Decimal128) -> Self {
        Value::Decimal(value)
    }
}

impl From<DateTime<Utc>> for Value {
    fn from(value: DateTime<Utc>) -> Self {
        Value::DateTime(value)
    }
}

impl From<Uuid> for Value {
    fn from(value: Uuid) -> Self {
        Value::Uuid(value)
    }
}

impl From<uuid::Uuid> for Value {
    fn from(value: uuid::Uuid) -> Self {
        Value::Uuid(Uuid::from(value))
    }
}

impl<T: Into<Value>> From<Vec<T>> for Value {
    fn from(items: Vec<T>) -> Self {
        Value::Array(items.into_iter().map(Into::into).collect())
    }
}

impl<T: Into<Value>> From<Option<T>> for Value {
    fn from(value: Option<T>) -> Self {
        value.map(Into::into).unwrap_or(Value::Null)
    }
}

impl<V: Into<Value>> From<BTreeMap<String, V>> for Value {
    fn from(entries: BTreeMap<String, V>) -> Self {
        Value::Map(
            entries
                .into_iter()
                .map(|(key, value)| (key, value.into()))
                .collect(),
        )
    }
}

impl From<serde_json::Value> for Value {
    fn from(value: serde_json::Value) -> Self {
        match value {
            serde_json::Value::Null => Value::Null,
            serde_json::Value::Bool(value) => Value::Bool(value),
            serde_json::Value::Number(number) => match number.as_i64() {
                Some(value) => Value::Int(value),
                None => Value::Float(number.as_f64().unwrap_or(f64::NAN)),
            },
            serde_json::Value::String(value) => Value::String(value),
            serde_json::Value::Array(items) => {
                Value::Array(items.into_iter().map(Value::from).collect())
            }
            serde_json::Value::Object(entries) => Value::Map(
                entries
                    .into_iter()
                    .map(|(key, value)| (key, Value::from(value)))
                    .collect(),
            ),
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use bson::oid::ObjectId;
    use proptest::prelude::*;
    use serde::Deserialize;

    fn arb_value() -> impl Strategy<Value = Value> {
        let leaf = prop_oneof![
            Just(Value::Null),
            any::<bool>().prop_map(Value::Bool),
            any::<i64>().prop_map(Value::Int),
            (-1.0e12f64..1.0e12).prop_map(Value::Float),
            any::<[u8; 16]>().prop_map(|bytes| Value::Decimal(Decimal128::from_bytes(bytes))),
            "[a-zA-Z0-9 .$]{0,12}".prop_map(Value::String),
            "[a-z_]{1,8}".prop_map(Value::Symbol),
            (-4_000_000_000i64..4_000_000_000, 0u32..1_000_000_000).prop_map(|(secs, nanos)| {
                Value::DateTime(DateTime::from_timestamp(secs, nanos).unwrap())
            }),
            any::<[u8; 16]>().prop_map(|bytes| Value::Uuid(Uuid::from_bytes(bytes))),
            prop::collection::vec(any::<u8>(), 0..16).prop_map(Value::Bytes),
        ];

        leaf.prop_recursive(3, 24, 4, |inner| {
            prop_oneof![
                prop::collection::vec(inner.clone(), 0..4).prop_map(Value::Array),
                prop::collection::btree_map("[a-z]{1,6}", inner, 0..4).prop_map(Value::Map),
            ]
        })
    }

    proptest! {
        #[test]
        fn test_wrap_then_unwrap_is_lossless(value in arb_value()) {
            let stored = wrap(&value).unwrap();
            prop_assert_eq!(unwrap(stored), value);
        }
    }

    #[test]
    fn test_millisecond_datetime_is_stored_natively() {
        let value = DateTime::from_timestamp(1_700_000_000, 123_000_000).unwrap();

        assert!(matches!(wrap(&Value::DateTime(value)).unwrap(), Bson::DateTime(_)));
    }

    #[test]
    fn test_sub_millisecond_datetime_is_tagged() {
        let value = DateTime::from_timestamp(1_700_000_000, 123_456_789).unwrap();
        let stored = wrap(&Value::DateTime(value)).unwrap();

        let document = stored.as_document().unwrap();
        assert_eq!(document.get(NANOS_TAG), Some(&Bson::Int32(456_789)));
        assert_eq!(unwrap(stored), Value::DateTime(value));
    }

    #[test]
    fn test_tagged_datetime_out_of_range_reads_as_map() {
        let stored = Bson::Document(doc! {
            DATETIME_TAG: BsonDateTime::MAX,
            NANOS_TAG: 1,
        });

        match unwrap(stored) {
            Value::Map(map) => assert_eq!(map.get(NANOS_TAG), Some(&Value::Int(1))),
            other => panic!("expected a map, got {other:?}"),
        }
    }

    #[test]
    fn test_map_with_nul_key_is_unsupported() {
        let value = Value::Map(BTreeMap::from([("bad\0key".to_string(), Value::Int(1))]));

        assert!(matches!(
            wrap(&value),
            Err(DocumentStoreError::UnsupportedValueKind(_))
        ));
    }

    #[test]
    fn test_map_with_reserved_key_is_unsupported() {
        let value = Value::Map(BTreeMap::from([(DATETIME_TAG.to_string(), Value::Int(1))]));

        assert!(matches!(
            wrap(&value),
            Err(DocumentStoreError::UnsupportedValueKind(_))
        ));
    }

    #[test]
    fn test_unsigned_overflow_is_unsupported() {
        assert!(matches!(
            Value::from_serializable(&u64::MAX),
            Err(DocumentStoreError::UnsupportedValueKind(_))
        ));
    }

    #[test]
    fn test_int32_unwraps_to_int() {
        assert_eq!(unwrap(Bson::Int32(7)), Value::Int(7));
    }

    #[test]
    fn test_foreign_kinds_pass_through() {
        let oid = Bson::ObjectId(ObjectId::new());

        assert_eq!(wrap(&unwrap(oid.clone())).unwrap(), oid);
    }

    #[test]
    fn test_serde_bridge() {
        #[derive(Debug, PartialEq, Serialize, Deserialize)]
        struct Dimensions {
            width: u32,
            height: u32,
            label: Option<String>,
        }

        let original = Dimensions { width: 3, height: 4, label: None };
        let value = Value::from_serializable(&original).unwrap();

        assert_eq!(value.as_map().unwrap().get("width"), Some(&Value::Int(3)));
        assert_eq!(value.deserialize_into::<Dimensions>().unwrap(), original);
    }

    #[test]
    fn test_from_json() {
        let value = Value::from(serde_json::json!({ "a": [1, 2.5, "x"], "b": null }));

        let map = value.as_map().unwrap();
        assert_eq!(
            map.get("a"),
            Some(&Value::Array(vec![Value::Int(1), Value::Float(2.5), Value::from("x")]))
        );
        assert_eq!(map.get("b"), Some(&Value::Null));
    }
}
