//! Scalar values carried by defaults and validation rules.

use chrono::{DateTime, Duration, Utc};
use serde::ser::{SerializeMap, SerializeSeq};
use serde::{Serialize, Serializer};

/// Raw bytes. Each encoder picks its own rendering (numeric array for JSON,
/// base64 for YAML).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Bytes(pub Vec<u8>);

impl Serialize for Bytes {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        serializer.serialize_bytes(&self.0)
    }
}

impl From<Vec<u8>> for Bytes {
    fn from(bytes: Vec<u8>) -> Self {
        Bytes(bytes)
    }
}

/// A constraint or default value, keyed by scalar kind.
#[derive(Debug, Clone, PartialEq)]
pub enum ScalarValue {
    Float(f32),
    Double(f64),
    Int32(i32),
    Int64(i64),
    Uint32(u32),
    Uint64(u64),
    Bool(bool),
    String(String),
    Bytes(Bytes),
    /// Rendered as integer nanoseconds, clamped to the i64 range.
    Duration(Duration),
    /// Rendered as RFC 3339, UTC, fraction without trailing zeros.
    Timestamp(DateTime<Utc>),
}

impl Serialize for ScalarValue {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            ScalarValue::Float(v) => serializer.serialize_f32(*v),
            ScalarValue::Double(v) => serializer.serialize_f64(*v),
            ScalarValue::Int32(v) => serializer.serialize_i32(*v),
            ScalarValue::Int64(v) => serializer.serialize_i64(*v),
            ScalarValue::Uint32(v) => serializer.serialize_u32(*v),
            ScalarValue::Uint64(v) => serializer.serialize_u64(*v),
            ScalarValue::Bool(v) => serializer.serialize_bool(*v),
            ScalarValue::String(v) => serializer.serialize_str(v),
            ScalarValue::Bytes(v) => v.serialize(serializer),
            ScalarValue::Duration(d) => serializer.serialize_i64(clamped_nanos(d)),
            ScalarValue::Timestamp(t) => serializer.serialize_str(&rfc3339_nano(t)),
        }
    }
}

fn clamped_nanos(d: &Duration) -> i64 {
    d.num_nanoseconds()
        .unwrap_or(if *d < Duration::zero() { i64::MIN } else { i64::MAX })
}

/// RFC 3339 in UTC with the fraction trimmed of trailing zeros
/// (`2021-01-01T00:00:00.25Z`).
fn rfc3339_nano(t: &DateTime<Utc>) -> String {
    let mut text = t.format("%Y-%m-%dT%H:%M:%S").to_string();
    let nanos = t.timestamp_subsec_nanos();
    if nanos > 0 {
        let fraction = format!("{nanos:09}");
        text.push('.');
        text.push_str(fraction.trim_end_matches('0'));
    }
    text.push('Z');
    text
}

macro_rules! scalar_from {
    ($($t:ty => $variant:ident),* $(,)?) => {
        $(
            impl From<$t> for ScalarValue {
                fn from(v: $t) -> Self {
                    ScalarValue::$variant(v.into())
                }
            }
        )*
    };
}

scalar_from! {
    f32 => Float,
    f64 => Double,
    i32 => Int32,
    i64 => Int64,
    u32 => Uint32,
    u64 => Uint64,
    bool => Bool,
    String => String,
    Bytes => Bytes,
    Vec<u8> => Bytes,
    Duration => Duration,
    DateTime<Utc> => Timestamp,
}

/// The `default` entry of a field.
#[derive(Debug, Clone, PartialEq)]
pub enum FieldDefault {
    Null,
    EmptyList,
    EmptyMap,
    Text(String),
    Scalar(ScalarValue),
}

impl Serialize for FieldDefault {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self {
            FieldDefault::Null => serializer.serialize_unit(),
            FieldDefault::EmptyList => serializer.serialize_seq(Some(0))?.end(),
            FieldDefault::EmptyMap => serializer.serialize_map(Some(0))?.end(),
            FieldDefault::Text(text) => serializer.serialize_str(text),
            FieldDefault::Scalar(value) => value.serialize(serializer),
        }
    }
}
