//! `validate.rules` field option (protoc-gen-validate convention).
//!
//! The JSON rendering follows protojson: keys are lowerCamelCase, 64-bit
//! integers may arrive as strings, bytes are base64, durations are `"1.5s"`
//! and timestamps are RFC 3339.

use base64::{
    engine::general_purpose::{STANDARD as BASE64, URL_SAFE as BASE64_URL},
    Engine,
};
use chrono::DateTime;
use serde::de::{self, Deserializer};
use serde::Deserialize;
use serde_json::{Number, Value};

/// Decoded `(validate.rules)` option.
///
/// `message` lives outside the type oneof, so it can accompany any `kind`.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawFieldConstraints")]
pub struct FieldConstraints {
    pub message: Option<MessageRules>,
    pub kind: Option<TypeRules>,
}

/// The `type` oneof of `validate.FieldRules`.
#[derive(Debug, Clone, PartialEq)]
pub enum TypeRules {
    Float(NumericRules<f32>),
    Double(NumericRules<f64>),
    Int32(NumericRules<i32>),
    Int64(NumericRules<i64>),
    Uint32(NumericRules<u32>),
    Uint64(NumericRules<u64>),
    Sint32(NumericRules<i32>),
    Sint64(NumericRules<i64>),
    Fixed32(NumericRules<u32>),
    Fixed64(NumericRules<u64>),
    Sfixed32(NumericRules<i32>),
    Sfixed64(NumericRules<i64>),
    Bool(BoolRules),
    String(StringRules),
    Bytes(BytesRules),
    Enum(EnumRules),
    Repeated(Box<RepeatedRules>),
    Map(Box<MapRules>),
    Any(AnyRules),
    Duration(DurationRules),
    Timestamp(TimestampRules),
}

#[derive(Debug, Deserialize)]
struct RawFieldConstraints {
    message: Option<MessageRules>,
    float: Option<NumericRules<f32>>,
    double: Option<NumericRules<f64>>,
    int32: Option<NumericRules<i32>>,
    int64: Option<NumericRules<i64>>,
    uint32: Option<NumericRules<u32>>,
    uint64: Option<NumericRules<u64>>,
    sint32: Option<NumericRules<i32>>,
    sint64: Option<NumericRules<i64>>,
    fixed32: Option<NumericRules<u32>>,
    fixed64: Option<NumericRules<u64>>,
    sfixed32: Option<NumericRules<i32>>,
    sfixed64: Option<NumericRules<i64>>,
    bool: Option<BoolRules>,
    string: Option<StringRules>,
    bytes: Option<BytesRules>,
    #[serde(rename = "enum")]
    enum_: Option<EnumRules>,
    repeated: Option<Box<RepeatedRules>>,
    map: Option<Box<MapRules>>,
    any: Option<AnyRules>,
    duration: Option<DurationRules>,
    timestamp: Option<TimestampRules>,
}

impl From<RawFieldConstraints> for FieldConstraints {
    fn from(raw: RawFieldConstraints) -> Self {
        // A well-formed rendering sets at most one member of the oneof; if a
        // hand-written one sets several, the first in declaration order wins.
        let kind = raw
            .float
            .map(TypeRules::Float)
            .or(raw.double.map(TypeRules::Double))
            .or(raw.int32.map(TypeRules::Int32))
            .or(raw.int64.map(TypeRules::Int64))
            .or(raw.uint32.map(TypeRules::Uint32))
            .or(raw.uint64.map(TypeRules::Uint64))
            .or(raw.sint32.map(TypeRules::Sint32))
            .or(raw.sint64.map(TypeRules::Sint64))
            .or(raw.fixed32.map(TypeRules::Fixed32))
            .or(raw.fixed64.map(TypeRules::Fixed64))
            .or(raw.sfixed32.map(TypeRules::Sfixed32))
            .or(raw.sfixed64.map(TypeRules::Sfixed64))
            .or(raw.bool.map(TypeRules::Bool))
            .or(raw.string.map(TypeRules::String))
            .or(raw.bytes.map(TypeRules::Bytes))
            .or(raw.enum_.map(TypeRules::Enum))
            .or(raw.repeated.map(TypeRules::Repeated))
            .or(raw.map.map(TypeRules::Map))
            .or(raw.any.map(TypeRules::Any))
            .or(raw.duration.map(TypeRules::Duration))
            .or(raw.timestamp.map(TypeRules::Timestamp));

        FieldConstraints {
            message: raw.message,
            kind,
        }
    }
}

/// Comparison rules shared by every numeric family.
#[derive(Debug, Clone, PartialEq, Deserialize)]
#[serde(rename_all = "camelCase", bound(deserialize = "T: ProtoNumber"))]
pub struct NumericRules<T> {
    #[serde(default, rename = "const", deserialize_with = "lenient::option")]
    pub const_: Option<T>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub lt: Option<T>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub lte: Option<T>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub gt: Option<T>,
    #[serde(default, deserialize_with = "lenient::option")]
    pub gte: Option<T>,
    #[serde(default, rename = "in", deserialize_with = "lenient::list")]
    pub in_: Vec<T>,
    #[serde(default, deserialize_with = "lenient::list")]
    pub not_in: Vec<T>,
    #[serde(default)]
    pub ignore_empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct BoolRules {
    #[serde(rename = "const")]
    pub const_: Option<bool>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct StringRules {
    #[serde(rename = "const")]
    pub const_: Option<String>,
    #[serde(deserialize_with = "lenient::option")]
    pub len: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub min_len: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub max_len: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub len_bytes: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub min_bytes: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub max_bytes: Option<u64>,
    pub pattern: Option<String>,
    pub prefix: Option<String>,
    pub suffix: Option<String>,
    pub contains: Option<String>,
    pub not_contains: Option<String>,
    #[serde(rename = "in")]
    pub in_: Vec<String>,
    pub not_in: Vec<String>,
    pub email: bool,
    pub hostname: bool,
    pub ip: bool,
    pub ipv4: bool,
    pub ipv6: bool,
    pub uri: bool,
    pub uri_ref: bool,
    pub address: bool,
    pub uuid: bool,
    pub ignore_empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct BytesRules {
    #[serde(rename = "const", deserialize_with = "lenient::bytes_option")]
    pub const_: Option<Vec<u8>>,
    #[serde(deserialize_with = "lenient::option")]
    pub len: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub min_len: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub max_len: Option<u64>,
    pub pattern: Option<String>,
    #[serde(deserialize_with = "lenient::bytes_option")]
    pub prefix: Option<Vec<u8>>,
    #[serde(deserialize_with = "lenient::bytes_option")]
    pub suffix: Option<Vec<u8>>,
    #[serde(deserialize_with = "lenient::bytes_option")]
    pub contains: Option<Vec<u8>>,
    #[serde(rename = "in", deserialize_with = "lenient::bytes_list")]
    pub in_: Vec<Vec<u8>>,
    #[serde(deserialize_with = "lenient::bytes_list")]
    pub not_in: Vec<Vec<u8>>,
    pub ip: bool,
    pub ipv4: bool,
    pub ipv6: bool,
    pub ignore_empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct EnumRules {
    #[serde(rename = "const", deserialize_with = "lenient::option")]
    pub const_: Option<i32>,
    pub defined_only: bool,
    #[serde(rename = "in", deserialize_with = "lenient::list")]
    pub in_: Vec<i32>,
    #[serde(deserialize_with = "lenient::list")]
    pub not_in: Vec<i32>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default)]
pub struct MessageRules {
    pub skip: bool,
    pub required: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct AnyRules {
    pub required: bool,
    #[serde(rename = "in")]
    pub in_: Vec<String>,
    pub not_in: Vec<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct DurationRules {
    pub required: bool,
    #[serde(rename = "const")]
    pub const_: Option<ProtoDuration>,
    pub lt: Option<ProtoDuration>,
    pub lte: Option<ProtoDuration>,
    pub gt: Option<ProtoDuration>,
    pub gte: Option<ProtoDuration>,
    #[serde(rename = "in")]
    pub in_: Vec<ProtoDuration>,
    pub not_in: Vec<ProtoDuration>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct TimestampRules {
    pub required: bool,
    #[serde(rename = "const")]
    pub const_: Option<ProtoTimestamp>,
    pub lt: Option<ProtoTimestamp>,
    pub lte: Option<ProtoTimestamp>,
    pub gt: Option<ProtoTimestamp>,
    pub gte: Option<ProtoTimestamp>,
    pub lt_now: bool,
    pub gt_now: bool,
    pub within: Option<ProtoDuration>,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct RepeatedRules {
    #[serde(deserialize_with = "lenient::option")]
    pub min_items: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub max_items: Option<u64>,
    pub unique: bool,
    pub items: Option<Box<FieldConstraints>>,
    pub ignore_empty: bool,
}

#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(default, rename_all = "camelCase")]
pub struct MapRules {
    #[serde(deserialize_with = "lenient::option")]
    pub min_pairs: Option<u64>,
    #[serde(deserialize_with = "lenient::option")]
    pub max_pairs: Option<u64>,
    pub no_sparse: bool,
    pub keys: Option<Box<FieldConstraints>>,
    pub values: Option<Box<FieldConstraints>>,
    pub ignore_empty: bool,
}

/// `google.protobuf.Duration` as carried by the extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub struct ProtoDuration {
    pub seconds: i64,
    pub nanos: i32,
}

/// `google.protobuf.Timestamp` as carried by the extension.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Deserialize)]
#[serde(try_from = "Value")]
pub struct ProtoTimestamp {
    pub seconds: i64,
    pub nanos: i32,
}

impl TryFrom<Value> for ProtoDuration {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::String(text) => parse_duration(text),
            Value::Object(_) => parse_parts(&value).map(|(seconds, nanos)| ProtoDuration {
                seconds,
                nanos,
            }),
            other => Err(format!("invalid duration `{other}`")),
        }
    }
}

impl TryFrom<Value> for ProtoTimestamp {
    type Error = String;

    fn try_from(value: Value) -> Result<Self, Self::Error> {
        match &value {
            Value::String(text) => {
                let parsed = DateTime::parse_from_rfc3339(text)
                    .map_err(|e| format!("invalid timestamp `{text}`: {e}"))?;
                Ok(ProtoTimestamp {
                    seconds: parsed.timestamp(),
                    nanos: parsed.timestamp_subsec_nanos() as i32,
                })
            }
            Value::Object(_) => parse_parts(&value).map(|(seconds, nanos)| ProtoTimestamp {
                seconds,
                nanos,
            }),
            other => Err(format!("invalid timestamp `{other}`")),
        }
    }
}

/// `"-1.5s"` → `{ seconds: -1, nanos: -500_000_000 }`.
fn parse_duration(text: &str) -> Result<ProtoDuration, String> {
    let body = text
        .trim()
        .strip_suffix('s')
        .ok_or_else(|| format!("duration `{text}` must end in `s`"))?;
    let (negative, digits) = match body.strip_prefix('-') {
        Some(rest) => (true, rest),
        None => (false, body),
    };
    let (whole, frac) = digits.split_once('.').unwrap_or((digits, ""));
    if frac.len() > 9 || !frac.chars().all(|c| c.is_ascii_digit()) {
        return Err(format!("invalid fractional seconds in duration `{text}`"));
    }

    let seconds: i64 = whole
        .parse()
        .map_err(|_| format!("invalid seconds in duration `{text}`"))?;
    let nanos: i32 = if frac.is_empty() {
        0
    } else {
        format!("{frac:0<9}")
            .parse()
            .map_err(|_| format!("invalid fractional seconds in duration `{text}`"))?
    };

    Ok(if negative {
        ProtoDuration {
            seconds: -seconds,
            nanos: -nanos,
        }
    } else {
        ProtoDuration { seconds, nanos }
    })
}

fn parse_parts(value: &Value) -> Result<(i64, i32), String> {
    let seconds = match value.get("seconds") {
        None | Some(Value::Null) => 0,
        Some(v) => lenient::parse::<i64>(v).ok_or_else(|| format!("invalid seconds `{v}`"))?,
    };
    let nanos = match value.get("nanos") {
        None | Some(Value::Null) => 0,
        Some(v) => lenient::parse::<i32>(v).ok_or_else(|| format!("invalid nanos `{v}`"))?,
    };
    Ok((seconds, nanos))
}

/// Scalar representations the numeric rule families are generic over.
pub trait ProtoNumber: Copy + std::str::FromStr {
    const KIND: &'static str;

    fn from_number(number: &Number) -> Option<Self>;
}

macro_rules! proto_number {
    ($($t:ty => $kind:literal, |$n:ident| $from:expr;)*) => {
        $(
            impl ProtoNumber for $t {
                const KIND: &'static str = $kind;

                fn from_number($n: &Number) -> Option<Self> {
                    $from
                }
            }
        )*
    };
}

proto_number! {
    f32 => "float", |n| n.as_f64().map(|v| v as f32);
    f64 => "double", |n| n.as_f64();
    i32 => "int32", |n| n.as_i64().and_then(|v| i32::try_from(v).ok());
    i64 => "int64", |n| n.as_i64();
    u32 => "uint32", |n| n.as_u64().and_then(|v| u32::try_from(v).ok());
    u64 => "uint64", |n| n.as_u64();
}

/// protojson accepts both numbers and strings for numeric scalars (and
/// always emits strings for 64-bit ones).
mod lenient {
    use super::*;

    pub(super) fn parse<T: ProtoNumber>(value: &Value) -> Option<T> {
        match value {
            Value::Number(n) => T::from_number(n),
            Value::String(s) => s.trim().parse().ok(),
            _ => None,
        }
    }

    pub(super) fn option<'de, D, T>(deserializer: D) -> Result<Option<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: ProtoNumber,
    {
        match Option::<Value>::deserialize(deserializer)? {
            None | Some(Value::Null) => Ok(None),
            Some(value) => parse(&value)
                .map(Some)
                .ok_or_else(|| de::Error::custom(format!("invalid {} value `{value}`", T::KIND))),
        }
    }

    pub(super) fn list<'de, D, T>(deserializer: D) -> Result<Vec<T>, D::Error>
    where
        D: Deserializer<'de>,
        T: ProtoNumber,
    {
        Option::<Vec<Value>>::deserialize(deserializer)?
            .unwrap_or_default()
            .iter()
            .map(|value| {
                parse(value).ok_or_else(|| {
                    de::Error::custom(format!("invalid {} value `{value}`", T::KIND))
                })
            })
            .collect()
    }

    fn decode_bytes<E: de::Error>(text: &str) -> Result<Vec<u8>, E> {
        BASE64
            .decode(text)
            .or_else(|_| BASE64_URL.decode(text))
            .map_err(|e| E::custom(format!("invalid base64 bytes `{text}`: {e}")))
    }

    pub(super) fn bytes_option<'de, D>(deserializer: D) -> Result<Option<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<String>::deserialize(deserializer)?
            .map(|text| decode_bytes(&text))
            .transpose()
    }

    pub(super) fn bytes_list<'de, D>(deserializer: D) -> Result<Vec<Vec<u8>>, D::Error>
    where
        D: Deserializer<'de>,
    {
        Option::<Vec<String>>::deserialize(deserializer)?
            .unwrap_or_default()
            .iter()
            .map(|text| decode_bytes(text))
            .collect()
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use serde_json::json;

    fn constraints(value: Value) -> FieldConstraints {
        serde_json::from_value(value).unwrap()
    }

    #[test]
    fn int64_rules_accept_strings_and_numbers() {
        let rules = constraints(json!({ "int64": { "gte": "0", "lt": 10, "in": ["1", 2] } }));
        let Some(TypeRules::Int64(numeric)) = rules.kind else {
            panic!("expected int64 rules, got {:?}", rules.kind);
        };
        assert_eq!(numeric.gte, Some(0));
        assert_eq!(numeric.lt, Some(10));
        assert_eq!(numeric.in_, vec![1, 2]);
        assert!(numeric.not_in.is_empty());
    }

    #[test]
    fn out_of_range_int32_is_rejected() {
        let err = serde_json::from_value::<FieldConstraints>(json!({
            "int32": { "const": 4_294_967_296_i64 }
        }))
        .unwrap_err();
        assert!(err.to_string().contains("int32"), "{err}");
    }

    #[test]
    fn float_rules_accept_protojson_specials() {
        let rules = constraints(json!({ "double": { "lt": "Infinity", "gt": -1.5 } }));
        let Some(TypeRules::Double(numeric)) = rules.kind else {
            panic!("expected double rules");
        };
        assert_eq!(numeric.lt, Some(f64::INFINITY));
        assert_eq!(numeric.gt, Some(-1.5));
    }

    #[test]
    fn message_rules_sit_beside_the_type_oneof() {
        let rules = constraints(json!({
            "message": { "required": true },
            "repeated": { "minItems": "1", "items": { "string": { "maxLen": "10" } } }
        }));
        assert_eq!(
            rules.message,
            Some(MessageRules {
                skip: false,
                required: true
            })
        );
        let Some(TypeRules::Repeated(repeated)) = rules.kind else {
            panic!("expected repeated rules");
        };
        assert_eq!(repeated.min_items, Some(1));
        let items = repeated.items.expect("items");
        let Some(TypeRules::String(string)) = items.kind else {
            panic!("expected string item rules");
        };
        assert_eq!(string.max_len, Some(10));
    }

    #[test]
    fn bytes_rules_decode_base64() {
        let rules = constraints(json!({ "bytes": { "const": "AQI=", "in": ["/w=="] } }));
        let Some(TypeRules::Bytes(bytes)) = rules.kind else {
            panic!("expected bytes rules");
        };
        assert_eq!(bytes.const_, Some(vec![1, 2]));
        assert_eq!(bytes.in_, vec![vec![255]]);
    }

    #[test]
    fn durations_parse_from_text_and_parts() {
        let rules = constraints(json!({
            "duration": { "gt": "0s", "lte": "-1.5s", "in": [{ "seconds": "3", "nanos": 7 }] }
        }));
        let Some(TypeRules::Duration(duration)) = rules.kind else {
            panic!("expected duration rules");
        };
        assert_eq!(duration.gt, Some(ProtoDuration::default()));
        assert_eq!(
            duration.lte,
            Some(ProtoDuration {
                seconds: -1,
                nanos: -500_000_000
            })
        );
        assert_eq!(
            duration.in_,
            vec![ProtoDuration {
                seconds: 3,
                nanos: 7
            }]
        );
    }

    #[test]
    fn timestamps_parse_rfc3339() {
        let rules = constraints(json!({
            "timestamp": { "gt": "2021-01-01T00:00:00.25Z", "ltNow": true, "within": "60s" }
        }));
        let Some(TypeRules::Timestamp(ts)) = rules.kind else {
            panic!("expected timestamp rules");
        };
        assert_eq!(
            ts.gt,
            Some(ProtoTimestamp {
                seconds: 1_609_459_200,
                nanos: 250_000_000
            })
        );
        assert!(ts.lt_now);
        assert_eq!(ts.within.map(|d| d.seconds), Some(60));
    }

    #[test]
    fn malformed_duration_is_an_error() {
        assert!(parse_duration("5m").is_err());
        assert!(parse_duration("1.0000000001s").is_err());
    }

    proptest::proptest! {
        #[test]
        fn int64_numbers_and_strings_agree(n in proptest::num::i64::ANY) {
            let as_number = lenient::parse::<i64>(&Value::from(n));
            let as_string = lenient::parse::<i64>(&Value::String(n.to_string()));
            proptest::prop_assert_eq!(as_number, Some(n));
            proptest::prop_assert_eq!(as_string, Some(n));
        }

        #[test]
        fn uint32_rejects_out_of_range(n in (u32::MAX as u64 + 1)..u64::MAX) {
            proptest::prop_assert_eq!(lenient::parse::<u32>(&Value::from(n)), None);
            proptest::prop_assert_eq!(lenient::parse::<u32>(&Value::String(n.to_string())), None);
        }

        #[test]
        fn fractional_seconds_keep_their_sign(secs in 0i64..1_000_000, nanos in 0i32..1_000_000_000) {
            let text = format!("-{secs}.{nanos:09}s");
            let parsed = parse_duration(&text).unwrap();
            proptest::prop_assert_eq!(parsed, ProtoDuration { seconds: -secs, nanos: -nanos });
        }
    }
}
