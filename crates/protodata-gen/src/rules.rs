//! `validate.rules` → flat [`FieldRules`].

use crate::types::{FieldType, RuleTarget};
use crate::value::{Bytes, ScalarValue};
use chrono::{DateTime, Duration, Utc};
use protodata_schema::validate::{
    AnyRules, BoolRules, BytesRules, DurationRules, EnumRules, MessageRules, NumericRules,
    ProtoDuration, ProtoTimestamp, StringRules, TimestampRules,
};
use protodata_schema::{FieldConstraints, TypeRules};
use serde::{Serialize, Serializer};

/// Every constraint a field (or container element) can carry, flattened.
///
/// Unset constraints are skipped when serialized; an all-empty record is
/// omitted from its parent altogether.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldRules {
    // repeated
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_items: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_items: Option<u64>,
    #[serde(skip_serializing_if = "is_false")]
    pub unique: bool,
    // map
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_pairs: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_pairs: Option<u64>,
    #[serde(skip_serializing_if = "is_false")]
    pub no_sparse: bool,
    // enum
    #[serde(skip_serializing_if = "is_false")]
    pub defined_only: bool,
    // message
    #[serde(skip_serializing_if = "is_false")]
    pub skip: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub required: bool,
    // string
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_len: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_len: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub len_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub min_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub max_bytes: Option<u64>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub pattern: Option<String>,
    #[serde(skip_serializing_if = "is_false")]
    pub email: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub hostname: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub uri: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub uri_ref: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub address: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub uuid: bool,
    // string and bytes
    #[serde(skip_serializing_if = "Option::is_none")]
    pub prefix: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub suffix: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub contains: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub not_contains: Option<ScalarValue>,
    #[serde(skip_serializing_if = "is_false")]
    pub ip: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub ipv4: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub ipv6: bool,
    // timestamp
    #[serde(skip_serializing_if = "is_false")]
    pub lt_now: bool,
    #[serde(skip_serializing_if = "is_false")]
    pub gt_now: bool,
    #[serde(
        skip_serializing_if = "Option::is_none",
        serialize_with = "serialize_within"
    )]
    pub within: Option<Duration>,
    // most types
    #[serde(rename = "const", skip_serializing_if = "Option::is_none")]
    pub const_: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lt: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub lte: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gt: Option<ScalarValue>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub gte: Option<ScalarValue>,
    #[serde(rename = "in", skip_serializing_if = "Vec::is_empty")]
    pub in_: Vec<ScalarValue>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub not_in: Vec<ScalarValue>,
    #[serde(skip_serializing_if = "is_false")]
    pub ignore_empty: bool,
}

fn is_false(value: &bool) -> bool {
    !*value
}

fn serialize_within<S: Serializer>(within: &Option<Duration>, serializer: S) -> Result<S::Ok, S::Error> {
    within.map(ScalarValue::Duration).serialize(serializer)
}

impl FieldRules {
    pub fn is_empty(&self) -> bool {
        *self == FieldRules::default()
    }

    /// Merge the scalar-kind variant (and message rules) of `constraints`
    /// into this record. Enum rules only apply to enum targets, message
    /// rules only to message targets; container rules are handled by
    /// [`apply_field_rules`].
    pub fn apply(&mut self, constraints: &FieldConstraints, target: RuleTarget) {
        match &constraints.kind {
            Some(TypeRules::Float(r)) => self.add_numeric(r),
            Some(TypeRules::Double(r)) => self.add_numeric(r),
            Some(TypeRules::Int32(r)) | Some(TypeRules::Sint32(r)) | Some(TypeRules::Sfixed32(r)) => {
                self.add_numeric(r)
            }
            Some(TypeRules::Int64(r)) | Some(TypeRules::Sint64(r)) | Some(TypeRules::Sfixed64(r)) => {
                self.add_numeric(r)
            }
            Some(TypeRules::Uint32(r)) | Some(TypeRules::Fixed32(r)) => self.add_numeric(r),
            Some(TypeRules::Uint64(r)) | Some(TypeRules::Fixed64(r)) => self.add_numeric(r),
            Some(TypeRules::Bool(r)) => self.add_bool(r),
            Some(TypeRules::String(r)) => self.add_string(r),
            Some(TypeRules::Bytes(r)) => self.add_bytes(r),
            Some(TypeRules::Enum(r)) if target == RuleTarget::Enum => self.add_enum(r),
            Some(TypeRules::Any(r)) => self.add_any(r),
            Some(TypeRules::Duration(r)) => self.add_duration(r),
            Some(TypeRules::Timestamp(r)) => self.add_timestamp(r),
            Some(TypeRules::Enum(_) | TypeRules::Repeated(_) | TypeRules::Map(_)) | None => {}
        }
        if let Some(message) = &constraints.message {
            if target == RuleTarget::Message {
                self.add_message(message);
            }
        }
    }

    /// Shared by every numeric family.
    fn add_numeric<T>(&mut self, rules: &NumericRules<T>)
    where
        T: Copy + Into<ScalarValue>,
    {
        set(&mut self.const_, rules.const_.map(Into::into));
        set(&mut self.lt, rules.lt.map(Into::into));
        set(&mut self.lte, rules.lte.map(Into::into));
        set(&mut self.gt, rules.gt.map(Into::into));
        set(&mut self.gte, rules.gte.map(Into::into));
        set_list(&mut self.in_, rules.in_.iter().map(|v| (*v).into()));
        set_list(&mut self.not_in, rules.not_in.iter().map(|v| (*v).into()));
        self.ignore_empty |= rules.ignore_empty;
    }

    fn add_bool(&mut self, rules: &BoolRules) {
        set(&mut self.const_, rules.const_.map(ScalarValue::Bool));
    }

    fn add_string(&mut self, rules: &StringRules) {
        set(&mut self.const_, rules.const_.clone().map(ScalarValue::String));
        set(&mut self.len, rules.len);
        set(&mut self.min_len, rules.min_len);
        set(&mut self.max_len, rules.max_len);
        set(&mut self.len_bytes, rules.len_bytes);
        set(&mut self.min_bytes, rules.min_bytes);
        set(&mut self.max_bytes, rules.max_bytes);
        set(&mut self.pattern, rules.pattern.clone());
        set(&mut self.prefix, rules.prefix.clone().map(ScalarValue::String));
        set(&mut self.suffix, rules.suffix.clone().map(ScalarValue::String));
        set(&mut self.contains, rules.contains.clone().map(ScalarValue::String));
        set(
            &mut self.not_contains,
            rules.not_contains.clone().map(ScalarValue::String),
        );
        set_list(&mut self.in_, rules.in_.iter().cloned().map(ScalarValue::String));
        set_list(&mut self.not_in, rules.not_in.iter().cloned().map(ScalarValue::String));
        self.ip |= rules.ip;
        self.ipv4 |= rules.ipv4;
        self.ipv6 |= rules.ipv6;
        self.email |= rules.email;
        self.hostname |= rules.hostname;
        self.uri |= rules.uri;
        self.uri_ref |= rules.uri_ref;
        self.address |= rules.address;
        self.uuid |= rules.uuid;
        self.ignore_empty |= rules.ignore_empty;
    }

    fn add_bytes(&mut self, rules: &BytesRules) {
        let bytes = |v: &Vec<u8>| ScalarValue::Bytes(Bytes(v.clone()));
        set(&mut self.const_, rules.const_.as_ref().map(bytes));
        set(&mut self.len, rules.len);
        set(&mut self.min_len, rules.min_len);
        set(&mut self.max_len, rules.max_len);
        set(&mut self.pattern, rules.pattern.clone());
        set(&mut self.prefix, rules.prefix.as_ref().map(bytes));
        set(&mut self.suffix, rules.suffix.as_ref().map(bytes));
        set(&mut self.contains, rules.contains.as_ref().map(bytes));
        set_list(&mut self.in_, rules.in_.iter().map(bytes));
        set_list(&mut self.not_in, rules.not_in.iter().map(bytes));
        self.ip |= rules.ip;
        self.ipv4 |= rules.ipv4;
        self.ipv6 |= rules.ipv6;
        self.ignore_empty |= rules.ignore_empty;
    }

    fn add_enum(&mut self, rules: &EnumRules) {
        self.defined_only |= rules.defined_only;
        set(&mut self.const_, rules.const_.map(ScalarValue::Int32));
        set_list(&mut self.in_, rules.in_.iter().copied().map(ScalarValue::Int32));
        set_list(&mut self.not_in, rules.not_in.iter().copied().map(ScalarValue::Int32));
    }

    fn add_message(&mut self, rules: &MessageRules) {
        self.skip |= rules.skip;
        self.required |= rules.required;
    }

    fn add_any(&mut self, rules: &AnyRules) {
        self.required |= rules.required;
        set_list(&mut self.in_, rules.in_.iter().cloned().map(ScalarValue::String));
        set_list(&mut self.not_in, rules.not_in.iter().cloned().map(ScalarValue::String));
    }

    fn add_duration(&mut self, rules: &DurationRules) {
        let duration = |d: &ProtoDuration| ScalarValue::Duration(to_duration(d));
        set(&mut self.const_, rules.const_.as_ref().map(duration));
        set(&mut self.lt, rules.lt.as_ref().map(duration));
        set(&mut self.lte, rules.lte.as_ref().map(duration));
        set(&mut self.gt, rules.gt.as_ref().map(duration));
        set(&mut self.gte, rules.gte.as_ref().map(duration));
        set_list(&mut self.in_, rules.in_.iter().map(duration));
        set_list(&mut self.not_in, rules.not_in.iter().map(duration));
    }

    fn add_timestamp(&mut self, rules: &TimestampRules) {
        let time = |t: &ProtoTimestamp| to_time(t).map(ScalarValue::Timestamp);
        self.required |= rules.required;
        set(&mut self.const_, rules.const_.as_ref().and_then(time));
        set(&mut self.lt, rules.lt.as_ref().and_then(time));
        set(&mut self.lte, rules.lte.as_ref().and_then(time));
        set(&mut self.gt, rules.gt.as_ref().and_then(time));
        set(&mut self.gte, rules.gte.as_ref().and_then(time));
        self.lt_now |= rules.lt_now;
        self.gt_now |= rules.gt_now;
        set(&mut self.within, rules.within.as_ref().map(to_duration));
    }
}

/// Merge a field's constraints into its resolved type.
///
/// Container rules land on the field itself and their nested element / key /
/// value rules on the matching element; scalar-kind rules always land on the
/// field, checked against the field's own kind (never enum or message for a
/// container).
pub fn apply_field_rules(field_type: &mut FieldType, constraints: &FieldConstraints) {
    match &constraints.kind {
        Some(TypeRules::Repeated(repeated)) => {
            if let Some(element) = field_type.repeated.as_deref_mut() {
                let rules = &mut field_type.base.rules;
                set(&mut rules.min_items, repeated.min_items);
                set(&mut rules.max_items, repeated.max_items);
                rules.unique |= repeated.unique;
                rules.ignore_empty |= repeated.ignore_empty;
                if let Some(items) = &repeated.items {
                    let target = element.target();
                    element.rules.apply(items, target);
                }
            }
        }
        Some(TypeRules::Map(map)) => {
            if let (Some(key), Some(value)) = (
                field_type.map_key.as_deref_mut(),
                field_type.map_value.as_deref_mut(),
            ) {
                let rules = &mut field_type.base.rules;
                set(&mut rules.min_pairs, map.min_pairs);
                set(&mut rules.max_pairs, map.max_pairs);
                rules.no_sparse |= map.no_sparse;
                rules.ignore_empty |= map.ignore_empty;
                if let Some(keys) = &map.keys {
                    let target = key.target();
                    key.rules.apply(keys, target);
                }
                if let Some(values) = &map.values {
                    let target = value.target();
                    value.rules.apply(values, target);
                }
            }
        }
        _ => {}
    }

    let target = base_target(field_type);
    field_type.base.rules.apply(constraints, target);
}

/// Kind of the field's own type. Containers are neither enums nor messages,
/// so element-kind rules only ever land on `items` / `keys` / `values`.
fn base_target(field_type: &FieldType) -> RuleTarget {
    if field_type.repeated.is_some() || field_type.map_value.is_some() {
        RuleTarget::Scalar
    } else {
        field_type.base.target()
    }
}

fn set<T>(slot: &mut Option<T>, value: Option<T>) {
    if value.is_some() {
        *slot = value;
    }
}

fn set_list<I: IntoIterator<Item = ScalarValue>>(slot: &mut Vec<ScalarValue>, values: I) {
    let values: Vec<ScalarValue> = values.into_iter().collect();
    if !values.is_empty() {
        *slot = values;
    }
}

/// Native duration, clamped to the range of i64 nanoseconds.
fn to_duration(d: &ProtoDuration) -> Duration {
    let nanos = d
        .seconds
        .checked_mul(1_000_000_000)
        .and_then(|n| n.checked_add(i64::from(d.nanos)))
        .unwrap_or(if d.seconds < 0 { i64::MIN } else { i64::MAX });
    Duration::nanoseconds(nanos)
}

fn to_time(t: &ProtoTimestamp) -> Option<DateTime<Utc>> {
    let time = DateTime::from_timestamp(t.seconds, 0)
        .and_then(|at| at.checked_add_signed(Duration::nanoseconds(i64::from(t.nanos))));
    if time.is_none() {
        tracing::warn!(
            seconds = t.seconds,
            nanos = t.nanos,
            "timestamp constraint out of range, dropped"
        );
    }
    time
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::FieldTypeElem;
    use serde_json::{json, Value};

    fn constraints(value: Value) -> FieldConstraints {
        serde_json::from_value(value).unwrap()
    }

    fn scalar(name: &'static str) -> FieldTypeElem {
        FieldTypeElem {
            scalar: Some(name),
            ..FieldTypeElem::default()
        }
    }

    fn enum_elem() -> FieldTypeElem {
        FieldTypeElem {
            enum_ref: Some(Default::default()),
            ..FieldTypeElem::default()
        }
    }

    fn message_elem() -> FieldTypeElem {
        FieldTypeElem {
            message_ref: Some(Default::default()),
            ..FieldTypeElem::default()
        }
    }

    fn singular(elem: FieldTypeElem) -> FieldType {
        FieldType {
            base: elem,
            ..FieldType::default()
        }
    }

    fn rendered(rules: &FieldRules) -> Value {
        serde_json::to_value(rules).unwrap()
    }

    #[test]
    fn numeric_rules_share_one_shape() {
        let mut field = singular(scalar("sint64"));
        apply_field_rules(
            &mut field,
            &constraints(json!({ "sint64": { "gt": "-5", "lte": 10, "notIn": [3], "ignoreEmpty": true } })),
        );
        assert_eq!(
            rendered(&field.base.rules),
            json!({ "gt": -5, "lte": 10, "not_in": [3], "ignore_empty": true })
        );
    }

    #[test]
    fn string_rules_keep_declared_key_order() {
        let mut field = singular(scalar("string"));
        apply_field_rules(
            &mut field,
            &constraints(json!({ "string": {
                "minLen": "1", "maxLen": "64", "prefix": "isbn:", "email": true, "in": ["a", "b"]
            } })),
        );
        let text = serde_json::to_string(&field.base.rules).unwrap();
        assert_eq!(
            text,
            r#"{"min_len":1,"max_len":64,"email":true,"prefix":"isbn:","in":["a","b"]}"#
        );
    }

    #[test]
    fn repeated_rules_split_between_field_and_items() {
        let mut field = FieldType {
            repeated: Some(Box::new(scalar("string"))),
            ..FieldType::default()
        };
        apply_field_rules(
            &mut field,
            &constraints(json!({ "repeated": {
                "minItems": "1", "unique": true, "items": { "string": { "maxLen": "16" } }
            } })),
        );
        assert_eq!(
            rendered(&field.base.rules),
            json!({ "min_items": 1, "unique": true })
        );
        let element = field.repeated.expect("element");
        assert_eq!(rendered(&element.rules), json!({ "max_len": 16 }));
    }

    #[test]
    fn map_rules_reach_keys_and_values() {
        let mut field = FieldType {
            map_key: Some(Box::new(scalar("string"))),
            map_value: Some(Box::new(enum_elem())),
            ..FieldType::default()
        };
        apply_field_rules(
            &mut field,
            &constraints(json!({ "map": {
                "maxPairs": "8",
                "noSparse": true,
                "keys": { "string": { "minLen": "2" } },
                "values": { "enum": { "definedOnly": true } }
            } })),
        );
        assert_eq!(
            rendered(&field.base.rules),
            json!({ "max_pairs": 8, "no_sparse": true })
        );
        let key = field.map_key.expect("key");
        let value = field.map_value.expect("value");
        assert_eq!(rendered(&key.rules), json!({ "min_len": 2 }));
        assert_eq!(rendered(&value.rules), json!({ "defined_only": true }));
    }

    #[test]
    fn container_rules_on_the_wrong_shape_are_ignored() {
        let mut field = singular(scalar("string"));
        apply_field_rules(&mut field, &constraints(json!({ "repeated": { "minItems": "1" } })));
        assert!(field.base.rules.is_empty());
    }

    #[test]
    fn enum_rules_require_an_enum_target() {
        let rules = constraints(json!({ "enum": { "definedOnly": true, "in": [1, 2] } }));

        let mut on_scalar = singular(scalar("int32"));
        apply_field_rules(&mut on_scalar, &rules);
        assert!(on_scalar.base.rules.is_empty());

        let mut on_enum = singular(enum_elem());
        apply_field_rules(&mut on_enum, &rules);
        assert_eq!(
            rendered(&on_enum.base.rules),
            json!({ "defined_only": true, "in": [1, 2] })
        );
    }

    #[test]
    fn message_rules_require_a_message_target() {
        let rules = constraints(json!({ "message": { "required": true } }));

        let mut on_scalar = singular(scalar("string"));
        apply_field_rules(&mut on_scalar, &rules);
        assert!(on_scalar.base.rules.is_empty());

        let mut on_message = singular(message_elem());
        apply_field_rules(&mut on_message, &rules);
        assert_eq!(rendered(&on_message.base.rules), json!({ "required": true }));
    }

    #[test]
    fn container_fields_skip_element_kind_rules() {
        let mut repeated_enum = FieldType {
            repeated: Some(Box::new(enum_elem())),
            ..FieldType::default()
        };
        apply_field_rules(
            &mut repeated_enum,
            &constraints(json!({ "enum": { "definedOnly": true } })),
        );
        assert!(repeated_enum.base.rules.is_empty());
        assert!(repeated_enum.repeated.expect("element").rules.is_empty());

        let mut repeated_message = FieldType {
            repeated: Some(Box::new(message_elem())),
            ..FieldType::default()
        };
        apply_field_rules(
            &mut repeated_message,
            &constraints(json!({ "message": { "required": true } })),
        );
        assert!(repeated_message.base.rules.is_empty());

        let mut map_of_messages = FieldType {
            map_key: Some(Box::new(scalar("string"))),
            map_value: Some(Box::new(message_elem())),
            ..FieldType::default()
        };
        apply_field_rules(
            &mut map_of_messages,
            &constraints(json!({
                "message": { "skip": true },
                "map": { "values": { "message": { "required": true } } }
            })),
        );
        assert!(map_of_messages.base.rules.is_empty());
        let value = map_of_messages.map_value.expect("value");
        assert_eq!(rendered(&value.rules), json!({ "required": true }));
    }

    #[test]
    fn durations_beyond_i64_nanoseconds_are_clamped() {
        let mut field = singular(message_elem());
        apply_field_rules(
            &mut field,
            &constraints(json!({ "duration": {
                "lte": "315576000000s", "gte": "-315576000000s"
            } })),
        );
        assert_eq!(
            rendered(&field.base.rules),
            json!({ "lte": i64::MAX, "gte": i64::MIN })
        );
    }

    #[test]
    fn bytes_rules_keep_raw_bytes() {
        let mut field = singular(scalar("bytes"));
        apply_field_rules(
            &mut field,
            &constraints(json!({ "bytes": { "prefix": "AQI=", "ipv4": true } })),
        );
        assert_eq!(
            field.base.rules.prefix,
            Some(ScalarValue::Bytes(Bytes(vec![1, 2])))
        );
        assert!(field.base.rules.ipv4);
    }

    #[test]
    fn temporal_rules_become_native_values() {
        let mut duration = singular(message_elem());
        apply_field_rules(
            &mut duration,
            &constraints(json!({ "duration": { "gte": "1.5s", "in": ["1s", "2s"] } })),
        );
        assert_eq!(
            rendered(&duration.base.rules),
            json!({ "gte": 1_500_000_000_i64, "in": [1_000_000_000_i64, 2_000_000_000_i64] })
        );

        let mut timestamp = singular(message_elem());
        apply_field_rules(
            &mut timestamp,
            &constraints(json!({ "timestamp": {
                "required": true, "gt": "2020-01-01T00:00:00Z", "ltNow": true, "within": "3600s"
            } })),
        );
        assert_eq!(
            rendered(&timestamp.base.rules),
            json!({
                "required": true,
                "lt_now": true,
                "within": 3_600_000_000_000_i64,
                "gt": "2020-01-01T00:00:00Z"
            })
        );
    }

    #[test]
    fn any_rules_list_type_urls() {
        let mut field = singular(message_elem());
        apply_field_rules(
            &mut field,
            &constraints(json!({ "any": { "required": true, "in": ["type.googleapis.com/acme.Book"] } })),
        );
        assert_eq!(
            rendered(&field.base.rules),
            json!({ "required": true, "in": ["type.googleapis.com/acme.Book"] })
        );
    }

    #[test]
    fn empty_constraints_produce_empty_rules() {
        let mut field = singular(scalar("string"));
        apply_field_rules(&mut field, &FieldConstraints::default());
        assert!(field.base.rules.is_empty());
    }
}
