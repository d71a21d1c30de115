//! Field type resolution and zero values.

use crate::entity::Reference;
use crate::error::GenerateError;
use crate::rules::FieldRules;
use crate::value::{Bytes, FieldDefault, ScalarValue};
use protodata_schema::{Field, FieldShape, SchemaGraph, TypeId, WellKnownType, WireType};
use serde::Serialize;

/// One resolved type: exactly one of `type`, `enum` and `message` is set,
/// except on the base of a container field, which only carries the field's
/// own rules.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldTypeElem {
    #[serde(rename = "type", skip_serializing_if = "Option::is_none")]
    pub scalar: Option<&'static str>,
    #[serde(rename = "enum", skip_serializing_if = "Option::is_none")]
    pub enum_ref: Option<Reference>,
    #[serde(rename = "message", skip_serializing_if = "Option::is_none")]
    pub message_ref: Option<Reference>,
    #[serde(skip_serializing_if = "FieldRules::is_empty")]
    pub rules: FieldRules,
}

impl FieldTypeElem {
    /// What kind of target element-level rules apply to.
    pub fn target(&self) -> RuleTarget {
        if self.enum_ref.is_some() {
            RuleTarget::Enum
        } else if self.message_ref.is_some() {
            RuleTarget::Message
        } else {
            RuleTarget::Scalar
        }
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RuleTarget {
    Scalar,
    Enum,
    Message,
}

/// A field's type: singular (`base` only), repeated or map.
#[derive(Debug, Clone, Default, PartialEq, Serialize)]
pub struct FieldType {
    #[serde(flatten)]
    pub base: FieldTypeElem,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub repeated: Option<Box<FieldTypeElem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_key: Option<Box<FieldTypeElem>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub map_value: Option<Box<FieldTypeElem>>,
}

/// Lower-case proto name of a scalar wire type; `None` for enum, message and
/// group.
pub fn scalar_name(wire_type: WireType) -> Option<&'static str> {
    Some(match wire_type {
        WireType::Double => "double",
        WireType::Float => "float",
        WireType::Int64 => "int64",
        WireType::Uint64 => "uint64",
        WireType::Int32 => "int32",
        WireType::Fixed64 => "fixed64",
        WireType::Fixed32 => "fixed32",
        WireType::Bool => "bool",
        WireType::String => "string",
        WireType::Bytes => "bytes",
        WireType::Uint32 => "uint32",
        WireType::Sfixed32 => "sfixed32",
        WireType::Sfixed64 => "sfixed64",
        WireType::Sint32 => "sint32",
        WireType::Sint64 => "sint64",
        WireType::Enum | WireType::Message | WireType::Group => return None,
    })
}

/// Zero value of a scalar wire type.
pub fn scalar_zero(wire_type: WireType) -> Option<ScalarValue> {
    Some(match wire_type {
        WireType::Double => ScalarValue::Double(0.0),
        WireType::Float => ScalarValue::Float(0.0),
        WireType::Int64 | WireType::Sfixed64 | WireType::Sint64 => ScalarValue::Int64(0),
        WireType::Uint64 | WireType::Fixed64 => ScalarValue::Uint64(0),
        WireType::Int32 | WireType::Sfixed32 | WireType::Sint32 => ScalarValue::Int32(0),
        WireType::Uint32 | WireType::Fixed32 => ScalarValue::Uint32(0),
        WireType::Bool => ScalarValue::Bool(false),
        WireType::String => ScalarValue::String(String::new()),
        WireType::Bytes => ScalarValue::Bytes(Bytes::default()),
        WireType::Enum | WireType::Message | WireType::Group => return None,
    })
}

/// Resolve a single (non-container) type.
pub fn resolve_elem(graph: &SchemaGraph, field: &Field) -> Result<FieldTypeElem, GenerateError> {
    let mut elem = FieldTypeElem::default();
    match field.wire_type {
        WireType::Enum => match field.type_ref {
            Some(TypeId::Enum(id)) => elem.enum_ref = Some(Reference::to_enum(graph, id)),
            _ => return Err(missing_reference(field)),
        },
        WireType::Message => match field.type_ref {
            Some(TypeId::Message(id)) => elem.message_ref = Some(Reference::to_message(graph, id)),
            _ => return Err(missing_reference(field)),
        },
        other => elem.scalar = Some(scalar_name(other).ok_or_else(|| unsupported(field))?),
    }
    Ok(elem)
}

/// Resolve a field into its singular / repeated / map shape.
pub fn resolve_field_type(graph: &SchemaGraph, field: &Field) -> Result<FieldType, GenerateError> {
    let mut field_type = FieldType::default();
    match graph.field_shape(field) {
        FieldShape::Singular => field_type.base = resolve_elem(graph, field)?,
        FieldShape::Repeated => field_type.repeated = Some(Box::new(resolve_elem(graph, field)?)),
        FieldShape::Map { key, value } => {
            field_type.map_key = Some(Box::new(resolve_elem(graph, key)?));
            field_type.map_value = Some(Box::new(resolve_elem(graph, value)?));
        }
    }
    Ok(field_type)
}

/// Zero value a reader should assume when the field is absent.
pub fn field_default(graph: &SchemaGraph, field: &Field) -> Result<FieldDefault, GenerateError> {
    match graph.field_shape(field) {
        FieldShape::Repeated => return Ok(FieldDefault::EmptyList),
        FieldShape::Map { .. } => return Ok(FieldDefault::EmptyMap),
        FieldShape::Singular => {}
    }

    match (field.wire_type, field.type_ref) {
        (WireType::Enum, Some(TypeId::Enum(id))) => {
            let e = graph.enum_type(id);
            let first = e
                .values
                .first()
                .ok_or_else(|| GenerateError::EmptyEnum(e.full_name.clone()))?;
            Ok(FieldDefault::Text(first.name.clone()))
        }
        (WireType::Message, Some(TypeId::Message(id))) => {
            Ok(message_default(graph.message(id).well_known))
        }
        (WireType::Enum | WireType::Message, _) => Err(missing_reference(field)),
        (wire_type, _) => scalar_zero(wire_type)
            .map(FieldDefault::Scalar)
            .ok_or_else(|| unsupported(field)),
    }
}

fn message_default(well_known: Option<WellKnownType>) -> FieldDefault {
    match well_known {
        // Wrappers, plus `Value` and `ListValue`, may be absent.
        Some(wkt) if wkt.name().ends_with("Value") => FieldDefault::Null,
        Some(WellKnownType::Any) => FieldDefault::Null,
        Some(WellKnownType::Duration) => FieldDefault::Text("0s".to_string()),
        Some(WellKnownType::Timestamp) => FieldDefault::Text("0001-01-01T00:00:00Z".to_string()),
        _ => FieldDefault::EmptyMap,
    }
}

fn unsupported(field: &Field) -> GenerateError {
    GenerateError::UnsupportedWireType {
        field: field.full_name.clone(),
        wire_type: field.wire_type,
    }
}

fn missing_reference(field: &Field) -> GenerateError {
    GenerateError::MissingTypeReference {
        field: field.full_name.clone(),
        wire_type: field.wire_type,
    }
}
