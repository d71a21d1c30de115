//! Serializable records, one per artifact, and the builders that derive them
//! from the schema graph.
//!
//! Key order on the wire is the field order of these structs.

use crate::entity::{short_name, Entity, Reference};
use crate::error::GenerateError;
use crate::http::{http_bindings, HttpBinding};
use crate::ordered::MapSlice;
use crate::rules::apply_field_rules;
use crate::types::{field_default, resolve_field_type, FieldType};
use crate::value::FieldDefault;
use protodata_schema as schema;
use protodata_schema::{EnumId, MessageId, SchemaGraph, ServiceId};
use serde::Serialize;

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct EnumValue {
    #[serde(flatten)]
    pub entity: Entity,
    pub value: i32,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Enum {
    #[serde(flatten)]
    pub entity: Entity,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Field {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(flatten)]
    pub field_type: FieldType,
    pub default: FieldDefault,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct OneOf {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub field_names: Vec<String>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Message {
    #[serde(flatten)]
    pub entity: Entity,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub fields: Vec<Field>,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub oneofs: Vec<OneOf>,
}

/// Method input or output.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Stream {
    #[serde(flatten)]
    pub reference: Reference,
    #[serde(skip_serializing_if = "is_false")]
    pub stream: bool,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Method {
    #[serde(flatten)]
    pub entity: Entity,
    pub input: Stream,
    pub output: Stream,
    #[serde(skip_serializing_if = "Vec::is_empty")]
    pub http: Vec<HttpBinding>,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct Service {
    #[serde(flatten)]
    pub entity: Entity,
    /// Method name → method, declaration order.
    #[serde(skip_serializing_if = "MapSlice::is_empty")]
    pub methods: MapSlice<Method>,
}

fn is_false(value: &bool) -> bool {
    !*value
}

/// Name of an artifact-level entity: package-relative, nested types keep
/// their parents (`Book.Author`).
fn entity_name(graph: &SchemaGraph, full_name: &str, file: schema::FileId) -> String {
    short_name(full_name, graph.package_of(file))
}

pub fn build_enum(graph: &SchemaGraph, id: EnumId) -> Enum {
    let src = graph.enum_type(id);
    Enum {
        entity: Entity::new(entity_name(graph, &src.full_name, src.file), &src.comments),
        values: src
            .values
            .iter()
            .map(|value| EnumValue {
                entity: Entity::new(value.name.as_str(), &value.comments),
                value: value.number,
            })
            .collect(),
    }
}

pub fn build_message(graph: &SchemaGraph, id: MessageId) -> Result<Message, GenerateError> {
    let src = graph.message(id);
    let fields = src
        .fields
        .iter()
        .map(|field| build_field(graph, field))
        .collect::<Result<Vec<_>, _>>()?;
    let oneofs = src
        .oneofs
        .iter()
        .filter(|oneof| !oneof.synthetic)
        .map(|oneof| OneOf {
            entity: Entity::new(oneof.name.as_str(), &oneof.comments),
            field_names: oneof
                .fields
                .iter()
                .map(|&idx| src.fields[idx].name.clone())
                .collect(),
        })
        .collect();

    Ok(Message {
        entity: Entity::new(entity_name(graph, &src.full_name, src.file), &src.comments),
        fields,
        oneofs,
    })
}

pub fn build_field(graph: &SchemaGraph, src: &schema::Field) -> Result<Field, GenerateError> {
    let mut field_type = resolve_field_type(graph, src)?;
    if let Some(constraints) = &src.constraints {
        apply_field_rules(&mut field_type, constraints);
    }
    Ok(Field {
        entity: Entity::new(src.name.as_str(), &src.comments),
        field_type,
        default: field_default(graph, src)?,
    })
}

pub fn build_service(graph: &SchemaGraph, id: ServiceId) -> Service {
    let src = graph.service(id);
    let methods = src
        .methods
        .iter()
        .map(|method| (method.name.clone(), build_method(graph, method)))
        .collect();
    Service {
        entity: Entity::new(entity_name(graph, &src.full_name, src.file), &src.comments),
        methods,
    }
}

pub fn build_method(graph: &SchemaGraph, src: &schema::Method) -> Method {
    Method {
        entity: Entity::new(src.name.as_str(), &src.comments),
        input: Stream {
            reference: Reference::to_message(graph, src.input),
            stream: src.client_streaming,
        },
        output: Stream {
            reference: Reference::to_message(graph, src.output),
            stream: src.server_streaming,
        },
        http: http_bindings(graph, src),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::encode::to_node;
    use protodata_schema::TypeId;
    use serde_json::json;

    fn graph() -> SchemaGraph {
        let descriptor = json!({
            "file": [{
                "name": "pets/v1/pets.proto",
                "package": "pets.v1",
                "messageType": [{
                    "name": "Pet",
                    "field": [
                        { "name": "name", "number": 1, "type": "TYPE_STRING",
                          "options": { "[validate.rules]": { "string": { "minLen": "1" } } } },
                        { "name": "cat", "number": 2, "type": "TYPE_BOOL", "oneofIndex": 0 },
                        { "name": "dog", "number": 3, "type": "TYPE_BOOL", "oneofIndex": 0 },
                        { "name": "age", "number": 4, "type": "TYPE_UINT32", "oneofIndex": 1, "proto3Optional": true },
                        { "name": "toys", "number": 5, "label": "LABEL_REPEATED", "type": "TYPE_STRING" }
                    ],
                    "oneofDecl": [ { "name": "species" }, { "name": "_age" } ],
                    "nestedType": [ { "name": "Collar" } ]
                }],
                "service": [{ "name": "PetStore", "method": [
                    { "name": "Zap", "inputType": ".pets.v1.Pet", "outputType": ".pets.v1.Pet", "clientStreaming": true },
                    { "name": "Adopt", "inputType": ".pets.v1.Pet", "outputType": ".pets.v1.Pet.Collar" }
                ] }],
                "sourceCodeInfo": { "location": [
                    { "path": [4, 0], "leadingComments": " A pet.\n" },
                    { "path": [4, 0, 8, 0], "trailingComments": " Which kind.\n" }
                ] }
            }]
        });
        SchemaGraph::from_descriptor_json(&descriptor.to_string(), &[]).unwrap()
    }

    fn message_id(graph: &SchemaGraph, name: &str) -> MessageId {
        match graph.lookup(name) {
            Some(TypeId::Message(id)) => id,
            other => panic!("{name} is not a message: {other:?}"),
        }
    }

    #[test]
    fn message_record_layout() {
        let graph = graph();
        let message = build_message(&graph, message_id(&graph, ".pets.v1.Pet")).unwrap();
        assert_eq!(message.entity.name, "Pet");
        assert_eq!(message.entity.comment, "A pet.");
        assert_eq!(message.fields.len(), 5);

        // The synthetic `_age` oneof is not part of the record.
        assert_eq!(message.oneofs.len(), 1);
        assert_eq!(message.oneofs[0].entity.comment, "Which kind.");
        assert_eq!(message.oneofs[0].field_names, vec!["cat", "dog"]);

        let node = to_node(&message.fields[0]).unwrap();
        assert_eq!(node.keys(), vec!["name", "type", "rules", "default"]);
        let toys = to_node(&message.fields[4]).unwrap();
        assert_eq!(toys.keys(), vec!["name", "repeated", "default"]);
    }

    #[test]
    fn nested_messages_keep_their_parent_prefix() {
        let graph = graph();
        let collar = build_message(&graph, message_id(&graph, ".pets.v1.Pet.Collar")).unwrap();
        assert_eq!(collar.entity.name, "Pet.Collar");
        assert_eq!(
            serde_json::to_value(&collar).unwrap(),
            json!({ "name": "Pet.Collar" })
        );
    }

    #[test]
    fn services_list_methods_in_declaration_order() {
        let graph = graph();
        let service = build_service(&graph, graph.files()[0].services[0]);
        assert_eq!(service.methods.keys().collect::<Vec<_>>(), vec!["Zap", "Adopt"]);

        let zap = service.methods.get("Zap").unwrap();
        assert!(zap.input.stream);
        assert!(!zap.output.stream);
        assert!(zap.http.is_empty());

        let node = to_node(&service).unwrap();
        let adopt = node.get("methods").and_then(|m| m.get("Adopt")).unwrap();
        assert_eq!(adopt.keys(), vec!["name", "input", "output"]);
        assert_eq!(
            adopt.get("output").map(|o| o.keys()),
            Some(vec!["name"])
        );
    }
}
