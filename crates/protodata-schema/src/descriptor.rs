//! Descriptor JSON (subset).
//!
//! Mirrors the JSON rendering of `google.protobuf.FileDescriptorSet` and
//! `google.protobuf.compiler.CodeGeneratorRequest`. Only the parts the graph
//! needs are modelled; unknown keys are ignored.

use serde::Deserialize;
use serde_json::Value;
use std::collections::BTreeMap;

/// Raw `options` object. Extensions show up as `"[full.extension.name]"` keys.
pub type OptionsJson = BTreeMap<String, Value>;

pub const VALIDATE_RULES_KEY: &str = "[validate.rules]";
pub const GOOGLE_API_HTTP_KEY: &str = "[google.api.http]";

/// Either a descriptor set (`file`) or a plugin request (`protoFile` +
/// `fileToGenerate`).
#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptorInputJson {
    #[serde(default)]
    pub file: Vec<FileDescriptorProtoJson>,
    #[serde(default, rename = "protoFile")]
    pub proto_file: Vec<FileDescriptorProtoJson>,
    #[serde(default, rename = "fileToGenerate")]
    pub file_to_generate: Vec<String>,
}

impl DescriptorInputJson {
    /// Files in declaration (topological) order, whichever shape was supplied.
    pub fn into_files(self) -> (Vec<FileDescriptorProtoJson>, Vec<String>) {
        let mut files = self.file;
        files.extend(self.proto_file);
        (files, self.file_to_generate)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FileDescriptorProtoJson {
    pub name: Option<String>,
    pub package: Option<String>,
    #[serde(default)]
    pub dependency: Vec<String>,
    #[serde(default, rename = "messageType")]
    pub message_type: Vec<DescriptorProtoJson>,
    #[serde(default, rename = "enumType")]
    pub enum_type: Vec<EnumDescriptorProtoJson>,
    #[serde(default)]
    pub service: Vec<ServiceDescriptorProtoJson>,
    #[serde(default, rename = "sourceCodeInfo")]
    pub source_code_info: Option<SourceCodeInfoJson>,
    pub syntax: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct DescriptorProtoJson {
    pub name: Option<String>,
    #[serde(default)]
    pub field: Vec<FieldDescriptorProtoJson>,
    #[serde(default, rename = "nestedType")]
    pub nested_type: Vec<DescriptorProtoJson>,
    #[serde(default, rename = "enumType")]
    pub enum_type: Vec<EnumDescriptorProtoJson>,
    #[serde(default, rename = "oneofDecl")]
    pub oneof_decl: Vec<OneofDescriptorProtoJson>,
    #[serde(default)]
    pub options: Option<OptionsJson>,
}

impl DescriptorProtoJson {
    pub fn is_map_entry(&self) -> bool {
        self.options
            .as_ref()
            .and_then(|opts| opts.get("mapEntry"))
            .and_then(Value::as_bool)
            .unwrap_or(false)
    }
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct OneofDescriptorProtoJson {
    pub name: Option<String>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct FieldDescriptorProtoJson {
    pub name: Option<String>,
    pub number: Option<i32>,
    pub label: Option<String>,
    #[serde(rename = "type")]
    pub typ: Option<String>,
    #[serde(rename = "typeName")]
    pub type_name: Option<String>,
    #[serde(rename = "jsonName")]
    pub json_name: Option<String>,
    #[serde(default)]
    pub options: Option<OptionsJson>,
    #[serde(rename = "oneofIndex")]
    pub oneof_index: Option<i32>,
    #[serde(default, rename = "proto3Optional")]
    pub proto3_optional: bool,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnumDescriptorProtoJson {
    pub name: Option<String>,
    #[serde(default)]
    pub value: Vec<EnumValueDescriptorProtoJson>,
    #[serde(default)]
    pub options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct EnumValueDescriptorProtoJson {
    pub name: Option<String>,
    pub number: Option<i32>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct ServiceDescriptorProtoJson {
    pub name: Option<String>,
    #[serde(default)]
    pub method: Vec<MethodDescriptorProtoJson>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct MethodDescriptorProtoJson {
    pub name: Option<String>,
    #[serde(rename = "inputType")]
    pub input_type: Option<String>,
    #[serde(rename = "outputType")]
    pub output_type: Option<String>,
    #[serde(default, rename = "clientStreaming")]
    pub client_streaming: bool,
    #[serde(default, rename = "serverStreaming")]
    pub server_streaming: bool,
    #[serde(default)]
    pub options: Option<OptionsJson>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct SourceCodeInfoJson {
    #[serde(default)]
    pub location: Vec<LocationJson>,
}

#[derive(Debug, Clone, Default, Deserialize)]
pub struct LocationJson {
    #[serde(default)]
    pub path: Vec<i32>,
    #[serde(rename = "leadingComments")]
    pub leading_comments: Option<String>,
    #[serde(rename = "trailingComments")]
    pub trailing_comments: Option<String>,
}

// Source location path components (descriptor.proto field numbers).
pub(crate) const FILE_MESSAGE_TYPE: i32 = 4;
pub(crate) const FILE_ENUM_TYPE: i32 = 5;
pub(crate) const FILE_SERVICE: i32 = 6;
pub(crate) const MESSAGE_FIELD: i32 = 2;
pub(crate) const MESSAGE_NESTED_TYPE: i32 = 3;
pub(crate) const MESSAGE_ENUM_TYPE: i32 = 4;
pub(crate) const MESSAGE_ONEOF_DECL: i32 = 8;
pub(crate) const ENUM_VALUE: i32 = 2;
pub(crate) const SERVICE_METHOD: i32 = 2;
