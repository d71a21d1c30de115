//! Resolved schema graph.
//!
//! Entities live in flat arenas owned by [`SchemaGraph`] and refer to each
//! other through copyable ids. Loading happens in two passes:
//!
//! 1. register every message / enum under its fully-qualified name
//!    (leading dot, e.g. `.acme.v1.Book.Author`)
//! 2. resolve field type names and method input/output types

use crate::annotations::HttpRule;
use crate::descriptor::{self, *};
use crate::error::SchemaError;
use crate::validate::FieldConstraints;
use serde::de::DeserializeOwned;
use serde_json::Value;
use std::collections::{BTreeMap, BTreeSet, HashMap};
use std::fmt;
use std::str::FromStr;

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct FileId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct MessageId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct EnumId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct ServiceId(pub usize);

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum TypeId {
    Message(MessageId),
    Enum(EnumId),
}

/// `FieldDescriptorProto.Type`, verbatim.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum WireType {
    Double,
    Float,
    Int64,
    Uint64,
    Int32,
    Fixed64,
    Fixed32,
    Bool,
    String,
    Group,
    Message,
    Bytes,
    Uint32,
    Enum,
    Sfixed32,
    Sfixed64,
    Sint32,
    Sint64,
}

impl FromStr for WireType {
    type Err = ();

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        Ok(match s {
            "TYPE_DOUBLE" => WireType::Double,
            "TYPE_FLOAT" => WireType::Float,
            "TYPE_INT64" => WireType::Int64,
            "TYPE_UINT64" => WireType::Uint64,
            "TYPE_INT32" => WireType::Int32,
            "TYPE_FIXED64" => WireType::Fixed64,
            "TYPE_FIXED32" => WireType::Fixed32,
            "TYPE_BOOL" => WireType::Bool,
            "TYPE_STRING" => WireType::String,
            "TYPE_GROUP" => WireType::Group,
            "TYPE_MESSAGE" => WireType::Message,
            "TYPE_BYTES" => WireType::Bytes,
            "TYPE_UINT32" => WireType::Uint32,
            "TYPE_ENUM" => WireType::Enum,
            "TYPE_SFIXED32" => WireType::Sfixed32,
            "TYPE_SFIXED64" => WireType::Sfixed64,
            "TYPE_SINT32" => WireType::Sint32,
            "TYPE_SINT64" => WireType::Sint64,
            _ => return Err(()),
        })
    }
}

impl fmt::Display for WireType {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{self:?}")
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub enum Label {
    #[default]
    Optional,
    Required,
    Repeated,
}

/// Leading / trailing doc comments, raw (comment markers already removed by
/// the compiler, whitespace untouched).
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct Comments {
    pub leading: String,
    pub trailing: String,
}

/// `google.protobuf` messages with compiler-recognized semantics.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum WellKnownType {
    Any,
    Duration,
    Empty,
    Struct,
    Timestamp,
    Value,
    ListValue,
    DoubleValue,
    FloatValue,
    Int64Value,
    UInt64Value,
    Int32Value,
    UInt32Value,
    BoolValue,
    StringValue,
    BytesValue,
    FieldMask,
}

impl WellKnownType {
    const ALL: [WellKnownType; 17] = [
        WellKnownType::Any,
        WellKnownType::Duration,
        WellKnownType::Empty,
        WellKnownType::Struct,
        WellKnownType::Timestamp,
        WellKnownType::Value,
        WellKnownType::ListValue,
        WellKnownType::DoubleValue,
        WellKnownType::FloatValue,
        WellKnownType::Int64Value,
        WellKnownType::UInt64Value,
        WellKnownType::Int32Value,
        WellKnownType::UInt32Value,
        WellKnownType::BoolValue,
        WellKnownType::StringValue,
        WellKnownType::BytesValue,
        WellKnownType::FieldMask,
    ];

    pub fn name(self) -> &'static str {
        match self {
            WellKnownType::Any => "Any",
            WellKnownType::Duration => "Duration",
            WellKnownType::Empty => "Empty",
            WellKnownType::Struct => "Struct",
            WellKnownType::Timestamp => "Timestamp",
            WellKnownType::Value => "Value",
            WellKnownType::ListValue => "ListValue",
            WellKnownType::DoubleValue => "DoubleValue",
            WellKnownType::FloatValue => "FloatValue",
            WellKnownType::Int64Value => "Int64Value",
            WellKnownType::UInt64Value => "UInt64Value",
            WellKnownType::Int32Value => "Int32Value",
            WellKnownType::UInt32Value => "UInt32Value",
            WellKnownType::BoolValue => "BoolValue",
            WellKnownType::StringValue => "StringValue",
            WellKnownType::BytesValue => "BytesValue",
            WellKnownType::FieldMask => "FieldMask",
        }
    }

    /// Recognizes `.google.protobuf.<Name>`.
    pub fn from_full_name(full_name: &str) -> Option<Self> {
        let name = full_name.strip_prefix(".google.protobuf.")?;
        Self::ALL.into_iter().find(|wkt| wkt.name() == name)
    }
}

#[derive(Debug, Clone)]
pub struct Package {
    pub name: String,
    pub files: Vec<FileId>,
}

#[derive(Debug, Clone)]
pub struct File {
    pub name: String,
    pub package: String,
    pub build_target: bool,
    pub enums: Vec<EnumId>,
    pub messages: Vec<MessageId>,
    pub services: Vec<ServiceId>,
}

#[derive(Debug, Clone)]
pub struct Enum {
    pub name: String,
    pub full_name: String,
    pub file: FileId,
    pub comments: Comments,
    pub values: Vec<EnumValue>,
}

#[derive(Debug, Clone)]
pub struct EnumValue {
    pub name: String,
    pub number: i32,
    pub comments: Comments,
}

#[derive(Debug, Clone)]
pub struct Message {
    pub name: String,
    pub full_name: String,
    pub file: FileId,
    pub comments: Comments,
    pub fields: Vec<Field>,
    pub oneofs: Vec<OneOf>,
    pub nested_messages: Vec<MessageId>,
    pub nested_enums: Vec<EnumId>,
    pub map_entry: bool,
    pub well_known: Option<WellKnownType>,
}

#[derive(Debug, Clone)]
pub struct Field {
    pub name: String,
    pub full_name: String,
    pub number: i32,
    pub label: Label,
    pub wire_type: WireType,
    /// Declared `typeName` (enum / message / group fields only).
    pub type_name: Option<String>,
    /// Filled by the second loading pass whenever `type_name` is set.
    pub type_ref: Option<TypeId>,
    pub oneof_index: Option<usize>,
    pub proto3_optional: bool,
    pub comments: Comments,
    pub constraints: Option<FieldConstraints>,
}

#[derive(Debug, Clone)]
pub struct OneOf {
    pub name: String,
    pub comments: Comments,
    /// Indices into the owning message's `fields`, declaration order.
    pub fields: Vec<usize>,
    /// Compiler-generated wrapper of a proto3 `optional` field.
    pub synthetic: bool,
}

#[derive(Debug, Clone)]
pub struct Service {
    pub name: String,
    pub full_name: String,
    pub file: FileId,
    pub comments: Comments,
    pub methods: Vec<Method>,
}

#[derive(Debug, Clone)]
pub struct Method {
    pub name: String,
    pub full_name: String,
    pub input: MessageId,
    pub output: MessageId,
    pub client_streaming: bool,
    pub server_streaming: bool,
    pub comments: Comments,
    pub http: Option<HttpRule>,
}

/// How a field is laid out on the wire, from the generator's point of view.
#[derive(Debug, Clone, Copy)]
pub enum FieldShape<'g> {
    Singular,
    Repeated,
    Map { key: &'g Field, value: &'g Field },
}

#[derive(Debug, Clone, Default)]
pub struct SchemaGraph {
    packages: Vec<Package>,
    files: Vec<File>,
    messages: Vec<Message>,
    enums: Vec<Enum>,
    services: Vec<Service>,
    types_by_name: HashMap<String, TypeId>,
}

impl SchemaGraph {
    /// Load a descriptor set (or plugin request) rendered as JSON.
    ///
    /// Build targets are, in order of precedence: the request's
    /// `fileToGenerate`, then `targets`, then every file in the set.
    pub fn from_descriptor_json(text: &str, targets: &[String]) -> Result<Self, SchemaError> {
        let input: DescriptorInputJson = serde_json::from_str(text)?;
        Self::from_descriptor_input(input, targets)
    }

    pub fn from_descriptor_input(
        input: DescriptorInputJson,
        targets: &[String],
    ) -> Result<Self, SchemaError> {
        let (files, file_to_generate) = input.into_files();
        let requested: BTreeSet<String> = if !file_to_generate.is_empty() {
            file_to_generate.into_iter().collect()
        } else {
            targets.iter().cloned().collect()
        };

        let known: BTreeSet<&str> = files.iter().filter_map(|f| f.name.as_deref()).collect();
        if let Some(missing) = requested.iter().find(|t| !known.contains(t.as_str())) {
            return Err(SchemaError::UnknownTarget(missing.clone()));
        }

        let mut loader = Loader::default();
        for file in &files {
            let file_name = file.name.clone().unwrap_or_else(|| "<unknown>".to_string());
            let build_target = requested.is_empty() || requested.contains(&file_name);
            loader.add_file(file, file_name, build_target)?;
        }
        for (idx, file) in files.iter().enumerate() {
            loader.add_services(FileId(idx), file)?;
        }
        loader.resolve_fields()?;

        let graph = loader.finish();
        tracing::debug!(
            files = graph.files.len(),
            messages = graph.messages.len(),
            enums = graph.enums.len(),
            services = graph.services.len(),
            "loaded schema graph"
        );
        Ok(graph)
    }

    /// Packages in ascending name order.
    pub fn packages(&self) -> &[Package] {
        &self.packages
    }

    pub fn files(&self) -> &[File] {
        &self.files
    }

    pub fn file(&self, id: FileId) -> &File {
        &self.files[id.0]
    }

    pub fn message(&self, id: MessageId) -> &Message {
        &self.messages[id.0]
    }

    pub fn enum_type(&self, id: EnumId) -> &Enum {
        &self.enums[id.0]
    }

    pub fn service(&self, id: ServiceId) -> &Service {
        &self.services[id.0]
    }

    /// Look up a message or enum by fully-qualified name (with or without
    /// the leading dot).
    pub fn lookup(&self, full_name: &str) -> Option<TypeId> {
        if full_name.starts_with('.') {
            self.types_by_name.get(full_name).copied()
        } else {
            self.types_by_name.get(&format!(".{full_name}")).copied()
        }
    }

    pub fn package_of(&self, file: FileId) -> &str {
        &self.file(file).package
    }

    /// Every enum of a file: file-level first, then those nested in
    /// messages (depth-first, declaration order).
    pub fn all_enums(&self, file: FileId) -> Vec<EnumId> {
        let file = self.file(file);
        let mut out = file.enums.clone();
        for &message in &file.messages {
            self.collect_nested_enums(message, &mut out);
        }
        out
    }

    fn collect_nested_enums(&self, id: MessageId, out: &mut Vec<EnumId>) {
        let message = self.message(id);
        out.extend(message.nested_enums.iter().copied());
        for &nested in &message.nested_messages {
            self.collect_nested_enums(nested, out);
        }
    }

    /// Every message of a file, each followed by its nested messages
    /// (depth-first, declaration order). Map entries are included.
    pub fn all_messages(&self, file: FileId) -> Vec<MessageId> {
        let mut out = Vec::new();
        for &message in &self.file(file).messages {
            self.collect_messages(message, &mut out);
        }
        out
    }

    fn collect_messages(&self, id: MessageId, out: &mut Vec<MessageId>) {
        out.push(id);
        for &nested in &self.message(id).nested_messages {
            self.collect_messages(nested, out);
        }
    }

    /// Singular / repeated / map classification of a field.
    pub fn field_shape<'g>(&'g self, field: &'g Field) -> FieldShape<'g> {
        if field.label != Label::Repeated {
            return FieldShape::Singular;
        }
        if let Some(TypeId::Message(id)) = field.type_ref {
            let entry = self.message(id);
            if entry.map_entry {
                if let [key, value] = entry.fields.as_slice() {
                    return FieldShape::Map { key, value };
                }
            }
        }
        FieldShape::Repeated
    }
}

// =============================================================================
// Loading
// =============================================================================

type CommentIndex = HashMap<Vec<i32>, Comments>;

#[derive(Default)]
struct Loader {
    graph: SchemaGraph,
    packages: BTreeMap<String, Vec<FileId>>,
    comment_indexes: Vec<CommentIndex>,
}

impl Loader {
    fn add_file(
        &mut self,
        file: &FileDescriptorProtoJson,
        file_name: String,
        build_target: bool,
    ) -> Result<(), SchemaError> {
        let file_id = FileId(self.graph.files.len());
        let package = file.package.clone().unwrap_or_default();
        self.packages
            .entry(package.clone())
            .or_default()
            .push(file_id);
        self.comment_indexes.push(index_comments(file));
        self.graph.files.push(File {
            name: file_name,
            package: package.clone(),
            build_target,
            enums: Vec::new(),
            messages: Vec::new(),
            services: Vec::new(),
        });

        let scope = qualify(".", &package);
        for (idx, e) in file.enum_type.iter().enumerate() {
            let id = self.add_enum(file_id, &scope, e, vec![FILE_ENUM_TYPE, idx as i32]);
            self.graph.files[file_id.0].enums.push(id);
        }
        for (idx, m) in file.message_type.iter().enumerate() {
            let id = self.add_message(file_id, &scope, m, vec![FILE_MESSAGE_TYPE, idx as i32])?;
            self.graph.files[file_id.0].messages.push(id);
        }
        Ok(())
    }

    fn comments(&self, file: FileId, path: &[i32]) -> Comments {
        self.comment_indexes[file.0]
            .get(path)
            .cloned()
            .unwrap_or_default()
    }

    fn add_enum(
        &mut self,
        file: FileId,
        scope: &str,
        e: &EnumDescriptorProtoJson,
        path: Vec<i32>,
    ) -> EnumId {
        let name = e.name.clone().unwrap_or_default();
        let full_name = qualify(scope, &name);
        let values = e
            .value
            .iter()
            .enumerate()
            .map(|(idx, v)| EnumValue {
                name: v.name.clone().unwrap_or_default(),
                number: v.number.unwrap_or_default(),
                comments: self.comments(file, &[path.clone(), vec![ENUM_VALUE, idx as i32]].concat()),
            })
            .collect();

        let id = EnumId(self.graph.enums.len());
        self.graph
            .types_by_name
            .insert(full_name.clone(), TypeId::Enum(id));
        self.graph.enums.push(Enum {
            name,
            full_name,
            file,
            comments: self.comments(file, &path),
            values,
        });
        id
    }

    fn add_message(
        &mut self,
        file: FileId,
        scope: &str,
        m: &DescriptorProtoJson,
        path: Vec<i32>,
    ) -> Result<MessageId, SchemaError> {
        let name = m.name.clone().unwrap_or_default();
        let full_name = qualify(scope, &name);
        let file_name = self.graph.files[file.0].name.clone();

        let mut fields = Vec::with_capacity(m.field.len());
        for (idx, f) in m.field.iter().enumerate() {
            let field_path = [path.clone(), vec![MESSAGE_FIELD, idx as i32]].concat();
            fields.push(self.build_field(file, &file_name, &full_name, f, &field_path)?);
        }

        let oneofs = m
            .oneof_decl
            .iter()
            .enumerate()
            .map(|(idx, o)| {
                let members: Vec<usize> = fields
                    .iter()
                    .enumerate()
                    .filter(|(_, f)| f.oneof_index == Some(idx))
                    .map(|(i, _)| i)
                    .collect();
                let synthetic = members.len() == 1 && fields[members[0]].proto3_optional;
                OneOf {
                    name: o.name.clone().unwrap_or_default(),
                    comments: self
                        .comments(file, &[path.clone(), vec![MESSAGE_ONEOF_DECL, idx as i32]].concat()),
                    fields: members,
                    synthetic,
                }
            })
            .collect();

        // Reserve the id before recursing so parents precede their children.
        let id = MessageId(self.graph.messages.len());
        self.graph
            .types_by_name
            .insert(full_name.clone(), TypeId::Message(id));
        self.graph.messages.push(Message {
            name,
            full_name: full_name.clone(),
            file,
            comments: self.comments(file, &path),
            fields,
            oneofs,
            nested_messages: Vec::new(),
            nested_enums: Vec::new(),
            map_entry: m.is_map_entry(),
            well_known: WellKnownType::from_full_name(&full_name),
        });

        for (idx, e) in m.enum_type.iter().enumerate() {
            let enum_path = [path.clone(), vec![MESSAGE_ENUM_TYPE, idx as i32]].concat();
            let nested = self.add_enum(file, &full_name, e, enum_path);
            self.graph.messages[id.0].nested_enums.push(nested);
        }
        for (idx, nested) in m.nested_type.iter().enumerate() {
            let nested_path = [path.clone(), vec![MESSAGE_NESTED_TYPE, idx as i32]].concat();
            let nested = self.add_message(file, &full_name, nested, nested_path)?;
            self.graph.messages[id.0].nested_messages.push(nested);
        }
        Ok(id)
    }

    fn build_field(
        &self,
        file: FileId,
        file_name: &str,
        message_full_name: &str,
        f: &FieldDescriptorProtoJson,
        path: &[i32],
    ) -> Result<Field, SchemaError> {
        let name = f.name.clone().unwrap_or_default();
        let full_name = qualify(message_full_name, &name);

        let type_str = f.typ.clone().unwrap_or_default();
        let wire_type = type_str
            .parse::<WireType>()
            .map_err(|_| SchemaError::UnknownWireType {
                file: file_name.to_string(),
                field: full_name.clone(),
                type_name: type_str.clone(),
            })?;

        let label = match f.label.as_deref() {
            Some("LABEL_REPEATED") => Label::Repeated,
            Some("LABEL_REQUIRED") => Label::Required,
            _ => Label::Optional,
        };

        let constraints = extension::<FieldConstraints>(
            f.options.as_ref(),
            VALIDATE_RULES_KEY,
            "validate.rules",
            &full_name,
        )?;

        Ok(Field {
            name,
            full_name,
            number: f.number.unwrap_or_default(),
            label,
            wire_type,
            type_name: f.type_name.clone(),
            type_ref: None,
            oneof_index: f.oneof_index.map(|i| i as usize),
            proto3_optional: f.proto3_optional,
            comments: self.comments(file, path),
            constraints,
        })
    }

    fn add_services(
        &mut self,
        file: FileId,
        src: &FileDescriptorProtoJson,
    ) -> Result<(), SchemaError> {
        let scope = qualify(".", &self.graph.files[file.0].package);
        for (svc_idx, svc) in src.service.iter().enumerate() {
            let svc_path = vec![FILE_SERVICE, svc_idx as i32];
            let name = svc.name.clone().unwrap_or_default();
            let full_name = qualify(&scope, &name);

            let mut methods = Vec::with_capacity(svc.method.len());
            for (method_idx, m) in svc.method.iter().enumerate() {
                let method_name = m.name.clone().unwrap_or_default();
                let method_full_name = qualify(&full_name, &method_name);
                let input = self.resolve_message(&method_full_name, m.input_type.as_deref())?;
                let output = self.resolve_message(&method_full_name, m.output_type.as_deref())?;
                let http = extension::<HttpRule>(
                    m.options.as_ref(),
                    GOOGLE_API_HTTP_KEY,
                    "google.api.http",
                    &method_full_name,
                )?;
                let method_path = [svc_path.clone(), vec![SERVICE_METHOD, method_idx as i32]].concat();
                methods.push(Method {
                    name: method_name,
                    full_name: method_full_name,
                    input,
                    output,
                    client_streaming: m.client_streaming,
                    server_streaming: m.server_streaming,
                    comments: self.comments(file, &method_path),
                    http,
                });
            }

            let id = ServiceId(self.graph.services.len());
            self.graph.services.push(Service {
                name,
                full_name,
                file,
                comments: self.comments(file, &svc_path),
                methods,
            });
            self.graph.files[file.0].services.push(id);
        }
        Ok(())
    }

    fn resolve_message(
        &self,
        referrer: &str,
        type_name: Option<&str>,
    ) -> Result<MessageId, SchemaError> {
        let type_name = type_name.unwrap_or_default();
        match self.graph.lookup(type_name) {
            Some(TypeId::Message(id)) => Ok(id),
            Some(TypeId::Enum(_)) => Err(SchemaError::NotAMessage {
                referrer: referrer.to_string(),
                type_name: type_name.to_string(),
            }),
            None => Err(SchemaError::UnresolvedType {
                referrer: referrer.to_string(),
                type_name: type_name.to_string(),
            }),
        }
    }

    fn resolve_fields(&mut self) -> Result<(), SchemaError> {
        let types_by_name = &self.graph.types_by_name;
        for message in &mut self.graph.messages {
            for field in &mut message.fields {
                let Some(type_name) = &field.type_name else {
                    continue;
                };
                let key = if type_name.starts_with('.') {
                    type_name.clone()
                } else {
                    format!(".{type_name}")
                };
                let resolved = types_by_name.get(&key).copied().ok_or_else(|| {
                    SchemaError::UnresolvedType {
                        referrer: field.full_name.clone(),
                        type_name: type_name.clone(),
                    }
                })?;
                field.type_ref = Some(resolved);
            }
        }
        Ok(())
    }

    fn finish(mut self) -> SchemaGraph {
        self.graph.packages = self
            .packages
            .into_iter()
            .map(|(name, files)| Package { name, files })
            .collect();
        self.graph
    }
}

fn index_comments(file: &FileDescriptorProtoJson) -> CommentIndex {
    let mut index = CommentIndex::new();
    if let Some(sci) = &file.source_code_info {
        for loc in &sci.location {
            let leading = loc.leading_comments.clone().unwrap_or_default();
            let trailing = loc.trailing_comments.clone().unwrap_or_default();
            if leading.is_empty() && trailing.is_empty() {
                continue;
            }
            index.insert(loc.path.clone(), Comments { leading, trailing });
        }
    }
    index
}

/// `qualify(".acme.v1", "Book")` → `.acme.v1.Book`; the root scope is `.`.
fn qualify(scope: &str, name: &str) -> String {
    if name.is_empty() {
        scope.to_string()
    } else if scope == "." {
        format!(".{name}")
    } else {
        format!("{scope}.{name}")
    }
}

fn extension<T: DeserializeOwned>(
    options: Option<&descriptor::OptionsJson>,
    key: &str,
    extension: &'static str,
    entity: &str,
) -> Result<Option<T>, SchemaError> {
    let Some(value) = options.and_then(|opts| opts.get(key)) else {
        return Ok(None);
    };
    if matches!(value, Value::Null) {
        return Ok(None);
    }
    serde_json::from_value(value.clone())
        .map(Some)
        .map_err(|source| SchemaError::Extension {
            extension,
            entity: entity.to_string(),
            source,
        })
}
