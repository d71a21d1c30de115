//! Output encoders.
//!
//! Records are first serialized into a [`Node`] tree, which keeps every map
//! in serialization order and keeps raw bytes distinct from sequences. Each
//! encoder then renders the tree with its own byte convention:
//!
//! - JSON: two-space indentation, bytes as numeric arrays
//! - YAML: block style, bytes as base64 strings

use crate::error::EncodeError;
use base64::{engine::general_purpose::STANDARD as BASE64, Engine};
use serde::ser::{self, Serialize, SerializeMap, SerializeSeq, Serializer};

/// Format-neutral document.
#[derive(Debug, Clone, PartialEq)]
pub enum Node {
    Null,
    Bool(bool),
    I64(i64),
    U64(u64),
    F32(f32),
    F64(f64),
    String(String),
    Bytes(Vec<u8>),
    Seq(Vec<Node>),
    Map(Vec<(String, Node)>),
}

impl Node {
    /// Value stored under `key`, if this is a map.
    pub fn get(&self, key: &str) -> Option<&Node> {
        match self {
            Node::Map(entries) => entries.iter().find(|(k, _)| k == key).map(|(_, v)| v),
            _ => None,
        }
    }

    pub fn keys(&self) -> Vec<&str> {
        match self {
            Node::Map(entries) => entries.iter().map(|(k, _)| k.as_str()).collect(),
            _ => Vec::new(),
        }
    }

    fn kind(&self) -> &'static str {
        match self {
            Node::Null => "null",
            Node::Bool(_) => "bool",
            Node::I64(_) | Node::U64(_) => "integer",
            Node::F32(_) | Node::F64(_) => "float",
            Node::String(_) => "string",
            Node::Bytes(_) => "bytes",
            Node::Seq(_) => "sequence",
            Node::Map(_) => "map",
        }
    }
}

/// Serialize any value into a [`Node`].
pub fn to_node<T: Serialize + ?Sized>(value: &T) -> Result<Node, EncodeError> {
    value.serialize(NodeSerializer)
}

/// Encoder selected by the entry point.
pub trait Encoder {
    fn file_extension(&self) -> &'static str;

    fn encode_document(&self, document: &Node) -> Result<String, EncodeError>;
}

/// Serialize `value` and render it with `encoder`.
pub fn encode<T: Serialize + ?Sized>(
    encoder: &dyn Encoder,
    value: &T,
) -> Result<String, EncodeError> {
    let document = to_node(value)?;
    encoder.encode_document(&document)
}

#[derive(Debug, Clone, Copy, Default)]
pub struct JsonEncoder;

impl Encoder for JsonEncoder {
    fn file_extension(&self) -> &'static str {
        "json"
    }

    fn encode_document(&self, document: &Node) -> Result<String, EncodeError> {
        let rendered = Rendered {
            node: document,
            bytes: ByteStyle::NumericArray,
        };
        Ok(serde_json::to_string_pretty(&rendered)?)
    }
}

#[derive(Debug, Clone, Copy, Default)]
pub struct YamlEncoder;

impl Encoder for YamlEncoder {
    fn file_extension(&self) -> &'static str {
        "yml"
    }

    fn encode_document(&self, document: &Node) -> Result<String, EncodeError> {
        let rendered = Rendered {
            node: document,
            bytes: ByteStyle::Base64,
        };
        Ok(serde_yaml::to_string(&rendered)?)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum OutputFormat {
    Json,
    Yaml,
}

impl OutputFormat {
    pub fn encoder(self) -> Box<dyn Encoder> {
        match self {
            OutputFormat::Json => Box::new(JsonEncoder),
            OutputFormat::Yaml => Box::new(YamlEncoder),
        }
    }
}

// =============================================================================
// Rendering
// =============================================================================

#[derive(Debug, Clone, Copy)]
enum ByteStyle {
    NumericArray,
    Base64,
}

struct Rendered<'a> {
    node: &'a Node,
    bytes: ByteStyle,
}

impl<'a> Rendered<'a> {
    fn child(&self, node: &'a Node) -> Rendered<'a> {
        Rendered {
            node,
            bytes: self.bytes,
        }
    }
}

impl Serialize for Rendered<'_> {
    fn serialize<S: Serializer>(&self, serializer: S) -> Result<S::Ok, S::Error> {
        match self.node {
            Node::Null => serializer.serialize_unit(),
            Node::Bool(v) => serializer.serialize_bool(*v),
            Node::I64(v) => serializer.serialize_i64(*v),
            Node::U64(v) => serializer.serialize_u64(*v),
            Node::F32(v) => serializer.serialize_f32(*v),
            Node::F64(v) => serializer.serialize_f64(*v),
            Node::String(v) => serializer.serialize_str(v),
            Node::Bytes(bytes) => match self.bytes {
                ByteStyle::NumericArray => serializer.collect_seq(bytes),
                ByteStyle::Base64 => serializer.serialize_str(&BASE64.encode(bytes)),
            },
            Node::Seq(items) => {
                let mut seq = serializer.serialize_seq(Some(items.len()))?;
                for item in items {
                    seq.serialize_element(&self.child(item))?;
                }
                seq.end()
            }
            Node::Map(entries) => {
                let mut map = serializer.serialize_map(Some(entries.len()))?;
                for (key, value) in entries {
                    map.serialize_entry(key, &self.child(value))?;
                }
                map.end()
            }
        }
    }
}

// =============================================================================
// Node serializer
// =============================================================================

struct NodeSerializer;

impl Serializer for NodeSerializer {
    type Ok = Node;
    type Error = EncodeError;
    type SerializeSeq = SeqBuilder;
    type SerializeTuple = SeqBuilder;
    type SerializeTupleStruct = SeqBuilder;
    type SerializeTupleVariant = VariantBuilder<SeqBuilder>;
    type SerializeMap = MapBuilder;
    type SerializeStruct = MapBuilder;
    type SerializeStructVariant = VariantBuilder<MapBuilder>;

    fn serialize_bool(self, v: bool) -> Result<Node, EncodeError> {
        Ok(Node::Bool(v))
    }

    fn serialize_i8(self, v: i8) -> Result<Node, EncodeError> {
        Ok(Node::I64(v.into()))
    }

    fn serialize_i16(self, v: i16) -> Result<Node, EncodeError> {
        Ok(Node::I64(v.into()))
    }

    fn serialize_i32(self, v: i32) -> Result<Node, EncodeError> {
        Ok(Node::I64(v.into()))
    }

    fn serialize_i64(self, v: i64) -> Result<Node, EncodeError> {
        Ok(Node::I64(v))
    }

    fn serialize_u8(self, v: u8) -> Result<Node, EncodeError> {
        Ok(Node::U64(v.into()))
    }

    fn serialize_u16(self, v: u16) -> Result<Node, EncodeError> {
        Ok(Node::U64(v.into()))
    }

    fn serialize_u32(self, v: u32) -> Result<Node, EncodeError> {
        Ok(Node::U64(v.into()))
    }

    fn serialize_u64(self, v: u64) -> Result<Node, EncodeError> {
        Ok(Node::U64(v))
    }

    fn serialize_f32(self, v: f32) -> Result<Node, EncodeError> {
        Ok(Node::F32(v))
    }

    fn serialize_f64(self, v: f64) -> Result<Node, EncodeError> {
        Ok(Node::F64(v))
    }

    fn serialize_char(self, v: char) -> Result<Node, EncodeError> {
        Ok(Node::String(v.to_string()))
    }

    fn serialize_str(self, v: &str) -> Result<Node, EncodeError> {
        Ok(Node::String(v.to_string()))
    }

    fn serialize_bytes(self, v: &[u8]) -> Result<Node, EncodeError> {
        Ok(Node::Bytes(v.to_vec()))
    }

    fn serialize_none(self) -> Result<Node, EncodeError> {
        Ok(Node::Null)
    }

    fn serialize_some<T: ?Sized + Serialize>(self, value: &T) -> Result<Node, EncodeError> {
        value.serialize(self)
    }

    fn serialize_unit(self) -> Result<Node, EncodeError> {
        Ok(Node::Null)
    }

    fn serialize_unit_struct(self, _name: &'static str) -> Result<Node, EncodeError> {
        Ok(Node::Null)
    }

    fn serialize_unit_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
    ) -> Result<Node, EncodeError> {
        Ok(Node::String(variant.to_string()))
    }

    fn serialize_newtype_struct<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        value: &T,
    ) -> Result<Node, EncodeError> {
        value.serialize(self)
    }

    fn serialize_newtype_variant<T: ?Sized + Serialize>(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        value: &T,
    ) -> Result<Node, EncodeError> {
        Ok(Node::Map(vec![(variant.to_string(), to_node(value)?)]))
    }

    fn serialize_seq(self, len: Option<usize>) -> Result<SeqBuilder, EncodeError> {
        Ok(SeqBuilder::with_capacity(len))
    }

    fn serialize_tuple(self, len: usize) -> Result<SeqBuilder, EncodeError> {
        Ok(SeqBuilder::with_capacity(Some(len)))
    }

    fn serialize_tuple_struct(
        self,
        _name: &'static str,
        len: usize,
    ) -> Result<SeqBuilder, EncodeError> {
        Ok(SeqBuilder::with_capacity(Some(len)))
    }

    fn serialize_tuple_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<SeqBuilder>, EncodeError> {
        Ok(VariantBuilder {
            variant,
            inner: SeqBuilder::with_capacity(Some(len)),
        })
    }

    fn serialize_map(self, len: Option<usize>) -> Result<MapBuilder, EncodeError> {
        Ok(MapBuilder::with_capacity(len))
    }

    fn serialize_struct(self, _name: &'static str, len: usize) -> Result<MapBuilder, EncodeError> {
        Ok(MapBuilder::with_capacity(Some(len)))
    }

    fn serialize_struct_variant(
        self,
        _name: &'static str,
        _index: u32,
        variant: &'static str,
        len: usize,
    ) -> Result<VariantBuilder<MapBuilder>, EncodeError> {
        Ok(VariantBuilder {
            variant,
            inner: MapBuilder::with_capacity(Some(len)),
        })
    }
}

struct SeqBuilder {
    items: Vec<Node>,
}

impl SeqBuilder {
    fn with_capacity(len: Option<usize>) -> Self {
        SeqBuilder {
            items: Vec::with_capacity(len.unwrap_or_default()),
        }
    }

    fn push<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.items.push(to_node(value)?);
        Ok(())
    }
}

impl ser::SerializeSeq for SeqBuilder {
    type Ok = Node;
    type Error = EncodeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Node, EncodeError> {
        Ok(Node::Seq(self.items))
    }
}

impl ser::SerializeTuple for SeqBuilder {
    type Ok = Node;
    type Error = EncodeError;

    fn serialize_element<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Node, EncodeError> {
        Ok(Node::Seq(self.items))
    }
}

impl ser::SerializeTupleStruct for SeqBuilder {
    type Ok = Node;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.push(value)
    }

    fn end(self) -> Result<Node, EncodeError> {
        Ok(Node::Seq(self.items))
    }
}

struct MapBuilder {
    entries: Vec<(String, Node)>,
    pending_key: Option<String>,
}

impl MapBuilder {
    fn with_capacity(len: Option<usize>) -> Self {
        MapBuilder {
            entries: Vec::with_capacity(len.unwrap_or_default()),
            pending_key: None,
        }
    }
}

impl ser::SerializeMap for MapBuilder {
    type Ok = Node;
    type Error = EncodeError;

    fn serialize_key<T: ?Sized + Serialize>(&mut self, key: &T) -> Result<(), EncodeError> {
        match to_node(key)? {
            Node::String(key) => {
                self.pending_key = Some(key);
                Ok(())
            }
            other => Err(EncodeError::NonStringKey(other.kind())),
        }
    }

    fn serialize_value<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        let key = self
            .pending_key
            .take()
            .ok_or_else(|| EncodeError::Custom("map value serialized before its key".into()))?;
        self.entries.push((key, to_node(value)?));
        Ok(())
    }

    fn end(self) -> Result<Node, EncodeError> {
        Ok(Node::Map(self.entries))
    }
}

impl ser::SerializeStruct for MapBuilder {
    type Ok = Node;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        self.entries.push((key.to_string(), to_node(value)?));
        Ok(())
    }

    fn end(self) -> Result<Node, EncodeError> {
        Ok(Node::Map(self.entries))
    }
}

/// `{ variant: inner }`, the externally tagged enum layout.
struct VariantBuilder<B> {
    variant: &'static str,
    inner: B,
}

impl ser::SerializeTupleVariant for VariantBuilder<SeqBuilder> {
    type Ok = Node;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(&mut self, value: &T) -> Result<(), EncodeError> {
        self.inner.push(value)
    }

    fn end(self) -> Result<Node, EncodeError> {
        Ok(Node::Map(vec![(
            self.variant.to_string(),
            Node::Seq(self.inner.items),
        )]))
    }
}

impl ser::SerializeStructVariant for VariantBuilder<MapBuilder> {
    type Ok = Node;
    type Error = EncodeError;

    fn serialize_field<T: ?Sized + Serialize>(
        &mut self,
        key: &'static str,
        value: &T,
    ) -> Result<(), EncodeError> {
        ser::SerializeStruct::serialize_field(&mut self.inner, key, value)
    }

    fn end(self) -> Result<Node, EncodeError> {
        Ok(Node::Map(vec![(
            self.variant.to_string(),
            Node::Map(self.inner.entries),
        )]))
    }
}
