//! Protobuf schema graph (descriptor set JSON → typed, resolved graph).
//!
//! This crate is intentionally **descriptor-driven**, like the rest of the
//! toolchain:
//!
//! - `buf build --as-file-descriptor-set -o descriptor.json` renders a
//!   `google.protobuf.FileDescriptorSet` as JSON
//! - a `CodeGeneratorRequest` rendered as JSON (`fileToGenerate` +
//!   `protoFile`) is accepted as well
//! - we resolve type references into an arena of files, enums, messages and
//!   services
//!
//! Custom options are rendered by Buf under bracketed extension keys:
//!
//! ```json
//! { "[validate.rules]": { "string": { "minLen": "1" } } }
//! { "[google.api.http]": { "get": "/v1/{name=books/*}" } }
//! ```
//!
//! The two conventions we understand are decoded into typed values
//! ([`validate::FieldConstraints`] and [`annotations::HttpRule`]); every other
//! extension is ignored.

pub mod annotations;
pub mod descriptor;
pub mod error;
pub mod graph;
pub mod validate;

pub use annotations::{CustomHttpPattern, HttpPattern, HttpRule};
pub use error::SchemaError;
pub use graph::{
    Comments, Enum, EnumId, EnumValue, Field, FieldShape, File, FileId, Label, Message, MessageId,
    Method, OneOf, Package, SchemaGraph, Service, ServiceId, TypeId, WellKnownType, WireType,
};
pub use validate::{FieldConstraints, TypeRules};
