//! Data-file generation from a resolved protobuf schema graph.
//!
//! For every build-target file we emit one document per enum, message and
//! service:
//!
//! ```text
//! api/<package>/enums/<Name>.<ext>
//! api/<package>/messages/<Name>.<ext>
//! api/<package>/services/<Name>.<ext>
//! ```
//!
//! Documents describe the schema only: field types and zero values,
//! `validate.rules` constraints flattened into one record per field (and per
//! container element), and `google.api.http` bindings per method. Nothing is
//! written to disk here; callers receive `(path, content)` pairs and decide
//! what to do with them.

pub mod encode;
pub mod entity;
pub mod error;
pub mod generate;
pub mod http;
pub mod model;
pub mod ordered;
pub mod rules;
pub mod types;
pub mod value;

pub use encode::{Encoder, JsonEncoder, Node, OutputFormat, YamlEncoder};
pub use entity::{clean_comment, short_name, Entity, Reference};
pub use error::{EncodeError, GenerateError};
pub use generate::{
    generate, Artifact, Diagnostic, GenerateOptions, GenerationContext, GenerationOutput,
};
pub use http::HttpBinding;
pub use ordered::MapSlice;
pub use rules::FieldRules;
pub use types::{FieldType, FieldTypeElem};
pub use value::{Bytes, FieldDefault, ScalarValue};
