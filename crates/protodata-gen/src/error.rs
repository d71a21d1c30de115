use protodata_schema::WireType;
use std::fmt::Display;
use thiserror::Error;

/// Violations of schema invariants. Any of these aborts the whole run.
#[derive(Debug, Error)]
pub enum GenerateError {
    #[error("field `{field}` has wire type {wire_type}, which has no data-file representation")]
    UnsupportedWireType { field: String, wire_type: WireType },

    #[error("field `{field}` is declared as {wire_type} but carries no resolved type reference")]
    MissingTypeReference { field: String, wire_type: WireType },

    #[error("enum `{0}` declares no values")]
    EmptyEnum(String),
}

/// Failure to render one entity. Recorded as a diagnostic; the run goes on.
#[derive(Debug, Error)]
pub enum EncodeError {
    #[error("{0}")]
    Custom(String),

    #[error("map keys must be strings, found {0}")]
    NonStringKey(&'static str),

    #[error("JSON encoding failed: {0}")]
    Json(#[from] serde_json::Error),

    #[error("YAML encoding failed: {0}")]
    Yaml(#[from] serde_yaml::Error),
}

impl serde::ser::Error for EncodeError {
    fn custom<T: Display>(msg: T) -> Self {
        EncodeError::Custom(msg.to_string())
    }
}
