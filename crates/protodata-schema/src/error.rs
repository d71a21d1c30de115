use thiserror::Error;

/// Errors raised while turning a descriptor rendering into a [`crate::SchemaGraph`].
#[derive(Debug, Error)]
pub enum SchemaError {
    #[error("failed to parse descriptor JSON: {0}")]
    Json(#[from] serde_json::Error),

    #[error("file `{file}` declares field `{field}` with unknown type `{type_name}`")]
    UnknownWireType {
        file: String,
        field: String,
        type_name: String,
    },

    #[error("`{referrer}` references `{type_name}`, which is not declared in the descriptor set")]
    UnresolvedType { referrer: String, type_name: String },

    #[error("`{referrer}` expects `{type_name}` to be a message")]
    NotAMessage { referrer: String, type_name: String },

    #[error("invalid `{extension}` value on `{entity}`: {source}")]
    Extension {
        extension: &'static str,
        entity: String,
        #[source]
        source: serde_json::Error,
    },

    #[error("requested target `{0}` is not part of the descriptor set")]
    UnknownTarget(String),
}
