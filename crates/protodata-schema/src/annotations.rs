//! `google.api.http` method annotation.

use serde::Deserialize;

/// Decoded `(google.api.http)` option.
///
/// `pattern` is `None` when the annotation carries no verb at all; callers
/// still get the body selectors and additional bindings.
#[derive(Debug, Clone, Default, PartialEq, Deserialize)]
#[serde(from = "RawHttpRule")]
pub struct HttpRule {
    pub pattern: Option<HttpPattern>,
    pub body: String,
    pub response_body: String,
    pub additional_bindings: Vec<HttpRule>,
}

#[derive(Debug, Clone, PartialEq)]
pub enum HttpPattern {
    Get(String),
    Put(String),
    Post(String),
    Delete(String),
    Patch(String),
    Custom(CustomHttpPattern),
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Deserialize)]
pub struct CustomHttpPattern {
    #[serde(default)]
    pub kind: String,
    #[serde(default)]
    pub path: String,
}

#[derive(Debug, Default, Deserialize)]
#[serde(rename_all = "camelCase")]
struct RawHttpRule {
    get: Option<String>,
    put: Option<String>,
    post: Option<String>,
    delete: Option<String>,
    patch: Option<String>,
    custom: Option<CustomHttpPattern>,
    #[serde(default)]
    body: String,
    #[serde(default)]
    response_body: String,
    #[serde(default)]
    additional_bindings: Vec<HttpRule>,
}

impl From<RawHttpRule> for HttpRule {
    fn from(raw: RawHttpRule) -> Self {
        // `pattern` is a oneof; a well-formed rendering sets at most one key.
        let pattern = raw
            .get
            .map(HttpPattern::Get)
            .or(raw.put.map(HttpPattern::Put))
            .or(raw.post.map(HttpPattern::Post))
            .or(raw.delete.map(HttpPattern::Delete))
            .or(raw.patch.map(HttpPattern::Patch))
            .or(raw.custom.map(HttpPattern::Custom));

        HttpRule {
            pattern,
            body: raw.body,
            response_body: raw.response_body,
            additional_bindings: raw.additional_bindings,
        }
    }
}
