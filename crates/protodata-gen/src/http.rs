//! `google.api.http` → flat list of bindings.

use protodata_schema::{HttpPattern, HttpRule, Message, Method, SchemaGraph};
use serde::Serialize;

/// One HTTP binding of a method.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct HttpBinding {
    pub method: String,
    pub path: String,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub input_message: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub output_message: Option<String>,
}

/// All bindings of `method`: the primary rule first, then each additional
/// binding depth-first in declaration order.
pub fn http_bindings(graph: &SchemaGraph, method: &Method) -> Vec<HttpBinding> {
    let mut out = Vec::new();
    if let Some(rule) = &method.http {
        let input = graph.message(method.input);
        let output = graph.message(method.output);
        flatten(rule, input, output, &mut out);
    }
    out
}

fn flatten(rule: &HttpRule, input: &Message, output: &Message, out: &mut Vec<HttpBinding>) {
    let mut binding = HttpBinding::default();

    if let Some(selector) = body_selector(&rule.body) {
        binding.input = Some(selector.to_string());
        binding.input_message = field_full_name(input, selector);
    }
    if let Some(selector) = body_selector(&rule.response_body) {
        binding.output = Some(selector.to_string());
        binding.output_message = field_full_name(output, selector);
    }

    // A rule without a pattern still yields a binding, with empty verb/path.
    if let Some(pattern) = &rule.pattern {
        let (verb, path) = match pattern {
            HttpPattern::Get(path) => ("GET", path),
            HttpPattern::Put(path) => ("PUT", path),
            HttpPattern::Post(path) => ("POST", path),
            HttpPattern::Delete(path) => ("DELETE", path),
            HttpPattern::Patch(path) => ("PATCH", path),
            HttpPattern::Custom(custom) => (custom.kind.as_str(), &custom.path),
        };
        binding.method = verb.to_string();
        binding.path = path.clone();
    }
    out.push(binding);

    for additional in &rule.additional_bindings {
        flatten(additional, input, output, out);
    }
}

/// `""` and `"*"` do not name a field.
fn body_selector(selector: &str) -> Option<&str> {
    match selector {
        "" | "*" => None,
        other => Some(other),
    }
}

/// Direct fields only; nested paths such as `book.title` never match.
fn field_full_name(message: &Message, name: &str) -> Option<String> {
    message
        .fields
        .iter()
        .find(|field| field.name == name)
        .map(|field| field.full_name.clone())
}
