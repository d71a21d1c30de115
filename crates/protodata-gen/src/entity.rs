//! Names, references and doc comments shared by every emitted record.

use protodata_schema::{Comments, EnumId, FileId, MessageId, SchemaGraph};
use serde::Serialize;

/// `{name, comment}` header of every record.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Entity {
    pub name: String,
    #[serde(skip_serializing_if = "String::is_empty")]
    pub comment: String,
}

impl Entity {
    pub fn new(name: impl Into<String>, comments: &Comments) -> Self {
        Entity {
            name: name.into(),
            comment: pick_comment(comments),
        }
    }
}

/// Pointer to an enum or message, possibly in another package.
///
/// `package` is only set when the target lives outside the build targets,
/// i.e. when the reader will not find its data file next to this one.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
pub struct Reference {
    #[serde(skip_serializing_if = "Option::is_none")]
    pub package: Option<String>,
    pub name: String,
}

impl Reference {
    pub fn to_message(graph: &SchemaGraph, id: MessageId) -> Self {
        let message = graph.message(id);
        Self::new(graph, &message.full_name, message.file)
    }

    pub fn to_enum(graph: &SchemaGraph, id: EnumId) -> Self {
        let e = graph.enum_type(id);
        Self::new(graph, &e.full_name, e.file)
    }

    fn new(graph: &SchemaGraph, full_name: &str, file: FileId) -> Self {
        let package = graph.package_of(file);
        Reference {
            package: (!graph.file(file).build_target).then(|| package.to_string()),
            name: short_name(full_name, package),
        }
    }
}

/// Package-relative name: `.acme.v1.Book.Author` in `acme.v1` → `Book.Author`.
///
/// Names outside `package` are returned unchanged; in the root package only
/// the leading dot goes.
pub fn short_name(full_name: &str, package: &str) -> String {
    if package.is_empty() {
        return full_name.strip_prefix('.').unwrap_or(full_name).to_string();
    }
    full_name
        .strip_prefix('.')
        .and_then(|rest| rest.strip_prefix(package))
        .and_then(|rest| rest.strip_prefix('.'))
        .unwrap_or(full_name)
        .to_string()
}

/// Leading comment if there is one, trailing otherwise; cleaned.
pub fn pick_comment(comments: &Comments) -> String {
    if comments.leading.is_empty() {
        clean_comment(&comments.trailing)
    } else {
        clean_comment(&comments.leading)
    }
}

/// Undo the conventional `// text` spacing.
///
/// If every non-empty line starts with a space, exactly one space is removed
/// from each line; otherwise the text is kept as is. Trailing whitespace is
/// always trimmed.
pub fn clean_comment(text: &str) -> String {
    let indented = text
        .split('\n')
        .filter(|line| !line.is_empty())
        .all(|line| line.starts_with(' '));
    if !indented {
        return text.trim_end().to_string();
    }
    text.split('\n')
        .map(|line| line.strip_prefix(' ').unwrap_or(line))
        .collect::<Vec<_>>()
        .join("\n")
        .trim_end()
        .to_string()
}
