//! Schema walk: packages → build-target files → enums, messages, services.

use crate::encode::{encode, Encoder};
use crate::error::{EncodeError, GenerateError};
use crate::model::{build_enum, build_message, build_service};
use protodata_schema::{FileId, SchemaGraph};
use serde::Serialize;
use std::collections::HashMap;
use std::fmt;
use std::path::{Path, PathBuf};

#[derive(Debug, Clone)]
pub struct GenerateOptions {
    /// First path segment of every artifact.
    pub root: String,
}

impl Default for GenerateOptions {
    fn default() -> Self {
        GenerateOptions {
            root: "api".to_string(),
        }
    }
}

/// One emitted data file, path relative to the output directory.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Artifact {
    pub path: PathBuf,
    pub content: String,
}

/// An entity that could not be encoded.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Diagnostic {
    pub entity: String,
    pub message: String,
}

impl fmt::Display for Diagnostic {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{}: {}", self.entity, self.message)
    }
}

#[derive(Debug, Clone, Default)]
pub struct GenerationOutput {
    pub artifacts: Vec<Artifact>,
    pub diagnostics: Vec<Diagnostic>,
}

impl GenerationOutput {
    pub fn artifact(&self, path: impl AsRef<Path>) -> Option<&Artifact> {
        let path = path.as_ref();
        self.artifacts.iter().find(|a| a.path == path)
    }
}

#[derive(Debug, Clone, Copy)]
enum Kind {
    Enums,
    Messages,
    Services,
}

impl Kind {
    fn dir(self) -> &'static str {
        match self {
            Kind::Enums => "enums",
            Kind::Messages => "messages",
            Kind::Services => "services",
        }
    }
}

/// State threaded through one run.
pub struct GenerationContext<'a> {
    graph: &'a SchemaGraph,
    encoder: &'a dyn Encoder,
    options: &'a GenerateOptions,
    artifacts: Vec<Artifact>,
    by_path: HashMap<PathBuf, usize>,
    diagnostics: Vec<Diagnostic>,
}

impl<'a> GenerationContext<'a> {
    pub fn new(
        graph: &'a SchemaGraph,
        encoder: &'a dyn Encoder,
        options: &'a GenerateOptions,
    ) -> Self {
        GenerationContext {
            graph,
            encoder,
            options,
            artifacts: Vec::new(),
            by_path: HashMap::new(),
            diagnostics: Vec::new(),
        }
    }

    pub fn run(mut self) -> Result<GenerationOutput, GenerateError> {
        let graph = self.graph;
        for package in graph.packages() {
            for &file in &package.files {
                if graph.file(file).build_target {
                    self.generate_file(file)?;
                }
            }
        }
        tracing::info!(
            artifacts = self.artifacts.len(),
            diagnostics = self.diagnostics.len(),
            "generation finished"
        );
        Ok(GenerationOutput {
            artifacts: self.artifacts,
            diagnostics: self.diagnostics,
        })
    }

    fn generate_file(&mut self, file: FileId) -> Result<(), GenerateError> {
        let graph = self.graph;
        let package = graph.package_of(file);
        tracing::debug!(file = %graph.file(file).name, "generating file");

        for id in graph.all_enums(file) {
            let src = graph.enum_type(id);
            let record = build_enum(graph, id);
            self.emit(package, Kind::Enums, &src.full_name, &record.entity.name, &record);
        }
        for id in graph.all_messages(file) {
            let src = graph.message(id);
            if src.map_entry {
                continue;
            }
            let record = build_message(graph, id)?;
            self.emit(package, Kind::Messages, &src.full_name, &record.entity.name, &record);
        }
        for &id in &graph.file(file).services {
            let src = graph.service(id);
            let record = build_service(graph, id);
            self.emit(package, Kind::Services, &src.full_name, &record.entity.name, &record);
        }
        Ok(())
    }

    fn emit<T: Serialize>(
        &mut self,
        package: &str,
        kind: Kind,
        full_name: &str,
        short_name: &str,
        record: &T,
    ) {
        match encode(self.encoder, record) {
            Ok(content) => {
                let path = self.artifact_path(package, kind, short_name);
                tracing::debug!(path = %path.display(), "artifact");
                self.store(Artifact { path, content });
            }
            Err(err) => self.record_failure(full_name, err),
        }
    }

    fn artifact_path(&self, package: &str, kind: Kind, short_name: &str) -> PathBuf {
        let file_name = format!("{short_name}.{}", self.encoder.file_extension());
        [self.options.root.as_str(), package, kind.dir(), file_name.as_str()]
            .into_iter()
            .filter(|segment| !segment.is_empty())
            .collect()
    }

    /// A later artifact at the same path replaces the earlier one in place.
    fn store(&mut self, artifact: Artifact) {
        match self.by_path.get(&artifact.path) {
            Some(&idx) => self.artifacts[idx] = artifact,
            None => {
                self.by_path
                    .insert(artifact.path.clone(), self.artifacts.len());
                self.artifacts.push(artifact);
            }
        }
    }

    fn record_failure(&mut self, entity: &str, err: EncodeError) {
        tracing::warn!(entity, error = %err, "failed to encode entity");
        self.diagnostics.push(Diagnostic {
            entity: entity.to_string(),
            message: err.to_string(),
        });
    }
}

/// Generate one artifact per enum, message and service of every build-target
/// file.
///
/// Encoding failures are collected as diagnostics; schema invariant
/// violations abort the run.
pub fn generate(
    graph: &SchemaGraph,
    encoder: &dyn Encoder,
    options: &GenerateOptions,
) -> Result<GenerationOutput, GenerateError> {
    GenerationContext::new(graph, encoder, options).run()
}
