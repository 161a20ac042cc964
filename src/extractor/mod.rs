// Chunk extraction
// Turns graph and ontology snapshots into text chunks ready for embedding


pub mod graph;
pub mod ontology;

use std::path::{Path, PathBuf};

use async_trait::async_trait;
use serde::Deserialize;
use tracing::debug;

use crate::index::{Payload, PayloadValue};
use crate::{RagError, Result};

pub use graph::{GraphNode, GraphRelationship, GraphSnapshot, graph_chunks};
pub use ontology::{
    DataAssertion, ObjectAssertion, OntologyClass, OntologyIndividual, OntologyObjectProperty,
    OntologySnapshot, ontology_chunks, ontology_summary,
};

/// Payload field naming where a chunk came from
pub const SOURCE_FIELD: &str = "source";

/// A unit of extracted knowledge: text plus provenance.
#[derive(Debug, Clone, PartialEq)]
pub struct Chunk {
    /// Positional key such as `graph_3` or `ontology_12`
    pub key: String,
    pub text: String,
    pub payload: Payload,
}

impl Chunk {
    pub(crate) fn new(key: String, text: String, source: &str) -> Self {
        let mut payload = Payload::new();
        payload.insert(SOURCE_FIELD.to_string(), PayloadValue::from(source));
        Self { key, text, payload }
    }

    pub(crate) fn with_field(mut self, name: &str, value: impl Into<PayloadValue>) -> Self {
        self.payload.insert(name.to_string(), value.into());
        self
    }
}

/// Shorten an IRI to its local name: `<http://ex.org/onto#Person>` -> `Person`.
#[inline]
pub fn short_name(iri: &str) -> &str {
    let trimmed = iri.trim();
    let trimmed = trimmed
        .strip_prefix('<')
        .and_then(|rest| rest.strip_suffix('>'))
        .unwrap_or(trimmed);

    let local = match trimmed.rfind('#') {
        Some(pos) => trimmed.get(pos + 1..),
        None => trimmed.rfind('/').and_then(|pos| trimmed.get(pos + 1..)),
    };

    match local {
        Some(name) if !name.is_empty() => name,
        _ => trimmed,
    }
}

/// Supplies the property graph to index and its schema description.
#[async_trait]
pub trait GraphSource: Send + Sync {
    async fn graph_schema(&self) -> Result<String>;

    async fn graph_snapshot(&self) -> Result<GraphSnapshot>;
}

#[async_trait]
pub trait OntologySource: Send + Sync {
    async fn ontology_snapshot(&self) -> Result<OntologySnapshot>;
}

#[derive(Debug, Deserialize)]
struct GraphDocument {
    #[serde(default)]
    schema: Option<String>,
    #[serde(flatten)]
    snapshot: GraphSnapshot,
}

/// Graph exported as JSON: `{"schema": "...", "nodes": [...], "relationships": [...]}`.
/// Without a `schema` field the schema is derived from the snapshot.
#[derive(Debug, Clone)]
pub struct JsonGraphFile {
    path: PathBuf,
}

impl JsonGraphFile {
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }

    async fn read(&self) -> Result<GraphDocument> {
        parse_json_file(&self.path).await
    }
}

#[async_trait]
impl GraphSource for JsonGraphFile {
    async fn graph_schema(&self) -> Result<String> {
        let document = self.read().await?;
        Ok(document
            .schema
            .unwrap_or_else(|| document.snapshot.schema_text()))
    }

    async fn graph_snapshot(&self) -> Result<GraphSnapshot> {
        Ok(self.read().await?.snapshot)
    }
}

/// Ontology exported as JSON in the [`OntologySnapshot`] shape
#[derive(Debug, Clone)]
pub struct JsonOntologyFile {
    path: PathBuf,
}

impl JsonOntologyFile {
    #[inline]
    pub fn new(path: impl Into<PathBuf>) -> Self {
        Self { path: path.into() }
    }
}

#[async_trait]
impl OntologySource for JsonOntologyFile {
    async fn ontology_snapshot(&self) -> Result<OntologySnapshot> {
        parse_json_file(&self.path).await
    }
}

async fn parse_json_file<T: serde::de::DeserializeOwned>(path: &Path) -> Result<T> {
    debug!("Reading {}", path.display());
    let content = tokio::fs::read_to_string(path).await?;
    serde_json::from_str(&content)
        .map_err(|e| RagError::InvalidInput(format!("{}: {e}", path.display())))
}
