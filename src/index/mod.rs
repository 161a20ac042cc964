// Vector index module
// One async contract over an in-process store and a Qdrant collection


pub mod local;
pub mod remote;

use std::cmp::Ordering;
use std::collections::BTreeMap;
use std::fmt;
use std::sync::Arc;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::info;

use crate::config::{Config, VectorBackend};
use crate::{RagError, Result};

pub use local::LocalIndex;
pub use remote::RemoteIndex;

/// Payload field that always holds the chunk text
pub const TEXT_FIELD: &str = "text";

/// Scalar value stored alongside a vector
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(untagged)]
pub enum PayloadValue {
    Bool(bool),
    Integer(i64),
    Float(f64),
    String(String),
}

/// Record metadata, ordered by field name
pub type Payload = BTreeMap<String, PayloadValue>;

impl PayloadValue {
    #[inline]
    pub fn as_str(&self) -> Option<&str> {
        match self {
            Self::String(value) => Some(value),
            _ => None,
        }
    }

    /// Convert a JSON scalar. Arrays, objects and null have no payload form.
    #[inline]
    pub fn from_json(value: &serde_json::Value) -> Option<Self> {
        match value {
            serde_json::Value::Bool(b) => Some(Self::Bool(*b)),
            serde_json::Value::Number(n) => n
                .as_i64()
                .map(Self::Integer)
                .or_else(|| n.as_f64().map(Self::Float)),
            serde_json::Value::String(s) => Some(Self::String(s.clone())),
            serde_json::Value::Null
            | serde_json::Value::Array(_)
            | serde_json::Value::Object(_) => None,
        }
    }
}

impl fmt::Display for PayloadValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            Self::Bool(value) => write!(f, "{value}"),
            Self::Integer(value) => write!(f, "{value}"),
            Self::Float(value) => write!(f, "{value}"),
            Self::String(value) => f.write_str(value),
        }
    }
}

impl From<&str> for PayloadValue {
    fn from(value: &str) -> Self {
        Self::String(value.to_string())
    }
}

impl From<String> for PayloadValue {
    fn from(value: String) -> Self {
        Self::String(value)
    }
}

impl From<i64> for PayloadValue {
    fn from(value: i64) -> Self {
        Self::Integer(value)
    }
}

impl From<f64> for PayloadValue {
    fn from(value: f64) -> Self {
        Self::Float(value)
    }
}

impl From<bool> for PayloadValue {
    fn from(value: bool) -> Self {
        Self::Bool(value)
    }
}

/// A vector with its caller-supplied key and payload
#[derive(Debug, Clone, PartialEq)]
pub struct VectorRecord {
    pub key: String,
    pub vector: Vec<f32>,
    pub payload: Payload,
}

impl VectorRecord {
    /// Build a record whose payload carries `text` under [`TEXT_FIELD`].
    #[inline]
    pub fn new(key: impl Into<String>, vector: Vec<f32>, text: impl Into<String>) -> Self {
        let mut payload = Payload::new();
        payload.insert(TEXT_FIELD.to_string(), PayloadValue::String(text.into()));
        Self {
            key: key.into(),
            vector,
            payload,
        }
    }

    #[inline]
    pub fn with_field(mut self, name: impl Into<String>, value: impl Into<PayloadValue>) -> Self {
        self.payload.insert(name.into(), value.into());
        self
    }

    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.payload.get(TEXT_FIELD).and_then(PayloadValue::as_str)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub struct SearchResult {
    pub score: f32,
    pub key: String,
    pub payload: Payload,
}

impl SearchResult {
    #[inline]
    pub fn text(&self) -> Option<&str> {
        self.payload.get(TEXT_FIELD).and_then(PayloadValue::as_str)
    }
}

#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CollectionStats {
    pub record_count: u64,
}

/// A named collection of fixed-dimension vectors searched by cosine similarity.
///
/// Writes (`upsert`, `clear`) are serialized against reads per collection, so
/// a search never sees a collection that is being created or cleared.
#[async_trait]
pub trait VectorIndex: Send + Sync {
    fn name(&self) -> &str;

    fn dimension(&self) -> usize;

    /// Store records. Every vector is checked against the collection
    /// dimension before anything is written.
    async fn upsert(&self, records: Vec<VectorRecord>) -> Result<()>;

    /// Up to `limit` results by descending score, equal scores in insertion
    /// order.
    async fn search(&self, query: &[f32], limit: usize) -> Result<Vec<SearchResult>>;

    async fn stats(&self) -> CollectionStats;

    async fn clear(&self) -> Result<()>;

    async fn close(&self);
}

/// Open the backend selected by `config.vector_store.backend`, sized to the
/// configured embedding dimension.
#[inline]
pub async fn open_index(config: &Config) -> Result<Arc<dyn VectorIndex>> {
    let dimension = usize::try_from(config.embedding.dimension)
        .map_err(|e| RagError::Config(format!("Invalid embedding dimension: {e}")))?;
    let store = &config.vector_store;

    info!(
        "Opening {:?} vector index '{}' with dimension {}",
        store.backend, store.collection, dimension
    );

    match store.backend {
        VectorBackend::Local => Ok(Arc::new(LocalIndex::new(&store.collection, dimension))),
        VectorBackend::Remote => Ok(Arc::new(RemoteIndex::open(store, dimension).await?)),
    }
}

/// Cosine similarity accumulated in `f64`. A zero-norm input scores 0.0.
#[inline]
pub fn cosine_similarity(a: &[f32], b: &[f32]) -> f32 {
    let mut dot = 0.0_f64;
    let mut norm_a = 0.0_f64;
    let mut norm_b = 0.0_f64;

    for (x, y) in a.iter().zip(b) {
        let (x, y) = (f64::from(*x), f64::from(*y));
        dot += x * y;
        norm_a += x * x;
        norm_b += y * y;
    }

    if norm_a == 0.0 || norm_b == 0.0 {
        return 0.0;
    }

    (dot / (norm_a.sqrt() * norm_b.sqrt())).clamp(-1.0, 1.0) as f32
}

pub(crate) fn check_dimension(expected: usize, actual: usize) -> Result<()> {
    if expected == actual {
        Ok(())
    } else {
        Err(RagError::DimensionMismatch { expected, actual })
    }
}

/// A scored hit with the sequence id used to break ties
pub(crate) struct Ranked {
    pub seq: u64,
    pub result: SearchResult,
}

/// Order by descending score then ascending sequence id, keep `limit`.
pub(crate) fn rank(mut hits: Vec<Ranked>, limit: usize) -> Vec<SearchResult> {
    hits.sort_by(|a, b| match b.result.score.total_cmp(&a.result.score) {
        Ordering::Equal => a.seq.cmp(&b.seq),
        other => other,
    });
    hits.into_iter().take(limit).map(|hit| hit.result).collect()
}
