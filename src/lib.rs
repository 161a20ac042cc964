use std::fmt;

use thiserror::Error;

pub type Result<T> = std::result::Result<T, RagError>;

#[derive(Error, Debug)]
pub enum RagError {
    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Invalid input: {0}")]
    InvalidInput(String),

    #[error("Vector dimension mismatch: expected {expected}, got {actual}")]
    DimensionMismatch { expected: usize, actual: usize },

    #[error("Vector backend unavailable: {0}")]
    BackendUnavailable(String),

    #[error("Embedding failed: {0}")]
    EmbeddingFailed(ProviderError),

    #[error("Provider error: {0}")]
    Provider(ProviderError),

    #[error("Timed out during {operation}")]
    Timeout { operation: String },

    #[error("Vector index is closed")]
    Closed,

    #[error("{stage} stage failed: {source}")]
    Stage {
        stage: Stage,
        #[source]
        source: Box<RagError>,
    },

    #[error("IO error: {0}")]
    Io(#[from] std::io::Error),

    #[error("Other error: {0}")]
    Other(#[from] anyhow::Error),
}

impl RagError {
    /// Tag an error with the pipeline stage it came from. Already tagged
    /// errors keep their original stage.
    #[inline]
    pub fn at_stage(self, stage: Stage) -> Self {
        match self {
            Self::Stage { .. } => self,
            other => Self::Stage {
                stage,
                source: Box::new(other),
            },
        }
    }

    /// The stage that failed, if this error came out of a pipeline.
    #[inline]
    pub fn stage(&self) -> Option<Stage> {
        match self {
            Self::Stage { stage, .. } => Some(*stage),
            _ => None,
        }
    }

    /// The innermost error, with any stage tag removed.
    #[inline]
    pub fn root(&self) -> &Self {
        match self {
            Self::Stage { source, .. } => source.root(),
            other => other,
        }
    }

    #[inline]
    pub fn is_timeout(&self) -> bool {
        matches!(self.root(), Self::Timeout { .. })
    }
}

/// A rejection reported by an external embedding or generation provider.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct ProviderError {
    pub provider: String,
    /// HTTP status, absent for transport-level failures.
    pub status: Option<u16>,
    pub message: String,
}

impl fmt::Display for ProviderError {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self.status {
            Some(status) => write!(
                f,
                "{} returned HTTP {}: {}",
                self.provider, status, self.message
            ),
            None => write!(f, "{}: {}", self.provider, self.message),
        }
    }
}

impl std::error::Error for ProviderError {}

/// Pipeline stages reported in user-facing errors.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub enum Stage {
    Embed,
    Retrieve,
    Generate,
    Index,
}

impl fmt::Display for Stage {
    #[inline]
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(match self {
            Self::Embed => "embed",
            Self::Retrieve => "retrieve",
            Self::Generate => "generate",
            Self::Index => "index",
        })
    }
}

pub mod commands;
pub mod config;
pub mod embeddings;
pub mod extractor;
pub mod generation;
pub mod http;
pub mod index;
pub mod indexer;
pub mod retrieval;

#[cfg(test)]
mod testing;
