// Indexer module
// Embeds extracted chunks in batches and stores them in the vector index


use std::sync::Arc;

use tracing::{debug, info, instrument};

use crate::embeddings::EmbeddingProvider;
use crate::extractor::{Chunk, GraphSnapshot, OntologySnapshot, graph_chunks, ontology_chunks};
use crate::index::{VectorIndex, VectorRecord};
use crate::{ProviderError, RagError, Result, Stage};

/// Outcome of one indexing run
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct IndexingStats {
    pub chunks: usize,
    pub batches: usize,
    pub records_stored: usize,
}

/// Batch pipeline from chunks to stored vectors. Stops at the first failing
/// batch; batches before it stay stored.
pub struct Indexer {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    batch_size: usize,
}

impl Indexer {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        batch_size: usize,
    ) -> Self {
        Self {
            embedder,
            index,
            batch_size: batch_size.max(1),
        }
    }

    #[inline]
    pub fn batch_size(&self) -> usize {
        self.batch_size
    }

    /// Embed and store `chunks`, `batch_size` at a time.
    #[inline]
    #[instrument(skip_all, fields(chunks = chunks.len(), index = self.index.name()))]
    pub async fn index(&self, chunks: Vec<Chunk>) -> Result<IndexingStats> {
        let mut stats = IndexingStats {
            chunks: chunks.len(),
            ..IndexingStats::default()
        };
        if chunks.is_empty() {
            debug!("Nothing to index");
            return Ok(stats);
        }

        let total_batches = chunks.len().div_ceil(self.batch_size);
        info!(
            "Indexing {} chunks in {} batches using {}",
            chunks.len(),
            total_batches,
            self.embedder.model_name()
        );

        for batch in chunks.chunks(self.batch_size) {
            let stored = self
                .index_batch(batch)
                .await
                .map_err(|e| e.at_stage(Stage::Index))?;
            stats.batches += 1;
            stats.records_stored += stored;
            debug!(
                "Batch {}/{} stored ({} records so far)",
                stats.batches, total_batches, stats.records_stored
            );
        }

        info!(
            "Indexed {} chunks into '{}'",
            stats.records_stored,
            self.index.name()
        );
        Ok(stats)
    }

    async fn index_batch(&self, batch: &[Chunk]) -> Result<usize> {
        let texts: Vec<String> = batch.iter().map(|chunk| chunk.text.clone()).collect();
        let vectors = self.embedder.embed_batch(&texts).await?;

        if vectors.len() != batch.len() {
            return Err(RagError::EmbeddingFailed(ProviderError {
                provider: self.embedder.model_name().to_string(),
                status: None,
                message: format!(
                    "expected {} embeddings, got {}",
                    batch.len(),
                    vectors.len()
                ),
            }));
        }

        // Vector i belongs to chunk i
        let records: Vec<VectorRecord> = batch
            .iter()
            .zip(vectors)
            .map(|(chunk, vector)| {
                let mut record = VectorRecord::new(chunk.key.clone(), vector, chunk.text.clone());
                record
                    .payload
                    .extend(chunk.payload.iter().map(|(k, v)| (k.clone(), v.clone())));
                record
            })
            .collect();

        let stored = records.len();
        self.index.upsert(records).await?;
        Ok(stored)
    }

    /// Extract and index every node and relationship of a graph.
    #[inline]
    pub async fn index_graph(&self, snapshot: &GraphSnapshot) -> Result<IndexingStats> {
        self.index(graph_chunks(snapshot)).await
    }

    /// Extract and index the classes, individuals and object properties of
    /// an ontology.
    #[inline]
    pub async fn index_ontology(&self, snapshot: &OntologySnapshot) -> Result<IndexingStats> {
        self.index(ontology_chunks(snapshot)).await
    }
}
