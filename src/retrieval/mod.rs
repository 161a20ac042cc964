// Retrieval module
// Answers questions by embedding them, searching the index and grounding a
// completion in what was found

#[cfg(test)]
mod tests;

pub mod context;

use std::sync::Arc;

use tracing::{Instrument, debug, info, info_span};
use uuid::Uuid;

use crate::config::DEFAULT_TOP_K;
use crate::embeddings::EmbeddingProvider;
use crate::generation::GenerationProvider;
use crate::index::{SearchResult, VectorIndex};
use crate::{RagError, Result, Stage};

pub use context::{PromptGrounding, assemble_context, compose_prompt};

/// Generated answer with the search results it was grounded in
#[derive(Debug, Clone, PartialEq)]
pub struct RagAnswer {
    pub answer: String,
    pub sources: Vec<SearchResult>,
}

/// Query orchestrator. Each query runs embed, retrieve, context assembly,
/// prompt composition and generation strictly in that order; the first
/// failing stage ends the query.
pub struct RagService {
    embedder: Arc<dyn EmbeddingProvider>,
    index: Arc<dyn VectorIndex>,
    generator: Arc<dyn GenerationProvider>,
    top_k: usize,
}

impl RagService {
    #[inline]
    pub fn new(
        embedder: Arc<dyn EmbeddingProvider>,
        index: Arc<dyn VectorIndex>,
        generator: Arc<dyn GenerationProvider>,
    ) -> Self {
        info!(
            "RAG service using embedding model {} and generation model {}",
            embedder.model_name(),
            generator.model_name()
        );
        Self {
            embedder,
            index,
            generator,
            top_k: DEFAULT_TOP_K,
        }
    }

    #[inline]
    pub fn with_top_k(mut self, top_k: usize) -> Self {
        self.top_k = top_k;
        self
    }

    #[inline]
    pub fn top_k(&self) -> usize {
        self.top_k
    }

    /// Answer `question` and return the sources used.
    #[inline]
    pub async fn query(&self, question: &str, grounding: &PromptGrounding) -> Result<RagAnswer> {
        let question = question.trim();
        if question.is_empty() {
            return Err(RagError::InvalidInput(
                "question must not be empty".to_string(),
            ));
        }

        let span = info_span!("rag_query", request_id = %Uuid::new_v4());
        self.run_stages(question, grounding).instrument(span).await
    }

    /// Answer text only.
    #[inline]
    pub async fn answer(&self, question: &str, grounding: &PromptGrounding) -> Result<String> {
        Ok(self.query(question, grounding).await?.answer)
    }

    async fn run_stages(&self, question: &str, grounding: &PromptGrounding) -> Result<RagAnswer> {
        info!("Executing query: {}", question);

        let query_vector = self
            .embedder
            .embed(question)
            .await
            .map_err(|e| e.at_stage(Stage::Embed))?;
        debug!("Embedded query ({} dimensions)", query_vector.len());

        let sources = self
            .index
            .search(&query_vector, self.top_k)
            .await
            .map_err(|e| e.at_stage(Stage::Retrieve))?;
        info!("Retrieved {} results from '{}'", sources.len(), self.index.name());

        let context = assemble_context(&sources);
        let messages = compose_prompt(question, grounding, &context);

        let answer = self
            .generator
            .generate(&messages)
            .await
            .map_err(|e| e.at_stage(Stage::Generate))?;
        info!("Query answered ({} characters)", answer.len());

        Ok(RagAnswer { answer, sources })
    }
}
