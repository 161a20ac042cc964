// Embeddings module
// Turns text into vectors through an external embedding provider

pub mod client;

use async_trait::async_trait;

use crate::Result;

pub use client::HttpEmbeddingClient;

/// Converts text into fixed-dimension vectors.
#[async_trait]
pub trait EmbeddingProvider: Send + Sync {
    /// Embed a single text.
    async fn embed(&self, text: &str) -> Result<Vec<f32>>;

    /// Embed several texts. The returned vectors are in input order: vector
    /// `i` belongs to `texts[i]`.
    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>>;

    fn model_name(&self) -> &str;
}
