#[cfg(test)]
mod tests;

use std::time::Duration;

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::EmbeddingProvider;
use crate::config::{EmbeddingConfig, EmbeddingProviderKind};
use crate::http::{HttpReply, HttpTransport, TransportError, error_message, run_blocking};
use crate::{ProviderError, RagError, Result};

/// Embedding client for OpenAI-compatible `/embeddings` endpoints and
/// Ollama's `/api/embed`.
#[derive(Debug, Clone)]
pub struct HttpEmbeddingClient {
    provider: EmbeddingProviderKind,
    endpoint: String,
    model: String,
    api_key: String,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct EmbedRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedResponse {
    data: Vec<OpenAiEmbedding>,
}

#[derive(Debug, Deserialize)]
struct OpenAiEmbedding {
    embedding: Vec<f32>,
    #[serde(default)]
    index: Option<usize>,
}

#[derive(Debug, Deserialize)]
struct OllamaEmbedResponse {
    embeddings: Vec<Vec<f32>>,
}

impl HttpEmbeddingClient {
    #[inline]
    pub fn new(config: &EmbeddingConfig) -> Result<Self> {
        let base = config
            .api_url()
            .map_err(|e| RagError::Config(format!("Invalid embedding API base: {e}")))?;

        let endpoint = match config.provider {
            EmbeddingProviderKind::OpenAi => {
                format!("{}/embeddings", base.as_str().trim_end_matches('/'))
            }
            EmbeddingProviderKind::Ollama => {
                format!("{}/api/embed", base.as_str().trim_end_matches('/'))
            }
        };

        let transport = HttpTransport::new(
            config.provider.label(),
            Duration::from_secs(config.timeout_secs),
            config.retry_attempts,
        );

        info!(
            "Embedding client using {} model {} at {}",
            config.provider.label(),
            config.model,
            endpoint
        );

        Ok(Self {
            provider: config.provider,
            endpoint,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            transport,
        })
    }

    #[inline]
    pub fn with_transport(mut self, transport: HttpTransport) -> Self {
        self.transport = transport;
        self
    }

    #[inline]
    pub fn endpoint(&self) -> &str {
        &self.endpoint
    }

    fn embed_blocking(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        debug!("Generating embeddings for {} texts", texts.len());

        let request = EmbedRequest {
            model: &self.model,
            input: texts,
        };
        let body = serde_json::to_string(&request)
            .map_err(|e| self.failure(None, format!("failed to serialize request: {e}")))?;

        let authorization = format!("Bearer {}", self.api_key);
        let mut headers = Vec::new();
        if !self.api_key.is_empty() {
            headers.push(("Authorization", authorization.as_str()));
        }

        let reply = self
            .transport
            .post_json(&self.endpoint, &headers, &body)
            .map_err(|e| self.transport_failure(e))?;

        let embeddings = self.parse_reply(&reply)?;

        if embeddings.len() != texts.len() {
            return Err(self.failure(
                None,
                format!(
                    "expected {} embeddings, provider returned {}",
                    texts.len(),
                    embeddings.len()
                ),
            ));
        }

        debug!(
            "Generated {} embeddings with {} dimensions",
            embeddings.len(),
            embeddings.first().map_or(0, Vec::len)
        );
        Ok(embeddings)
    }

    fn parse_reply(&self, reply: &HttpReply) -> Result<Vec<Vec<f32>>> {
        if !reply.is_success() {
            return Err(self.failure(Some(reply.status), error_message(&reply.body)));
        }

        match self.provider {
            EmbeddingProviderKind::OpenAi => {
                let mut response: OpenAiEmbedResponse = serde_json::from_str(&reply.body)
                    .map_err(|e| self.failure(None, format!("invalid response body: {e}")))?;
                // Entries carry their input position; restore it before zipping
                response
                    .data
                    .sort_by_key(|entry| entry.index.unwrap_or(usize::MAX));
                Ok(response
                    .data
                    .into_iter()
                    .map(|entry| entry.embedding)
                    .collect())
            }
            EmbeddingProviderKind::Ollama => {
                let response: OllamaEmbedResponse = serde_json::from_str(&reply.body)
                    .map_err(|e| self.failure(None, format!("invalid response body: {e}")))?;
                Ok(response.embeddings)
            }
        }
    }

    fn failure(&self, status: Option<u16>, message: String) -> RagError {
        RagError::EmbeddingFailed(ProviderError {
            provider: self.provider.label().to_string(),
            status,
            message,
        })
    }

    fn transport_failure(&self, error: TransportError) -> RagError {
        match error {
            TransportError::Timeout { .. } => RagError::Timeout {
                operation: "embedding request".to_string(),
            },
            TransportError::Failed { message, .. } => self.failure(None, message),
        }
    }
}

#[async_trait]
impl EmbeddingProvider for HttpEmbeddingClient {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut embeddings = self.embed_batch(&[text.to_string()]).await?;
        embeddings
            .pop()
            .ok_or_else(|| self.failure(None, "provider returned no embedding".to_string()))
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }

        let client = self.clone();
        let texts = texts.to_vec();
        run_blocking("embedding", move || client.embed_blocking(&texts)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
