// In-memory providers shared by unit tests

use std::sync::Mutex;
use std::sync::atomic::{AtomicUsize, Ordering};

use async_trait::async_trait;

use crate::embeddings::EmbeddingProvider;
use crate::generation::{ChatMessage, GenerationProvider};
use crate::{ProviderError, RagError, Result};

/// Embeds text by counting the keywords it contains, one dimension each.
/// Text with none of the keywords maps to the zero vector.
pub struct KeywordEmbedder {
    keywords: Vec<&'static str>,
    pub calls: AtomicUsize,
    /// Fail every call with this index (0-based) and later
    pub fail_from_call: Option<usize>,
    /// Drop the last vector of every response
    pub short_by_one: bool,
}

impl KeywordEmbedder {
    pub fn new(keywords: &[&'static str]) -> Self {
        Self {
            keywords: keywords.to_vec(),
            calls: AtomicUsize::new(0),
            fail_from_call: None,
            short_by_one: false,
        }
    }

    pub fn dimension(&self) -> usize {
        self.keywords.len()
    }

    pub fn vector_for(&self, text: &str) -> Vec<f32> {
        let lower = text.to_lowercase();
        self.keywords
            .iter()
            .map(|keyword| lower.matches(keyword).count() as f32)
            .collect()
    }
}

#[async_trait]
impl EmbeddingProvider for KeywordEmbedder {
    async fn embed(&self, text: &str) -> Result<Vec<f32>> {
        let mut vectors = self.embed_batch(&[text.to_string()]).await?;
        vectors.pop().ok_or_else(|| {
            RagError::EmbeddingFailed(ProviderError {
                provider: "keyword".to_string(),
                status: None,
                message: "no vector".to_string(),
            })
        })
    }

    async fn embed_batch(&self, texts: &[String]) -> Result<Vec<Vec<f32>>> {
        let call = self.calls.fetch_add(1, Ordering::SeqCst);
        if self.fail_from_call.is_some_and(|from| call >= from) {
            return Err(RagError::EmbeddingFailed(ProviderError {
                provider: "keyword".to_string(),
                status: Some(503),
                message: "provider overloaded".to_string(),
            }));
        }

        let mut vectors: Vec<Vec<f32>> = texts.iter().map(|t| self.vector_for(t)).collect();
        if self.short_by_one {
            vectors.pop();
        }
        Ok(vectors)
    }

    fn model_name(&self) -> &str {
        "keyword"
    }
}

/// Records every prompt it receives and answers with a fixed reply.
pub struct ScriptedGenerator {
    reply: Result<String>,
    pub prompts: Mutex<Vec<Vec<ChatMessage>>>,
}

impl ScriptedGenerator {
    pub fn answering(reply: &str) -> Self {
        Self {
            reply: Ok(reply.to_string()),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn failing(status: u16, message: &str) -> Self {
        Self {
            reply: Err(RagError::Provider(ProviderError {
                provider: "scripted".to_string(),
                status: Some(status),
                message: message.to_string(),
            })),
            prompts: Mutex::new(Vec::new()),
        }
    }

    pub fn last_prompt(&self) -> Vec<ChatMessage> {
        self.prompts
            .lock()
            .expect("prompt log should not be poisoned")
            .last()
            .cloned()
            .unwrap_or_default()
    }

    pub fn call_count(&self) -> usize {
        self.prompts
            .lock()
            .expect("prompt log should not be poisoned")
            .len()
    }
}

#[async_trait]
impl GenerationProvider for ScriptedGenerator {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        self.prompts
            .lock()
            .expect("prompt log should not be poisoned")
            .push(messages.to_vec());
        match &self.reply {
            Ok(answer) => Ok(answer.clone()),
            Err(RagError::Provider(error)) => Err(RagError::Provider(error.clone())),
            Err(other) => Err(RagError::InvalidInput(other.to_string())),
        }
    }

    fn model_name(&self) -> &str {
        "scripted"
    }
}
