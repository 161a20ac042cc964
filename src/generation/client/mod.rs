
use std::time::Duration;

use async_trait::async_trait;
use itertools::Itertools;
use serde::{Deserialize, Serialize};
use tracing::{debug, info};

use super::{ChatMessage, GenerationProvider, Role};
use crate::config::{GenerationConfig, GenerationProviderKind};
use crate::http::{HttpReply, HttpTransport, TransportError, error_message, run_blocking};
use crate::{ProviderError, RagError, Result};

const ANTHROPIC_VERSION: &str = "2023-06-01";

/// Completion client for OpenAI-compatible chat endpoints (OpenAI, Ollama)
/// and the Anthropic messages API.
#[derive(Debug, Clone)]
pub struct HttpGenerationClient {
    provider: GenerationProviderKind,
    endpoint: String,
    model: String,
    api_key: String,
    temperature: f32,
    max_tokens: u32,
    transport: HttpTransport,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: &'a [ChatMessage],
    temperature: f32,
    max_tokens: u32,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatChoiceMessage,
}

#[derive(Debug, Deserialize)]
struct ChatChoiceMessage {
    #[serde(default)]
    content: Option<String>,
}

#[derive(Debug, Serialize)]
struct AnthropicRequest<'a> {
    model: &'a str,
    max_tokens: u32,
    temperature: f32,
    #[serde(skip_serializing_if = "String::is_empty")]
    system: String,
    messages: Vec<&'a ChatMessage>,
}

#[derive(Debug, Deserialize)]
struct AnthropicResponse {
    content: Vec<AnthropicBlock>,
}

#[derive(Debug, Deserialize)]
struct AnthropicBlock {
    #[serde(rename = "type")]
    kind: String,
    #[serde(default)]
    text: String,
}

impl HttpGenerationClient {
    #[inline]
    pub fn new(config: &GenerationConfig) -> Result<Self> {
        let base = config
            .api_url()
            .map_err(|e| RagError::Config(format!("Invalid generation API base: {e}")))?;
        let base = base.as_str().trim_end_matches('/');

        let endpoint = match config.provider {
            GenerationProviderKind::OpenAi | GenerationProviderKind::Ollama => {
                format!("{base}/chat/completions")
            }
            GenerationProviderKind::Anthropic => format!("{base}/messages"),
        };

        let transport = HttpTransport::new(
            config.provider.label(),
            Duration::from_secs(config.timeout_secs),
            config.retry_attempts,
        );

        info!(
            "Generation client using {} model {} at {}",
            config.provider.label(),
            config.model,
            endpoint
        );

        Ok(Self {
            provider: config.provider,
            endpoint,
            model: config.model.clone(),
            api_key: config.api_key.clone(),
            temperature: config.temperature,
            max_tokens: config.max_tokens,
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

    fn generate_blocking(&self, messages: &[ChatMessage]) -> Result<String> {
        debug!(
            "Requesting completion from {} with {} messages",
            self.provider.label(),
            messages.len()
        );

        let body = match self.provider {
            GenerationProviderKind::Anthropic => {
                let system = messages
                    .iter()
                    .filter(|m| m.role == Role::System)
                    .map(|m| m.content.as_str())
                    .join("\n\n");
                serde_json::to_string(&AnthropicRequest {
                    model: &self.model,
                    max_tokens: self.max_tokens,
                    temperature: self.temperature,
                    system,
                    messages: messages.iter().filter(|m| m.role != Role::System).collect(),
                })
            }
            GenerationProviderKind::OpenAi | GenerationProviderKind::Ollama => {
                serde_json::to_string(&ChatRequest {
                    model: &self.model,
                    messages,
                    temperature: self.temperature,
                    max_tokens: self.max_tokens,
                })
            }
        }
        .map_err(|e| self.failure(None, format!("failed to serialize request: {e}")))?;

        let bearer = format!("Bearer {}", self.api_key);
        let mut headers = Vec::new();
        match self.provider {
            GenerationProviderKind::Anthropic => {
                headers.push(("x-api-key", self.api_key.as_str()));
                headers.push(("anthropic-version", ANTHROPIC_VERSION));
            }
            GenerationProviderKind::OpenAi | GenerationProviderKind::Ollama => {
                if !self.api_key.is_empty() {
                    headers.push(("Authorization", bearer.as_str()));
                }
            }
        }

        let reply = self
            .transport
            .post_json(&self.endpoint, &headers, &body)
            .map_err(|e| self.transport_failure(e))?;

        let answer = self.parse_reply(&reply)?;
        info!("Generated response (length: {})", answer.len());
        Ok(answer)
    }

    fn parse_reply(&self, reply: &HttpReply) -> Result<String> {
        if !reply.is_success() {
            return Err(self.failure(Some(reply.status), error_message(&reply.body)));
        }

        match self.provider {
            GenerationProviderKind::Anthropic => {
                let response: AnthropicResponse = serde_json::from_str(&reply.body)
                    .map_err(|e| self.failure(None, format!("invalid response body: {e}")))?;
                let text = response
                    .content
                    .iter()
                    .filter(|block| block.kind == "text")
                    .map(|block| block.text.as_str())
                    .join("");
                if text.is_empty() {
                    return Err(self.failure(None, "response contained no text".to_string()));
                }
                Ok(text)
            }
            GenerationProviderKind::OpenAi | GenerationProviderKind::Ollama => {
                let response: ChatResponse = serde_json::from_str(&reply.body)
                    .map_err(|e| self.failure(None, format!("invalid response body: {e}")))?;
                response
                    .choices
                    .into_iter()
                    .next()
                    .and_then(|choice| choice.message.content)
                    .ok_or_else(|| self.failure(None, "response contained no choices".to_string()))
            }
        }
    }

    fn failure(&self, status: Option<u16>, message: String) -> RagError {
        RagError::Provider(ProviderError {
            provider: self.provider.label().to_string(),
            status,
            message,
        })
    }

    fn transport_failure(&self, error: TransportError) -> RagError {
        match error {
            TransportError::Timeout { .. } => RagError::Timeout {
                operation: "generation request".to_string(),
            },
            TransportError::Failed { message, .. } => self.failure(None, message),
        }
    }
}

#[async_trait]
impl GenerationProvider for HttpGenerationClient {
    async fn generate(&self, messages: &[ChatMessage]) -> Result<String> {
        let client = self.clone();
        let messages = messages.to_vec();
        run_blocking("generation", move || client.generate_blocking(&messages)).await
    }

    fn model_name(&self) -> &str {
        &self.model
    }
}
