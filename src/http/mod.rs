// Blocking HTTP transport shared by the provider clients and the remote index
// Wraps a ureq agent with a global timeout and bounded retry on server errors

#[cfg(test)]
mod tests;

use std::time::Duration;

use anyhow::anyhow;
use thiserror::Error;
use tracing::{debug, error, warn};

use crate::RagError;

const EXPONENTIAL_BACKOFF_BASE: u32 = 2;
const DEFAULT_BACKOFF: Duration = Duration::from_secs(1);

/// A completed HTTP exchange. Non-2xx statuses are replies, not errors, so
/// callers can surface the provider's own message.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct HttpReply {
    pub status: u16,
    pub body: String,
}

impl HttpReply {
    #[inline]
    pub fn is_success(&self) -> bool {
        (200..300).contains(&self.status)
    }
}

#[derive(Debug, Error)]
pub enum TransportError {
    #[error("request to {service} timed out")]
    Timeout { service: String },
    #[error("request to {service} failed: {message}")]
    Failed { service: String, message: String },
}

#[derive(Debug, Clone)]
pub struct HttpTransport {
    service: String,
    agent: ureq::Agent,
    retry_attempts: u32,
    backoff: Duration,
}

impl HttpTransport {
    /// Create a transport for `service` (used in logs and errors). Every call
    /// is bounded by `timeout`; `retry_attempts` counts the first attempt.
    #[inline]
    pub fn new(service: impl Into<String>, timeout: Duration, retry_attempts: u32) -> Self {
        let agent = ureq::Agent::config_builder()
            .timeout_global(Some(timeout))
            .http_status_as_error(false)
            .build()
            .into();

        Self {
            service: service.into(),
            agent,
            retry_attempts: retry_attempts.max(1),
            backoff: DEFAULT_BACKOFF,
        }
    }

    #[inline]
    pub fn with_backoff(mut self, backoff: Duration) -> Self {
        self.backoff = backoff;
        self
    }

    #[inline]
    pub fn service(&self) -> &str {
        &self.service
    }

    #[inline]
    pub fn retry_attempts(&self) -> u32 {
        self.retry_attempts
    }

    #[inline]
    pub fn get(&self, url: &str, headers: &[(&str, &str)]) -> Result<HttpReply, TransportError> {
        self.execute_with_retry(url, || {
            let mut request = self.agent.get(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            read_reply(request.call())
        })
    }

    #[inline]
    pub fn delete(
        &self,
        url: &str,
        headers: &[(&str, &str)],
    ) -> Result<HttpReply, TransportError> {
        self.execute_with_retry(url, || {
            let mut request = self.agent.delete(url);
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            read_reply(request.call())
        })
    }

    #[inline]
    pub fn post_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<HttpReply, TransportError> {
        self.execute_with_retry(url, || {
            let mut request = self
                .agent
                .post(url)
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            read_reply(request.send(body))
        })
    }

    #[inline]
    pub fn put_json(
        &self,
        url: &str,
        headers: &[(&str, &str)],
        body: &str,
    ) -> Result<HttpReply, TransportError> {
        self.execute_with_retry(url, || {
            let mut request = self
                .agent
                .put(url)
                .header("Content-Type", "application/json");
            for (name, value) in headers {
                request = request.header(*name, *value);
            }
            read_reply(request.send(body))
        })
    }

    fn execute_with_retry<F>(
        &self,
        url: &str,
        mut request_fn: F,
    ) -> Result<HttpReply, TransportError>
    where
        F: FnMut() -> Result<HttpReply, ureq::Error>,
    {
        let mut last_error = None;

        for attempt in 1..=self.retry_attempts {
            debug!(
                "HTTP request to {} attempt {}/{}",
                self.service, attempt, self.retry_attempts
            );

            match request_fn() {
                Ok(reply) if reply.status >= 500 && attempt < self.retry_attempts => {
                    warn!(
                        "Server error (status {}) from {}, attempt {}/{}",
                        reply.status, self.service, attempt, self.retry_attempts
                    );
                }
                Ok(reply) => {
                    debug!(
                        "Request to {} completed with status {} on attempt {}",
                        self.service, reply.status, attempt
                    );
                    return Ok(reply);
                }
                Err(ureq::Error::Timeout(_)) => {
                    warn!("Request to {} timed out, not retrying", self.service);
                    return Err(TransportError::Timeout {
                        service: self.service.clone(),
                    });
                }
                Err(
                    error @ (ureq::Error::ConnectionFailed
                    | ureq::Error::HostNotFound
                    | ureq::Error::Io(_)),
                ) => {
                    warn!(
                        "Transport error: {}, attempt {}/{}",
                        error, attempt, self.retry_attempts
                    );
                    last_error = Some(error.to_string());
                }
                Err(error) => {
                    warn!("Non-retryable error from {}: {}", self.service, error);
                    return Err(TransportError::Failed {
                        service: self.service.clone(),
                        message: error.to_string(),
                    });
                }
            }

            if attempt < self.retry_attempts {
                let delay = self.backoff * EXPONENTIAL_BACKOFF_BASE.pow(attempt - 1);
                debug!("Waiting {:?} before retry", delay);
                std::thread::sleep(delay);
            }
        }

        error!("All retry attempts failed for request to {}", url);

        Err(TransportError::Failed {
            service: self.service.clone(),
            message: last_error.unwrap_or_else(|| "request failed after retries".to_string()),
        })
    }
}

fn read_reply(
    response: Result<ureq::http::Response<ureq::Body>, ureq::Error>,
) -> Result<HttpReply, ureq::Error> {
    let mut response = response?;
    let status = response.status().as_u16();
    let body = response.body_mut().read_to_string()?;
    Ok(HttpReply { status, body })
}

/// Run a blocking network call off the async runtime.
pub async fn run_blocking<T, F>(operation: &'static str, call: F) -> crate::Result<T>
where
    F: FnOnce() -> crate::Result<T> + Send + 'static,
    T: Send + 'static,
{
    tokio::task::spawn_blocking(call)
        .await
        .map_err(|e| RagError::Other(anyhow!("{operation} task failed: {e}")))?
}

const MAX_ERROR_BODY: usize = 500;

/// Pull a human readable message out of a provider error body. Understands
/// `{"error": {"message": ..}}` (OpenAI, Anthropic) and `{"error": ".."}`
/// (Ollama); anything else is returned trimmed.
pub fn error_message(body: &str) -> String {
    let parsed: Option<serde_json::Value> = serde_json::from_str(body).ok();
    let message = parsed.as_ref().and_then(|value| {
        let error = value.get("error")?;
        error
            .get("message")
            .and_then(serde_json::Value::as_str)
            .or_else(|| error.as_str())
            .map(str::to_string)
    });

    message.unwrap_or_else(|| body.trim().chars().take(MAX_ERROR_BODY).collect())
}
