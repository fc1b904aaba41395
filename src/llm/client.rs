//! Client for OpenAI-compatible `/chat/completions` endpoints.

use std::time::{Duration, Instant};

use async_trait::async_trait;
use serde::{Deserialize, Serialize};
use tokio::time::sleep;
use tracing::{info, warn};

use super::error::ProviderError;
use super::types::{ChatRequest, ChatResponse, Message};
use super::ChatGateway;
use crate::config::LlmSettings;

const MAX_RESPONSE_BYTES: usize = 1024 * 1024;
const MAX_INPUT_CHARS: usize = 500_000;

/// Retries apply to rate limits, 5xx answers and connect/timeout failures.
#[derive(Debug, Clone, Copy)]
pub struct RetryPolicy {
    pub max_retries: u32,
    pub base_delay: Duration,
}

impl Default for RetryPolicy {
    fn default() -> Self {
        Self {
            max_retries: 2,
            base_delay: Duration::from_secs(1),
        }
    }
}

impl RetryPolicy {
    /// Doubling delay, capped at 32x the base.
    pub fn delay(&self, attempt: u32) -> Duration {
        self.base_delay * 2u32.pow(attempt.min(5))
    }
}

#[derive(Debug, Clone)]
pub struct ChatCompletions {
    http: reqwest::Client,
    endpoint: String,
    api_key: String,
    retry: RetryPolicy,
}

#[derive(Serialize)]
struct CompletionBody<'a> {
    model: &'a str,
    messages: &'a [Message],
}

#[derive(Deserialize)]
struct CompletionReply {
    #[serde(default)]
    choices: Vec<ReplyChoice>,
    usage: Option<ReplyUsage>,
    error: Option<ReplyError>,
}

#[derive(Deserialize)]
struct ReplyChoice {
    message: ReplyMessage,
}

#[derive(Deserialize)]
struct ReplyMessage {
    content: Option<String>,
}

#[derive(Deserialize, Default)]
struct ReplyUsage {
    #[serde(default)]
    prompt_tokens: u32,
    #[serde(default)]
    completion_tokens: u32,
}

#[derive(Deserialize)]
struct ReplyError {
    message: Option<String>,
}

impl ChatCompletions {
    pub fn new(
        api_key: impl Into<String>,
        base_url: &str,
        timeout: Duration,
    ) -> Result<Self, ProviderError> {
        let http = reqwest::Client::builder()
            .timeout(timeout)
            .gzip(true)
            .build()
            .map_err(|e| ProviderError::Config(format!("failed to create HTTP client: {e}")))?;

        Ok(Self {
            http,
            endpoint: format!("{}/chat/completions", base_url.trim_end_matches('/')),
            api_key: api_key.into(),
            retry: RetryPolicy::default(),
        })
    }

    pub fn from_settings(settings: &LlmSettings) -> Result<Self, ProviderError> {
        Self::new(&settings.api_key, &settings.base_url, settings.timeout)
    }

    pub fn with_retry(mut self, retry: RetryPolicy) -> Self {
        self.retry = retry;
        self
    }

    async fn send(&self, req: &ChatRequest) -> Result<ChatResponse, ProviderError> {
        let start = Instant::now();
        let response = self
            .http
            .post(&self.endpoint)
            .bearer_auth(&self.api_key)
            .json(&CompletionBody {
                model: &req.model,
                messages: &req.messages,
            })
            .send()
            .await?;

        let status = response.status();
        let request_id = response
            .headers()
            .get("x-request-id")
            .and_then(|v| v.to_str().ok())
            .map(str::to_string);
        let bytes = response.bytes().await?;
        if bytes.len() > MAX_RESPONSE_BYTES {
            return Err(ProviderError::Malformed(format!(
                "response too large: {} bytes",
                bytes.len()
            )));
        }
        let reply = serde_json::from_slice::<CompletionReply>(&bytes);

        if status.as_u16() == 429 {
            return Err(ProviderError::RateLimited { request_id });
        }
        if !status.is_success() {
            let message = reply
                .ok()
                .and_then(|r| r.error)
                .and_then(|e| e.message)
                .unwrap_or_else(|| format!("HTTP {}", status.as_u16()));
            return Err(ProviderError::Status {
                status: status.as_u16(),
                message,
                retryable: status.is_server_error(),
            });
        }

        let reply = reply.map_err(|e| ProviderError::Malformed(format!("invalid JSON: {e}")))?;
        if let Some(error) = reply.error {
            return Err(ProviderError::Malformed(
                error.message.unwrap_or_else(|| "error without message".into()),
            ));
        }
        let content = reply
            .choices
            .into_iter()
            .next()
            .map(|c| c.message.content.unwrap_or_default())
            .ok_or_else(|| ProviderError::Malformed("no choices in response".into()))?;
        let usage = reply.usage.unwrap_or_default();

        Ok(ChatResponse {
            content,
            input_tokens: usage.prompt_tokens,
            output_tokens: usage.completion_tokens,
            latency: start.elapsed(),
        })
    }
}

#[async_trait]
impl ChatGateway for ChatCompletions {
    async fn chat(&self, req: ChatRequest) -> Result<ChatResponse, ProviderError> {
        let chars = req.input_chars();
        if chars > MAX_INPUT_CHARS {
            return Err(ProviderError::Config(format!(
                "prompt too large: {chars} chars (max {MAX_INPUT_CHARS})"
            )));
        }

        let mut attempt = 0;
        loop {
            match self.send(&req).await {
                Ok(resp) => {
                    info!(
                        caller = req.caller,
                        model = %req.model,
                        input_tokens = resp.input_tokens,
                        output_tokens = resp.output_tokens,
                        latency_ms = resp.latency.as_millis() as u64,
                        "chat completion succeeded"
                    );
                    return Ok(resp);
                }
                Err(err) if err.is_retryable() && attempt < self.retry.max_retries => {
                    warn!(
                        caller = req.caller,
                        attempt,
                        code = err.code(),
                        "chat completion failed, retrying: {err}"
                    );
                    sleep(self.retry.delay(attempt)).await;
                    attempt += 1;
                }
                Err(err) => {
                    warn!(
                        caller = req.caller,
                        attempt,
                        code = err.code(),
                        "chat completion failed: {err}"
                    );
                    return Err(err);
                }
            }
        }
    }
}
