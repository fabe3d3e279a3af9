//! HTTP gateway for chat and embedding calls.

use std::time::Duration;

use bl_core::{BlError, ErrorInfo, TokenUsage};
use serde::{Deserialize, Serialize};
use tracing::{debug, warn};

use crate::provider::Provider;
use crate::retry::{is_retriable_message, is_retriable_status, RetryPolicy};

/// Chat and embedding operations the pipeline stages depend on. Stage tests
/// substitute deterministic stubs for this trait.
pub trait LlmGateway: Send + Sync {
    /// Sends a system + user prompt pair; returns the content string and the
    /// token usage reported by the provider.
    fn chat(&self, system: &str, user: &str, json_mode: bool) -> Result<(String, TokenUsage), BlError>;

    /// Embeds every text, returning one vector per input in input order.
    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, BlError>;
}

/// Connection settings resolved from the run configuration.
#[derive(Debug, Clone)]
pub struct GatewayConfig {
    /// Upstream provider.
    pub provider: Provider,
    /// Chat model name.
    pub model: String,
    /// Embedding model name.
    pub embedding_model: String,
    /// Resolved api key (may be empty for local providers).
    pub api_key: String,
    /// Resolved base URL without a trailing slash.
    pub base_url: String,
    /// Azure api-version query value.
    pub azure_api_version: String,
    /// Request timeout in seconds.
    pub timeout_secs: u64,
}

/// Blocking HTTP implementation of [`LlmGateway`].
pub struct HttpGateway {
    config: GatewayConfig,
    retry: RetryPolicy,
    client: reqwest::blocking::Client,
}

#[derive(Debug, Serialize)]
struct ChatRequest<'a> {
    model: &'a str,
    messages: Vec<ChatMessage<'a>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    response_format: Option<ResponseFormat>,
}

#[derive(Debug, Serialize)]
struct ChatMessage<'a> {
    role: &'static str,
    content: &'a str,
}

#[derive(Debug, Serialize)]
struct ResponseFormat {
    #[serde(rename = "type")]
    format_type: &'static str,
}

#[derive(Debug, Deserialize)]
struct ChatResponse {
    choices: Vec<ChatChoice>,
    #[serde(default)]
    usage: Option<UsagePayload>,
}

#[derive(Debug, Deserialize)]
struct ChatChoice {
    message: ChatResponseMessage,
}

#[derive(Debug, Deserialize)]
struct ChatResponseMessage {
    #[serde(default)]
    content: String,
}

#[derive(Debug, Deserialize)]
struct UsagePayload {
    #[serde(default)]
    prompt_tokens: u64,
    #[serde(default)]
    completion_tokens: u64,
    #[serde(default)]
    total_tokens: u64,
}

#[derive(Debug, Serialize)]
struct EmbeddingsRequest<'a> {
    model: &'a str,
    input: &'a [String],
}

#[derive(Debug, Deserialize)]
struct EmbeddingsResponse {
    data: Vec<EmbeddingDatum>,
}

#[derive(Debug, Deserialize)]
struct EmbeddingDatum {
    index: usize,
    embedding: Vec<f64>,
}

impl HttpGateway {
    /// Builds a gateway with the default retry policy.
    pub fn new(config: GatewayConfig) -> Result<Self, BlError> {
        let client = reqwest::blocking::Client::builder()
            .timeout(Duration::from_secs(config.timeout_secs))
            .build()
            .map_err(|err| {
                BlError::Llm(
                    ErrorInfo::new("client-build", "failed to construct HTTP client")
                        .with_hint(err.to_string()),
                )
            })?;
        Ok(Self {
            config,
            retry: RetryPolicy::default(),
            client,
        })
    }

    fn chat_url(&self) -> String {
        if self.config.provider.is_azure_flavored() {
            format!(
                "{}/openai/deployments/{}/chat/completions?api-version={}",
                self.config.base_url, self.config.model, self.config.azure_api_version
            )
        } else {
            format!("{}/chat/completions", self.config.base_url)
        }
    }

    fn embeddings_url(&self) -> String {
        if self.config.provider.is_azure_flavored() {
            format!(
                "{}/openai/deployments/{}/embeddings?api-version={}",
                self.config.base_url, self.config.embedding_model, self.config.azure_api_version
            )
        } else {
            format!("{}/embeddings", self.config.base_url)
        }
    }

    /// Sends one JSON request with the retry schedule applied to transient
    /// failures; non-retriable HTTP errors surface immediately.
    fn post_with_retry<B: Serialize>(&self, url: &str, body: &B) -> Result<String, BlError> {
        let mut attempt = 0u32;
        loop {
            match self.post_once(url, body) {
                Ok(text) => return Ok(text),
                Err(Attempt::Fatal(err)) => return Err(err),
                Err(Attempt::Transient(err)) => {
                    if attempt >= self.retry.max_retries {
                        return Err(err);
                    }
                    let pause = self.retry.jittered_secs(attempt, rand::random::<f64>());
                    warn!(
                        attempt = attempt + 1,
                        pause_secs = pause,
                        "transient LLM failure, backing off"
                    );
                    std::thread::sleep(Duration::from_secs_f64(pause));
                    attempt += 1;
                }
            }
        }
    }

    fn post_once<B: Serialize>(&self, url: &str, body: &B) -> Result<String, Attempt> {
        let mut request = self.client.post(url).json(body);
        if self.config.provider.is_azure_flavored() {
            request = request.header("api-key", &self.config.api_key);
        } else if !self.config.api_key.is_empty() {
            request = request.bearer_auth(&self.config.api_key);
        }

        let response = request.send().map_err(|err| {
            let info = ErrorInfo::new("llm-transport", err.to_string());
            if err.is_timeout() || err.is_connect() {
                Attempt::Transient(BlError::Llm(info))
            } else {
                Attempt::Fatal(BlError::Llm(info))
            }
        })?;

        let status = response.status();
        let text = response.text().map_err(|err| {
            Attempt::Transient(BlError::Llm(ErrorInfo::new("llm-read", err.to_string())))
        })?;

        if status.is_success() {
            return Ok(text);
        }

        let info = ErrorInfo::new("llm-http", "upstream returned an error status")
            .with_context("status", status.as_u16().to_string())
            .with_hint(truncate(&text, 300));
        if is_retriable_status(status.as_u16()) || is_retriable_message(&text) {
            Err(Attempt::Transient(BlError::Llm(info)))
        } else {
            Err(Attempt::Fatal(BlError::Llm(info)))
        }
    }
}

enum Attempt {
    Transient(BlError),
    Fatal(BlError),
}

impl LlmGateway for HttpGateway {
    fn chat(&self, system: &str, user: &str, json_mode: bool) -> Result<(String, TokenUsage), BlError> {
        let request = ChatRequest {
            model: &self.config.model,
            messages: vec![
                ChatMessage {
                    role: "system",
                    content: system,
                },
                ChatMessage {
                    role: "user",
                    content: user,
                },
            ],
            response_format: json_mode.then_some(ResponseFormat {
                format_type: "json_object",
            }),
        };

        let text = self.post_with_retry(&self.chat_url(), &request)?;
        let parsed: ChatResponse = serde_json::from_str(&text).map_err(|err| {
            BlError::Llm(
                ErrorInfo::new("llm-decode", "failed to decode chat response")
                    .with_hint(err.to_string()),
            )
        })?;
        let choice = parsed.choices.into_iter().next().ok_or_else(|| {
            BlError::Llm(ErrorInfo::new("llm-empty", "chat response carried no choices"))
        })?;
        let usage = parsed
            .usage
            .map(|u| TokenUsage::new(u.prompt_tokens, u.completion_tokens, u.total_tokens))
            .unwrap_or_default();
        debug!(tokens = usage.total, "chat call completed");
        Ok((choice.message.content, usage))
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, BlError> {
        if texts.is_empty() {
            return Ok(Vec::new());
        }
        let request = EmbeddingsRequest {
            model: &self.config.embedding_model,
            input: texts,
        };
        let text = self.post_with_retry(&self.embeddings_url(), &request)?;
        let parsed: EmbeddingsResponse = serde_json::from_str(&text).map_err(|err| {
            BlError::Llm(
                ErrorInfo::new("llm-decode", "failed to decode embeddings response")
                    .with_hint(err.to_string()),
            )
        })?;

        let mut data = parsed.data;
        data.sort_by_key(|datum| datum.index);
        if data.len() != texts.len() {
            return Err(BlError::Llm(
                ErrorInfo::new("llm-embed-count", "embedding count does not match input count")
                    .with_context("expected", texts.len().to_string())
                    .with_context("received", data.len().to_string()),
            ));
        }
        Ok(data.into_iter().map(|datum| datum.embedding).collect())
    }
}

fn truncate(text: &str, limit: usize) -> String {
    if text.len() <= limit {
        text.to_string()
    } else {
        let mut end = limit;
        while !text.is_char_boundary(end) {
            end -= 1;
        }
        format!("{}…", &text[..end])
    }
}
