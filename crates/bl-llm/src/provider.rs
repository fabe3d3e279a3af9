//! Closed registry of supported chat/embedding providers.

use serde::{Deserialize, Serialize};

/// Supported upstream providers. Every variant is OpenAI-wire-compatible;
/// Azure additionally routes through deployment paths and api-key headers.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize, Default)]
#[serde(rename_all = "lowercase")]
pub enum Provider {
    /// api.openai.com with bearer auth.
    #[default]
    OpenAi,
    /// Azure OpenAI: deployment URLs, `api-key` header, `api-version` query.
    Azure,
    /// Gemini through its OpenAI-compatible endpoint.
    Gemini,
    /// OpenRouter aggregation endpoint.
    OpenRouter,
    /// A local OpenAI-compatible server (Ollama and friends).
    Local,
}

impl Provider {
    /// Environment variable consulted when the config carries no api key.
    pub fn api_key_env(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("OPENAI_API_KEY"),
            Provider::Azure => Some("AZURE_OPENAI_API_KEY"),
            Provider::Gemini => Some("GEMINI_API_KEY"),
            Provider::OpenRouter => Some("OPENROUTER_API_KEY"),
            Provider::Local => None,
        }
    }

    /// Default chat model when the config names none.
    pub fn default_model(&self) -> &'static str {
        match self {
            Provider::OpenAi | Provider::Azure => "gpt-4o-mini",
            Provider::Gemini => "gemini-1.5-flash",
            Provider::OpenRouter => "openai/gpt-4o-mini",
            Provider::Local => "llama3",
        }
    }

    /// Default embedding model when the config names none.
    pub fn default_embedding_model(&self) -> &'static str {
        match self {
            Provider::OpenAi | Provider::Azure => "text-embedding-3-small",
            Provider::Gemini => "text-embedding-004",
            Provider::OpenRouter => "openai/text-embedding-3-small",
            Provider::Local => "nomic-embed-text",
        }
    }

    /// Literal base URL, when the provider has one. Azure reads
    /// `AZURE_OPENAI_URI`; Local derives its URL from `local_llm_address`.
    pub fn default_base_url(&self) -> Option<&'static str> {
        match self {
            Provider::OpenAi => Some("https://api.openai.com/v1"),
            Provider::Gemini => Some("https://generativelanguage.googleapis.com/v1beta/openai"),
            Provider::OpenRouter => Some("https://openrouter.ai/api/v1"),
            Provider::Azure | Provider::Local => None,
        }
    }

    /// Whether an api key must be present at validation time.
    pub fn requires_api_key(&self) -> bool {
        !matches!(self, Provider::Local)
    }

    /// Whether a base URL must be supplied by the configuration.
    pub fn requires_base_url(&self) -> bool {
        matches!(self, Provider::Azure)
    }

    /// Azure flavoring: `api-key` header plus an `api-version` query
    /// parameter on every request.
    pub fn is_azure_flavored(&self) -> bool {
        matches!(self, Provider::Azure)
    }
}
