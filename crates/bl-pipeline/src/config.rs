//! Run configuration: JSON file keys, defaults, and validation.

use std::collections::BTreeMap;
use std::fs;
use std::path::{Path, PathBuf};

use bl_core::{BlError, ErrorInfo};
use bl_llm::{GatewayConfig, Provider};
use serde::{Deserialize, Serialize};
use serde_json::Value;

use crate::prompts;

/// JSON-configurable parameters governing one pipeline run.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Config {
    /// Path to the input comments file (CSV or JSON).
    pub input: PathBuf,
    /// The question the comments respond to.
    pub question: String,
    /// Display name of the run.
    #[serde(default)]
    pub name: String,
    /// Introductory text echoed into the final artifact.
    #[serde(default)]
    pub intro: String,
    /// Upstream LLM provider.
    #[serde(default)]
    pub provider: Provider,
    /// Chat model override; provider default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub model: Option<String>,
    /// Embedding model override; provider default when absent.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub embedding_model: Option<String>,
    /// Api key override. Never serialized back out.
    #[serde(default, skip_serializing)]
    pub api_key: Option<String>,
    /// Base URL override; required for azure.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub api_base_url: Option<String>,
    /// Azure api-version query value.
    #[serde(default = "default_azure_api_version")]
    pub azure_api_version: String,
    /// host:port of a local OpenAI-compatible server.
    #[serde(default = "default_local_llm_address")]
    pub local_llm_address: String,
    /// Target cluster counts per hierarchy level, ascending.
    #[serde(default = "default_cluster_nums")]
    pub cluster_nums: Vec<usize>,
    /// Worker threads for the LLM-heavy stages.
    #[serde(default = "default_workers")]
    pub workers: usize,
    /// Maximum number of comments processed by extraction (0 = no limit).
    #[serde(default = "default_limit")]
    pub limit: usize,
    /// Include source URLs in the final artifact.
    #[serde(default)]
    pub enable_source_link: bool,
    /// Emit the per-comment CSV companion of the final artifact.
    #[serde(default)]
    pub is_pubcom: bool,
    /// Property name -> ignored filter list; the keys become `propertyMap` columns.
    #[serde(default)]
    pub hidden_properties: BTreeMap<String, Vec<String>>,
    /// Prompt overrides, merged over the built-in defaults.
    #[serde(default)]
    pub prompts: Prompts,
}

/// Per-stage prompt texts.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Prompts {
    /// Extraction stage system prompt.
    #[serde(default = "default_extraction_prompt")]
    pub extraction: String,
    /// Initial labelling system prompt.
    #[serde(default = "default_initial_labelling_prompt")]
    pub initial_labelling: String,
    /// Merge labelling system prompt.
    #[serde(default = "default_merge_labelling_prompt")]
    pub merge_labelling: String,
    /// Overview system prompt.
    #[serde(default = "default_overview_prompt")]
    pub overview: String,
}

fn default_extraction_prompt() -> String {
    prompts::EXTRACTION.to_string()
}

fn default_initial_labelling_prompt() -> String {
    prompts::INITIAL_LABELLING.to_string()
}

fn default_merge_labelling_prompt() -> String {
    prompts::MERGE_LABELLING.to_string()
}

fn default_overview_prompt() -> String {
    prompts::OVERVIEW.to_string()
}

impl Default for Prompts {
    fn default() -> Self {
        Self {
            extraction: default_extraction_prompt(),
            initial_labelling: default_initial_labelling_prompt(),
            merge_labelling: default_merge_labelling_prompt(),
            overview: default_overview_prompt(),
        }
    }
}

fn default_azure_api_version() -> String {
    std::env::var("AZURE_API_VERSION").unwrap_or_else(|_| "2024-02-15-preview".to_string())
}

fn default_local_llm_address() -> String {
    std::env::var("LOCAL_LLM_ADDRESS").unwrap_or_else(|_| "localhost:11434".to_string())
}

fn default_cluster_nums() -> Vec<usize> {
    vec![5, 15]
}

fn default_workers() -> usize {
    10
}

fn default_limit() -> usize {
    1000
}

impl Config {
    /// Reads and validates a configuration file.
    pub fn load(path: &Path) -> Result<Self, BlError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            BlError::Config(
                ErrorInfo::new("config-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        let config: Config = serde_json::from_str(&contents).map_err(|err| {
            BlError::Config(
                ErrorInfo::new("config-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        config.validate()?;
        Ok(config)
    }

    /// Checks the cross-field constraints the file format cannot express.
    pub fn validate(&self) -> Result<(), BlError> {
        if self.question.trim().is_empty() {
            return Err(BlError::Config(ErrorInfo::new(
                "config-question",
                "question must not be empty",
            )));
        }
        if self.cluster_nums.len() < 2 {
            return Err(BlError::Config(
                ErrorInfo::new("config-cluster-nums", "cluster_nums needs at least two entries")
                    .with_context("len", self.cluster_nums.len().to_string()),
            ));
        }
        if self.cluster_nums.windows(2).any(|pair| pair[0] > pair[1]) {
            return Err(BlError::Config(ErrorInfo::new(
                "config-cluster-nums",
                "cluster_nums must be ascending",
            )));
        }
        if self.cluster_nums.iter().any(|&k| k == 0) {
            return Err(BlError::Config(ErrorInfo::new(
                "config-cluster-nums",
                "cluster_nums entries must be positive",
            )));
        }
        if self.provider.requires_base_url() && self.resolved_base_url().is_none() {
            return Err(BlError::Config(
                ErrorInfo::new("config-base-url", "provider requires api_base_url")
                    .with_context("provider", format!("{:?}", self.provider)),
            ));
        }
        if self.provider.requires_api_key() && self.resolved_api_key().is_empty() {
            return Err(BlError::Config(
                ErrorInfo::new("config-api-key", "provider requires an api key")
                    .with_context("provider", format!("{:?}", self.provider))
                    .with_hint(
                        self.provider
                            .api_key_env()
                            .unwrap_or("api_key")
                            .to_string(),
                    ),
            ));
        }
        Ok(())
    }

    /// Chat model with the provider default applied.
    pub fn chat_model(&self) -> String {
        self.model
            .clone()
            .unwrap_or_else(|| self.provider.default_model().to_string())
    }

    /// Embedding model with the provider default applied.
    pub fn embed_model(&self) -> String {
        self.embedding_model
            .clone()
            .unwrap_or_else(|| self.provider.default_embedding_model().to_string())
    }

    /// Api key from the config, falling back to the provider's env var.
    pub fn resolved_api_key(&self) -> String {
        if let Some(key) = &self.api_key {
            if !key.is_empty() {
                return key.clone();
            }
        }
        self.provider
            .api_key_env()
            .and_then(|name| std::env::var(name).ok())
            .unwrap_or_default()
    }

    /// Base URL from the config, env, provider literal, or local address.
    pub fn resolved_base_url(&self) -> Option<String> {
        let url = match &self.api_base_url {
            Some(url) if !url.is_empty() => Some(url.clone()),
            _ => match self.provider {
                Provider::Azure => std::env::var("AZURE_OPENAI_URI").ok(),
                Provider::Local => Some(format!("http://{}/v1", self.local_llm_address)),
                _ => self.provider.default_base_url().map(str::to_string),
            },
        };
        url.map(|u| u.trim_end_matches('/').to_string())
    }

    /// Resolves the connection settings for the HTTP gateway.
    pub fn gateway_config(&self) -> Result<GatewayConfig, BlError> {
        let base_url = self.resolved_base_url().ok_or_else(|| {
            BlError::Config(ErrorInfo::new("config-base-url", "no base URL available"))
        })?;
        Ok(GatewayConfig {
            provider: self.provider,
            model: self.chat_model(),
            embedding_model: self.embed_model(),
            api_key: self.resolved_api_key(),
            base_url,
            azure_api_version: self.azure_api_version.clone(),
            timeout_secs: 60,
        })
    }

    /// Property names configured through `hidden_properties`, sorted.
    pub fn property_names(&self) -> Vec<String> {
        self.hidden_properties.keys().cloned().collect()
    }

    /// Secret-free dictionary echo of the configuration.
    pub fn echo(&self) -> Value {
        serde_json::to_value(self).unwrap_or(Value::Null)
    }
}
