//! Shared fixtures: a deterministic gateway stub and config builders.
#![allow(dead_code)]

use std::collections::BTreeMap;

use bl_core::{BlError, Comment, ErrorInfo, TokenUsage};
use bl_llm::LlmGateway;
use bl_pipeline::{Config, Prompts};

/// Deterministic stand-in for the HTTP gateway. Chat behaviour is selected
/// by matching the system prompt against the configured prompt set; embed
/// maps the i-th text of a call onto `[values[i], 0, 0, 0]`.
pub struct StubGateway {
    pub prompts: Prompts,
    pub embed_values: Vec<f64>,
}

impl StubGateway {
    pub fn new(embed_values: Vec<f64>) -> Self {
        Self {
            prompts: Prompts::default(),
            embed_values,
        }
    }
}

impl LlmGateway for StubGateway {
    fn chat(
        &self,
        system: &str,
        user: &str,
        _json_mode: bool,
    ) -> Result<(String, TokenUsage), BlError> {
        let usage = TokenUsage::new(10, 5, 15);
        if user.contains("FAIL") {
            return Err(BlError::Llm(ErrorInfo::new("stub-fail", "induced failure")));
        }
        let content = if system == self.prompts.extraction {
            format!(
                "{{\"extractedOpinionList\": [\"op:{}\"]}}",
                user.trim().replace('"', "")
            )
        } else if system == self.prompts.initial_labelling {
            "{\"label\": \"葉ラベル\", \"description\": \"葉説明\"}".to_string()
        } else if system == self.prompts.merge_labelling {
            "{\"label\": \"統合ラベル\", \"description\": \"統合説明\"}".to_string()
        } else {
            "全体の要約です。".to_string()
        };
        Ok((content, usage))
    }

    fn embed(&self, texts: &[String]) -> Result<Vec<Vec<f64>>, BlError> {
        Ok(texts
            .iter()
            .enumerate()
            .map(|(idx, _)| {
                let value = self.embed_values.get(idx).copied().unwrap_or(idx as f64);
                vec![value, 0.0, 0.0, 0.0]
            })
            .collect())
    }
}

/// Minimal valid configuration for driver and planner tests.
pub fn test_config(cluster_nums: Vec<usize>) -> Config {
    Config {
        input: "comments.csv".into(),
        question: "市政への意見を教えてください".into(),
        name: String::new(),
        intro: String::new(),
        provider: Default::default(),
        model: None,
        embedding_model: None,
        api_key: Some("test-key".into()),
        api_base_url: None,
        azure_api_version: "2024-02-15-preview".into(),
        local_llm_address: "localhost:11434".into(),
        cluster_nums,
        workers: 2,
        limit: 1000,
        enable_source_link: false,
        is_pubcom: false,
        hidden_properties: BTreeMap::new(),
        prompts: Prompts::default(),
    }
}

/// `n` comments with ids `0..n` and bodies `b0..bn`.
pub fn make_comments(n: usize) -> Vec<Comment> {
    (0..n)
        .map(|i| Comment {
            id: i.to_string(),
            body: format!("b{i}"),
            source_url: None,
            attributes: None,
            properties: None,
        })
        .collect()
}
