//! Structured error types shared across broadlistening crates.

use std::collections::BTreeMap;
use std::fmt::{self, Display};

use serde::{Deserialize, Serialize};
use thiserror::Error;

/// Structured payload attached to every [`BlError`] variant.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ErrorInfo {
    /// Stable machine readable error code.
    pub code: String,
    /// Human readable diagnostic message.
    pub message: String,
    /// Contextual key value pairs (identifiers, paths, counts, etc.).
    #[serde(default)]
    pub context: BTreeMap<String, String>,
    /// Optional hint that may help the caller resolve the issue.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub hint: Option<String>,
}

impl ErrorInfo {
    /// Creates a new error payload with the provided code and message.
    pub fn new(code: impl Into<String>, message: impl Into<String>) -> Self {
        Self {
            code: code.into(),
            message: message.into(),
            context: BTreeMap::new(),
            hint: None,
        }
    }

    /// Adds a context entry to the payload.
    pub fn with_context(mut self, key: impl Into<String>, value: impl Into<String>) -> Self {
        self.context.insert(key.into(), value.into());
        self
    }

    /// Sets a human readable hint for remediation.
    pub fn with_hint(mut self, hint: impl Into<String>) -> Self {
        self.hint = Some(hint.into());
        self
    }
}

/// Canonical error type for the broadlistening pipeline.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Error)]
#[serde(tag = "family", content = "detail")]
pub enum BlError {
    /// Invalid or missing configuration detected before any pipeline work.
    #[error("config error: {0}")]
    Config(ErrorInfo),
    /// Another run holds the output directory lease.
    #[error("pipeline locked: {0}")]
    Locked(ErrorInfo),
    /// Persistent LLM failure after the retry budget, or a non-retriable HTTP error.
    #[error("llm error: {0}")]
    Llm(ErrorInfo),
    /// Misconfigured clustering kernel (cluster count out of range).
    #[error("clustering error: {0}")]
    Clustering(ErrorInfo),
    /// Uncaught failure inside a pipeline stage.
    #[error("stage error: {0}")]
    Stage(ErrorInfo),
    /// Serialization, file format, and I/O errors.
    #[error("serde error: {0}")]
    Serde(ErrorInfo),
    /// Run aborted by the operator.
    #[error("interrupted: {0}")]
    Interrupted(ErrorInfo),
}

impl Display for ErrorInfo {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "{} (code: {})", self.message, self.code)?;
        if !self.context.is_empty() {
            write!(f, " | context: [")?;
            for (idx, (key, value)) in self.context.iter().enumerate() {
                if idx > 0 {
                    write!(f, ", ")?;
                }
                write!(f, "{key}={value}")?;
            }
            write!(f, "]")?;
        }
        if let Some(hint) = &self.hint {
            write!(f, " | hint: {hint}")?;
        }
        Ok(())
    }
}

impl BlError {
    /// Returns a reference to the payload describing the error.
    pub fn info(&self) -> &ErrorInfo {
        match self {
            BlError::Config(info)
            | BlError::Locked(info)
            | BlError::Llm(info)
            | BlError::Clustering(info)
            | BlError::Stage(info)
            | BlError::Serde(info)
            | BlError::Interrupted(info) => info,
        }
    }

    /// True when the error should map to exit code 130 at the CLI boundary.
    pub fn is_interrupt(&self) -> bool {
        matches!(self, BlError::Interrupted(_))
    }
}
