use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};
use serde_json::Value;

/// One input unit: a free-text public comment with optional metadata.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Comment {
    /// Stable identifier, preserved verbatim from the input source.
    pub id: String,
    /// Free-text body. Whitespace-only bodies yield no arguments.
    #[serde(default)]
    pub body: String,
    /// Optional link back to where the comment was collected.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub source_url: Option<String>,
    /// Free-form string attributes passed through to the final artifact.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
    /// Scalar properties keyed by the names configured in `hidden_properties`.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Value>>,
}

impl Comment {
    /// True when the body is absent or whitespace only.
    pub fn is_empty(&self) -> bool {
        self.body.trim().is_empty()
    }
}

/// One opinion extracted from a comment; the atomic unit clustered.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Argument {
    /// Globally unique identifier of the form `A<comment_id>_<index>`.
    pub arg_id: String,
    /// The opinion text.
    pub argument: String,
    /// Identifier of the parent comment, original type preserved as a string.
    pub comment_id: String,
    /// Embedding vector, filled during the embedding stage.
    #[serde(default)]
    pub embedding: Vec<f64>,
    /// Projected x coordinate, filled during clustering.
    #[serde(default)]
    pub x: f64,
    /// Projected y coordinate, filled during clustering.
    #[serde(default)]
    pub y: f64,
    /// Membership chain: the root `"0"` followed by one id per hierarchy level.
    #[serde(default)]
    pub cluster_ids: Vec<String>,
    /// Attributes copied from the parent comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub attributes: Option<BTreeMap<String, String>>,
    /// Source URL copied from the parent comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub url: Option<String>,
    /// Properties copied from the parent comment.
    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub properties: Option<BTreeMap<String, Value>>,
}

impl Argument {
    /// Creates an argument as the extraction stage does, copying comment
    /// metadata through and deriving the id from the comment id and the
    /// zero-based opinion index.
    pub fn extracted(comment: &Comment, index: usize, text: impl Into<String>) -> Self {
        Self {
            arg_id: format!("A{}_{}", comment.id, index),
            argument: text.into(),
            comment_id: comment.id.clone(),
            embedding: Vec::new(),
            x: 0.0,
            y: 0.0,
            cluster_ids: Vec::new(),
            attributes: comment.attributes.clone(),
            url: comment.source_url.clone(),
            properties: comment.properties.clone(),
        }
    }
}

/// Explicit link between an argument and its parent comment.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Relation {
    /// Argument identifier.
    pub arg_id: String,
    /// Parent comment identifier.
    pub comment_id: String,
}

/// Formats the canonical non-root cluster id `<level>_<num>`.
pub fn cluster_id(level: u32, num: usize) -> String {
    format!("{level}_{num}")
}

/// Per-level cluster assignments for every argument.
///
/// The map is keyed by hierarchy level (1 = coarsest); the value at level L
/// is a dense sequence whose i-th entry is the cluster number of argument i.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize, Default)]
pub struct ClusterResults {
    levels: BTreeMap<u32, Vec<usize>>,
}

impl ClusterResults {
    /// Creates an empty result set.
    pub fn new() -> Self {
        Self::default()
    }

    /// Stores the assignment sequence for a level.
    pub fn insert(&mut self, level: u32, assignments: Vec<usize>) {
        self.levels.insert(level, assignments);
    }

    /// Returns the assignment sequence at a level, if present.
    pub fn level(&self, level: u32) -> Option<&[usize]> {
        self.levels.get(&level).map(Vec::as_slice)
    }

    /// Iterates levels in ascending order.
    pub fn iter(&self) -> impl Iterator<Item = (u32, &[usize])> + '_ {
        self.levels.iter().map(|(level, seq)| (*level, seq.as_slice()))
    }

    /// Ascending list of stored levels.
    pub fn sorted_levels(&self) -> Vec<u32> {
        self.levels.keys().copied().collect()
    }

    /// The finest stored level (largest level number).
    pub fn finest_level(&self) -> Option<u32> {
        self.levels.keys().next_back().copied()
    }

    /// Number of clusters at a level (`max + 1` over a contiguous range).
    pub fn cluster_count(&self, level: u32) -> usize {
        self.levels
            .get(&level)
            .and_then(|seq| seq.iter().max().map(|max| max + 1))
            .unwrap_or(0)
    }

    /// True when no level is stored.
    pub fn is_empty(&self) -> bool {
        self.levels.is_empty()
    }
}

/// Human-readable label attached to one cluster.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct ClusterLabel {
    /// Cluster id `<level>_<num>`, or `"0"` for the synthetic root.
    pub cluster_id: String,
    /// Hierarchy level the cluster belongs to (0 for the root).
    pub level: u32,
    /// Short human label.
    pub label: String,
    /// Longer description of the cluster's content.
    pub description: String,
}

impl ClusterLabel {
    /// The synthetic root covering all arguments, synthesized at aggregation.
    pub fn root() -> Self {
        Self {
            cluster_id: "0".to_string(),
            level: 0,
            label: "全体".to_string(),
            description: String::new(),
        }
    }
}

/// Provenance record for one executed stage.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct CompletedJob {
    /// Stage name.
    pub step: String,
    /// Completion timestamp, RFC-3339 with offset.
    pub completed_at: String,
    /// Wall-clock duration of the stage in seconds.
    pub duration_secs: f64,
    /// Serialized parameters; strings over 100 chars stored as SHA-256 digests.
    pub params: BTreeMap<String, Value>,
    /// Total tokens consumed by the stage.
    pub token_usage: u64,
}

/// Per-cluster density descriptor.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct DensityInfo {
    /// Inverse mean distance to the cluster center.
    pub density: f64,
    /// 1-based rank within the cluster's level, densest first.
    pub density_rank: usize,
    /// `rank / clusters_at_level`.
    pub density_rank_percentile: f64,
}

/// One entry of the execution plan emitted before a run.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PlanStep {
    /// Stage name.
    pub step: String,
    /// Whether the stage will execute this invocation.
    pub run: bool,
    /// Human-readable justification for the decision.
    pub reason: String,
}
