//! Static description of the pipeline stages.

use std::fs;
use std::path::Path;

use bl_core::{BlError, ErrorInfo};
use serde::{Deserialize, Serialize};

/// Environment variable pointing to an external specs file.
pub const SPECS_PATH_ENV: &str = "BROADLISTENING_SPECS_PATH";

/// Declaration of one stage: identity, artifacts, and dependencies.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct StageSpec {
    /// Stage name used in plans, status journals, and the CLI.
    pub step: String,
    /// Files the stage writes under the output directory.
    pub output_files: Vec<String>,
    /// Config parameters whose change forces a re-run.
    #[serde(default)]
    pub param_deps: Vec<String>,
    /// Upstream stages whose re-run cascades onto this stage.
    #[serde(default)]
    pub step_deps: Vec<String>,
    /// LLM stages implicitly depend on their prompt and model.
    #[serde(default)]
    pub use_llm: bool,
}

/// The ordered stage table the planner walks.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct PipelineSpec {
    /// Stages in execution order.
    pub stages: Vec<StageSpec>,
}

impl PipelineSpec {
    /// The built-in seven-stage pipeline.
    pub fn builtin() -> Self {
        let stage = |step: &str,
                     outputs: &[&str],
                     params: &[&str],
                     steps: &[&str],
                     use_llm: bool| StageSpec {
            step: step.to_string(),
            output_files: outputs.iter().map(|s| s.to_string()).collect(),
            param_deps: params.iter().map(|s| s.to_string()).collect(),
            step_deps: steps.iter().map(|s| s.to_string()).collect(),
            use_llm,
        };
        Self {
            stages: vec![
                stage(
                    "extraction",
                    &["args.csv", "relations.csv"],
                    &["limit"],
                    &[],
                    true,
                ),
                stage(
                    "embedding",
                    &["embeddings.json"],
                    &["embedding_model"],
                    &["extraction"],
                    false,
                ),
                stage(
                    "clustering",
                    &["hierarchical_clusters.csv"],
                    &["cluster_nums"],
                    &["embedding"],
                    false,
                ),
                stage(
                    "initial_labelling",
                    &["hierarchical_initial_labels.csv"],
                    &[],
                    &["clustering"],
                    true,
                ),
                stage(
                    "merge_labelling",
                    &["hierarchical_merge_labels.csv"],
                    &[],
                    &["clustering", "initial_labelling"],
                    true,
                ),
                stage(
                    "overview",
                    &["hierarchical_overview.txt"],
                    &[],
                    &["merge_labelling"],
                    true,
                ),
                stage(
                    "aggregation",
                    &["hierarchical_result.json"],
                    &[],
                    &[
                        "extraction",
                        "embedding",
                        "clustering",
                        "initial_labelling",
                        "merge_labelling",
                        "overview",
                    ],
                    false,
                ),
            ],
        }
    }

    /// Loads the spec from `BROADLISTENING_SPECS_PATH` when set, otherwise
    /// returns the built-in table.
    pub fn load() -> Result<Self, BlError> {
        match std::env::var(SPECS_PATH_ENV) {
            Ok(path) if !path.is_empty() => Self::load_from(Path::new(&path)),
            _ => Ok(Self::builtin()),
        }
    }

    /// Loads a stage table from a JSON file.
    pub fn load_from(path: &Path) -> Result<Self, BlError> {
        let contents = fs::read_to_string(path).map_err(|err| {
            BlError::Config(
                ErrorInfo::new("specs-read", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })?;
        serde_json::from_str(&contents).map_err(|err| {
            BlError::Config(
                ErrorInfo::new("specs-parse", err.to_string())
                    .with_context("path", path.display().to_string()),
            )
        })
    }

    /// Looks up a stage by name.
    pub fn stage(&self, step: &str) -> Option<&StageSpec> {
        self.stages.iter().find(|stage| stage.step == step)
    }

    /// Position of a stage in pipeline order.
    pub fn index_of(&self, step: &str) -> Option<usize> {
        self.stages.iter().position(|stage| stage.step == step)
    }
}
