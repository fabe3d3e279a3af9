//! RUN/SKIP decisions per stage, with dependency cascades and parameter
//! change detection.

use std::collections::BTreeMap;
use std::collections::BTreeSet;
use std::path::Path;

use bl_core::{BlError, ErrorInfo, PlanStep};
use serde_json::{json, Value};
use sha2::{Digest, Sha256};

use crate::config::Config;
use crate::spec::{PipelineSpec, StageSpec};
use crate::status::Status;

/// Strings longer than this are recorded and compared by digest.
pub const LONG_STRING_THRESHOLD: usize = 100;

/// Invocation flags that shape the plan.
#[derive(Debug, Clone, Default)]
pub struct PlanOptions {
    /// `-f`: run every stage regardless of history.
    pub force: bool,
    /// `-o STEP`: run only the named stage.
    pub only: Option<String>,
    /// `--from STEP`: drop stages before STEP from the plan.
    pub from: Option<String>,
}

/// Builds the plan for one invocation, walking stages in pipeline order so
/// upstream decisions are visible when deciding downstream stages.
pub fn build_plan(
    spec: &PipelineSpec,
    config: &Config,
    status: &Status,
    output_dir: &Path,
    opts: &PlanOptions,
) -> Result<Vec<PlanStep>, BlError> {
    let start_index = match &opts.from {
        Some(step) => spec.index_of(step).ok_or_else(|| {
            BlError::Config(
                ErrorInfo::new("plan-unknown-step", "unknown step for --from")
                    .with_context("step", step.clone()),
            )
        })?,
        None => 0,
    };
    if let Some(only) = &opts.only {
        if spec.index_of(only).is_none() {
            return Err(BlError::Config(
                ErrorInfo::new("plan-unknown-step", "unknown step for --only")
                    .with_context("step", only.clone()),
            ));
        }
    }

    let mut plan = Vec::new();
    let mut running: BTreeSet<String> = BTreeSet::new();
    for stage in &spec.stages[start_index..] {
        let step = decide(stage, config, status, output_dir, opts, &running);
        if step.run {
            running.insert(step.step.clone());
        }
        plan.push(step);
    }
    Ok(plan)
}

fn decide(
    stage: &StageSpec,
    config: &Config,
    status: &Status,
    output_dir: &Path,
    opts: &PlanOptions,
    running: &BTreeSet<String>,
) -> PlanStep {
    let run = |reason: String| PlanStep {
        step: stage.step.clone(),
        run: true,
        reason,
    };
    let skip = |reason: String| PlanStep {
        step: stage.step.clone(),
        run: false,
        reason,
    };

    if opts.force {
        return run("forced with -f".to_string());
    }
    if let Some(only) = &opts.only {
        if only == &stage.step {
            return run("forced this step with -o".to_string());
        }
        return skip("forced another step with -o".to_string());
    }

    let previous = match status.find_job(&stage.step) {
        Some(job) => job,
        None => return run("no trace of previous run".to_string()),
    };

    if stage
        .output_files
        .iter()
        .any(|file| !output_dir.join(file).exists())
    {
        return run("previous output not found".to_string());
    }

    let rerunning: Vec<&str> = stage
        .step_deps
        .iter()
        .filter(|dep| running.contains(*dep))
        .map(String::as_str)
        .collect();
    if !rerunning.is_empty() {
        return run(format!(
            "dependent steps will re-run: {}",
            rerunning.join(", ")
        ));
    }

    let current = serialize_params(&current_params(config, &stage.step));
    let changed: Vec<&String> = current
        .iter()
        .filter(|(name, value)| previous.params.get(*name) != Some(value))
        .map(|(name, _)| name)
        .collect();
    if !changed.is_empty() {
        let names: Vec<&str> = changed.iter().map(|s| s.as_str()).collect();
        return run(format!("parameters changed: {}", names.join(", ")));
    }

    skip("nothing changed".to_string())
}

/// Materializes the current parameter values a stage depends on.
pub fn current_params(config: &Config, step: &str) -> BTreeMap<String, Value> {
    let mut params = BTreeMap::new();
    match step {
        "extraction" => {
            params.insert("model".to_string(), json!(config.chat_model()));
            params.insert("prompt".to_string(), json!(config.prompts.extraction));
            params.insert("limit".to_string(), json!(config.limit));
        }
        "embedding" => {
            params.insert("embedding_model".to_string(), json!(config.embed_model()));
        }
        "clustering" => {
            params.insert("cluster_nums".to_string(), json!(config.cluster_nums));
        }
        "initial_labelling" => {
            params.insert("model".to_string(), json!(config.chat_model()));
            params.insert(
                "prompt".to_string(),
                json!(config.prompts.initial_labelling),
            );
        }
        "merge_labelling" => {
            params.insert("model".to_string(), json!(config.chat_model()));
            params.insert("prompt".to_string(), json!(config.prompts.merge_labelling));
        }
        "overview" => {
            params.insert("model".to_string(), json!(config.chat_model()));
            params.insert("prompt".to_string(), json!(config.prompts.overview));
        }
        _ => {}
    }
    params
}

/// Applies the long-string digest rule. The same transformation runs on
/// write (CompletedJob) and on read (comparison), so digests line up.
pub fn serialize_params(params: &BTreeMap<String, Value>) -> BTreeMap<String, Value> {
    params
        .iter()
        .map(|(name, value)| {
            let serialized = match value {
                Value::String(s) if s.chars().count() > LONG_STRING_THRESHOLD => {
                    Value::String(digest_string(s))
                }
                other => other.clone(),
            };
            (name.clone(), serialized)
        })
        .collect()
}

/// SHA-256 hex digest of a string.
pub fn digest_string(text: &str) -> String {
    let digest = Sha256::digest(text.as_bytes());
    format!("{digest:x}")
}

/// Checks that every output file of stages before `from` exists in the
/// resume directory.
pub fn validate_resume(spec: &PipelineSpec, from: &str, input_dir: &Path) -> Result<(), BlError> {
    let index = spec.index_of(from).ok_or_else(|| {
        BlError::Config(
            ErrorInfo::new("plan-unknown-step", "unknown step for --from")
                .with_context("step", from.to_string()),
        )
    })?;
    for stage in &spec.stages[..index] {
        for file in &stage.output_files {
            if !input_dir.join(file).exists() {
                return Err(BlError::Config(
                    ErrorInfo::new("resume-missing-file", "required upstream file not found")
                        .with_context("step", stage.step.clone())
                        .with_context("file", file.clone())
                        .with_context("input_dir", input_dir.display().to_string()),
                ));
            }
        }
    }
    Ok(())
}
