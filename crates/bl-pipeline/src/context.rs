//! Shared typed state carried through the pipeline.

use std::collections::{BTreeMap, BTreeSet};
use std::path::Path;

use bl_core::{
    Argument, BlError, ClusterLabel, ClusterResults, Comment, ErrorInfo, Relation, TokenUsage,
};
use serde_json::Value;

use crate::files;
use crate::summary;

/// In-memory state owned by the pipeline driver. Each stage mutates only the
/// fields it is specified to produce; the driver persists the stage's files
/// at every boundary, which is also the resume boundary.
#[derive(Debug, Clone, Default)]
pub struct Context {
    /// Input comments (empty when resuming from mid-pipeline files).
    pub comments: Vec<Comment>,
    /// Extracted arguments, progressively enriched by later stages.
    pub arguments: Vec<Argument>,
    /// One relation per argument.
    pub relations: Vec<Relation>,
    /// Per-level cluster assignments.
    pub cluster_results: ClusterResults,
    /// Labels keyed by cluster id.
    pub cluster_labels: BTreeMap<String, ClusterLabel>,
    /// Corpus-level narrative summary.
    pub overview: String,
    /// Token usage accumulated since the last stage boundary.
    pub token_usage: TokenUsage,
    /// Final artifact, produced by the aggregation stage.
    pub result: Option<Value>,
}

impl Context {
    /// Creates a context seeded with the loaded input comments.
    pub fn with_comments(comments: Vec<Comment>) -> Self {
        Self {
            comments,
            ..Self::default()
        }
    }

    /// Adds token usage produced by a stage.
    pub fn add_usage(&mut self, usage: TokenUsage) {
        self.token_usage += usage;
    }

    /// Hands the accumulated usage delta to the caller and resets it.
    pub fn take_usage(&mut self) -> TokenUsage {
        std::mem::take(&mut self.token_usage)
    }

    /// Comment count for the final artifact: the loaded comments, or the
    /// distinct comment ids in the relations when resuming without input.
    pub fn comment_count(&self) -> usize {
        if !self.comments.is_empty() {
            return self.comments.len();
        }
        self.relations
            .iter()
            .map(|rel| rel.comment_id.as_str())
            .collect::<BTreeSet<_>>()
            .len()
    }

    /// Persists the artifacts a stage produced.
    pub fn save_step(&self, step: &str, dir: &Path) -> Result<(), BlError> {
        match step {
            "extraction" => {
                files::write_args_csv(dir, &self.arguments)?;
                files::write_relations_csv(dir, &self.relations)
            }
            "embedding" => files::write_embeddings_json(dir, &self.arguments),
            "clustering" => files::write_clusters_csv(dir, &self.arguments, &self.cluster_results),
            "initial_labelling" => {
                let finest = self.cluster_results.finest_level().unwrap_or(0);
                let labels: Vec<&ClusterLabel> = self
                    .cluster_labels
                    .values()
                    .filter(|label| label.level == finest)
                    .collect();
                files::write_initial_labels_csv(dir, &labels)
            }
            "merge_labelling" => {
                let rows = summary::cluster_rows(self);
                files::write_merge_labels_csv(dir, &rows)
            }
            "overview" => files::write_overview_txt(dir, &self.overview),
            "aggregation" => {
                let result = self.result.as_ref().ok_or_else(|| {
                    BlError::Stage(ErrorInfo::new(
                        "aggregation-missing",
                        "aggregation produced no result to persist",
                    ))
                })?;
                files::write_result_json(dir, result)
            }
            other => Err(BlError::Stage(
                ErrorInfo::new("unknown-step", "no artifacts defined for step")
                    .with_context("step", other.to_string()),
            )),
        }
    }

    /// Reconstructs a context from whichever stage files exist in `dir`,
    /// leaving everything else at its default.
    pub fn load_from_dir(dir: &Path) -> Result<Self, BlError> {
        let mut ctx = Context::default();

        if dir.join(files::ARGS_CSV).exists() && dir.join(files::RELATIONS_CSV).exists() {
            let (arguments, relations) = files::read_args_relations(dir)?;
            ctx.arguments = arguments;
            ctx.relations = relations;
        }
        if dir.join(files::EMBEDDINGS_JSON).exists() {
            files::read_embeddings_json(dir, &mut ctx.arguments)?;
        }
        if dir.join(files::CLUSTERS_CSV).exists() {
            ctx.cluster_results = files::read_clusters_csv(dir, &mut ctx.arguments)?;
        }
        if dir.join(files::INITIAL_LABELS_CSV).exists() {
            for label in files::read_labels_csv(dir, files::INITIAL_LABELS_CSV)? {
                ctx.cluster_labels.insert(label.cluster_id.clone(), label);
            }
        }
        if dir.join(files::MERGE_LABELS_CSV).exists() {
            for label in files::read_labels_csv(dir, files::MERGE_LABELS_CSV)? {
                ctx.cluster_labels.insert(label.cluster_id.clone(), label);
            }
        }
        if dir.join(files::OVERVIEW_TXT).exists() {
            ctx.overview = files::read_overview_txt(dir)?;
        }
        Ok(ctx)
    }
}
