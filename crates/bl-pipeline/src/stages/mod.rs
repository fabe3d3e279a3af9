//! The seven pipeline stages.
//!
//! Stages are plain functions over the shared context; the driver dispatches
//! them by plan step name. Only the fields a stage is specified to produce
//! are mutated by it.

use std::path::Path;

use bl_core::{BlError, ErrorInfo};
use bl_llm::LlmGateway;

use crate::config::Config;
use crate::context::Context;
use crate::progress::Progress;

mod aggregation;
mod clustering;
mod embedding;
mod extraction;
mod initial_labelling;
mod merge_labelling;
mod overview;

/// Runs the named stage against the shared context.
pub fn run_stage(
    step: &str,
    ctx: &mut Context,
    config: &Config,
    gateway: &dyn LlmGateway,
    progress: &dyn Progress,
    output_dir: &Path,
) -> Result<(), BlError> {
    match step {
        "extraction" => extraction::run(ctx, config, gateway, progress),
        "embedding" => embedding::run(ctx, gateway, progress),
        "clustering" => clustering::run(ctx, config),
        "initial_labelling" => initial_labelling::run(ctx, config, gateway, progress),
        "merge_labelling" => merge_labelling::run(ctx, config, gateway, progress),
        "overview" => overview::run(ctx, config, gateway),
        "aggregation" => aggregation::run(ctx, config, output_dir),
        other => Err(BlError::Stage(
            ErrorInfo::new("unknown-step", "no implementation for step")
                .with_context("step", other.to_string()),
        )),
    }
}

/// Builds the bounded worker pool the LLM-heavy stages fan out on.
pub(crate) fn worker_pool(workers: usize) -> Result<rayon::ThreadPool, BlError> {
    rayon::ThreadPoolBuilder::new()
        .num_threads(workers.max(1))
        .build()
        .map_err(|err| {
            BlError::Stage(ErrorInfo::new("thread-pool", err.to_string()))
        })
}
