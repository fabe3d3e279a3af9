//! Merge labelling: bottom-up synthesis of parent labels from child labels,
//! second-finest level up to the coarsest.

use std::collections::BTreeSet;
use std::sync::Mutex;

use bl_core::{BlError, ClusterLabel, TokenUsage};
use bl_llm::LlmGateway;
use rayon::prelude::*;

use crate::config::Config;
use crate::context::Context;
use crate::progress::Progress;
use crate::stages::initial_labelling::label_cluster;
use crate::stages::worker_pool;

pub fn run(
    ctx: &mut Context,
    config: &Config,
    gateway: &dyn LlmGateway,
    progress: &dyn Progress,
) -> Result<(), BlError> {
    let levels = ctx.cluster_results.sorted_levels();
    if levels.len() < 2 {
        return Ok(());
    }

    let total: usize = levels[..levels.len() - 1]
        .iter()
        .map(|&level| ctx.cluster_results.cluster_count(level))
        .sum();
    let processed = Mutex::new(0usize);
    let pool = worker_pool(config.workers)?;
    let mut usage_total = TokenUsage::zero();

    // Levels must run sequentially: each one reads the labels the finer
    // level just produced. Clusters within a level label in parallel.
    for window in levels.windows(2).rev() {
        let (level, below) = (window[0], window[1]);
        let jobs = merge_jobs(ctx, level, below);

        let mut labelled: Vec<(usize, ClusterLabel, TokenUsage)> = pool.install(|| {
            jobs.par_iter()
                .map(|(num, body)| {
                    let (label, description, usage) =
                        label_cluster(gateway, &config.prompts.merge_labelling, body, *num);
                    if let Ok(mut done) = processed.lock() {
                        *done += 1;
                        progress.notify_progress("merge_labelling", *done, total);
                    }
                    (
                        *num,
                        ClusterLabel {
                            cluster_id: bl_core::cluster_id(level, *num),
                            level,
                            label,
                            description,
                        },
                        usage,
                    )
                })
                .collect()
        });
        labelled.sort_by_key(|(num, ..)| *num);

        for (_, label, usage) in labelled {
            usage_total += usage;
            ctx.cluster_labels.insert(label.cluster_id.clone(), label);
        }
    }

    ctx.add_usage(usage_total);
    Ok(())
}

/// Builds the per-cluster prompt body: a bullet list of the labels and
/// descriptions of the child clusters one level finer, found through the
/// containment relation.
fn merge_jobs(ctx: &Context, level: u32, below: u32) -> Vec<(usize, String)> {
    let assignments = ctx.cluster_results.level(level).unwrap_or(&[]);
    let finer = ctx.cluster_results.level(below).unwrap_or(&[]);
    let count = ctx.cluster_results.cluster_count(level);

    let mut children: Vec<BTreeSet<usize>> = vec![BTreeSet::new(); count];
    for (idx, &cluster) in assignments.iter().enumerate() {
        children[cluster].insert(finer[idx]);
    }

    children
        .into_iter()
        .enumerate()
        .map(|(num, child_set)| {
            let bullets: Vec<String> = child_set
                .into_iter()
                .filter_map(|child| ctx.cluster_labels.get(&bl_core::cluster_id(below, child)))
                .map(|label| format!("- {}: {}", label.label, label.description))
                .collect();
            (num, bullets.join("\n"))
        })
        .collect()
}
