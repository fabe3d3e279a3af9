//! Clustering: 2-D projection, seeded KMeans at the finest target, Ward
//! agglomeration for every coarser target.

use std::collections::BTreeMap;

use bl_cluster::{kmeans, project_embeddings, ward_merge, KmeansOptions};
use bl_core::{BlError, ClusterResults, ErrorInfo};
use tracing::debug;

use crate::config::Config;
use crate::context::Context;

const CLUSTER_SEED: u64 = 42;

pub fn run(ctx: &mut Context, config: &Config) -> Result<(), BlError> {
    let n = ctx.arguments.len();
    if n == 0 {
        return Err(BlError::Clustering(ErrorInfo::new(
            "no-arguments",
            "clustering requires at least one argument",
        )));
    }
    if ctx.arguments.iter().any(|arg| arg.embedding.is_empty()) {
        return Err(BlError::Clustering(ErrorInfo::new(
            "missing-embeddings",
            "clustering requires every argument to carry an embedding",
        )));
    }

    let rows: Vec<Vec<f64>> = ctx.arguments.iter().map(|arg| arg.embedding.clone()).collect();
    let coords = project_embeddings(&rows);

    // Targets are clamped to the sample count, then deduplicated ascending;
    // each surviving target becomes one hierarchy level, finest last.
    let mut adjusted: Vec<usize> = config.cluster_nums.iter().map(|&k| k.min(n)).collect();
    adjusted.sort_unstable();
    adjusted.dedup();
    let top = match adjusted.last() {
        Some(&top) => top,
        None => {
            return Err(BlError::Clustering(ErrorInfo::new(
                "no-targets",
                "cluster_nums produced no targets",
            )))
        }
    };

    let fit = kmeans(&coords, top, CLUSTER_SEED, &KmeansOptions::default())?;

    let level_count = adjusted.len();
    let mut results = ClusterResults::new();
    for (index, &target) in adjusted.iter().enumerate().take(level_count - 1) {
        let merged = ward_merge(&fit.centroids, &fit.labels, target);
        results.insert((index + 1) as u32, merged);
    }
    results.insert(level_count as u32, contiguous(&fit.labels));

    for (idx, argument) in ctx.arguments.iter_mut().enumerate() {
        argument.x = coords[idx][0];
        argument.y = coords[idx][1];
        let mut ids = vec!["0".to_string()];
        for (level, assignments) in results.iter() {
            ids.push(bl_core::cluster_id(level, assignments[idx]));
        }
        argument.cluster_ids = ids;
    }

    debug!(
        arguments = n,
        levels = level_count,
        finest = top,
        "clustering complete"
    );
    ctx.cluster_results = results;
    Ok(())
}

/// Remaps observed labels onto `0..K` in ascending label order, so every
/// level exposes a contiguous cluster number range.
fn contiguous(labels: &[usize]) -> Vec<usize> {
    let mut observed: Vec<usize> = labels.to_vec();
    observed.sort_unstable();
    observed.dedup();
    let remap: BTreeMap<usize, usize> = observed
        .into_iter()
        .enumerate()
        .map(|(new, old)| (old, new))
        .collect();
    labels.iter().map(|label| remap[label]).collect()
}
