//! Per-cluster rollup shared by the merge-labels CSV and the final artifact.

use bl_cluster::level_density_ranks;
use bl_core::{cluster_id, DensityInfo};

use crate::context::Context;

/// One cluster with everything the output formats need.
#[derive(Debug, Clone, PartialEq)]
pub struct ClusterRow {
    /// Hierarchy level.
    pub level: u32,
    /// Cluster id `<level>_<num>`.
    pub id: String,
    /// Short human label (empty when labelling has not run).
    pub label: String,
    /// Cluster description.
    pub description: String,
    /// Number of member arguments.
    pub value: usize,
    /// Id of the containing cluster one level up (`"0"` at level 1).
    pub parent: String,
    /// Density of the cluster's 2-D footprint.
    pub density: f64,
    /// 1-based rank within the level, densest first.
    pub density_rank: usize,
    /// `rank / clusters_at_level`.
    pub density_rank_percentile: f64,
}

/// Rolls up every cluster of every level, sorted by `(level, id)`.
pub fn cluster_rows(ctx: &Context) -> Vec<ClusterRow> {
    let coords: Vec<[f64; 2]> = ctx.arguments.iter().map(|arg| [arg.x, arg.y]).collect();
    let mut rows = Vec::new();

    for (level, assignments) in ctx.cluster_results.iter() {
        let densities = level_density_ranks(assignments, &coords);
        let count = ctx.cluster_results.cluster_count(level);
        for num in 0..count {
            let id = cluster_id(level, num);
            let (label, description) = ctx
                .cluster_labels
                .get(&id)
                .map(|label| (label.label.clone(), label.description.clone()))
                .unwrap_or_default();
            let density = densities.get(&num).cloned().unwrap_or(DensityInfo {
                density: 0.0,
                density_rank: count,
                density_rank_percentile: 1.0,
            });
            rows.push(ClusterRow {
                level,
                id,
                label,
                description,
                value: assignments.iter().filter(|&&c| c == num).count(),
                parent: parent_id(ctx, level, num),
                density: density.density,
                density_rank: density.density_rank,
                density_rank_percentile: density.density_rank_percentile,
            });
        }
    }

    rows.sort_by(|a, b| a.level.cmp(&b.level).then_with(|| a.id.cmp(&b.id)));
    rows
}

/// Parent id via the containment relation: any member index at this level
/// also carries the parent's number one level up.
fn parent_id(ctx: &Context, level: u32, num: usize) -> String {
    if level <= 1 {
        return "0".to_string();
    }
    let assignments = match ctx.cluster_results.level(level) {
        Some(seq) => seq,
        None => return String::new(),
    };
    let above = match ctx.cluster_results.level(level - 1) {
        Some(seq) => seq,
        None => return String::new(),
    };
    assignments
        .iter()
        .position(|&c| c == num)
        .map(|idx| cluster_id(level - 1, above[idx]))
        .unwrap_or_default()
}
