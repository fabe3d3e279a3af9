//! Per-cluster density and intra-level ranking.

use std::collections::BTreeMap;

use bl_core::DensityInfo;

/// Regularizer keeping the density finite for degenerate clusters.
pub const DENSITY_EPSILON: f64 = 1e-10;

/// Density of one cluster: the inverse of the mean distance from each member
/// to the arithmetic center, regularized by [`DENSITY_EPSILON`]. Empty and
/// singleton clusters collapse to the maximum density `1 / EPSILON`.
pub fn cluster_density(points: &[[f64; 2]]) -> f64 {
    if points.len() < 2 {
        return 1.0 / DENSITY_EPSILON;
    }
    let n = points.len() as f64;
    let center = [
        points.iter().map(|p| p[0]).sum::<f64>() / n,
        points.iter().map(|p| p[1]).sum::<f64>() / n,
    ];
    let spread = points
        .iter()
        .map(|p| {
            let dx = p[0] - center[0];
            let dy = p[1] - center[1];
            (dx * dx + dy * dy).sqrt()
        })
        .sum::<f64>()
        / n;
    1.0 / (spread + DENSITY_EPSILON)
}

/// Computes density, rank, and rank percentile for every cluster of one
/// hierarchy level. `assignments[i]` is the cluster number of point `i`.
/// Ranks are 1-based, densest first; equal densities rank the smaller
/// cluster number first.
pub fn level_density_ranks(
    assignments: &[usize],
    coords: &[[f64; 2]],
) -> BTreeMap<usize, DensityInfo> {
    let mut members: BTreeMap<usize, Vec<[f64; 2]>> = BTreeMap::new();
    for (idx, &cluster) in assignments.iter().enumerate() {
        members.entry(cluster).or_default().push(coords[idx]);
    }

    let mut densities: Vec<(usize, f64)> = members
        .iter()
        .map(|(&cluster, points)| (cluster, cluster_density(points)))
        .collect();
    densities.sort_by(|a, b| {
        b.1.partial_cmp(&a.1)
            .unwrap_or(std::cmp::Ordering::Equal)
            .then(a.0.cmp(&b.0))
    });

    let count = densities.len() as f64;
    densities
        .into_iter()
        .enumerate()
        .map(|(idx, (cluster, density))| {
            let rank = idx + 1;
            (
                cluster,
                DensityInfo {
                    density,
                    density_rank: rank,
                    density_rank_percentile: rank as f64 / count,
                },
            )
        })
        .collect()
}
