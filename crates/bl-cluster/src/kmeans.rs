//! Deterministic KMeans++ over dense 2-D point sets.

use bl_core::{BlError, ErrorInfo, RngHandle};

/// Convergence parameters for the Lloyd iterations.
#[derive(Debug, Clone, Copy, PartialEq)]
pub struct KmeansOptions {
    /// Maximum number of assign/update passes.
    pub max_iterations: usize,
    /// Squared-Frobenius-norm threshold on the centroid delta.
    pub tolerance: f64,
}

impl Default for KmeansOptions {
    fn default() -> Self {
        Self {
            max_iterations: 100,
            tolerance: 1e-6,
        }
    }
}

/// Result of a converged KMeans fit.
#[derive(Debug, Clone, PartialEq)]
pub struct KmeansFit {
    /// Final centroid positions, one per requested cluster.
    pub centroids: Vec<[f64; 2]>,
    /// Cluster index in `0..k` assigned to each input point.
    pub labels: Vec<usize>,
    /// Sum of squared distances from each point to its assigned centroid.
    pub inertia: f64,
}

/// Runs a seeded KMeans++ fit over `points`.
///
/// With a fixed seed and identical input the fit is byte-identical across
/// invocations: the only randomness is the seeded handle used for the ++
/// initialization and for re-seeding emptied clusters.
pub fn kmeans(
    points: &[[f64; 2]],
    k: usize,
    seed: u64,
    opts: &KmeansOptions,
) -> Result<KmeansFit, BlError> {
    let n = points.len();
    if k == 0 || k > n {
        return Err(BlError::Clustering(
            ErrorInfo::new("invalid-input", "cluster count out of range")
                .with_context("k", k.to_string())
                .with_context("n", n.to_string()),
        ));
    }

    let mut rng = RngHandle::from_seed(seed);
    let mut centroids = plus_plus_init(points, k, &mut rng);

    let max_iterations = opts.max_iterations.max(1);
    for _ in 0..max_iterations {
        let labels = assign(points, &centroids);
        let updated = recompute(points, &labels, k, &mut rng);
        let shift = squared_shift(&centroids, &updated);
        centroids = updated;
        if shift < opts.tolerance {
            break;
        }
    }

    let labels = assign(points, &centroids);
    let inertia = labels
        .iter()
        .enumerate()
        .map(|(idx, &cluster)| squared_distance(&points[idx], &centroids[cluster]))
        .sum();

    Ok(KmeansFit {
        centroids,
        labels,
        inertia,
    })
}

/// KMeans++ seeding. The reference weights each candidate by the square of
/// its squared distance to the nearest chosen centroid; that behaviour is
/// preserved exactly.
fn plus_plus_init(points: &[[f64; 2]], k: usize, rng: &mut RngHandle) -> Vec<[f64; 2]> {
    let n = points.len();
    let mut centroids = Vec::with_capacity(k);
    centroids.push(points[rng.next_index(n)]);

    while centroids.len() < k {
        let min_sq: Vec<f64> = points
            .iter()
            .map(|point| {
                centroids
                    .iter()
                    .map(|centroid| squared_distance(point, centroid))
                    .fold(f64::INFINITY, f64::min)
            })
            .collect();
        let weights: Vec<f64> = min_sq.iter().map(|d| d * d).collect();
        let total: f64 = weights.iter().sum();
        let next = if total > 0.0 {
            weighted_sample(&weights, total, rng)
        } else {
            // Every remaining point coincides with a centroid.
            rng.next_index(n)
        };
        centroids.push(points[next]);
    }
    centroids
}

/// Cumulative-sum sampling with a single uniform draw.
fn weighted_sample(weights: &[f64], total: f64, rng: &mut RngHandle) -> usize {
    let draw = rng.next_f64() * total;
    let mut acc = 0.0;
    for (idx, weight) in weights.iter().enumerate() {
        acc += weight;
        if draw < acc {
            return idx;
        }
    }
    weights.len() - 1
}

fn assign(points: &[[f64; 2]], centroids: &[[f64; 2]]) -> Vec<usize> {
    points
        .iter()
        .map(|point| {
            let mut best = 0usize;
            let mut best_dist = f64::INFINITY;
            for (cluster, centroid) in centroids.iter().enumerate() {
                let dist = squared_distance(point, centroid);
                if dist < best_dist {
                    best = cluster;
                    best_dist = dist;
                }
            }
            best
        })
        .collect()
}

fn recompute(
    points: &[[f64; 2]],
    labels: &[usize],
    k: usize,
    rng: &mut RngHandle,
) -> Vec<[f64; 2]> {
    let mut sums = vec![[0.0f64; 2]; k];
    let mut counts = vec![0usize; k];
    for (idx, &cluster) in labels.iter().enumerate() {
        sums[cluster][0] += points[idx][0];
        sums[cluster][1] += points[idx][1];
        counts[cluster] += 1;
    }
    let mut updated = Vec::with_capacity(k);
    for cluster in 0..k {
        if counts[cluster] == 0 {
            // Re-seed an emptied cluster from a uniformly sampled data point.
            updated.push(points[rng.next_index(points.len())]);
        } else {
            let denom = counts[cluster] as f64;
            updated.push([sums[cluster][0] / denom, sums[cluster][1] / denom]);
        }
    }
    updated
}

fn squared_shift(old: &[[f64; 2]], new: &[[f64; 2]]) -> f64 {
    old.iter()
        .zip(new.iter())
        .map(|(a, b)| squared_distance(a, b))
        .sum()
}

pub(crate) fn squared_distance(a: &[f64; 2], b: &[f64; 2]) -> f64 {
    let dx = a[0] - b[0];
    let dy = a[1] - b[1];
    dx * dx + dy * dy
}
