//! Projection of high-dimensional embeddings onto the 2-D plane.

use nalgebra::DMatrix;

/// Parameterization the adapter would hand to a UMAP backend.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct UmapParams {
    /// Neighbourhood size: 15, shrunk to `max(2, n - 1)` for small samples.
    pub n_neighbors: usize,
    /// Output dimensionality, always 2.
    pub n_components: usize,
    /// Fixed seed so repeated projections agree.
    pub seed: u64,
}

impl UmapParams {
    /// Computes the parameterization for a sample count.
    pub fn for_samples(n: usize) -> Self {
        let n_neighbors = if n >= 15 {
            15
        } else {
            n.saturating_sub(1).max(2)
        };
        Self {
            n_neighbors,
            n_components: 2,
            seed: 42,
        }
    }
}

/// Projects `rows` (one embedding per argument) to 2-D coordinates.
///
/// No UMAP backend is linked, so every call takes the PCA fallback: column
/// mean centering, thin SVD, and the left singular vectors scaled by their
/// singular values, truncated to the leading two components. Downstream
/// clustering re-derives structure from these coordinates, so only
/// structural equivalence with a UMAP embedding is promised.
pub fn project_embeddings(rows: &[Vec<f64>]) -> Vec<[f64; 2]> {
    if rows.is_empty() {
        return Vec::new();
    }
    pca_project(rows)
}

fn pca_project(rows: &[Vec<f64>]) -> Vec<[f64; 2]> {
    let n = rows.len();
    let dims = rows.iter().map(Vec::len).max().unwrap_or(0);
    if dims == 0 {
        return vec![[0.0, 0.0]; n];
    }

    let mut matrix = DMatrix::<f64>::zeros(n, dims);
    for (row_idx, row) in rows.iter().enumerate() {
        for (col_idx, &value) in row.iter().enumerate() {
            matrix[(row_idx, col_idx)] = value;
        }
    }
    for col_idx in 0..dims {
        let mean = matrix.column(col_idx).sum() / n as f64;
        for row_idx in 0..n {
            matrix[(row_idx, col_idx)] -= mean;
        }
    }

    let svd = matrix.svd(true, false);
    let u = match svd.u {
        Some(u) => u,
        None => return vec![[0.0, 0.0]; n],
    };
    let singular = &svd.singular_values;

    let mut coords = vec![[0.0f64; 2]; n];
    for component in 0..2usize {
        if component >= u.ncols() || component >= singular.len() {
            continue;
        }
        let scale = singular[component];
        let flip = column_sign(&u, component);
        for row_idx in 0..n {
            let value = u[(row_idx, component)] * scale * flip;
            coords[row_idx][component] = if value.is_finite() { value } else { 0.0 };
        }
    }
    coords
}

/// Singular vectors are sign-ambiguous; orient each component so its
/// largest-magnitude entry is positive.
fn column_sign(u: &DMatrix<f64>, component: usize) -> f64 {
    let mut extreme = 0.0f64;
    for row_idx in 0..u.nrows() {
        let value = u[(row_idx, component)];
        if value.abs() > extreme.abs() {
            extreme = value;
        }
    }
    if extreme < 0.0 {
        -1.0
    } else {
        1.0
    }
}
