#![doc = "Deterministic clustering kernels for the broadlistening pipeline."]

pub mod density;
pub mod kmeans;
pub mod project;
pub mod ward;

pub use density::{cluster_density, level_density_ranks, DENSITY_EPSILON};
pub use kmeans::{kmeans, KmeansFit, KmeansOptions};
pub use project::{project_embeddings, UmapParams};
pub use ward::ward_merge;
