#![deny(missing_docs)]
#![doc = "Core domain records, errors, and deterministic RNG for the broadlistening pipeline."]

pub mod errors;
pub mod rng;
mod types;
mod usage;

pub use errors::{BlError, ErrorInfo};
pub use rng::RngHandle;
pub use types::{
    cluster_id, Argument, ClusterLabel, ClusterResults, Comment, CompletedJob, DensityInfo,
    PlanStep, Relation,
};
pub use usage::TokenUsage;
