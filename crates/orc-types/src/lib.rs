//! Shared domain types used across every orchestrator crate.
//!
//! This crate has no behavior of its own — it is the vocabulary the rest
//! of the workspace agrees on: the task shape, feature vectors, candidate
//! results, workspace-memory records, and process configuration.

pub mod candidate;
pub mod config;
pub mod feature;
pub mod memory;
pub mod task;

pub use candidate::{CandidateLogs, CandidateResult};
pub use config::Config;
pub use feature::{CtxBucket, FeatureVector, RepoBucket};
pub use memory::WorkspaceMemoryRecord;
pub use task::{
    Constraints, InputSpec, Metadata, OutputContract, RepoSpec, RoutingHints, Strategy, Task,
    TaskType,
};
