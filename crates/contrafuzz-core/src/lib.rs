//! contrafuzz-core: verdict and failure-clustering logic for contract fuzzing
//!
//! This crate decides, for every fuzzed request, whether the observed
//! response passes, warns, or fails against the OpenAPI contract, and
//! compresses the run's failures into reviewable buckets.

pub mod cluster;
pub mod config;
pub mod family;
pub mod model;
pub mod policy;
pub mod stats;
pub mod verdict;

pub use cluster::{Bucket, ClusterOptions, EMPTY_BODY_SENTINEL, PathGroup, ReasonGroup, cluster};
pub use config::{Config, ConfigError};
pub use family::ResponseCodeFamily;
pub use model::{ContractExpectation, RequestSnapshot, ResponseView, TestSummary};
pub use policy::IgnorePolicy;
pub use stats::RunStats;
pub use verdict::{
    CaseError, CaseHandle, CheckOptions, ConfigOverrides, Reason, Verdict, VerdictEngine,
    VerdictKind,
};
