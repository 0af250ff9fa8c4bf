use crate::models::point::PointHandle;
use thiserror::Error;

/// Errors raised before any grouping work starts.
///
/// The grouping itself never fails once the configuration and the input
/// points have been accepted, so every variant here is a rejected
/// configuration.
#[derive(Debug, Error, Clone, PartialEq)]
pub enum GroupingError {
    #[error("At least two runs are needed to group features, got {num_runs}")]
    TooFewRuns { num_runs: usize },
    #[error("max_distance must be finite and positive, got {0}")]
    InvalidMaxDistance(f64),
    #[error("min_quality must be within [0, 1], got {0}")]
    InvalidMinQuality(f64),
    #[error("nr_partitions must be at least 1")]
    ZeroPartitions,
    #[error("Point {handle:?} has run index {run_index}, expected a value in [0, {num_runs})")]
    InvalidRunIndex {
        handle: PointHandle,
        run_index: usize,
        num_runs: usize,
    },
    #[error("Point {handle:?} has a non-finite position (rt={rt}, mz={mz})")]
    NonFinitePosition { handle: PointHandle, rt: f64, mz: f64 },
    #[error("Invalid tolerance: {0}")]
    InvalidTolerance(String),
}

pub type Result<T> = std::result::Result<T, GroupingError>;
