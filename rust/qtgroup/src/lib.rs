#![doc = include_str!("../README.md")]

pub mod engine;
pub mod errors;
pub mod models;
pub mod traits;
pub mod utils;

// Re-export main structures
pub use crate::engine::{
    Extraction,
    GroupingConfig,
    GroupingEngine,
    GroupingOutput,
    GroupingPhase,
    GroupingStats,
    group_features,
};
pub use crate::errors::{
    GroupingError,
    Result,
};
pub use crate::models::{
    Cluster,
    ConsensusGroup,
    ConsensusSummary,
    DistanceConfig,
    Feature,
    MzSortedIndex,
    MzTolerance,
    PairwiseDistance,
    Point,
    PointArena,
    PointHandle,
    Position,
    RtTolerance,
    SearchWindow,
};

// Re-export traits
pub use crate::traits::{
    DistanceFn,
    FeatureDistance,
    SpatialIndex,
};
