pub mod cluster;
pub mod distance;
pub mod group;
pub mod indices;
pub mod point;
pub mod tolerance;

pub use cluster::{
    Candidate,
    Cluster,
    ClusterPriority,
};
pub use distance::PairwiseDistance;
pub use group::{
    ConsensusGroup,
    ConsensusSummary,
};
pub use indices::MzSortedIndex;
pub use point::{
    Feature,
    Point,
    PointArena,
    PointHandle,
    Position,
    Sequence,
};
pub use tolerance::{
    DistanceConfig,
    MzTolerance,
    RtTolerance,
    SearchWindow,
};
