pub mod feature_distance;
pub mod spatial_index;

pub use feature_distance::{
    DistanceFn,
    FeatureDistance,
};
pub use spatial_index::SpatialIndex;
