use crate::errors::{
    GroupingError,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};

/// Settings of one grouping pass.
///
/// Every field has a default, so partial JSON configs are accepted:
///
/// ```
/// use qtgroup::GroupingConfig;
///
/// let config = GroupingConfig::default()
///     .with_min_quality(0.2)
///     .with_use_annotations(true);
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct GroupingConfig {
    /// Quality threshold radius, in units of the distance function.
    /// Also the penalty charged for a run without a candidate.
    pub max_distance: f64,
    /// Restrict run representatives to the best annotation of the center.
    pub use_annotations: bool,
    /// Extraction stops once the best remaining cluster scores below this.
    pub min_quality: f64,
    /// Report never-grouped points as single-member groups.
    pub retain_singletons: bool,
    /// Upper bound on the number of independent m/z partitions.
    pub nr_partitions: usize,
    pub show_progress: bool,
}

impl Default for GroupingConfig {
    fn default() -> Self {
        Self {
            max_distance: 1.0,
            use_annotations: false,
            min_quality: 0.0,
            retain_singletons: true,
            nr_partitions: 1,
            show_progress: false,
        }
    }
}

impl GroupingConfig {
    pub fn validate(&self) -> Result<()> {
        if !(self.max_distance.is_finite() && self.max_distance > 0.0) {
            return Err(GroupingError::InvalidMaxDistance(self.max_distance));
        }
        if !(0.0..=1.0).contains(&self.min_quality) {
            return Err(GroupingError::InvalidMinQuality(self.min_quality));
        }
        if self.nr_partitions == 0 {
            return Err(GroupingError::ZeroPartitions);
        }
        Ok(())
    }

    pub fn with_max_distance(self, max_distance: f64) -> Self {
        Self {
            max_distance,
            ..self
        }
    }

    pub fn with_use_annotations(self, use_annotations: bool) -> Self {
        Self {
            use_annotations,
            ..self
        }
    }

    pub fn with_min_quality(self, min_quality: f64) -> Self {
        Self {
            min_quality,
            ..self
        }
    }

    pub fn with_retain_singletons(self, retain_singletons: bool) -> Self {
        Self {
            retain_singletons,
            ..self
        }
    }

    pub fn with_nr_partitions(self, nr_partitions: usize) -> Self {
        Self {
            nr_partitions,
            ..self
        }
    }

    pub fn with_progress(self, show_progress: bool) -> Self {
        Self {
            show_progress,
            ..self
        }
    }
}
