use crate::errors::Result;
use crate::models::point::{
    Point,
    Position,
};
use crate::models::tolerance::{
    DistanceConfig,
    SearchWindow,
};
use crate::traits::FeatureDistance;

/// Default [`FeatureDistance`]: weighted mean of the RT and m/z differences,
/// each normalized by its tolerance.
///
/// Pairs outside either tolerance, or with different known charges (unless
/// `ignore_charge` is set), are rejected. Accepted pairs have a distance
/// within `[0, 1]`, which makes `max_distance = 1.0` the natural threshold.
///
/// ```
/// use qtgroup::models::distance::PairwiseDistance;
/// use qtgroup::models::tolerance::{DistanceConfig, MzTolerance, RtTolerance};
/// use qtgroup::{Feature, FeatureDistance, PointArena};
///
/// let arena = PointArena::from_runs(vec![
///     vec![Feature::new(100.0, 500.0, 1.0)],
///     vec![Feature::new(110.0, 500.5, 1.0)],
/// ]);
/// let config = DistanceConfig::default()
///     .with_rt_tolerance(RtTolerance::Seconds(20.0))
///     .with_mz_tolerance(MzTolerance::Absolute(1.0));
/// let dist = PairwiseDistance::new(config).unwrap();
///
/// let handles: Vec<_> = arena.handles().collect();
/// let d = dist.distance(&arena[handles[0]], &arena[handles[1]]).unwrap();
/// assert!((d - 0.5).abs() < 1e-9);
/// ```
#[derive(Debug, Clone)]
pub struct PairwiseDistance {
    config: DistanceConfig,
    weight_sum: f64,
}

impl PairwiseDistance {
    pub fn new(config: DistanceConfig) -> Result<Self> {
        config.validate()?;
        let weight_sum = config.rt_weight + config.mz_weight;
        Ok(Self { config, weight_sum })
    }

    pub fn config(&self) -> &DistanceConfig {
        &self.config
    }

    fn charges_compatible(&self, left: &Point, right: &Point) -> bool {
        self.config.ignore_charge
            || left.charge() == 0
            || right.charge() == 0
            || left.charge() == right.charge()
    }
}

impl FeatureDistance for PairwiseDistance {
    fn distance(&self, left: &Point, right: &Point) -> Option<f64> {
        if !self.charges_compatible(left, right) {
            return None;
        }

        let rt_tol = self.config.rt.half_width();
        let rt_diff = (left.rt() - right.rt()).abs();
        if rt_diff > rt_tol {
            return None;
        }

        // Tolerance is relative to the left point, so the relation is not
        // strictly symmetric for ppm tolerances.
        let mz_tol = self.config.mz.half_width(left.mz());
        let mz_diff = (left.mz() - right.mz()).abs();
        if mz_diff > mz_tol {
            return None;
        }

        let weighted = self.config.rt_weight * (rt_diff / rt_tol)
            + self.config.mz_weight * (mz_diff / mz_tol);
        Some((weighted / self.weight_sum).clamp(0.0, 1.0))
    }

    fn search_window(&self, position: Position) -> SearchWindow {
        self.config.search_window(position)
    }
}
