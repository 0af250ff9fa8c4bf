use crate::errors::{
    GroupingError,
    Result,
};
use crate::models::point::Position;
use crate::utils::TupleRange;
use serde::{
    Deserialize,
    Serialize,
};

/// Convention:
/// In contrast with how some software defines tolerance, here we define the
/// ranges in terms of positive values. For instance, a tolerance of 1 on a
/// value of 10 means a range of (9, 11).
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MzTolerance {
    #[serde(rename = "da")]
    Absolute(f64),
    #[serde(rename = "ppm")]
    Ppm(f64),
}

#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum RtTolerance {
    #[serde(rename = "seconds")]
    Seconds(f64),
}

impl Default for MzTolerance {
    fn default() -> Self {
        MzTolerance::Ppm(10.0)
    }
}

impl Default for RtTolerance {
    fn default() -> Self {
        RtTolerance::Seconds(100.0)
    }
}

impl MzTolerance {
    /// Half width of the accepted m/z window around `mz`, in daltons.
    pub fn half_width(&self, mz: f64) -> f64 {
        match self {
            MzTolerance::Absolute(da) => *da,
            MzTolerance::Ppm(ppm) => mz.abs() * ppm / 1e6,
        }
    }

    pub fn mz_range(&self, mz: f64) -> Result<TupleRange<f64>> {
        TupleRange::around(mz, self.half_width(mz))
            .map_err(|e| GroupingError::InvalidTolerance(e.to_string()))
    }

    fn value(&self) -> f64 {
        match self {
            MzTolerance::Absolute(x) | MzTolerance::Ppm(x) => *x,
        }
    }
}

impl RtTolerance {
    pub fn half_width(&self) -> f64 {
        match self {
            RtTolerance::Seconds(x) => *x,
        }
    }
}

/// Half widths of the box searched around a query position.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct SearchWindow {
    pub rt: f64,
    pub mz: f64,
}

impl SearchWindow {
    pub fn new(rt: f64, mz: f64) -> Self {
        Self { rt, mz }
    }

    pub fn rt_range(&self, center: Position) -> Option<TupleRange<f64>> {
        TupleRange::around(center.rt, self.rt).ok()
    }

    pub fn mz_range(&self, center: Position) -> Option<TupleRange<f64>> {
        TupleRange::around(center.mz, self.mz).ok()
    }

    pub fn contains(&self, center: Position, other: Position) -> bool {
        (other.rt - center.rt).abs() <= self.rt && (other.mz - center.mz).abs() <= self.mz
    }
}

/// Tolerances of the default pairwise distance.
///
/// Example:
/// ```
/// use qtgroup::models::tolerance::{DistanceConfig, MzTolerance};
///
/// let config = DistanceConfig::default().with_mz_tolerance(MzTolerance::Absolute(0.01));
/// assert!(config.validate().is_ok());
/// ```
#[derive(Debug, Clone, Serialize, Deserialize, PartialEq)]
#[serde(default)]
pub struct DistanceConfig {
    pub rt: RtTolerance,
    pub mz: MzTolerance,
    pub rt_weight: f64,
    pub mz_weight: f64,
    /// Allow grouping features with different known charges.
    pub ignore_charge: bool,
}

impl Default for DistanceConfig {
    fn default() -> Self {
        Self {
            rt: RtTolerance::default(),
            mz: MzTolerance::default(),
            rt_weight: 1.0,
            mz_weight: 1.0,
            ignore_charge: false,
        }
    }
}

impl DistanceConfig {
    pub fn validate(&self) -> Result<()> {
        let rt = self.rt.half_width();
        if !(rt.is_finite() && rt > 0.0) {
            return Err(GroupingError::InvalidTolerance(format!(
                "rt tolerance must be positive, got {}",
                rt
            )));
        }
        let mz = self.mz.value();
        if !(mz.is_finite() && mz > 0.0) {
            return Err(GroupingError::InvalidTolerance(format!(
                "mz tolerance must be positive, got {}",
                mz
            )));
        }
        let weights_ok = [self.rt_weight, self.mz_weight]
            .iter()
            .all(|w| w.is_finite() && *w >= 0.0);
        if !weights_ok || self.rt_weight + self.mz_weight <= 0.0 {
            return Err(GroupingError::InvalidTolerance(format!(
                "weights must be non-negative with a positive sum, got rt={} mz={}",
                self.rt_weight, self.mz_weight
            )));
        }
        Ok(())
    }

    pub fn with_rt_tolerance(self, rt: RtTolerance) -> Self {
        Self { rt, ..self }
    }

    pub fn with_mz_tolerance(self, mz: MzTolerance) -> Self {
        Self { mz, ..self }
    }

    pub fn with_weights(self, rt_weight: f64, mz_weight: f64) -> Self {
        Self {
            rt_weight,
            mz_weight,
            ..self
        }
    }

    pub fn with_ignore_charge(self, ignore_charge: bool) -> Self {
        Self {
            ignore_charge,
            ..self
        }
    }

    pub fn search_window(&self, position: Position) -> SearchWindow {
        SearchWindow::new(self.rt.half_width(), self.mz.half_width(position.mz))
    }
}
