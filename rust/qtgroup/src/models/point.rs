use crate::errors::{
    GroupingError,
    Result,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::collections::BTreeSet;
use tracing::warn;

/// A peptide sequence used as a feature annotation.
pub type Sequence = String;

/// Stable identity of a point inside a [`PointArena`].
///
/// Two points can share the exact same position, so points are always
/// compared by handle and never by value.
#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord, Hash, Serialize, Deserialize)]
pub struct PointHandle(usize);

impl PointHandle {
    pub(crate) fn new(index: usize) -> Self {
        Self(index)
    }

    pub fn index(&self) -> usize {
        self.0
    }
}

/// Location of a feature on the retention time / m/z plane.
#[derive(Debug, Clone, Copy, PartialEq, Default, Serialize, Deserialize)]
pub struct Position {
    pub rt: f64,
    pub mz: f64,
}

impl Position {
    pub fn new(rt: f64, mz: f64) -> Self {
        Self { rt, mz }
    }

    pub fn is_finite(&self) -> bool {
        self.rt.is_finite() && self.mz.is_finite()
    }
}

/// A detected feature as handed over by the map-loading layer.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct Feature {
    pub rt: f64,
    pub mz: f64,
    pub intensity: f64,
    /// 0 means unknown.
    #[serde(default)]
    pub charge: i32,
    #[serde(default)]
    pub annotations: BTreeSet<Sequence>,
}

impl Feature {
    pub fn new(rt: f64, mz: f64, intensity: f64) -> Self {
        Self {
            rt,
            mz,
            intensity,
            ..Default::default()
        }
    }

    pub fn with_charge(self, charge: i32) -> Self {
        Self { charge, ..self }
    }

    pub fn with_annotations<I, S>(self, annotations: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<Sequence>,
    {
        Self {
            annotations: annotations.into_iter().map(Into::into).collect(),
            ..self
        }
    }
}

/// One feature of one run, immutable once it is in the arena.
#[derive(Debug, Clone, PartialEq)]
pub struct Point {
    run_index: usize,
    source_index: usize,
    position: Position,
    intensity: f64,
    charge: i32,
    annotations: BTreeSet<Sequence>,
}

impl Point {
    pub fn run_index(&self) -> usize {
        self.run_index
    }

    /// Index of the feature within its own run, in input order.
    pub fn source_index(&self) -> usize {
        self.source_index
    }

    pub fn position(&self) -> Position {
        self.position
    }

    pub fn rt(&self) -> f64 {
        self.position.rt
    }

    pub fn mz(&self) -> f64 {
        self.position.mz
    }

    pub fn intensity(&self) -> f64 {
        self.intensity
    }

    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn annotations(&self) -> &BTreeSet<Sequence> {
        &self.annotations
    }

    /// A point without annotations is compatible with every annotation.
    pub fn is_compatible_with(&self, annotation: Option<&Sequence>) -> bool {
        match annotation {
            None => true,
            Some(a) => self.annotations.is_empty() || self.annotations.contains(a),
        }
    }
}

/// Owner of every point taking part in one grouping pass.
///
/// Clusters, indices and output groups only ever hold [`PointHandle`]s
/// into this arena.
#[derive(Debug, Clone, Default)]
pub struct PointArena {
    points: Vec<Point>,
    run_sizes: Vec<usize>,
    num_runs: usize,
}

impl PointArena {
    /// Creates an empty arena expecting `num_runs` input runs.
    pub fn new(num_runs: usize) -> Self {
        Self {
            points: Vec::new(),
            run_sizes: vec![0; num_runs],
            num_runs,
        }
    }

    /// Loads one ordered collection of features per run.
    /// The run index of every point is the position of its run in `runs`.
    pub fn from_runs<R, I>(runs: R) -> Self
    where
        R: IntoIterator<Item = I>,
        I: IntoIterator<Item = Feature>,
    {
        let mut out = Self::new(0);
        for (run_index, run) in runs.into_iter().enumerate() {
            out.num_runs = run_index + 1;
            if out.run_sizes.len() < out.num_runs {
                out.run_sizes.resize(out.num_runs, 0);
            }
            for feature in run {
                out.push(run_index, feature);
            }
        }
        out
    }

    /// Adds a feature to the arena.
    ///
    /// The run index is not checked here, see [`PointArena::validate`].
    pub fn push(&mut self, run_index: usize, feature: Feature) -> PointHandle {
        if self.run_sizes.len() <= run_index {
            self.run_sizes.resize(run_index + 1, 0);
        }
        let source_index = self.run_sizes[run_index];
        self.run_sizes[run_index] += 1;

        let handle = PointHandle::new(self.points.len());
        self.points.push(Point {
            run_index,
            source_index,
            position: Position::new(feature.rt, feature.mz),
            intensity: feature.intensity,
            charge: feature.charge,
            annotations: feature.annotations,
        });
        handle
    }

    pub fn get(&self, handle: PointHandle) -> &Point {
        &self.points[handle.index()]
    }

    pub fn len(&self) -> usize {
        self.points.len()
    }

    pub fn is_empty(&self) -> bool {
        self.points.is_empty()
    }

    pub fn num_runs(&self) -> usize {
        self.num_runs
    }

    /// Number of points loaded for `run_index`.
    pub fn run_size(&self, run_index: usize) -> usize {
        self.run_sizes.get(run_index).copied().unwrap_or(0)
    }

    pub fn handles(&self) -> impl ExactSizeIterator<Item = PointHandle> + '_ {
        (0..self.points.len()).map(PointHandle::new)
    }

    pub fn iter(&self) -> impl ExactSizeIterator<Item = (PointHandle, &Point)> + '_ {
        self.points
            .iter()
            .enumerate()
            .map(|(i, p)| (PointHandle::new(i), p))
    }

    /// Checks the arena can be grouped: at least two runs, every run index
    /// within range and every position finite.
    ///
    /// Runs without points are accepted, they only produce penalties.
    pub fn validate(&self) -> Result<()> {
        if self.num_runs < 2 {
            return Err(GroupingError::TooFewRuns {
                num_runs: self.num_runs,
            });
        }
        for (handle, point) in self.iter() {
            if point.run_index >= self.num_runs {
                return Err(GroupingError::InvalidRunIndex {
                    handle,
                    run_index: point.run_index,
                    num_runs: self.num_runs,
                });
            }
            if !point.position.is_finite() {
                return Err(GroupingError::NonFinitePosition {
                    handle,
                    rt: point.rt(),
                    mz: point.mz(),
                });
            }
        }
        for run_index in 0..self.num_runs {
            if self.run_size(run_index) == 0 {
                warn!("Run {} contributes no features", run_index);
            }
        }
        Ok(())
    }
}

impl std::ops::Index<PointHandle> for PointArena {
    type Output = Point;

    fn index(&self, handle: PointHandle) -> &Self::Output {
        self.get(handle)
    }
}
