use crate::models::point::{
    PointArena,
    PointHandle,
    Position,
    Sequence,
};
use serde::Serialize;
use std::collections::BTreeMap;

/// One emitted cross-run group: at most one point per run.
#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct ConsensusGroup {
    elements: BTreeMap<usize, PointHandle>,
    quality: f64,
    annotation: Option<Sequence>,
}

impl ConsensusGroup {
    pub(crate) fn new(
        elements: BTreeMap<usize, PointHandle>,
        quality: f64,
        annotation: Option<Sequence>,
    ) -> Self {
        debug_assert!(!elements.is_empty());
        debug_assert!((0.0..=1.0).contains(&quality));
        Self {
            elements,
            quality,
            annotation,
        }
    }

    pub(crate) fn singleton(run_index: usize, handle: PointHandle) -> Self {
        Self::new(BTreeMap::from([(run_index, handle)]), 0.0, None)
    }

    /// Run index to member point.
    pub fn elements(&self) -> &BTreeMap<usize, PointHandle> {
        &self.elements
    }

    pub fn get(&self, run_index: usize) -> Option<PointHandle> {
        self.elements.get(&run_index).copied()
    }

    pub fn handles(&self) -> impl Iterator<Item = PointHandle> + '_ {
        self.elements.values().copied()
    }

    pub fn len(&self) -> usize {
        self.elements.len()
    }

    pub fn is_empty(&self) -> bool {
        self.elements.is_empty()
    }

    pub fn is_singleton(&self) -> bool {
        self.elements.len() == 1
    }

    pub fn quality(&self) -> f64 {
        self.quality
    }

    pub fn annotation(&self) -> Option<&Sequence> {
        self.annotation.as_ref()
    }

    /// Averages over the members of the group.
    pub fn summarize(&self, points: &PointArena) -> ConsensusSummary {
        let n = self.elements.len() as f64;
        let mut rt = 0.0;
        let mut mz = 0.0;
        let mut intensity = 0.0;
        let mut charge = 0;
        for handle in self.handles() {
            let p = &points[handle];
            rt += p.rt();
            mz += p.mz();
            intensity += p.intensity();
            if charge == 0 {
                charge = p.charge();
            }
        }
        ConsensusSummary {
            position: Position::new(rt / n, mz / n),
            intensity: intensity / n,
            charge,
        }
    }
}

/// Consensus values of a group, as reported downstream.
#[derive(Debug, Clone, Copy, PartialEq, Serialize)]
pub struct ConsensusSummary {
    pub position: Position,
    pub intensity: f64,
    /// First known (non-zero) charge among the members, 0 if none.
    pub charge: i32,
}
