//! Greedy extraction of the best cluster, one group at a time.
//!
//! Selection uses a max-heap with lazy deletion. Every entry carries the
//! revision of the cluster it was computed from; an entry whose cluster has
//! since changed (or was dropped) is skipped when popped. Removing points
//! from a cluster can never raise its quality, so the first fresh entry
//! popped is the true maximum.

use super::GroupingEngine;
use crate::engine::stats::GroupingStats;
use crate::models::cluster::{
    Cluster,
    ClusterPriority,
};
use crate::models::group::ConsensusGroup;
use crate::models::point::PointHandle;
use crate::traits::{
    FeatureDistance,
    SpatialIndex,
};
use indicatif::ProgressBar;
use rayon::prelude::*;
use std::collections::{
    BTreeSet,
    BinaryHeap,
    HashMap,
    HashSet,
};
use std::time::Instant;
use tracing::{
    debug,
    trace,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum GroupingPhase {
    Building,
    Extracting,
    Done,
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, PartialOrd, Ord)]
struct HeapEntry {
    priority: ClusterPriority,
    slot: usize,
    revision: u64,
}

/// Iterator over the groups of one partition, in extraction order.
///
/// Clusters are built on the first call to `next`. Once the iterator is
/// exhausted, [`Extraction::remaining`] lists the points that were never
/// grouped.
pub struct Extraction<'e, 'a, D, S> {
    engine: &'e GroupingEngine<'a, D, S>,
    /// Sorted handles of the partition, indexed by slot.
    members: Vec<PointHandle>,
    slots: HashMap<PointHandle, usize>,
    clusters: Vec<Option<Cluster>>,
    /// Slots of the clusters holding the point of a slot as a candidate.
    holders: Vec<Vec<usize>>,
    consumed: Vec<bool>,
    heap: BinaryHeap<HeapEntry>,
    phase: GroupingPhase,
    progress: ProgressBar,
    stats: GroupingStats,
}

impl<'e, 'a, D: FeatureDistance, S: SpatialIndex> Extraction<'e, 'a, D, S> {
    pub(crate) fn new(
        engine: &'e GroupingEngine<'a, D, S>,
        mut members: Vec<PointHandle>,
        progress: ProgressBar,
    ) -> Self {
        members.sort_unstable();
        members.dedup();
        let slots = members
            .iter()
            .enumerate()
            .map(|(slot, handle)| (*handle, slot))
            .collect();
        let consumed = vec![false; members.len()];
        let stats = GroupingStats {
            num_points: members.len(),
            num_partitions: 1,
            ..Default::default()
        };
        Self {
            engine,
            members,
            slots,
            clusters: Vec::new(),
            holders: Vec::new(),
            consumed,
            heap: BinaryHeap::new(),
            phase: GroupingPhase::Building,
            progress,
            stats,
        }
    }

    pub fn phase(&self) -> GroupingPhase {
        self.phase
    }

    pub fn stats(&self) -> &GroupingStats {
        &self.stats
    }

    pub fn into_stats(self) -> GroupingStats {
        self.stats
    }

    /// Points of the partition not consumed by any group so far, in handle
    /// order.
    pub fn remaining(&self) -> impl Iterator<Item = PointHandle> + '_ {
        self.members
            .iter()
            .zip(self.consumed.iter())
            .filter(|(_, consumed)| !**consumed)
            .map(|(handle, _)| *handle)
    }

    fn start(&mut self) {
        let timer = Instant::now();
        let points = self.engine.points();
        let mut clusters = self.engine.build_clusters_in(&self.members, &self.slots);

        let mut holders = vec![Vec::new(); self.members.len()];
        for (slot, cluster) in clusters.iter().enumerate() {
            for handle in cluster.candidate_handles() {
                if let Some(&held) = self.slots.get(&handle) {
                    holders[held].push(slot);
                }
            }
        }

        clusters.par_iter_mut().for_each(|cluster| {
            cluster.element_count(points);
        });

        let mut heap = BinaryHeap::with_capacity(clusters.len());
        for (slot, cluster) in clusters.iter_mut().enumerate() {
            if cluster.element_count(points) < 2 {
                continue;
            }
            if let Some(priority) = cluster.priority() {
                heap.push(HeapEntry {
                    priority,
                    slot,
                    revision: cluster.revision(),
                });
            }
        }

        debug!(
            "Built {} clusters, {} of them extractable",
            clusters.len(),
            heap.len()
        );
        self.stats.clusters_built = clusters.len();
        self.clusters = clusters.into_iter().map(Some).collect();
        self.holders = holders;
        self.heap = heap;
        self.stats.build_time += timer.elapsed();
        self.phase = GroupingPhase::Extracting;
    }

    fn finish(&mut self) {
        self.phase = GroupingPhase::Done;
        self.heap.clear();
        self.clusters.clear();
        self.holders.clear();
        debug!(
            "Extraction done: {} groups, {} points left",
            self.stats.groups_extracted,
            self.remaining().count()
        );
    }

    /// Pops the best fresh cluster, `None` once nothing extractable is left
    /// or the best quality fell below the cutoff.
    fn pop_best(&mut self) -> Option<Cluster> {
        let min_quality = self.engine.config().min_quality;
        while let Some(entry) = self.heap.pop() {
            let fresh = matches!(
                &self.clusters[entry.slot],
                Some(c) if c.revision() == entry.revision
            );
            if !fresh {
                continue;
            }
            if entry.priority.quality < min_quality {
                debug!(
                    "Best remaining quality {:.4} is below the cutoff {:.4}",
                    entry.priority.quality, min_quality
                );
                return None;
            }
            return self.clusters[entry.slot].take();
        }
        None
    }

    fn extract(&mut self, mut cluster: Cluster) -> ConsensusGroup {
        let points = self.engine.points();
        let quality = cluster.get_quality(points);
        let annotation = cluster.best_annotation(points);
        let elements = cluster.get_elements(points);
        debug_assert!(elements.len() > 1);

        let removed: HashSet<PointHandle> = elements.values().copied().collect();
        let mut affected = BTreeSet::new();
        for handle in &removed {
            let Some(&slot) = self.slots.get(handle) else {
                continue;
            };
            self.consumed[slot] = true;
            affected.insert(slot);
            affected.extend(self.holders[slot].iter().copied());
        }

        let mut refresh = Vec::new();
        for slot in affected {
            let Some(mut other) = self.clusters[slot].take() else {
                continue;
            };
            if !other.remove_points(&removed) {
                continue;
            }
            if other.is_dirty() {
                refresh.push((slot, other));
            } else {
                self.clusters[slot] = Some(other);
            }
        }

        refresh.par_iter_mut().for_each(|(_, other)| {
            other.element_count(points);
        });
        self.stats.quality_recomputations += refresh.len();

        for (slot, mut other) in refresh {
            // Candidates only ever shrink, a cluster that cannot emit a
            // group now never will.
            if other.element_count(points) < 2 {
                continue;
            }
            if let Some(priority) = other.priority() {
                self.heap.push(HeapEntry {
                    priority,
                    slot,
                    revision: other.revision(),
                });
            }
            self.clusters[slot] = Some(other);
        }

        self.stats.groups_extracted += 1;
        self.progress.inc(removed.len() as u64);
        trace!(
            "Extracted group of {} centered at {:?} with quality {:.4}",
            elements.len(),
            cluster.center(),
            quality
        );
        ConsensusGroup::new(elements, quality, annotation)
    }
}

impl<D: FeatureDistance, S: SpatialIndex> Iterator for Extraction<'_, '_, D, S> {
    type Item = ConsensusGroup;

    fn next(&mut self) -> Option<Self::Item> {
        if self.phase == GroupingPhase::Building {
            self.start();
        }
        if self.phase == GroupingPhase::Done {
            return None;
        }

        let timer = Instant::now();
        let out = self.pop_best().map(|cluster| self.extract(cluster));
        self.stats.extraction_time += timer.elapsed();
        if out.is_none() {
            self.finish();
        }
        out
    }
}

impl<D: FeatureDistance, S: SpatialIndex> std::iter::FusedIterator for Extraction<'_, '_, D, S> {}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::engine::GroupingConfig;
    use crate::models::indices::MzSortedIndex;
    use crate::models::point::{
        Feature,
        Point,
        PointArena,
    };
    use crate::models::tolerance::SearchWindow;
    use crate::traits::DistanceFn;

    fn mz_distance() -> DistanceFn<impl Fn(&Point, &Point) -> Option<f64> + Sync> {
        DistanceFn::new(SearchWindow::new(100.0, 1.0), |a: &Point, b: &Point| {
            Some((a.mz() - b.mz()).abs())
        })
    }

    fn engine_for(
        points: &PointArena,
        config: GroupingConfig,
    ) -> GroupingEngine<'_, impl FeatureDistance, MzSortedIndex> {
        let index = MzSortedIndex::build(points);
        GroupingEngine::new(points, config, mz_distance(), index).unwrap()
    }

    #[test]
    fn test_phases() {
        let points = PointArena::from_runs(vec![
            vec![Feature::new(10.0, 500.0, 1.0)],
            vec![Feature::new(10.0, 500.1, 1.0)],
        ]);
        let engine = engine_for(&points, GroupingConfig::default());
        let mut extraction = engine.extraction(points.handles().collect());
        assert_eq!(extraction.phase(), GroupingPhase::Building);

        let group = extraction.next().unwrap();
        assert_eq!(group.len(), 2);
        assert_eq!(extraction.phase(), GroupingPhase::Extracting);

        assert!(extraction.next().is_none());
        assert_eq!(extraction.phase(), GroupingPhase::Done);
        assert!(extraction.next().is_none());
        assert_eq!(extraction.remaining().count(), 0);
        assert_eq!(extraction.stats().clusters_built, 2);
    }

    #[test]
    fn test_best_cluster_goes_first_and_consumes_points() {
        // Run 0: A(500.0)          C(700.0)
        // Run 1: B(500.1)          D(700.4)
        // Run 2: E(500.2)
        let points = PointArena::from_runs(vec![
            vec![Feature::new(10.0, 500.0, 1.0), Feature::new(10.0, 700.0, 1.0)],
            vec![Feature::new(10.0, 500.1, 1.0), Feature::new(10.0, 700.4, 1.0)],
            vec![Feature::new(10.0, 500.2, 1.0)],
        ]);
        let engine = engine_for(&points, GroupingConfig::default());
        let mut extraction = engine.extraction(points.handles().collect());
        let groups: Vec<_> = extraction.by_ref().collect();
        assert_eq!(groups.len(), 2);

        // Three of three runs present beats two of three.
        assert_eq!(groups[0].len(), 3);
        assert_eq!(groups[1].len(), 2);
        assert!(groups[0].quality() >= groups[1].quality());

        let mzs: Vec<f64> = groups[1].handles().map(|h| points[h].mz()).collect();
        assert_eq!(mzs, vec![700.0, 700.4]);
        assert_eq!(extraction.remaining().count(), 0);
    }

    #[test]
    fn test_removal_updates_affected_clusters() {
        // B is the closest partner of both A and C; once A takes it, C's
        // cluster must fall back to D.
        let points = PointArena::from_runs(vec![
            vec![Feature::new(10.0, 500.0, 1.0), Feature::new(10.0, 500.3, 1.0)],
            vec![Feature::new(10.0, 500.05, 1.0), Feature::new(10.0, 500.9, 1.0)],
        ]);
        let handles: Vec<PointHandle> = points.handles().collect();
        let (a, c, b, d) = (handles[0], handles[1], handles[2], handles[3]);

        let engine = engine_for(&points, GroupingConfig::default());
        let groups: Vec<_> = engine.extraction(handles.clone()).collect();
        assert_eq!(groups.len(), 2);
        assert_eq!(groups[0].get(0), Some(a));
        assert_eq!(groups[0].get(1), Some(b));
        assert_eq!(groups[1].get(0), Some(c));
        assert_eq!(groups[1].get(1), Some(d));
    }

    #[test]
    fn test_min_quality_stops_extraction() {
        let points = PointArena::from_runs(vec![
            vec![Feature::new(10.0, 500.0, 1.0)],
            vec![Feature::new(10.0, 500.5, 1.0)],
        ]);
        // Quality of the only pair is 1 - 0.5 / 2 = 0.75
        let config = GroupingConfig::default().with_min_quality(0.8);
        let engine = engine_for(&points, config);
        let mut extraction = engine.extraction(points.handles().collect());
        assert!(extraction.next().is_none());
        assert_eq!(extraction.phase(), GroupingPhase::Done);
        assert_eq!(extraction.remaining().count(), 2);
    }

    #[test]
    fn test_lonely_points_are_never_extracted() {
        let points = PointArena::from_runs(vec![
            vec![Feature::new(10.0, 100.0, 1.0)],
            vec![Feature::new(10.0, 900.0, 1.0)],
        ]);
        let engine = engine_for(&points, GroupingConfig::default());
        let mut extraction = engine.extraction(points.handles().collect());
        assert!(extraction.next().is_none());
        let left: Vec<PointHandle> = extraction.remaining().collect();
        assert_eq!(left, points.handles().collect::<Vec<_>>());
    }
}
