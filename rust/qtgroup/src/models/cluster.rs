//! A candidate group centered on one point.
//!
//! Every cluster keeps, for each run other than its center's, the candidate
//! points of that run sorted by their distance to the center. The closest
//! (annotation-compatible) candidate of every run is what the cluster would
//! contribute if it was extracted right now.
//!
//! Quality is memoized: any change to the candidate lists drops the cached
//! value, and the next [`Cluster::get_quality`] recomputes it from the
//! current candidates.

use crate::models::point::{
    PointArena,
    PointHandle,
    Sequence,
};
use std::cmp::Ordering;
use std::collections::{
    BTreeMap,
    BTreeSet,
    HashSet,
};

#[derive(Debug, Clone, Copy, PartialEq)]
pub struct Candidate {
    pub handle: PointHandle,
    pub distance: f64,
}

impl Candidate {
    /// Closest first, lower handle first among equidistant candidates.
    fn order(&self, other: &Self) -> Ordering {
        self.distance
            .total_cmp(&other.distance)
            .then_with(|| self.handle.cmp(&other.handle))
    }
}

/// Memoized result of the quality computation.
#[derive(Debug, Clone, PartialEq)]
struct QualityCache {
    quality: f64,
    annotation: Option<Sequence>,
    elements: BTreeMap<usize, PointHandle>,
}

#[derive(Debug, Clone)]
pub struct Cluster {
    center: PointHandle,
    center_run: usize,
    num_runs: usize,
    max_distance: f64,
    use_annotations: bool,
    neighbors: BTreeMap<usize, Vec<Candidate>>,
    cache: Option<QualityCache>,
    valid: bool,
    revision: u64,
}

impl Cluster {
    pub fn new(
        center: PointHandle,
        center_run: usize,
        num_runs: usize,
        max_distance: f64,
        use_annotations: bool,
    ) -> Self {
        debug_assert!(center_run < num_runs);
        debug_assert!(max_distance > 0.0);
        Self {
            center,
            center_run,
            num_runs,
            max_distance,
            use_annotations,
            neighbors: BTreeMap::new(),
            cache: None,
            valid: true,
            revision: 0,
        }
    }

    pub fn center(&self) -> PointHandle {
        self.center
    }

    pub fn center_run(&self) -> usize {
        self.center_run
    }

    pub fn max_distance(&self) -> f64 {
        self.max_distance
    }

    pub fn is_valid(&self) -> bool {
        self.valid
    }

    pub fn is_dirty(&self) -> bool {
        self.cache.is_none()
    }

    /// Bumped every time the cached quality is dropped.
    pub fn revision(&self) -> u64 {
        self.revision
    }

    /// Inserts a candidate keeping its run's list sorted.
    ///
    /// There is no duplicate check, adding the same point twice is a caller
    /// error.
    pub fn add_candidate(&mut self, handle: PointHandle, run_index: usize, distance: f64) {
        debug_assert_ne!(run_index, self.center_run, "Center run cannot hold candidates");
        debug_assert!(run_index < self.num_runs);
        let candidate = Candidate { handle, distance };
        let list = self.neighbors.entry(run_index).or_default();
        let pos = list.partition_point(|x| x.order(&candidate) == Ordering::Less);
        list.insert(pos, candidate);
        self.invalidate();
    }

    /// One for the center plus one per run holding at least one candidate.
    pub fn size(&self) -> usize {
        1 + self.neighbors.len()
    }

    pub fn num_candidates(&self) -> usize {
        self.neighbors.values().map(|x| x.len()).sum()
    }

    pub fn candidates(&self, run_index: usize) -> &[Candidate] {
        self.neighbors
            .get(&run_index)
            .map(|x| x.as_slice())
            .unwrap_or(&[])
    }

    /// Every point currently referenced by the cluster, center excluded.
    pub fn candidate_handles(&self) -> impl Iterator<Item = PointHandle> + '_ {
        self.neighbors.values().flatten().map(|x| x.handle)
    }

    /// Drops the removed points from the candidate lists.
    ///
    /// Returns `false`, and leaves the cluster permanently invalid, when the
    /// center itself was removed. Runs left without candidates disappear
    /// from the cluster. The cached quality is only dropped if something
    /// was actually removed.
    pub fn remove_points(&mut self, removed: &HashSet<PointHandle>) -> bool {
        if !self.valid || removed.contains(&self.center) {
            self.valid = false;
            return false;
        }

        let mut changed = false;
        self.neighbors.retain(|_run, list| {
            let before = list.len();
            list.retain(|c| !removed.contains(&c.handle));
            changed |= list.len() != before;
            !list.is_empty()
        });

        if changed {
            self.invalidate();
        }
        debug_assert!(self.neighbors.values().all(|x| !x.is_empty()));
        true
    }

    /// Quality in `[0, 1]`, recomputed only if the candidates changed.
    pub fn get_quality(&mut self, points: &PointArena) -> f64 {
        self.ensure_fresh(points).quality
    }

    /// The last computed quality, `None` if the cluster changed since.
    pub fn cached_quality(&self) -> Option<f64> {
        self.cache.as_ref().map(|x| x.quality)
    }

    /// The annotation that produced the best quality.
    /// Empty when annotations are not used or the center has none.
    pub fn get_annotations(&mut self, points: &PointArena) -> BTreeSet<Sequence> {
        self.ensure_fresh(points)
            .annotation
            .iter()
            .cloned()
            .collect()
    }

    pub fn best_annotation(&mut self, points: &PointArena) -> Option<Sequence> {
        self.ensure_fresh(points).annotation.clone()
    }

    /// The point every run would contribute if the cluster was extracted now,
    /// the center's run mapping to the center itself.
    ///
    /// With annotations in use, only candidates compatible with the best
    /// annotation are eligible; runs without an eligible one are left out.
    pub fn get_elements(&mut self, points: &PointArena) -> BTreeMap<usize, PointHandle> {
        self.ensure_fresh(points).elements.clone()
    }

    /// Number of points the cluster would emit now, center included.
    pub fn element_count(&mut self, points: &PointArena) -> usize {
        self.ensure_fresh(points).elements.len()
    }

    /// Ordering key for extraction, `None` if the quality is stale.
    pub fn priority(&self) -> Option<ClusterPriority> {
        self.cached_quality().map(|quality| ClusterPriority {
            quality,
            center: self.center,
        })
    }

    fn invalidate(&mut self) {
        self.cache = None;
        self.revision += 1;
    }

    fn ensure_fresh(&mut self, points: &PointArena) -> &QualityCache {
        if self.cache.is_none() {
            self.cache = Some(self.compute_quality(points));
        }
        self.cache
            .as_ref()
            .expect("Quality cache was filled right above")
    }

    fn compute_quality(&self, points: &PointArena) -> QualityCache {
        if self.size() <= 1 {
            return QualityCache {
                quality: 0.0,
                annotation: None,
                elements: BTreeMap::from([(self.center_run, self.center)]),
            };
        }

        let center_annotations = points[self.center].annotations();
        if !self.use_annotations || center_annotations.is_empty() {
            return self.evaluate(points, None);
        }
        self.optimize_annotations(points, center_annotations)
    }

    /// Tries every annotation of the center and keeps the best one.
    ///
    /// Annotations are visited in lexicographic order and only a strictly
    /// better quality replaces the current best, so ties keep the
    /// lexicographically smallest annotation.
    fn optimize_annotations(
        &self,
        points: &PointArena,
        center_annotations: &BTreeSet<Sequence>,
    ) -> QualityCache {
        let mut best: Option<QualityCache> = None;
        for annotation in center_annotations {
            let current = self.evaluate(points, Some(annotation));
            match &best {
                Some(b) if current.quality <= b.quality => {}
                _ => best = Some(current),
            }
        }
        best.expect("Center annotations are not empty")
    }

    fn evaluate(&self, points: &PointArena, annotation: Option<&Sequence>) -> QualityCache {
        let mut elements = BTreeMap::from([(self.center_run, self.center)]);
        // The center contributes a distance of zero for its own run.
        let mut total_distance = 0.0;
        for (run_index, list) in &self.neighbors {
            let chosen = list
                .iter()
                .find(|c| points[c.handle].is_compatible_with(annotation));
            if let Some(c) = chosen {
                total_distance += c.distance.min(self.max_distance);
                elements.insert(*run_index, c.handle);
            }
        }

        let missing_runs = self.num_runs - elements.len();
        total_distance += missing_runs as f64 * self.max_distance;

        let quality = if elements.len() <= 1 {
            0.0
        } else {
            let avg = total_distance / self.num_runs as f64;
            (1.0 - avg / self.max_distance).clamp(0.0, 1.0)
        };

        QualityCache {
            quality,
            annotation: annotation.cloned(),
            elements,
        }
    }
}

/// Extraction order of clusters: higher quality first, then lower center
/// handle, so that results do not depend on iteration order.
#[derive(Debug, Clone, Copy)]
pub struct ClusterPriority {
    pub quality: f64,
    pub center: PointHandle,
}

impl PartialEq for ClusterPriority {
    fn eq(&self, other: &Self) -> bool {
        self.cmp(other) == Ordering::Equal
    }
}

impl Eq for ClusterPriority {}

impl Ord for ClusterPriority {
    fn cmp(&self, other: &Self) -> Ordering {
        self.quality
            .total_cmp(&other.quality)
            .then_with(|| other.center.cmp(&self.center))
    }
}

impl PartialOrd for ClusterPriority {
    fn partial_cmp(&self, other: &Self) -> Option<Ordering> {
        Some(self.cmp(other))
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::point::Feature;

    const TOL: f64 = 1e-9;

    /// Three runs, one point per run, all at the same spot.
    fn three_points() -> (PointArena, [PointHandle; 3]) {
        let mut arena = PointArena::new(3);
        let a = arena.push(0, Feature::new(100.0, 500.0, 1.0));
        let b = arena.push(1, Feature::new(100.0, 500.05, 1.0));
        let c = arena.push(2, Feature::new(100.0, 500.1, 1.0));
        (arena, [a, b, c])
    }

    #[test]
    fn test_new_cluster_is_singleton_with_zero_quality() {
        let (arena, [a, ..]) = three_points();
        let mut cluster = Cluster::new(a, 0, 3, 1.0, false);
        assert!(cluster.is_dirty());
        assert_eq!(cluster.size(), 1);
        assert_eq!(cluster.get_quality(&arena), 0.0);
        assert!(!cluster.is_dirty());
        assert_eq!(cluster.get_elements(&arena), BTreeMap::from([(0, a)]));
    }

    #[test]
    fn test_missing_run_is_charged_max_distance() {
        let (arena, [a, b, _]) = three_points();
        let mut cluster = Cluster::new(a, 0, 3, 1.0, false);
        cluster.add_candidate(b, 1, 0.05);

        assert_eq!(cluster.size(), 2);
        assert_eq!(cluster.candidates(1), &[Candidate { handle: b, distance: 0.05 }]);
        // (0.0 + 0.05 + 1.0) / 3 = 0.35
        assert!((cluster.get_quality(&arena) - 0.65).abs() < TOL);
        assert_eq!(
            cluster.get_elements(&arena),
            BTreeMap::from([(0, a), (1, b)])
        );
    }

    #[test]
    fn test_candidates_sorted_with_handle_tie_break() {
        let mut arena = PointArena::new(2);
        let center = arena.push(0, Feature::new(1.0, 1.0, 1.0));
        let p1 = arena.push(1, Feature::new(1.0, 1.0, 1.0));
        let p2 = arena.push(1, Feature::new(1.0, 1.0, 1.0));
        let p3 = arena.push(1, Feature::new(1.0, 1.0, 1.0));

        let mut cluster = Cluster::new(center, 0, 2, 1.0, false);
        cluster.add_candidate(p3, 1, 0.2);
        cluster.add_candidate(p2, 1, 0.1);
        cluster.add_candidate(p1, 1, 0.2);

        let order: Vec<PointHandle> = cluster.candidates(1).iter().map(|c| c.handle).collect();
        assert_eq!(order, vec![p2, p1, p3]);
        assert_eq!(cluster.get_elements(&arena)[&1], p2);
    }

    #[test]
    fn test_remove_points_drops_empty_runs() {
        let (arena, [a, b, c]) = three_points();
        let mut cluster = Cluster::new(a, 0, 3, 1.0, false);
        cluster.add_candidate(b, 1, 0.05);
        cluster.add_candidate(c, 2, 0.1);
        let before = cluster.get_quality(&arena);

        assert!(cluster.remove_points(&HashSet::from([b])));
        assert!(cluster.is_dirty());
        assert_eq!(cluster.size(), 2);
        assert!(cluster.candidates(1).is_empty());
        assert!(cluster.get_quality(&arena) < before);
    }

    #[test]
    fn test_disjoint_removal_keeps_cache() {
        let (arena, [a, b, c]) = three_points();
        let mut cluster = Cluster::new(a, 0, 3, 1.0, false);
        cluster.add_candidate(b, 1, 0.05);
        let quality = cluster.get_quality(&arena);
        let revision = cluster.revision();

        assert!(cluster.remove_points(&HashSet::from([c])));
        assert!(!cluster.is_dirty());
        assert_eq!(cluster.revision(), revision);
        assert_eq!(cluster.cached_quality(), Some(quality));
        assert_eq!(cluster.candidates(1).len(), 1);
    }

    #[test]
    fn test_center_removal_invalidates_for_good() {
        let (_arena, [a, b, c]) = three_points();
        let mut cluster = Cluster::new(a, 0, 3, 1.0, false);
        cluster.add_candidate(b, 1, 0.05);

        assert!(!cluster.remove_points(&HashSet::from([a, b, c])));
        assert!(!cluster.is_valid());
        assert!(!cluster.remove_points(&HashSet::new()));
    }

    #[test]
    fn test_more_missing_runs_never_score_higher() {
        let mut arena = PointArena::new(4);
        let center = arena.push(0, Feature::new(1.0, 1.0, 1.0));
        let others: Vec<PointHandle> = (1..4)
            .map(|run| arena.push(run, Feature::new(1.0, 1.0, 1.0)))
            .collect();

        let mut previous = f64::INFINITY;
        for missing in 0..3 {
            let mut cluster = Cluster::new(center, 0, 4, 1.0, false);
            for (i, h) in others.iter().enumerate().skip(missing) {
                cluster.add_candidate(*h, i + 1, 0.3);
            }
            let quality = cluster.get_quality(&arena);
            assert!(quality <= previous);
            assert!((0.0..=1.0).contains(&quality));
            previous = quality;
        }
    }

    #[test]
    fn test_annotation_optimization_picks_best_label() {
        let mut arena = PointArena::new(3);
        let center = arena.push(
            0,
            Feature::new(1.0, 1.0, 1.0).with_annotations(["PEP1", "PEP2"]),
        );
        let in_run1 = arena.push(1, Feature::new(1.0, 1.0, 1.0).with_annotations(["PEP2"]));
        let in_run2 = arena.push(2, Feature::new(1.0, 1.0, 1.0).with_annotations(["PEP1"]));

        let mut cluster = Cluster::new(center, 0, 3, 1.0, true);
        cluster.add_candidate(in_run1, 1, 0.1);
        cluster.add_candidate(in_run2, 2, 0.2);

        // PEP1: (0 + 1.0 + 0.2) / 3 = 0.4  -> 0.6
        // PEP2: (0 + 0.1 + 1.0) / 3 = 0.3667 -> 0.6333
        let quality = cluster.get_quality(&arena);
        assert!((quality - (1.0 - 1.1 / 3.0)).abs() < TOL);
        assert_eq!(
            cluster.get_annotations(&arena),
            BTreeSet::from(["PEP2".to_string()])
        );
        assert_eq!(
            cluster.get_elements(&arena),
            BTreeMap::from([(0, center), (1, in_run1)])
        );
    }

    #[test]
    fn test_annotation_ties_prefer_lexicographic_order() {
        let mut arena = PointArena::new(2);
        let center = arena.push(
            0,
            Feature::new(1.0, 1.0, 1.0).with_annotations(["BBB", "AAA"]),
        );
        let plain = arena.push(1, Feature::new(1.0, 1.0, 1.0));

        let mut cluster = Cluster::new(center, 0, 2, 1.0, true);
        cluster.add_candidate(plain, 1, 0.5);
        assert!((cluster.get_quality(&arena) - 0.75).abs() < TOL);
        assert_eq!(cluster.best_annotation(&arena), Some("AAA".to_string()));
    }

    #[test]
    fn test_annotations_ignored_when_disabled_or_center_unlabeled() {
        let mut arena = PointArena::new(2);
        let labeled_center = arena.push(
            0,
            Feature::new(1.0, 1.0, 1.0).with_annotations(["PEP1"]),
        );
        let plain_center = arena.push(0, Feature::new(1.0, 1.0, 1.0));
        let other = arena.push(1, Feature::new(1.0, 1.0, 1.0).with_annotations(["PEP9"]));

        let mut disabled = Cluster::new(labeled_center, 0, 2, 1.0, false);
        disabled.add_candidate(other, 1, 0.0);
        assert_eq!(disabled.get_quality(&arena), 1.0);
        assert!(disabled.get_annotations(&arena).is_empty());

        let mut unlabeled = Cluster::new(plain_center, 0, 2, 1.0, true);
        unlabeled.add_candidate(other, 1, 0.0);
        assert_eq!(unlabeled.get_quality(&arena), 1.0);
        assert!(unlabeled.get_annotations(&arena).is_empty());

        // Enabled and labeled: the only candidate is incompatible
        let mut strict = Cluster::new(labeled_center, 0, 2, 1.0, true);
        strict.add_candidate(other, 1, 0.0);
        assert_eq!(strict.size(), 2);
        assert_eq!(strict.get_quality(&arena), 0.0);
        assert_eq!(strict.get_elements(&arena).len(), 1);
    }

    #[test]
    fn test_priority_ordering() {
        let low = ClusterPriority {
            quality: 0.5,
            center: PointHandle::new(0),
        };
        let high = ClusterPriority {
            quality: 0.9,
            center: PointHandle::new(5),
        };
        let tie_late = ClusterPriority {
            quality: 0.9,
            center: PointHandle::new(7),
        };
        assert!(high > low);
        assert!(high > tie_late);
    }

    #[test]
    fn test_priority_equality_agrees_with_ordering() {
        let positive = ClusterPriority {
            quality: 0.0,
            center: PointHandle::new(1),
        };
        let negative = ClusterPriority {
            quality: -0.0,
            center: PointHandle::new(1),
        };
        assert_ne!(positive.cmp(&negative), Ordering::Equal);
        assert_ne!(positive, negative);
        let same = positive;
        assert_eq!(positive, same);
        assert_eq!(positive == negative, positive.cmp(&negative) == Ordering::Equal);
    }
}
