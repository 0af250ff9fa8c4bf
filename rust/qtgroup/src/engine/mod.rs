pub mod config;
pub mod extraction;
pub mod partition;
pub mod stats;

pub use config::GroupingConfig;
pub use extraction::{
    Extraction,
    GroupingPhase,
};
pub use partition::partition_by_mz_gaps;
pub use stats::GroupingStats;

use crate::errors::Result;
use crate::models::cluster::Cluster;
use crate::models::distance::PairwiseDistance;
use crate::models::group::ConsensusGroup;
use crate::models::indices::MzSortedIndex;
use crate::models::point::{
    PointArena,
    PointHandle,
};
use crate::models::tolerance::DistanceConfig;
use crate::traits::{
    FeatureDistance,
    SpatialIndex,
};
use indicatif::{
    ProgressBar,
    ProgressStyle,
};
use rayon::prelude::*;
use serde::Serialize;
use std::collections::HashMap;
use std::time::Instant;
use tracing::{
    debug,
    info,
    instrument,
    warn,
};

/// Groups of one pass: extracted groups first (partition by partition, in
/// extraction order), then singletons in handle order.
#[derive(Debug, Clone, Serialize)]
pub struct GroupingOutput {
    pub groups: Vec<ConsensusGroup>,
    pub stats: GroupingStats,
}

/// Quality threshold grouping of points across runs.
///
/// The engine borrows the point arena and owns the two collaborators it is
/// built with: the pairwise distance and the spatial index used to find
/// candidates.
///
/// ```
/// use qtgroup::models::tolerance::DistanceConfig;
/// use qtgroup::{Feature, GroupingConfig, GroupingEngine, PointArena};
///
/// let points = PointArena::from_runs(vec![
///     vec![Feature::new(120.0, 500.0, 1e5)],
///     vec![Feature::new(121.0, 500.001, 2e5)],
/// ]);
/// let engine = GroupingEngine::with_default_distance(
///     &points,
///     GroupingConfig::default(),
///     DistanceConfig::default(),
/// )
/// .unwrap();
/// let output = engine.run();
/// assert_eq!(output.groups.len(), 1);
/// assert_eq!(output.groups[0].len(), 2);
/// ```
pub struct GroupingEngine<'a, D, S> {
    points: &'a PointArena,
    config: GroupingConfig,
    distance: D,
    index: S,
}

impl<'a> GroupingEngine<'a, PairwiseDistance, MzSortedIndex> {
    /// Engine over [`PairwiseDistance`] and a freshly built [`MzSortedIndex`].
    pub fn with_default_distance(
        points: &'a PointArena,
        config: GroupingConfig,
        distance: DistanceConfig,
    ) -> Result<Self> {
        let distance = PairwiseDistance::new(distance)?;
        let index = MzSortedIndex::build(points);
        Self::new(points, config, distance, index)
    }
}

impl<'a, D: FeatureDistance, S: SpatialIndex> GroupingEngine<'a, D, S> {
    /// Validates the configuration and the points, nothing else is checked
    /// afterwards.
    pub fn new(points: &'a PointArena, config: GroupingConfig, distance: D, index: S) -> Result<Self> {
        config.validate()?;
        points.validate()?;
        Ok(Self {
            points,
            config,
            distance,
            index,
        })
    }

    pub fn points(&self) -> &'a PointArena {
        self.points
    }

    pub fn config(&self) -> &GroupingConfig {
        &self.config
    }

    pub fn distance(&self) -> &D {
        &self.distance
    }

    pub fn index(&self) -> &S {
        &self.index
    }

    pub fn partitions(&self) -> Vec<Vec<PointHandle>> {
        partition_by_mz_gaps(self.points, &self.distance, self.config.nr_partitions)
    }

    /// Builds one cluster per member, candidates restricted to the members.
    /// The output is in the order of `members`.
    #[instrument(level = "debug", skip_all, fields(num_centers = members.len()))]
    pub fn build_clusters(&self, members: &[PointHandle]) -> Vec<Cluster> {
        let slots: HashMap<PointHandle, usize> = members
            .iter()
            .enumerate()
            .map(|(slot, handle)| (*handle, slot))
            .collect();
        self.build_clusters_in(members, &slots)
    }

    pub(crate) fn build_clusters_in(
        &self,
        members: &[PointHandle],
        slots: &HashMap<PointHandle, usize>,
    ) -> Vec<Cluster> {
        members
            .par_iter()
            .map(|center| self.build_cluster(*center, slots))
            .collect()
    }

    fn build_cluster(&self, center: PointHandle, slots: &HashMap<PointHandle, usize>) -> Cluster {
        let num_runs = self.points.num_runs();
        let max_distance = self.config.max_distance;
        let p = &self.points[center];
        let mut cluster = Cluster::new(
            center,
            p.run_index(),
            num_runs,
            max_distance,
            self.config.use_annotations,
        );

        let window = self.distance.search_window(p.position());
        for run_index in (0..num_runs).filter(|r| *r != p.run_index()) {
            self.index
                .query_within_radius(p.position(), window, run_index, &mut |handle| {
                    if !slots.contains_key(&handle) {
                        return;
                    }
                    let q = &self.points[handle];
                    if q.run_index() != run_index || !window.contains(p.position(), q.position()) {
                        return;
                    }
                    match self.distance.distance(p, q) {
                        Some(d) if d <= max_distance => cluster.add_candidate(handle, run_index, d),
                        _ => {}
                    }
                });
        }
        cluster
    }

    /// Lazy extraction over a subset of the points.
    ///
    /// Clusters are only built on the first call to `next`.
    pub fn extraction(&self, members: Vec<PointHandle>) -> Extraction<'_, 'a, D, S> {
        Extraction::new(self, members, ProgressBar::hidden())
    }

    /// Builds and extracts every partition, then appends the singletons.
    #[instrument(skip_all, fields(num_points = self.points.len()))]
    pub fn run(&self) -> GroupingOutput {
        let start = Instant::now();
        let partitions = self.partitions();
        info!(
            "Grouping {} points from {} runs in {} partition(s)",
            self.points.len(),
            self.points.num_runs(),
            partitions.len()
        );

        let progress = self.progress_bar(self.points.len());
        let results: Vec<(Vec<ConsensusGroup>, Vec<PointHandle>, GroupingStats)> = partitions
            .into_par_iter()
            .map(|members| {
                let mut extraction = Extraction::new(self, members, progress.clone());
                let groups: Vec<ConsensusGroup> = extraction.by_ref().collect();
                let leftover: Vec<PointHandle> = extraction.remaining().collect();
                (groups, leftover, extraction.into_stats())
            })
            .collect();
        progress.finish_and_clear();

        let mut groups = Vec::new();
        let mut leftover = Vec::new();
        let mut stats = GroupingStats::default();
        for (part_groups, part_leftover, part_stats) in results {
            groups.extend(part_groups);
            leftover.extend(part_leftover);
            stats += part_stats;
        }

        if stats.groups_extracted == 0 && !self.points.is_empty() {
            warn!("No cross-run group was found, every point is a singleton");
        }

        if self.config.retain_singletons {
            leftover.sort_unstable();
            stats.singletons = leftover.len();
            groups.extend(
                leftover
                    .into_iter()
                    .map(|h| ConsensusGroup::singleton(self.points[h].run_index(), h)),
            );
        } else if !leftover.is_empty() {
            debug!("Dropping {} ungrouped points", leftover.len());
        }

        stats.total_time = start.elapsed();
        info!(
            "Grouped {} points into {} groups and {} singletons in {:.2?}",
            stats.num_points,
            stats.groups_extracted,
            stats.singletons,
            stats.total_time
        );
        GroupingOutput { groups, stats }
    }

    fn progress_bar(&self, len: usize) -> ProgressBar {
        if !self.config.show_progress {
            return ProgressBar::hidden();
        }
        let bar = ProgressBar::new(len as u64);
        match ProgressStyle::with_template(
            "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta})",
        ) {
            Ok(style) => bar.set_style(style),
            Err(e) => warn!("Falling back to the default progress style: {}", e),
        }
        bar
    }
}

/// Groups `points` with the default distance and spatial index.
pub fn group_features(
    points: &PointArena,
    config: GroupingConfig,
    distance: DistanceConfig,
) -> Result<GroupingOutput> {
    let engine = GroupingEngine::with_default_distance(points, config, distance)?;
    Ok(engine.run())
}
