//! Splitting the input into independent m/z partitions.
//!
//! Two neighboring points (in m/z order) further apart than the search
//! window of either of them can never be candidates of one another, so the
//! sorted m/z axis is cut at such gaps. Cuts are only placed once the
//! current partition reached its share of the points, which keeps the
//! partitions roughly balanced.

use crate::models::point::{
    PointArena,
    PointHandle,
};
use crate::traits::FeatureDistance;
use tracing::debug;

/// Returns at most `nr_partitions` partitions, in ascending m/z order.
/// Handles within a partition are sorted.
pub fn partition_by_mz_gaps<D: FeatureDistance>(
    points: &PointArena,
    distance: &D,
    nr_partitions: usize,
) -> Vec<Vec<PointHandle>> {
    if points.is_empty() {
        return Vec::new();
    }
    if nr_partitions <= 1 || points.len() < 2 {
        return vec![points.handles().collect()];
    }

    let mut sorted: Vec<PointHandle> = points.handles().collect();
    sorted.sort_unstable_by(|a, b| {
        points[*a]
            .mz()
            .total_cmp(&points[*b].mz())
            .then_with(|| a.cmp(b))
    });

    let target = points.len().div_ceil(nr_partitions);
    let mut partitions: Vec<Vec<PointHandle>> = Vec::with_capacity(nr_partitions);
    let mut current = Vec::with_capacity(target);

    for (i, &handle) in sorted.iter().enumerate() {
        current.push(handle);
        let Some(&next) = sorted.get(i + 1) else {
            break;
        };
        if current.len() < target || partitions.len() + 1 >= nr_partitions {
            continue;
        }
        if is_separating_gap(points, distance, handle, next) {
            partitions.push(std::mem::take(&mut current));
        }
    }
    partitions.push(current);

    for part in partitions.iter_mut() {
        part.sort_unstable();
    }
    debug!(
        "Split {} points into {} partition(s) (requested {})",
        points.len(),
        partitions.len(),
        nr_partitions
    );
    partitions
}

fn is_separating_gap<D: FeatureDistance>(
    points: &PointArena,
    distance: &D,
    left: PointHandle,
    right: PointHandle,
) -> bool {
    let left = &points[left];
    let right = &points[right];
    let gap = right.mz() - left.mz();
    let reach = distance
        .search_window(left.position())
        .mz
        .max(distance.search_window(right.position()).mz);
    gap > reach
}
