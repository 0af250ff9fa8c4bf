use crate::models::point::{
    PointArena,
    PointHandle,
    Position,
};
use crate::models::tolerance::SearchWindow;
use crate::traits::SpatialIndex;
use crate::utils::range_in_sorted_by_key;
use rayon::prelude::*;
use tracing::debug;

#[derive(Debug, Clone, Copy, PartialEq)]
struct IndexedPoint {
    mz: f64,
    rt: f64,
    handle: PointHandle,
}

/// Default [`SpatialIndex`]: the points of every run sorted by m/z.
///
/// A query binary-searches the m/z window of the requested run and then
/// filters by retention time. Points are reported in ascending
/// (m/z, handle) order.
#[derive(Debug, Clone)]
pub struct MzSortedIndex {
    runs: Vec<Vec<IndexedPoint>>,
}

impl MzSortedIndex {
    /// Builds the index for every point of `arena`.
    ///
    /// Points whose run index is outside the arena's run count are skipped;
    /// validate the arena first if that matters.
    pub fn build(arena: &PointArena) -> Self {
        let mut runs: Vec<Vec<IndexedPoint>> = (0..arena.num_runs())
            .map(|run_index| Vec::with_capacity(arena.run_size(run_index)))
            .collect();

        for (handle, point) in arena.iter() {
            if let Some(run) = runs.get_mut(point.run_index()) {
                run.push(IndexedPoint {
                    mz: point.mz(),
                    rt: point.rt(),
                    handle,
                });
            }
        }

        runs.par_iter_mut().for_each(|run| {
            run.sort_unstable_by(|a, b| {
                a.mz.total_cmp(&b.mz).then_with(|| a.handle.cmp(&b.handle))
            });
        });
        debug!(
            "Built MzSortedIndex over {} runs ({} points)",
            runs.len(),
            arena.len()
        );

        Self { runs }
    }

    pub fn num_runs(&self) -> usize {
        self.runs.len()
    }

    pub fn len(&self) -> usize {
        self.runs.iter().map(|x| x.len()).sum()
    }

    pub fn is_empty(&self) -> bool {
        self.runs.iter().all(|x| x.is_empty())
    }
}

impl SpatialIndex for MzSortedIndex {
    fn query_within_radius<F>(
        &self,
        position: Position,
        window: SearchWindow,
        run_index: usize,
        f: &mut F,
    ) where
        F: FnMut(PointHandle),
    {
        let Some(run) = self.runs.get(run_index) else {
            return;
        };
        let (Some(mz_range), Some(rt_range)) =
            (window.mz_range(position), window.rt_range(position))
        else {
            return;
        };

        let found = range_in_sorted_by_key(run, mz_range, |x| x.mz);
        for p in &run[found] {
            if rt_range.contains(p.rt) {
                f(p.handle);
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::models::point::Feature;

    fn query(index: &MzSortedIndex, rt: f64, mz: f64, run_index: usize) -> Vec<PointHandle> {
        let mut out = Vec::new();
        index.query_within_radius(
            Position::new(rt, mz),
            SearchWindow::new(5.0, 0.5),
            run_index,
            &mut |h| out.push(h),
        );
        out
    }

    #[test]
    fn test_query_filters_by_run_mz_and_rt() {
        let arena = PointArena::from_runs(vec![
            vec![Feature::new(100.0, 500.0, 1.0)],
            vec![
                Feature::new(100.0, 500.4, 1.0),  // inside
                Feature::new(100.0, 499.0, 1.0),  // mz too low
                Feature::new(106.0, 500.1, 1.0),  // rt too far
                Feature::new(96.0, 499.7, 1.0),   // inside
            ],
        ]);
        let index = MzSortedIndex::build(&arena);
        assert_eq!(index.len(), 5);

        let found = query(&index, 100.0, 500.0, 1);
        let found_mz: Vec<f64> = found.iter().map(|h| arena[*h].mz()).collect();
        assert_eq!(found_mz, vec![499.7, 500.4]);

        // Unknown run is simply empty
        assert!(query(&index, 100.0, 500.0, 7).is_empty());
    }

    #[test]
    fn test_equal_mz_reported_in_handle_order() {
        let arena = PointArena::from_runs(vec![
            vec![],
            vec![
                Feature::new(10.0, 300.0, 1.0),
                Feature::new(11.0, 300.0, 1.0),
                Feature::new(12.0, 300.0, 1.0),
            ],
        ]);
        let index = MzSortedIndex::build(&arena);
        let found = query(&index, 11.0, 300.0, 1);
        let mut sorted = found.clone();
        sorted.sort();
        assert_eq!(found, sorted);
        assert_eq!(found.len(), 3);
    }
}
