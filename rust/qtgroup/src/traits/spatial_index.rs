use crate::models::point::{
    PointHandle,
    Position,
};
use crate::models::tolerance::SearchWindow;

/// Radius search over the points of a [`crate::PointArena`].
///
/// Implementations must report every point of `run_index` inside the
/// window around `position` (they may report more, the caller re-checks
/// with the distance function) and must report them in a deterministic
/// order.
pub trait SpatialIndex: Sync {
    fn query_within_radius<F>(
        &self,
        position: Position,
        window: SearchWindow,
        run_index: usize,
        f: &mut F,
    ) where
        F: FnMut(PointHandle);
}
