use crate::models::point::{
    Point,
    Position,
};
use crate::models::tolerance::SearchWindow;

/// Pairwise compatibility and distance between two features.
///
/// Implementations decide which pairs are allowed to end up in the same
/// group (retention time window, m/z tolerance, charge ...) and how far
/// apart the allowed ones are. Distances are expected to be non-negative;
/// the grouping engine only keeps pairs with `distance <= max_distance`.
pub trait FeatureDistance: Sync {
    /// Returns `None` when the pair violates the constraints.
    fn distance(&self, left: &Point, right: &Point) -> Option<f64>;

    /// The box around `position` outside of which `distance` is always `None`.
    /// Used to bound the spatial query done for every cluster center.
    fn search_window(&self, position: Position) -> SearchWindow;
}

/// Adapts a closure into a [`FeatureDistance`] with a fixed search window.
///
/// ```
/// use qtgroup::models::tolerance::SearchWindow;
/// use qtgroup::traits::{DistanceFn, FeatureDistance};
///
/// let by_mz = DistanceFn::new(SearchWindow::new(60.0, 1.0), |a, b| {
///     Some((a.mz() - b.mz()).abs())
/// });
/// # let _ = by_mz.search_window(qtgroup::Position::new(0.0, 0.0));
/// ```
pub struct DistanceFn<F> {
    window: SearchWindow,
    f: F,
}

impl<F> DistanceFn<F>
where
    F: Fn(&Point, &Point) -> Option<f64> + Sync,
{
    pub fn new(window: SearchWindow, f: F) -> Self {
        Self { window, f }
    }
}

impl<F> FeatureDistance for DistanceFn<F>
where
    F: Fn(&Point, &Point) -> Option<f64> + Sync,
{
    /// `None` for pairs outside the window, whatever the closure says.
    fn distance(&self, left: &Point, right: &Point) -> Option<f64> {
        if !self.window.contains(left.position(), right.position()) {
            return None;
        }
        (self.f)(left, right)
    }

    fn search_window(&self, _position: Position) -> SearchWindow {
        self.window
    }
}

impl<T: FeatureDistance + ?Sized> FeatureDistance for &T {
    fn distance(&self, left: &Point, right: &Point) -> Option<f64> {
        (**self).distance(left, right)
    }

    fn search_window(&self, position: Position) -> SearchWindow {
        (**self).search_window(position)
    }
}
