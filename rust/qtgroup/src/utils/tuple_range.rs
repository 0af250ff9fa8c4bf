use std::ops::Range;
use thiserror::Error;

/// TupleRange represents a range defined by a tuple of two elements (T, T).
///
/// It represents a range as closed-closed [a, b], meaning both endpoints are inclusive.
/// Importantly, it ensures that the first element is always less than or equal to the second,
/// so a malformed tolerance window fails when it is built and not when it is queried.
#[derive(Debug, Clone, Copy, PartialEq, serde::Serialize, serde::Deserialize)]
pub struct TupleRange<T: Copy + PartialOrd>(T, T);

#[derive(Error, Debug)]
pub enum TupleRangeError<T: Copy + PartialOrd + std::fmt::Debug> {
    #[error(
        "Expected the first element to be less than or equal to the second, got ({0:?}, {1:?})"
    )]
    ExpectedOrderedRange(T, T),
}

impl<T: Copy + PartialOrd + std::fmt::Debug> TupleRange<T> {
    /// Creates a new `TupleRange` ensuring that the first element
    /// is less than or equal to the second.
    ///
    /// Note that NaN endpoints are rejected as well, since they
    /// compare neither less nor equal.
    pub fn try_new(left: T, right: T) -> Result<Self, TupleRangeError<T>> {
        if left <= right {
            Ok(Self(left, right))
        } else {
            Err(TupleRangeError::ExpectedOrderedRange(left, right))
        }
    }

    pub fn as_tuple(&self) -> (T, T) {
        (self.0, self.1)
    }

    pub fn contains(&self, x: T) -> bool {
        self.0 <= x && x <= self.1
    }

    pub fn start(&self) -> T {
        self.0
    }

    pub fn end(&self) -> T {
        self.1
    }
}

impl TupleRange<f64> {
    /// Builds `[center - half_width, center + half_width]`.
    pub fn around(center: f64, half_width: f64) -> Result<Self, TupleRangeError<f64>> {
        Self::try_new(center - half_width, center + half_width)
    }
}

/// Finds the index range of elements in a sorted slice whose keys fall within `key_range`.
///
/// The slice must be sorted (ascending) by `key_fn`. Works with partially ordered
/// keys such as `f64`, as long as the slice holds no NaN keys.
///
/// # Examples
///
/// ```
/// use qtgroup::utils::{TupleRange, range_in_sorted_by_key};
///
/// let mzs = [400.0, 410.0, 420.0, 430.0, 440.0];
/// let range = TupleRange::try_new(405.0, 430.0).unwrap();
/// let found = range_in_sorted_by_key(&mzs, range, |x| *x);
/// assert_eq!(&mzs[found], &[410.0, 420.0, 430.0]);
/// ```
pub fn range_in_sorted_by_key<T, K, F>(
    slice: &[T],
    key_range: TupleRange<K>,
    key_fn: F,
) -> Range<usize>
where
    F: Fn(&T) -> K,
    K: Copy + PartialOrd + std::fmt::Debug,
{
    let start_idx = slice.partition_point(|x| key_fn(x) < key_range.start());
    let end_idx =
        start_idx + slice[start_idx..].partition_point(|x| key_fn(x) <= key_range.end());

    start_idx..end_idx
}
