pub mod mz_sorted_index;

pub use mz_sorted_index::MzSortedIndex;
