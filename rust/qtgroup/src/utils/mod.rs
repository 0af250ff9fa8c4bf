pub mod tuple_range;

pub use tuple_range::{
    TupleRange,
    TupleRangeError,
    range_in_sorted_by_key,
};
