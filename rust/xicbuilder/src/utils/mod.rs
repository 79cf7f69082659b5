pub mod streaming_calculators;
pub mod tuple_range;

pub use tuple_range::{
    TupleRange,
    TupleRangeError,
    binary_search_range_by_key,
    span_option,
};

/// Median of a slice of finite values.
///
/// The slice is sorted in place. For an even number of values the mean of
/// the two middle values is returned. Returns `None` for an empty slice.
pub fn median_in_place(values: &mut [f64]) -> Option<f64> {
    if values.is_empty() {
        return None;
    }
    values.sort_unstable_by(f64::total_cmp);
    let mid = values.len() / 2;
    if values.len() % 2 == 0 {
        Some((values[mid - 1] + values[mid]) / 2.0)
    } else {
        Some(values[mid])
    }
}
