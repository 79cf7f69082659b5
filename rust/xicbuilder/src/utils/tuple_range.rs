use thiserror::Error;

/// Finds the index range of elements in a slice sorted by `key_fn` whose keys
/// fall within the closed range `[low, high]`.
///
/// Works with partially ordered keys (eg. `f64` retention times), as long as
/// the slice is sorted by the key and contains no NaN keys.
///
/// # Examples
///
/// ```
/// use xicbuilder::utils::binary_search_range_by_key;
///
/// let rts = vec![1.0, 1.5, 2.0, 2.5, 3.0];
/// let range = binary_search_range_by_key(&rts, (1.5, 2.5), |x| *x);
/// assert_eq!(range, 1..4);
/// assert_eq!(&rts[range], &[1.5, 2.0, 2.5]);
///
/// let empty = binary_search_range_by_key(&rts, (5.0, 6.0), |x| *x);
/// assert!(rts[empty].is_empty());
/// ```
pub fn binary_search_range_by_key<T, K, F>(
    slice: &[T],
    key_range: (K, K),
    key_fn: F,
) -> std::ops::Range<usize>
where
    F: Fn(&T) -> K,
    K: PartialOrd,
{
    let (low, high) = key_range;
    let start_idx = slice.partition_point(|x| key_fn(x) < low);
    let end_idx = start_idx + slice[start_idx..].partition_point(|x| key_fn(x) <= high);

    start_idx..end_idx
}

/// TupleRange represents a closed range `[a, b]` over a partially ordered type.
///
/// The first element is always less than or equal to the second.
/// The finalized statistics of a trace (m/z, retention time and intensity
/// spans) are all reported as `TupleRange<f64>`.
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
    pub fn try_new(left: T, right: T) -> Result<Self, TupleRangeError<T>> {
        if left > right {
            Err(TupleRangeError::ExpectedOrderedRange(left, right))
        } else {
            Ok(Self(left, right))
        }
    }

    /// A range containing exactly one value.
    pub fn singleton(value: T) -> Self {
        Self(value, value)
    }

    /// Smallest range containing both `self` and `value`.
    ///
    /// ```
    /// use xicbuilder::utils::TupleRange;
    ///
    /// let range = TupleRange::singleton(2.0).span(5.0).span(1.0);
    /// assert_eq!(range.as_tuple(), (1.0, 5.0));
    /// ```
    pub fn span(self, value: T) -> Self {
        let start = if value < self.0 { value } else { self.0 };
        let end = if value > self.1 { value } else { self.1 };
        Self(start, end)
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

impl<T> TryInto<TupleRange<T>> for (T, T)
where
    T: Copy + PartialOrd + std::fmt::Debug,
{
    type Error = TupleRangeError<T>;

    fn try_into(self) -> Result<TupleRange<T>, Self::Error> {
        TupleRange::try_new(self.0, self.1)
    }
}

/// Extends an optional range with a value, starting a singleton range if
/// there is none yet.
pub fn span_option<T: Copy + PartialOrd + std::fmt::Debug>(
    range: Option<TupleRange<T>>,
    value: T,
) -> Option<TupleRange<T>> {
    match range {
        Some(r) => Some(r.span(value)),
        None => Some(TupleRange::singleton(value)),
    }
}
