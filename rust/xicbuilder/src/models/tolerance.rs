use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::BuildError;
use crate::utils::TupleRange;

/// m/z tolerance used to decide whether a peak continues a mass trace.
///
/// The window is always built around the *anchor* (the last peak added to
/// a trace) and a candidate peak matches when it falls inside it.
///
/// Convention:
/// Tolerances are defined in terms of positive values. A tolerance of
/// `(0.002, 0.002)` Da on a value of 500.0 means a window of
/// `[499.998, 500.002]`.
///
/// Serialized forms:
/// ```json
/// { "da": [0.002, 0.002] }
/// { "ppm": [10.0, 10.0] }
/// { "da_or_ppm": [0.002, 10.0] }
/// ```
///
/// The last form uses whichever of the absolute or ppm windows is wider,
/// so small m/z values are not matched with a uselessly narrow window.
#[derive(Debug, Clone, Copy, Serialize, Deserialize, PartialEq)]
pub enum MzTolerance {
    #[serde(rename = "da")]
    Absolute((f64, f64)),
    #[serde(rename = "ppm")]
    Ppm((f64, f64)),
    #[serde(rename = "da_or_ppm")]
    DaOrPpm((f64, f64)),
}

impl Default for MzTolerance {
    fn default() -> Self {
        MzTolerance::DaOrPpm((0.002, 10.0))
    }
}

impl MzTolerance {
    #[inline]
    fn bounds(&self, mz: f64) -> (f64, f64) {
        match *self {
            MzTolerance::Absolute((low, high)) => (mz - low, mz + high),
            MzTolerance::Ppm((low, high)) => {
                let low = mz * low / 1e6;
                let high = mz * high / 1e6;
                (mz - low, mz + high)
            }
            MzTolerance::DaOrPpm((da, ppm)) => {
                let half_width = da.max(mz * ppm / 1e6);
                (mz - half_width, mz + half_width)
            }
        }
    }

    /// Calculate the m/z tolerance window around `mz`.
    ///
    /// # Example
    ///
    /// ```
    /// use xicbuilder::MzTolerance;
    ///
    /// let tol = MzTolerance::Ppm((20.0, 20.0));
    /// let range = tol.mz_range(500.0);
    ///
    /// // For 500 Da at 20 ppm: ±0.01 Da
    /// assert!((range.start() - 499.99).abs() < 0.001);
    /// assert!((range.end() - 500.01).abs() < 0.001);
    /// ```
    pub fn mz_range(&self, mz: f64) -> TupleRange<f64> {
        let (low, high) = self.bounds(mz);
        (low, high).try_into().expect(
            "mz tolerance should never result in an invalid range, since low and high are validated positive",
        )
    }

    /// Whether `mz` falls inside the window built around `anchor_mz`.
    ///
    /// ```
    /// use xicbuilder::MzTolerance;
    ///
    /// let tol = MzTolerance::Absolute((0.002, 0.002));
    /// assert!(tol.within_tolerance(500.0, 500.0015));
    /// assert!(!tol.within_tolerance(500.0, 500.0025));
    /// ```
    #[inline]
    pub fn within_tolerance(&self, anchor_mz: f64, mz: f64) -> bool {
        let (low, high) = self.bounds(anchor_mz);
        low <= mz && mz <= high
    }

    /// Checks that every tolerance component is finite and non-negative.
    pub fn validate(&self) -> Result<(), BuildError> {
        let (a, b) = match *self {
            MzTolerance::Absolute(x) | MzTolerance::Ppm(x) | MzTolerance::DaOrPpm(x) => x,
        };
        if !(a.is_finite() && b.is_finite() && a >= 0.0 && b >= 0.0) {
            return Err(BuildError::InvalidConfig(format!(
                "m/z tolerance components must be finite and non-negative, got {:?}",
                self
            )));
        }
        Ok(())
    }
}
