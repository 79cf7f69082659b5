use serde::{
    Deserialize,
    Serialize,
};
use std::cmp::Ordering;

/// A single centroided (m/z, intensity) measurement.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct Peak {
    pub mz: f64,
    pub intensity: f64,
}

impl Peak {
    pub fn new(mz: f64, intensity: f64) -> Self {
        Self { mz, intensity }
    }

    pub fn is_finite(&self) -> bool {
        self.mz.is_finite() && self.intensity.is_finite()
    }

    /// Order used when a scan is consumed by the connector:
    /// descending intensity, ties broken by ascending m/z.
    ///
    /// Uses `total_cmp`, so the order is total and reproducible.
    pub fn intensity_descending_order(a: &Peak, b: &Peak) -> Ordering {
        b.intensity
            .total_cmp(&a.intensity)
            .then_with(|| a.mz.total_cmp(&b.mz))
    }
}

impl From<(f64, f64)> for Peak {
    fn from(value: (f64, f64)) -> Self {
        Peak::new(value.0, value.1)
    }
}
