use serde::{
    Deserialize,
    Serialize,
};

#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
pub enum Polarity {
    #[serde(rename = "positive", alias = "+")]
    Positive,
    #[serde(rename = "negative", alias = "-")]
    Negative,
}

/// Precursor selected for a fragmentation event.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct PrecursorInfo {
    pub mz: f64,
    /// 0 (or negative) means the charge is unknown.
    #[serde(default)]
    pub charge: i32,
}

fn default_ms_level() -> u8 {
    1
}

/// Reference to one acquisition event of a run.
///
/// Scans are identified by `scan_number`, which is unique within a run.
/// The retention time is in minutes.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct ScanRef {
    pub scan_number: u32,
    pub rt_minutes: f64,
    #[serde(default = "default_ms_level")]
    pub ms_level: u8,
    #[serde(default)]
    pub polarity: Option<Polarity>,
    #[serde(default)]
    pub precursor: Option<PrecursorInfo>,
}

impl ScanRef {
    pub fn new(scan_number: u32, rt_minutes: f64) -> Self {
        Self {
            scan_number,
            rt_minutes,
            ms_level: 1,
            polarity: None,
            precursor: None,
        }
    }

    pub fn with_ms_level(self, ms_level: u8) -> Self {
        Self { ms_level, ..self }
    }

    pub fn with_polarity(self, polarity: Polarity) -> Self {
        Self {
            polarity: Some(polarity),
            ..self
        }
    }

    pub fn with_precursor(self, mz: f64, charge: i32) -> Self {
        Self {
            precursor: Some(PrecursorInfo { mz, charge }),
            ..self
        }
    }

    pub fn is_fragmentation(&self) -> bool {
        self.ms_level >= 2 && self.precursor.is_some()
    }
}
