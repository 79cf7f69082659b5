use thiserror::Error;

/// Errors that abort a chromatogram build.
///
/// None of these carry a partial result: a failed or canceled build
/// produces no traces at all.
#[derive(Error, Debug, Clone, PartialEq)]
pub enum BuildError {
    #[error(
        "Retention time of scan #{scan_number} ({rt_minutes} min) is smaller than the retention time \
         of the previous scan ({previous_rt_minutes} min). Only scans with non-decreasing retention \
         times can be used; restrict the scan range or crop the run first."
    )]
    NonMonotonicRetentionTime {
        scan_number: u32,
        rt_minutes: f64,
        previous_rt_minutes: f64,
    },

    #[error("Retention time of scan #{scan_number} in {run} is not a finite number ({rt_minutes})")]
    NonFiniteRetentionTime {
        scan_number: u32,
        run: String,
        rt_minutes: f64,
    },

    #[error("Scan #{scan_number} from {run} does not have a mass list. Run mass detection first.")]
    MissingMassList { scan_number: u32, run: String },

    #[error("There are no scans in {run} satisfying the scan selection (ms_level: {ms_level:?})")]
    NoScans { run: String, ms_level: Option<u8> },

    #[error("Scan #{scan_number} appears more than once in {run}")]
    DuplicateScan { scan_number: u32, run: String },

    #[error("Invalid builder configuration: {0}")]
    InvalidConfig(String),

    #[error("Chromatogram building was canceled")]
    Canceled,
}
