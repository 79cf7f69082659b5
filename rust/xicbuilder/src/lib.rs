#![doc = include_str!("../README.md")]

pub mod connector;
pub mod errors;
pub mod models;
pub mod source;
pub mod task;
pub mod utils;

// Re-export main structures
pub use crate::connector::{
    ConnectorStats,
    HighestDataPointConnector,
};
pub use crate::errors::BuildError;
pub use crate::models::{
    FinalizedTrace,
    MassTrace,
    MzTolerance,
    Peak,
    Polarity,
    PrecursorInfo,
    ScanRef,
    TracePoint,
};
pub use crate::source::{
    CentroidedRun,
    CentroidedScan,
    FragmentScan,
    FragmentScanIndex,
    MassListArrays,
    PeakListSource,
};
pub use crate::task::{
    BuildProgress,
    BuilderConfig,
    CancellationToken,
    ChromatogramBuilderTask,
    FeatureList,
    FeatureRow,
    TaskStatus,
    build_runs_parallel,
};
pub use crate::utils::TupleRange;
