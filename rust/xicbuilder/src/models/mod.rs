pub mod mass_trace;
pub mod peak;
pub mod scan;
pub mod tolerance;

pub use mass_trace::{
    FinalizedTrace,
    MassTrace,
    TracePoint,
};
pub use peak::Peak;
pub use scan::{
    Polarity,
    PrecursorInfo,
    ScanRef,
};
pub use tolerance::MzTolerance;
