//! Orchestration of a whole chromatogram build for one run.

use nohash_hasher::IntMap;
use rayon::prelude::*;
use serde::{
    Deserialize,
    Serialize,
};
use std::sync::Arc;
use std::sync::atomic::{
    AtomicBool,
    AtomicUsize,
    Ordering,
};
use tracing::{
    debug,
    info,
    instrument,
    warn,
};

use crate::connector::{
    ConnectorStats,
    HighestDataPointConnector,
};
use crate::errors::BuildError;
use crate::models::{
    FinalizedTrace,
    MzTolerance,
    ScanRef,
};
use crate::source::PeakListSource;

fn default_min_duration_minutes() -> f64 {
    0.1
}

fn default_ms_level() -> Option<u8> {
    Some(1)
}

fn default_suffix() -> String {
    "chromatograms".to_string()
}

#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct BuilderConfig {
    #[serde(default)]
    pub mz_tolerance: MzTolerance,
    /// Minimum retention time span (minutes) a segment needs to be kept.
    #[serde(default = "default_min_duration_minutes")]
    pub min_duration_minutes: f64,
    /// Minimum apex intensity of a reported trace.
    #[serde(default)]
    pub min_height: f64,
    /// Only scans of this MS level are used. `None` uses every scan.
    #[serde(default = "default_ms_level")]
    pub ms_level: Option<u8>,
    #[serde(default = "default_suffix")]
    pub suffix: String,
    /// Pad every trace with a zero intensity point at the selected scan
    /// before its first and after its last point.
    #[serde(default)]
    pub pad_zeros: bool,
}

impl Default for BuilderConfig {
    fn default() -> Self {
        Self {
            mz_tolerance: MzTolerance::default(),
            min_duration_minutes: default_min_duration_minutes(),
            min_height: 0.0,
            ms_level: default_ms_level(),
            suffix: default_suffix(),
            pad_zeros: false,
        }
    }
}

impl BuilderConfig {
    pub fn validate(&self) -> Result<(), BuildError> {
        self.mz_tolerance.validate()?;
        if !(self.min_duration_minutes.is_finite() && self.min_duration_minutes >= 0.0) {
            return Err(BuildError::InvalidConfig(format!(
                "min_duration_minutes must be finite and non-negative, got {}",
                self.min_duration_minutes
            )));
        }
        if !(self.min_height.is_finite() && self.min_height >= 0.0) {
            return Err(BuildError::InvalidConfig(format!(
                "min_height must be finite and non-negative, got {}",
                self.min_height
            )));
        }
        Ok(())
    }

    fn selects(&self, scan: &ScanRef) -> bool {
        self.ms_level.is_none_or(|level| scan.ms_level == level)
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum TaskStatus {
    Waiting,
    Processing,
    Finished,
    Canceled,
    Error,
}

/// Shared processed-scan counter, readable from other threads while a
/// build is running.
#[derive(Debug, Clone, Default)]
pub struct BuildProgress {
    processed: Arc<AtomicUsize>,
    total: Arc<AtomicUsize>,
}

impl BuildProgress {
    fn reset(&self, total: usize) {
        self.processed.store(0, Ordering::Relaxed);
        self.total.store(total, Ordering::Relaxed);
    }

    fn inc(&self) {
        self.processed.fetch_add(1, Ordering::Relaxed);
    }

    pub fn processed(&self) -> usize {
        self.processed.load(Ordering::Relaxed)
    }

    /// Number of selected scans; zero until the build has started.
    pub fn total(&self) -> usize {
        self.total.load(Ordering::Relaxed)
    }

    pub fn finished_fraction(&self) -> f64 {
        match self.total() {
            0 => 0.0,
            total => self.processed() as f64 / total as f64,
        }
    }
}

#[derive(Debug, Clone, Default)]
pub struct CancellationToken {
    flag: Arc<AtomicBool>,
}

impl CancellationToken {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn cancel(&self) {
        self.flag.store(true, Ordering::Relaxed);
    }

    pub fn is_canceled(&self) -> bool {
        self.flag.load(Ordering::Relaxed)
    }
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureRow {
    /// 1-based, in ascending m/z order.
    pub id: u32,
    #[serde(flatten)]
    pub trace: FinalizedTrace,
}

#[derive(Debug, Clone, PartialEq, Serialize)]
pub struct FeatureList {
    pub name: String,
    pub run: String,
    /// Number of scans fed to the connector.
    pub scan_count: usize,
    pub stats: ConnectorStats,
    pub rows: Vec<FeatureRow>,
}

impl FeatureList {
    pub fn len(&self) -> usize {
        self.rows.len()
    }

    pub fn is_empty(&self) -> bool {
        self.rows.is_empty()
    }

    pub fn traces(&self) -> impl Iterator<Item = &FinalizedTrace> {
        self.rows.iter().map(|r| &r.trace)
    }
}

/// Builds the chromatograms of a single run.
///
/// ```
/// use xicbuilder::{
///     BuilderConfig,
///     CentroidedRun,
///     ChromatogramBuilderTask,
///     Peak,
///     ScanRef,
/// };
///
/// let mut run = CentroidedRun::new("demo");
/// for (i, (rt, intensity)) in [(1.0, 100.0), (1.1, 500.0), (1.2, 200.0)].iter().enumerate() {
///     run.push_scan(
///         ScanRef::new(i as u32 + 1, *rt),
///         Some(vec![Peak::new(500.0, *intensity)]),
///     )
///     .unwrap();
/// }
///
/// let mut task = ChromatogramBuilderTask::new(&run, BuilderConfig::default());
/// let features = task.run().unwrap();
/// assert_eq!(features.name, "demo chromatograms");
/// assert_eq!(features.rows[0].id, 1);
/// assert_eq!(features.rows[0].trace.height(), 500.0);
/// ```
#[derive(Debug)]
pub struct ChromatogramBuilderTask<S: PeakListSource> {
    source: S,
    config: BuilderConfig,
    progress: BuildProgress,
    cancel: CancellationToken,
    status: TaskStatus,
}

impl<S: PeakListSource> ChromatogramBuilderTask<S> {
    pub fn new(source: S, config: BuilderConfig) -> Self {
        Self {
            source,
            config,
            progress: BuildProgress::default(),
            cancel: CancellationToken::default(),
            status: TaskStatus::Waiting,
        }
    }

    pub fn with_cancellation(mut self, cancel: CancellationToken) -> Self {
        self.cancel = cancel;
        self
    }

    pub fn task_description(&self) -> String {
        format!("Detecting chromatograms in {}", self.source.name())
    }

    pub fn status(&self) -> TaskStatus {
        self.status
    }

    /// Handle that can be polled from another thread.
    pub fn progress(&self) -> BuildProgress {
        self.progress.clone()
    }

    pub fn cancellation_token(&self) -> CancellationToken {
        self.cancel.clone()
    }

    pub fn finished_fraction(&self) -> f64 {
        self.progress.finished_fraction()
    }

    #[instrument(skip_all, fields(run = %self.source.name()))]
    pub fn run(&mut self) -> Result<FeatureList, BuildError> {
        self.status = TaskStatus::Processing;
        let out = self.build();
        self.status = match &out {
            Ok(_) => TaskStatus::Finished,
            Err(BuildError::Canceled) => TaskStatus::Canceled,
            Err(_) => TaskStatus::Error,
        };
        out
    }

    fn build(&self) -> Result<FeatureList, BuildError> {
        self.config.validate()?;
        let run_name = self.source.name();
        info!("{}", self.task_description());

        let scans: Vec<&ScanRef> = self
            .source
            .scans()
            .iter()
            .filter(|s| self.config.selects(s))
            .collect();
        if scans.is_empty() {
            return Err(BuildError::NoScans {
                run: run_name.to_string(),
                ms_level: self.config.ms_level,
            });
        }
        check_retention_time_order(run_name, &scans)?;
        warn_on_mixed_scans(run_name, &scans);

        self.progress.reset(scans.len());
        let fragments = self.source.fragment_index();
        debug!(
            "Using {} scans and {} fragmentation scans",
            scans.len(),
            fragments.len()
        );

        let mut connector = HighestDataPointConnector::new(
            self.config.mz_tolerance,
            self.config.min_duration_minutes,
            self.config.min_height,
        );
        let mut empty_scans = 0;
        for scan in scans.iter() {
            let peaks =
                self.source
                    .mass_list(scan)
                    .ok_or_else(|| BuildError::MissingMassList {
                        scan_number: scan.scan_number,
                        run: run_name.to_string(),
                    })?;
            if peaks.is_empty() {
                empty_scans += 1;
            }
            connector.add_scan(scan, peaks);
            self.progress.inc();

            if self.cancel.is_canceled() {
                info!("Chromatogram building canceled for {}", run_name);
                return Err(BuildError::Canceled);
            }
        }
        if empty_scans > 0 {
            info!("Found {} empty scans in {}", empty_scans, run_name);
        }

        let mut traces = connector.finish(&fragments);
        if self.config.pad_zeros {
            pad_trace_edges(&mut traces, &scans);
        }
        traces.sort_by(|a, b| a.mz().total_cmp(&b.mz()));
        let rows: Vec<FeatureRow> = traces
            .into_iter()
            .zip(1..)
            .map(|(trace, id)| FeatureRow { id, trace })
            .collect();

        let stats = *connector.stats();
        debug!("Connector stats for {}:\n{}", run_name, stats);
        info!("Built {} chromatograms from {}", rows.len(), run_name);

        Ok(FeatureList {
            name: format!("{} {}", run_name, self.config.suffix),
            run: run_name.to_string(),
            scan_count: scans.len(),
            stats,
            rows,
        })
    }
}

fn check_retention_time_order(run_name: &str, scans: &[&ScanRef]) -> Result<(), BuildError> {
    if let Some(scan) = scans.iter().find(|s| !s.rt_minutes.is_finite()) {
        return Err(BuildError::NonFiniteRetentionTime {
            scan_number: scan.scan_number,
            run: run_name.to_string(),
            rt_minutes: scan.rt_minutes,
        });
    }
    for pair in scans.windows(2) {
        let (previous, current) = (pair[0], pair[1]);
        if current.rt_minutes < previous.rt_minutes {
            return Err(BuildError::NonMonotonicRetentionTime {
                scan_number: current.scan_number,
                rt_minutes: current.rt_minutes,
                previous_rt_minutes: previous.rt_minutes,
            });
        }
    }
    Ok(())
}

/// Zero pads the traces with their neighbouring scans in `scans`, the
/// scans the connector was fed. Edges at the start or end of the run stay
/// unpadded.
fn pad_trace_edges(traces: &mut [FinalizedTrace], scans: &[&ScanRef]) {
    let positions: IntMap<u32, usize> = scans
        .iter()
        .enumerate()
        .map(|(i, s)| (s.scan_number, i))
        .collect();
    for trace in traces.iter_mut() {
        let (Some(first), Some(last)) = (trace.points().first(), trace.points().last()) else {
            continue;
        };
        let before = positions
            .get(&first.scan_number)
            .and_then(|&i| i.checked_sub(1))
            .and_then(|i| scans.get(i))
            .copied();
        let after = positions
            .get(&last.scan_number)
            .and_then(|&i| scans.get(i + 1))
            .copied();
        trace.pad_edges(before, after);
    }
}

fn warn_on_mixed_scans(run_name: &str, scans: &[&ScanRef]) {
    let Some(first) = scans.first() else {
        return;
    };
    if scans.iter().any(|s| s.ms_level != first.ms_level) {
        warn!(
            "Scans of more than one MS level are used to build chromatograms in {}. \
             This usually makes no sense, consider restricting ms_level.",
            run_name
        );
    }
    if scans.iter().any(|s| s.polarity != first.polarity) {
        warn!(
            "Scans of both polarities are used to build chromatograms in {}. \
             Consider building each polarity separately.",
            run_name
        );
    }
}

/// Runs every task on the rayon thread pool, one task per run.
///
/// Results keep the order of `tasks`.
pub fn build_runs_parallel<S>(
    tasks: &mut [ChromatogramBuilderTask<S>],
) -> Vec<Result<FeatureList, BuildError>>
where
    S: PeakListSource + Send,
{
    info!("Building chromatograms for {} runs", tasks.len());
    tasks.par_iter_mut().map(|task| task.run()).collect()
}
