//! Greedy scan-by-scan connection of centroided peaks into mass traces.
//!
//! For every scan, peaks are visited from the most to the least intense.
//! Each one is offered to the alive trace whose last peak is within
//! tolerance and is the most intense; a trace takes at most one peak per
//! scan, and unmatched peaks start new traces. The assignment is greedy on
//! purpose: a high intensity peak claims a trace even if a later, weaker
//! peak would have been a closer m/z fit.
//!
//! Traces that received nothing in a scan are settled immediately:
//! - the building segment is long enough: it is committed and the trace lives on;
//! - the trace already has a committed segment: the short tail is trimmed;
//! - otherwise the trace is dropped.

use serde::Serialize;
use std::fmt::Display;
use tracing::{
    debug,
    instrument,
};

use crate::models::{
    FinalizedTrace,
    MassTrace,
    MzTolerance,
    Peak,
    ScanRef,
};
use crate::source::FragmentScanIndex;

/// Counters accumulated over the lifetime of a connector.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize)]
pub struct ConnectorStats {
    pub scans_processed: usize,
    pub peaks_seen: usize,
    pub peaks_skipped_non_finite: usize,
    /// Peaks whose best trace had already been claimed in the same scan.
    pub peaks_shadowed: usize,
    pub traces_spawned: usize,
    pub traces_dropped: usize,
    pub segments_committed: usize,
    pub segments_discarded: usize,
    pub traces_below_min_height: usize,
    pub traces_finalized: usize,
    pub max_alive: usize,
}

impl Display for ConnectorStats {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        writeln!(f, "Scans processed: {}", self.scans_processed)?;
        writeln!(f, "Peaks seen: {}", self.peaks_seen)?;
        writeln!(
            f,
            "Peaks skipped (non finite): {}",
            self.peaks_skipped_non_finite
        )?;
        writeln!(f, "Peaks shadowed: {}", self.peaks_shadowed)?;
        writeln!(f, "Traces spawned: {}", self.traces_spawned)?;
        writeln!(f, "Traces dropped: {}", self.traces_dropped)?;
        writeln!(f, "Segments committed: {}", self.segments_committed)?;
        writeln!(f, "Segments discarded: {}", self.segments_discarded)?;
        writeln!(
            f,
            "Traces below min height: {}",
            self.traces_below_min_height
        )?;
        writeln!(f, "Traces finalized: {}", self.traces_finalized)?;
        write!(f, "Max alive traces: {}", self.max_alive)
    }
}

#[derive(Debug, Clone)]
pub struct HighestDataPointConnector {
    mz_tolerance: MzTolerance,
    min_duration_minutes: f64,
    min_height: f64,
    alive: Vec<MassTrace>,
    // Scratch space re-used on every scan.
    peak_buffer: Vec<Peak>,
    connected: Vec<bool>,
    spawned: Vec<MassTrace>,
    stats: ConnectorStats,
}

impl HighestDataPointConnector {
    pub fn new(mz_tolerance: MzTolerance, min_duration_minutes: f64, min_height: f64) -> Self {
        Self {
            mz_tolerance,
            min_duration_minutes,
            min_height,
            alive: Vec::new(),
            peak_buffer: Vec::new(),
            connected: Vec::new(),
            spawned: Vec::new(),
            stats: ConnectorStats::default(),
        }
    }

    pub fn alive_count(&self) -> usize {
        self.alive.len()
    }

    /// Traces currently being built, in live-set order.
    pub fn alive_traces(&self) -> &[MassTrace] {
        &self.alive
    }

    pub fn stats(&self) -> &ConnectorStats {
        &self.stats
    }

    /// Connects the peaks of one scan to the alive traces.
    ///
    /// Scans must be fed in non-decreasing retention time order; this is not
    /// re-checked here.
    pub fn add_scan(&mut self, scan: &ScanRef, peaks: &[Peak]) {
        self.stats.scans_processed += 1;
        self.stats.peaks_seen += peaks.len();

        self.peak_buffer.clear();
        self.peak_buffer
            .extend(peaks.iter().copied().filter(Peak::is_finite));
        self.stats.peaks_skipped_non_finite += peaks.len() - self.peak_buffer.len();
        // Stable sort: exact duplicates keep their input order.
        self.peak_buffer.sort_by(Peak::intensity_descending_order);

        self.connected.clear();
        self.connected.resize(self.alive.len(), false);
        debug_assert!(self.spawned.is_empty());

        for peak in self.peak_buffer.iter() {
            match best_candidate(&self.alive, &self.mz_tolerance, peak.mz) {
                Some(idx) if self.connected[idx] => {
                    self.stats.peaks_shadowed += 1;
                }
                Some(idx) => {
                    self.alive[idx].add_peak(scan, *peak);
                    self.connected[idx] = true;
                }
                None => {
                    self.spawned.push(MassTrace::new(scan, *peak));
                    self.stats.traces_spawned += 1;
                }
            }
        }

        let connected = &self.connected;
        let stats = &mut self.stats;
        let min_duration = self.min_duration_minutes;
        let mut idx = 0;
        self.alive.retain_mut(|trace| {
            let was_connected = connected[idx];
            idx += 1;
            was_connected || settle_disconnected(trace, min_duration, stats)
        });
        self.alive.append(&mut self.spawned);
        self.stats.max_alive = self.stats.max_alive.max(self.alive.len());
    }

    /// Settles every alive trace as if no further scan will connect to it,
    /// finalizes the survivors and drops those below the minimum height.
    ///
    /// The connector is left empty and can be fed a new run afterwards.
    #[instrument(skip_all, fields(alive = self.alive.len()))]
    pub fn finish(&mut self, fragments: &FragmentScanIndex) -> Vec<FinalizedTrace> {
        let alive = std::mem::take(&mut self.alive);
        let min_duration = self.min_duration_minutes;
        let min_height = self.min_height;
        let stats = &mut self.stats;

        let mut out = Vec::with_capacity(alive.len());
        for mut trace in alive {
            if !settle_disconnected(&mut trace, min_duration, stats) {
                continue;
            }
            let Some(finalized) = trace.finalize(fragments) else {
                continue;
            };
            if finalized.height() < min_height {
                stats.traces_below_min_height += 1;
                continue;
            }
            stats.traces_finalized += 1;
            out.push(finalized);
        }
        debug!("Finalized {} traces", out.len());
        out
    }
}

/// Index of the alive trace that should receive a peak at `mz`.
///
/// Among the traces whose last peak is within tolerance, the one with the
/// most intense last peak wins; ties go to the earliest trace.
fn best_candidate(alive: &[MassTrace], tolerance: &MzTolerance, mz: f64) -> Option<usize> {
    let mut best: Option<(usize, f64)> = None;
    for (i, trace) in alive.iter().enumerate() {
        let anchor = trace.last_peak();
        if !tolerance.within_tolerance(anchor.mz, mz) {
            continue;
        }
        match best {
            Some((_, best_intensity)) if anchor.intensity <= best_intensity => {}
            _ => best = Some((i, anchor.intensity)),
        }
    }
    best.map(|(i, _)| i)
}

/// Commit, trim or drop a trace that did not receive a peak.
/// Returns whether the trace stays alive.
fn settle_disconnected(
    trace: &mut MassTrace,
    min_duration_minutes: f64,
    stats: &mut ConnectorStats,
) -> bool {
    let has_building = !trace.building_segment().is_empty();
    if has_building && trace.building_segment_duration() >= min_duration_minutes {
        stats.segments_committed += 1;
        trace.commit_building_segment();
        true
    } else if trace.committed_segment_count() > 0 {
        if has_building {
            stats.segments_discarded += 1;
        }
        trace.discard_building_segment();
        true
    } else {
        stats.traces_dropped += 1;
        false
    }
}
