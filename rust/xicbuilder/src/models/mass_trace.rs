use serde::{
    Deserialize,
    Serialize,
};

use crate::models::{
    Peak,
    ScanRef,
};
use crate::source::FragmentScanIndex;
use crate::utils::streaming_calculators::RunningMean;
use crate::utils::{
    TupleRange,
    median_in_place,
    span_option,
};

/// One peak of a trace together with the scan it was observed in.
#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct TracePoint {
    pub scan_number: u32,
    pub rt_minutes: f64,
    pub mz: f64,
    pub intensity: f64,
}

impl TracePoint {
    fn new(scan: &ScanRef, peak: Peak) -> Self {
        Self {
            scan_number: scan.scan_number,
            rt_minutes: scan.rt_minutes,
            mz: peak.mz,
            intensity: peak.intensity,
        }
    }
}

/// A mass trace that is still being built.
///
/// Points are only ever appended in scan order, so the "building segment"
/// (everything added since the last commit or discard) is always the tail
/// of `points` starting at `building_start`.
#[derive(Debug, Clone)]
pub struct MassTrace {
    points: Vec<TracePoint>,
    building_start: usize,
    committed_segments: u32,
    running_mz: RunningMean,
    last_peak: Peak,
}

impl MassTrace {
    /// Starts a new trace seeded with a single peak.
    pub fn new(scan: &ScanRef, peak: Peak) -> Self {
        let mut running_mz = RunningMean::default();
        running_mz.add(peak.mz);
        Self {
            points: vec![TracePoint::new(scan, peak)],
            building_start: 0,
            committed_segments: 0,
            running_mz,
            last_peak: peak,
        }
    }

    pub fn add_peak(&mut self, scan: &ScanRef, peak: Peak) {
        debug_assert!(
            self.points
                .last()
                .is_none_or(|p| p.scan_number != scan.scan_number && p.rt_minutes <= scan.rt_minutes),
            "peaks must be added once per scan and in retention time order"
        );
        self.points.push(TracePoint::new(scan, peak));
        self.running_mz.add(peak.mz);
        self.last_peak = peak;
    }

    /// Anchor for matching the next scan: the most recently added peak.
    ///
    /// Discarding the building segment moves it back to the last retained
    /// point, so consecutive points always satisfy the tolerance they were
    /// matched with.
    pub fn last_peak(&self) -> Peak {
        self.last_peak
    }

    /// Mean m/z of every peak ever added, including discarded ones.
    pub fn running_mean_mz(&self) -> f64 {
        self.running_mz.mean().unwrap_or(self.last_peak.mz)
    }

    pub fn points(&self) -> &[TracePoint] {
        &self.points
    }

    pub fn building_segment(&self) -> &[TracePoint] {
        &self.points[self.building_start..]
    }

    pub fn committed_segment_count(&self) -> u32 {
        self.committed_segments
    }

    /// Retention time spanned by the building segment, in minutes.
    pub fn building_segment_duration(&self) -> f64 {
        match self.building_segment() {
            [first, .., last] => last.rt_minutes - first.rt_minutes,
            _ => 0.0,
        }
    }

    pub fn commit_building_segment(&mut self) {
        self.committed_segments += 1;
        self.building_start = self.points.len();
    }

    pub fn discard_building_segment(&mut self) {
        self.points.truncate(self.building_start);
        if let Some(last) = self.points.last() {
            self.last_peak = Peak::new(last.mz, last.intensity);
        }
    }

    /// Computes the derived statistics and freezes the trace.
    ///
    /// Returns `None` when every point has been discarded.
    pub fn finalize(self, fragments: &FragmentScanIndex) -> Option<FinalizedTrace> {
        let first = *self.points.first()?;

        let mut apex = first;
        let mut intensity_range = TupleRange::singleton(first.intensity);
        let mut mz_range = TupleRange::singleton(first.mz);
        let mut rt_range = None;
        let mut area = 0.0;
        let mut weighted_mz_sum = 0.0;
        let mut intensity_sum = 0.0;
        let mut previous: Option<TracePoint> = None;

        for point in self.points.iter() {
            intensity_range = intensity_range.span(point.intensity);
            mz_range = mz_range.span(point.mz);
            if point.intensity > apex.intensity {
                apex = *point;
            }
            weighted_mz_sum += point.mz * point.intensity;
            intensity_sum += point.intensity;
            // Zero intensity placeholders do not extend the retention time span.
            if point.intensity > 0.0 {
                rt_range = span_option(rt_range, point.rt_minutes);
            }
            if let Some(prev) = previous {
                let prev_rt_seconds = prev.rt_minutes * 60.0;
                let rt_seconds = point.rt_minutes * 60.0;
                area += (rt_seconds - prev_rt_seconds) * (prev.intensity + point.intensity) / 2.0;
            }
            previous = Some(*point);
        }

        let mut mzs: Vec<f64> = self.points.iter().map(|p| p.mz).collect();
        let mz = median_in_place(&mut mzs).unwrap_or(first.mz);
        let weighted_mz = if intensity_sum > 0.0 {
            weighted_mz_sum / intensity_sum
        } else {
            mz
        };

        let fragment = rt_range.and_then(|rt| fragments.first_within(mz_range, rt));
        let charge = match fragment {
            Some(f) if f.precursor_charge > 0 => f.precursor_charge,
            _ => 0,
        };

        Some(FinalizedTrace {
            mz,
            weighted_mz,
            rt_minutes: apex.rt_minutes,
            height: apex.intensity,
            area,
            representative_scan: apex.scan_number,
            intensity_range,
            mz_range,
            rt_range,
            fragment_scan: fragment.map(|f| f.scan_number),
            charge,
            points: self.points,
        })
    }
}

/// A finished, immutable chromatogram.
///
/// Area is integrated with retention times in seconds.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct FinalizedTrace {
    mz: f64,
    weighted_mz: f64,
    rt_minutes: f64,
    height: f64,
    area: f64,
    representative_scan: u32,
    intensity_range: TupleRange<f64>,
    mz_range: TupleRange<f64>,
    rt_range: Option<TupleRange<f64>>,
    fragment_scan: Option<u32>,
    charge: i32,
    points: Vec<TracePoint>,
}

impl FinalizedTrace {
    /// Median m/z of the retained peaks.
    pub fn mz(&self) -> f64 {
        self.mz
    }

    /// Intensity weighted mean m/z. Falls back to the median when every
    /// point has zero intensity.
    pub fn weighted_mz(&self) -> f64 {
        self.weighted_mz
    }

    /// Retention time of the apex, in minutes.
    pub fn rt_minutes(&self) -> f64 {
        self.rt_minutes
    }

    pub fn height(&self) -> f64 {
        self.height
    }

    pub fn area(&self) -> f64 {
        self.area
    }

    /// Scan number of the apex.
    pub fn representative_scan(&self) -> u32 {
        self.representative_scan
    }

    pub fn intensity_range(&self) -> TupleRange<f64> {
        self.intensity_range
    }

    pub fn mz_range(&self) -> TupleRange<f64> {
        self.mz_range
    }

    /// Retention time span of the points with a positive intensity.
    pub fn rt_range(&self) -> Option<TupleRange<f64>> {
        self.rt_range
    }

    pub fn fragment_scan(&self) -> Option<u32> {
        self.fragment_scan
    }

    /// Precursor charge copied from the fragmentation scan, 0 if unknown.
    pub fn charge(&self) -> i32 {
        self.charge
    }

    pub fn points(&self) -> &[TracePoint] {
        &self.points
    }

    pub fn num_points(&self) -> usize {
        self.points.len()
    }

    /// Retention time between the first and last retained point, in minutes.
    pub fn duration_minutes(&self) -> f64 {
        match self.points.as_slice() {
            [first, .., last] => last.rt_minutes - first.rt_minutes,
            _ => 0.0,
        }
    }

    /// Adds a zero intensity point at `before` and at `after`, the scans
    /// right around the trace, so its shape starts and ends at the baseline.
    ///
    /// The padding reuses the m/z of the neighbouring edge point. Area and
    /// intensity range include it; m/z values, apex and retention time
    /// range do not change.
    pub fn pad_edges(&mut self, before: Option<&ScanRef>, after: Option<&ScanRef>) {
        if let (Some(scan), Some(first)) = (before, self.points.first().copied()) {
            let zero = TracePoint::new(scan, Peak::new(first.mz, 0.0));
            self.area += (first.rt_minutes - zero.rt_minutes) * 60.0 * first.intensity / 2.0;
            self.intensity_range = self.intensity_range.span(0.0);
            self.points.insert(0, zero);
        }
        if let (Some(scan), Some(last)) = (after, self.points.last().copied()) {
            let zero = TracePoint::new(scan, Peak::new(last.mz, 0.0));
            self.area += (zero.rt_minutes - last.rt_minutes) * 60.0 * last.intensity / 2.0;
            self.intensity_range = self.intensity_range.span(0.0);
            self.points.push(zero);
        }
    }
}
