//! Boundary with the (external) import layer.
//!
//! The builder only needs three things from a run: the ordered list of
//! scans, the centroided mass list of each scan, and the fragmentation
//! events used to link finished traces to an MS2 scan.

use nohash_hasher::IntMap;
use serde::{
    Deserialize,
    Serialize,
};

use crate::errors::BuildError;
use crate::models::{
    Peak,
    ScanRef,
};
use crate::utils::{
    TupleRange,
    binary_search_range_by_key,
};

/// Anything that can hand per-scan centroided peaks to the builder.
///
/// `scans` must be ordered by acquisition (and therefore by retention time);
/// the builder verifies the retention time order and refuses to run otherwise.
pub trait PeakListSource {
    fn name(&self) -> &str;

    /// Every scan of the run, in acquisition order.
    fn scans(&self) -> &[ScanRef];

    /// Centroided peaks of a scan, `None` if mass detection was never run on it.
    fn mass_list(&self, scan: &ScanRef) -> Option<&[Peak]>;

    fn fragment_index(&self) -> FragmentScanIndex {
        FragmentScanIndex::from_scans(self.scans())
    }
}

impl<S: PeakListSource + ?Sized> PeakListSource for &S {
    fn name(&self) -> &str {
        (**self).name()
    }

    fn scans(&self) -> &[ScanRef] {
        (**self).scans()
    }

    fn mass_list(&self, scan: &ScanRef) -> Option<&[Peak]> {
        (**self).mass_list(scan)
    }

    fn fragment_index(&self) -> FragmentScanIndex {
        (**self).fragment_index()
    }
}

#[derive(Debug, Clone, Copy, PartialEq, Serialize, Deserialize)]
pub struct FragmentScan {
    pub scan_number: u32,
    pub rt_minutes: f64,
    pub precursor_mz: f64,
    pub precursor_charge: i32,
}

/// Fragmentation scans of a run sorted by retention time.
#[derive(Debug, Clone, Default)]
pub struct FragmentScanIndex {
    scans: Vec<FragmentScan>,
}

impl FragmentScanIndex {
    pub fn from_scans(scans: &[ScanRef]) -> Self {
        let mut scans: Vec<FragmentScan> = scans
            .iter()
            .filter(|s| s.is_fragmentation() && s.rt_minutes.is_finite())
            .filter_map(|s| {
                s.precursor.map(|p| FragmentScan {
                    scan_number: s.scan_number,
                    rt_minutes: s.rt_minutes,
                    precursor_mz: p.mz,
                    precursor_charge: p.charge,
                })
            })
            .collect();
        // Stable, so scans sharing a retention time stay in acquisition order.
        scans.sort_by(|a, b| a.rt_minutes.total_cmp(&b.rt_minutes));
        Self { scans }
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }

    /// First fragmentation scan (in retention time order) acquired within
    /// `rt_range` whose precursor m/z lies within `mz_range`.
    pub fn first_within(
        &self,
        mz_range: TupleRange<f64>,
        rt_range: TupleRange<f64>,
    ) -> Option<&FragmentScan> {
        let idx = binary_search_range_by_key(&self.scans, rt_range.as_tuple(), |s| s.rt_minutes);
        self.scans[idx]
            .iter()
            .find(|s| mz_range.contains(s.precursor_mz))
    }
}

/// One scan of a [`CentroidedRun`] as it appears on disk.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct CentroidedScan {
    #[serde(flatten)]
    pub scan: ScanRef,
    #[serde(default)]
    pub mass_list: Option<MassListArrays>,
}

/// Column-major mass list, the usual layout of centroided spectra.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
pub struct MassListArrays {
    pub mz: Vec<f64>,
    pub intensity: Vec<f64>,
}

#[derive(Debug, Clone, Serialize, Deserialize)]
struct RunFile {
    name: String,
    scans: Vec<CentroidedScan>,
}

/// In-memory run of centroided scans.
///
/// Deserializes from
/// ```json
/// {
///   "name": "sample_01",
///   "scans": [
///     {"scan_number": 1, "rt_minutes": 1.0, "ms_level": 1,
///      "mass_list": {"mz": [500.0], "intensity": [100.0]}}
///   ]
/// }
/// ```
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(try_from = "RunFile", into = "RunFile")]
pub struct CentroidedRun {
    name: String,
    scans: Vec<ScanRef>,
    mass_lists: Vec<Option<Vec<Peak>>>,
    scan_lookup: IntMap<u32, usize>,
}

impl CentroidedRun {
    pub fn new(name: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            scans: Vec::new(),
            mass_lists: Vec::new(),
            scan_lookup: IntMap::default(),
        }
    }

    /// Appends a scan. `peaks == None` models a scan without a mass list.
    pub fn push_scan(&mut self, scan: ScanRef, peaks: Option<Vec<Peak>>) -> Result<(), BuildError> {
        if !scan.rt_minutes.is_finite() {
            return Err(BuildError::NonFiniteRetentionTime {
                scan_number: scan.scan_number,
                run: self.name.clone(),
                rt_minutes: scan.rt_minutes,
            });
        }
        if self.scan_lookup.contains_key(&scan.scan_number) {
            return Err(BuildError::DuplicateScan {
                scan_number: scan.scan_number,
                run: self.name.clone(),
            });
        }
        self.scan_lookup.insert(scan.scan_number, self.scans.len());
        self.scans.push(scan);
        self.mass_lists.push(peaks);
        Ok(())
    }

    pub fn len(&self) -> usize {
        self.scans.len()
    }

    pub fn is_empty(&self) -> bool {
        self.scans.is_empty()
    }
}

impl PeakListSource for CentroidedRun {
    fn name(&self) -> &str {
        &self.name
    }

    fn scans(&self) -> &[ScanRef] {
        &self.scans
    }

    fn mass_list(&self, scan: &ScanRef) -> Option<&[Peak]> {
        let idx = *self.scan_lookup.get(&scan.scan_number)?;
        self.mass_lists[idx].as_deref()
    }
}

impl TryFrom<RunFile> for CentroidedRun {
    type Error = String;

    fn try_from(value: RunFile) -> Result<Self, Self::Error> {
        let mut run = CentroidedRun::new(value.name);
        for entry in value.scans {
            let peaks = match entry.mass_list {
                Some(arrays) => {
                    if arrays.mz.len() != arrays.intensity.len() {
                        return Err(format!(
                            "Scan #{} has {} m/z values but {} intensities",
                            entry.scan.scan_number,
                            arrays.mz.len(),
                            arrays.intensity.len()
                        ));
                    }
                    Some(
                        arrays
                            .mz
                            .into_iter()
                            .zip(arrays.intensity)
                            .map(Peak::from)
                            .collect(),
                    )
                }
                None => None,
            };
            run.push_scan(entry.scan, peaks).map_err(|e| e.to_string())?;
        }
        Ok(run)
    }
}

impl From<CentroidedRun> for RunFile {
    fn from(value: CentroidedRun) -> Self {
        let scans = value
            .scans
            .into_iter()
            .zip(value.mass_lists)
            .map(|(scan, peaks)| CentroidedScan {
                scan,
                mass_list: peaks.map(|peaks| MassListArrays {
                    mz: peaks.iter().map(|p| p.mz).collect(),
                    intensity: peaks.iter().map(|p| p.intensity).collect(),
                }),
            })
            .collect();
        RunFile {
            name: value.name,
            scans,
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_run_from_json() {
        let json = r#"{
            "name": "tiny",
            "scans": [
                {"scan_number": 1, "rt_minutes": 1.0,
                 "mass_list": {"mz": [500.0, 600.0], "intensity": [10.0, 20.0]}},
                {"scan_number": 2, "rt_minutes": 1.05, "ms_level": 2,
                 "precursor": {"mz": 500.0, "charge": 2}},
                {"scan_number": 3, "rt_minutes": 1.1,
                 "mass_list": {"mz": [], "intensity": []}}
            ]
        }"#;
        let run: CentroidedRun = serde_json::from_str(json).unwrap();
        assert_eq!(run.name(), "tiny");
        assert_eq!(run.len(), 3);
        let scans = run.scans();
        assert_eq!(run.mass_list(&scans[0]).unwrap().len(), 2);
        assert!(run.mass_list(&scans[1]).is_none());
        assert!(run.mass_list(&scans[2]).unwrap().is_empty());
        assert_eq!(run.fragment_index().len(), 1);
    }

    #[test]
    fn test_run_rejects_mismatched_arrays() {
        let json = r#"{"name": "bad", "scans": [
            {"scan_number": 1, "rt_minutes": 1.0, "mass_list": {"mz": [1.0], "intensity": []}}
        ]}"#;
        assert!(serde_json::from_str::<CentroidedRun>(json).is_err());
    }

    #[test]
    fn test_run_rejects_duplicate_scans() {
        let mut run = CentroidedRun::new("dup");
        run.push_scan(ScanRef::new(1, 1.0), Some(vec![])).unwrap();
        let err = run.push_scan(ScanRef::new(1, 1.1), Some(vec![])).unwrap_err();
        assert!(matches!(err, BuildError::DuplicateScan { scan_number: 1, .. }));
    }

    #[test]
    fn test_run_rejects_non_finite_retention_time() {
        let mut run = CentroidedRun::new("nan");
        run.push_scan(ScanRef::new(1, 1.0), Some(vec![])).unwrap();
        let err = run
            .push_scan(ScanRef::new(2, f64::NAN), Some(vec![]))
            .unwrap_err();
        assert!(matches!(
            err,
            BuildError::NonFiniteRetentionTime { scan_number: 2, .. }
        ));
        assert!(
            run.push_scan(ScanRef::new(3, f64::INFINITY), Some(vec![]))
                .is_err()
        );
        assert_eq!(run.len(), 1);
    }

    #[test]
    fn test_run_json_roundtrip_keeps_missing_mass_lists() {
        let mut run = CentroidedRun::new("rt");
        run.push_scan(ScanRef::new(1, 1.0), Some(vec![Peak::new(100.0, 5.0)]))
            .unwrap();
        run.push_scan(ScanRef::new(2, 1.1), None).unwrap();
        let json = serde_json::to_string(&run).unwrap();
        let back: CentroidedRun = serde_json::from_str(&json).unwrap();
        assert_eq!(back.mass_list(&back.scans()[0]), Some(&[Peak::new(100.0, 5.0)][..]));
        assert!(back.mass_list(&back.scans()[1]).is_none());
    }

    #[test]
    fn test_fragment_index_first_within() {
        let scans = vec![
            ScanRef::new(1, 1.0),
            ScanRef::new(2, 1.02).with_ms_level(2).with_precursor(700.0, 1),
            ScanRef::new(3, 1.04).with_ms_level(2).with_precursor(500.001, 2),
            ScanRef::new(4, 1.06).with_ms_level(2).with_precursor(500.0, 3),
            ScanRef::new(5, 2.00).with_ms_level(2).with_precursor(500.0, 1),
        ];
        let index = FragmentScanIndex::from_scans(&scans);
        assert_eq!(index.len(), 4);

        let mz = TupleRange::try_new(499.99, 500.01).unwrap();
        let rt = TupleRange::try_new(1.0, 1.5).unwrap();
        let hit = index.first_within(mz, rt).unwrap();
        assert_eq!(hit.scan_number, 3);
        assert_eq!(hit.precursor_charge, 2);

        let late_rt = TupleRange::try_new(3.0, 4.0).unwrap();
        assert!(index.first_within(mz, late_rt).is_none());
    }
}
