use rand::{
    Rng,
    SeedableRng,
};
use rand_chacha::ChaCha8Rng;
use xicbuilder::{
    BuildError,
    BuilderConfig,
    CentroidedRun,
    ChromatogramBuilderTask,
    FeatureList,
    HighestDataPointConnector,
    MzTolerance,
    Peak,
    PeakListSource,
    ScanRef,
    build_runs_parallel,
};

const RANDOM_SEED: u64 = 42;
const NUM_MS1_SCANS: u32 = 400;
const SCAN_SPACING_MINUTES: f64 = 0.05;
const NOISE_PEAKS_PER_SCAN: usize = 30;

#[derive(Debug, Clone, Copy)]
struct Analyte {
    mz: f64,
    apex_rt: f64,
    width: f64,
    height: f64,
}

struct SyntheticRun {
    run: CentroidedRun,
    analytes: Vec<Analyte>,
}

/// Gaussian elution profiles on a regular m/z grid, a few ppm of m/z jitter,
/// low intensity noise, and one MS2 scan right after each analyte apex.
fn synthetic_run(seed: u64, name: &str) -> SyntheticRun {
    let mut rng = ChaCha8Rng::seed_from_u64(seed);
    let analytes: Vec<Analyte> = (0..20)
        .map(|i| Analyte {
            mz: 200.0 + 47.3 * i as f64,
            apex_rt: rng.gen_range(2.0..18.0),
            width: rng.gen_range(0.05..0.3),
            height: rng.gen_range(1e3..1e6),
        })
        .collect();

    let mut run = CentroidedRun::new(name);
    let mut scan_number = 0;
    let mut fragmented = vec![false; analytes.len()];
    for i in 0..NUM_MS1_SCANS {
        let rt = i as f64 * SCAN_SPACING_MINUTES;
        let mut peaks = Vec::new();
        let mut precursors = Vec::new();
        for (k, analyte) in analytes.iter().enumerate() {
            let z = (rt - analyte.apex_rt) / analyte.width;
            let intensity = analyte.height * (-0.5 * z * z).exp();
            if intensity < 50.0 {
                continue;
            }
            let mz = analyte.mz * (1.0 + rng.gen_range(-3e-6..3e-6));
            peaks.push(Peak::new(mz, intensity));
            if rt >= analyte.apex_rt && !fragmented[k] {
                fragmented[k] = true;
                precursors.push(mz);
            }
        }
        for _ in 0..NOISE_PEAKS_PER_SCAN {
            peaks.push(Peak::new(
                rng.gen_range(150.0..1250.0),
                rng.gen_range(10.0..200.0),
            ));
        }

        scan_number += 1;
        run.push_scan(ScanRef::new(scan_number, rt), Some(peaks))
            .unwrap();
        for (j, precursor_mz) in precursors.into_iter().enumerate() {
            scan_number += 1;
            let ms2 = ScanRef::new(scan_number, rt + 0.001 * (j + 1) as f64)
                .with_ms_level(2)
                .with_precursor(precursor_mz, 2);
            run.push_scan(ms2, Some(vec![])).unwrap();
        }
    }
    SyntheticRun { run, analytes }
}

fn config() -> BuilderConfig {
    BuilderConfig {
        mz_tolerance: MzTolerance::DaOrPpm((0.002, 10.0)),
        min_duration_minutes: 0.1,
        min_height: 500.0,
        ..Default::default()
    }
}

fn build(run: &CentroidedRun, config: BuilderConfig) -> Result<FeatureList, BuildError> {
    ChromatogramBuilderTask::new(run, config).run()
}

#[test]
fn test_build_is_deterministic() {
    let synthetic = synthetic_run(RANDOM_SEED, "determinism");
    let first = build(&synthetic.run, config()).unwrap();
    let second = build(&synthetic.run, config()).unwrap();
    assert_eq!(first, second);
    assert_eq!(
        serde_json::to_string(&first).unwrap(),
        serde_json::to_string(&second).unwrap()
    );

    // Same seed, freshly generated data.
    let regenerated = synthetic_run(RANDOM_SEED, "determinism");
    assert_eq!(first, build(&regenerated.run, config()).unwrap());
}

#[test]
fn test_trace_invariants_hold() {
    let synthetic = synthetic_run(RANDOM_SEED, "invariants");
    let config = config();
    let features = build(&synthetic.run, config.clone()).unwrap();
    assert!(!features.is_empty());
    assert_eq!(features.scan_count, NUM_MS1_SCANS as usize);

    for (expected_id, row) in (1..).zip(features.rows.iter()) {
        assert_eq!(row.id, expected_id);
    }
    for pair in features.rows.windows(2) {
        assert!(pair[0].trace.mz() <= pair[1].trace.mz());
    }

    for trace in features.traces() {
        assert!(trace.height() >= config.min_height);
        assert!(trace.duration_minutes() >= config.min_duration_minutes);
        if trace.num_points() >= 2 {
            assert!(trace.area() >= 0.0);
        }
        for pair in trace.points().windows(2) {
            assert!(pair[0].scan_number < pair[1].scan_number);
            assert!(
                config
                    .mz_tolerance
                    .within_tolerance(pair[0].mz, pair[1].mz),
                "{:?} -> {:?} jumps outside the tolerance",
                pair[0],
                pair[1]
            );
        }
        assert!(trace.mz_range().contains(trace.mz()));
        assert!(trace.intensity_range().contains(trace.height()));
    }
}

#[test]
fn test_analytes_are_recovered_with_fragment_links() {
    let synthetic = synthetic_run(RANDOM_SEED, "recovery");
    let features = build(&synthetic.run, config()).unwrap();

    for analyte in synthetic.analytes.iter() {
        let trace = features
            .traces()
            .find(|t| (t.mz() - analyte.mz).abs() < 0.01 && t.height() > 500.0)
            .unwrap_or_else(|| panic!("No trace found for {:?}", analyte));
        assert!(
            (trace.rt_minutes() - analyte.apex_rt).abs() <= SCAN_SPACING_MINUTES,
            "Apex of {:?} found at {}",
            analyte,
            trace.rt_minutes()
        );
        assert!(trace.fragment_scan().is_some());
        assert_eq!(trace.charge(), 2);
    }
}

#[test]
fn test_empty_scans_do_not_break_traces_with_zero_min_duration() {
    let mut run = CentroidedRun::new("gaps");
    let pattern: &[Option<f64>] = &[Some(10.0), Some(30.0), None, Some(20.0), None, None];
    for (i, intensity) in pattern.iter().enumerate() {
        let peaks = intensity
            .map(|x| vec![Peak::new(300.0, x)])
            .unwrap_or_default();
        run.push_scan(ScanRef::new(i as u32, i as f64 * 0.1), Some(peaks))
            .unwrap();
    }
    let features = build(
        &run,
        BuilderConfig {
            min_duration_minutes: 0.0,
            ..Default::default()
        },
    )
    .unwrap();
    assert_eq!(features.len(), 1);
    let trace = &features.rows[0].trace;
    assert_eq!(trace.num_points(), 3);
    assert_eq!(trace.height(), 30.0);
}

#[test]
fn test_finalize_is_idempotent() {
    let synthetic = synthetic_run(RANDOM_SEED + 1, "idempotent");
    let run = &synthetic.run;
    let config = config();
    let mut connector = HighestDataPointConnector::new(
        config.mz_tolerance,
        config.min_duration_minutes,
        config.min_height,
    );
    let ms1: Vec<&ScanRef> = run.scans().iter().filter(|s| s.ms_level == 1).collect();
    for scan in ms1.iter().take(ms1.len() / 2) {
        connector.add_scan(scan, run.mass_list(scan).unwrap());
    }
    assert!(connector.alive_count() > 0);

    let fragments = run.fragment_index();
    for trace in connector.alive_traces() {
        let once = trace.clone().finalize(&fragments);
        let twice = trace.clone().finalize(&fragments);
        assert_eq!(once, twice);
    }
}

#[test]
fn test_parallel_runs_match_sequential_builds() {
    let runs: Vec<SyntheticRun> = (0..4)
        .map(|i| synthetic_run(RANDOM_SEED + i, &format!("run_{i}")))
        .collect();
    let mut tasks: Vec<_> = runs
        .iter()
        .map(|s| ChromatogramBuilderTask::new(&s.run, config()))
        .collect();
    let parallel = build_runs_parallel(&mut tasks);
    assert_eq!(parallel.len(), runs.len());
    for (synthetic, result) in runs.iter().zip(parallel) {
        let result = result.unwrap();
        assert_eq!(result.name, format!("{} chromatograms", synthetic.run.name()));
        assert_eq!(result, build(&synthetic.run, config()).unwrap());
    }
}

#[test]
fn test_run_file_roundtrip_builds_the_same_features() {
    let synthetic = synthetic_run(RANDOM_SEED + 7, "roundtrip");
    let json = serde_json::to_string(&synthetic.run).unwrap();
    let reloaded: CentroidedRun = serde_json::from_str(&json).unwrap();
    assert_eq!(
        build(&synthetic.run, config()).unwrap(),
        build(&reloaded, config()).unwrap()
    );
}
