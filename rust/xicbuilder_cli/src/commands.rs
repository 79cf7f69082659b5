use indicatif::{
    MultiProgress,
    ProgressBar,
    ProgressStyle,
};
use serde::Serialize;
use std::collections::HashSet;
use std::fs::File;
use std::io::{
    self,
    BufReader,
    BufWriter,
    Write,
};
use std::path::{
    Path,
    PathBuf,
};
use std::sync::atomic::{
    AtomicBool,
    Ordering,
};
use std::time::{
    Duration,
    Instant,
};
use tracing::{
    error,
    info,
    instrument,
    warn,
};
use xicbuilder::{
    BuildError,
    BuildProgress,
    CentroidedRun,
    ChromatogramBuilderTask,
    ConnectorStats,
    FeatureList,
    PeakListSource,
    build_runs_parallel,
};

use crate::cli::{
    BuildArgs,
    SerializationFormat,
    WriteTemplateArgs,
};
use crate::config::Config;
use crate::error::CliError;

const PROGRESS_TEMPLATE: &str =
    "{spinner:.green} [{elapsed_precise}] [{wide_bar:.cyan/blue}] {pos}/{len} ({eta}) {msg}";

/// Main function for the 'build' subcommand.
#[instrument(skip_all)]
pub fn main_build(args: BuildArgs) -> Result<(), CliError> {
    let config = match &args.config {
        Some(path) => Config::from_file(path)?,
        None => Config::default(),
    }
    .with_cli_args(&args);
    let output_dir = config.validate()?.to_path_buf();
    info!("Using builder config: {:#?}", config.builder);

    let runs = config
        .input
        .runs
        .iter()
        .map(|path| read_run_file(path))
        .collect::<Result<Vec<_>, _>>()?;
    std::fs::create_dir_all(&output_dir)?;

    let start = Instant::now();
    let mut tasks: Vec<_> = runs
        .iter()
        .map(|run| ChromatogramBuilderTask::new(run, config.builder.clone()))
        .collect();
    let results = build_with_progress(&mut tasks);
    info!("Built chromatograms for {} runs in {:?}", runs.len(), start.elapsed());

    let mut summaries = Vec::with_capacity(runs.len());
    let mut used_file_names = HashSet::new();
    let mut failed = 0;
    for (run, result) in runs.iter().zip(results) {
        match result {
            Ok(features) => {
                let file_name =
                    unique_output_file_name(&features.name, config.output.format, &mut used_file_names);
                let path = output_dir.join(file_name);
                write_feature_list(&features, &path, config.output.format)?;
                info!("Wrote {} chromatograms to {}", features.len(), path.display());
                summaries.push(RunSummary::new(&features, path));
            }
            Err(e) => {
                error!("Failed to build chromatograms for {}: {}", run.name(), e);
                failed += 1;
            }
        }
    }

    let summary_path = output_dir.join("summary.json");
    let writer = BufWriter::new(File::create(&summary_path)?);
    serde_json::to_writer_pretty(writer, &summaries)?;
    info!("Wrote run summary to {}", summary_path.display());

    if failed > 0 {
        return Err(CliError::RunsFailed {
            failed,
            total: runs.len(),
        });
    }
    Ok(())
}

pub fn read_run_file(path: &Path) -> Result<CentroidedRun, CliError> {
    info!("Loading run from {}", path.display());
    let reader = BufReader::new(File::open(path)?);
    let run: CentroidedRun = serde_json::from_reader(reader).map_err(|e| {
        CliError::DataReading(format!("Failed to read run file {}: {}", path.display(), e))
    })?;
    info!("Loaded {} scans of {}", run.len(), run.name());
    Ok(run)
}

#[derive(Debug, Serialize)]
struct RunSummary {
    name: String,
    run: String,
    scan_count: usize,
    num_chromatograms: usize,
    output: PathBuf,
    stats: ConnectorStats,
}

impl RunSummary {
    fn new(features: &FeatureList, output: PathBuf) -> Self {
        Self {
            name: features.name.clone(),
            run: features.run.clone(),
            scan_count: features.scan_count,
            num_chromatograms: features.len(),
            output,
            stats: features.stats,
        }
    }
}

fn output_file_name(feature_list_name: &str, format: SerializationFormat) -> String {
    let stem: String = feature_list_name
        .chars()
        .map(|c| if c.is_alphanumeric() || c == '-' || c == '.' { c } else { '_' })
        .collect();
    format!("{}.{}", stem, format.extension())
}

/// Like [`output_file_name`], but appends `_2`, `_3`, ... when an earlier
/// run of the same invocation already took the name.
fn unique_output_file_name(
    feature_list_name: &str,
    format: SerializationFormat,
    used: &mut HashSet<String>,
) -> String {
    let mut file_name = output_file_name(feature_list_name, format);
    let mut copy = 1;
    while !used.insert(file_name.clone()) {
        copy += 1;
        file_name = output_file_name(&format!("{feature_list_name}_{copy}"), format);
    }
    if copy > 1 {
        warn!(
            "Output file name for '{}' is already used by another run, writing to {} instead",
            feature_list_name, file_name
        );
    }
    file_name
}

/// Runs every task on the rayon pool while a progress bar per run is
/// refreshed from the tasks' progress counters.
fn build_with_progress<S: PeakListSource + Send>(
    tasks: &mut [ChromatogramBuilderTask<S>],
) -> Vec<Result<FeatureList, BuildError>> {
    let multi = MultiProgress::new();
    let style = ProgressStyle::with_template(PROGRESS_TEMPLATE)
        .unwrap_or_else(|_| ProgressStyle::default_bar());
    let bars: Vec<(ProgressBar, BuildProgress)> = tasks
        .iter()
        .map(|task| {
            let bar = multi.add(ProgressBar::new(0));
            bar.set_style(style.clone());
            bar.set_message(task.task_description());
            (bar, task.progress())
        })
        .collect();

    let done = AtomicBool::new(false);
    let results = std::thread::scope(|s| {
        s.spawn(|| {
            while !done.load(Ordering::Relaxed) {
                refresh_bars(&bars);
                std::thread::sleep(Duration::from_millis(100));
            }
        });
        let results = build_runs_parallel(tasks);
        done.store(true, Ordering::Relaxed);
        results
    });

    refresh_bars(&bars);
    for (bar, _) in bars.iter() {
        bar.finish();
    }
    results
}

fn refresh_bars(bars: &[(ProgressBar, BuildProgress)]) {
    for (bar, progress) in bars {
        bar.set_length(progress.total() as u64);
        bar.set_position(progress.processed() as u64);
    }
}

/// Writes the rows of a feature list, one item per chromatogram.
pub fn write_feature_list(
    features: &FeatureList,
    path: &Path,
    format: SerializationFormat,
) -> Result<(), CliError> {
    let writer = BufWriter::new(File::create(path)?);
    let mut ser = JsonStreamSerializer::new(writer, format);
    for row in features.rows.iter() {
        ser.serialize(row)?;
    }
    ser.finish()?;
    Ok(())
}

pub struct JsonStreamSerializer<W: Write> {
    writer: W,
    format: SerializationFormat,
    is_first: bool,
}

impl<W: Write> JsonStreamSerializer<W> {
    pub fn new(writer: W, format: SerializationFormat) -> Self {
        Self {
            writer,
            format,
            is_first: true,
        }
    }

    /// Serializes an item based on the selected format.
    pub fn serialize<T: Serialize>(&mut self, item: &T) -> io::Result<()> {
        match self.format {
            SerializationFormat::Ndjson => {
                serde_json::to_writer(&mut self.writer, item).map_err(io::Error::other)?;
                self.writer.write_all(b"\n")?;
            }
            SerializationFormat::Json | SerializationFormat::PrettyJson => {
                if self.is_first {
                    self.writer.write_all(b"[")?;
                    self.is_first = false;
                } else {
                    self.writer.write_all(b",")?;
                }

                if matches!(self.format, SerializationFormat::PrettyJson) {
                    serde_json::to_writer_pretty(&mut self.writer, item)
                } else {
                    serde_json::to_writer(&mut self.writer, item)
                }
                .map_err(io::Error::other)?;
            }
        }
        Ok(())
    }

    /// Closes the json array, if any, and flushes.
    pub fn finish(mut self) -> io::Result<()> {
        match self.format {
            SerializationFormat::Json | SerializationFormat::PrettyJson => {
                if self.is_first {
                    self.writer.write_all(b"[]")?;
                } else {
                    self.writer.write_all(b"]")?;
                }
            }
            SerializationFormat::Ndjson => {}
        }
        self.writer.flush()
    }
}

const CONFIG_TEMPLATE: &str = r#"{
  "input": {
    "runs": ["run_template.json"]
  },
  "builder": {
    "mz_tolerance": { "da_or_ppm": [0.002, 10.0] },
    "min_duration_minutes": 0.1,
    "min_height": 0.0,
    "ms_level": 1,
    "suffix": "chromatograms",
    "pad_zeros": false
  },
  "output": {
    "directory": "xicbuilder_results",
    "format": "pretty-json"
  }
}"#;

const RUN_TEMPLATE: &str = r#"{
  "name": "template_run",
  "scans": [
    {"scan_number": 1, "rt_minutes": 10.00, "ms_level": 1, "polarity": "positive",
     "mass_list": {"mz": [500.2501, 622.0290], "intensity": [1200.0, 80.0]}},
    {"scan_number": 2, "rt_minutes": 10.05, "ms_level": 1, "polarity": "positive",
     "mass_list": {"mz": [500.2503], "intensity": [5400.0]}},
    {"scan_number": 3, "rt_minutes": 10.07, "ms_level": 2, "polarity": "positive",
     "precursor": {"mz": 500.2503, "charge": 2},
     "mass_list": {"mz": [175.1190, 288.2030], "intensity": [300.0, 150.0]}},
    {"scan_number": 4, "rt_minutes": 10.10, "ms_level": 1, "polarity": "positive",
     "mass_list": {"mz": [500.2500], "intensity": [9800.0]}},
    {"scan_number": 5, "rt_minutes": 10.15, "ms_level": 1, "polarity": "positive",
     "mass_list": {"mz": [500.2499, 301.1410], "intensity": [4100.0, 60.0]}},
    {"scan_number": 6, "rt_minutes": 10.20, "ms_level": 1, "polarity": "positive",
     "mass_list": {"mz": [500.2502], "intensity": [900.0]}}
  ]
}"#;

/// Main function for the 'write-template' subcommand.
pub fn main_write_template(args: WriteTemplateArgs) -> Result<(), CliError> {
    let target_dir = args.output_path;
    std::fs::create_dir_all(&target_dir)?;

    let config_path = target_dir.join("config_template.json");
    let run_path = target_dir.join("run_template.json");
    std::fs::write(&config_path, CONFIG_TEMPLATE)?;
    std::fs::write(&run_path, RUN_TEMPLATE)?;
    println!(
        "Wrote templates to:\n- {}\n- {}",
        config_path.display(),
        run_path.display()
    );
    Ok(())
}
