use clap::{
    Parser,
    Subcommand,
};
use serde::{
    Deserialize,
    Serialize,
};
use std::path::PathBuf;

#[derive(Parser, Debug)]
#[command(author, version, about, long_about = None)]
pub struct Args {
    #[command(subcommand)]
    pub command: Option<Commands>,
}

#[derive(Subcommand, Debug)]
pub enum Commands {
    /// Build chromatograms from centroided run files.
    Build(BuildArgs),
    /// Write template configuration and run files.
    WriteTemplate(WriteTemplateArgs),
}

#[derive(
    Debug,
    Default,
    Clone,
    Copy,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    clap::ValueEnum,
    Serialize,
    Deserialize,
)]
#[serde(rename_all = "kebab-case")]
pub enum SerializationFormat {
    Json,
    #[default]
    PrettyJson,
    Ndjson,
}

impl SerializationFormat {
    pub fn extension(&self) -> &'static str {
        match self {
            SerializationFormat::Json | SerializationFormat::PrettyJson => "json",
            SerializationFormat::Ndjson => "ndjson",
        }
    }
}

#[derive(Parser, Debug, Clone, Default)]
pub struct BuildArgs {
    /// The path to the json configuration file.
    #[arg(short, long)]
    pub config: Option<PathBuf>,

    /// Run files to process, replaces the runs listed in the configuration.
    #[arg(short, long = "input", num_args = 1..)]
    pub inputs: Vec<PathBuf>,

    /// The directory the results are written to.
    #[arg(short, long)]
    pub output_dir: Option<PathBuf>,

    /// The format to use for the output
    #[arg(short, long, value_enum)]
    pub format: Option<SerializationFormat>,

    /// Minimum apex intensity of a reported chromatogram.
    #[arg(long)]
    pub min_height: Option<f64>,

    /// Minimum retention time span (minutes) of a kept segment.
    #[arg(long)]
    pub min_duration: Option<f64>,

    /// MS level of the scans used to build chromatograms.
    #[arg(long)]
    pub ms_level: Option<u8>,
}

#[derive(Parser, Debug)]
pub struct WriteTemplateArgs {
    /// The path to the output files.
    #[arg(short, long)]
    pub output_path: PathBuf,
}
