use thiserror::Error;
use xicbuilder::BuildError;

#[derive(Error, Debug)]
pub enum CliError {
    #[error("I/O error: {0}")]
    Io(#[from] std::io::Error),

    #[error("JSON parsing error: {0}")]
    Json(#[from] serde_json::Error),

    #[error("Chromatogram building error: {0}")]
    Build(#[from] BuildError),

    #[error("Configuration error: {0}")]
    Config(String),

    #[error("Data reading error: {0}")]
    DataReading(String),

    #[error("{failed} of {total} runs failed, see the log for details")]
    RunsFailed { failed: usize, total: usize },
}
