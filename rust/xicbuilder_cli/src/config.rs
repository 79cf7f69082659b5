use serde::{
    Deserialize,
    Serialize,
};
use std::path::{
    Path,
    PathBuf,
};
use xicbuilder::BuilderConfig;

use crate::cli::{
    BuildArgs,
    SerializationFormat,
};
use crate::error::CliError;

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct Config {
    #[serde(default)]
    pub input: InputConfig,
    #[serde(default)]
    pub builder: BuilderConfig,
    #[serde(default)]
    pub output: OutputConfig,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct InputConfig {
    /// Centroided run files, one json file per run.
    #[serde(default)]
    pub runs: Vec<PathBuf>,
}

#[derive(Debug, Serialize, Deserialize, Clone, Default)]
pub struct OutputConfig {
    pub directory: Option<PathBuf>,
    #[serde(default)]
    pub format: SerializationFormat,
}

impl Config {
    pub fn from_file(path: &Path) -> Result<Self, CliError> {
        let contents = std::fs::read_to_string(path)?;
        Ok(serde_json::from_str(&contents)?)
    }

    /// Command line arguments take precedence over the file contents.
    pub fn with_cli_args(mut self, args: &BuildArgs) -> Self {
        if !args.inputs.is_empty() {
            self.input.runs = args.inputs.clone();
        }
        if let Some(dir) = &args.output_dir {
            self.output.directory = Some(dir.clone());
        }
        if let Some(format) = args.format {
            self.output.format = format;
        }
        if let Some(min_height) = args.min_height {
            self.builder.min_height = min_height;
        }
        if let Some(min_duration) = args.min_duration {
            self.builder.min_duration_minutes = min_duration;
        }
        if let Some(ms_level) = args.ms_level {
            self.builder.ms_level = Some(ms_level);
        }
        self
    }

    pub fn validate(&self) -> Result<&Path, CliError> {
        if self.input.runs.is_empty() {
            return Err(CliError::Config(
                "No input runs given, use --input or the 'input.runs' config field".to_string(),
            ));
        }
        self.builder.validate()?;
        self.output.directory.as_deref().ok_or_else(|| {
            CliError::Config(
                "No output directory given, use --output-dir or the 'output.directory' config field"
                    .to_string(),
            )
        })
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use xicbuilder::MzTolerance;

    #[test]
    fn test_cli_args_override_config() {
        let config: Config = serde_json::from_str(
            r#"{
                "input": {"runs": ["a.json"]},
                "builder": {"mz_tolerance": {"ppm": [5.0, 5.0]}, "min_height": 100.0},
                "output": {"directory": "out", "format": "ndjson"}
            }"#,
        )
        .unwrap();
        assert_eq!(config.output.format, SerializationFormat::Ndjson);

        let args = BuildArgs {
            inputs: vec![PathBuf::from("b.json"), PathBuf::from("c.json")],
            min_height: Some(5.0),
            ms_level: Some(2),
            ..Default::default()
        };
        let config = config.with_cli_args(&args);
        assert_eq!(config.input.runs.len(), 2);
        assert_eq!(config.builder.min_height, 5.0);
        assert_eq!(config.builder.ms_level, Some(2));
        assert_eq!(config.builder.mz_tolerance, MzTolerance::Ppm((5.0, 5.0)));
        assert_eq!(config.validate().unwrap(), Path::new("out"));
    }

    #[test]
    fn test_validate_requires_inputs_and_output() {
        let config = Config::default();
        assert!(matches!(config.validate(), Err(CliError::Config(_))));

        let args = BuildArgs {
            inputs: vec![PathBuf::from("a.json")],
            ..Default::default()
        };
        let config = Config::default().with_cli_args(&args);
        assert!(matches!(config.validate(), Err(CliError::Config(_))));
    }

    #[test]
    fn test_validate_rejects_bad_builder_config() {
        let args = BuildArgs {
            inputs: vec![PathBuf::from("a.json")],
            output_dir: Some(PathBuf::from("out")),
            min_duration: Some(-1.0),
            ..Default::default()
        };
        let config = Config::default().with_cli_args(&args);
        assert!(matches!(config.validate(), Err(CliError::Build(_))));
    }
}
