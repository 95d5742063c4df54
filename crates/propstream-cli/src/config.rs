use crate::cli::Cli;
use crate::error::{CliError, Result};
use propstream::core::io::format::Delimiter;
use propstream::engine::catalog::ModelCatalog;
use propstream::engine::config::{PredictionConfig, PredictionConfigBuilder};
use propstream::engine::error::EngineError;
use propstream::engine::fragment::FragmentMode;
use propstream::engine::repository::ModelLocation;
use serde::Deserialize;
use std::collections::BTreeMap;
use std::path::{Path, PathBuf};
use tracing::{debug, warn};

pub const MODEL_BASE_ENV: &str = "BASE_MODEL_URL";
pub const DEFAULT_MODEL_BASE: &str = "/models";
pub const DEFAULT_OUTPUT: &str = "result.sdf";

/// Run defaults read from a `--config` TOML file. Every key is optional and
/// command-line flags take precedence.
///
/// ```toml
/// model-base-path = "https://models.example.org/admet"
/// delimiter = "comma"
/// write-header = true
///
/// [models]
/// herg = "hERG model"
/// ```
#[derive(Deserialize, Debug, Default)]
#[serde(rename_all = "kebab-case", deny_unknown_fields)]
pub struct PartialRunConfig {
    model_base_path: Option<String>,
    output: Option<PathBuf>,
    delimiter: Option<String>,
    id_column: Option<String>,
    read_header: Option<bool>,
    write_header: Option<bool>,
    sdf_read_records: Option<usize>,
    reporting_interval: Option<usize>,
    fragment: Option<String>,
    notation_field: Option<String>,
    input_format: Option<String>,
    output_format: Option<String>,
    /// Display names by model id, added to the built-in catalog.
    #[serde(default)]
    models: BTreeMap<String, String>,
}

/// Everything a prediction run needs once flags, file and defaults are merged.
#[derive(Debug)]
pub struct RunConfig {
    pub prediction: PredictionConfig,
    pub catalog: ModelCatalog,
}

impl PartialRunConfig {
    pub fn from_file(path: &Path) -> Result<Self> {
        debug!("Loading configuration from file: {:?}", path);
        let content = std::fs::read_to_string(path)?;
        toml::from_str(&content).map_err(|e| CliError::FileParsing {
            path: path.to_path_buf(),
            source: e.into(),
        })
    }

    /// Reads the `--config` file if one was given, or starts empty.
    pub fn load(path: Option<&Path>) -> Result<Self> {
        path.map_or_else(|| Ok(Self::default()), Self::from_file)
    }

    /// Merges with the command line, which wins over the file. `env_base` is
    /// the value of the model base environment variable, consulted only when
    /// neither names a base path.
    pub fn merge_with_cli(self, args: &Cli, env_base: Option<String>) -> Result<RunConfig> {
        let base = resolve_model_base(
            args.model_base_path.clone().or(self.model_base_path),
            env_base,
        );

        let mut builder = PredictionConfigBuilder::new()
            .models(args.models.iter().cloned())
            .model_location(ModelLocation::parse(&base))
            .input_path(args.input.clone())
            .output_path(
                args.output
                    .clone()
                    .or(self.output)
                    .unwrap_or_else(|| PathBuf::from(DEFAULT_OUTPUT)),
            )
            .read_header(args.read_header || self.read_header.unwrap_or(false))
            .write_header(args.write_header || self.write_header.unwrap_or(false));

        if let Some(name) = args.delimiter.as_deref().or(self.delimiter.as_deref()) {
            let delimiter: Delimiter = name.parse().map_err(EngineError::Format)?;
            builder = builder.delimiter(delimiter);
        }
        if let Some(mode) = args.fragment.as_deref().or(self.fragment.as_deref()) {
            let mode: FragmentMode = mode.parse().map_err(EngineError::Fragment)?;
            builder = builder.fragment(mode);
        }
        if let Some(column) = args.id_column.clone().or(self.id_column) {
            builder = builder.id_column(column);
        }
        if let Some(records) = args.sdf_read_records.or(self.sdf_read_records) {
            builder = builder.lookahead(records);
        }
        if let Some(records) = args.reporting_interval.or(self.reporting_interval) {
            builder = builder.reporting_interval(records);
        }
        if let Some(name) = args.notation_field.clone().or(self.notation_field) {
            builder = builder.notation_field(name);
        }
        if let Some(name) = args.input_format.clone().or(self.input_format) {
            builder = builder.input_format(name);
        }
        if let Some(name) = args.output_format.clone().or(self.output_format) {
            builder = builder.output_format(name);
        }

        let prediction = builder.build().map_err(EngineError::Config)?;
        let catalog = ModelCatalog::default().extended(self.models);
        Ok(RunConfig {
            prediction,
            catalog,
        })
    }
}

fn resolve_model_base(explicit: Option<String>, env_base: Option<String>) -> String {
    if let Some(base) = explicit {
        return base;
    }
    match env_base.filter(|value| !value.trim().is_empty()) {
        Some(base) => {
            debug!("Using model base path from ${MODEL_BASE_ENV}: {base}");
            base
        }
        None => {
            warn!(
                "Neither --model-base-path nor ${MODEL_BASE_ENV} is set; using {DEFAULT_MODEL_BASE}"
            );
            DEFAULT_MODEL_BASE.to_string()
        }
    }
}
