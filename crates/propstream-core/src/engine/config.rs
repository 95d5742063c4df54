use super::fragment::FragmentMode;
use super::repository::ModelLocation;
use crate::core::io::format::{Delimiter, FormatError, RecordFormat};
use crate::core::io::sdf::DEFAULT_LOOKAHEAD;
use std::path::PathBuf;
use thiserror::Error;

pub const DEFAULT_REPORTING_INTERVAL: usize = 100;

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum ConfigError {
    #[error("Missing required parameter: {0}")]
    MissingParameter(&'static str),
    #[error("Invalid value for {parameter}: {reason}")]
    InvalidValue {
        parameter: &'static str,
        reason: String,
    },
    #[error(transparent)]
    Format(#[from] FormatError),
}

/// How a record's identifier is located in the input.
#[derive(Debug, Clone, PartialEq, Eq, Default)]
pub enum IdentifierSource {
    #[default]
    None,
    /// Zero-based column of a tabular input.
    Column(usize),
    /// Annotation name of an SD input.
    Field(String),
}

#[derive(Debug, Clone, PartialEq)]
pub struct InputConfig {
    pub path: PathBuf,
    pub format: RecordFormat,
    pub delimiter: Delimiter,
    pub read_header: bool,
    pub identifier: IdentifierSource,
    pub lookahead: usize,
}

#[derive(Debug, Clone, PartialEq)]
pub struct OutputConfig {
    pub path: PathBuf,
    pub format: RecordFormat,
    pub delimiter: Delimiter,
    pub write_header: bool,
    pub notation_field: Option<String>,
}

#[derive(Debug, Clone, PartialEq)]
pub struct PredictionConfig {
    /// Requested model ids, first-requested order, duplicates removed.
    pub models: Vec<String>,
    pub model_location: ModelLocation,
    pub input: InputConfig,
    pub output: OutputConfig,
    pub fragment: Option<FragmentMode>,
    pub reporting_interval: usize,
}

#[derive(Default)]
pub struct PredictionConfigBuilder {
    models: Vec<String>,
    model_location: Option<ModelLocation>,
    input_path: Option<PathBuf>,
    input_format: Option<String>,
    output_path: Option<PathBuf>,
    output_format: Option<String>,
    delimiter: Option<Delimiter>,
    read_header: bool,
    write_header: bool,
    id_column: Option<String>,
    lookahead: Option<usize>,
    reporting_interval: Option<usize>,
    fragment: Option<FragmentMode>,
    notation_field: Option<String>,
}

impl PredictionConfigBuilder {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn model(mut self, id: impl Into<String>) -> Self {
        let id = id.into();
        if !self.models.contains(&id) {
            self.models.push(id);
        }
        self
    }
    pub fn models<I, S>(self, ids: I) -> Self
    where
        I: IntoIterator<Item = S>,
        S: Into<String>,
    {
        ids.into_iter().fold(self, |builder, id| builder.model(id))
    }
    pub fn model_location(mut self, location: ModelLocation) -> Self {
        self.model_location = Some(location);
        self
    }
    pub fn input_path(mut self, path: PathBuf) -> Self {
        self.input_path = Some(path);
        self
    }
    /// Explicit input format name; the path suffix decides when unset.
    pub fn input_format(mut self, name: impl Into<String>) -> Self {
        self.input_format = Some(name.into());
        self
    }
    pub fn output_path(mut self, path: PathBuf) -> Self {
        self.output_path = Some(path);
        self
    }
    pub fn output_format(mut self, name: impl Into<String>) -> Self {
        self.output_format = Some(name.into());
        self
    }
    pub fn delimiter(mut self, delimiter: Delimiter) -> Self {
        self.delimiter = Some(delimiter);
        self
    }
    pub fn read_header(mut self, read: bool) -> Self {
        self.read_header = read;
        self
    }
    pub fn write_header(mut self, write: bool) -> Self {
        self.write_header = write;
        self
    }
    /// Column index for tabular inputs, annotation name for SD inputs.
    pub fn id_column(mut self, column: impl Into<String>) -> Self {
        self.id_column = Some(column.into());
        self
    }
    pub fn lookahead(mut self, records: usize) -> Self {
        self.lookahead = Some(records);
        self
    }
    pub fn reporting_interval(mut self, records: usize) -> Self {
        self.reporting_interval = Some(records);
        self
    }
    pub fn fragment(mut self, mode: FragmentMode) -> Self {
        self.fragment = Some(mode);
        self
    }
    pub fn notation_field(mut self, name: impl Into<String>) -> Self {
        self.notation_field = Some(name.into());
        self
    }

    pub fn build(self) -> Result<PredictionConfig, ConfigError> {
        let input_path = self
            .input_path
            .ok_or(ConfigError::MissingParameter("input_path"))?;
        let output_path = self
            .output_path
            .ok_or(ConfigError::MissingParameter("output_path"))?;
        let model_location = self
            .model_location
            .ok_or(ConfigError::MissingParameter("model_location"))?;

        let input_format = RecordFormat::resolve(&input_path, self.input_format.as_deref())?;
        let output_format = RecordFormat::resolve(&output_path, self.output_format.as_deref())?;

        let identifier = match (self.id_column, input_format) {
            (None, _) => IdentifierSource::None,
            (Some(column), RecordFormat::Tabular) => {
                match column
                    .trim()
                    .parse()
                    .map_err(|_| FormatError::InvalidIdColumn(column.clone()))?
                {
                    // Column 0 holds the structure itself.
                    0 => IdentifierSource::None,
                    index => IdentifierSource::Column(index),
                }
            }
            (Some(field), RecordFormat::BlockStructured) => IdentifierSource::Field(field),
        };

        let reporting_interval = self.reporting_interval.unwrap_or(DEFAULT_REPORTING_INTERVAL);
        if reporting_interval == 0 {
            return Err(ConfigError::InvalidValue {
                parameter: "reporting_interval",
                reason: "must be at least 1".to_string(),
            });
        }

        let delimiter = self.delimiter.unwrap_or_default();
        Ok(PredictionConfig {
            models: self.models,
            model_location,
            input: InputConfig {
                path: input_path,
                format: input_format,
                delimiter,
                read_header: self.read_header,
                identifier,
                lookahead: self.lookahead.unwrap_or(DEFAULT_LOOKAHEAD),
            },
            output: OutputConfig {
                path: output_path,
                format: output_format,
                delimiter,
                write_header: self.write_header,
                notation_field: self.notation_field,
            },
            fragment: self.fragment,
            reporting_interval,
        })
    }
}
