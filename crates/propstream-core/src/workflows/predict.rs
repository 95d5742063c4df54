use crate::core::io::format::{OutputSink, RecordFormat, open_input};
use crate::core::io::smiles;
use crate::core::io::sdf::{SdfReader, SdfReaderOptions, SdfWriter};
use crate::core::io::tabular::{TabularReader, TabularReaderOptions, TabularWriter};
use crate::core::io::traits::{PropertyValue, RecordError, RecordReader, RecordWriter, WriteRequest};
use crate::core::models::molecule::Molecule;
use crate::engine::catalog::ModelCatalog;
use crate::engine::config::{IdentifierSource, InputConfig, OutputConfig, PredictionConfig};
use crate::engine::error::EngineError;
use crate::engine::fragment::{self, FragmentMode};
use crate::engine::model::PredictiveModel;
use crate::engine::progress::{Progress, ProgressReporter};
use crate::engine::repository::{ModelResolver, ResolutionError};
use std::path::Path;
use tracing::{info, instrument, warn};

/// Notation column name that leads every tabular header.
pub const NOTATION_HEADER: &str = "smiles";

/// End-of-run accounting.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub struct RunSummary {
    /// Records read, malformed ones included.
    pub processed: usize,
    /// Records written.
    pub outputs: usize,
    /// Malformed records skipped.
    pub skipped: usize,
    pub models_run: usize,
    /// `processed * models_run`.
    pub cost: usize,
}

/// A resolved model together with the prefix of its output field names.
pub struct LoadedModel {
    pub prefix: String,
    pub model: Box<dyn PredictiveModel>,
}

impl LoadedModel {
    pub fn property_names(&self) -> Vec<String> {
        self.model.kind().property_names(&self.prefix)
    }
}

/// Resolves every requested model, first-requested order, duplicates removed.
///
/// A model that cannot be resolved is logged and left out; it never fails the run.
pub fn load_models(
    ids: &[String],
    resolver: &dyn ModelResolver,
    catalog: &ModelCatalog,
    reporter: &ProgressReporter,
) -> Vec<LoadedModel> {
    let mut seen: Vec<&str> = Vec::with_capacity(ids.len());
    let mut models = Vec::with_capacity(ids.len());
    for id in ids {
        if seen.contains(&id.as_str()) {
            continue;
        }
        seen.push(id.as_str());

        match resolver.resolve(id) {
            Ok(model) => {
                info!(model = %id, name = catalog.display_name(id), "Loaded model");
                reporter.report(Progress::ModelLoaded { id: id.clone() });
                models.push(LoadedModel {
                    prefix: catalog.field_prefix(id),
                    model,
                });
            }
            Err(e) => {
                match &e {
                    ResolutionError::NotAvailable { .. } => warn!("Model {id} not available!"),
                    ResolutionError::NotFound { .. } => warn!("Model {id} not found!"),
                    _ => {}
                }
                warn!(model = %id, error = %e, "Skipping model");
                reporter.report(Progress::ModelSkipped {
                    id: id.clone(),
                    reason: e.to_string(),
                });
            }
        }
    }
    models
}

/// The streaming read, predict, write loop.
pub struct Pipeline {
    models: Vec<LoadedModel>,
    fragment: Option<FragmentMode>,
    write_header: bool,
    reporting_interval: usize,
}

impl Pipeline {
    pub fn new(models: Vec<LoadedModel>) -> Self {
        Self {
            models,
            fragment: None,
            write_header: false,
            reporting_interval: crate::engine::config::DEFAULT_REPORTING_INTERVAL,
        }
    }

    pub fn with_fragment(mut self, mode: Option<FragmentMode>) -> Self {
        self.fragment = mode;
        self
    }

    pub fn with_header(mut self, write_header: bool) -> Self {
        self.write_header = write_header;
        self
    }

    pub fn with_reporting_interval(mut self, records: usize) -> Self {
        self.reporting_interval = records.max(1);
        self
    }

    /// Output field names of all models, in model order.
    pub fn computed_names(&self) -> Vec<String> {
        self.models.iter().flat_map(LoadedModel::property_names).collect()
    }

    fn predict(&self, molecule: &Molecule) -> Vec<Option<PropertyValue>> {
        let mut values = Vec::new();
        for loaded in &self.models {
            let kind = loaded.model.kind();
            match loaded.model.predict(molecule) {
                Ok(output) => values.extend(output.values(kind)),
                Err(e) => {
                    warn!(model = loaded.model.id(), error = %e, "Prediction failed; writing empty values");
                    values.extend(std::iter::repeat_n(None, kind.property_suffixes().len()));
                }
            }
        }
        values
    }

    /// Drains `reader` into `writer` and closes both.
    ///
    /// Malformed records are logged and skipped; any other read or write
    /// failure aborts the run.
    pub fn run(
        &self,
        reader: &mut dyn RecordReader,
        writer: &mut dyn RecordWriter,
        reporter: &ProgressReporter,
    ) -> Result<RunSummary, EngineError> {
        let field_names = reader.extra_field_names().clone();
        let identifier_name = reader.identifier_field_name().map(str::to_string);
        let computed_names = self.computed_names();
        let mut header_pending = self.write_header;
        let mut summary = RunSummary {
            models_run: self.models.len(),
            ..RunSummary::default()
        };

        loop {
            let result = reader.read();
            if matches!(result, Ok(None)) {
                break;
            }
            summary.processed += 1;
            if summary.processed % self.reporting_interval == 0 {
                info!("{} molecules processed", summary.processed);
                reporter.report(Progress::RecordsProcessed {
                    count: summary.processed as u64,
                });
            }

            let record = match result {
                Ok(Some(record)) => record,
                Ok(None) => break,
                Err(e) if e.is_recoverable() => {
                    warn!(error = %e, "Skipping record");
                    reporter.report(Progress::RecordSkipped {
                        reason: e.to_string(),
                    });
                    summary.skipped += 1;
                    continue;
                }
                Err(e) => return Err(e.into()),
            };

            let (molecule, notation) = match self.fragment {
                Some(mode) => {
                    let selected = fragment::select(record.molecule, mode);
                    let notation = smiles::write(&selected);
                    (selected, notation)
                }
                None => (record.molecule, record.notation),
            };
            let values = self.predict(&molecule);

            if header_pending {
                let header: Vec<String> = std::iter::once(NOTATION_HEADER.to_string())
                    .chain(identifier_name.iter().cloned())
                    .chain(field_names.iter().map(str::to_string))
                    .chain(computed_names.iter().cloned())
                    .collect();
                writer.write_header(&header)?;
                header_pending = false;
            }

            writer.write(WriteRequest {
                notation: &notation,
                molecule: Some(molecule),
                identifier: record.identifier.as_deref(),
                existing_properties: &record.extra_properties,
                computed_names: &computed_names,
                computed_values: &values,
            })?;
            summary.outputs += 1;
        }

        reader.close()?;
        writer.close()?;
        summary.cost = summary.processed * summary.models_run;
        Ok(summary)
    }
}

/// Opens the reader the input configuration asks for.
pub fn open_reader(config: &InputConfig) -> Result<Box<dyn RecordReader>, RecordError> {
    match config.format {
        RecordFormat::Tabular => {
            let options = TabularReaderOptions {
                delimiter: config.delimiter,
                read_header: config.read_header,
                id_column: match config.identifier {
                    IdentifierSource::Column(column) => Some(column),
                    _ => None,
                },
            };
            let source = open_input(&config.path)?;
            Ok(Box::new(TabularReader::new(source, &options)?))
        }
        RecordFormat::BlockStructured => {
            let options = SdfReaderOptions {
                id_field: match &config.identifier {
                    IdentifierSource::Field(field) => Some(field.clone()),
                    _ => None,
                },
                lookahead: config.lookahead,
            };
            Ok(Box::new(SdfReader::open(&config.path, &options)?))
        }
    }
}

/// Creates the writer the output configuration asks for.
///
/// `identifier_column` adds a tabular column for the record identifier; SD
/// output always carries the identifier as the record title.
pub fn create_writer(
    config: &OutputConfig,
    identifier_column: bool,
) -> Result<Box<dyn RecordWriter>, RecordError> {
    let sink = OutputSink::create(&config.path)?;
    match config.format {
        RecordFormat::Tabular => {
            let writer = TabularWriter::new(sink, config.delimiter);
            Ok(Box::new(if identifier_column {
                writer.with_identifier_column()
            } else {
                writer
            }))
        }
        RecordFormat::BlockStructured => {
            let writer = SdfWriter::new(sink);
            Ok(Box::new(match &config.notation_field {
                Some(field) => writer.with_notation_field(field.as_str()),
                None => writer,
            }))
        }
    }
}

#[cfg(unix)]
fn set_output_permissions(path: &Path) -> Result<(), EngineError> {
    use std::os::unix::fs::PermissionsExt;
    std::fs::set_permissions(path, std::fs::Permissions::from_mode(0o664)).map_err(|source| {
        EngineError::Permissions {
            path: path.to_path_buf(),
            source,
        }
    })
}

#[cfg(not(unix))]
fn set_output_permissions(_path: &Path) -> Result<(), EngineError> {
    Ok(())
}

/// Runs a complete prediction: resolves models, streams the input through
/// them into the output, then fixes the output's permissions and reports the
/// run's accounting.
#[instrument(skip_all, name = "predict_workflow")]
pub fn run(
    config: &PredictionConfig,
    resolver: &dyn ModelResolver,
    catalog: &ModelCatalog,
    reporter: &ProgressReporter,
) -> Result<RunSummary, EngineError> {
    reporter.report(Progress::PhaseStart {
        name: "Loading models",
    });
    info!(location = %config.model_location, requested = config.models.len(), "Resolving models");
    let models = load_models(&config.models, resolver, catalog, reporter);
    reporter.report(Progress::PhaseFinish);

    let mut reader = open_reader(&config.input)?;
    let mut writer = create_writer(&config.output, reader.identifier_field_name().is_some())?;
    info!(
        input = %config.input.path.display(),
        input_format = %config.input.format,
        output = %config.output.path.display(),
        output_format = %config.output.format,
        fields = reader.extra_field_names().len(),
        "Streaming records"
    );

    reporter.report(Progress::PhaseStart { name: "Predicting" });
    let pipeline = Pipeline::new(models)
        .with_fragment(config.fragment)
        .with_header(config.output.write_header)
        .with_reporting_interval(config.reporting_interval);
    let summary = pipeline.run(reader.as_mut(), writer.as_mut(), reporter)?;
    drop(reader);
    drop(writer);
    reporter.report(Progress::PhaseFinish);

    set_output_permissions(&config.output.path)?;

    info!(
        outputs = summary.outputs,
        processed = summary.processed,
        skipped = summary.skipped,
        "{} outputs among {} molecules",
        summary.outputs,
        summary.processed
    );
    info!(target: "propstream::cost", cost = summary.cost, models = summary.models_run, "Run cost");
    Ok(summary)
}
