use crate::cli::Cli;
use crate::config::{MODEL_BASE_ENV, PartialRunConfig, RunConfig};
use crate::error::{CliError, Result};
use crate::utils::progress::CliProgressHandler;
use propstream::engine::error::EngineError;
use propstream::engine::progress::ProgressReporter;
use propstream::engine::repository::ModelRepository;
use propstream::workflows::{self, predict::RunSummary};
use std::path::Path;
use tracing::{debug, info, warn};

pub fn run(args: &Cli) -> Result<RunSummary> {
    let partial_config = PartialRunConfig::load(args.config.as_deref())?;
    info!("Merging configuration from file and CLI arguments...");
    let RunConfig {
        prediction,
        catalog,
    } = partial_config.merge_with_cli(args, std::env::var(MODEL_BASE_ENV).ok())?;

    if prediction.models.is_empty() {
        warn!("No models requested; records are copied without predictions.");
    }

    let repository = ModelRepository::new(prediction.model_location.clone())
        .map_err(|e| CliError::Engine(EngineError::Repository(e)))?;

    let progress_handler = CliProgressHandler::new();
    let reporter = ProgressReporter::with_callback(progress_handler.get_callback());

    info!(
        "Predicting {} model(s) over {:?}",
        prediction.models.len(),
        &prediction.input.path
    );
    let summary = workflows::predict::run(&prediction, &repository, &catalog, &reporter)?;
    debug!(
        "Progress handler saw {} skipped record(s)",
        progress_handler.skipped()
    );

    println!("{}", summary_line(&summary, &prediction.output.path));
    Ok(summary)
}

fn summary_line(summary: &RunSummary, output: &Path) -> String {
    format!(
        "{} outputs among {} molecules ({} skipped, {} model(s), cost {}) written to {}",
        summary.outputs,
        summary.processed,
        summary.skipped,
        summary.models_run,
        summary.cost,
        output.display()
    )
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::Parser;
    use std::fs;
    use tempfile::tempdir;

    #[test]
    fn runs_local_models_over_a_tabular_file() {
        let dir = tempdir().unwrap();
        let models = dir.path().join("models");
        fs::create_dir(&models).unwrap();
        fs::write(
            models.join("herg.jmodel"),
            "kind = \"regressor\"\n[weights]\nheavy_atoms = 2.0\n",
        )
        .unwrap();
        let input = dir.path().join("in.smi");
        let output = dir.path().join("out.smi");
        fs::write(&input, "smiles\tname\tsource\nCCO\tethanol\tvendor\n").unwrap();
        let config = dir.path().join("run.toml");
        fs::write(&config, "[models]\nherg = \"Cardiac\"\n").unwrap();

        let cli = Cli::try_parse_from([
            "propstream",
            "herg",
            "--input",
            input.to_str().unwrap(),
            "--output",
            output.to_str().unwrap(),
            "--model-base-path",
            models.to_str().unwrap(),
            "--config",
            config.to_str().unwrap(),
            "--read-header",
            "--write-header",
            "--id-column",
            "1",
            "-q",
        ])
        .unwrap();

        let summary = run(&cli).unwrap();
        assert_eq!(summary.processed, 1);
        assert_eq!(summary.outputs, 1);
        assert_eq!(summary.models_run, 1);

        let text = fs::read_to_string(&output).unwrap();
        let mut lines = text.lines();
        assert_eq!(
            lines.next(),
            Some("smiles\tname\tsource\tCardiac_Prediction")
        );
        assert_eq!(lines.next(), Some("CCO\tethanol\tvendor\t6.0"));
    }

    #[test]
    fn summary_line_reports_the_run_cost() {
        let summary = RunSummary {
            processed: 4,
            outputs: 3,
            skipped: 1,
            models_run: 2,
            cost: 8,
        };
        assert_eq!(
            summary_line(&summary, Path::new("out.sdf")),
            "3 outputs among 4 molecules (1 skipped, 2 model(s), cost 8) written to out.sdf"
        );
    }

    #[test]
    fn missing_config_file_is_an_io_error() {
        let dir = tempdir().unwrap();
        let missing = dir.path().join("absent.toml");
        let cli = Cli::try_parse_from([
            "propstream",
            "-i",
            "in.smi",
            "--config",
            missing.to_str().unwrap(),
        ])
        .unwrap();
        assert!(matches!(run(&cli), Err(CliError::Io(_))));
    }
}
