use clap::Parser;
use std::path::PathBuf;

const HELP_TEMPLATE: &str = "\
{before-help}{name} {version}
{author-with-newline}{about-with-newline}
{usage-heading} {usage}

{all-args}{after-help}
";

#[derive(Parser, Debug)]
#[command(
    author = "Informatics Matters Ltd.",
    version,
    about = "propstream - Stream chemical structures through predictive models and write the enriched records.",
    help_template = HELP_TEMPLATE,
)]
pub struct Cli {
    /// Ids of the models to run, in output order. Duplicates are ignored.
    #[arg(value_name = "MODEL")]
    pub models: Vec<String>,

    /// Input file of structures (.smi, .txt, .sdf, optionally .gz).
    #[arg(short, long, required = true, value_name = "PATH")]
    pub input: PathBuf,

    /// Output file; its suffix selects the format unless --output-format is given.
    #[arg(short, long, value_name = "PATH")]
    pub output: Option<PathBuf>,

    /// Field delimiter for tabular input and output (tab, comma, space, or a single character).
    #[arg(short, long, value_name = "DELIM")]
    pub delimiter: Option<String>,

    /// Identifier column: zero-based index for tabular input, data item name for SD input.
    #[arg(long, value_name = "COLUMN")]
    pub id_column: Option<String>,

    /// Treat the first line of tabular input as field names.
    #[arg(long)]
    pub read_header: bool,

    /// Write a header line to tabular output.
    #[arg(long)]
    pub write_header: bool,

    /// Number of SD records scanned to discover the data item names.
    #[arg(long, value_name = "NUM")]
    pub sdf_read_records: Option<usize>,

    /// Log progress every NUM records.
    #[arg(long, value_name = "NUM")]
    pub reporting_interval: Option<usize>,

    /// Directory or URL holding the model artifacts. Falls back to $BASE_MODEL_URL.
    #[arg(long, value_name = "PATH_OR_URL")]
    pub model_base_path: Option<String>,

    /// Keep only the dominant fragment of each structure ('hac' or 'mw').
    #[arg(long, value_name = "MODE")]
    pub fragment: Option<String>,

    /// Add the SMILES notation to SD output under this data item name.
    #[arg(long, value_name = "NAME")]
    pub notation_field: Option<String>,

    /// Input format override ('smi' or 'sdf').
    #[arg(long, value_name = "FORMAT")]
    pub input_format: Option<String>,

    /// Output format override ('smi' or 'sdf').
    #[arg(long, value_name = "FORMAT")]
    pub output_format: Option<String>,

    /// Path to a TOML file with run defaults and model display names.
    #[arg(short, long, value_name = "PATH")]
    pub config: Option<PathBuf>,

    /// Increase verbosity level (-v for INFO, -vv for DEBUG, -vvv for TRACE)
    #[arg(short, long, action = clap::ArgAction::Count)]
    pub verbose: u8,

    /// Suppress all log output except for errors
    #[arg(short, long, conflicts_with = "verbose")]
    pub quiet: bool,

    /// Write logs to a specified file in addition to the console output
    #[arg(long, value_name = "PATH")]
    pub log_file: Option<PathBuf>,
}

#[cfg(test)]
mod tests {
    use super::*;
    use clap::CommandFactory;

    #[test]
    fn command_definition_is_consistent() {
        Cli::command().debug_assert();
    }

    #[test]
    fn parses_positional_models_and_flags() {
        let cli = Cli::try_parse_from([
            "propstream",
            "herg",
            "AMES",
            "-i",
            "in.smi",
            "-o",
            "out.sdf",
            "-d",
            "comma",
            "--id-column",
            "1",
            "--read-header",
            "-vv",
        ])
        .unwrap();
        assert_eq!(cli.models, vec!["herg", "AMES"]);
        assert_eq!(cli.input, PathBuf::from("in.smi"));
        assert_eq!(cli.output, Some(PathBuf::from("out.sdf")));
        assert_eq!(cli.delimiter.as_deref(), Some("comma"));
        assert_eq!(cli.id_column.as_deref(), Some("1"));
        assert!(cli.read_header);
        assert!(!cli.write_header);
        assert_eq!(cli.verbose, 2);
    }

    #[test]
    fn input_is_required() {
        assert!(Cli::try_parse_from(["propstream", "herg"]).is_err());
    }

    #[test]
    fn quiet_conflicts_with_verbose() {
        assert!(Cli::try_parse_from(["propstream", "-i", "in.smi", "-q", "-v"]).is_err());
    }
}
