use propstream::core::io::format::{Delimiter, OutputSink, RecordFormat, open_input};
use propstream::core::io::molfile;
use propstream::core::io::smiles;
use propstream::core::io::tabular::{TabularReader, TabularReaderOptions, TabularWriter};
use propstream::core::io::traits::{PropertyValue, RecordReader, RecordWriter, WriteRequest};
use propstream::engine::catalog::ModelCatalog;
use propstream::engine::config::PredictionConfigBuilder;
use propstream::engine::fragment::{self, FragmentMode};
use propstream::engine::progress::{Progress, ProgressReporter};
use propstream::engine::repository::{ModelLocation, ModelRepository};
use propstream::workflows::predict::{self, RunSummary};
use std::fs;
use std::io::{Read, Write};
use std::path::{Path, PathBuf};
use std::sync::Mutex;
use tempfile::{TempDir, tempdir};

const REGRESSOR: &str = "kind = \"regressor\"\nintercept = 0.5\n[weights]\nheavy_atoms = 1.0\n";
const CLASSIFIER: &str = "kind = \"classifier\"\n[weights]\nheavy_atoms = 1.0\n";
const CLASSIFIER_DOA: &str =
    "kind = \"classifier\"\n[weights]\nheavy_atoms = 1.0\n[domain]\nheavy_atoms = [1.0, 10.0]\n";

fn model_dir() -> TempDir {
    let dir = tempdir().unwrap();
    fs::write(dir.path().join("solubility.jmodel"), REGRESSOR).unwrap();
    fs::write(dir.path().join("herg.jmodel"), CLASSIFIER).unwrap();
    fs::write(dir.path().join("AMES.jmodel"), CLASSIFIER_DOA).unwrap();
    dir
}

fn sd_record(notation: &str, title: &str, items: &[(&str, &str)]) -> String {
    let mol = smiles::parse(notation).unwrap();
    let mut buf = Vec::new();
    molfile::write_block(&mut buf, &mol, title, items).unwrap();
    String::from_utf8(buf).unwrap()
}

fn run(
    models: &Path,
    ids: &[&str],
    input: PathBuf,
    output: PathBuf,
    configure: impl FnOnce(PredictionConfigBuilder) -> PredictionConfigBuilder,
) -> RunSummary {
    let builder = PredictionConfigBuilder::new()
        .models(ids.iter().copied())
        .model_location(ModelLocation::Local(models.to_path_buf()))
        .input_path(input)
        .output_path(output);
    let config = configure(builder).build().unwrap();
    let repository = ModelRepository::new(config.model_location.clone()).unwrap();
    predict::run(
        &config,
        &repository,
        &ModelCatalog::default(),
        &ProgressReporter::new(),
    )
    .unwrap()
}

fn read_text(path: &Path) -> String {
    let mut text = String::new();
    open_input(path).unwrap().read_to_string(&mut text).unwrap();
    text
}

#[test]
fn schema_covers_only_the_lookahead_window() {
    let models = model_dir();
    let work = tempdir().unwrap();
    let input = work.path().join("input.sdf");
    let output = work.path().join("output.smi");
    let sdf = [
        sd_record("CCO", "a", &[("ID", "1"), ("early", "x")]),
        sd_record("CCN", "b", &[("ID", "2")]),
        sd_record("CCC", "c", &[("ID", "3"), ("late", "y")]),
    ]
    .concat();
    fs::write(&input, sdf).unwrap();

    run(models.path(), &["solubility"], input, output.clone(), |b| {
        b.lookahead(2).write_header(true).id_column("ID")
    });

    let text = read_text(&output);
    let lines: Vec<&str> = text.lines().collect();
    assert_eq!(lines[0], "smiles\tID\tearly\tAqueous_solubility_model_Prediction");
    assert!(!lines[0].contains("late"));
    assert_eq!(lines.len(), 4);
    assert!(lines.iter().all(|l| l.split('\t').count() == 4));
    assert!(lines[3].starts_with("CCC\t3\t\t"));
}

#[test]
fn extra_properties_stay_aligned_with_field_names() {
    let work = tempdir().unwrap();
    let input = work.path().join("input.sdf.gz");
    let mut sink = OutputSink::create(&input).unwrap();
    let sdf = [
        sd_record("C", "a", &[("p", "1")]),
        sd_record("N", "b", &[("q", "2")]),
        sd_record("O", "c", &[]),
    ]
    .concat();
    sink.write_all(sdf.as_bytes()).unwrap();
    propstream::core::io::format::FinishWrite::finish(&mut sink).unwrap();
    drop(sink);

    let config = PredictionConfigBuilder::new()
        .model_location(ModelLocation::parse("/models"))
        .input_path(input)
        .output_path(work.path().join("unused.sdf"))
        .build()
        .unwrap();
    assert_eq!(config.input.format, RecordFormat::BlockStructured);

    let mut reader = predict::open_reader(&config.input).unwrap();
    let width = reader.extra_field_names().len();
    assert_eq!(width, 2);
    let mut count = 0;
    while let Some(record) = reader.read().unwrap() {
        assert_eq!(record.extra_properties.len(), width);
        count += 1;
    }
    assert_eq!(count, 3);
}

#[test]
fn tabular_output_reads_back_with_the_same_delimiter() {
    let delimiter: Delimiter = "comma".parse().unwrap();
    let mut writer = TabularWriter::new(Vec::new(), delimiter);
    writer
        .write_header(&["smiles".into(), "p0".into(), "p1".into(), "c0".into()])
        .unwrap();
    writer
        .write(WriteRequest {
            notation: "c1ccccc1O",
            molecule: None,
            identifier: None,
            existing_properties: &[Some("alpha".into()), Some("beta".into())],
            computed_names: &["c0".into()],
            computed_values: &[Some(PropertyValue::Float(2.5))],
        })
        .unwrap();
    let bytes = writer.into_inner().unwrap();
    let options = TabularReaderOptions {
        delimiter,
        read_header: true,
        id_column: None,
    };
    let mut reader = TabularReader::new(bytes.as_slice(), &options).unwrap();
    assert_eq!(reader.extra_field_names().as_slice(), &["p0", "p1", "c0"]);
    let record = reader.read().unwrap().unwrap();
    assert_eq!(record.notation, "c1ccccc1O");
    assert_eq!(
        record.extra_properties,
        vec![
            Some("alpha".to_string()),
            Some("beta".to_string()),
            Some("2.5".to_string())
        ]
    );
}

#[test]
fn fragment_selection_is_deterministic_and_maximal() {
    let text = "[Cl-].CCCC[N+](CCCC)(CCCC)CCCC.O";
    let first = fragment::select(smiles::parse(text).unwrap(), FragmentMode::HeavyAtomCount);
    for _ in 0..5 {
        let again = fragment::select(smiles::parse(text).unwrap(), FragmentMode::HeavyAtomCount);
        assert_eq!(smiles::write(&again), smiles::write(&first));
    }
    assert_eq!(first.heavy_atom_count(), 17);

    let single = smiles::parse("CC(=O)Oc1ccccc1C(=O)O").unwrap();
    let written = smiles::write(&single);
    let selected = fragment::select(single, FragmentMode::MolecularWeight);
    assert_eq!(smiles::write(&selected), written);
}

#[test]
fn output_names_follow_model_kinds() {
    let models = model_dir();
    let work = tempdir().unwrap();
    let input = work.path().join("input.smi");
    let output = work.path().join("output.txt");
    fs::write(&input, "CCO\n").unwrap();

    let summary = run(
        models.path(),
        &["solubility", "herg", "AMES", "herg"],
        input,
        output.clone(),
        |b| b.write_header(true),
    );
    assert_eq!(summary.models_run, 3);

    let text = read_text(&output);
    let header: Vec<&str> = text.lines().next().unwrap().split('\t').collect();
    assert_eq!(
        header,
        vec![
            "smiles",
            "Aqueous_solubility_model_Prediction",
            "hERG_model_Prediction",
            "hERG_model_Inactive",
            "hERG_model_Active",
            "AMES_model_Prediction",
            "AMES_model_Inactive",
            "AMES_model_Active",
            "AMES_model_DOA",
        ]
    );
    let values: Vec<&str> = text.lines().nth(1).unwrap().split('\t').collect();
    assert_eq!(values.len(), header.len());
    assert_eq!(values[1], "3.5");
    assert_eq!(values[2], "1.0");
    assert_eq!(values[8], "True");
}

#[test]
fn malformed_record_is_skipped_and_the_run_completes() {
    let models = model_dir();
    let work = tempdir().unwrap();
    let input = work.path().join("input.smi");
    let output = work.path().join("output.sdf.gz");
    fs::write(&input, "C\tm1\nCC\tm2\nC1CC\tm3\nCCC\tm4\nCCCC\tm5\n").unwrap();

    let events = Mutex::new(Vec::new());
    let reporter = ProgressReporter::with_callback(Box::new(|event| {
        if let Progress::RecordSkipped { .. } | Progress::RecordsProcessed { .. } = event {
            events.lock().unwrap().push(event);
        }
    }));
    let config = PredictionConfigBuilder::new()
        .model("herg")
        .model_location(ModelLocation::Local(models.path().to_path_buf()))
        .input_path(input)
        .output_path(output.clone())
        .id_column("1")
        .reporting_interval(2)
        .notation_field("SMILES")
        .build()
        .unwrap();
    let repository = ModelRepository::new(config.model_location.clone()).unwrap();
    let summary = predict::run(&config, &repository, &ModelCatalog::default(), &reporter).unwrap();
    drop(reporter);

    assert_eq!(
        summary,
        RunSummary {
            processed: 5,
            outputs: 4,
            skipped: 1,
            models_run: 1,
            cost: 5,
        }
    );
    let events = events.into_inner().unwrap();
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Progress::RecordSkipped { .. }))
            .count(),
        1
    );
    assert_eq!(
        events
            .iter()
            .filter(|e| matches!(e, Progress::RecordsProcessed { .. }))
            .count(),
        2
    );

    let text = read_text(&output);
    assert_eq!(text.matches("$$$$").count(), 4);
    assert!(text.starts_with("m1\n"));
    assert!(!text.contains("m3"));
    assert!(text.contains("> <SMILES>\nCCCC\n"));
    assert!(text.contains("> <hERG_model_Active>"));
}

#[test]
fn unresolvable_models_are_skipped() {
    let models = model_dir();
    let work = tempdir().unwrap();
    let input = work.path().join("input.smi");
    let output = work.path().join("output.smi");
    fs::write(&input, "CCO\n").unwrap();

    let summary = run(
        models.path(),
        &["pgp", "solubility"],
        input,
        output.clone(),
        |b| b,
    );
    assert_eq!(summary.models_run, 1);
    assert_eq!(summary.cost, 1);
    assert_eq!(read_text(&output), "CCO\t3.5\n");
}

#[cfg(unix)]
#[test]
fn output_permissions_are_group_writable() {
    use std::os::unix::fs::PermissionsExt;

    let models = model_dir();
    let work = tempdir().unwrap();
    let input = work.path().join("input.smi");
    let output = work.path().join("output.sdf");
    fs::write(&input, "CCO\n").unwrap();

    run(models.path(), &["solubility"], input, output.clone(), |b| b);
    let mode = fs::metadata(&output).unwrap().permissions().mode();
    assert_eq!(mode & 0o777, 0o664);
}
