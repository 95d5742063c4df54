use super::format::{self, FinishWrite};
use super::molfile::{self, MolfileError};
use super::smiles;
use super::traits::{FieldNameSet, Record, RecordError, RecordReader, RecordWriter, WriteRequest};
use crate::core::models::molecule::NAME_ANNOTATION;
use std::io::BufRead;
use std::path::Path;
use tracing::{debug, info};

/// Number of records scanned for annotation names when none is configured.
pub const DEFAULT_LOOKAHEAD: usize = 100;

#[derive(Debug, Clone)]
pub struct SdfReaderOptions {
    /// Annotation holding the record identifier.
    pub id_field: Option<String>,
    /// Records scanned to build the schema before the real pass.
    pub lookahead: usize,
}

impl Default for SdfReaderOptions {
    fn default() -> Self {
        Self {
            id_field: None,
            lookahead: DEFAULT_LOOKAHEAD,
        }
    }
}

fn malformed(err: MolfileError) -> RecordError {
    match err {
        MolfileError::Parse { line, kind } => RecordError::Malformed {
            line,
            reason: kind.to_string(),
        },
    }
}

/// Collects the union of annotation names over at most `limit` records, in
/// first-seen order.
///
/// Records that fail to parse count toward the limit but contribute no names.
/// Nothing but the names is retained.
pub fn discover_field_names<R: BufRead>(source: &mut R, limit: usize) -> Result<FieldNameSet, RecordError> {
    let mut names = FieldNameSet::new();
    let mut line_no = 0;
    let mut scanned = 0;
    while scanned < limit {
        let Some(block) = molfile::read_block(source, &mut line_no)? else {
            break;
        };
        scanned += 1;
        if let Ok(mol) = molfile::parse_block(&block) {
            for name in mol.annotations().names().filter(|n| *n != NAME_ANNOTATION) {
                names.insert(name);
            }
        }
    }
    debug!(scanned, fields = ?names.as_slice(), "SD schema discovered");
    Ok(names)
}

/// Streams records from an SD file.
pub struct SdfReader<R: BufRead> {
    source: R,
    line_no: usize,
    field_names: FieldNameSet,
    id_field: Option<String>,
}

impl SdfReader<Box<dyn BufRead>> {
    /// Opens `path` twice: once for a bounded schema-discovery pass, then for
    /// the real read.
    pub fn open(path: &Path, options: &SdfReaderOptions) -> Result<Self, RecordError> {
        let field_names = {
            let mut lookahead = format::open_input(path)?;
            discover_field_names(&mut lookahead, options.lookahead)?
        };
        let source = format::open_input(path)?;
        Ok(Self::new(source, field_names, options.id_field.clone()))
    }
}

impl<R: BufRead> SdfReader<R> {
    pub fn new(source: R, field_names: FieldNameSet, id_field: Option<String>) -> Self {
        Self {
            source,
            line_no: 0,
            field_names,
            id_field,
        }
    }
}

impl<R: BufRead> RecordReader for SdfReader<R> {
    fn read(&mut self) -> Result<Option<Record>, RecordError> {
        let Some(block) = molfile::read_block(&mut self.source, &mut self.line_no)? else {
            return Ok(None);
        };
        let molecule = molfile::parse_block(&block).map_err(malformed)?;

        let annotations = molecule.annotations();
        let identifier = self
            .id_field
            .as_deref()
            .and_then(|field| annotations.get(field))
            .map(str::to_string);
        let extra_properties = self
            .field_names
            .iter()
            .map(|name| annotations.get(name).map(str::to_string))
            .collect();
        let notation = smiles::write(&molecule);

        Ok(Some(Record {
            molecule,
            notation,
            identifier,
            extra_properties,
        }))
    }

    fn extra_field_names(&self) -> &FieldNameSet {
        &self.field_names
    }
}

/// Appends SD records.
///
/// Existing properties travel as annotations on the structure; the writer
/// adds the identifier as the title, the optional notation field and every
/// computed value that is present.
pub struct SdfWriter<W: FinishWrite> {
    out: W,
    notation_field: Option<String>,
}

impl<W: FinishWrite> SdfWriter<W> {
    pub fn new(out: W) -> Self {
        Self {
            out,
            notation_field: None,
        }
    }

    /// Also stores the record notation under the annotation `name`.
    pub fn with_notation_field(mut self, name: impl Into<String>) -> Self {
        self.notation_field = Some(name.into());
        self
    }

    pub fn get_ref(&self) -> &W {
        &self.out
    }
}

impl<W: FinishWrite> RecordWriter for SdfWriter<W> {
    /// SD files carry their field names on every record, so there is nothing to write.
    fn write_header(&mut self, _field_names: &[String]) -> Result<(), RecordError> {
        info!("Asked to write a header for an SD file; no action will be taken");
        Ok(())
    }

    fn write(&mut self, request: WriteRequest<'_>) -> Result<(), RecordError> {
        let mut molecule = match request.molecule {
            Some(molecule) => molecule,
            None => smiles::parse(request.notation).map_err(|source| RecordError::Notation {
                notation: request.notation.to_string(),
                source,
            })?,
        };

        if let Some(id) = request.identifier {
            molecule.set_name(id);
        }
        if let Some(field) = &self.notation_field {
            molecule.annotations_mut().set(field.as_str(), request.notation);
        }
        for (name, value) in request.computed_names.iter().zip(request.computed_values) {
            if let Some(value) = value {
                molecule.annotations_mut().set(name.as_str(), value.to_string());
            }
        }

        let title = molecule.name().unwrap_or_default();
        let data: Vec<(&str, &str)> = molecule
            .annotations()
            .iter()
            .filter(|(name, _)| *name != NAME_ANNOTATION)
            .collect();
        molfile::write_block(&mut self.out, &molecule, title, &data)?;
        Ok(())
    }

    fn close(&mut self) -> Result<(), RecordError> {
        self.out.finish()?;
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::format::OutputSink;
    use crate::core::io::traits::PropertyValue;
    use std::io::Cursor;
    use tempfile::tempdir;

    fn sd_record(smiles_text: &str, title: &str, items: &[(&str, &str)]) -> String {
        let mut mol = smiles::parse(smiles_text).unwrap();
        mol.set_name(title);
        let mut buf = Vec::new();
        molfile::write_block(&mut buf, &mol, title, items).unwrap();
        String::from_utf8(buf).unwrap()
    }

    fn sample_file() -> String {
        [
            sd_record("CCO", "one", &[("ID", "A1"), ("mw", "46")]),
            sd_record("c1ccccc1", "two", &[("ID", "A2"), ("logp", "2.1")]),
            sd_record("CC(=O)O", "three", &[("ID", "A3"), ("late", "x")]),
        ]
        .concat()
    }

    #[test]
    fn discovery_only_covers_the_lookahead_window() {
        let text = sample_file();
        let names = discover_field_names(&mut Cursor::new(text.as_bytes()), 2).unwrap();
        assert_eq!(names.as_slice(), &["ID", "mw", "logp"]);

        let all = discover_field_names(&mut Cursor::new(text.as_bytes()), 100).unwrap();
        assert_eq!(all.as_slice(), &["ID", "mw", "logp", "late"]);
    }

    #[test]
    fn records_are_aligned_to_discovered_names() {
        let text = sample_file();
        let names = discover_field_names(&mut Cursor::new(text.as_bytes()), 2).unwrap();
        let mut reader = SdfReader::new(Cursor::new(text.as_bytes()), names, Some("ID".into()));

        let first = reader.read().unwrap().unwrap();
        assert_eq!(first.identifier.as_deref(), Some("A1"));
        assert_eq!(
            first.extra_properties,
            vec![Some("A1".to_string()), Some("46".to_string()), None]
        );
        assert_eq!(first.molecule.name(), Some("one"));

        let second = reader.read().unwrap().unwrap();
        assert_eq!(second.extra_properties[2].as_deref(), Some("2.1"));
        assert_eq!(second.molecule.heavy_atom_count(), 6);

        let third = reader.read().unwrap().unwrap();
        assert_eq!(third.extra_properties.len(), 3);
        assert_eq!(third.molecule.annotations().get("late"), Some("x"));
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn malformed_block_is_skippable() {
        let broken = "bad\n\n\nnot a counts line\n$$$$\n";
        let text = format!("{}{}{}", sd_record("C", "a", &[]), broken, sd_record("N", "b", &[]));
        let mut reader = SdfReader::new(Cursor::new(text.as_bytes()), FieldNameSet::new(), None);

        assert!(reader.read().unwrap().is_some());
        assert!(matches!(reader.read(), Err(RecordError::Malformed { .. })));
        let last = reader.read().unwrap().unwrap();
        assert_eq!(last.molecule.name(), Some("b"));
        assert!(last.identifier.is_none());
        assert!(reader.read().unwrap().is_none());
    }

    #[test]
    fn open_reads_gzip_input_with_two_passes() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("input.sdf.gz");
        let mut sink = OutputSink::create(&path).unwrap();
        std::io::Write::write_all(&mut sink, sample_file().as_bytes()).unwrap();
        sink.finish().unwrap();
        drop(sink);

        let options = SdfReaderOptions {
            id_field: Some("ID".into()),
            lookahead: 1,
        };
        let mut reader = SdfReader::open(&path, &options).unwrap();
        assert_eq!(reader.extra_field_names().as_slice(), &["ID", "mw"]);
        let mut count = 0;
        while let Some(record) = reader.read().unwrap() {
            assert_eq!(record.extra_properties.len(), 2);
            count += 1;
        }
        assert_eq!(count, 3);
    }

    #[test]
    fn write_header_is_a_no_op() {
        let mut writer = SdfWriter::new(Vec::new());
        writer.write_header(&["smiles".into(), "a".into()]).unwrap();
        assert!(writer.get_ref().is_empty());
    }

    #[test]
    fn writer_sets_identifier_notation_and_computed_values() {
        let mut writer = SdfWriter::new(Vec::new()).with_notation_field("SMILES");
        writer
            .write(WriteRequest {
                notation: "CCO",
                molecule: None,
                identifier: Some("E1"),
                existing_properties: &[],
                computed_names: &["Model_Prediction".into(), "Model_DOA".into()],
                computed_values: &[Some(PropertyValue::Float(1.25)), None],
            })
            .unwrap();
        writer.close().unwrap();

        let text = String::from_utf8(writer.get_ref().clone()).unwrap();
        let mut line_no = 0;
        let block = molfile::read_block(&mut Cursor::new(text.as_bytes()), &mut line_no)
            .unwrap()
            .unwrap();
        let mol = molfile::parse_block(&block).unwrap();
        assert_eq!(mol.name(), Some("E1"));
        assert_eq!(mol.annotations().get("SMILES"), Some("CCO"));
        assert_eq!(mol.annotations().get("Model_Prediction"), Some("1.25"));
        assert!(!mol.annotations().contains("Model_DOA"));
    }

    #[test]
    fn unparseable_notation_without_structure_is_an_error() {
        let mut writer = SdfWriter::new(Vec::new());
        let result = writer.write(WriteRequest {
            notation: "C1CC",
            molecule: None,
            identifier: None,
            existing_properties: &[],
            computed_names: &[],
            computed_values: &[],
        });
        assert!(matches!(result, Err(RecordError::Notation { .. })));
    }
}
