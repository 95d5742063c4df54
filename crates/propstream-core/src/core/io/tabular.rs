use super::format::{Delimiter, FinishWrite};
use super::smiles;
use super::traits::{FieldNameSet, Record, RecordError, RecordReader, RecordWriter, WriteRequest};
use csv::{ByteRecord, QuoteStyle, ReaderBuilder, Terminator, Trim, WriterBuilder};
use std::borrow::Cow;
use std::io::{self, Read};
use tracing::{debug, warn};

#[derive(Debug, Clone, Default)]
pub struct TabularReaderOptions {
    pub delimiter: Delimiter,
    /// Treat the first line as column names.
    pub read_header: bool,
    /// Zero-based column holding the record identifier.
    pub id_column: Option<usize>,
}

struct Row {
    line: usize,
    fields: Vec<String>,
}

/// Reads delimiter-separated lines whose first column is a SMILES string.
///
/// Every column other than the structure column and the identifier column
/// becomes an extra property. Without a header, names of the form
/// `field<i>` (`i` being the column index) are synthesized from the first data
/// line, and later lines are padded or truncated to that width.
pub struct TabularReader<R: Read> {
    reader: csv::Reader<R>,
    id_column: Option<usize>,
    id_name: Option<String>,
    columns: Vec<usize>,
    field_names: FieldNameSet,
    pending: Option<Row>,
    buffer: ByteRecord,
}

impl<R: Read> TabularReader<R> {
    pub fn new(source: R, options: &TabularReaderOptions) -> Result<Self, RecordError> {
        let reader = ReaderBuilder::new()
            .delimiter(options.delimiter.as_byte())
            .has_headers(false)
            .flexible(true)
            .quoting(false)
            .trim(Trim::All)
            .from_reader(source);

        // Column 0 holds the structure and never doubles as the identifier.
        let id_column = options.id_column.filter(|&column| column != 0);
        let mut this = Self {
            reader,
            id_column,
            id_name: None,
            columns: Vec::new(),
            field_names: FieldNameSet::new(),
            pending: None,
            buffer: ByteRecord::new(),
        };

        let first = this.next_row()?;
        if let Some(row) = first {
            this.id_name = id_column.map(|column| match row.fields.get(column) {
                Some(name) if options.read_header && !name.is_empty() => name.clone(),
                _ => format!("field{column}"),
            });
            let candidates = (1..row.fields.len()).filter(|&i| Some(i) != id_column);
            if options.read_header {
                for i in candidates {
                    let name = &row.fields[i];
                    if this.field_names.insert(name) {
                        this.columns.push(i);
                    } else {
                        warn!(column = i, name = %name, "Duplicate column name in header; column ignored");
                    }
                }
            } else {
                for i in candidates {
                    this.field_names.insert(&format!("field{i}"));
                    this.columns.push(i);
                }
                this.pending = Some(row);
            }
        }
        debug!(fields = ?this.field_names.as_slice(), "Tabular schema established");

        Ok(this)
    }

    fn next_row(&mut self) -> Result<Option<Row>, RecordError> {
        loop {
            if !self.reader.read_byte_record(&mut self.buffer)? {
                return Ok(None);
            }
            if self.buffer.iter().all(|field| field.is_empty()) {
                continue;
            }
            let line = self
                .buffer
                .position()
                .map_or(0, |p| usize::try_from(p.line()).unwrap_or(usize::MAX));
            let fields = self
                .buffer
                .iter()
                .map(|field| String::from_utf8_lossy(field).into_owned())
                .collect();
            return Ok(Some(Row { line, fields }));
        }
    }
}

impl<R: Read> RecordReader for TabularReader<R> {
    fn read(&mut self) -> Result<Option<Record>, RecordError> {
        let row = match self.pending.take() {
            Some(row) => row,
            None => match self.next_row()? {
                Some(row) => row,
                None => return Ok(None),
            },
        };

        let notation = row.fields.first().cloned().unwrap_or_default();
        let mut molecule = smiles::parse(&notation).map_err(|e| RecordError::Malformed {
            line: row.line,
            reason: e.to_string(),
        })?;

        let present = |i: usize| row.fields.get(i).filter(|v| !v.is_empty()).cloned();

        let identifier = self.id_column.and_then(present);
        if let Some(id) = &identifier {
            molecule.set_name(id.as_str());
        }

        let extra_properties: Vec<Option<String>> =
            self.columns.iter().map(|&i| present(i)).collect();
        for (name, value) in self.field_names.iter().zip(&extra_properties) {
            if let Some(value) = value {
                molecule.annotations_mut().set(name, value.as_str());
            }
        }

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

    fn identifier_field_name(&self) -> Option<&str> {
        self.id_name.as_deref()
    }
}

/// Writes one delimiter-joined line per record: the notation, the identifier
/// when an identifier column is configured, the existing properties, then the
/// computed values. Absent values are written as empty fields.
///
/// Fields are never quoted. Line breaks and delimiter characters inside a
/// field are replaced by spaces so that every record stays on one line.
pub struct TabularWriter<W: FinishWrite> {
    writer: Option<csv::Writer<W>>,
    finished: Option<W>,
    delimiter: Delimiter,
    identifier_column: bool,
}

fn clean_field(field: &str, delimiter: Delimiter) -> Cow<'_, str> {
    let separator = delimiter.as_char();
    if field.contains(|c: char| c == '\n' || c == '\r' || c == separator) {
        let cleaned: String = field
            .trim_end_matches(['\r', '\n'])
            .chars()
            .map(|c| if c == '\n' || c == '\r' || c == separator { ' ' } else { c })
            .collect();
        Cow::Owned(cleaned)
    } else {
        Cow::Borrowed(field)
    }
}

impl<W: FinishWrite> TabularWriter<W> {
    pub fn new(out: W, delimiter: Delimiter) -> Self {
        let writer = WriterBuilder::new()
            .delimiter(delimiter.as_byte())
            .quote_style(QuoteStyle::Never)
            .terminator(Terminator::Any(b'\n'))
            .flexible(true)
            .from_writer(out);
        Self {
            writer: Some(writer),
            finished: None,
            delimiter,
            identifier_column: false,
        }
    }

    /// Emits the record identifier (blank when absent) right after the notation.
    pub fn with_identifier_column(mut self) -> Self {
        self.identifier_column = true;
        self
    }

    /// Closes the writer if needed and returns the destination.
    pub fn into_inner(mut self) -> Result<W, RecordError> {
        self.close()?;
        self.finished
            .take()
            .ok_or_else(|| RecordError::Io(io::Error::other("tabular writer has no destination")))
    }

    fn write_line<'a>(&mut self, fields: impl IntoIterator<Item = &'a str>) -> Result<(), RecordError> {
        let delimiter = self.delimiter;
        let writer = self
            .writer
            .as_mut()
            .ok_or_else(|| RecordError::Io(io::Error::other("tabular writer is closed")))?;
        let fields: Vec<Cow<'_, str>> = fields
            .into_iter()
            .map(|field| clean_field(field, delimiter))
            .collect();
        writer.write_record(fields.iter().map(|field| field.as_bytes()))?;
        Ok(())
    }
}

impl<W: FinishWrite> RecordWriter for TabularWriter<W> {
    fn write_header(&mut self, field_names: &[String]) -> Result<(), RecordError> {
        self.write_line(field_names.iter().map(String::as_str))
    }

    fn write(&mut self, request: WriteRequest<'_>) -> Result<(), RecordError> {
        let computed: Vec<String> = request
            .computed_values
            .iter()
            .map(|v| v.map(|v| v.to_string()).unwrap_or_default())
            .collect();

        let identifier = self
            .identifier_column
            .then(|| request.identifier.unwrap_or(""));
        let fields = std::iter::once(request.notation)
            .chain(identifier)
            .chain(
                request
                    .existing_properties
                    .iter()
                    .map(|p| p.as_deref().unwrap_or("")),
            )
            .chain(computed.iter().map(String::as_str));
        self.write_line(fields)
    }

    fn close(&mut self) -> Result<(), RecordError> {
        if let Some(writer) = self.writer.take() {
            let mut out = writer.into_inner().map_err(|e| RecordError::Io(e.into_error()))?;
            out.finish()?;
            self.finished = Some(out);
        }
        Ok(())
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::core::io::traits::PropertyValue;

    fn reader(text: &str, options: TabularReaderOptions) -> TabularReader<&[u8]> {
        TabularReader::new(text.as_bytes(), &options).unwrap()
    }

    fn read_all(reader: &mut TabularReader<&[u8]>) -> Vec<Result<Record, RecordError>> {
        let mut out = Vec::new();
        loop {
            match reader.read() {
                Ok(Some(record)) => out.push(Ok(record)),
                Ok(None) => break,
                Err(e) => out.push(Err(e)),
            }
        }
        out
    }

    #[test]
    fn header_names_exclude_structure_and_id_columns() {
        let text = "smiles\tid\tmw\tnote\nCCO\tE1\t46.1\tsolvent\n";
        let mut r = reader(
            text,
            TabularReaderOptions {
                read_header: true,
                id_column: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(r.extra_field_names().as_slice(), &["mw", "note"]);

        let record = r.read().unwrap().unwrap();
        assert_eq!(record.notation, "CCO");
        assert_eq!(record.identifier.as_deref(), Some("E1"));
        assert_eq!(
            record.extra_properties,
            vec![Some("46.1".to_string()), Some("solvent".to_string())]
        );
        assert_eq!(record.molecule.name(), Some("E1"));
        assert_eq!(record.molecule.annotations().get("note"), Some("solvent"));
        assert!(r.read().unwrap().is_none());
    }

    #[test]
    fn headerless_input_synthesizes_names_and_aligns_rows() {
        let text = "C\ta\tb\n\nCC\tonly\nCCC\tx\ty\tz\n";
        let mut r = reader(text, TabularReaderOptions::default());
        assert_eq!(r.extra_field_names().as_slice(), &["field1", "field2"]);

        let records: Vec<Record> = read_all(&mut r).into_iter().map(Result::unwrap).collect();
        assert_eq!(records.len(), 3);
        assert_eq!(records[1].extra_properties, vec![Some("only".to_string()), None]);
        assert_eq!(
            records[2].extra_properties,
            vec![Some("x".to_string()), Some("y".to_string())]
        );
        assert!(records.iter().all(|r| r.extra_properties.len() == 2));
    }

    #[test]
    fn unparseable_structure_is_malformed_and_reading_continues() {
        let text = "CCO\nC1CC\nc1ccccc1\n";
        let mut r = reader(text, TabularReaderOptions::default());
        let results = read_all(&mut r);
        assert_eq!(results.len(), 3);
        assert!(results[0].is_ok());
        assert!(matches!(
            results[1],
            Err(RecordError::Malformed { line: 2, .. })
        ));
        assert!(results[2].is_ok());
    }

    #[test]
    fn comma_delimiter_and_whitespace_trimming() {
        let text = "smiles, value \n CCO , 1.5 \n";
        let mut r = reader(
            text,
            TabularReaderOptions {
                delimiter: "comma".parse().unwrap(),
                read_header: true,
                id_column: None,
            },
        );
        assert_eq!(r.extra_field_names().as_slice(), &["value"]);
        let record = r.read().unwrap().unwrap();
        assert_eq!(record.notation, "CCO");
        assert_eq!(record.extra_properties, vec![Some("1.5".to_string())]);
    }

    #[test]
    fn empty_input_has_no_fields_and_no_records() {
        let options = TabularReaderOptions {
            read_header: true,
            ..Default::default()
        };
        let mut r = reader("", options);
        assert!(r.extra_field_names().is_empty());
        assert!(r.read().unwrap().is_none());
    }

    #[test]
    fn writer_emits_notation_properties_and_values() {
        let mut w = TabularWriter::new(Vec::new(), Delimiter::TAB);
        w.write_header(&["smiles".into(), "p".into(), "score".into(), "flag".into()])
            .unwrap();
        w.write(WriteRequest {
            notation: "CCO",
            molecule: None,
            identifier: None,
            existing_properties: &[None],
            computed_names: &["score".into(), "flag".into()],
            computed_values: &[Some(PropertyValue::Float(0.5)), None],
        })
        .unwrap();
        let text = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(text, "smiles\tp\tscore\tflag\nCCO\t\t0.5\t\n");
    }

    #[test]
    fn identifier_column_follows_the_notation() {
        let text = "smiles\tname\tnote\nCCO\tethanol\tsolvent\n";
        let r = reader(
            text,
            TabularReaderOptions {
                read_header: true,
                id_column: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(r.identifier_field_name(), Some("name"));

        let headerless = reader(
            "CCO\tethanol\n",
            TabularReaderOptions {
                id_column: Some(1),
                ..Default::default()
            },
        );
        assert_eq!(headerless.identifier_field_name(), Some("field1"));

        let mut w = TabularWriter::new(Vec::new(), Delimiter::TAB).with_identifier_column();
        for identifier in [Some("ethanol"), None] {
            w.write(WriteRequest {
                notation: "CCO",
                molecule: None,
                identifier,
                existing_properties: &[Some("solvent".into())],
                computed_names: &[],
                computed_values: &[],
            })
            .unwrap();
        }
        let text = String::from_utf8(w.into_inner().unwrap()).unwrap();
        assert_eq!(text, "CCO\tethanol\tsolvent\nCCO\t\tsolvent\n");
    }

    #[test]
    fn column_zero_is_never_the_identifier() {
        let mut r = reader(
            "CCO\tx\n",
            TabularReaderOptions {
                id_column: Some(0),
                ..Default::default()
            },
        );
        assert_eq!(r.identifier_field_name(), None);
        let record = r.read().unwrap().unwrap();
        assert_eq!(record.identifier, None);
        assert_eq!(record.extra_properties, vec![Some("x".to_string())]);
    }

    #[test]
    fn multi_line_and_delimiter_characters_stay_on_one_line() {
        let mut w = TabularWriter::new(Vec::new(), Delimiter::TAB);
        w.write(WriteRequest {
            notation: "C",
            molecule: None,
            identifier: None,
            existing_properties: &[Some("line one\nline two".into()), Some("a\tb".into())],
            computed_names: &[],
            computed_values: &[],
        })
        .unwrap();
        let bytes = w.into_inner().unwrap();
        assert_eq!(
            String::from_utf8(bytes.clone()).unwrap(),
            "C\tline one line two\ta b\n"
        );

        let mut r = TabularReader::new(bytes.as_slice(), &TabularReaderOptions::default()).unwrap();
        assert_eq!(read_all(&mut r).len(), 1);
    }
}
