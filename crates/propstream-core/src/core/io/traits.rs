use super::smiles::SmilesError;
use crate::core::models::molecule::Molecule;
use std::fmt;
use std::io;
use thiserror::Error;

#[derive(Debug, Error)]
pub enum RecordError {
    #[error("Malformed record at line {line}: {reason}")]
    Malformed { line: usize, reason: String },
    #[error("Cannot build a structure from notation '{notation}': {source}")]
    Notation {
        notation: String,
        #[source]
        source: SmilesError,
    },
    #[error("Delimited text error: {0}")]
    Delimited(#[from] csv::Error),
    #[error("I/O error: {0}")]
    Io(#[from] io::Error),
}

impl RecordError {
    /// Whether the pipeline can skip past this error and continue with the next record.
    pub fn is_recoverable(&self) -> bool {
        matches!(self, RecordError::Malformed { .. })
    }
}

/// Insertion-ordered, duplicate-free list of annotation names.
#[derive(Debug, Clone, Default, PartialEq, Eq)]
pub struct FieldNameSet {
    names: Vec<String>,
}

impl FieldNameSet {
    pub fn new() -> Self {
        Self::default()
    }

    /// Appends `name` unless it is already present. Returns whether it was added.
    pub fn insert(&mut self, name: &str) -> bool {
        if self.contains(name) {
            return false;
        }
        self.names.push(name.to_string());
        true
    }

    pub fn contains(&self, name: &str) -> bool {
        self.names.iter().any(|n| n == name)
    }

    pub fn len(&self) -> usize {
        self.names.len()
    }

    pub fn is_empty(&self) -> bool {
        self.names.is_empty()
    }

    pub fn iter(&self) -> impl Iterator<Item = &str> {
        self.names.iter().map(String::as_str)
    }

    pub fn as_slice(&self) -> &[String] {
        &self.names
    }
}

impl<S: AsRef<str>> FromIterator<S> for FieldNameSet {
    fn from_iter<I: IntoIterator<Item = S>>(iter: I) -> Self {
        let mut set = FieldNameSet::new();
        for name in iter {
            set.insert(name.as_ref());
        }
        set
    }
}

/// A computed value attached to an output record.
#[derive(Debug, Clone, Copy, PartialEq)]
pub enum PropertyValue {
    Float(f64),
    Bool(bool),
}

impl fmt::Display for PropertyValue {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PropertyValue::Float(v) if v.is_finite() && v.fract() == 0.0 => write!(f, "{v:.1}"),
            PropertyValue::Float(v) => write!(f, "{v}"),
            PropertyValue::Bool(true) => f.write_str("True"),
            PropertyValue::Bool(false) => f.write_str("False"),
        }
    }
}

/// One unit produced by a [`RecordReader`].
#[derive(Debug, Clone)]
pub struct Record {
    pub molecule: Molecule,
    /// Line notation of the structure: the input column for tabular sources,
    /// generated from the structure for SD sources.
    pub notation: String,
    pub identifier: Option<String>,
    /// Positionally aligned to the reader's [`FieldNameSet`].
    pub extra_properties: Vec<Option<String>>,
}

/// Everything a [`RecordWriter`] needs to append one record.
#[derive(Debug)]
pub struct WriteRequest<'a> {
    pub notation: &'a str,
    /// Structure to serialize; writers that need one parse `notation` when absent.
    pub molecule: Option<Molecule>,
    pub identifier: Option<&'a str>,
    pub existing_properties: &'a [Option<String>],
    pub computed_names: &'a [String],
    pub computed_values: &'a [Option<PropertyValue>],
}

/// A lazy, finite, non-restartable source of records.
pub trait RecordReader {
    /// Returns the next record, or `Ok(None)` once the input is exhausted.
    ///
    /// # Errors
    ///
    /// Returns [`RecordError::Malformed`] for a unit that does not yield a valid
    /// structure; the reader stays usable and the next call moves past it.
    /// Any other error is not recoverable.
    fn read(&mut self) -> Result<Option<Record>, RecordError>;

    /// The names the `extra_properties` of every record are aligned to.
    fn extra_field_names(&self) -> &FieldNameSet;

    /// Name of the input field records take their identifier from, when that
    /// field is not already one of the extra fields.
    fn identifier_field_name(&self) -> Option<&str> {
        None
    }

    fn close(&mut self) -> Result<(), RecordError> {
        Ok(())
    }
}

/// An append-only destination for records.
pub trait RecordWriter {
    fn write_header(&mut self, field_names: &[String]) -> Result<(), RecordError>;

    fn write(&mut self, request: WriteRequest<'_>) -> Result<(), RecordError>;

    /// Flushes buffered output and terminates any compression stream.
    fn close(&mut self) -> Result<(), RecordError>;
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn field_name_set_keeps_first_seen_order_without_duplicates() {
        let set: FieldNameSet = ["b", "a", "b", "c", "a"].into_iter().collect();
        assert_eq!(set.as_slice(), &["b", "a", "c"]);
        assert!(set.contains("c"));
        assert!(!set.contains("d"));
    }

    #[test]
    fn property_values_render_as_text() {
        assert_eq!(PropertyValue::Float(1.0).to_string(), "1.0");
        assert_eq!(PropertyValue::Float(-0.25).to_string(), "-0.25");
        assert_eq!(PropertyValue::Bool(true).to_string(), "True");
        assert_eq!(PropertyValue::Bool(false).to_string(), "False");
    }

    #[test]
    fn only_malformed_records_are_recoverable() {
        let malformed = RecordError::Malformed {
            line: 3,
            reason: "bad".into(),
        };
        let io = RecordError::Io(io::Error::other("disk"));
        assert!(malformed.is_recoverable());
        assert!(!io.is_recoverable());
    }
}
