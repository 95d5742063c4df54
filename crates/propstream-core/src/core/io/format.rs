use flate2::Compression;
use flate2::read::MultiGzDecoder;
use flate2::write::GzEncoder;
use std::fmt;
use std::fs::File;
use std::io::{self, BufRead, BufReader, BufWriter, Write};
use std::path::Path;
use std::str::FromStr;
use thiserror::Error;

const BLOCK_SUFFIXES: [&str; 4] = [".sdf", ".sd", ".sdf.gz", ".sd.gz"];

#[derive(Debug, Error, PartialEq, Eq, Clone)]
pub enum FormatError {
    #[error("Unknown record format '{0}' (expected 'smi' or 'sdf')")]
    UnknownFormat(String),
    #[error(
        "Invalid delimiter '{0}': expected a single ASCII character or one of tab, comma, space, semicolon, pipe"
    )]
    InvalidDelimiter(String),
    #[error("Invalid identifier column '{0}': tabular inputs need a zero-based column index")]
    InvalidIdColumn(String),
}

/// The two structural record formats.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum RecordFormat {
    /// Delimiter-separated lines with a SMILES string in the first column.
    Tabular,
    /// SD files: `$$$$`-terminated connection tables with `> <name>` data items.
    BlockStructured,
}

impl RecordFormat {
    /// Chooses the format from the file name alone; contents are never inspected.
    pub fn from_path(path: &Path) -> Self {
        let name = path
            .file_name()
            .map(|n| n.to_string_lossy().to_ascii_lowercase())
            .unwrap_or_default();
        if BLOCK_SUFFIXES.iter().any(|suffix| name.ends_with(suffix)) {
            RecordFormat::BlockStructured
        } else {
            RecordFormat::Tabular
        }
    }

    /// An explicit format name wins over the path suffix.
    pub fn resolve(path: &Path, explicit: Option<&str>) -> Result<Self, FormatError> {
        match explicit {
            Some(name) => name.parse(),
            None => Ok(Self::from_path(path)),
        }
    }
}

impl FromStr for RecordFormat {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        match s.trim().to_ascii_lowercase().as_str() {
            "smi" | "smiles" | "tabular" | "txt" => Ok(RecordFormat::Tabular),
            "sdf" | "sd" | "block" => Ok(RecordFormat::BlockStructured),
            _ => Err(FormatError::UnknownFormat(s.to_string())),
        }
    }
}

impl fmt::Display for RecordFormat {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            RecordFormat::Tabular => f.write_str("smi"),
            RecordFormat::BlockStructured => f.write_str("sdf"),
        }
    }
}

/// Single-byte field separator for tabular files.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct Delimiter(u8);

impl Delimiter {
    pub const TAB: Delimiter = Delimiter(b'\t');

    pub fn as_byte(self) -> u8 {
        self.0
    }

    pub fn as_char(self) -> char {
        char::from(self.0)
    }
}

impl Default for Delimiter {
    fn default() -> Self {
        Self::TAB
    }
}

impl FromStr for Delimiter {
    type Err = FormatError;

    fn from_str(s: &str) -> Result<Self, Self::Err> {
        let byte = match s.to_ascii_lowercase().as_str() {
            "tab" | "\\t" => b'\t',
            "comma" => b',',
            "space" => b' ',
            "semicolon" => b';',
            "pipe" => b'|',
            _ => match s.as_bytes() {
                [b] if b.is_ascii() && *b != b'\n' && *b != b'\r' => *b,
                _ => return Err(FormatError::InvalidDelimiter(s.to_string())),
            },
        };
        Ok(Delimiter(byte))
    }
}

pub fn is_gzip(path: &Path) -> bool {
    path.extension().is_some_and(|ext| ext.eq_ignore_ascii_case("gz"))
}

/// Opens `path` for buffered reading, decompressing `.gz` files on the fly.
pub fn open_input(path: &Path) -> io::Result<Box<dyn BufRead>> {
    let file = File::open(path)?;
    if is_gzip(path) {
        Ok(Box::new(BufReader::new(MultiGzDecoder::new(file))))
    } else {
        Ok(Box::new(BufReader::new(file)))
    }
}

/// A byte sink whose end of stream must be marked explicitly.
pub trait FinishWrite: Write {
    fn finish(&mut self) -> io::Result<()>;
}

impl FinishWrite for Vec<u8> {
    fn finish(&mut self) -> io::Result<()> {
        Ok(())
    }
}

/// A created output file, gzip-compressed when its name ends in `.gz`.
pub enum OutputSink {
    Plain(BufWriter<File>),
    Gzip(GzEncoder<BufWriter<File>>),
}

impl OutputSink {
    pub fn create(path: &Path) -> io::Result<Self> {
        let file = BufWriter::new(File::create(path)?);
        if is_gzip(path) {
            Ok(OutputSink::Gzip(GzEncoder::new(file, Compression::default())))
        } else {
            Ok(OutputSink::Plain(file))
        }
    }
}

impl Write for OutputSink {
    fn write(&mut self, buf: &[u8]) -> io::Result<usize> {
        match self {
            OutputSink::Plain(w) => w.write(buf),
            OutputSink::Gzip(w) => w.write(buf),
        }
    }

    fn flush(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Plain(w) => w.flush(),
            OutputSink::Gzip(w) => w.flush(),
        }
    }
}

impl FinishWrite for OutputSink {
    fn finish(&mut self) -> io::Result<()> {
        match self {
            OutputSink::Plain(w) => w.flush(),
            OutputSink::Gzip(w) => {
                w.try_finish()?;
                w.get_mut().flush()
            }
        }
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use std::io::Read;
    use tempfile::tempdir;

    #[test]
    fn format_is_chosen_by_suffix() {
        for name in ["in.sdf", "in.sd", "in.sdf.gz", "in.sd.gz", "IN.SDF"] {
            assert_eq!(
                RecordFormat::from_path(Path::new(name)),
                RecordFormat::BlockStructured,
                "{name}"
            );
        }
        for name in ["in.smi", "in.txt", "in.smi.gz", "in.sdfx", "result"] {
            assert_eq!(
                RecordFormat::from_path(Path::new(name)),
                RecordFormat::Tabular,
                "{name}"
            );
        }
    }

    #[test]
    fn explicit_format_overrides_suffix() {
        let path = Path::new("molecules.txt");
        assert_eq!(
            RecordFormat::resolve(path, Some("sdf")),
            Ok(RecordFormat::BlockStructured)
        );
        assert_eq!(
            RecordFormat::resolve(path, Some("mol2")),
            Err(FormatError::UnknownFormat("mol2".into()))
        );
    }

    #[test]
    fn delimiter_accepts_aliases_and_single_characters() {
        assert_eq!("tab".parse::<Delimiter>().unwrap().as_byte(), b'\t');
        assert_eq!("comma".parse::<Delimiter>().unwrap().as_byte(), b',');
        assert_eq!("SPACE".parse::<Delimiter>().unwrap().as_byte(), b' ');
        assert_eq!("pipe".parse::<Delimiter>().unwrap().as_char(), '|');
        assert_eq!(":".parse::<Delimiter>().unwrap().as_char(), ':');
        assert!(matches!(
            "::".parse::<Delimiter>(),
            Err(FormatError::InvalidDelimiter(_))
        ));
        assert!("é".parse::<Delimiter>().is_err());
        assert!("".parse::<Delimiter>().is_err());
    }

    #[test]
    fn gzip_output_reads_back_through_open_input() {
        let dir = tempdir().unwrap();
        let path = dir.path().join("out.smi.gz");

        let mut sink = OutputSink::create(&path).unwrap();
        sink.write_all(b"CCO\tethanol\n").unwrap();
        sink.finish().unwrap();
        drop(sink);

        let mut raw = Vec::new();
        File::open(&path).unwrap().read_to_end(&mut raw).unwrap();
        assert_eq!(&raw[..2], &[0x1f, 0x8b]);

        let mut text = String::new();
        open_input(&path).unwrap().read_to_string(&mut text).unwrap();
        assert_eq!(text, "CCO\tethanol\n");
    }
}
