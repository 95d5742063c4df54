//! Provides input/output functionality for chemical-structure record files.
//!
//! Two record formats are supported behind one pair of traits
//! ([`traits::RecordReader`] / [`traits::RecordWriter`]): delimiter-separated
//! text with a SMILES column ([`tabular`]) and SD files ([`sdf`]). The
//! low-level codecs for line notation ([`smiles`]) and connection tables
//! ([`molfile`]) are usable on their own. [`format`] selects the format for a
//! path and handles transparent gzip compression.

pub mod format;
pub mod molfile;
pub mod sdf;
pub mod smiles;
pub mod tabular;
pub mod traits;
