//! # Core Module
//!
//! The stateless foundation of the crate: the structure model and the record
//! readers and writers for the supported file formats.
//!
//! - **Structure Representation** ([`models`]) - Atoms, bonds and annotated molecules
//! - **File I/O** ([`io`]) - Line notation and molfile codecs, streaming record readers
//!   and writers, format selection and compression

pub mod io;
pub mod models;
