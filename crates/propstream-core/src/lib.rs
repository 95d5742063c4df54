//! # propstream
//!
//! Streams chemical-structure records from a file, enriches each record with
//! model predictions and writes an augmented file.
//!
//! ## Architecture
//!
//! - **[`core`]: The Foundation.** The structure model, the SMILES and molfile codecs, and the
//!   streaming record readers and writers for delimited text and SD files, including format
//!   selection, gzip handling and schema discovery.
//!
//! - **[`engine`]: The Building Blocks.** Run configuration, fragment selection, the predictive
//!   model interface with its artifact format, model resolution and naming, progress events and
//!   the run error type.
//!
//! - **[`workflows`]: The Public API.** The prediction workflow that drives reader, models and
//!   writer from one configuration.

pub mod core;
pub mod engine;
pub mod workflows;
