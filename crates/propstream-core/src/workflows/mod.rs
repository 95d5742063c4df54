//! # Workflows Module
//!
//! High-level entry points that tie [`crate::core`] and [`crate::engine`]
//! together.
//!
//! - **Prediction Workflow** ([`predict`]) - Resolves the requested models, streams an input
//!   file through them and writes the enriched records, with per-record error recovery,
//!   periodic progress and end-of-run accounting.

pub mod predict;
