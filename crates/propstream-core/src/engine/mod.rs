//! # Engine Module
//!
//! The stateful pieces the prediction workflow is assembled from.
//!
//! - **Configuration** ([`config`]) - Run parameters and their builder
//! - **Fragment Selection** ([`fragment`]) - Reducing salts and mixtures to one dominant fragment
//! - **Models** ([`model`], [`artifact`]) - The predictive model interface, output field naming
//!   and the descriptor-model artifact format
//! - **Model Resolution** ([`repository`], [`catalog`]) - Fetching artifacts from a remote or
//!   local base location and naming their output fields
//! - **Progress Monitoring** ([`progress`]) - Progress events for front ends
//! - **Error Handling** ([`error`]) - The umbrella error for a run

pub mod artifact;
pub mod catalog;
pub mod config;
pub mod error;
pub mod fragment;
pub mod model;
pub mod progress;
pub mod repository;
