use thiserror::Error;

use super::config::ConfigError;
use super::fragment::FragmentError;
use super::repository::ResolutionError;
use crate::core::io::format::FormatError;
use crate::core::io::traits::RecordError;
use std::path::PathBuf;

#[derive(Debug, Error)]
pub enum EngineError {
    #[error("Invalid configuration: {0}")]
    Config(#[from] ConfigError),

    #[error("Invalid format configuration: {0}")]
    Format(#[from] FormatError),

    #[error("Invalid fragment configuration: {0}")]
    Fragment(#[from] FragmentError),

    #[error("Record I/O failed: {source}")]
    Record {
        #[from]
        source: RecordError,
    },

    #[error("Model repository unavailable: {0}")]
    Repository(#[source] ResolutionError),

    #[error("Failed to set permissions on '{}': {source}", path.display())]
    Permissions {
        path: PathBuf,
        source: std::io::Error,
    },
}
