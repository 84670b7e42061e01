//! Error types for the node.

use std::path::PathBuf;

use lora_ota_update::OtaError;
use lora_ota_versioning::VersionError;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum NodeError {
    #[error("Invalid configuration: {0}")]
    InvalidConfiguration(String),

    #[error("Cannot read config {}: {source}", .path.display())]
    ConfigRead {
        path: PathBuf,
        #[source]
        source: std::io::Error,
    },

    #[error("YAML error: {0}")]
    YamlError(#[from] serde_yaml::Error),

    #[error("Version file {}: {reason}", .path.display())]
    VersionFile { path: PathBuf, reason: String },

    #[error("Invalid version: {0}")]
    InvalidVersion(#[from] VersionError),

    #[error("Radio error: {0}")]
    Radio(String),

    #[error("Update engine error: {0}")]
    Ota(#[from] OtaError),

    #[error("IO error: {0}")]
    IoError(#[from] std::io::Error),
}
