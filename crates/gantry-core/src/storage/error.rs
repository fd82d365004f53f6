//! # Gantry Storage System Errors
//!
//! [`StorageSystemError`] covers the durable medium behind the install store
//! and the configuration files. Any failure to reach or read the install
//! store classifies as [`ErrorKind::StoreUnavailable`]; it is never folded
//! into an empty result.
use std::path::PathBuf;
use thiserror::Error;

use crate::kernel::error::ErrorKind;

#[derive(Debug, Error)]
pub enum StorageSystemError {
    #[error("Install store at '{path}' is unavailable: {reason}")]
    Unavailable { path: PathBuf, reason: String },

    #[error("I/O error during operation '{operation}' on path '{path}': {source}")]
    Io {
        path: PathBuf,
        operation: String,
        #[source]
        source: std::io::Error,
    },

    #[error("Install store document '{path}' is corrupt: {source}")]
    Corrupt {
        path: PathBuf,
        #[source]
        source: serde_json::Error,
    },

    #[error("Serialization to '{format}' failed: {source}")]
    SerializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Deserialization from '{format}' failed: {source}")]
    DeserializationError {
        format: String,
        #[source]
        source: Box<dyn std::error::Error + Send + Sync + 'static>,
    },

    #[error("Unsupported configuration format: {0}")]
    UnsupportedConfigFormat(String),

    #[error("File not found at path: {0}")]
    FileNotFound(PathBuf),
}

impl StorageSystemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            StorageSystemError::Unavailable { .. }
            | StorageSystemError::Io { .. }
            | StorageSystemError::Corrupt { .. } => ErrorKind::StoreUnavailable,
            StorageSystemError::SerializationError { .. } => ErrorKind::Internal,
            StorageSystemError::DeserializationError { .. }
            | StorageSystemError::UnsupportedConfigFormat(_)
            | StorageSystemError::FileNotFound(_) => ErrorKind::Configuration,
        }
    }

    pub fn unavailable(path: impl Into<PathBuf>, reason: impl Into<String>) -> Self {
        StorageSystemError::Unavailable {
            path: path.into(),
            reason: reason.into(),
        }
    }
}
