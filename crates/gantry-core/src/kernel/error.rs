//! # Gantry Core Kernel Errors
//!
//! Defines the crate-wide [`Error`] type that every subsystem error converts
//! into, and the [`ErrorKind`] taxonomy callers see.
//!
//! Subsystem errors keep their own enums ([`PluginSystemError`],
//! [`StorageSystemError`]); the kernel error only aggregates them and adds
//! configuration and lifecycle failures.
use std::fmt;
use std::path::PathBuf;
use std::result::Result as StdResult;

use serde::{Deserialize, Serialize};
use thiserror::Error as ThisError;

use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::version::ResolutionError;
use crate::storage::error::StorageSystemError;

/// Custom error type for the gantry plugin manager
#[derive(Debug, ThisError)]
pub enum Error {
    /// Specific, typed plugin system error
    #[error("Plugin system error: {0}")]
    PluginSystem(#[from] PluginSystemError),

    /// Specific, typed storage system error
    #[error("Storage system error: {0}")]
    StorageSystem(#[from] StorageSystemError),

    /// Invalid or unreadable configuration
    #[error("Configuration error: {0}")]
    Config(String),

    /// Error occurring during a specific kernel lifecycle phase.
    #[error("Kernel lifecycle error during {phase}: {message}")]
    KernelLifecycleError {
        phase: KernelLifecyclePhase,
        component_name: Option<String>,
        message: String,
        #[source]
        source: Option<Box<Error>>,
    },

    /// Generic error with message
    #[error("Error: {0}")]
    Other(String),
}

/// Represents a specific phase in the kernel's lifecycle.
#[derive(Debug, Clone, PartialEq, Eq, ThisError)]
pub enum KernelLifecyclePhase {
    #[error("Bootstrap")]
    Bootstrap,
    #[error("Initialize")]
    Initialize,
    #[error("Start")]
    Start,
    #[error("Shutdown")]
    Shutdown,
}

/// The failure taxonomy exposed to callers.
///
/// Every [`Error`] maps onto exactly one kind. `Timeout` is a flavor of
/// `Resolution`; [`ErrorKind::is_resolution`] is true for both.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ErrorKind {
    Resolution,
    Timeout,
    ValidationFailed,
    NotFound,
    StoreUnavailable,
    Configuration,
    Internal,
}

impl ErrorKind {
    pub fn is_resolution(&self) -> bool {
        matches!(self, ErrorKind::Resolution | ErrorKind::Timeout)
    }

    /// Whether a caller may reasonably retry the same request unchanged.
    pub fn is_retryable(&self) -> bool {
        matches!(
            self,
            ErrorKind::Resolution | ErrorKind::Timeout | ErrorKind::StoreUnavailable
        )
    }

    pub fn as_str(&self) -> &'static str {
        match self {
            ErrorKind::Resolution => "resolution error",
            ErrorKind::Timeout => "timeout",
            ErrorKind::ValidationFailed => "validation failed",
            ErrorKind::NotFound => "not found",
            ErrorKind::StoreUnavailable => "store unavailable",
            ErrorKind::Configuration => "configuration error",
            ErrorKind::Internal => "internal error",
        }
    }
}

impl fmt::Display for ErrorKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.as_str())
    }
}

/// Shorthand for Result with our Error type
pub type Result<T> = StdResult<T, Error>;

impl Error {
    /// Classify this error into the caller-facing taxonomy.
    pub fn kind(&self) -> ErrorKind {
        match self {
            Error::PluginSystem(e) => e.kind(),
            Error::StorageSystem(e) => e.kind(),
            Error::Config(_) => ErrorKind::Configuration,
            Error::KernelLifecycleError { source: Some(inner), .. } => inner.kind(),
            Error::KernelLifecycleError { source: None, .. } => ErrorKind::Internal,
            Error::Other(_) => ErrorKind::Internal,
        }
    }

    pub fn is_store_unavailable(&self) -> bool {
        self.kind() == ErrorKind::StoreUnavailable
    }

    /// The reason strings a caller should see for this failure.
    ///
    /// Validation failures expand to their individual blocking errors; a
    /// missing plugin is reported as the bare `not found`; everything else is
    /// the taxonomy kind plus the innermost human-readable reason.
    pub fn user_messages(&self) -> Vec<String> {
        match self {
            Error::PluginSystem(PluginSystemError::ValidationFailed { errors, .. }) => errors.clone(),
            Error::PluginSystem(PluginSystemError::NotFound { .. }) => vec!["not found".to_string()],
            Error::PluginSystem(e @ PluginSystemError::IdentityMismatch { .. }) => vec![e.reason()],
            Error::PluginSystem(e) => vec![format!("{}: {}", e.kind(), e.reason())],
            Error::StorageSystem(e) => vec![format!("{}: {}", e.kind(), e)],
            other => vec![format!("{}: {}", other.kind(), other)],
        }
    }

    // Helper to create IoError with context, wraps StorageSystemError::Io
    pub fn io(source: std::io::Error, operation: impl Into<String>, path: PathBuf) -> Self {
        Error::StorageSystem(StorageSystemError::Io {
            source,
            operation: operation.into(),
            path,
        })
    }
}

impl From<ResolutionError> for Error {
    fn from(err: ResolutionError) -> Self {
        Error::PluginSystem(PluginSystemError::Resolution(err))
    }
}

impl From<&str> for Error {
    fn from(msg: &str) -> Self {
        Error::Other(msg.to_string())
    }
}

impl From<String> for Error {
    fn from(msg: String) -> Self {
        Error::Other(msg)
    }
}
