//! # Gantry Plugin System Errors
//!
//! [`PluginSystemError`] covers the lifecycle failures a caller can act on:
//! a ref that could not be resolved, a candidate that failed validation, an
//! operation against an unknown distribution name, an update whose
//! repository has been renamed underneath it.
// crates/gantry-core/src/plugin_system/error.rs
use crate::kernel::error::ErrorKind;
use crate::plugin_system::version::ResolutionError;

#[derive(Debug, thiserror::Error)]
pub enum PluginSystemError {
    #[error("Resolution failed: {0}")]
    Resolution(#[from] ResolutionError),

    #[error("Validation failed for '{}': {}", .distribution_name.as_deref().unwrap_or("<unknown>"), .errors.join("; "))]
    ValidationFailed {
        distribution_name: Option<String>,
        errors: Vec<String>,
    },

    #[error("Plugin '{distribution_name}' is not installed")]
    NotFound { distribution_name: String },

    /// The repository behind an installed record now declares another name
    #[error("Repository now declares distribution name '{found}', expected '{expected}'")]
    IdentityMismatch { expected: String, found: String },

    #[error("Internal plugin system error: {0}")]
    InternalError(String),
}

impl PluginSystemError {
    pub fn kind(&self) -> ErrorKind {
        match self {
            PluginSystemError::Resolution(e) if e.is_timeout() => ErrorKind::Timeout,
            PluginSystemError::Resolution(_) => ErrorKind::Resolution,
            PluginSystemError::ValidationFailed { .. } => ErrorKind::ValidationFailed,
            PluginSystemError::IdentityMismatch { .. } => ErrorKind::ValidationFailed,
            PluginSystemError::NotFound { .. } => ErrorKind::NotFound,
            PluginSystemError::InternalError(_) => ErrorKind::Internal,
        }
    }

    /// Human-readable reason without the variant prefix.
    pub fn reason(&self) -> String {
        match self {
            PluginSystemError::Resolution(e) => e.to_string(),
            PluginSystemError::ValidationFailed { errors, .. } => errors.join("; "),
            PluginSystemError::NotFound { distribution_name } => {
                format!("plugin '{}' is not installed", distribution_name)
            }
            PluginSystemError::IdentityMismatch { expected, found } => format!(
                "repository now declares distribution name '{}', expected '{}'",
                found, expected
            ),
            PluginSystemError::InternalError(msg) => msg.clone(),
        }
    }

    pub fn not_found(distribution_name: impl Into<String>) -> Self {
        PluginSystemError::NotFound {
            distribution_name: distribution_name.into(),
        }
    }
}
