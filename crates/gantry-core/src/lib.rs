//! # gantry-core
//!
//! Lifecycle management for host-application plugins: validation against a
//! remote repository, durable install records, update checks and the
//! read-only view of what the running process actually loaded.
pub mod api;
pub mod kernel;
pub mod plugin_system;
pub mod storage;

// Re-export key public types/traits for easier use by the binary
pub use api::PluginApi;
pub use kernel::Application;
pub use kernel::error::{Error, ErrorKind, Result};
pub use plugin_system::{
    DefaultPluginManager, LoadedRegistry, PluginManager, PluginRecord, UpdateAvailability,
    ValidationReport, VersionResolver,
};
pub use storage::{FileInstallStore, InstallStore, ManagerConfig};
