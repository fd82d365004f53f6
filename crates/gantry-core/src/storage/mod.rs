//! # Gantry Storage
//!
//! Durable state for the plugin manager: the [`InstallStore`] trait with its
//! file-backed and in-memory implementations, the atomic-write
//! [`StorageProvider`] underneath, and the [`ManagerConfig`] layer.
pub mod config;
pub mod error;
pub mod install_store;
pub mod local;
pub mod memory;
pub mod provider;

/// Re-export key types
pub use config::{ConfigFormat, ManagerConfig};
pub use install_store::{FileInstallStore, InstallStore};
pub use local::LocalStorageProvider;
pub use memory::MemoryInstallStore;
pub use provider::StorageProvider;
