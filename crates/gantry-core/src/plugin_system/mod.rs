//! # Gantry Plugin System
//!
//! Lifecycle management for host plugins, from a (repository, ref) pair to a
//! durable install record and back out again.
//!
//! ## Key Submodules and Responsibilities:
//!
//! - **[`version`]**: The [`Vcs`] collaborator contract and the
//!   [`VersionResolver`] that puts a deadline on every call to it.
//! - **[`git`]**: A [`Vcs`] implemented over the `git` command line.
//! - **[`manifest`]**: The manifest a plugin repository declares and the
//!   capability kinds the host recognizes.
//! - **[`validator`]**: Structural validation producing a [`ValidationReport`].
//! - **[`record`]**: The persisted [`PluginRecord`] and its derived state.
//! - **[`registry`]**: The read-only [`LoadedRegistry`] of plugins wired into
//!   the running process.
//! - **[`update`]**: Concurrent, isolated update checks.
//! - **[`locks`]**: Per-distribution-name serialization of mutations.
//! - **[`manager`]**: The [`PluginManager`] state machine tying it together.
//! - **[`error`]**: [`PluginSystemError`](error::PluginSystemError).
//!
//! Installed-state changes never touch the loaded registry; they take effect
//! at the next process start.
pub mod error;
pub mod git;
pub mod locks;
pub mod manager;
pub mod manifest;
pub mod record;
pub mod registry;
pub mod update;
pub mod validator;
pub mod version;

pub use git::GitCommandVcs;
pub use manager::{
    DefaultPluginManager, InstallOutcome, ListingStatus, PluginListing, PluginManager,
    UninstallOutcome, UpdateAllSummary, UpdateFailure, UpdateOutcome,
};
pub use manifest::{CapabilityKind, ManifestBuilder, PluginManifest};
pub use record::{PluginRecord, PluginState, UpdateAvailability};
pub use registry::{Capability, LoadedPlugin, LoadedPluginView, LoadedRegistry};
pub use update::{UpdateChecker, UpdateInfo, UpdateReport};
pub use validator::{ValidationReport, Validator};
pub use version::{ResolutionError, ResolvedRef, Vcs, VersionResolver};
