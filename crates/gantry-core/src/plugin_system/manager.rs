use std::fmt::{self, Debug};
use std::sync::Arc;

use async_trait::async_trait;
use log::{debug, info, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::kernel::component::KernelComponent;
use crate::kernel::error::{Error, Result};
use crate::plugin_system::error::PluginSystemError;
use crate::plugin_system::locks::KeyedLocks;
use crate::plugin_system::record::{PluginRecord, PluginState, UpdateAvailability};
use crate::plugin_system::registry::{LoadedPluginView, LoadedRegistry};
use crate::plugin_system::update::{UpdateChecker, UpdateReport};
use crate::plugin_system::validator::{ValidationReport, Validator};
use crate::plugin_system::version::VersionResolver;
use crate::storage::InstallStore;

/// How an installed or loaded plugin relates to the running process.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum ListingStatus {
    /// Installed and loaded
    Active,
    /// Installed, takes effect after a restart
    PendingRestart,
    /// Still loaded, but uninstalled; goes away after a restart
    PendingRemoval,
}

/// Installed records next to what the process actually loaded.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct PluginListing {
    pub installed: Vec<PluginRecord>,
    pub loaded: Vec<LoadedPluginView>,
}

impl PluginListing {
    pub fn status_of(&self, name: &str) -> Option<ListingStatus> {
        let installed = self.installed.iter().any(|r| r.distribution_name == name);
        let loaded = self.loaded.iter().any(|p| p.name == name);
        match (installed, loaded) {
            (true, true) => Some(ListingStatus::Active),
            (true, false) => Some(ListingStatus::PendingRestart),
            (false, true) => Some(ListingStatus::PendingRemoval),
            (false, false) => None,
        }
    }

    /// Every known name with its status: installed names first in store
    /// order, then loaded-only names.
    pub fn statuses(&self) -> Vec<(String, ListingStatus)> {
        let mut names: Vec<&str> = self.installed.iter().map(|r| r.distribution_name.as_str()).collect();
        for loaded in &self.loaded {
            if !names.contains(&loaded.name.as_str()) {
                names.push(&loaded.name);
            }
        }
        names
            .into_iter()
            .filter_map(|name| self.status_of(name).map(|status| (name.to_string(), status)))
            .collect()
    }
}

/// A committed install.
#[derive(Debug, Clone, PartialEq)]
pub struct InstallOutcome {
    pub record: PluginRecord,
    pub warnings: Vec<String>,
    /// Always true: the loaded registry only changes at process start
    pub restart_required: bool,
}

#[derive(Debug, Clone, PartialEq, Eq)]
pub struct UninstallOutcome {
    pub distribution_name: String,
    pub restart_required: bool,
}

#[derive(Debug, Clone, PartialEq)]
pub struct UpdateOutcome {
    pub record: PluginRecord,
    pub previous_commit: String,
    pub warnings: Vec<String>,
    pub restart_required: bool,
}

/// One plugin that `update_all` could not update.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateFailure {
    pub distribution_name: String,
    pub errors: Vec<String>,
}

/// Aggregate outcome of `update_all`. Partial success is a normal result.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateAllSummary {
    pub updated: usize,
    pub failed: usize,
    pub restart_required: bool,
    pub updated_plugins: Vec<String>,
    pub failures: Vec<UpdateFailure>,
}

/// Plugin lifecycle component interface
#[async_trait]
pub trait PluginManager: KernelComponent {
    /// Installed records alongside the plugins loaded in this process
    async fn list(&self) -> Result<PluginListing>;

    /// Validate a candidate without side effects
    async fn validate(&self, repository_url: &str, git_ref: &str) -> Result<ValidationReport>;

    /// Validate and commit an install record, overwriting any record with the same name
    async fn install(&self, repository_url: &str, git_ref: &str) -> Result<InstallOutcome>;

    /// Remove an install record
    async fn uninstall(&self, distribution_name: &str) -> Result<UninstallOutcome>;

    /// Check every installed plugin for a newer commit on its ref
    async fn check_updates(&self) -> Result<UpdateReport>;

    /// Move a plugin to the current head of its ref, or of `new_ref` if given
    async fn update(&self, distribution_name: &str, new_ref: Option<&str>) -> Result<UpdateOutcome>;

    /// Update every plugin whose last check found a newer commit
    async fn update_all(&self) -> Result<UpdateAllSummary>;

    /// Lifecycle state of a distribution name
    async fn state_of(&self, distribution_name: &str) -> Result<PluginState>;
}

/// Default implementation of plugin manager
#[derive(Clone)]
pub struct DefaultPluginManager {
    name: &'static str,
    store: Arc<dyn InstallStore>,
    loaded: Arc<LoadedRegistry>,
    validator: Validator,
    checker: UpdateChecker,
    locks: Arc<KeyedLocks>,
    max_concurrency: usize,
}

impl DefaultPluginManager {
    /// Create a plugin manager over injected collaborators.
    pub fn new(
        store: Arc<dyn InstallStore>,
        loaded: Arc<LoadedRegistry>,
        resolver: VersionResolver,
        max_concurrency: usize,
    ) -> Self {
        let max_concurrency = max_concurrency.max(1);
        Self {
            name: "DefaultPluginManager",
            validator: Validator::new(resolver.clone(), Arc::clone(&store)),
            checker: UpdateChecker::new(resolver, max_concurrency),
            store,
            loaded,
            locks: Arc::new(KeyedLocks::new()),
            max_concurrency,
        }
    }

    pub fn store(&self) -> &Arc<dyn InstallStore> {
        &self.store
    }

    pub fn loaded_registry(&self) -> &Arc<LoadedRegistry> {
        &self.loaded
    }

    /// Write check outcomes back onto the records they describe.
    ///
    /// A record changed by a concurrent install or update since the check
    /// started is left alone, as is any record whose check failed. Store
    /// failures here are logged; the report has already been produced.
    async fn persist_check_results(&self, report: &UpdateReport) {
        for info in report.plugins.iter().filter(|info| info.error.is_none()) {
            let _guard = self.locks.lock(&info.distribution_name).await;
            let current = match self.store.get(&info.distribution_name) {
                Ok(Some(record)) => record,
                Ok(None) => continue,
                Err(e) => {
                    warn!("Could not persist update check for '{}': {}", info.distribution_name, e);
                    continue;
                }
            };
            if !info.applies_to(&current) {
                debug!(
                    "Skipping stale update check result for '{}' (record changed during check)",
                    info.distribution_name
                );
                continue;
            }
            let refreshed = current.with_check_result(
                info.latest_ref.clone(),
                info.latest_commit.clone(),
                info.availability(),
            );
            if let Err(e) = self.store.put(refreshed) {
                warn!("Could not persist update check for '{}': {}", info.distribution_name, e);
            }
        }
    }
}

/// The error for a rejected candidate: the resolution failure if it could
/// not be reached, otherwise the report's blocking errors.
fn rejected(report: ValidationReport) -> Error {
    if let Some(failure) = report.resolution_failure() {
        return failure.clone().into();
    }
    PluginSystemError::ValidationFailed {
        distribution_name: report.distribution_name,
        errors: report.errors,
    }
    .into()
}

impl Debug for DefaultPluginManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("DefaultPluginManager")
            .field("name", &self.name)
            .field("store", &self.store)
            .field("loaded", &self.loaded.len())
            .field("max_concurrency", &self.max_concurrency)
            .finish_non_exhaustive()
    }
}

#[async_trait]
impl KernelComponent for DefaultPluginManager {
    fn name(&self) -> &'static str {
        self.name
    }

    async fn initialize(&self) -> Result<()> {
        // Fail bootstrap early if the store cannot be read
        let installed = self.store.list()?;
        info!(
            "Plugin manager initialized: {} installed, {} loaded",
            installed.len(),
            self.loaded.len()
        );
        Ok(())
    }

    async fn start(&self) -> Result<()> {
        let listing = self.list().await?;
        for (name, status) in listing.statuses() {
            match status {
                ListingStatus::Active => {}
                ListingStatus::PendingRestart => info!("Plugin '{}' is installed but not loaded", name),
                ListingStatus::PendingRemoval => info!("Plugin '{}' is loaded but no longer installed", name),
            }
        }
        Ok(())
    }

    async fn stop(&self) -> Result<()> {
        debug!("Stopping plugin manager");
        Ok(())
    }
}

#[async_trait]
impl PluginManager for DefaultPluginManager {
    async fn list(&self) -> Result<PluginListing> {
        Ok(PluginListing {
            installed: self.store.list()?,
            loaded: self.loaded.list(),
        })
    }

    async fn validate(&self, repository_url: &str, git_ref: &str) -> Result<ValidationReport> {
        self.validator.validate(repository_url, git_ref).await
    }

    async fn install(&self, repository_url: &str, git_ref: &str) -> Result<InstallOutcome> {
        let report = self.validator.validate(repository_url, git_ref).await?;
        if !report.ok {
            return Err(rejected(report));
        }
        let (name, commit) = match (report.distribution_name.clone(), report.resolved_commit.clone()) {
            (Some(name), Some(commit)) => (name, commit),
            _ => {
                return Err(PluginSystemError::InternalError(
                    "validation passed without a distribution name and commit".into(),
                )
                .into());
            }
        };

        let _guard = self.locks.lock(&name).await;
        // A spelling variant may have landed since validation ran.
        let conflicts = self.validator.recheck_collisions(&name, repository_url.trim())?;
        if !conflicts.is_empty() {
            return Err(PluginSystemError::ValidationFailed {
                distribution_name: Some(name),
                errors: conflicts,
            }
            .into());
        }
        let record = PluginRecord::new(
            name,
            repository_url.trim(),
            git_ref.trim(),
            commit,
            report.entry_points,
        );
        self.store.put(record.clone())?;
        info!(
            "Installed plugin '{}' from {}@{} ({}); restart required",
            record.distribution_name,
            record.repository_url,
            record.git_ref,
            record.short_commit()
        );

        Ok(InstallOutcome {
            record,
            warnings: report.warnings,
            restart_required: true,
        })
    }

    async fn uninstall(&self, distribution_name: &str) -> Result<UninstallOutcome> {
        let _guard = self.locks.lock(distribution_name).await;
        if !self.store.delete(distribution_name)? {
            return Err(PluginSystemError::not_found(distribution_name).into());
        }
        info!("Uninstalled plugin '{}'; restart required", distribution_name);
        Ok(UninstallOutcome {
            distribution_name: distribution_name.to_string(),
            restart_required: true,
        })
    }

    async fn check_updates(&self) -> Result<UpdateReport> {
        let records = self.store.list()?;
        let report = self.checker.check(&records).await;
        info!(
            "Checked {} plugin(s): {} with updates, {} failed",
            report.plugins.len(),
            report.available_count(),
            report.error_count()
        );
        self.persist_check_results(&report).await;
        Ok(report)
    }

    async fn update(&self, distribution_name: &str, new_ref: Option<&str>) -> Result<UpdateOutcome> {
        let _guard = self.locks.lock(distribution_name).await;
        let current = self
            .store
            .get(distribution_name)?
            .ok_or_else(|| PluginSystemError::not_found(distribution_name))?;

        let target_ref = new_ref
            .map(str::trim)
            .filter(|r| !r.is_empty())
            .unwrap_or(&current.git_ref)
            .to_string();
        let report = self.validator.validate(&current.repository_url, &target_ref).await?;
        if report.ok && report.distribution_name.as_deref() != Some(distribution_name) {
            return Err(PluginSystemError::IdentityMismatch {
                expected: distribution_name.to_string(),
                found: report.distribution_name.unwrap_or_else(|| "<none>".to_string()),
            }
            .into());
        }
        if !report.ok {
            return Err(rejected(report));
        }
        let commit = report.resolved_commit.clone().ok_or_else(|| {
            PluginSystemError::InternalError("validation passed without a resolved commit".into())
        })?;

        let updated = current.updated_to(target_ref, commit, report.entry_points);
        self.store.put(updated.clone())?;
        info!(
            "Updated plugin '{}' {} -> {} on {}; restart required",
            distribution_name,
            current.short_commit(),
            updated.short_commit(),
            updated.git_ref
        );

        Ok(UpdateOutcome {
            record: updated,
            previous_commit: current.resolved_commit,
            warnings: report.warnings,
            restart_required: true,
        })
    }

    async fn update_all(&self) -> Result<UpdateAllSummary> {
        let candidates: Vec<String> = self
            .store
            .list()?
            .into_iter()
            .filter(|record| record.update_available == UpdateAvailability::Available)
            .map(|record| record.distribution_name)
            .collect();

        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();
        for name in candidates.iter().cloned() {
            let manager = self.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let outcome = manager.update(&name, None).await;
                (name, outcome)
            });
        }

        let mut summary = UpdateAllSummary::default();
        let mut finished = Vec::with_capacity(candidates.len());
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((name, Ok(_))) => {
                    summary.updated_plugins.push(name.clone());
                    finished.push(name);
                }
                Ok((name, Err(e))) => {
                    warn!("Update of '{}' failed: {}", name, e);
                    summary.failures.push(UpdateFailure {
                        distribution_name: name.clone(),
                        errors: e.user_messages(),
                    });
                    finished.push(name);
                }
                Err(e) => warn!("Update task failed: {}", e),
            }
        }
        // Tasks that panicked still count as failures
        for name in candidates.iter().filter(|name| !finished.contains(name)) {
            summary.failures.push(UpdateFailure {
                distribution_name: name.clone(),
                errors: vec!["update did not complete".to_string()],
            });
        }

        // Report in store order regardless of completion order
        summary
            .updated_plugins
            .sort_by_key(|name| candidates.iter().position(|c| c == name));
        summary
            .failures
            .sort_by_key(|f| candidates.iter().position(|c| *c == f.distribution_name));
        summary.updated = summary.updated_plugins.len();
        summary.failed = summary.failures.len();
        summary.restart_required = summary.updated > 0;

        info!(
            "Update-all finished: {} updated, {} failed",
            summary.updated, summary.failed
        );
        Ok(summary)
    }

    async fn state_of(&self, distribution_name: &str) -> Result<PluginState> {
        Ok(match self.store.get(distribution_name)? {
            Some(record) => record.state(),
            None => PluginState::Absent,
        })
    }
}
