use std::sync::Arc;

use log::{debug, warn};
use serde::{Deserialize, Serialize};
use tokio::sync::Semaphore;
use tokio::task::JoinSet;

use crate::plugin_system::record::{PluginRecord, UpdateAvailability};
use crate::plugin_system::version::{ResolvedRef, VersionResolver};

/// Result of checking one installed plugin for a newer commit.
///
/// When `error` is set, `update_available` carries no information; use
/// [`UpdateInfo::availability`] rather than reading the flag directly.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateInfo {
    pub distribution_name: String,
    pub latest_ref: Option<String>,
    pub latest_commit: Option<String>,
    pub update_available: bool,
    pub error: Option<String>,
    /// The installed resolution this check compared against
    #[serde(skip)]
    checked_against: Option<ResolvedRef>,
}

impl UpdateInfo {
    fn checked(record: &PluginRecord, latest: ResolvedRef, update_available: bool) -> Self {
        Self {
            distribution_name: record.distribution_name.clone(),
            latest_ref: Some(latest.git_ref),
            latest_commit: Some(latest.commit),
            update_available,
            error: None,
            checked_against: Some(ResolvedRef::new(&record.git_ref, &record.resolved_commit)),
        }
    }

    fn failed(record: &PluginRecord, error: impl Into<String>) -> Self {
        Self {
            distribution_name: record.distribution_name.clone(),
            latest_ref: None,
            latest_commit: None,
            update_available: false,
            error: Some(error.into()),
            checked_against: Some(ResolvedRef::new(&record.git_ref, &record.resolved_commit)),
        }
    }

    /// Tri-state reading that honours `error`.
    pub fn availability(&self) -> UpdateAvailability {
        if self.error.is_some() {
            UpdateAvailability::Unknown
        } else if self.update_available {
            UpdateAvailability::Available
        } else {
            UpdateAvailability::UpToDate
        }
    }

    /// Installed ref and commit this check was made against.
    pub fn checked_against(&self) -> Option<&ResolvedRef> {
        self.checked_against.as_ref()
    }

    /// Whether this outcome still describes `record`, i.e. nobody installed
    /// or updated it since the check started.
    pub fn applies_to(&self, record: &PluginRecord) -> bool {
        match &self.checked_against {
            Some(checked) => {
                record.distribution_name == self.distribution_name
                    && record.git_ref == checked.git_ref
                    && record.resolved_commit == checked.commit
            }
            None => false,
        }
    }
}

/// Update-check results for every installed plugin, in store order.
#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
pub struct UpdateReport {
    pub plugins: Vec<UpdateInfo>,
}

impl UpdateReport {
    pub fn get(&self, distribution_name: &str) -> Option<&UpdateInfo> {
        self.plugins
            .iter()
            .find(|info| info.distribution_name == distribution_name)
    }

    pub fn available_count(&self) -> usize {
        self.plugins
            .iter()
            .filter(|info| info.availability().is_available())
            .count()
    }

    pub fn error_count(&self) -> usize {
        self.plugins.iter().filter(|info| info.error.is_some()).count()
    }
}

/// Concurrent, isolated update checks. Never touches the install store.
#[derive(Debug, Clone)]
pub struct UpdateChecker {
    resolver: VersionResolver,
    max_concurrency: usize,
}

impl UpdateChecker {
    pub fn new(resolver: VersionResolver, max_concurrency: usize) -> Self {
        Self {
            resolver,
            max_concurrency: max_concurrency.max(1),
        }
    }

    /// Check every record. Each resolution runs as its own task under the
    /// resolver's deadline; a failed or panicked check becomes that
    /// plugin's `error` and never affects its siblings.
    pub async fn check(&self, records: &[PluginRecord]) -> UpdateReport {
        let semaphore = Arc::new(Semaphore::new(self.max_concurrency));
        let mut tasks = JoinSet::new();

        for (index, record) in records.iter().cloned().enumerate() {
            let resolver = self.resolver.clone();
            let semaphore = Arc::clone(&semaphore);
            tasks.spawn(async move {
                let _permit = semaphore.acquire_owned().await.ok();
                let info = check_one(&resolver, &record).await;
                (index, info)
            });
        }

        let mut slots: Vec<Option<UpdateInfo>> = vec![None; records.len()];
        while let Some(joined) = tasks.join_next().await {
            match joined {
                Ok((index, info)) => slots[index] = Some(info),
                Err(e) => warn!("Update check task failed: {}", e),
            }
        }

        let plugins = slots
            .into_iter()
            .zip(records)
            .map(|(slot, record)| {
                slot.unwrap_or_else(|| UpdateInfo::failed(record, "update check did not complete"))
            })
            .collect();
        UpdateReport { plugins }
    }
}

async fn check_one(resolver: &VersionResolver, record: &PluginRecord) -> UpdateInfo {
    match resolver
        .check_newer(&record.repository_url, &record.git_ref, &record.resolved_commit)
        .await
    {
        Ok((latest, newer)) => {
            debug!(
                "Checked '{}': installed {}, latest {} ({})",
                record.distribution_name,
                record.short_commit(),
                latest.commit,
                if newer { "newer" } else { "same" }
            );
            UpdateInfo::checked(record, latest, newer)
        }
        Err(e) => {
            warn!("Update check for '{}' failed: {}", record.distribution_name, e);
            UpdateInfo::failed(record, e.to_string())
        }
    }
}
