use std::collections::BTreeMap;
use std::fmt;

use chrono::{DateTime, Utc};
use serde::{Deserialize, Serialize};

use crate::kernel::constants::SHORT_COMMIT_LEN;

/// Result of the most recent update check for an installed plugin.
///
/// Persisted as `null` / `true` / `false` so "never checked" stays
/// distinguishable from "checked, nothing newer".
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, Default, Serialize, Deserialize)]
#[serde(from = "Option<bool>", into = "Option<bool>")]
pub enum UpdateAvailability {
    #[default]
    Unknown,
    Available,
    UpToDate,
}

impl UpdateAvailability {
    pub fn as_bool(&self) -> Option<bool> {
        match self {
            UpdateAvailability::Unknown => None,
            UpdateAvailability::Available => Some(true),
            UpdateAvailability::UpToDate => Some(false),
        }
    }

    pub fn is_available(&self) -> bool {
        *self == UpdateAvailability::Available
    }
}

impl From<Option<bool>> for UpdateAvailability {
    fn from(value: Option<bool>) -> Self {
        match value {
            None => UpdateAvailability::Unknown,
            Some(true) => UpdateAvailability::Available,
            Some(false) => UpdateAvailability::UpToDate,
        }
    }
}

impl From<UpdateAvailability> for Option<bool> {
    fn from(value: UpdateAvailability) -> Self {
        value.as_bool()
    }
}

impl fmt::Display for UpdateAvailability {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            UpdateAvailability::Unknown => write!(f, "unknown"),
            UpdateAvailability::Available => write!(f, "update available"),
            UpdateAvailability::UpToDate => write!(f, "up to date"),
        }
    }
}

/// Lifecycle state of a distribution name, derived from the install store.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PluginState {
    Absent,
    Installed(UpdateAvailability),
}

impl fmt::Display for PluginState {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PluginState::Absent => write!(f, "absent"),
            PluginState::Installed(availability) => write!(f, "installed ({})", availability),
        }
    }
}

/// Durable install record for one plugin, keyed by `distribution_name`.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct PluginRecord {
    pub distribution_name: String,
    #[serde(rename = "repositoryURL")]
    pub repository_url: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
    pub resolved_commit: String,
    pub installed_at: DateTime<Utc>,
    #[serde(default)]
    pub latest_ref: Option<String>,
    #[serde(default)]
    pub latest_commit: Option<String>,
    #[serde(default)]
    pub update_available: UpdateAvailability,
    /// Capability name to implementation reference, captured at validation time
    #[serde(default)]
    pub entry_points: BTreeMap<String, String>,
}

impl PluginRecord {
    /// A freshly installed record: nothing checked yet.
    pub fn new(
        distribution_name: impl Into<String>,
        repository_url: impl Into<String>,
        git_ref: impl Into<String>,
        resolved_commit: impl Into<String>,
        entry_points: BTreeMap<String, String>,
    ) -> Self {
        Self {
            distribution_name: distribution_name.into(),
            repository_url: repository_url.into(),
            git_ref: git_ref.into(),
            resolved_commit: resolved_commit.into(),
            installed_at: Utc::now(),
            latest_ref: None,
            latest_commit: None,
            update_available: UpdateAvailability::Unknown,
            entry_points,
        }
    }

    pub fn state(&self) -> PluginState {
        PluginState::Installed(self.update_available)
    }

    pub fn short_commit(&self) -> &str {
        short_commit(&self.resolved_commit)
    }

    /// The record after a successful update: new resolution, check state reset.
    pub fn updated_to(
        &self,
        git_ref: impl Into<String>,
        resolved_commit: impl Into<String>,
        entry_points: BTreeMap<String, String>,
    ) -> Self {
        Self {
            git_ref: git_ref.into(),
            resolved_commit: resolved_commit.into(),
            latest_ref: None,
            latest_commit: None,
            update_available: UpdateAvailability::Unknown,
            entry_points,
            ..self.clone()
        }
    }

    /// Record the outcome of an update check. Only the `latest*` and
    /// `update_available` fields change.
    pub fn with_check_result(
        &self,
        latest_ref: Option<String>,
        latest_commit: Option<String>,
        update_available: UpdateAvailability,
    ) -> Self {
        Self {
            latest_ref,
            latest_commit,
            update_available,
            ..self.clone()
        }
    }
}

/// Abbreviate a commit id for display.
pub fn short_commit(commit: &str) -> &str {
    match commit.char_indices().nth(SHORT_COMMIT_LEN) {
        Some((idx, _)) => &commit[..idx],
        None => commit,
    }
}
