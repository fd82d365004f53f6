use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use crate::plugin_system::manager::{InstallOutcome, PluginListing, UninstallOutcome, UpdateAllSummary, UpdateOutcome};
use crate::plugin_system::update::UpdateReport;
use crate::plugin_system::validator::ValidationReport;

/// A (repository, ref) pair, as taken by validate and install
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RepositoryRequest {
    #[serde(rename = "repositoryURL")]
    pub repository_url: String,
    #[serde(rename = "ref")]
    pub git_ref: String,
}

impl RepositoryRequest {
    pub fn new(repository_url: impl Into<String>, git_ref: impl Into<String>) -> Self {
        Self {
            repository_url: repository_url.into(),
            git_ref: git_ref.into(),
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallRequest {
    pub distribution_name: String,
}

/// Update one plugin, optionally moving it to a different ref.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateRequest {
    pub distribution_name: String,
    #[serde(rename = "ref", default, skip_serializing_if = "Option::is_none")]
    pub git_ref: Option<String>,
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct InstallResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub distribution_name: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub entry_points: Option<BTreeMap<String, String>>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl InstallResponse {
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            ok: false,
            errors,
            ..Self::default()
        }
    }
}

impl From<InstallOutcome> for InstallResponse {
    fn from(outcome: InstallOutcome) -> Self {
        Self {
            ok: true,
            distribution_name: Some(outcome.record.distribution_name),
            resolved_commit: Some(outcome.record.resolved_commit),
            entry_points: Some(outcome.record.entry_points),
            restart_required: Some(outcome.restart_required),
            errors: Vec::new(),
            warnings: outcome.warnings,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UninstallResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_required: Option<bool>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
}

impl UninstallResponse {
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            ok: false,
            restart_required: None,
            errors,
        }
    }
}

impl From<UninstallOutcome> for UninstallResponse {
    fn from(outcome: UninstallOutcome) -> Self {
        Self {
            ok: true,
            restart_required: Some(outcome.restart_required),
            errors: Vec::new(),
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct UpdateResponse {
    pub ok: bool,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub restart_required: Option<bool>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub previous_commit: Option<String>,
    #[serde(skip_serializing_if = "Option::is_none")]
    pub resolved_commit: Option<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub errors: Vec<String>,
    #[serde(default, skip_serializing_if = "Vec::is_empty")]
    pub warnings: Vec<String>,
}

impl UpdateResponse {
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            ok: false,
            errors,
            ..Self::default()
        }
    }
}

impl From<UpdateOutcome> for UpdateResponse {
    fn from(outcome: UpdateOutcome) -> Self {
        Self {
            ok: true,
            restart_required: Some(outcome.restart_required),
            previous_commit: Some(outcome.previous_commit),
            resolved_commit: Some(outcome.record.resolved_commit),
            errors: Vec::new(),
            warnings: outcome.warnings,
        }
    }
}

/// Any request the facade accepts, tagged by `op`.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
#[serde(tag = "op", rename_all = "camelCase")]
pub enum Request {
    List,
    Validate(RepositoryRequest),
    Install(RepositoryRequest),
    Uninstall(UninstallRequest),
    CheckUpdates,
    Update(UpdateRequest),
    UpdateAll,
}

/// The response to a [`Request`]; serializes as the bare inner payload.
#[derive(Debug, Clone, PartialEq, Serialize)]
#[serde(untagged)]
pub enum Response {
    List(PluginListing),
    Validate(ValidationReport),
    Install(InstallResponse),
    Uninstall(UninstallResponse),
    CheckUpdates(UpdateReport),
    Update(UpdateResponse),
    UpdateAll(UpdateAllSummary),
}

impl Response {
    /// False when the payload carries `ok: false`
    pub fn is_ok(&self) -> bool {
        match self {
            Response::Validate(report) => report.ok,
            Response::Install(response) => response.ok,
            Response::Uninstall(response) => response.ok,
            Response::Update(response) => response.ok,
            Response::List(_) | Response::CheckUpdates(_) | Response::UpdateAll(_) => true,
        }
    }

    pub fn to_json(&self) -> serde_json::Result<serde_json::Value> {
        serde_json::to_value(self)
    }
}
