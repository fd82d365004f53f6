use std::collections::BTreeMap;
use std::sync::Arc;

use log::debug;
use serde::{Deserialize, Serialize};

use crate::kernel::error::Result;
use crate::plugin_system::manifest::{
    distribution_name_problem, normalize_distribution_name, CapabilityKind, PluginManifest,
};
use crate::plugin_system::record::short_commit;
use crate::plugin_system::version::{ResolutionError, VersionResolver};
use crate::storage::InstallStore;

/// Blocking error reported when a manifest declares nothing the host can use.
pub const NO_RECOGNIZED_ENTRY_POINT: &str = "no recognized entry point declared";

/// Outcome of validating a candidate plugin. Never persisted.
///
/// `distribution_name`, `resolved_commit` and `entry_points` are filled in
/// whenever they could be discovered, whether or not the report is `ok`.
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
#[serde(rename_all = "camelCase")]
pub struct ValidationReport {
    pub ok: bool,
    pub distribution_name: Option<String>,
    pub resolved_commit: Option<String>,
    pub entry_points: BTreeMap<String, String>,
    pub errors: Vec<String>,
    pub warnings: Vec<String>,
    /// Set when the candidate could not be reached at all
    #[serde(skip)]
    resolution_failure: Option<ResolutionError>,
}

impl ValidationReport {
    /// A rejected report carrying only `errors`.
    pub fn failed(errors: Vec<String>) -> Self {
        Self {
            errors,
            ..Self::default()
        }
    }

    /// The resolution or fetch failure that stopped validation, if any.
    pub fn resolution_failure(&self) -> Option<&ResolutionError> {
        self.resolution_failure.as_ref()
    }

    fn error(&mut self, message: impl Into<String>) {
        self.errors.push(message.into());
    }

    fn warn(&mut self, message: impl Into<String>) {
        self.warnings.push(message.into());
    }

    fn finish(mut self) -> Self {
        self.ok = self.errors.is_empty();
        self
    }
}

/// Structural validation of a (repository, ref) pair without installing it.
#[derive(Debug, Clone)]
pub struct Validator {
    resolver: VersionResolver,
    store: Arc<dyn InstallStore>,
}

impl Validator {
    pub fn new(resolver: VersionResolver, store: Arc<dyn InstallStore>) -> Self {
        Self { resolver, store }
    }

    /// Validate a candidate.
    ///
    /// Every problem with the candidate lands in the report. The only hard
    /// failure is an unreachable install store, which is needed for the
    /// collision check and must not be mistaken for "nothing installed".
    pub async fn validate(&self, repository_url: &str, git_ref: &str) -> Result<ValidationReport> {
        let repository_url = repository_url.trim();
        let git_ref = git_ref.trim();
        let mut report = ValidationReport::default();

        if repository_url.is_empty() {
            report.error("repository URL must not be empty");
        }
        if git_ref.is_empty() {
            report.error("ref must not be empty");
        }
        if repository_url.starts_with('-') {
            report.error("repository URL must not start with '-'");
        }
        if git_ref.starts_with('-') {
            report.error("ref must not start with '-'");
        }
        if !report.errors.is_empty() {
            return Ok(report.finish());
        }

        let resolved = match self.resolver.resolve(repository_url, git_ref).await {
            Ok(resolved) => resolved,
            Err(e) => {
                debug!("Validation of {}@{} stopped at resolution: {}", repository_url, git_ref, e);
                report.error(e.to_string());
                report.resolution_failure = Some(e);
                return Ok(report.finish());
            }
        };
        report.resolved_commit = Some(resolved.commit.clone());

        let raw = match self.resolver.fetch_manifest(repository_url, &resolved.commit).await {
            Ok(raw) => raw,
            Err(e) => {
                report.error(format!("could not fetch manifest: {}", e));
                if !matches!(e, ResolutionError::ManifestUnavailable { .. }) {
                    report.resolution_failure = Some(e);
                }
                return Ok(report.finish());
            }
        };
        let manifest_path = self.resolver.manifest_path();
        let manifest = match PluginManifest::parse(manifest_path, &raw) {
            Ok(manifest) => manifest,
            Err(e) => {
                report.error(format!("manifest '{}' could not be parsed: {}", manifest_path, e));
                return Ok(report.finish());
            }
        };
        report.entry_points = manifest.entry_points.clone();

        let name = manifest.name.trim();
        if name.is_empty() {
            report.error("manifest does not declare a distribution name");
        } else if let Some(problem) = distribution_name_problem(name) {
            report.error(format!("invalid distribution name '{}': {}", name, problem));
        } else {
            report.distribution_name = Some(name.to_string());
        }

        check_entry_points(&manifest, &mut report);

        if let Some(version) = manifest.version.as_deref() {
            if semver::Version::parse(version.trim()).is_err() {
                report.warn(format!("version '{}' is not a semantic version", version));
            }
        }

        if let Some(name) = report.distribution_name.clone() {
            self.check_collisions(&name, repository_url, &mut report)?;
        }

        Ok(report.finish())
    }

    /// Blocking collisions for `name` against the store as it is now.
    ///
    /// Callers hold the per-name lock so the answer cannot go stale before
    /// they write.
    pub fn recheck_collisions(&self, name: &str, repository_url: &str) -> Result<Vec<String>> {
        let mut report = ValidationReport::default();
        self.check_collisions(name, repository_url, &mut report)?;
        Ok(report.errors)
    }

    fn check_collisions(&self, name: &str, repository_url: &str, report: &mut ValidationReport) -> Result<()> {
        let normalized = normalize_distribution_name(name);
        for installed in self.store.list()? {
            if installed.distribution_name == name {
                report.warn(format!(
                    "plugin '{}' is already installed from {}@{} ({}); installing will overwrite it",
                    name,
                    installed.repository_url,
                    installed.git_ref,
                    short_commit(&installed.resolved_commit)
                ));
                if installed.repository_url != repository_url {
                    report.warn(format!(
                        "plugin '{}' is currently installed from a different repository ({}); \
                         the installed record will be replaced by one pointing at {}",
                        name, installed.repository_url, repository_url
                    ));
                }
            } else if normalize_distribution_name(&installed.distribution_name) == normalized {
                report.error(format!(
                    "distribution name '{}' conflicts with installed plugin '{}'",
                    name, installed.distribution_name
                ));
            }
        }
        Ok(())
    }
}

fn check_entry_points(manifest: &PluginManifest, report: &mut ValidationReport) {
    for (key, reference) in &manifest.entry_points {
        if reference.trim().is_empty() {
            report.error(format!("entry point '{}' has an empty reference", key));
        }
    }

    let declared = manifest.capabilities();
    if declared.is_empty() {
        report.error(NO_RECOGNIZED_ENTRY_POINT);
    } else {
        for kind in CapabilityKind::ALL {
            if !declared.contains(&kind) {
                report.warn(format!(
                    "no {} declared (optional '{}' entry point)",
                    kind.description(),
                    kind.entry_point_key()
                ));
            }
        }
    }

    for key in manifest.unrecognized_entry_points() {
        report.warn(format!("unrecognized entry point '{}' will be ignored", key));
    }
}
