use std::collections::{BTreeMap, BTreeSet};
use std::fmt;
use std::path::Path;

use serde::{Deserialize, Serialize};

/// Capability kinds a plugin can contribute to the host.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash, PartialOrd, Ord, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum CapabilityKind {
    /// A tab in the host UI
    UiRoute,
    /// HTTP API routes mounted by the host
    ApiRoute,
    /// Tools exposed to MCP clients
    Tool,
}

impl CapabilityKind {
    pub const ALL: [CapabilityKind; 3] = [CapabilityKind::UiRoute, CapabilityKind::ApiRoute, CapabilityKind::Tool];

    /// Key under `[entry_points]` declaring this capability
    pub fn entry_point_key(&self) -> &'static str {
        match self {
            CapabilityKind::UiRoute => "ui",
            CapabilityKind::ApiRoute => "api",
            CapabilityKind::Tool => "tools",
        }
    }

    pub fn from_entry_point_key(key: &str) -> Option<Self> {
        match key.trim().to_ascii_lowercase().as_str() {
            "ui" => Some(CapabilityKind::UiRoute),
            "api" => Some(CapabilityKind::ApiRoute),
            "tools" => Some(CapabilityKind::Tool),
            _ => None,
        }
    }

    /// What a user would miss without it
    pub fn description(&self) -> &'static str {
        match self {
            CapabilityKind::UiRoute => "UI tab",
            CapabilityKind::ApiRoute => "API routes",
            CapabilityKind::Tool => "MCP tools",
        }
    }
}

impl fmt::Display for CapabilityKind {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.entry_point_key())
    }
}

/// Error parsing a manifest document
#[derive(Debug, thiserror::Error)]
pub enum ManifestError {
    #[error("invalid TOML: {0}")]
    Toml(#[from] toml::de::Error),
    #[error("invalid JSON: {0}")]
    Json(#[from] serde_json::Error),
    #[error("unsupported manifest format '{0}' (expected .toml or .json)")]
    UnsupportedFormat(String),
}

/// Manifest a plugin repository declares at its root.
///
/// ```toml
/// name = "cost-explorer"
/// version = "1.2.0"
/// description = "Cost breakdowns per resource group"
///
/// [entry_points]
/// ui = "cost_explorer.ui:tab"
/// tools = "cost_explorer.mcp:tools"
/// ```
#[derive(Debug, Clone, PartialEq, Eq, Default, Serialize, Deserialize)]
pub struct PluginManifest {
    /// Distribution name; the plugin's stable identity
    #[serde(default)]
    pub name: String,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub version: Option<String>,

    #[serde(default, skip_serializing_if = "Option::is_none")]
    pub description: Option<String>,

    /// Capability name to implementation reference
    #[serde(default)]
    pub entry_points: BTreeMap<String, String>,
}

impl PluginManifest {
    /// Parse a manifest, choosing the format from `path`'s extension.
    pub fn parse(path: &str, contents: &str) -> Result<Self, ManifestError> {
        let ext = Path::new(path)
            .extension()
            .and_then(|ext| ext.to_str())
            .map(|ext| ext.to_ascii_lowercase())
            .unwrap_or_default();
        match ext.as_str() {
            "toml" => Ok(toml::from_str(contents)?),
            "json" => Ok(serde_json::from_str(contents)?),
            other => Err(ManifestError::UnsupportedFormat(other.to_string())),
        }
    }

    /// Serialize to TOML
    pub fn to_toml(&self) -> Result<String, toml::ser::Error> {
        toml::to_string(self)
    }

    /// Recognized capabilities declared by this manifest
    pub fn capabilities(&self) -> BTreeSet<CapabilityKind> {
        self.entry_points
            .keys()
            .filter_map(|key| CapabilityKind::from_entry_point_key(key))
            .collect()
    }

    /// Entry point keys that are not a recognized capability kind
    pub fn unrecognized_entry_points(&self) -> Vec<&str> {
        self.entry_points
            .keys()
            .filter(|key| CapabilityKind::from_entry_point_key(key).is_none())
            .map(String::as_str)
            .collect()
    }

    /// Reference declared for a capability kind, if any
    pub fn entry_point(&self, kind: CapabilityKind) -> Option<&str> {
        self.entry_points
            .iter()
            .find(|(key, _)| CapabilityKind::from_entry_point_key(key) == Some(kind))
            .map(|(_, reference)| reference.as_str())
    }
}

/// Why a distribution name is unusable, or `None` when it is fine.
///
/// Names start with an ASCII letter or digit and contain only letters,
/// digits, `.`, `_` and `-`.
pub fn distribution_name_problem(name: &str) -> Option<String> {
    let mut chars = name.chars();
    match chars.next() {
        None => Some("name is empty".to_string()),
        Some(first) if !first.is_ascii_alphanumeric() => {
            Some(format!("must start with a letter or digit, found '{}'", first))
        }
        Some(_) => name
            .chars()
            .find(|c| !(c.is_ascii_alphanumeric() || matches!(c, '.' | '_' | '-')))
            .map(|c| format!("contains unsupported character '{}'", c)),
    }
}

/// Canonical spelling used to detect names that differ only in case or
/// separator (`My_Plugin`, `my.plugin`, `my-plugin`).
pub fn normalize_distribution_name(name: &str) -> String {
    name.trim()
        .chars()
        .map(|c| match c {
            '_' | '.' => '-',
            other => other.to_ascii_lowercase(),
        })
        .collect()
}

/// Builder for creating a plugin manifest
pub struct ManifestBuilder {
    manifest: PluginManifest,
}

impl ManifestBuilder {
    /// Create a new manifest builder
    pub fn new(name: &str) -> Self {
        Self {
            manifest: PluginManifest {
                name: name.to_string(),
                ..PluginManifest::default()
            },
        }
    }

    /// Set the plugin version
    pub fn version(mut self, version: &str) -> Self {
        self.manifest.version = Some(version.to_string());
        self
    }

    /// Set the plugin description
    pub fn description(mut self, description: &str) -> Self {
        self.manifest.description = Some(description.to_string());
        self
    }

    /// Declare a recognized capability
    pub fn capability(self, kind: CapabilityKind, reference: &str) -> Self {
        self.entry_point(kind.entry_point_key(), reference)
    }

    /// Declare an entry point under an arbitrary key
    pub fn entry_point(mut self, key: &str, reference: &str) -> Self {
        self.manifest
            .entry_points
            .insert(key.to_string(), reference.to_string());
        self
    }

    /// Build the manifest
    pub fn build(self) -> PluginManifest {
        self.manifest
    }
}
