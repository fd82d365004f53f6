use std::collections::HashSet;

use log::warn;
use serde::{Deserialize, Serialize};

use crate::plugin_system::manifest::CapabilityKind;
use crate::plugin_system::record::PluginRecord;

/// What the running process exposes about one loaded plugin.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct LoadedPluginView {
    pub name: String,
    pub version: String,
}

/// One capability a loaded plugin wired into the host.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum Capability {
    UiRoute { plugin: String, target: String },
    ApiRoute { plugin: String, target: String },
    Tool { plugin: String, target: String },
}

impl Capability {
    pub fn new(kind: CapabilityKind, plugin: impl Into<String>, target: impl Into<String>) -> Self {
        let plugin = plugin.into();
        let target = target.into();
        match kind {
            CapabilityKind::UiRoute => Capability::UiRoute { plugin, target },
            CapabilityKind::ApiRoute => Capability::ApiRoute { plugin, target },
            CapabilityKind::Tool => Capability::Tool { plugin, target },
        }
    }

    pub fn kind(&self) -> CapabilityKind {
        match self {
            Capability::UiRoute { .. } => CapabilityKind::UiRoute,
            Capability::ApiRoute { .. } => CapabilityKind::ApiRoute,
            Capability::Tool { .. } => CapabilityKind::Tool,
        }
    }

    pub fn plugin(&self) -> &str {
        match self {
            Capability::UiRoute { plugin, .. }
            | Capability::ApiRoute { plugin, .. }
            | Capability::Tool { plugin, .. } => plugin,
        }
    }

    pub fn target(&self) -> &str {
        match self {
            Capability::UiRoute { target, .. }
            | Capability::ApiRoute { target, .. }
            | Capability::Tool { target, .. } => target,
        }
    }
}

/// A plugin active in this process, with its wired capabilities.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct LoadedPlugin {
    pub name: String,
    pub version: String,
    pub capabilities: Vec<Capability>,
}

impl LoadedPlugin {
    pub fn new(name: impl Into<String>, version: impl Into<String>) -> Self {
        Self {
            name: name.into(),
            version: version.into(),
            capabilities: Vec::new(),
        }
    }

    pub fn with_capability(mut self, kind: CapabilityKind, target: impl Into<String>) -> Self {
        let capability = Capability::new(kind, self.name.clone(), target);
        self.capabilities.push(capability);
        self
    }

    /// Wire a record's recognized entry points. Unrecognized keys are skipped.
    pub fn from_record(record: &PluginRecord) -> Self {
        let mut plugin = LoadedPlugin::new(&record.distribution_name, record.short_commit());
        for (key, target) in &record.entry_points {
            if let Some(kind) = CapabilityKind::from_entry_point_key(key) {
                plugin = plugin.with_capability(kind, target.clone());
            }
        }
        plugin
    }

    pub fn view(&self) -> LoadedPluginView {
        LoadedPluginView {
            name: self.name.clone(),
            version: self.version.clone(),
        }
    }
}

/// Snapshot of the plugins loaded at process start.
///
/// Built once during bootstrap and never mutated afterwards; changes to the
/// install store only show up here after a restart.
#[derive(Debug, Clone, Default)]
pub struct LoadedRegistry {
    plugins: Vec<LoadedPlugin>,
}

impl LoadedRegistry {
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn builder() -> LoadedRegistryBuilder {
        LoadedRegistryBuilder::default()
    }

    /// Registry as a bootstrap that loads every installed record would build it.
    pub fn from_records(records: &[PluginRecord]) -> Self {
        records
            .iter()
            .fold(Self::builder(), |builder, record| builder.plugin(LoadedPlugin::from_record(record)))
            .build()
    }

    pub fn list(&self) -> Vec<LoadedPluginView> {
        self.plugins.iter().map(LoadedPlugin::view).collect()
    }

    pub fn get(&self, name: &str) -> Option<&LoadedPlugin> {
        self.plugins.iter().find(|p| p.name == name)
    }

    pub fn contains(&self, name: &str) -> bool {
        self.get(name).is_some()
    }

    /// All wired capabilities of one kind, in load order
    pub fn capabilities(&self, kind: CapabilityKind) -> impl Iterator<Item = &Capability> {
        self.plugins
            .iter()
            .flat_map(|p| p.capabilities.iter())
            .filter(move |c| c.kind() == kind)
    }

    pub fn len(&self) -> usize {
        self.plugins.len()
    }

    pub fn is_empty(&self) -> bool {
        self.plugins.is_empty()
    }
}

/// Collects plugins during bootstrap
#[derive(Debug, Default)]
pub struct LoadedRegistryBuilder {
    plugins: Vec<LoadedPlugin>,
    seen: HashSet<String>,
}

impl LoadedRegistryBuilder {
    /// Register a plugin. A later registration under the same name replaces
    /// the earlier one in place.
    pub fn plugin(mut self, plugin: LoadedPlugin) -> Self {
        if self.seen.insert(plugin.name.clone()) {
            self.plugins.push(plugin);
        } else {
            warn!("Plugin '{}' registered twice; keeping the later registration", plugin.name);
            if let Some(existing) = self.plugins.iter_mut().find(|p| p.name == plugin.name) {
                *existing = plugin;
            }
        }
        self
    }

    pub fn build(self) -> LoadedRegistry {
        LoadedRegistry { plugins: self.plugins }
    }
}
