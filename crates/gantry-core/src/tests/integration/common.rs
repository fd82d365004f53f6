#![cfg(test)]

use std::collections::{HashMap, HashSet};
use std::sync::atomic::{AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use async_trait::async_trait;

use crate::plugin_system::manager::DefaultPluginManager;
use crate::plugin_system::manifest::{CapabilityKind, ManifestBuilder};
use crate::plugin_system::registry::LoadedRegistry;
use crate::plugin_system::version::{ResolutionError, Vcs, VersionResolver};
use crate::storage::memory::MemoryInstallStore;
use crate::storage::InstallStore;

pub const REPO_A: &str = "https://git.example.com/acme/repo-a.git";
pub const REPO_B: &str = "https://git.example.com/acme/repo-b.git";
pub const REPO_C: &str = "https://git.example.com/acme/repo-c.git";

pub const RESOLVE_TIMEOUT: Duration = Duration::from_secs(5);
pub const FETCH_TIMEOUT: Duration = Duration::from_secs(5);

// ===== SCRIPTED VCS =====

#[derive(Debug, Default)]
struct Script {
    refs: HashMap<(String, String), String>,
    manifests: HashMap<(String, String), String>,
    unreachable: HashSet<String>,
    delays: HashMap<String, Duration>,
}

/// In-memory [`Vcs`] whose remote state tests move around by hand.
#[derive(Debug, Default)]
pub struct ScriptedVcs {
    script: Mutex<Script>,
    resolve_calls: AtomicUsize,
    fetch_calls: AtomicUsize,
}

impl ScriptedVcs {
    pub fn new() -> Arc<Self> {
        Arc::new(Self::default())
    }

    /// Point `git_ref` at `commit` and serve `manifest` at that commit.
    pub fn publish(&self, url: &str, git_ref: &str, commit: &str, manifest: &str) {
        self.set_ref(url, git_ref, commit);
        self.set_manifest(url, commit, manifest);
    }

    pub fn set_ref(&self, url: &str, git_ref: &str, commit: &str) {
        let mut script = self.script.lock().unwrap();
        script
            .refs
            .insert((url.to_string(), git_ref.to_string()), commit.to_string());
    }

    pub fn set_manifest(&self, url: &str, commit: &str, manifest: &str) {
        let mut script = self.script.lock().unwrap();
        script
            .manifests
            .insert((url.to_string(), commit.to_string()), manifest.to_string());
    }

    pub fn set_unreachable(&self, url: &str, unreachable: bool) {
        let mut script = self.script.lock().unwrap();
        if unreachable {
            script.unreachable.insert(url.to_string());
        } else {
            script.unreachable.remove(url);
        }
    }

    /// Every call for `url` sleeps this long before answering.
    pub fn set_delay(&self, url: &str, delay: Duration) {
        let mut script = self.script.lock().unwrap();
        script.delays.insert(url.to_string(), delay);
    }

    pub fn resolve_calls(&self) -> usize {
        self.resolve_calls.load(Ordering::SeqCst)
    }

    pub fn fetch_calls(&self) -> usize {
        self.fetch_calls.load(Ordering::SeqCst)
    }

    fn delay_for(&self, url: &str) -> Option<Duration> {
        self.script.lock().unwrap().delays.get(url).copied()
    }

    fn is_unreachable(&self, url: &str) -> bool {
        self.script.lock().unwrap().unreachable.contains(url)
    }
}

#[async_trait]
impl Vcs for ScriptedVcs {
    async fn resolve(&self, repository_url: &str, git_ref: &str) -> Result<String, ResolutionError> {
        self.resolve_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay_for(repository_url) {
            tokio::time::sleep(delay).await;
        }
        if self.is_unreachable(repository_url) {
            return Err(ResolutionError::Unreachable {
                repository_url: repository_url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let script = self.script.lock().unwrap();
        script
            .refs
            .get(&(repository_url.to_string(), git_ref.to_string()))
            .cloned()
            .ok_or_else(|| ResolutionError::RefNotFound {
                repository_url: repository_url.to_string(),
                git_ref: git_ref.to_string(),
            })
    }

    async fn fetch_manifest(
        &self,
        repository_url: &str,
        commit: &str,
        path: &str,
    ) -> Result<String, ResolutionError> {
        self.fetch_calls.fetch_add(1, Ordering::SeqCst);
        if let Some(delay) = self.delay_for(repository_url) {
            tokio::time::sleep(delay).await;
        }
        if self.is_unreachable(repository_url) {
            return Err(ResolutionError::Unreachable {
                repository_url: repository_url.to_string(),
                reason: "connection refused".to_string(),
            });
        }
        let script = self.script.lock().unwrap();
        script
            .manifests
            .get(&(repository_url.to_string(), commit.to_string()))
            .cloned()
            .ok_or_else(|| ResolutionError::ManifestUnavailable {
                repository_url: repository_url.to_string(),
                commit: commit.to_string(),
                path: path.to_string(),
                reason: "no such file".to_string(),
            })
    }
}

// ===== FIXTURES =====

/// TOML manifest declaring `name` with the given entry points.
pub fn manifest(name: &str, entry_points: &[(&str, &str)]) -> String {
    entry_points
        .iter()
        .fold(ManifestBuilder::new(name).version("1.0.0"), |builder, (key, target)| {
            builder.entry_point(key, target)
        })
        .build()
        .to_toml()
        .expect("manifest serializes")
}

/// A manifest with a single UI entry point.
pub fn ui_manifest(name: &str) -> String {
    manifest(name, &[(CapabilityKind::UiRoute.entry_point_key(), "plugin.ui:tab")])
}

pub fn resolver(vcs: &Arc<ScriptedVcs>) -> VersionResolver {
    VersionResolver::new(vcs.clone(), RESOLVE_TIMEOUT, FETCH_TIMEOUT)
}

pub fn manager_with(vcs: &Arc<ScriptedVcs>, store: Arc<dyn InstallStore>) -> DefaultPluginManager {
    DefaultPluginManager::new(store, Arc::new(LoadedRegistry::empty()), resolver(vcs), 4)
}

/// Scripted VCS, offline-capable memory store and a manager over both.
pub fn setup() -> (Arc<ScriptedVcs>, Arc<MemoryInstallStore>, DefaultPluginManager) {
    let vcs = ScriptedVcs::new();
    let store = Arc::new(MemoryInstallStore::new());
    let manager = manager_with(&vcs, store.clone());
    (vcs, store, manager)
}

/// The fixture repositories used across scenarios:
/// repo-a declares no recognized entry point, repo-b is a well-formed
/// plugin whose `v1.0` tag points at `abc123`.
pub fn publish_fixture_repos(vcs: &ScriptedVcs) {
    vcs.publish(REPO_A, "main", "aaa111", &manifest("repo-a", &[]));
    vcs.publish(REPO_B, "v1.0", "abc123", &ui_manifest("repo-b"));
}
