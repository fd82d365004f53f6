use std::sync::Arc;

use crate::api::PluginApi;
use crate::kernel::component::KernelComponent;
use crate::kernel::constants;
use crate::kernel::error::{Error, KernelLifecyclePhase, Result};
use crate::plugin_system::git::GitCommandVcs;
use crate::plugin_system::manager::DefaultPluginManager;
use crate::plugin_system::registry::LoadedRegistry;
use crate::plugin_system::version::{Vcs, VersionResolver};
use crate::storage::{FileInstallStore, InstallStore, ManagerConfig};

/// Process-level wiring: every collaborator is built here once and injected.
///
/// The loaded registry is snapshotted from the install store at bootstrap
/// and stays fixed for the life of the process.
pub struct Application {
    config: ManagerConfig,
    store: Arc<dyn InstallStore>,
    loaded: Arc<LoadedRegistry>,
    plugin_manager: Arc<DefaultPluginManager>,
    initialized: bool,
}

impl Application {
    /// Bootstrap with the git command-line VCS.
    pub fn new(config: ManagerConfig) -> Result<Self> {
        let vcs = Arc::new(GitCommandVcs::new(config.git_binary.clone()));
        Self::with_vcs(config, vcs)
    }

    /// Bootstrap with a file-backed store under `config.data_dir` and the given VCS.
    pub fn with_vcs(config: ManagerConfig, vcs: Arc<dyn Vcs>) -> Result<Self> {
        log::info!("Initializing {} v{}", constants::APP_NAME, constants::APP_VERSION);
        config.validate().map_err(|e| bootstrap_error("Invalid configuration", e))?;

        let store = FileInstallStore::open_with_file(config.data_dir.clone(), config.store_file.clone())
            .map_err(|e| bootstrap_error("Could not open install store", e))?;
        log::info!("Using install store: {}", store.path().display());
        let store: Arc<dyn InstallStore> = Arc::new(store);

        let resolver = VersionResolver::new(vcs, config.resolve_timeout(), config.fetch_timeout())
            .with_manifest_path(config.manifest_path.clone());
        Self::with_components(config, store, resolver)
    }

    /// Bootstrap over an already-built store and resolver.
    pub fn with_components(config: ManagerConfig, store: Arc<dyn InstallStore>, resolver: VersionResolver) -> Result<Self> {
        let records = store
            .list()
            .map_err(|e| bootstrap_error("Could not read installed plugins", e))?;
        let loaded = Arc::new(LoadedRegistry::from_records(&records));
        log::info!("Loaded {} plugin(s) at startup", loaded.len());

        let plugin_manager = Arc::new(DefaultPluginManager::new(
            Arc::clone(&store),
            Arc::clone(&loaded),
            resolver,
            config.max_concurrent_checks,
        ));

        Ok(Self {
            config,
            store,
            loaded,
            plugin_manager,
            initialized: false,
        })
    }

    /// Run the `initialize` and `start` phases of the kernel components.
    pub async fn initialize(&mut self) -> Result<()> {
        if self.initialized {
            return Err(Error::KernelLifecycleError {
                phase: KernelLifecyclePhase::Initialize,
                component_name: None,
                message: "Application already initialized".to_string(),
                source: None,
            });
        }
        let component = self.plugin_manager.as_ref();
        log::debug!("Initializing component: {}", component.name());
        component
            .initialize()
            .await
            .map_err(|e| lifecycle_error(KernelLifecyclePhase::Initialize, component.name(), e))?;
        log::debug!("Starting component: {}", component.name());
        component
            .start()
            .await
            .map_err(|e| lifecycle_error(KernelLifecyclePhase::Start, component.name(), e))?;
        self.initialized = true;
        Ok(())
    }

    /// Stop the kernel components.
    pub async fn shutdown(&mut self) -> Result<()> {
        if !self.initialized {
            return Ok(());
        }
        let component = self.plugin_manager.as_ref();
        log::debug!("Stopping component: {}", component.name());
        component
            .stop()
            .await
            .map_err(|e| lifecycle_error(KernelLifecyclePhase::Shutdown, component.name(), e))?;
        self.initialized = false;
        Ok(())
    }

    /// Returns whether the application has been initialized.
    pub fn is_initialized(&self) -> bool {
        self.initialized
    }

    pub fn config(&self) -> &ManagerConfig {
        &self.config
    }

    pub fn store(&self) -> Arc<dyn InstallStore> {
        Arc::clone(&self.store)
    }

    pub fn loaded_registry(&self) -> Arc<LoadedRegistry> {
        Arc::clone(&self.loaded)
    }

    pub fn plugin_manager(&self) -> Arc<DefaultPluginManager> {
        Arc::clone(&self.plugin_manager)
    }

    /// Transport-agnostic request/response facade over the plugin manager.
    pub fn api(&self) -> PluginApi {
        PluginApi::new(self.plugin_manager())
    }
}

fn bootstrap_error(message: &str, source: Error) -> Error {
    Error::KernelLifecycleError {
        phase: KernelLifecyclePhase::Bootstrap,
        component_name: None,
        message: format!("{}: {}", message, source),
        source: Some(Box::new(source)),
    }
}

fn lifecycle_error(phase: KernelLifecyclePhase, component: &str, source: Error) -> Error {
    Error::KernelLifecycleError {
        phase,
        component_name: Some(component.to_string()),
        message: format!("Component {} failed: {}", component, source),
        source: Some(Box::new(source)),
    }
}
