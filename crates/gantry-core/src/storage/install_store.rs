use std::fmt::{self, Debug};
use std::path::{Path, PathBuf};
use std::sync::{Arc, PoisonError, RwLock};

use log::debug;
use serde::{Deserialize, Serialize};

use crate::kernel::constants::{DEFAULT_STORE_FILE, STORE_SCHEMA_VERSION};
use crate::kernel::error::{Error, Result};
use crate::plugin_system::record::PluginRecord;
use crate::storage::error::StorageSystemError;
use crate::storage::local::LocalStorageProvider;
use crate::storage::provider::StorageProvider;

/// Durable record store keyed by distribution name.
///
/// The store is the only owner of on-disk truth about what is installed.
/// Every operation fails with a store-unavailable error when the medium
/// cannot be reached; an unreachable store is never reported as empty.
pub trait InstallStore: Send + Sync + Debug {
    /// Insert or atomically replace the record for `record.distribution_name`.
    /// A replaced record keeps its position in [`InstallStore::list`].
    fn put(&self, record: PluginRecord) -> Result<()>;

    fn get(&self, distribution_name: &str) -> Result<Option<PluginRecord>>;

    /// Remove a record, returning whether one existed.
    fn delete(&self, distribution_name: &str) -> Result<bool>;

    /// All records in insertion order.
    fn list(&self) -> Result<Vec<PluginRecord>>;
}

/// On-disk layout of the install store.
#[derive(Debug, Clone, Serialize, Deserialize)]
struct StoreDocument {
    schema_version: u32,
    #[serde(default)]
    plugins: Vec<PluginRecord>,
}

impl Default for StoreDocument {
    fn default() -> Self {
        Self {
            schema_version: STORE_SCHEMA_VERSION,
            plugins: Vec::new(),
        }
    }
}

/// Install store persisted as a single JSON document.
///
/// Every mutation rewrites the whole document through the provider's atomic
/// temp-file-and-rename write, so a crash mid-write leaves the previous
/// document intact. Readers share the lock; a writer holds it exclusively
/// only for the read-modify-write of the document itself. Serialising whole
/// lifecycle operations per distribution name is the plugin manager's job.
pub struct FileInstallStore {
    provider: Arc<dyn StorageProvider>,
    file: PathBuf,
    lock: RwLock<()>,
}

impl FileInstallStore {
    /// Open (creating the directory if needed) a store under `data_dir`.
    pub fn open(data_dir: impl Into<PathBuf>) -> Result<Self> {
        Self::open_with_file(data_dir, DEFAULT_STORE_FILE)
    }

    pub fn open_with_file(data_dir: impl Into<PathBuf>, file: impl Into<PathBuf>) -> Result<Self> {
        let provider = LocalStorageProvider::new(data_dir.into());
        provider.create_dir_all(Path::new(""))?;
        Ok(Self::with_provider(Arc::new(provider), file))
    }

    /// Build a store over an existing provider without touching the medium.
    pub fn with_provider(provider: Arc<dyn StorageProvider>, file: impl Into<PathBuf>) -> Self {
        Self {
            provider,
            file: file.into(),
            lock: RwLock::new(()),
        }
    }

    /// Full path of the backing document, for diagnostics.
    pub fn path(&self) -> PathBuf {
        self.provider.root().join(&self.file)
    }

    fn load(&self) -> Result<StoreDocument> {
        if !self.provider.is_dir(Path::new("")) {
            return Err(StorageSystemError::unavailable(
                self.provider.root(),
                "data directory does not exist",
            )
            .into());
        }
        if !self.provider.exists(&self.file) {
            return Ok(StoreDocument::default());
        }
        let contents = self.provider.read_to_string(&self.file)?;
        if contents.trim().is_empty() {
            return Ok(StoreDocument::default());
        }
        let document: StoreDocument = serde_json::from_str(&contents).map_err(|source| {
            StorageSystemError::Corrupt {
                path: self.path(),
                source,
            }
        })?;
        if document.schema_version > STORE_SCHEMA_VERSION {
            return Err(StorageSystemError::unavailable(
                self.path(),
                format!(
                    "document schema version {} is newer than supported version {}",
                    document.schema_version, STORE_SCHEMA_VERSION
                ),
            )
            .into());
        }
        Ok(document)
    }

    fn save(&self, document: &StoreDocument) -> Result<()> {
        let contents = serde_json::to_string_pretty(document).map_err(|e| {
            Error::StorageSystem(StorageSystemError::SerializationError {
                format: "json".to_string(),
                source: Box::new(e),
            })
        })?;
        self.provider.write_string(&self.file, &contents)?;
        debug!("Wrote {} install record(s) to {}", document.plugins.len(), self.path().display());
        Ok(())
    }
}

impl InstallStore for FileInstallStore {
    fn put(&self, record: PluginRecord) -> Result<()> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.load()?;
        match document
            .plugins
            .iter_mut()
            .find(|existing| existing.distribution_name == record.distribution_name)
        {
            Some(existing) => *existing = record,
            None => document.plugins.push(record),
        }
        self.save(&document)
    }

    fn get(&self, distribution_name: &str) -> Result<Option<PluginRecord>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        let document = self.load()?;
        Ok(document
            .plugins
            .into_iter()
            .find(|record| record.distribution_name == distribution_name))
    }

    fn delete(&self, distribution_name: &str) -> Result<bool> {
        let _guard = self.lock.write().unwrap_or_else(PoisonError::into_inner);
        let mut document = self.load()?;
        let before = document.plugins.len();
        document
            .plugins
            .retain(|record| record.distribution_name != distribution_name);
        if document.plugins.len() == before {
            return Ok(false);
        }
        self.save(&document)?;
        Ok(true)
    }

    fn list(&self) -> Result<Vec<PluginRecord>> {
        let _guard = self.lock.read().unwrap_or_else(PoisonError::into_inner);
        Ok(self.load()?.plugins)
    }
}

impl fmt::Debug for FileInstallStore {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("FileInstallStore")
            .field("provider", &self.provider)
            .field("file", &self.file)
            .finish_non_exhaustive()
    }
}
