use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{PoisonError, RwLock};

use crate::kernel::error::Result;
use crate::plugin_system::record::PluginRecord;
use crate::storage::error::StorageSystemError;
use crate::storage::install_store::InstallStore;

/// In-process install store.
///
/// Nothing survives the process; useful for embedding and for exercising the
/// manager against a store that can be switched offline.
#[derive(Debug)]
pub struct MemoryInstallStore {
    records: RwLock<Vec<PluginRecord>>,
    available: AtomicBool,
}

impl MemoryInstallStore {
    pub fn new() -> Self {
        Self {
            records: RwLock::new(Vec::new()),
            available: AtomicBool::new(true),
        }
    }

    /// Simulate the medium going away (or coming back).
    pub fn set_available(&self, available: bool) {
        self.available.store(available, Ordering::SeqCst);
    }

    fn ensure_available(&self) -> Result<()> {
        if self.available.load(Ordering::SeqCst) {
            Ok(())
        } else {
            Err(StorageSystemError::unavailable("<memory>", "memory store is offline").into())
        }
    }
}

impl Default for MemoryInstallStore {
    fn default() -> Self {
        Self::new()
    }
}

impl InstallStore for MemoryInstallStore {
    fn put(&self, record: PluginRecord) -> Result<()> {
        self.ensure_available()?;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        match records
            .iter_mut()
            .find(|existing| existing.distribution_name == record.distribution_name)
        {
            Some(existing) => *existing = record,
            None => records.push(record),
        }
        Ok(())
    }

    fn get(&self, distribution_name: &str) -> Result<Option<PluginRecord>> {
        self.ensure_available()?;
        let records = self.records.read().unwrap_or_else(PoisonError::into_inner);
        Ok(records
            .iter()
            .find(|record| record.distribution_name == distribution_name)
            .cloned())
    }

    fn delete(&self, distribution_name: &str) -> Result<bool> {
        self.ensure_available()?;
        let mut records = self.records.write().unwrap_or_else(PoisonError::into_inner);
        let before = records.len();
        records.retain(|record| record.distribution_name != distribution_name);
        Ok(records.len() != before)
    }

    fn list(&self) -> Result<Vec<PluginRecord>> {
        self.ensure_available()?;
        Ok(self.records.read().unwrap_or_else(PoisonError::into_inner).clone())
    }
}
