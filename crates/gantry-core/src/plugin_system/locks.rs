use std::collections::HashMap;
use std::sync::{Arc, Mutex, PoisonError};

use log::debug;
use tokio::sync::{Mutex as TokioMutex, OwnedMutexGuard};

use crate::plugin_system::manifest::normalize_distribution_name;

/// Per-distribution-name serialization of mutating operations.
///
/// A second caller for the same name queues behind the first (tokio's mutex
/// is fair); callers for different names never wait on each other. Names
/// are normalized, so spelling variants of one plugin share a lock.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<String, Arc<TokioMutex<()>>>>,
}

/// Held for the duration of one mutating operation.
#[derive(Debug)]
pub struct KeyGuard {
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyGuard {
    pub fn key(&self) -> &str {
        &self.key
    }
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Wait for exclusive access to `distribution_name`.
    pub async fn lock(&self, distribution_name: &str) -> KeyGuard {
        let key = normalize_distribution_name(distribution_name);
        let mutex = {
            let mut locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            // Drop entries nobody holds or waits on
            locks.retain(|_, m| Arc::strong_count(m) > 1);
            locks.entry(key.clone()).or_default().clone()
        };
        debug!("Waiting for lifecycle lock on '{}'", key);
        let guard = mutex.lock_owned().await;
        debug!("Acquired lifecycle lock on '{}'", key);
        KeyGuard { key, _guard: guard }
    }

    /// Number of names with a live lock entry
    pub fn active_keys(&self) -> usize {
        let locks = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        locks.values().filter(|m| Arc::strong_count(m) > 1).count()
    }
}
