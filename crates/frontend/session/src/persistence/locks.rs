use std::collections::HashMap;
use std::path::{Path, PathBuf};
use std::sync::{Arc, Mutex, PoisonError};

/// One mutex per file path.
///
/// Reads and writes of the same file are serialized; different files never
/// contend beyond the brief map lookup. Entries live only while some caller
/// holds or waits on them.
#[derive(Debug, Default)]
pub struct KeyedLocks {
    locks: Mutex<HashMap<PathBuf, Arc<Mutex<()>>>>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    /// Run `f` while holding the lock for `key`.
    pub fn with_lock<R>(&self, key: &Path, f: impl FnOnce() -> R) -> R {
        let lock = {
            let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
            Arc::clone(map.entry(key.to_path_buf()).or_default())
        };
        let result = {
            let _guard = lock.lock().unwrap_or_else(PoisonError::into_inner);
            f()
        };
        drop(lock);
        self.evict_idle(key);
        result
    }

    // Clones are only taken under the map lock, so a count of one here means
    // nobody else is using the entry.
    fn evict_idle(&self, key: &Path) {
        let mut map = self.locks.lock().unwrap_or_else(PoisonError::into_inner);
        if map.get(key).is_some_and(|lock| Arc::strong_count(lock) == 1) {
            map.remove(key);
        }
    }

    /// Number of keys currently locked or waited on.
    pub fn len(&self) -> usize {
        self.locks
            .lock()
            .unwrap_or_else(PoisonError::into_inner)
            .len()
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }
}
