//! Per-`repo#number` exclusive locks.
//!
//! Entries are created on demand and removed when the last holder drops its
//! guard, so the registry never grows with dead keys.

use std::collections::HashMap;
use std::sync::{Arc, Mutex};

use tokio::sync::{Mutex as AsyncMutex, OwnedMutexGuard};

#[derive(Default)]
struct Registry {
    entries: Mutex<HashMap<String, (Arc<AsyncMutex<()>>, usize)>>,
}

#[derive(Clone, Default)]
/// Registry of per-key exclusive locks.
pub struct KeyedLocks {
    registry: Arc<Registry>,
}

/// Guard for one key; dropping it releases the lock and, when no other
/// holder remains, removes the registry entry.
pub struct KeyedLockGuard {
    registry: Arc<Registry>,
    key: String,
    _guard: OwnedMutexGuard<()>,
}

impl KeyedLocks {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn acquire(&self, key: &str) -> KeyedLockGuard {
        let lock = {
            let mut entries = lock_unpoisoned(&self.registry.entries);
            let (lock, holders) = entries
                .entry(key.to_string())
                .or_insert_with(|| (Arc::new(AsyncMutex::new(())), 0));
            *holders += 1;
            Arc::clone(lock)
        };
        let guard = lock.lock_owned().await;
        KeyedLockGuard {
            registry: Arc::clone(&self.registry),
            key: key.to_string(),
            _guard: guard,
        }
    }

    #[cfg(test)]
    fn registered_keys(&self) -> usize {
        lock_unpoisoned(&self.registry.entries).len()
    }
}

impl Drop for KeyedLockGuard {
    fn drop(&mut self) {
        let mut entries = lock_unpoisoned(&self.registry.entries);
        if let Some((_, holders)) = entries.get_mut(&self.key) {
            *holders = holders.saturating_sub(1);
            if *holders == 0 {
                entries.remove(&self.key);
            }
        }
    }
}

fn lock_unpoisoned<T>(mutex: &Mutex<T>) -> std::sync::MutexGuard<'_, T> {
    match mutex.lock() {
        Ok(guard) => guard,
        Err(poisoned) => poisoned.into_inner(),
    }
}
