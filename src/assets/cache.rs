use std::collections::{BTreeMap, HashMap};
use std::fmt::{Debug, Formatter};
use std::ops::Deref;
use std::sync::{Arc, PoisonError, RwLock, RwLockReadGuard, RwLockWriteGuard};

use log::{debug, trace, warn};

use crate::assets::error::IngestError;

/// Immutable bytes of a finished container. Cloning is cheap, the bytes are shared.
#[derive(Clone, PartialEq, Eq)]
pub struct AssetHandle(Arc<[u8]>);

impl AssetHandle {
    pub fn new(bytes: Vec<u8>) -> Self {
        Self(bytes.into())
    }

    pub fn as_bytes(&self) -> &[u8] {
        &self.0
    }

    /// Whether both handles share the same allocation, not just equal bytes.
    pub fn ptr_eq(this: &AssetHandle, other: &AssetHandle) -> bool {
        Arc::ptr_eq(&this.0, &other.0)
    }
}

impl Deref for AssetHandle {
    type Target = [u8];

    fn deref(&self) -> &Self::Target {
        &self.0
    }
}

impl From<Vec<u8>> for AssetHandle {
    fn from(bytes: Vec<u8>) -> Self {
        Self::new(bytes)
    }
}

impl Debug for AssetHandle {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AssetHandle([{}])", self.0.len())
    }
}

#[derive(Debug, Copy, Clone, PartialEq, Eq)]
pub struct CacheStats {
    pub entries: usize,
    pub total_bytes: usize,
    pub budget_bytes: usize,
}

pub type EvictionListener = Box<dyn Fn(&str, &AssetHandle) + Send + Sync>;

struct CacheEntry {
    handle: AssetHandle,
    inserted_at: u64,
    size_bytes: usize,
}

#[derive(Default)]
struct CacheState {
    entries: HashMap<String, CacheEntry>,
    /// inserted_at -> key, the first entry is the next one to evict
    order: BTreeMap<u64, String>,
    total_bytes: usize,
    next_sequence: u64,
}

impl CacheState {
    fn take(&mut self, key: &str) -> Option<CacheEntry> {
        let entry = self.entries.remove(key)?;
        self.order.remove(&entry.inserted_at);
        self.total_bytes -= entry.size_bytes;
        Some(entry)
    }

    fn take_oldest(&mut self) -> Option<(String, CacheEntry)> {
        let (_, key) = self.order.pop_first()?;
        let entry = self.entries.remove(&key)?;
        self.total_bytes -= entry.size_bytes;
        Some((key, entry))
    }
}

/// Finished containers keyed by source file name, bounded by the sum of their sizes. Eviction
/// is by insertion order: reads don't refresh an entry.
pub struct AssetCache {
    budget_bytes: usize,
    state: RwLock<CacheState>,
    on_evict: Option<EvictionListener>,
}

impl AssetCache {
    pub fn new(budget_bytes: usize) -> Self {
        Self {
            budget_bytes,
            state: RwLock::new(CacheState::default()),
            on_evict: None,
        }
    }

    /// Called outside the lock for every handle the cache lets go of, except for explicit
    /// [`AssetCache::remove`]s which hand the handle back to the caller.
    pub fn on_evict(mut self, listener: impl Fn(&str, &AssetHandle) + Send + Sync + 'static) -> Self {
        self.on_evict = Some(Box::new(listener));
        self
    }

    pub fn budget_bytes(&self) -> usize {
        self.budget_bytes
    }

    // A panic inside the critical section can't leave the bookkeeping half updated, so a
    // poisoned lock is still usable.
    fn read(&self) -> RwLockReadGuard<'_, CacheState> {
        self.state.read().unwrap_or_else(PoisonError::into_inner)
    }

    fn write(&self) -> RwLockWriteGuard<'_, CacheState> {
        self.state.write().unwrap_or_else(PoisonError::into_inner)
    }

    pub fn get(&self, key: &str) -> Option<AssetHandle> {
        self.read().entries.get(key).map(|entry| entry.handle.clone())
    }

    pub fn contains(&self, key: &str) -> bool {
        self.read().entries.contains_key(key)
    }

    /// Inserts `handle` under `key`, replacing an existing entry of that key first. Older entries
    /// are evicted until the new one fits; an entry larger than the whole budget is still stored
    /// once everything else is gone.
    pub fn put(&self, key: &str, handle: AssetHandle, size_bytes: usize) {
        let mut released = Vec::new();

        {
            let mut state = self.write();

            if let Some(previous) = state.take(key) {
                trace!("Replacing cached {} ({} bytes)", key, previous.size_bytes);
                released.push((key.to_string(), previous.handle));
            }

            while state.total_bytes.saturating_add(size_bytes) > self.budget_bytes {
                let Some((evicted_key, evicted)) = state.take_oldest() else {
                    break;
                };
                debug!(
                    "Evicting {} ({} bytes) to make room for {} ({} bytes)",
                    evicted_key, evicted.size_bytes, key, size_bytes
                );
                released.push((evicted_key, evicted.handle));
            }

            if size_bytes > self.budget_bytes {
                warn!(
                    "{} ({} bytes) alone exceeds the cache budget of {} bytes",
                    key, size_bytes, self.budget_bytes
                );
            }

            let inserted_at = state.next_sequence;
            state.next_sequence += 1;
            state.order.insert(inserted_at, key.to_string());
            state.entries.insert(
                key.to_string(),
                CacheEntry {
                    handle,
                    inserted_at,
                    size_bytes,
                },
            );
            state.total_bytes += size_bytes;
        }

        self.notify(released);
    }

    pub fn remove(&self, key: &str) -> Option<AssetHandle> {
        self.write().take(key).map(|entry| entry.handle)
    }

    pub fn clear(&self) {
        let released = {
            let mut state = self.write();
            let mut released = Vec::with_capacity(state.entries.len());
            while let Some((key, entry)) = state.take_oldest() {
                released.push((key, entry.handle));
            }
            released
        };

        debug!("Cleared {} cached assets", released.len());
        self.notify(released);
    }

    pub fn stats(&self) -> CacheStats {
        let state = self.read();
        CacheStats {
            entries: state.entries.len(),
            total_bytes: state.total_bytes,
            budget_bytes: self.budget_bytes,
        }
    }

    /// Checks that the tracked total matches the entries and that the insertion order covers
    /// exactly the live entries.
    pub fn verify(&self) -> Result<(), IngestError> {
        let state = self.read();
        let actual: usize = state.entries.values().map(|entry| entry.size_bytes).sum();
        let ordered = state.order.len() == state.entries.len()
            && state
                .order
                .iter()
                .all(|(sequence, key)| state.entries.get(key).is_some_and(|entry| entry.inserted_at == *sequence));

        if actual != state.total_bytes || !ordered {
            return Err(IngestError::CacheInvariant {
                tracked: state.total_bytes,
                actual,
            });
        }
        Ok(())
    }

    fn notify(&self, released: Vec<(String, AssetHandle)>) {
        if let Some(listener) = &self.on_evict {
            for (key, handle) in &released {
                listener(key, handle);
            }
        }
    }
}

impl Debug for AssetCache {
    fn fmt(&self, f: &mut Formatter<'_>) -> std::fmt::Result {
        write!(f, "AssetCache({:?})", self.stats())
    }
}
