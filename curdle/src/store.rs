//! Named stores and their entries.
//!
//! A [`CacheStore`] maps cache keys to entries for one store name. Each
//! [`CacheEntry`] owns, by composition, the two pieces of shared mutable
//! state in the system:
//!
//! - a load lock (`tokio::sync::Mutex`) serializing loaders for that entry —
//!   the only blocking point in the design;
//! - a slot (`parking_lot::RwLock`) holding value and expiry, always
//!   published together so readers never observe a half-written entry.
//!
//! A freshly created entry carries `expiry = now`, i.e. it is born expired;
//! only a publish under the load lock makes it visible.
//!
//! Stores may carry an optional entry bound. When the bound is exceeded the
//! oldest non-locked entries are dropped — the explicit replacement for
//! GC-cooperative soft references: bounded memory, with reclaimed entries
//! indistinguishable from expired ones.

use std::collections::HashSet;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;
use std::time::{Duration, Instant};

use dashmap::DashMap;
use parking_lot::RwLock;
use tokio::sync::{Mutex, MutexGuard};
use tracing::debug;

use crate::key::CacheKey;
use crate::provider::CachedObject;

/// What a slot currently holds.
pub(crate) enum SlotValue {
    /// Nothing published yet (or the value was dropped).
    Vacant,
    /// A cached empty result, served as empty until expiry.
    Empty,
    /// A cached value.
    Object(CachedObject),
}

struct Slot {
    value: SlotValue,
    expiry: Instant,
}

/// Result of reading an entry's slot.
pub(crate) enum Lookup {
    /// No usable value: vacant, expired or reclaimed.
    Miss,
    /// A live cached-empty result.
    Empty,
    /// A live value.
    Value(CachedObject),
}

/// One TTL-stamped cache slot with load coordination.
pub struct CacheEntry {
    load_lock: Mutex<()>,
    slot: RwLock<Slot>,
    /// Milliseconds since store creation at last access; eviction order.
    last_access: AtomicU64,
}

impl CacheEntry {
    fn new() -> Self {
        Self {
            load_lock: Mutex::new(()),
            slot: RwLock::new(Slot {
                value: SlotValue::Vacant,
                // Born expired; only a publish makes the entry visible.
                expiry: Instant::now(),
            }),
            last_access: AtomicU64::new(0),
        }
    }

    /// Read the slot. Expired entries are misses regardless of content.
    pub(crate) fn lookup(&self) -> Lookup {
        let slot = self.slot.read();
        if slot.expiry < Instant::now() {
            return Lookup::Miss;
        }
        match &slot.value {
            SlotValue::Vacant => Lookup::Miss,
            SlotValue::Empty => Lookup::Empty,
            SlotValue::Object(obj) => Lookup::Value(Arc::clone(obj)),
        }
    }

    /// Publish a value and its expiry together.
    pub(crate) fn publish(&self, value: SlotValue, ttl: Duration) {
        let mut slot = self.slot.write();
        slot.value = value;
        slot.expiry = Instant::now() + ttl;
    }

    /// Acquire the load lock. Callers bound the wait with a timeout.
    pub(crate) async fn lock(&self) -> MutexGuard<'_, ()> {
        self.load_lock.lock().await
    }

    /// Whether a load is currently in flight for this entry.
    pub(crate) fn is_locked(&self) -> bool {
        self.load_lock.try_lock().is_err()
    }

    fn is_expired(&self) -> bool {
        self.slot.read().expiry < Instant::now()
    }
}

/// A named collection of cache entries.
pub struct CacheStore {
    name: String,
    entries: DashMap<CacheKey, Arc<CacheEntry>>,
    max_entries: Option<usize>,
    epoch: Instant,
}

impl CacheStore {
    /// Create an empty store. `max_entries` bounds the entry count; `None`
    /// disables the capacity trigger.
    pub(crate) fn new(name: impl Into<String>, max_entries: Option<usize>) -> Self {
        Self {
            name: name.into(),
            entries: DashMap::new(),
            max_entries,
            epoch: Instant::now(),
        }
    }

    pub(crate) fn name(&self) -> &str {
        &self.name
    }

    /// Entry for `key`, created empty on first miss. Concurrent creation
    /// converges on one entry instance.
    pub(crate) fn entry(&self, key: &CacheKey) -> Arc<CacheEntry> {
        let entry = self
            .entries
            .entry(key.clone())
            .or_insert_with(|| Arc::new(CacheEntry::new()))
            .clone();
        self.touch(&entry);
        entry
    }

    /// Entry for `key` if one exists; never creates.
    pub(crate) fn peek(&self, key: &CacheKey) -> Option<Arc<CacheEntry>> {
        let entry = self.entries.get(key).map(|e| Arc::clone(e.value()))?;
        self.touch(&entry);
        Some(entry)
    }

    pub(crate) fn remove(&self, key: &CacheKey) {
        self.entries.remove(key);
    }

    pub(crate) fn clear(&self) {
        self.entries.clear();
    }

    pub(crate) fn len(&self) -> usize {
        self.entries.len()
    }

    /// Live keys, purging expired non-locked entries first.
    ///
    /// Returns the remaining key set and the number of entries purged.
    /// Locked entries are skipped — they are being reloaded anyway.
    pub(crate) fn keys_with_purge(&self) -> (HashSet<CacheKey>, u64) {
        let stale: Vec<CacheKey> = self
            .entries
            .iter()
            .filter(|kv| kv.value().is_expired() && !kv.value().is_locked())
            .map(|kv| kv.key().clone())
            .collect();
        let purged = stale.len() as u64;
        for key in stale {
            self.entries.remove(&key);
        }
        let keys = self.entries.iter().map(|kv| kv.key().clone()).collect();
        (keys, purged)
    }

    /// Drop the oldest non-locked entries until the store is within its
    /// bound. Returns the number of entries dropped.
    pub(crate) fn evict_over_limit(&self) -> u64 {
        let Some(max) = self.max_entries else {
            return 0;
        };
        let excess = self.entries.len().saturating_sub(max);
        if excess == 0 {
            return 0;
        }

        let mut candidates: Vec<(CacheKey, u64)> = self
            .entries
            .iter()
            .filter(|kv| !kv.value().is_locked())
            .map(|kv| {
                (
                    kv.key().clone(),
                    kv.value().last_access.load(Ordering::Relaxed),
                )
            })
            .collect();
        candidates.sort_by_key(|(_, stamp)| *stamp);

        let mut dropped = 0u64;
        for (key, _) in candidates.into_iter().take(excess) {
            self.entries.remove(&key);
            dropped += 1;
        }
        if dropped > 0 {
            debug!(store = %self.name, dropped, "Dropped entries over capacity bound");
        }
        dropped
    }

    fn touch(&self, entry: &CacheEntry) {
        let stamp = self.epoch.elapsed().as_millis() as u64;
        entry.last_access.store(stamp, Ordering::Relaxed);
    }
}
