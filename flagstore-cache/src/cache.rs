//! Sharded flag cache.

use std::collections::hash_map::DefaultHasher;
use std::collections::HashMap;
use std::hash::{Hash, Hasher};
use std::sync::Arc;
use std::sync::atomic::{AtomicU64, AtomicUsize, Ordering};

use flagstore_core::FlagDefinition;
use lru::LruCache;
use parking_lot::Mutex;
use tracing::{debug, trace};

use crate::config::CacheConfig;
use crate::entry::CacheEntry;
use crate::error::CacheResult;

/// Result of [`FlagCache::put`].
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum PutOutcome {
    /// No entry was cached for the key.
    Inserted,
    /// An older version was replaced.
    Replaced,
    /// The same version is already cached; the first writer wins.
    Unchanged,
    /// The cache has seen a newer version of this key.
    Stale,
}

impl PutOutcome {
    pub fn is_applied(self) -> bool {
        matches!(self, Self::Inserted | Self::Replaced)
    }
}

/// Cache counters.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq)]
pub struct CacheStats {
    pub hits: u64,
    pub misses: u64,
    pub stale_rejections: u64,
    pub evictions: u64,
}

struct Slot {
    entry: Arc<CacheEntry>,
    // Global recency stamp; the smallest stamp across shards is the
    // least recently used entry in the whole cache.
    used: u64,
}

struct Shard {
    entries: LruCache<String, Slot>,
    // Newest version observed per key, kept across invalidate and eviction.
    high_water: HashMap<String, u64>,
}

impl Shard {
    fn new() -> Self {
        Self {
            entries: LruCache::unbounded(),
            high_water: HashMap::new(),
        }
    }

    fn oldest(&self) -> Option<(u64, String)> {
        self.entries
            .peek_lru()
            .map(|(key, slot)| (slot.used, key.clone()))
    }
}

#[derive(Default)]
struct Counters {
    hits: AtomicU64,
    misses: AtomicU64,
    stale_rejections: AtomicU64,
    evictions: AtomicU64,
}

/// In-memory store of flag definitions with monotonic per-key versions.
///
/// Lookups and writes lock only the shard that owns the key. The cache never
/// serves a version older than the newest one it has accepted for a key.
/// With `max_entries` set, the least recently used entries across all shards
/// are evicted once the bound is exceeded.
///
/// ```
/// use flagstore_cache::{FlagCache, PutOutcome};
/// use flagstore_core::FlagDefinition;
///
/// let cache = FlagCache::default();
/// let v2 = FlagDefinition::boolean("f", true).with_version(2);
/// let v1 = FlagDefinition::boolean("f", false).with_version(1);
///
/// assert_eq!(cache.put(v2), PutOutcome::Inserted);
/// assert_eq!(cache.put(v1), PutOutcome::Stale);
/// assert_eq!(cache.lookup("f").unwrap().definition.version, 2);
/// ```
pub struct FlagCache {
    shards: Box<[Mutex<Shard>]>,
    config: CacheConfig,
    counters: Counters,
    clock: AtomicU64,
    len: AtomicUsize,
    // Serializes eviction passes so concurrent writers do not over-evict.
    evicting: Mutex<()>,
}

impl FlagCache {
    pub fn new(config: CacheConfig) -> CacheResult<Self> {
        config.validate()?;
        Ok(Self::build(config))
    }

    fn build(config: CacheConfig) -> Self {
        let shards = (0..config.shards).map(|_| Mutex::new(Shard::new())).collect();

        Self {
            shards,
            config,
            counters: Counters::default(),
            clock: AtomicU64::new(0),
            len: AtomicUsize::new(0),
            evicting: Mutex::new(()),
        }
    }

    pub fn config(&self) -> &CacheConfig {
        &self.config
    }

    fn shard(&self, key: &str) -> &Mutex<Shard> {
        let mut hasher = DefaultHasher::new();
        key.hash(&mut hasher);
        let index = (hasher.finish() % self.shards.len() as u64) as usize;
        &self.shards[index]
    }

    fn tick(&self) -> u64 {
        self.clock.fetch_add(1, Ordering::Relaxed)
    }

    /// Get an entry, marking it most recently used.
    pub fn lookup(&self, key: &str) -> Option<Arc<CacheEntry>> {
        let used = self.tick();
        let found = self.shard(key).lock().entries.get_mut(key).map(|slot| {
            slot.used = used;
            Arc::clone(&slot.entry)
        });
        let counter = if found.is_some() {
            &self.counters.hits
        } else {
            &self.counters.misses
        };
        counter.fetch_add(1, Ordering::Relaxed);
        found
    }

    /// Get an entry without touching LRU order or counters.
    pub fn peek(&self, key: &str) -> Option<Arc<CacheEntry>> {
        self.shard(key)
            .lock()
            .entries
            .peek(key)
            .map(|slot| Arc::clone(&slot.entry))
    }

    /// Whether an entry has outlived the configured TTL.
    pub fn is_expired(&self, entry: &CacheEntry) -> bool {
        entry.is_expired(self.config.ttl)
    }

    /// Newest version accepted for `key`, even if no longer cached.
    pub fn high_water(&self, key: &str) -> Option<u64> {
        self.shard(key).lock().high_water.get(key).copied()
    }

    /// Store a definition unless a newer version is already known.
    ///
    /// Writing the version already cached keeps the cached definition but
    /// renews its fetch time, so a confirmed entry stops reporting expiry.
    pub fn put(&self, definition: FlagDefinition) -> PutOutcome {
        let key = definition.key.clone();
        let version = definition.version;

        let mut shard = self.shard(&key).lock();
        let known = shard.high_water.get(&key).copied();

        if let Some(high) = known {
            if version < high {
                drop(shard);
                self.counters.stale_rejections.fetch_add(1, Ordering::Relaxed);
                trace!(flag_key = %key, version, high_water = high, "Rejected stale flag version");
                return PutOutcome::Stale;
            }
            if version == high
                && let Some(slot) = shard.entries.peek_mut(&key)
            {
                slot.entry = Arc::new(slot.entry.renewed());
                return PutOutcome::Unchanged;
            }
        }

        shard.high_water.insert(key.clone(), version);
        let slot = Slot {
            entry: Arc::new(CacheEntry::new(definition)),
            used: self.tick(),
        };
        let outcome = match shard.entries.put(key.clone(), slot) {
            Some(_) => PutOutcome::Replaced,
            None => {
                self.len.fetch_add(1, Ordering::SeqCst);
                PutOutcome::Inserted
            }
        };
        drop(shard);

        trace!(flag_key = %key, version, ?outcome, "Cached flag");
        if outcome == PutOutcome::Inserted {
            self.enforce_bound();
        }
        outcome
    }

    /// Evict least recently used entries until the cache is within
    /// `max_entries`. Shard locks are taken one at a time.
    fn enforce_bound(&self) {
        let Some(max) = self.config.max_entries else {
            return;
        };
        if self.len.load(Ordering::SeqCst) <= max {
            return;
        }

        let _evicting = self.evicting.lock();
        while self.len.load(Ordering::SeqCst) > max {
            let victim = self
                .shards
                .iter()
                .enumerate()
                .filter_map(|(index, shard)| shard.lock().oldest().map(|oldest| (oldest, index)))
                .min();
            let Some(((used, key), index)) = victim else {
                return;
            };

            // The entry may have been used or removed since it was picked
            let mut shard = self.shards[index].lock();
            if shard.oldest().is_some_and(|(now, k)| now == used && k == key) {
                shard.entries.pop_lru();
                drop(shard);
                self.len.fetch_sub(1, Ordering::SeqCst);
                self.counters.evictions.fetch_add(1, Ordering::Relaxed);
                debug!(flag_key = %key, "Evicted flag from cache");
            }
        }
    }

    /// Drop the cached entry for `key`. The version high-water mark is kept.
    pub fn invalidate(&self, key: &str) -> bool {
        let removed = self.shard(key).lock().entries.pop(key).is_some();
        if removed {
            self.len.fetch_sub(1, Ordering::SeqCst);
        }
        removed
    }

    /// Copy of every cached entry.
    pub fn snapshot(&self) -> HashMap<String, Arc<CacheEntry>> {
        let mut all = HashMap::new();
        for shard in self.shards.iter() {
            let shard = shard.lock();
            all.extend(
                shard
                    .entries
                    .iter()
                    .map(|(k, slot)| (k.clone(), Arc::clone(&slot.entry))),
            );
        }
        all
    }

    pub fn len(&self) -> usize {
        self.len.load(Ordering::SeqCst)
    }

    pub fn is_empty(&self) -> bool {
        self.len() == 0
    }

    /// Drop every entry. High-water marks are kept.
    pub fn clear(&self) {
        for shard in self.shards.iter() {
            let mut shard = shard.lock();
            self.len.fetch_sub(shard.entries.len(), Ordering::SeqCst);
            shard.entries.clear();
        }
    }

    pub fn stats(&self) -> CacheStats {
        CacheStats {
            hits: self.counters.hits.load(Ordering::Relaxed),
            misses: self.counters.misses.load(Ordering::Relaxed),
            stale_rejections: self.counters.stale_rejections.load(Ordering::Relaxed),
            evictions: self.counters.evictions.load(Ordering::Relaxed),
        }
    }
}

impl Default for FlagCache {
    fn default() -> Self {
        Self::build(CacheConfig::default())
    }
}

impl std::fmt::Debug for FlagCache {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("FlagCache")
            .field("config", &self.config)
            .field("len", &self.len())
            .finish()
    }
}
