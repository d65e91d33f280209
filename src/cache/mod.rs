//! Per-module execution caches with mark-and-sweep eviction.
//!
//! # Caching Strategy
//!
//! ```text
//! ExecutionCacheManager (one per engine, lives across passes)
//! └── module identity -> ExecutionCache
//!     └── CacheKey -> Entry { value, last_hit generation }
//! ```
//!
//! Hit tracking uses a generation counter: resetting all hit flags is a
//! single increment instead of a walk over every entry. An entry counts as hit
//! when its `last_hit` equals the cache's current generation.
//!
//! Per pass, the engine calls [`ExecutionCacheManager::reset_entry_hits`]
//! first and [`ExecutionCacheManager::clear_unhit_entries`] last, so anything
//! a module did not touch during the pass is dropped.

use std::any::Any;
use std::fmt;
use std::sync::atomic::{AtomicU64, Ordering};
use std::sync::Arc;

use parking_lot::RwLock;
use rustc_hash::FxHashMap;

use crate::document::Document;
use crate::error::Result;
use crate::execution::Module;

// =============================================================================
// CacheKey
// =============================================================================

/// Key of a cache entry, usually derived from document content.
#[derive(Debug, Clone, PartialEq, Eq, Hash, PartialOrd, Ord)]
pub struct CacheKey(String);

impl CacheKey {
    /// Key from an arbitrary string.
    pub fn new(key: impl Into<String>) -> Self {
        Self(key.into())
    }

    /// Key from a document's source and content fingerprint.
    pub fn for_document(document: &Document) -> Result<Self> {
        Ok(Self(format!(
            "{}|{}",
            document.source_string(),
            document.fingerprint()?
        )))
    }

    /// Key from a document plus extra parameters, e.g. module settings.
    pub fn for_document_with(document: &Document, extra: impl fmt::Display) -> Result<Self> {
        let base = Self::for_document(document)?;
        Ok(Self(format!("{}|{extra}", base.0)))
    }

    /// Key text.
    pub fn as_str(&self) -> &str {
        &self.0
    }
}

impl fmt::Display for CacheKey {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(&self.0)
    }
}

impl From<&str> for CacheKey {
    fn from(key: &str) -> Self {
        Self::new(key)
    }
}

impl From<String> for CacheKey {
    fn from(key: String) -> Self {
        Self(key)
    }
}

// =============================================================================
// ExecutionCache
// =============================================================================

struct Entry {
    value: Arc<dyn Any + Send + Sync>,
    /// Generation of the last hit or write.
    last_hit: AtomicU64,
}

/// A thread-safe cache owned by one module.
///
/// Writes are upserts: when concurrent producers race on a key, the last
/// write wins and no write is lost.
pub struct ExecutionCache {
    entries: RwLock<FxHashMap<CacheKey, Entry>>,
    generation: AtomicU64,
}

impl Default for ExecutionCache {
    fn default() -> Self {
        Self::new()
    }
}

impl ExecutionCache {
    /// Create an empty cache.
    pub fn new() -> Self {
        Self {
            entries: RwLock::new(FxHashMap::default()),
            generation: AtomicU64::new(1),
        }
    }

    fn current_generation(&self) -> u64 {
        self.generation.load(Ordering::Acquire)
    }

    /// Cached value for `key`, marking the entry as hit.
    ///
    /// A value stored under a different type reads as a miss.
    pub fn get<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        let entries = self.entries.read();
        let entry = entries.get(key)?;
        let value = entry.value.downcast_ref::<T>()?.clone();
        entry
            .last_hit
            .store(self.current_generation(), Ordering::Release);
        Some(value)
    }

    /// Whether `key` is cached, marking the entry as hit.
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        let entries = self.entries.read();
        match entries.get(key) {
            Some(entry) => {
                entry
                    .last_hit
                    .store(self.current_generation(), Ordering::Release);
                true
            }
            None => false,
        }
    }

    /// Store `value` under `key`, replacing any previous value.
    pub fn set<T>(&self, key: CacheKey, value: T)
    where
        T: Any + Send + Sync,
    {
        let entry = Entry {
            value: Arc::new(value),
            last_hit: AtomicU64::new(self.current_generation()),
        };
        self.entries.write().insert(key, entry);
    }

    /// Cached value, or compute, store and return it.
    ///
    /// `factory` runs without holding the lock, so concurrent misses on the
    /// same key may each compute; the last result stored wins.
    pub fn get_or_insert_with<T, F>(&self, key: &CacheKey, factory: F) -> T
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> T,
    {
        if let Some(value) = self.get(key) {
            return value;
        }
        let value = factory();
        self.set(key.clone(), value.clone());
        value
    }

    /// Fallible [`get_or_insert_with`](Self::get_or_insert_with). Errors are not cached.
    pub fn try_get_or_insert_with<T, F>(&self, key: &CacheKey, factory: F) -> Result<T>
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        if let Some(value) = self.get(key) {
            return Ok(value);
        }
        let value = factory()?;
        self.set(key.clone(), value.clone());
        Ok(value)
    }

    /// Clear every hit mark. O(1).
    pub fn reset_entry_hits(&self) {
        self.generation.fetch_add(1, Ordering::AcqRel);
    }

    /// Remove entries not hit since the last [`reset_entry_hits`](Self::reset_entry_hits).
    ///
    /// Returns the removed keys.
    pub fn clear_unhit_entries(&self) -> Vec<CacheKey> {
        let generation = self.current_generation();
        let mut removed = Vec::new();
        self.entries.write().retain(|key, entry| {
            let hit = entry.last_hit.load(Ordering::Acquire) == generation;
            if !hit {
                removed.push(key.clone());
            }
            hit
        });
        removed
    }

    /// Number of entries.
    pub fn len(&self) -> usize {
        self.entries.read().len()
    }

    /// Whether the cache is empty.
    pub fn is_empty(&self) -> bool {
        self.entries.read().is_empty()
    }
}

impl fmt::Debug for ExecutionCache {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCache")
            .field("entries", &self.len())
            .field("generation", &self.current_generation())
            .finish()
    }
}

// =============================================================================
// CacheHandle
// =============================================================================

/// The cache a module sees during execution.
///
/// When caching is disabled the handle is a true no-op: reads always miss,
/// writes are discarded and factories always run.
#[derive(Clone, Debug)]
pub enum CacheHandle {
    /// Backed by the module's cache.
    Enabled(Arc<ExecutionCache>),
    /// Caching is turned off.
    Disabled,
}

impl CacheHandle {
    /// Whether values are actually cached.
    pub fn is_enabled(&self) -> bool {
        matches!(self, Self::Enabled(_))
    }

    /// See [`ExecutionCache::get`].
    pub fn get<T>(&self, key: &CacheKey) -> Option<T>
    where
        T: Any + Clone + Send + Sync,
    {
        match self {
            Self::Enabled(cache) => cache.get(key),
            Self::Disabled => None,
        }
    }

    /// See [`ExecutionCache::contains_key`].
    pub fn contains_key(&self, key: &CacheKey) -> bool {
        match self {
            Self::Enabled(cache) => cache.contains_key(key),
            Self::Disabled => false,
        }
    }

    /// See [`ExecutionCache::set`].
    pub fn set<T>(&self, key: CacheKey, value: T)
    where
        T: Any + Send + Sync,
    {
        if let Self::Enabled(cache) = self {
            cache.set(key, value);
        }
    }

    /// See [`ExecutionCache::get_or_insert_with`].
    pub fn get_or_insert_with<T, F>(&self, key: &CacheKey, factory: F) -> T
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> T,
    {
        match self {
            Self::Enabled(cache) => cache.get_or_insert_with(key, factory),
            Self::Disabled => factory(),
        }
    }

    /// See [`ExecutionCache::try_get_or_insert_with`].
    pub fn try_get_or_insert_with<T, F>(&self, key: &CacheKey, factory: F) -> Result<T>
    where
        T: Any + Clone + Send + Sync,
        F: FnOnce() -> Result<T>,
    {
        match self {
            Self::Enabled(cache) => cache.try_get_or_insert_with(key, factory),
            Self::Disabled => factory(),
        }
    }
}

// =============================================================================
// ExecutionCacheManager
// =============================================================================

struct ModuleCache {
    /// Held so the identity key cannot be reused by another allocation.
    module: Arc<dyn Module>,
    cache: Arc<ExecutionCache>,
}

/// Hands out one cache per module instance, created on first use.
#[derive(Default)]
pub struct ExecutionCacheManager {
    caches: RwLock<FxHashMap<usize, ModuleCache>>,
}

fn identity(module: &Arc<dyn Module>) -> usize {
    Arc::as_ptr(module) as *const () as usize
}

impl ExecutionCacheManager {
    /// Create an empty manager.
    pub fn new() -> Self {
        Self::default()
    }

    /// Cache handle for `module`; [`CacheHandle::Disabled`] unless `enabled`.
    pub fn get(&self, module: &Arc<dyn Module>, enabled: bool) -> CacheHandle {
        if !enabled {
            return CacheHandle::Disabled;
        }
        let id = identity(module);
        if let Some(entry) = self.caches.read().get(&id) {
            return CacheHandle::Enabled(entry.cache.clone());
        }
        let mut caches = self.caches.write();
        let entry = caches.entry(id).or_insert_with(|| ModuleCache {
            module: module.clone(),
            cache: Arc::new(ExecutionCache::new()),
        });
        CacheHandle::Enabled(entry.cache.clone())
    }

    /// Number of module caches created so far.
    pub fn len(&self) -> usize {
        self.caches.read().len()
    }

    /// Whether no module cache exists.
    pub fn is_empty(&self) -> bool {
        self.caches.read().is_empty()
    }

    /// Reset hit marks in every module cache.
    pub fn reset_entry_hits(&self) {
        for entry in self.caches.read().values() {
            entry.cache.reset_entry_hits();
        }
    }

    /// Sweep every module cache. Returns the number of removed entries.
    pub fn clear_unhit_entries(&self) -> usize {
        let mut total = 0;
        for entry in self.caches.read().values() {
            let removed = entry.cache.clear_unhit_entries();
            if !removed.is_empty() {
                tracing::debug!(
                    module = %entry.module.name(),
                    removed = removed.len(),
                    "removed stale cache entries"
                );
            }
            total += removed.len();
        }
        total
    }
}

impl fmt::Debug for ExecutionCacheManager {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.debug_struct("ExecutionCacheManager")
            .field("caches", &self.len())
            .finish()
    }
}

#[cfg(test)]
mod tests {
    use std::sync::atomic::AtomicUsize;

    use super::*;
    use crate::execution::ExecutionContext;

    struct Noop;

    impl Module for Noop {
        fn execute(&self, inputs: Vec<Document>, _ctx: &ExecutionContext) -> Result<Vec<Document>> {
            Ok(inputs)
        }
    }

    #[test]
    fn test_get_and_set() {
        let cache = ExecutionCache::new();
        let key = CacheKey::new("a");
        assert_eq!(cache.get::<String>(&key), None);

        cache.set(key.clone(), "value".to_string());
        assert_eq!(cache.get::<String>(&key).as_deref(), Some("value"));
        assert_eq!(cache.get::<u32>(&key), None);

        cache.set(key.clone(), "newer".to_string());
        assert_eq!(cache.get::<String>(&key).as_deref(), Some("newer"));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_unhit_entries_are_evicted() {
        let cache = ExecutionCache::new();
        cache.set(CacheKey::new("hot"), 1_u32);
        cache.set(CacheKey::new("cold"), 2_u32);

        for _ in 0..3 {
            cache.reset_entry_hits();
            assert_eq!(cache.get::<u32>(&"hot".into()), Some(1));
            let removed = cache.clear_unhit_entries();
            assert!(removed.iter().all(|k| k.as_str() == "cold"));
        }

        assert!(cache.contains_key(&"hot".into()));
        assert!(!cache.contains_key(&"cold".into()));
        assert_eq!(cache.len(), 1);
    }

    #[test]
    fn test_entries_written_during_pass_survive() {
        let cache = ExecutionCache::new();
        cache.reset_entry_hits();
        cache.set(CacheKey::new("fresh"), 1_u8);
        assert!(cache.clear_unhit_entries().is_empty());
    }

    #[test]
    fn test_get_or_insert_runs_factory_once() {
        let cache = ExecutionCache::new();
        let calls = AtomicUsize::new(0);
        let key = CacheKey::new("k");
        for _ in 0..3 {
            let v = cache.get_or_insert_with(&key, || {
                calls.fetch_add(1, Ordering::SeqCst);
                42_u64
            });
            assert_eq!(v, 42);
        }
        assert_eq!(calls.load(Ordering::SeqCst), 1);
    }

    #[test]
    fn test_disabled_handle_is_noop() {
        let handle = CacheHandle::Disabled;
        let key = CacheKey::new("k");
        handle.set(key.clone(), 1_u32);
        assert_eq!(handle.get::<u32>(&key), None);
        assert!(!handle.contains_key(&key));

        let calls = AtomicUsize::new(0);
        for _ in 0..2 {
            handle.get_or_insert_with(&key, || calls.fetch_add(1, Ordering::SeqCst));
        }
        assert_eq!(calls.load(Ordering::SeqCst), 2);
    }

    #[test]
    fn test_document_keys_follow_content() {
        let a = Document::builder().source("/in/a.md").text("x").build().unwrap();
        let same = a.derive().meta("Extra", 1).build().unwrap();
        let changed = a.derive().text("y").build().unwrap();

        let key = CacheKey::for_document(&a).unwrap();
        assert_eq!(key, CacheKey::for_document(&same).unwrap());
        assert_ne!(key, CacheKey::for_document(&changed).unwrap());
        assert_ne!(key, CacheKey::for_document_with(&a, "opt=1").unwrap());
    }

    #[test]
    fn test_manager_hands_out_per_module_caches() {
        let manager = ExecutionCacheManager::new();
        let first: Arc<dyn Module> = Arc::new(Noop);
        let second: Arc<dyn Module> = Arc::new(Noop);

        let a = manager.get(&first, true);
        let again = manager.get(&first, true);
        let b = manager.get(&second, true);
        assert!(!manager.get(&first, false).is_enabled());
        assert_eq!(manager.len(), 2);

        a.set(CacheKey::new("k"), 1_u32);
        assert_eq!(again.get::<u32>(&"k".into()), Some(1));
        assert_eq!(b.get::<u32>(&"k".into()), None);

        manager.reset_entry_hits();
        assert_eq!(manager.clear_unhit_entries(), 1);
        assert!(!again.contains_key(&"k".into()));
    }
}
