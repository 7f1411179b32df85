//! Plan cache for display tiles.
//!
//! Searching the source pyramid and building meshes is the expensive part of
//! serving a display tile, and its result depends only on the tile address.
//! This module keeps finished plans in an LRU cache so a tile that is
//! rendered again (after a style reload or a pan back) skips straight to
//! drawing.
//!
//! # Cache Key
//!
//! Plans are keyed by the display tile address ([`ViewportTileKey`]). The
//! source, projector and pyramid are fixed for the lifetime of a cache, so
//! they are not part of the key.
//!
//! # Concurrency
//!
//! Two builds of the same key may race; both complete and the last `put`
//! wins. Entries are immutable, so either result is correct.

use std::num::NonZeroUsize;
use std::sync::Arc;

use lru::LruCache;
use tokio::sync::RwLock;

use super::display::ViewportTileKey;
use super::plan::TileMeshResult;

/// Default maximum number of cached plans
pub const DEFAULT_TILE_CACHE_CAPACITY: usize = 4096;

// =============================================================================
// Tile Cache
// =============================================================================

/// LRU cache of display tile plans with an entry-count capacity.
///
/// # Example
///
/// ```
/// use std::sync::Arc;
/// use wmts_overlay::tile::{TileCache, TileMeshResult, ViewportTileKey};
///
/// #[tokio::main]
/// async fn main() {
///     let cache = TileCache::new();
///     let key = ViewportTileKey::new(1, 2, 3);
///
///     cache.put(key, Arc::new(TileMeshResult::empty(key))).await;
///     assert!(cache.get(&key).await.is_some());
///
///     cache.invalidate(&key).await;
///     assert!(cache.get(&key).await.is_none());
/// }
/// ```
pub struct TileCache {
    cache: RwLock<LruCache<ViewportTileKey, Arc<TileMeshResult>>>,
    capacity: NonZeroUsize,
}

impl TileCache {
    /// Create a cache with the default capacity.
    pub fn new() -> Self {
        Self::with_capacity(DEFAULT_TILE_CACHE_CAPACITY)
    }

    /// Create a cache holding at most `max_entries` plans.
    ///
    /// A capacity of 0 is treated as 1.
    pub fn with_capacity(max_entries: usize) -> Self {
        let capacity = NonZeroUsize::new(max_entries).unwrap_or(NonZeroUsize::MIN);
        Self {
            cache: RwLock::new(LruCache::new(capacity)),
            capacity,
        }
    }

    /// Get a plan, marking it as recently used.
    pub async fn get(&self, key: &ViewportTileKey) -> Option<Arc<TileMeshResult>> {
        let mut cache = self.cache.write().await;
        cache.get(key).cloned()
    }

    /// Check for a plan without updating LRU order.
    pub async fn contains(&self, key: &ViewportTileKey) -> bool {
        let cache = self.cache.read().await;
        cache.contains(key)
    }

    /// Store a plan, replacing any existing entry for the key.
    ///
    /// When full, the least-recently-used entry is evicted.
    pub async fn put(&self, key: ViewportTileKey, result: Arc<TileMeshResult>) {
        let mut cache = self.cache.write().await;
        cache.put(key, result);
    }

    /// Drop the plan for a key, returning it if it was cached.
    pub async fn invalidate(&self, key: &ViewportTileKey) -> Option<Arc<TileMeshResult>> {
        let mut cache = self.cache.write().await;
        cache.pop(key)
    }

    /// Clear all entries from the cache.
    pub async fn clear(&self) {
        let mut cache = self.cache.write().await;
        cache.clear();
    }

    /// Get the current number of cached plans.
    pub async fn len(&self) -> usize {
        let cache = self.cache.read().await;
        cache.len()
    }

    /// Check if the cache is empty.
    pub async fn is_empty(&self) -> bool {
        let cache = self.cache.read().await;
        cache.is_empty()
    }

    /// Get the maximum number of entries.
    pub fn capacity(&self) -> usize {
        self.capacity.get()
    }
}

impl Default for TileCache {
    fn default() -> Self {
        Self::new()
    }
}

// =============================================================================
// Tests
// =============================================================================
