//! Cache-store related types.

use crate::*;
use std::sync::Arc;

/// Represents the ability to store cache entries on the local node.
///
/// A store has two independent sides:
///
/// - The *owned* side is authoritative storage for segments the local node
///   owns. It never consults the network.
/// - The *near* side (L1) is a bounded, independently evicted cache of
///   values fetched from remote owners. Entries on the near side always
///   carry an expiry and are never promoted to the owned side.
///
/// Callers outside the retrieval subsystem must never treat the near side
/// as authoritative, and the near side must never be consulted before an
/// owned lookup has been attempted.
pub trait CacheStore: 'static + Send + Sync + std::fmt::Debug {
    /// Get an entry from authoritative storage.
    fn get(&self, key: Key) -> BoxFut<'_, KgResult<Option<CacheEntry>>>;

    /// Put an entry into authoritative storage.
    fn put(&self, entry: CacheEntry) -> BoxFut<'_, KgResult<()>>;

    /// Remove an entry from authoritative storage.
    fn remove(&self, key: Key) -> BoxFut<'_, KgResult<()>>;

    /// Get an entry from the near-cache. Expired entries are not returned.
    fn near_get(
        &self,
        key: Key,
    ) -> BoxFut<'_, KgResult<Option<CacheEntry>>>;

    /// Put an entry into the near-cache with the given ttl, evicting by
    /// recency if the near side is at capacity.
    fn near_put(
        &self,
        entry: CacheEntry,
        ttl: std::time::Duration,
    ) -> BoxFut<'_, KgResult<()>>;

    /// Remove a single key from the near-cache. Public so an external
    /// write path can broadcast invalidations.
    fn near_invalidate(&self, key: Key) -> BoxFut<'_, KgResult<()>>;

    /// Remove every near-cache entry whose key falls in one of the given
    /// segments. Triggered when a topology change reassigns those
    /// segments' owners.
    fn near_invalidate_segments(
        &self,
        segments: Vec<SegmentId>,
    ) -> BoxFut<'_, KgResult<()>>;

    /// Clear the near-cache entirely.
    fn near_invalidate_all(&self) -> BoxFut<'_, KgResult<()>>;
}

/// Trait-object [CacheStore].
pub type DynCacheStore = Arc<dyn CacheStore>;

/// A factory for constructing [CacheStore] instances.
pub trait CacheStoreFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &config::Config) -> KgResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &config::Config) -> KgResult<()>;

    /// Construct a cache store instance. The hasher is provided so the
    /// store can file near-cache entries by segment for invalidation.
    fn create(
        &self,
        builder: Arc<builder::Builder>,
        hasher: hasher::DynKeyHasher,
    ) -> BoxFut<'static, KgResult<DynCacheStore>>;
}

/// Trait-object [CacheStoreFactory].
pub type DynCacheStoreFactory = Arc<dyn CacheStoreFactory>;
