//! A memory-based cache store with owned and near sides.

use keygrid_api::*;
use std::collections::HashMap;
use std::sync::{Arc, Mutex};

/// MemCacheStore configuration types.
mod config {
    /// Configuration parameters for [MemCacheStoreFactory](super::MemCacheStoreFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MemCacheStoreConfig {
        /// The maximum number of entries held on the near side. When the
        /// bound is reached the least recently touched entry is evicted.
        ///
        /// Default: 1024.
        pub near_max_entries: u32,

        /// The interval in seconds at which expired near entries will be
        /// pruned.
        ///
        /// Default: 10s.
        pub prune_interval_s: u32,
    }

    impl Default for MemCacheStoreConfig {
        fn default() -> Self {
            Self {
                near_max_entries: 1024,
                prune_interval_s: 10,
            }
        }
    }

    impl MemCacheStoreConfig {
        /// Get the prune interval as a [std::time::Duration].
        pub fn prune_interval(&self) -> std::time::Duration {
            std::time::Duration::from_secs(self.prune_interval_s as u64)
        }
    }

    /// Module-level configuration for MemCacheStore.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct MemCacheStoreModConfig {
        /// MemCacheStore configuration.
        pub mem_cache_store: MemCacheStoreConfig,
    }
}

pub use config::*;

/// A memory-based cache store factory.
///
/// The owned side is a plain hash map: authoritative entries live until
/// removed or overwritten. The near side is a second map bounded by
/// `nearMaxEntries`, evicted by a recency tick and pruned of expired
/// entries on a timed gate at call time.
#[derive(Debug)]
pub struct MemCacheStoreFactory {}

impl MemCacheStoreFactory {
    /// Construct a new MemCacheStoreFactory.
    pub fn create() -> store::DynCacheStoreFactory {
        let out: store::DynCacheStoreFactory = Arc::new(Self {});
        out
    }
}

impl store::CacheStoreFactory for MemCacheStoreFactory {
    fn default_config(
        &self,
        config: &keygrid_api::config::Config,
    ) -> KgResult<()> {
        config.set_module_config(&MemCacheStoreModConfig::default())
    }

    fn validate_config(
        &self,
        config: &keygrid_api::config::Config,
    ) -> KgResult<()> {
        let config: MemCacheStoreModConfig = config.get_module_config()?;
        if config.mem_cache_store.near_max_entries == 0 {
            return Err(KgError::other(
                "nearMaxEntries must be at least 1",
            ));
        }
        Ok(())
    }

    fn create(
        &self,
        builder: Arc<builder::Builder>,
        hasher: hasher::DynKeyHasher,
    ) -> BoxFut<'static, KgResult<store::DynCacheStore>> {
        Box::pin(async move {
            let config: MemCacheStoreModConfig =
                builder.config.get_module_config()?;
            let out: store::DynCacheStore = Arc::new(MemCacheStore::new(
                config.mem_cache_store,
                hasher,
            ));
            Ok(out)
        })
    }
}

struct MemCacheStore(Mutex<Inner>);

impl std::fmt::Debug for MemCacheStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemCacheStore").finish()
    }
}

impl MemCacheStore {
    pub fn new(
        config: MemCacheStoreConfig,
        hasher: hasher::DynKeyHasher,
    ) -> Self {
        Self(Mutex::new(Inner::new(
            config,
            hasher,
            std::time::Instant::now(),
        )))
    }
}

impl store::CacheStore for MemCacheStore {
    fn get(&self, key: Key) -> BoxFut<'_, KgResult<Option<CacheEntry>>> {
        let r = self.0.lock().unwrap().get(&key);
        Box::pin(async move { Ok(r) })
    }

    fn put(&self, entry: CacheEntry) -> BoxFut<'_, KgResult<()>> {
        self.0.lock().unwrap().put(entry);
        Box::pin(async move { Ok(()) })
    }

    fn remove(&self, key: Key) -> BoxFut<'_, KgResult<()>> {
        self.0.lock().unwrap().remove(&key);
        Box::pin(async move { Ok(()) })
    }

    fn near_get(
        &self,
        key: Key,
    ) -> BoxFut<'_, KgResult<Option<CacheEntry>>> {
        let r = self.0.lock().unwrap().near_get(&key);
        Box::pin(async move { Ok(r) })
    }

    fn near_put(
        &self,
        entry: CacheEntry,
        ttl: std::time::Duration,
    ) -> BoxFut<'_, KgResult<()>> {
        self.0.lock().unwrap().near_put(entry, ttl);
        Box::pin(async move { Ok(()) })
    }

    fn near_invalidate(&self, key: Key) -> BoxFut<'_, KgResult<()>> {
        self.0.lock().unwrap().near_invalidate(&key);
        Box::pin(async move { Ok(()) })
    }

    fn near_invalidate_segments(
        &self,
        segments: Vec<SegmentId>,
    ) -> BoxFut<'_, KgResult<()>> {
        self.0.lock().unwrap().near_invalidate_segments(&segments);
        Box::pin(async move { Ok(()) })
    }

    fn near_invalidate_all(&self) -> BoxFut<'_, KgResult<()>> {
        self.0.lock().unwrap().near_invalidate_all();
        Box::pin(async move { Ok(()) })
    }
}

struct NearEntry {
    entry: CacheEntry,
    tick: u64,
}

struct Inner {
    config: MemCacheStoreConfig,
    hasher: hasher::DynKeyHasher,
    owned: HashMap<Key, CacheEntry>,
    near: HashMap<Key, NearEntry>,
    tick: u64,
    no_prune_until: std::time::Instant,
}

impl Inner {
    pub fn new(
        config: MemCacheStoreConfig,
        hasher: hasher::DynKeyHasher,
        now_inst: std::time::Instant,
    ) -> Self {
        let no_prune_until = now_inst + config.prune_interval();
        Self {
            config,
            hasher,
            owned: HashMap::new(),
            near: HashMap::new(),
            tick: 0,
            no_prune_until,
        }
    }

    fn do_prune(&mut self, now_inst: std::time::Instant, now_ts: Timestamp) {
        self.near.retain(|_, v| !v.entry.is_expired(now_ts));

        // we only care about not looping on the order of tight cpu cycles
        // even a couple seconds gets us away from this.
        self.no_prune_until = now_inst + self.config.prune_interval()
    }

    fn check_prune(&mut self) {
        // use an instant here even though we have to create a
        // Timestamp::now() below, because it's faster to query than
        // SystemTime if we're aborting
        let now_inst = std::time::Instant::now();
        if self.no_prune_until > now_inst {
            return;
        }

        self.do_prune(now_inst, Timestamp::now());
    }

    pub fn get(&mut self, key: &Key) -> Option<CacheEntry> {
        self.owned.get(key).cloned()
    }

    pub fn put(&mut self, entry: CacheEntry) {
        self.owned.insert(entry.key.clone(), entry);
    }

    pub fn remove(&mut self, key: &Key) {
        self.owned.remove(key);
    }

    pub fn near_get(&mut self, key: &Key) -> Option<CacheEntry> {
        self.check_prune();

        let tick = self.next_tick();
        match self.near.get_mut(key) {
            None => None,
            Some(n) => {
                if n.entry.is_expired(Timestamp::now()) {
                    self.near.remove(key);
                    return None;
                }
                n.tick = tick;
                Some(n.entry.clone())
            }
        }
    }

    pub fn near_put(
        &mut self,
        mut entry: CacheEntry,
        ttl: std::time::Duration,
    ) {
        self.check_prune();

        // a near entry always carries an expiry
        entry.meta.expires_at = Some(Timestamp::now() + ttl);

        let tick = self.next_tick();
        self.near.insert(entry.key.clone(), NearEntry { entry, tick });

        while self.near.len() > self.config.near_max_entries as usize {
            let oldest = self
                .near
                .iter()
                .min_by_key(|(_, n)| n.tick)
                .map(|(k, _)| k.clone());
            match oldest {
                Some(k) => {
                    self.near.remove(&k);
                }
                None => break,
            }
        }
    }

    pub fn near_invalidate(&mut self, key: &Key) {
        self.near.remove(key);
    }

    pub fn near_invalidate_segments(&mut self, segments: &[SegmentId]) {
        let hasher = self.hasher.clone();
        self.near
            .retain(|k, _| !segments.contains(&hasher.segment_of(k)));
    }

    pub fn near_invalidate_all(&mut self) {
        self.near.clear();
    }

    fn next_tick(&mut self) -> u64 {
        self.tick += 1;
        self.tick
    }
}

#[cfg(test)]
mod test;
