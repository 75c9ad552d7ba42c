//! Remote-retrieval related types.

use crate::*;
use std::sync::Arc;

/// Observer of genuinely remote retrieval outcomes.
///
/// Registered by external observers such as statistics collection or
/// fallback-to-store logic. Invoked synchronously on the settlement path
/// of a remote retrieval, exactly once per retrieval that settles with a
/// definitive remote outcome. It is NOT invoked for:
///
/// - a local hit (the local node owned the key and held it),
/// - a timeout (no definitive remote state was observed),
/// - a cancelled retrieval.
///
/// Implementations must not block these callbacks.
pub trait RetrievalListener: 'static + Send + Sync + std::fmt::Debug {
    /// A remote owner reported the value as present.
    fn remote_value_found(&self, entry: &CacheEntry);

    /// Every queried remote owner confirmed absence.
    fn remote_value_not_found(&self, key: &Key);
}

/// Trait-object [RetrievalListener].
pub type DynRetrievalListener = Arc<dyn RetrievalListener>;

/// A listener that observes nothing. Useful for callers without an
/// observer to register.
#[derive(Debug)]
pub struct NoopRetrievalListener;

impl RetrievalListener for NoopRetrievalListener {
    fn remote_value_found(&self, _entry: &CacheEntry) {}

    fn remote_value_not_found(&self, _key: &Key) {}
}

/// Orchestrates remote GET round-trips.
///
/// Each retrieval is independent and idempotent at the protocol level:
/// concurrent retrievals for the same key are not deduplicated here;
/// deduplication, if desired, is a caller concern.
pub trait Retrieval: 'static + Send + Sync + std::fmt::Debug {
    /// Retrieve the value for a key.
    ///
    /// - If the local node owns the key and holds it, resolves
    ///   immediately from authoritative storage. The listener is not
    ///   invoked.
    /// - Otherwise the near-cache is consulted, then the remote owner
    ///   set is queried per the configured fan-out policy.
    /// - `Ok(Some(entry))` is a found value; `Ok(None)` means every
    ///   queried owner confirmed absence. Failures are
    ///   [KgError::RetrievalTimeout] and
    ///   [KgError::StaleTopologyRetryExhausted].
    ///
    /// Dropping the returned future cancels the retrieval: outstanding
    /// RPCs belonging to it are cancelled with it and the listener will
    /// not fire afterwards.
    fn retrieve(
        &self,
        key: Key,
        listener: DynRetrievalListener,
    ) -> BoxFut<'_, KgResult<Option<CacheEntry>>>;
}

/// Trait-object [Retrieval].
pub type DynRetrieval = Arc<dyn Retrieval>;

/// A factory for constructing [Retrieval] instances.
pub trait RetrievalFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &config::Config) -> KgResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &config::Config) -> KgResult<()>;

    /// Construct a retrieval instance.
    fn create(
        &self,
        builder: Arc<builder::Builder>,
        hasher: hasher::DynKeyHasher,
        topo_mgr: topo_mgr::DynTopologyManager,
        store: store::DynCacheStore,
        transport: transport::DynTransport,
    ) -> BoxFut<'static, KgResult<DynRetrieval>>;
}

/// Trait-object [RetrievalFactory].
pub type DynRetrievalFactory = Arc<dyn RetrievalFactory>;
