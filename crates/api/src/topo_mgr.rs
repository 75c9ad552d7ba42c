//! Topology-manager related types.

use crate::*;
use std::sync::Arc;

/// Which owner-list positions count when asking "does this node own the
/// key". The read-consistency level of a deployment determines which one
/// callers use.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(rename_all = "camelCase")]
pub enum OwnerScope {
    /// Only the primary (first) position counts.
    Primary,

    /// Any position in the owner list counts. Any owner may serve an
    /// authoritative read.
    Any,
}

/// Holds the current cluster [Topology] and answers ownership queries
/// against it.
///
/// The topology reference is single-writer: only the membership-change
/// handler (fed by the transport's pushed events) replaces it, publishing
/// each new snapshot as one indivisible swap. Readers never block and
/// never observe a partially updated assignment.
pub trait TopologyManager: 'static + Send + Sync + std::fmt::Debug {
    /// The local node's identity.
    fn local_node(&self) -> NodeId;

    /// Snapshot the current topology. Non-blocking; in-flight operations
    /// capture `view_id()` from this snapshot for later staleness checks.
    fn current_topology(&self) -> Arc<Topology>;

    /// The ordered owner list for a key against the current topology,
    /// primary first.
    fn owners_of(&self, key: &Key) -> Vec<NodeId>;

    /// Whether the local node owns the key under the given scope.
    fn is_owner(&self, key: &Key, scope: OwnerScope) -> bool;
}

/// Trait-object [TopologyManager].
pub type DynTopologyManager = Arc<dyn TopologyManager>;

/// A factory for constructing [TopologyManager] instances.
pub trait TopologyManagerFactory:
    'static + Send + Sync + std::fmt::Debug
{
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &config::Config) -> KgResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &config::Config) -> KgResult<()>;

    /// Construct a topology manager instance.
    ///
    /// The manager subscribes itself to the transport's membership-change
    /// events during construction; it never calls back into the transport
    /// to request membership. The store is provided so near-cache entries
    /// can be invalidated when a swap reassigns their segments.
    fn create(
        &self,
        builder: Arc<builder::Builder>,
        local: NodeId,
        hasher: hasher::DynKeyHasher,
        store: store::DynCacheStore,
        transport: transport::DynTransport,
    ) -> BoxFut<'static, KgResult<DynTopologyManager>>;
}

/// Trait-object [TopologyManagerFactory].
pub type DynTopologyManagerFactory = Arc<dyn TopologyManagerFactory>;
