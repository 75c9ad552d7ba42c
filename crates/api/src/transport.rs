//! Keygrid transport related types.
//!
//! The transport is an external collaborator: it carries peer-to-peer GET
//! round-trips and pushes cluster membership changes into this subsystem.
//! Wire codecs are out of scope for the core, so messages cross this trait
//! boundary as plain structs; a concrete transport decides how to encode
//! them.

use crate::*;
use std::sync::Arc;

/// A peer-to-peer GET request for a single key.
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct GetRequest {
    /// The key to look up in the remote node's authoritative storage.
    pub key: Key,
}

/// The definitive reply to a [GetRequest].
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub enum GetReply {
    /// The replying node holds an authoritative copy.
    Found(CacheEntry),

    /// The replying node's authoritative storage confirms absence.
    NotFound,
}

/// Handler for inbound peer-to-peer GET requests.
///
/// Implementations consult only the local node's authoritative storage,
/// never the near-cache and never the network.
pub trait GetHandler: 'static + Send + Sync + std::fmt::Debug {
    /// Produce the definitive local reply for an inbound GET.
    fn handle_get(
        &self,
        req: GetRequest,
    ) -> BoxFut<'_, KgResult<GetReply>>;
}

/// Trait-object [GetHandler].
pub type DynGetHandler = Arc<dyn GetHandler>;

/// Handler for membership-change events pushed by the transport.
///
/// The transport publishes a one-directional stream of these events; the
/// topology manager consumes them and never calls back into the transport
/// to ask for membership.
pub trait MembershipHandler: 'static + Send + Sync + std::fmt::Debug {
    /// The cluster member set changed. The full new member set is pushed,
    /// not a delta.
    fn membership_changed(&self, members: Vec<NodeId>);
}

/// Trait-object [MembershipHandler].
pub type DynMembershipHandler = Arc<dyn MembershipHandler>;

/// Cluster messaging and membership-change event source.
pub trait Transport: 'static + Send + Sync + std::fmt::Debug {
    /// The node id this transport instance is bound to.
    fn local_node(&self) -> NodeId;

    /// Register the handler that serves inbound GET requests.
    ///
    /// Panics if you attempt to register a duplicate get handler.
    fn register_get_handler(&self, handler: DynGetHandler);

    /// Register the handler that receives membership-change events.
    ///
    /// Panics if you attempt to register a duplicate membership handler.
    fn register_membership_handler(&self, handler: DynMembershipHandler);

    /// Send a GET request to a remote peer and await its reply.
    ///
    /// The returned future resolves to the peer's definitive reply, or a
    /// [KgError::TransportError] if the peer was unreachable or the RPC
    /// failed. It does not time out on its own; the retrieval coordinator
    /// applies its own per-attempt deadline.
    fn send_get(
        &self,
        to: NodeId,
        req: GetRequest,
    ) -> BoxFut<'_, KgResult<GetReply>>;
}

/// Trait-object [Transport].
pub type DynTransport = Arc<dyn Transport>;

/// A factory for constructing [Transport] instances.
pub trait TransportFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &config::Config) -> KgResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &config::Config) -> KgResult<()>;

    /// Construct a transport instance bound to the given local node id.
    fn create(
        &self,
        builder: Arc<builder::Builder>,
        local: NodeId,
    ) -> BoxFut<'static, KgResult<DynTransport>>;
}

/// Trait-object [TransportFactory].
pub type DynTransportFactory = Arc<dyn TransportFactory>;
