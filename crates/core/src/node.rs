//! Assembly of the keygrid core modules into a running grid node.

use keygrid_api::{
    transport::{GetReply, GetRequest},
    *,
};
use std::sync::Arc;

/// Serves inbound peer-to-peer GET requests from the local node's
/// authoritative storage. Never consults the near-cache or the network.
#[derive(Debug)]
struct StoreGetHandler {
    store: store::DynCacheStore,
}

impl transport::GetHandler for StoreGetHandler {
    fn handle_get(
        &self,
        req: GetRequest,
    ) -> BoxFut<'_, KgResult<GetReply>> {
        Box::pin(async move {
            match self.store.get(req.key).await? {
                Some(entry) => Ok(GetReply::Found(entry)),
                None => Ok(GetReply::NotFound),
            }
        })
    }
}

/// One grid node: the module instances built from a [builder::Builder],
/// wired together.
///
/// Construction order matters: the transport first, so the GET handler
/// serving authoritative storage and the topology manager's membership
/// subscription are registered before any peer can reach this node.
#[derive(Debug)]
pub struct GridNode {
    local: NodeId,
    hasher: hasher::DynKeyHasher,
    store: store::DynCacheStore,
    transport: transport::DynTransport,
    topo_mgr: topo_mgr::DynTopologyManager,
    retrieval: retrieval::DynRetrieval,
}

impl GridNode {
    /// Construct the modules configured in the builder and wire them
    /// into a node.
    pub async fn create(
        builder: Arc<builder::Builder>,
        local: NodeId,
    ) -> KgResult<Self> {
        builder.validate_config()?;

        let hasher = builder.hasher.create(builder.clone()).await?;
        let store = builder
            .store
            .create(builder.clone(), hasher.clone())
            .await?;
        let transport = builder
            .transport
            .create(builder.clone(), local.clone())
            .await?;
        transport.register_get_handler(Arc::new(StoreGetHandler {
            store: store.clone(),
        }));
        let topo_mgr = builder
            .topo_mgr
            .create(
                builder.clone(),
                local.clone(),
                hasher.clone(),
                store.clone(),
                transport.clone(),
            )
            .await?;
        let retrieval = builder
            .retrieval
            .create(
                builder.clone(),
                hasher.clone(),
                topo_mgr.clone(),
                store.clone(),
                transport.clone(),
            )
            .await?;

        Ok(Self {
            local,
            hasher,
            store,
            transport,
            topo_mgr,
            retrieval,
        })
    }

    /// The local node id.
    pub fn local_node(&self) -> &NodeId {
        &self.local
    }

    /// The key hasher instance.
    pub fn hasher(&self) -> &hasher::DynKeyHasher {
        &self.hasher
    }

    /// The cache store instance.
    pub fn store(&self) -> &store::DynCacheStore {
        &self.store
    }

    /// The transport instance.
    pub fn transport(&self) -> &transport::DynTransport {
        &self.transport
    }

    /// The topology manager instance.
    pub fn topo_mgr(&self) -> &topo_mgr::DynTopologyManager {
        &self.topo_mgr
    }

    /// The retrieval instance.
    pub fn retrieval(&self) -> &retrieval::DynRetrieval {
        &self.retrieval
    }

    /// Read a key through the full ownership/near-cache/remote path.
    pub async fn get(
        &self,
        key: Key,
        listener: retrieval::DynRetrievalListener,
    ) -> KgResult<Option<CacheEntry>> {
        self.retrieval.retrieve(key, listener).await
    }

    /// Write an entry into this node's authoritative storage.
    ///
    /// Write-path replication is outside this subsystem; callers that
    /// want an entry at every owner write it at every owner.
    pub async fn put(&self, entry: CacheEntry) -> KgResult<()> {
        self.store.put(entry).await
    }
}
