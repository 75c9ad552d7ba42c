//! The keygrid topology manager.
//!
//! Holds the current cluster [Topology] behind a single watch channel:
//! the membership-change handler is the only writer, publishing each new
//! snapshot as one atomic swap, while ownership queries read the latest
//! complete snapshot without blocking. A retrieval that begins after a
//! swap resolves owners against the new topology; replies addressed under
//! the old one are caught by the retrieval coordinator's view-id check,
//! never by assuming freshness.

use keygrid_api::*;
use std::sync::Arc;

const INITIAL_VIEW_ID: u64 = 0;

/// The production keygrid topology manager factory.
#[derive(Debug)]
pub struct CoreTopologyManagerFactory {}

impl CoreTopologyManagerFactory {
    /// Construct a new CoreTopologyManagerFactory.
    pub fn create() -> topo_mgr::DynTopologyManagerFactory {
        let out: topo_mgr::DynTopologyManagerFactory = Arc::new(Self {});
        out
    }
}

impl topo_mgr::TopologyManagerFactory for CoreTopologyManagerFactory {
    fn default_config(&self, _config: &config::Config) -> KgResult<()> {
        Ok(())
    }

    fn validate_config(&self, _config: &config::Config) -> KgResult<()> {
        Ok(())
    }

    fn create(
        &self,
        _builder: Arc<builder::Builder>,
        local: NodeId,
        hasher: hasher::DynKeyHasher,
        store: store::DynCacheStore,
        transport: transport::DynTransport,
    ) -> BoxFut<'static, KgResult<topo_mgr::DynTopologyManager>> {
        Box::pin(async move {
            let mgr =
                Arc::new(CoreTopologyManager::new(local, hasher, store)?);

            // the manager reacts to pushed membership events only;
            // it holds no reference back to the transport
            transport.register_membership_handler(mgr.clone());

            let out: topo_mgr::DynTopologyManager = mgr;
            Ok(out)
        })
    }
}

struct CoreTopologyManager {
    local: NodeId,
    hasher: hasher::DynKeyHasher,
    store: store::DynCacheStore,
    // the sender is the single point of publication; reads borrow the
    // latest complete snapshot from it
    topo_tx: tokio::sync::watch::Sender<Arc<Topology>>,
}

impl std::fmt::Debug for CoreTopologyManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreTopologyManager")
            .field("local", &self.local)
            .finish()
    }
}

impl CoreTopologyManager {
    pub fn new(
        local: NodeId,
        hasher: hasher::DynKeyHasher,
        store: store::DynCacheStore,
    ) -> KgResult<Self> {
        // until the transport pushes a first membership event, the
        // cluster is just the local node
        let members = vec![local.clone()];
        let assignment = hasher.assign(&members)?;
        let initial =
            Arc::new(Topology::new(INITIAL_VIEW_ID, members, assignment));
        let (topo_tx, _) = tokio::sync::watch::channel(initial);

        Ok(Self {
            local,
            hasher,
            store,
            topo_tx,
        })
    }
}

impl topo_mgr::TopologyManager for CoreTopologyManager {
    fn local_node(&self) -> NodeId {
        self.local.clone()
    }

    fn current_topology(&self) -> Arc<Topology> {
        self.topo_tx.borrow().clone()
    }

    fn owners_of(&self, key: &Key) -> Vec<NodeId> {
        let topo = self.current_topology();
        let segment = self.hasher.segment_of(key);
        topo.assignment().owners_of(segment).to_vec()
    }

    fn is_owner(&self, key: &Key, scope: topo_mgr::OwnerScope) -> bool {
        let owners = self.owners_of(key);
        match scope {
            topo_mgr::OwnerScope::Primary => {
                owners.first() == Some(&self.local)
            }
            topo_mgr::OwnerScope::Any => owners.contains(&self.local),
        }
    }
}

impl transport::MembershipHandler for CoreTopologyManager {
    fn membership_changed(&self, members: Vec<NodeId>) {
        let assignment = match self.hasher.assign(&members) {
            Ok(assignment) => assignment,
            Err(err) => {
                tracing::warn!(
                    ?err,
                    "could not compute assignment for new member set, \
                     keeping current topology"
                );
                return;
            }
        };

        let mut changed = Vec::new();
        self.topo_tx.send_modify(|current| {
            changed = current.assignment().changed_segments(&assignment);
            *current = Arc::new(Topology::new(
                current.view_id() + 1,
                members,
                assignment.clone(),
            ));
        });

        tracing::debug!(
            moved_segments = changed.len(),
            "published new topology"
        );

        // near entries for reassigned segments are no longer of interest
        // to this node; drop them after the new snapshot is visible
        if !changed.is_empty() {
            let store = self.store.clone();
            tokio::task::spawn(async move {
                if let Err(err) =
                    store.near_invalidate_segments(changed).await
                {
                    tracing::warn!(
                        ?err,
                        "could not invalidate near entries after rehash"
                    );
                }
            });
        }
    }
}
