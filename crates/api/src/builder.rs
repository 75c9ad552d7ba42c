//! Builder-related types.

use crate::*;
use std::sync::Arc;

/// The general keygrid builder.
/// This contains both configuration and factory instances,
/// allowing construction of runtime module instances.
#[derive(Debug)]
pub struct Builder {
    /// The module configuration to be used when building modules.
    /// This can be loaded from disk or modified before freezing the
    /// builder.
    pub config: config::Config,

    /// The [hasher::KeyHasherFactory] to be used for creating
    /// [hasher::KeyHasher] instances.
    pub hasher: hasher::DynKeyHasherFactory,

    /// The [store::CacheStoreFactory] to be used for creating
    /// [store::CacheStore] instances.
    pub store: store::DynCacheStoreFactory,

    /// The [topo_mgr::TopologyManagerFactory] to be used for creating
    /// [topo_mgr::TopologyManager] instances.
    pub topo_mgr: topo_mgr::DynTopologyManagerFactory,

    /// The [retrieval::RetrievalFactory] to be used for creating
    /// [retrieval::Retrieval] instances.
    pub retrieval: retrieval::DynRetrievalFactory,

    /// The [transport::TransportFactory] to be used for creating
    /// [transport::Transport] instances.
    pub transport: transport::DynTransportFactory,
}

impl Builder {
    /// Populate the config with defaults from the configured module
    /// factories. Note, this should be called before freezing the
    /// Builder instance in an Arc<>.
    pub fn with_default_config(self) -> KgResult<Self> {
        {
            let Self {
                config,
                hasher,
                store,
                topo_mgr,
                retrieval,
                transport,
            } = &self;

            hasher.default_config(config)?;
            store.default_config(config)?;
            topo_mgr.default_config(config)?;
            retrieval.default_config(config)?;
            transport.default_config(config)?;
        }

        Ok(self)
    }

    /// Validate the full config against every configured module factory.
    pub fn validate_config(&self) -> KgResult<()> {
        let Self {
            config,
            hasher,
            store,
            topo_mgr,
            retrieval,
            transport,
        } = self;

        hasher.validate_config(config)?;
        store.validate_config(config)?;
        topo_mgr.validate_config(config)?;
        retrieval.validate_config(config)?;
        transport.validate_config(config)?;

        Ok(())
    }

    /// Freeze the builder for module construction.
    pub fn build(self) -> Arc<Self> {
        Arc::new(self)
    }
}
