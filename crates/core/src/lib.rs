#![deny(missing_docs)]
//! Keygrid distributed key-ownership and remote-retrieval core.
//!
//! This crate provides the production module implementations behind the
//! [keygrid_api] traits:
//!
//! - [factories::SegHasherFactory] - segment hashing and rendezvous-based
//!   owner assignment.
//! - [factories::MemCacheStoreFactory] - in-memory owned storage plus a
//!   bounded near-cache.
//! - [factories::CoreTopologyManagerFactory] - versioned topology
//!   snapshots, atomically published on membership change.
//! - [factories::CoreRetrievalFactory] - the remote GET coordinator.
//! - [factories::MemTransportFactory] - an in-process transport hub for
//!   tests and single-process deployments.
//!
//! [node::GridNode] assembles these into a running grid node.

use keygrid_api::{builder::Builder, config::Config};

/// Construct a default builder.
///
/// - `hasher` - The default key hasher is [factories::SegHasherFactory].
/// - `store` - The default cache store is [factories::MemCacheStoreFactory].
/// - `topo_mgr` - The default topology manager is
///   [factories::CoreTopologyManagerFactory].
/// - `retrieval` - The default retrieval module is
///   [factories::CoreRetrievalFactory].
/// - `transport` - The default transport is [factories::MemTransportFactory].
///   Note: a real deployment will want to supply its own cluster transport.
pub fn default_builder() -> Builder {
    Builder {
        config: Config::default(),
        hasher: factories::SegHasherFactory::create(),
        store: factories::MemCacheStoreFactory::create(),
        topo_mgr: factories::CoreTopologyManagerFactory::create(),
        retrieval: factories::CoreRetrievalFactory::create(),
        transport: factories::MemTransportFactory::create(),
    }
}

/// Construct a builder for testing. Identical to [default_builder], with
/// the in-process mem transport as the cluster fabric.
pub fn default_test_builder() -> Builder {
    default_builder()
}

pub mod factories;
pub mod node;
