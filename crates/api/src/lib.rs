#![deny(missing_docs)]
//! Keygrid API contains the keygrid module traits and the basic types
//! required to define the api of those traits.
//!
//! Keygrid is the key-ownership and remote-retrieval core of a distributed
//! in-memory data grid: a cache whose keyspace is partitioned into a fixed
//! number of segments, each segment assigned to an ordered list of owning
//! nodes. The traits here define the seams between the pieces of that core:
//!
//! - [hasher::KeyHasher] - key to segment, member set to segment assignment.
//! - [topo_mgr::TopologyManager] - holds the current [topology::Topology]
//!   snapshot and answers ownership queries.
//! - [store::CacheStore] - authoritative storage for owned segments plus a
//!   bounded non-authoritative near-cache.
//! - [retrieval::Retrieval] - orchestrates remote GET round-trips.
//! - [transport::Transport] - cluster messaging and the membership-change
//!   event source, implemented outside this subsystem.
//!
//! If you want default implementations of these traits, please see the
//! keygrid_core crate.

/// Boxed future type.
pub type BoxFut<'a, T> =
    std::pin::Pin<Box<dyn std::future::Future<Output = T> + Send + 'a>>;

pub(crate) mod serde_bytes_base64 {
    pub fn serialize<S>(
        b: &bytes::Bytes,
        serializer: S,
    ) -> Result<S::Ok, S::Error>
    where
        S: serde::Serializer,
    {
        use base64::prelude::*;
        serializer.serialize_str(&BASE64_URL_SAFE_NO_PAD.encode(b))
    }

    pub fn deserialize<'de, D, T: From<bytes::Bytes>>(
        deserializer: D,
    ) -> Result<T, D::Error>
    where
        D: serde::Deserializer<'de>,
    {
        use base64::prelude::*;
        let s: &'de str = serde::Deserialize::deserialize(deserializer)?;
        BASE64_URL_SAFE_NO_PAD
            .decode(s)
            .map(|v| bytes::Bytes::copy_from_slice(&v).into())
            .map_err(serde::de::Error::custom)
    }
}

pub mod builder;
pub mod config;
pub mod hasher;
pub mod retrieval;
pub mod store;
pub mod topo_mgr;
pub mod transport;

mod error;
pub use error::*;

pub mod id;
pub use id::{Id, Key, NodeId};

mod timestamp;
pub use timestamp::*;

mod entry;
pub use entry::*;

pub mod topology;
pub use topology::{SegmentId, SegmentMap, Topology};
