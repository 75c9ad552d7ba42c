//! Keygrid module factory implementations.

mod seg_hasher;
pub use seg_hasher::*;

mod mem_cache_store;
pub use mem_cache_store::*;

mod core_topology;
pub use core_topology::*;

mod core_retrieval;
pub use core_retrieval::*;

mod mem_transport;
pub use mem_transport::*;
