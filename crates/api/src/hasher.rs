//! Consistent-hash related types.

use crate::*;
use std::sync::Arc;

/// Deterministic mapping from key to segment, and from a member set to a
/// full segment-ownership assignment.
///
/// Implementations must be pure functions of their inputs:
/// - `segment_of` must be deterministic and uniform across the segment
///   space for a fixed `num_segments`.
/// - `assign` must yield identical output for identical member sets, and
///   must minimize ownership churn: adding or removing one member moves
///   only the segments whose owner set must change to preserve balance.
///   The same member-set transition always moves the same set of
///   segments, which is what makes rebalancing testable.
///
/// `num_segments` is fixed for the lifetime of a cache instance.
pub trait KeyHasher: 'static + Send + Sync + std::fmt::Debug {
    /// The fixed segment count this hasher maps keys into.
    fn num_segments(&self) -> u32;

    /// The configured maximum owner-list length per segment.
    fn num_owners(&self) -> u16;

    /// Map a key to its segment, `0..num_segments`.
    fn segment_of(&self, key: &Key) -> SegmentId;

    /// Compute the full segment assignment for a member set.
    ///
    /// Every owner list has length `min(num_owners, |members|)`, primary
    /// first. An empty member set yields the all-unassigned map.
    fn assign(&self, members: &[NodeId]) -> KgResult<SegmentMap>;
}

/// Trait-object [KeyHasher].
pub type DynKeyHasher = Arc<dyn KeyHasher>;

/// A factory for constructing [KeyHasher] instances.
pub trait KeyHasherFactory: 'static + Send + Sync + std::fmt::Debug {
    /// Help the builder construct a default config from the chosen
    /// module factories.
    fn default_config(&self, config: &config::Config) -> KgResult<()>;

    /// Validate configuration.
    fn validate_config(&self, config: &config::Config) -> KgResult<()>;

    /// Construct a key hasher instance.
    fn create(
        &self,
        builder: Arc<builder::Builder>,
    ) -> BoxFut<'static, KgResult<DynKeyHasher>>;
}

/// Trait-object [KeyHasherFactory].
pub type DynKeyHasherFactory = Arc<dyn KeyHasherFactory>;
