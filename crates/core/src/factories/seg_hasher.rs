//! Segment hashing and owner assignment for keygrid.
//!
//! Keys map to segments with a multiply-shift over the first four bytes
//! of the key's SHA-256 digest, so arbitrary user keys cover the fixed
//! segment space uniformly. Owners are
//! assigned per segment by highest-random-weight (rendezvous) hashing:
//! every `(segment, member)` pair gets a stable weight and the
//! `num_owners` heaviest members own the segment, heaviest first.
//!
//! Rendezvous assignment makes the rebalance properties the rest of the
//! system relies on fall out directly:
//!
//! - identical member sets always produce identical assignments,
//! - removing a member only reassigns the segments it owned,
//! - adding a member only claims the segments where it now ranks in the
//!   top `num_owners`,
//!
//! and the same member-set transition always moves the same segments.

use keygrid_api::*;
use sha2::{Digest, Sha256};
use std::sync::Arc;

/// SegHasher configuration types.
mod config {
    /// Configuration parameters for [SegHasherFactory](super::SegHasherFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct SegHasherConfig {
        /// The number of keyspace segments. Fixed for the lifetime of a
        /// cache instance.
        ///
        /// Default: 256.
        pub num_segments: u32,

        /// The maximum owner-list length per segment. A segment has
        /// `min(numOwners, memberCount)` owners.
        ///
        /// Default: 2.
        pub num_owners: u16,
    }

    impl Default for SegHasherConfig {
        fn default() -> Self {
            Self {
                num_segments: 256,
                num_owners: 2,
            }
        }
    }

    /// Module-level configuration for SegHasher.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct SegHasherModConfig {
        /// SegHasher configuration.
        pub seg_hasher: SegHasherConfig,
    }
}

pub use config::*;

/// The production keygrid consistent-hash function.
#[derive(Debug)]
pub struct SegHasherFactory {}

impl SegHasherFactory {
    /// Construct a new SegHasherFactory.
    pub fn create() -> hasher::DynKeyHasherFactory {
        let out: hasher::DynKeyHasherFactory = Arc::new(Self {});
        out
    }
}

impl hasher::KeyHasherFactory for SegHasherFactory {
    fn default_config(
        &self,
        config: &keygrid_api::config::Config,
    ) -> KgResult<()> {
        config.set_module_config(&SegHasherModConfig::default())
    }

    fn validate_config(
        &self,
        config: &keygrid_api::config::Config,
    ) -> KgResult<()> {
        let config: SegHasherModConfig = config.get_module_config()?;
        if config.seg_hasher.num_segments == 0 {
            return Err(KgError::other("numSegments must be at least 1"));
        }
        if config.seg_hasher.num_owners == 0 {
            return Err(KgError::other("numOwners must be at least 1"));
        }
        Ok(())
    }

    fn create(
        &self,
        builder: Arc<builder::Builder>,
    ) -> BoxFut<'static, KgResult<hasher::DynKeyHasher>> {
        Box::pin(async move {
            let config: SegHasherModConfig =
                builder.config.get_module_config()?;
            let out: hasher::DynKeyHasher =
                Arc::new(SegHasher::new(config.seg_hasher));
            Ok(out)
        })
    }
}

struct SegHasher {
    num_segments: u32,
    num_owners: u16,
}

impl std::fmt::Debug for SegHasher {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("SegHasher")
            .field("num_segments", &self.num_segments)
            .field("num_owners", &self.num_owners)
            .finish()
    }
}

impl SegHasher {
    pub fn new(config: SegHasherConfig) -> Self {
        Self {
            num_segments: config.num_segments,
            num_owners: config.num_owners,
        }
    }

    /// The stable weight of a member for a segment.
    fn weight(segment: SegmentId, node: &NodeId) -> u64 {
        let mut hasher = Sha256::new();
        hasher.update(segment.to_le_bytes());
        hasher.update(&***node);
        let digest = hasher.finalize();
        let mut out = [0_u8; 8];
        out.copy_from_slice(&digest[..8]);
        u64::from_le_bytes(out)
    }
}

impl hasher::KeyHasher for SegHasher {
    fn num_segments(&self) -> u32 {
        self.num_segments
    }

    fn num_owners(&self) -> u16 {
        self.num_owners
    }

    fn segment_of(&self, key: &Key) -> SegmentId {
        // keys are arbitrary user bytes, so hash first; multiply-shift
        // then maps the full u32 range evenly onto 0..num_segments
        // without requiring a power-of-two segment count
        let digest = Sha256::digest(&***key);
        let mut out = [0_u8; 4];
        out.copy_from_slice(&digest[..4]);
        let loc = u32::from_le_bytes(out);
        ((loc as u64 * self.num_segments as u64) >> 32) as u32
    }

    fn assign(&self, members: &[NodeId]) -> KgResult<SegmentMap> {
        if members.is_empty() {
            return Ok(SegmentMap::unassigned(
                self.num_segments,
                self.num_owners,
            ));
        }

        let mut owners = Vec::with_capacity(self.num_segments as usize);
        for segment in 0..self.num_segments {
            let mut ranked: Vec<(u64, &NodeId)> = members
                .iter()
                .map(|m| (Self::weight(segment, m), m))
                .collect();
            // weight ties broken by node id so the ranking is total
            ranked.sort_by(|a, b| b.0.cmp(&a.0).then_with(|| a.1.cmp(b.1)));
            owners.push(
                ranked
                    .into_iter()
                    .take(self.num_owners as usize)
                    .map(|(_, m)| m.clone())
                    .collect(),
            );
        }

        SegmentMap::new(owners, self.num_owners)
    }
}

#[cfg(test)]
mod test;
