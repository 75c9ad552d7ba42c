//! Cluster topology snapshot types.
//!
//! A [Topology] is an immutable, versioned picture of the cluster: the
//! member set plus the segment-ownership assignment computed for it.
//! Topologies are replaced wholesale on membership change, never mutated
//! in place, and shared as `Arc<Topology>` so readers always observe a
//! complete snapshot.

use crate::*;

/// Index of a keyspace segment, `0..num_segments`.
pub type SegmentId = u32;

/// Mapping from segment to its ordered owner list, primary first.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SegmentMap {
    num_owners: u16,
    owners: Vec<Vec<NodeId>>,
}

impl SegmentMap {
    /// Construct a segment map from per-segment owner lists.
    ///
    /// Fails if any owner list is longer than `num_owners`, or if any
    /// owner list is empty while another is not. (All-empty is the
    /// degenerate zero-member assignment.)
    pub fn new(
        owners: Vec<Vec<NodeId>>,
        num_owners: u16,
    ) -> KgResult<Self> {
        let any_owned = owners.iter().any(|l| !l.is_empty());
        for (seg, list) in owners.iter().enumerate() {
            if list.len() > num_owners as usize {
                return Err(KgError::other(format!(
                    "segment {seg} has {} owners, max is {num_owners}",
                    list.len()
                )));
            }
            if any_owned && list.is_empty() {
                return Err(KgError::other(format!(
                    "segment {seg} has no owner in a non-empty cluster"
                )));
            }
        }
        Ok(Self { num_owners, owners })
    }

    /// An assignment over zero members: every segment unowned.
    pub fn unassigned(num_segments: u32, num_owners: u16) -> Self {
        Self {
            num_owners,
            owners: vec![Vec::new(); num_segments as usize],
        }
    }

    /// The fixed segment count of this map.
    pub fn num_segments(&self) -> u32 {
        self.owners.len() as u32
    }

    /// The configured maximum owner-list length.
    pub fn num_owners(&self) -> u16 {
        self.num_owners
    }

    /// The ordered owner list for a segment, primary first.
    /// Empty only for out-of-range segments or a zero-member assignment.
    pub fn owners_of(&self, segment: SegmentId) -> &[NodeId] {
        self.owners
            .get(segment as usize)
            .map(|l| l.as_slice())
            .unwrap_or(&[])
    }

    /// The primary owner of a segment, if assigned.
    pub fn primary_of(&self, segment: SegmentId) -> Option<&NodeId> {
        self.owners_of(segment).first()
    }

    /// Segments whose owner list differs between this map and `other`.
    ///
    /// Ordering within the list is significant: a primary/backup swap
    /// counts as a change.
    pub fn changed_segments(&self, other: &SegmentMap) -> Vec<SegmentId> {
        (0..self.num_segments().max(other.num_segments()))
            .filter(|s| self.owners_of(*s) != other.owners_of(*s))
            .collect()
    }
}

/// An immutable, versioned snapshot of cluster membership plus the
/// current segment-ownership assignment.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct Topology {
    view_id: u64,
    members: Vec<NodeId>,
    assignment: SegmentMap,
}

impl Topology {
    /// Construct a topology snapshot. Members are sorted and deduped so
    /// the same member set always yields the same snapshot.
    pub fn new(
        view_id: u64,
        mut members: Vec<NodeId>,
        assignment: SegmentMap,
    ) -> Self {
        members.sort();
        members.dedup();
        Self {
            view_id,
            members,
            assignment,
        }
    }

    /// Monotonically increasing view id. In-flight operations capture
    /// this at start for staleness detection.
    pub fn view_id(&self) -> u64 {
        self.view_id
    }

    /// The ordered member set.
    pub fn members(&self) -> &[NodeId] {
        &self.members
    }

    /// Whether the given node is a cluster member in this snapshot.
    pub fn is_member(&self, node: &NodeId) -> bool {
        self.members.binary_search(node).is_ok()
    }

    /// The segment-ownership assignment of this snapshot.
    pub fn assignment(&self) -> &SegmentMap {
        &self.assignment
    }
}

#[cfg(test)]
mod test {
    use super::*;

    fn node(s: &str) -> NodeId {
        NodeId::from(bytes::Bytes::copy_from_slice(s.as_bytes()))
    }

    #[test]
    fn owner_list_len_is_bounded() {
        let too_many =
            vec![vec![node("a"), node("b"), node("c")], vec![node("a")]];
        assert!(SegmentMap::new(too_many, 2).is_err());

        let ok = vec![vec![node("a"), node("b")], vec![node("b")]];
        let map = SegmentMap::new(ok, 2).unwrap();
        assert_eq!(2, map.num_segments());
        assert_eq!(Some(&node("a")), map.primary_of(0));
    }

    #[test]
    fn no_unowned_segment_in_nonempty_cluster() {
        let holey = vec![vec![node("a")], vec![]];
        assert!(SegmentMap::new(holey, 2).is_err());

        // all-empty is the degenerate zero-member assignment
        assert!(SegmentMap::new(vec![vec![], vec![]], 2).is_ok());
    }

    #[test]
    fn changed_segments_respects_order() {
        let a = SegmentMap::new(
            vec![vec![node("a"), node("b")], vec![node("b")]],
            2,
        )
        .unwrap();
        let b = SegmentMap::new(
            vec![vec![node("b"), node("a")], vec![node("b")]],
            2,
        )
        .unwrap();
        assert_eq!(vec![0], a.changed_segments(&b));
        assert!(a.changed_segments(&a).is_empty());
    }

    #[test]
    fn members_sorted_and_deduped() {
        let t = Topology::new(
            1,
            vec![node("b"), node("a"), node("b")],
            SegmentMap::unassigned(4, 2),
        );
        assert_eq!(&[node("a"), node("b")][..], t.members());
        assert!(t.is_member(&node("a")));
        assert!(!t.is_member(&node("c")));
    }
}
