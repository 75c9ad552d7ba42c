use super::*;
use keygrid_api::hasher::KeyHasher;

fn node(s: &str) -> NodeId {
    NodeId::from(bytes::Bytes::copy_from_slice(s.as_bytes()))
}

fn hasher(num_segments: u32, num_owners: u16) -> SegHasher {
    SegHasher::new(SegHasherConfig {
        num_segments,
        num_owners,
    })
}

#[test]
fn segment_of_is_deterministic_and_in_range() {
    let h = hasher(256, 2);
    assert_eq!(256, h.num_segments());
    assert_eq!(2, h.num_owners());
    for i in 0_u32..1000 {
        let key = Key::from(
            bytes::Bytes::copy_from_slice(&i.to_le_bytes()),
        );
        let seg = h.segment_of(&key);
        assert!(seg < 256);
        assert_eq!(seg, h.segment_of(&key));
    }
}

#[test]
fn segments_are_roughly_uniform() {
    let h = hasher(16, 1);
    let mut counts = [0_u32; 16];
    for i in 0_u32..16_000 {
        let key = Key::from(bytes::Bytes::copy_from_slice(
            format!("key-{i}").as_bytes(),
        ));
        counts[h.segment_of(&key) as usize] += 1;
    }
    for c in counts {
        // 1000 expected per segment, allow a generous spread
        assert!(c > 500, "segment badly underloaded: {c}");
        assert!(c < 1500, "segment badly overloaded: {c}");
    }
}

#[test]
fn assignment_is_deterministic() {
    let h = hasher(64, 2);
    let members = vec![node("a"), node("b"), node("c"), node("d")];
    let m1 = h.assign(&members).unwrap();
    let m2 = h.assign(&members).unwrap();
    assert_eq!(m1, m2);
}

#[test]
fn owner_lists_are_bounded_and_nonempty() {
    let h = hasher(64, 3);
    for count in 1_usize..6 {
        let members: Vec<NodeId> = (0..count)
            .map(|i| node(&format!("node-{i}")))
            .collect();
        let map = h.assign(&members).unwrap();
        assert_eq!(3, map.num_owners());
        for seg in 0..64 {
            let owners = map.owners_of(seg);
            assert_eq!(owners.len(), 3.min(count));
            // an owner list never repeats a member
            let mut dedup = owners.to_vec();
            dedup.sort();
            dedup.dedup();
            assert_eq!(dedup.len(), owners.len());
        }
    }
}

#[test]
fn single_member_owns_everything() {
    let h = hasher(32, 2);
    let map = h.assign(&[node("only")]).unwrap();
    for seg in 0..32 {
        assert_eq!(&[node("only")][..], map.owners_of(seg));
        assert_eq!(Some(&node("only")), map.primary_of(seg));
    }
}

#[test]
fn empty_membership_is_unassigned() {
    let h = hasher(32, 2);
    let map = h.assign(&[]).unwrap();
    for seg in 0..32 {
        assert!(map.owners_of(seg).is_empty());
    }
}

#[test]
fn removing_a_member_only_moves_its_segments() {
    let h = hasher(256, 2);
    let all = vec![node("a"), node("b"), node("c"), node("d")];
    let without_d = vec![node("a"), node("b"), node("c")];

    let before = h.assign(&all).unwrap();
    let after = h.assign(&without_d).unwrap();

    for seg in before.changed_segments(&after) {
        assert!(
            before.owners_of(seg).contains(&node("d")),
            "segment {seg} moved but d did not own it",
        );
    }
}

#[test]
fn adding_a_member_only_claims_segments_it_now_owns() {
    let h = hasher(256, 2);
    let three = vec![node("a"), node("b"), node("c")];
    let four = vec![node("a"), node("b"), node("c"), node("d")];

    let before = h.assign(&three).unwrap();
    let after = h.assign(&four).unwrap();

    for seg in before.changed_segments(&after) {
        assert!(
            after.owners_of(seg).contains(&node("d")),
            "segment {seg} moved without involving the new member",
        );
    }
}

#[test]
fn same_transition_moves_same_segments() {
    let h = hasher(128, 2);
    let all = vec![node("a"), node("b"), node("c"), node("d")];
    let less = vec![node("a"), node("b"), node("c")];

    let moved1 = h
        .assign(&all)
        .unwrap()
        .changed_segments(&h.assign(&less).unwrap());
    let moved2 = h
        .assign(&all)
        .unwrap()
        .changed_segments(&h.assign(&less).unwrap());
    assert_eq!(moved1, moved2);
    assert!(!moved1.is_empty());
}
