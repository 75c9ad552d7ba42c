use super::*;
use crate::factories::{MemTransportConfig, MemTransportHub, MemTransportModConfig};
use crate::node::GridNode;
use keygrid_test_utils::{enable_tracing, random_test_id, RecordingListener};

fn node(s: &str) -> NodeId {
    NodeId::from(bytes::Bytes::copy_from_slice(s.as_bytes()))
}

async fn make_node(
    test_id: &str,
    name: &str,
    retrieval: Option<CoreRetrievalConfig>,
) -> GridNode {
    let builder = crate::default_test_builder().with_default_config().unwrap();
    builder
        .config
        .set_module_config(&MemTransportModConfig {
            mem_transport: MemTransportConfig {
                test_id: test_id.into(),
            },
        })
        .unwrap();
    if let Some(retrieval) = retrieval {
        builder
            .config
            .set_module_config(&CoreRetrievalModConfig {
                core_retrieval: retrieval,
            })
            .unwrap();
    }
    GridNode::create(builder.build(), node(name)).await.unwrap()
}

/// Three nodes, returning a key that the first node does not own.
/// The default hasher config assigns two owners per segment, so the key
/// has exactly one primary and one backup among the other two nodes.
async fn three_node_setup(
    retrieval: Option<CoreRetrievalConfig>,
) -> (Arc<MemTransportHub>, Vec<GridNode>, Key) {
    let test_id = random_test_id();
    let mut nodes = Vec::new();
    for name in ["a", "b", "c"] {
        nodes.push(make_node(&test_id, name, retrieval.clone()).await);
    }
    let hub = MemTransportHub::get(&test_id);
    let members: Vec<NodeId> =
        nodes.iter().map(|n| n.local_node().clone()).collect();
    hub.publish_membership(members);

    let requester = &nodes[0];
    let key = (0..10_000)
        .map(|i| Key::from(format!("k{i}").as_str()))
        .find(|k| {
            !requester
                .topo_mgr()
                .owners_of(k)
                .contains(requester.local_node())
        })
        .expect("no key owned exclusively by the other nodes");
    (hub, nodes, key)
}

fn owner_node<'a>(nodes: &'a [GridNode], id: &NodeId) -> &'a GridNode {
    nodes.iter().find(|n| n.local_node() == id).unwrap()
}

#[test]
fn config_defaults() {
    let config = CoreRetrievalModConfig::default();
    let json = serde_json::to_string(&config).unwrap();
    assert_eq!(
        "{\"coreRetrieval\":{\"fanOut\":\"allOwners\",\"getTimeoutMs\":2000,\"maxTopologyRetries\":4,\"nearTtlMs\":60000}}",
        json,
    );
    let parsed: CoreRetrievalModConfig =
        serde_json::from_str(&json).unwrap();
    assert_eq!(FanOut::AllOwners, parsed.core_retrieval.fan_out);
}

#[tokio::test(flavor = "multi_thread")]
async fn all_owners_settles_on_fastest_owner() {
    enable_tracing();
    let (hub, nodes, key) = three_node_setup(None).await;
    let requester = &nodes[0];
    let owners = requester.topo_mgr().owners_of(&key);

    // the primary is down, only the backup holds the value
    hub.set_unreachable(&owners[0], true);
    let entry = CacheEntry::new(
        key.clone(),
        bytes::Bytes::from_static(b"42"),
        1,
    );
    owner_node(&nodes, &owners[1])
        .put(entry.clone())
        .await
        .unwrap();

    let listener = Arc::new(RecordingListener::default());
    let got = requester
        .get(key.clone(), listener.clone())
        .await
        .unwrap();

    assert_eq!(Some(entry.clone()), got);
    assert_eq!(vec![entry], listener.found());
    assert_eq!(1, listener.call_count());
}

#[tokio::test(flavor = "multi_thread")]
async fn primary_only_never_asks_the_backup() {
    enable_tracing();
    let (hub, nodes, key) = three_node_setup(Some(CoreRetrievalConfig {
        fan_out: FanOut::PrimaryOnly,
        get_timeout_ms: 200,
        ..Default::default()
    }))
    .await;
    let requester = &nodes[0];
    let owners = requester.topo_mgr().owners_of(&key);

    hub.set_unreachable(&owners[0], true);
    owner_node(&nodes, &owners[1])
        .put(CacheEntry::new(
            key.clone(),
            bytes::Bytes::from_static(b"42"),
            1,
        ))
        .await
        .unwrap();

    // the backup holds the value but only the primary is queried
    let listener = Arc::new(RecordingListener::default());
    let err = requester
        .get(key.clone(), listener.clone())
        .await
        .unwrap_err();

    assert!(
        matches!(err, KgError::RetrievalTimeout { elapsed_ms } if elapsed_ms >= 200),
        "{err:?}",
    );
    assert_eq!(0, listener.call_count());
}

#[tokio::test(flavor = "multi_thread")]
async fn found_value_populates_the_near_cache() {
    enable_tracing();
    let (_hub, nodes, key) = three_node_setup(None).await;
    let requester = &nodes[0];
    let owners = requester.topo_mgr().owners_of(&key);

    let entry = CacheEntry::new(
        key.clone(),
        bytes::Bytes::from_static(b"42"),
        7,
    );
    for owner in &owners {
        owner_node(&nodes, owner).put(entry.clone()).await.unwrap();
    }

    let listener = Arc::new(RecordingListener::default());
    let got = requester
        .get(key.clone(), listener.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.value, got.value);
    assert_eq!(entry.meta.version, got.meta.version);
    assert_eq!(1, listener.call_count());

    // the near copy answers the next read without another callback
    let near = requester
        .store()
        .near_get(key.clone())
        .await
        .unwrap()
        .expect("near cache not populated");
    assert_eq!(entry.value, near.value);
    assert!(near.meta.expires_at.is_some());

    let again = requester
        .get(key.clone(), listener.clone())
        .await
        .unwrap()
        .unwrap();
    assert_eq!(entry.value, again.value);
    assert_eq!(1, listener.call_count());
}

#[tokio::test(flavor = "multi_thread")]
async fn backup_owner_miss_asks_primary_without_near_populate() {
    enable_tracing();
    let test_id = random_test_id();
    let mut nodes = Vec::new();
    for name in ["a", "b", "c"] {
        nodes.push(make_node(&test_id, name, None).await);
    }
    let hub = MemTransportHub::get(&test_id);
    let members: Vec<NodeId> =
        nodes.iter().map(|n| n.local_node().clone()).collect();
    hub.publish_membership(members);

    // a key where the first node is a backup owner, not primary
    let requester = &nodes[0];
    let key = (0..10_000)
        .map(|i| Key::from(format!("k{i}").as_str()))
        .find(|k| {
            let owners = requester.topo_mgr().owners_of(k);
            owners.len() == 2 && &owners[1] == requester.local_node()
        })
        .expect("no key with the first node as backup");
    let primary = requester.topo_mgr().owners_of(&key)[0].clone();

    let entry = CacheEntry::new(
        key.clone(),
        bytes::Bytes::from_static(b"42"),
        1,
    );
    owner_node(&nodes, &primary).put(entry.clone()).await.unwrap();

    let listener = Arc::new(RecordingListener::default());
    let got = requester
        .get(key.clone(), listener.clone())
        .await
        .unwrap();
    assert_eq!(Some(entry), got);
    assert_eq!(1, listener.call_count());

    // an owner serves from authoritative storage; it never keeps a
    // near copy of its own keys
    assert!(requester
        .store()
        .near_get(key.clone())
        .await
        .unwrap()
        .is_none());
}
