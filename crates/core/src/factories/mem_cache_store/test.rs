use super::*;
use std::time::Duration;

async fn make_store(near_max_entries: u32) -> store::DynCacheStore {
    let builder =
        Arc::new(crate::default_test_builder().with_default_config().unwrap());
    builder
        .config
        .set_module_config(&MemCacheStoreModConfig {
            mem_cache_store: MemCacheStoreConfig {
                near_max_entries,
                ..Default::default()
            },
        })
        .unwrap();
    let hasher = builder.hasher.create(builder.clone()).await.unwrap();
    builder
        .store
        .create(builder.clone(), hasher)
        .await
        .unwrap()
}

fn entry(key: &str, value: &[u8], version: u64) -> CacheEntry {
    CacheEntry::new(
        Key::from(key),
        bytes::Bytes::copy_from_slice(value),
        version,
    )
}

#[tokio::test]
async fn owned_put_get_remove() {
    let store = make_store(16).await;
    let e = entry("k1", b"v1", 1);

    assert_eq!(None, store.get(e.key.clone()).await.unwrap());

    store.put(e.clone()).await.unwrap();
    assert_eq!(Some(e.clone()), store.get(e.key.clone()).await.unwrap());

    // repeated reads with no intervening write return the same value
    assert_eq!(Some(e.clone()), store.get(e.key.clone()).await.unwrap());

    store.remove(e.key.clone()).await.unwrap();
    assert_eq!(None, store.get(e.key).await.unwrap());
}

#[tokio::test]
async fn owned_side_never_sees_near_entries() {
    let store = make_store(16).await;
    let e = entry("k1", b"v1", 1);

    store
        .near_put(e.clone(), Duration::from_secs(60))
        .await
        .unwrap();

    assert_eq!(None, store.get(e.key.clone()).await.unwrap());
    assert!(store.near_get(e.key).await.unwrap().is_some());
}

#[tokio::test]
async fn near_entries_carry_expiry() {
    let store = make_store(16).await;
    let e = entry("k1", b"v1", 1);
    assert_eq!(None, e.meta.expires_at);

    store
        .near_put(e.clone(), Duration::from_secs(60))
        .await
        .unwrap();

    let got = store.near_get(e.key).await.unwrap().unwrap();
    let at = got.meta.expires_at.expect("near entry must have expiry");
    assert!(at > Timestamp::now());
    assert!(at <= Timestamp::now() + Duration::from_secs(60));
}

#[tokio::test]
async fn expired_near_entries_are_not_returned() {
    let store = make_store(16).await;
    let e = entry("k1", b"v1", 1);

    store
        .near_put(e.clone(), Duration::from_millis(0))
        .await
        .unwrap();

    assert_eq!(None, store.near_get(e.key).await.unwrap());
}

#[tokio::test]
async fn near_side_is_bounded_and_evicts_by_recency() {
    let store = make_store(3).await;

    for i in 0..3 {
        store
            .near_put(
                entry(&format!("k{i}"), b"v", 1),
                Duration::from_secs(60),
            )
            .await
            .unwrap();
    }

    // touch k0 so k1 becomes the least recently used
    assert!(store.near_get(Key::from("k0")).await.unwrap().is_some());

    store
        .near_put(entry("k3", b"v", 1), Duration::from_secs(60))
        .await
        .unwrap();

    assert!(store.near_get(Key::from("k0")).await.unwrap().is_some());
    assert_eq!(None, store.near_get(Key::from("k1")).await.unwrap());
    assert!(store.near_get(Key::from("k2")).await.unwrap().is_some());
    assert!(store.near_get(Key::from("k3")).await.unwrap().is_some());
}

#[tokio::test]
async fn near_invalidate_by_key_and_all() {
    let store = make_store(16).await;

    store
        .near_put(entry("k1", b"v", 1), Duration::from_secs(60))
        .await
        .unwrap();
    store
        .near_put(entry("k2", b"v", 1), Duration::from_secs(60))
        .await
        .unwrap();

    store.near_invalidate(Key::from("k1")).await.unwrap();
    assert_eq!(None, store.near_get(Key::from("k1")).await.unwrap());
    assert!(store.near_get(Key::from("k2")).await.unwrap().is_some());

    store.near_invalidate_all().await.unwrap();
    assert_eq!(None, store.near_get(Key::from("k2")).await.unwrap());
}

#[tokio::test]
async fn near_invalidate_by_segment() {
    let hasher = {
        let builder = Arc::new(
            crate::default_test_builder().with_default_config().unwrap(),
        );
        builder.hasher.create(builder.clone()).await.unwrap()
    };
    let store = make_store(64).await;

    let k1 = Key::from("k1");
    let k2 = Key::from("k2");
    store
        .near_put(entry("k1", b"v", 1), Duration::from_secs(60))
        .await
        .unwrap();
    store
        .near_put(entry("k2", b"v", 1), Duration::from_secs(60))
        .await
        .unwrap();

    store
        .near_invalidate_segments(vec![hasher.segment_of(&k1)])
        .await
        .unwrap();

    assert_eq!(None, store.near_get(k1).await.unwrap());
    if hasher.segment_of(&k2) != hasher.segment_of(&Key::from("k1")) {
        assert!(store.near_get(k2).await.unwrap().is_some());
    }
}
