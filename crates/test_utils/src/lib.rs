//! Testing utilities for keygrid crates.

use keygrid_api::*;

/// Enable tracing with the RUST_LOG environment variable.
///
/// This is intended to be used in tests, so it defaults to DEBUG level.
pub fn enable_tracing() {
    let _ = tracing_subscriber::fmt()
        .with_env_filter(
            tracing_subscriber::EnvFilter::builder()
                .with_default_directive(tracing::Level::DEBUG.into())
                .from_env_lossy(),
        )
        .try_init();
}

/// Generate some random bytes of the given length.
pub fn random_bytes(len: usize) -> bytes::Bytes {
    use rand::Rng;
    let mut out = vec![0_u8; len];
    rand::thread_rng().fill(&mut out[..]);
    bytes::Bytes::from(out)
}

/// Generate a random node id.
pub fn random_node_id() -> NodeId {
    NodeId::from(random_bytes(32))
}

/// Generate a random key.
pub fn random_key() -> Key {
    Key::from(random_bytes(32))
}

/// Construct a cache entry with random value bytes.
pub fn random_entry(key: Key, version: u64) -> CacheEntry {
    CacheEntry::new(key, random_bytes(32), version)
}

/// Generate a random test id for isolating in-process transport hubs
/// between tests.
pub fn random_test_id() -> String {
    use rand::Rng;
    format!("test-{}", rand::thread_rng().gen::<u64>())
}

/// A retrieval listener that records every callback it receives.
#[derive(Debug, Default)]
pub struct RecordingListener {
    found: std::sync::Mutex<Vec<CacheEntry>>,
    not_found: std::sync::Mutex<Vec<Key>>,
}

impl RecordingListener {
    /// Entries reported found so far.
    pub fn found(&self) -> Vec<CacheEntry> {
        self.found.lock().unwrap().clone()
    }

    /// Keys reported not found so far.
    pub fn not_found(&self) -> Vec<Key> {
        self.not_found.lock().unwrap().clone()
    }

    /// Total callback count across both outcomes.
    pub fn call_count(&self) -> usize {
        self.found.lock().unwrap().len()
            + self.not_found.lock().unwrap().len()
    }
}

impl retrieval::RetrievalListener for RecordingListener {
    fn remote_value_found(&self, entry: &CacheEntry) {
        self.found.lock().unwrap().push(entry.clone());
    }

    fn remote_value_not_found(&self, key: &Key) {
        self.not_found.lock().unwrap().push(key.clone());
    }
}

/// Repeat a check in a loop with a small sleep until it passes or a
/// 5 second cap elapses.
#[macro_export]
macro_rules! iter_check {
    ($code:block) => {
        let start = std::time::Instant::now();
        loop {
            $code

            if start.elapsed() > std::time::Duration::from_secs(5) {
                panic!("iter_check timed out");
            }

            tokio::time::sleep(std::time::Duration::from_millis(10))
                .await;
        }
    };
}
