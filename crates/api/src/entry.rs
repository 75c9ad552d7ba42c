//! Cache entry types.

use crate::*;

/// Metadata carried alongside a cache value.
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct EntryMeta {
    /// Monotonic per-key version stamped by the writing owner.
    /// Observers can compare versions to detect stale copies.
    pub version: u64,

    /// When this entry stops being valid, if ever.
    ///
    /// Entries held as [EntrySource::NearCache] always carry an expiry.
    pub expires_at: Option<Timestamp>,
}

/// Marks whether an entry is an authoritative copy or a near-cache copy.
#[derive(
    Debug,
    Clone,
    Copy,
    PartialEq,
    Eq,
    serde::Serialize,
    serde::Deserialize,
)]
pub enum EntrySource {
    /// An authoritative copy held because the local node owns the
    /// key's segment.
    Owned,

    /// A non-authoritative copy populated by a remote retrieval.
    /// Never promoted to [EntrySource::Owned].
    NearCache,
}

/// A single cache entry: key, value and metadata.
///
/// The source tag is not part of the entry itself; it is assigned by the
/// store holding the entry. A value fetched from a remote owner arrives
/// as plain entry data and becomes a near-cache copy only once the local
/// store files it as one.
#[derive(
    Debug, Clone, PartialEq, Eq, serde::Serialize, serde::Deserialize,
)]
pub struct CacheEntry {
    /// The key this entry is stored under.
    pub key: Key,

    /// The value bytes.
    #[serde(with = "crate::serde_bytes_base64")]
    pub value: bytes::Bytes,

    /// Version and expiry metadata.
    pub meta: EntryMeta,
}

impl CacheEntry {
    /// Construct an entry with the given version and no expiry.
    pub fn new(key: Key, value: bytes::Bytes, version: u64) -> Self {
        Self {
            key,
            value,
            meta: EntryMeta {
                version,
                expires_at: None,
            },
        }
    }

    /// Whether the entry's expiry, if any, has passed at `now`.
    pub fn is_expired(&self, now: Timestamp) -> bool {
        match self.meta.expires_at {
            Some(at) => at <= now,
            None => false,
        }
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn expiry_check() {
        let mut e = CacheEntry::new(
            Key::from("k"),
            bytes::Bytes::from_static(b"v"),
            1,
        );
        let now = Timestamp::now();
        assert!(!e.is_expired(now));

        e.meta.expires_at = Some(now);
        assert!(e.is_expired(now));

        e.meta.expires_at =
            Some(now + std::time::Duration::from_secs(60));
        assert!(!e.is_expired(now));
    }

    #[test]
    fn entry_serde_round_trip() {
        let e = CacheEntry::new(
            Key::from("k1"),
            bytes::Bytes::from_static(b"42"),
            7,
        );
        let enc = serde_json::to_string(&e).unwrap();
        let dec: CacheEntry = serde_json::from_str(&enc).unwrap();
        assert_eq!(e, dec);
    }
}
