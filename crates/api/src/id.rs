//! Types dealing with data identity or hashing.

macro_rules! imp_deref {
    ($i:ty, $t:ty) => {
        impl std::ops::Deref for $i {
            type Target = $t;

            fn deref(&self) -> &Self::Target {
                &self.0
            }
        }
    };
}

macro_rules! imp_from {
    ($a:ty, $b:ty, $i:ident => $e:expr) => {
        impl From<$b> for $a {
            fn from($i: $b) -> Self {
                $e
            }
        }
    };
}

/// Base data identity type meant for newtyping.
/// You probably want [NodeId] or [Key].
///
/// In keygrid these bytes are the raw identity being tracked, without
/// prefix or suffix.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
pub struct Id(#[serde(with = "crate::serde_bytes_base64")] pub bytes::Bytes);

imp_deref!(Id, bytes::Bytes);
imp_from!(Id, bytes::Bytes, b => Id(b));

/// The default display function encodes the Id as base64.
/// This makes debugging so much easier than rust's default of decimal array.
fn display(
    b: &bytes::Bytes,
    f: &mut std::fmt::Formatter<'_>,
) -> std::fmt::Result {
    use base64::prelude::*;
    f.write_str(&BASE64_URL_SAFE_NO_PAD.encode(b))
}

impl std::fmt::Display for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0, f)
    }
}

impl std::fmt::Debug for Id {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0, f)
    }
}

/// Identifies a cluster member node.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct NodeId(pub Id);

imp_deref!(NodeId, Id);
imp_from!(NodeId, bytes::Bytes, b => NodeId(Id(b)));
imp_from!(NodeId, Id, b => NodeId(b));

impl std::fmt::Display for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0 .0, f)
    }
}

impl std::fmt::Debug for NodeId {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0 .0, f)
    }
}

/// Identifies a cache entry within the grid keyspace.
#[derive(
    Clone,
    PartialEq,
    Eq,
    PartialOrd,
    Ord,
    Hash,
    serde::Serialize,
    serde::Deserialize,
)]
#[serde(transparent)]
pub struct Key(pub Id);

imp_deref!(Key, Id);
imp_from!(Key, bytes::Bytes, b => Key(Id(b)));
imp_from!(Key, Id, b => Key(b));

impl From<&str> for Key {
    fn from(s: &str) -> Self {
        Key(Id(bytes::Bytes::copy_from_slice(s.as_bytes())))
    }
}

impl std::fmt::Display for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0 .0, f)
    }
}

impl std::fmt::Debug for Key {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        display(&self.0 .0, f)
    }
}

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn id_serde_fixtures() {
        const F: &[(&[u8], &str)] = &[
            (b"test-key-1", "\"dGVzdC1rZXktMQ\""),
            (b"s", "\"cw\""),
            (&[255, 255, 255, 255, 255, 255, 255], "\"_________w\""),
        ];

        for (d, e) in F.iter() {
            let r = serde_json::to_string(&Id(bytes::Bytes::from_static(d)))
                .unwrap();
            assert_eq!(e, &r);
            let r: Key = serde_json::from_str(e).unwrap();
            assert_eq!(d, &r.0 .0);
        }
    }
}
