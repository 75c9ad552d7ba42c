//! Keygrid error types.

use std::sync::Arc;

/// A clonable trait-object inner error.
#[derive(Clone, Default)]
pub struct DynInnerError(
    pub Option<Arc<dyn std::error::Error + 'static + Send + Sync>>,
);

impl std::fmt::Debug for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        self.0.fmt(f)
    }
}

impl std::fmt::Display for DynInnerError {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        match self.0.as_ref() {
            None => f.write_str("None"),
            Some(s) => s.fmt(f),
        }
    }
}

impl std::error::Error for DynInnerError {
    fn source(&self) -> Option<&(dyn std::error::Error + 'static)> {
        self.0.as_ref().map(|s| {
            let out: &(dyn std::error::Error + 'static) = &**s;
            out
        })
    }
}

impl DynInnerError {
    /// Construct a new DynInnerError from a source error.
    pub fn new<E: std::error::Error + 'static + Send + Sync>(e: E) -> Self {
        Self(Some(Arc::new(e)))
    }
}

/// The core keygrid error type. This type is used in all external
/// keygrid apis as well as internally in some modules.
///
/// This type is required to implement `Clone` to ease the use of
/// shared futures, which require the entire `Result` to be `Clone`.
///
/// Note that "not found" is NOT an error in keygrid: a retrieval where
/// every owner confirmed absence resolves to `Ok(None)`. The variants
/// here are genuine failures, never valid outcomes in disguise.
#[derive(Debug, Clone, thiserror::Error)]
pub enum KgError {
    /// No owner produced a definitive reply within the retrieval deadline.
    ///
    /// Distinct from a confirmed absence: no remote state was observed at
    /// all. The caller decides whether to retry or fail the enclosing
    /// operation.
    #[error("retrieval timed out after {elapsed_ms} ms")]
    RetrievalTimeout {
        /// Milliseconds elapsed before the deadline fired.
        elapsed_ms: u64,
    },

    /// Successive topology races exceeded the configured retry bound.
    ///
    /// Fatal for the retrieval. Never silently coerced to a "not found"
    /// outcome or a guessed value.
    #[error(
        "stale topology retries exhausted after {retries} attempts \
         (started at view {start_view_id}, current view {current_view_id})"
    )]
    StaleTopologyRetryExhausted {
        /// Number of restarts attempted.
        retries: u32,
        /// The topology view id captured when the retrieval began.
        start_view_id: u64,
        /// The topology view id observed when giving up.
        current_view_id: u64,
    },

    /// A single RPC to a peer failed.
    ///
    /// Inside the retrieval coordinator this is absorbed and treated as a
    /// non-responding owner; it only surfaces directly from transport apis.
    #[error("transport failure talking to {node}: {ctx}")]
    TransportError {
        /// The peer the RPC was addressed to.
        node: Arc<str>,
        /// Any context associated with this error.
        ctx: Arc<str>,
    },

    /// Generic keygrid internal error.
    #[error("{ctx} (src: {src})")]
    Other {
        /// Any context associated with this error.
        ctx: Arc<str>,

        /// The inner error (if any).
        #[source]
        src: DynInnerError,
    },
}

impl KgError {
    /// Construct an "other" error with an inner source error.
    pub fn other_src<
        C: std::fmt::Display,
        S: std::error::Error + 'static + Send + Sync,
    >(
        ctx: C,
        src: S,
    ) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::new(src),
        }
    }

    /// Construct an "other" error.
    pub fn other<C: std::fmt::Display>(ctx: C) -> Self {
        Self::Other {
            ctx: ctx.to_string().into_boxed_str().into(),
            src: DynInnerError::default(),
        }
    }

    /// Construct a transport error for a given peer.
    pub fn transport<N: std::fmt::Display, C: std::fmt::Display>(
        node: N,
        ctx: C,
    ) -> Self {
        Self::TransportError {
            node: node.to_string().into_boxed_str().into(),
            ctx: ctx.to_string().into_boxed_str().into(),
        }
    }
}

/// The core keygrid result type.
pub type KgResult<T> = Result<T, KgError>;

#[cfg(test)]
mod test {
    use super::*;

    #[test]
    fn error_display() {
        assert_eq!(
            "bla (src: None)",
            KgError::other("bla").to_string().as_str(),
        );
        assert_eq!(
            "foo (src: bar)",
            KgError::other_src("foo", std::io::Error::other("bar"))
                .to_string()
                .as_str(),
        );
        assert_eq!(
            "retrieval timed out after 2000 ms",
            KgError::RetrievalTimeout { elapsed_ms: 2000 }
                .to_string()
                .as_str(),
        );
        assert_eq!(
            "stale topology retries exhausted after 4 attempts \
             (started at view 7, current view 11)",
            KgError::StaleTopologyRetryExhausted {
                retries: 4,
                start_view_id: 7,
                current_view_id: 11,
            }
            .to_string()
            .as_str(),
        );
        assert_eq!(
            "transport failure talking to node-b: connection refused",
            KgError::transport("node-b", "connection refused")
                .to_string()
                .as_str(),
        );
    }

    #[test]
    fn ensure_kgerror_type_is_send_and_sync() {
        fn ensure<T: std::fmt::Display + Send + Sync + Clone>(_t: T) {}
        ensure(KgError::other("bla"));
    }
}
