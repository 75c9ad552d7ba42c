//! The keygrid remote-retrieval coordinator.
//!
//! Orchestrates the remote side of a read. The shape of one retrieval:
//!
//! - Resolve the owner set against the current topology snapshot,
//!   capturing its view id.
//! - If the local node is an owner, answer from authoritative storage
//!   alone: a hit returns immediately and a sole-owner miss is a
//!   definitive absence. Neither is a remote outcome, so the listener
//!   stays silent.
//! - Otherwise consult the near-cache, then send GET requests to the
//!   remote owners under the configured fan-out policy and await replies
//!   within a per-attempt deadline.
//! - The first FOUND reply settles the retrieval: listener notified,
//!   near-cache populated, value returned. Later replies are discarded.
//! - A reply is only accepted as definitive if its sender is still a
//!   valid owner under the now-current topology. A reply made stale by a
//!   concurrent rehash restarts the retrieval against the new owner set,
//!   up to a configured bound; exceeding the bound is an explicit
//!   [KgError::StaleTopologyRetryExhausted], never a guessed outcome.
//! - All owners replying NOT_FOUND is a definitive absence. Any owner
//!   failing or staying silent past the deadline instead yields
//!   [KgError::RetrievalTimeout], which does not invoke the listener
//!   because no definitive remote state was observed.
//!
//! Retrievals for different keys run fully concurrently; nothing here
//! holds a global lock. Concurrent retrievals for the same key are not
//! deduplicated; that is a caller concern. Cancellation is dropping the
//! returned future, which drops every outstanding RPC future with it.

use futures::StreamExt;
use keygrid_api::{
    transport::{GetReply, GetRequest},
    *,
};
use std::sync::Arc;

/// CoreRetrieval configuration types.
pub mod config {
    /// How many owners a retrieval queries per attempt.
    #[derive(
        Debug,
        Clone,
        Copy,
        PartialEq,
        Eq,
        serde::Serialize,
        serde::Deserialize,
    )]
    #[serde(rename_all = "camelCase")]
    pub enum FanOut {
        /// Query only the primary owner. One RPC per attempt, the lowest
        /// network cost, but a slow or failed primary costs the whole
        /// per-attempt deadline.
        PrimaryOnly,

        /// Query every owner in parallel. More network traffic, but the
        /// fastest owner determines latency, so the tail is shorter when
        /// an owner is slow or down.
        AllOwners,
    }

    /// Configuration parameters for [CoreRetrievalFactory](super::CoreRetrievalFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct CoreRetrievalConfig {
        /// The fan-out policy for querying owners.
        ///
        /// Default: allOwners.
        pub fan_out: FanOut,

        /// Per-attempt reply deadline in ms. Owners that have not
        /// produced a definitive reply by then count as non-responding.
        ///
        /// Default: 2000.
        pub get_timeout_ms: u32,

        /// How many times a retrieval may restart after a topology race
        /// invalidated the replies of an attempt.
        ///
        /// Default: 4.
        pub max_topology_retries: u32,

        /// The ttl in ms stamped onto near-cache entries populated by a
        /// remote retrieval.
        ///
        /// Default: 60000.
        pub near_ttl_ms: u32,
    }

    impl Default for CoreRetrievalConfig {
        fn default() -> Self {
            Self {
                fan_out: FanOut::AllOwners,
                get_timeout_ms: 2000,
                max_topology_retries: 4,
                near_ttl_ms: 60_000,
            }
        }
    }

    impl CoreRetrievalConfig {
        /// Get the per-attempt deadline as a [std::time::Duration].
        pub fn get_timeout(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.get_timeout_ms as u64)
        }

        /// Get the near-cache ttl as a [std::time::Duration].
        pub fn near_ttl(&self) -> std::time::Duration {
            std::time::Duration::from_millis(self.near_ttl_ms as u64)
        }
    }

    /// Module-level configuration for CoreRetrieval.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct CoreRetrievalModConfig {
        /// CoreRetrieval configuration.
        pub core_retrieval: CoreRetrievalConfig,
    }
}

pub use config::*;

/// The production keygrid retrieval factory.
#[derive(Debug)]
pub struct CoreRetrievalFactory {}

impl CoreRetrievalFactory {
    /// Construct a new CoreRetrievalFactory.
    pub fn create() -> retrieval::DynRetrievalFactory {
        let out: retrieval::DynRetrievalFactory = Arc::new(Self {});
        out
    }
}

impl retrieval::RetrievalFactory for CoreRetrievalFactory {
    fn default_config(
        &self,
        config: &keygrid_api::config::Config,
    ) -> KgResult<()> {
        config.set_module_config(&CoreRetrievalModConfig::default())
    }

    fn validate_config(
        &self,
        config: &keygrid_api::config::Config,
    ) -> KgResult<()> {
        let config: CoreRetrievalModConfig = config.get_module_config()?;
        if config.core_retrieval.get_timeout_ms == 0 {
            return Err(KgError::other("getTimeoutMs must be at least 1"));
        }
        Ok(())
    }

    fn create(
        &self,
        builder: Arc<builder::Builder>,
        hasher: hasher::DynKeyHasher,
        topo_mgr: topo_mgr::DynTopologyManager,
        store: store::DynCacheStore,
        transport: transport::DynTransport,
    ) -> BoxFut<'static, KgResult<retrieval::DynRetrieval>> {
        Box::pin(async move {
            let config: CoreRetrievalModConfig =
                builder.config.get_module_config()?;
            let out: retrieval::DynRetrieval = Arc::new(CoreRetrieval {
                config: config.core_retrieval,
                hasher,
                topo_mgr,
                store,
                transport,
            });
            Ok(out)
        })
    }
}

/// One attempt's settlement, before the per-attempt deadline is applied.
enum Settle {
    /// A still-valid owner reported the value.
    Found(CacheEntry),
    /// Every queried owner replied NOT_FOUND.
    AllNotFound,
    /// No queried owner produced a definitive reply.
    NoReply,
    /// A topology swap invalidated this attempt; restart against the
    /// new owner set.
    Stale,
}

struct CoreRetrieval {
    config: CoreRetrievalConfig,
    hasher: hasher::DynKeyHasher,
    topo_mgr: topo_mgr::DynTopologyManager,
    store: store::DynCacheStore,
    transport: transport::DynTransport,
}

impl std::fmt::Debug for CoreRetrieval {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CoreRetrieval")
            .field("config", &self.config)
            .finish()
    }
}

impl retrieval::Retrieval for CoreRetrieval {
    fn retrieve(
        &self,
        key: Key,
        listener: retrieval::DynRetrievalListener,
    ) -> BoxFut<'_, KgResult<Option<CacheEntry>>> {
        Box::pin(async move {
            let local = self.topo_mgr.local_node();
            let start_view = self.topo_mgr.current_topology().view_id();
            let started = std::time::Instant::now();
            let mut restarts: u32 = 0;

            loop {
                let topo = self.topo_mgr.current_topology();
                let v0 = topo.view_id();
                let segment = self.hasher.segment_of(&key);
                let owners = topo.assignment().owners_of(segment).to_vec();

                let remote: Vec<NodeId> = owners
                    .iter()
                    .filter(|n| **n != local)
                    .cloned()
                    .collect();
                let local_is_owner = remote.len() != owners.len();

                if local_is_owner {
                    // authoritative storage, never the network
                    if let Some(entry) =
                        self.store.get(key.clone()).await?
                    {
                        tracing::debug!(
                            %key,
                            source = ?EntrySource::Owned,
                            "local hit"
                        );
                        return Ok(Some(entry));
                    }
                    if remote.is_empty() {
                        // sole owner: local absence is definitive
                        return Ok(None);
                    }
                } else {
                    // the near side is only consulted after the owned
                    // lookup was ruled out
                    if let Some(entry) =
                        self.store.near_get(key.clone()).await?
                    {
                        tracing::debug!(
                            %key,
                            source = ?EntrySource::NearCache,
                            "near hit"
                        );
                        return Ok(Some(entry));
                    }
                }

                if owners.is_empty() {
                    // degenerate window while a removed member's segments
                    // are reassigned
                    tracing::warn!(
                        %key,
                        view_id = v0,
                        "no owner for key; reporting not found"
                    );
                    listener.remote_value_not_found(&key);
                    return Ok(None);
                }

                let targets: Vec<NodeId> = match self.config.fan_out {
                    FanOut::PrimaryOnly => vec![remote[0].clone()],
                    FanOut::AllOwners => remote.clone(),
                };

                let settle = tokio::time::timeout(
                    self.config.get_timeout(),
                    self.attempt(&key, segment, v0, &targets),
                )
                .await;

                match settle {
                    Err(_elapsed) => {
                        return Err(KgError::RetrievalTimeout {
                            elapsed_ms: started.elapsed().as_millis()
                                as u64,
                        });
                    }
                    Ok(Settle::NoReply) => {
                        return Err(KgError::RetrievalTimeout {
                            elapsed_ms: started.elapsed().as_millis()
                                as u64,
                        });
                    }
                    Ok(Settle::Found(entry)) => {
                        listener.remote_value_found(&entry);
                        if !local_is_owner {
                            self.store
                                .near_put(
                                    entry.clone(),
                                    self.config.near_ttl(),
                                )
                                .await?;
                        }
                        return Ok(Some(entry));
                    }
                    Ok(Settle::AllNotFound) => {
                        listener.remote_value_not_found(&key);
                        return Ok(None);
                    }
                    Ok(Settle::Stale) => {
                        restarts += 1;
                        if restarts > self.config.max_topology_retries {
                            return Err(
                                KgError::StaleTopologyRetryExhausted {
                                    retries: restarts - 1,
                                    start_view_id: start_view,
                                    current_view_id: self
                                        .topo_mgr
                                        .current_topology()
                                        .view_id(),
                                },
                            );
                        }
                        tracing::debug!(
                            %key,
                            restarts,
                            "stale reply, restarting against new owners"
                        );
                        continue;
                    }
                }
            }
        })
    }
}

impl CoreRetrieval {
    /// Query the target owners and settle on the first definitive reply.
    async fn attempt(
        &self,
        key: &Key,
        segment: SegmentId,
        v0: u64,
        targets: &[NodeId],
    ) -> Settle {
        let mut replies: futures::stream::FuturesUnordered<_> = targets
            .iter()
            .cloned()
            .map(|node| {
                let transport = self.transport.clone();
                let req = GetRequest { key: key.clone() };
                async move {
                    let res = transport.send_get(node.clone(), req).await;
                    (node, res)
                }
            })
            .collect();

        let mut not_found = 0_usize;

        while let Some((node, res)) = replies.next().await {
            // before accepting any reply as definitive, make sure the
            // replying node is still an owner under the current topology
            let current = self.topo_mgr.current_topology();
            if current.view_id() != v0
                && !current
                    .assignment()
                    .owners_of(segment)
                    .contains(&node)
            {
                tracing::debug!(
                    %key,
                    %node,
                    old_view = v0,
                    new_view = current.view_id(),
                    "discarding reply from node that lost ownership"
                );
                return Settle::Stale;
            }

            match res {
                Ok(GetReply::Found(entry)) => return Settle::Found(entry),
                Ok(GetReply::NotFound) => not_found += 1,
                Err(err) => {
                    // a failed rpc is a non-responding owner; another
                    // owner may still settle this attempt
                    tracing::warn!(%key, %node, ?err, "get rpc failed");
                }
            }
        }

        if not_found == targets.len() {
            Settle::AllNotFound
        } else {
            Settle::NoReply
        }
    }
}

#[cfg(test)]
mod test;
