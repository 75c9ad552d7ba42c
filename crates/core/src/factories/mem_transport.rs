//! The mem transport implementation provided by keygrid.
//!
//! An in-process hub stands in for the cluster fabric: every node created
//! with the same test id registers a slot on the same hub, GET requests
//! are dispatched directly to the target node's registered handler, and
//! membership events are injected through [MemTransportHub::publish_membership].
//! Per-node knobs make peers unreachable or delay their replies, which is
//! what the retrieval timeout and race tests are built on.

use keygrid_api::{
    transport::{DynGetHandler, DynMembershipHandler, GetReply, GetRequest},
    *,
};
use std::collections::HashMap;
use std::sync::atomic::{AtomicBool, AtomicU64, Ordering};
use std::sync::{Arc, Mutex, OnceLock};

/// MemTransport configuration types.
mod config {
    /// Configuration parameters for [MemTransportFactory](super::MemTransportFactory).
    #[derive(Debug, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase")]
    pub struct MemTransportConfig {
        /// Since rust test runs multiple tests in the same process,
        /// we cannot just have a single global transport hub.
        /// This defaults to the current thread id when this config
        /// instance is constructed. If you are creating grid nodes in
        /// tests from different tasks, pick an explicit id for this
        /// value.
        pub test_id: String,
    }

    impl Default for MemTransportConfig {
        fn default() -> Self {
            Self {
                test_id: format!("{:?}", std::thread::current().id()),
            }
        }
    }

    /// Module-level configuration for MemTransport.
    #[derive(Debug, Default, Clone, serde::Serialize, serde::Deserialize)]
    #[serde(rename_all = "camelCase", default)]
    pub struct MemTransportModConfig {
        /// MemTransport configuration.
        pub mem_transport: MemTransportConfig,
    }
}

pub use config::*;

static HUBS: OnceLock<Mutex<HashMap<String, Arc<MemTransportHub>>>> =
    OnceLock::new();

fn hubs() -> &'static Mutex<HashMap<String, Arc<MemTransportHub>>> {
    HUBS.get_or_init(Default::default)
}

#[derive(Default)]
struct NodeSlot {
    get_handler: Mutex<Option<DynGetHandler>>,
    membership_handler: Mutex<Option<DynMembershipHandler>>,
    unreachable: AtomicBool,
    reply_delay_ms: AtomicU64,
}

/// The in-process fabric shared by every mem transport with the same
/// test id.
pub struct MemTransportHub {
    nodes: Mutex<HashMap<NodeId, Arc<NodeSlot>>>,
}

impl std::fmt::Debug for MemTransportHub {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTransportHub").finish()
    }
}

impl MemTransportHub {
    /// Get (or create) the hub for a test id.
    pub fn get(test_id: &str) -> Arc<MemTransportHub> {
        hubs()
            .lock()
            .unwrap()
            .entry(test_id.to_string())
            .or_insert_with(|| {
                Arc::new(MemTransportHub {
                    nodes: Mutex::new(HashMap::new()),
                })
            })
            .clone()
    }

    /// Push a membership-change event to every registered node.
    pub fn publish_membership(&self, members: Vec<NodeId>) {
        let handlers: Vec<DynMembershipHandler> = self
            .nodes
            .lock()
            .unwrap()
            .values()
            .filter_map(|slot| {
                slot.membership_handler.lock().unwrap().clone()
            })
            .collect();
        for handler in handlers {
            handler.membership_changed(members.clone());
        }
    }

    /// Make a node drop off the fabric: requests to it will hang until
    /// the caller's deadline fires.
    pub fn set_unreachable(&self, node: &NodeId, unreachable: bool) {
        if let Some(slot) = self.slot(node) {
            slot.unreachable.store(unreachable, Ordering::SeqCst);
        }
    }

    /// Delay every reply from a node, for ordering replies in tests.
    pub fn set_reply_delay(
        &self,
        node: &NodeId,
        delay: std::time::Duration,
    ) {
        if let Some(slot) = self.slot(node) {
            slot.reply_delay_ms
                .store(delay.as_millis() as u64, Ordering::SeqCst);
        }
    }

    fn register(&self, node: NodeId) -> Arc<NodeSlot> {
        let slot = Arc::new(NodeSlot::default());
        if self
            .nodes
            .lock()
            .unwrap()
            .insert(node.clone(), slot.clone())
            .is_some()
        {
            tracing::warn!(%node, "replacing existing mem transport slot");
        }
        slot
    }

    fn slot(&self, node: &NodeId) -> Option<Arc<NodeSlot>> {
        self.nodes.lock().unwrap().get(node).cloned()
    }
}

/// The mem transport implementation provided by keygrid.
#[derive(Debug)]
pub struct MemTransportFactory {}

impl MemTransportFactory {
    /// Construct a new MemTransportFactory.
    pub fn create() -> transport::DynTransportFactory {
        let out: transport::DynTransportFactory =
            Arc::new(MemTransportFactory {});
        out
    }
}

impl transport::TransportFactory for MemTransportFactory {
    fn default_config(
        &self,
        config: &keygrid_api::config::Config,
    ) -> KgResult<()> {
        config.set_module_config(&MemTransportModConfig::default())
    }

    fn validate_config(
        &self,
        _config: &keygrid_api::config::Config,
    ) -> KgResult<()> {
        Ok(())
    }

    fn create(
        &self,
        builder: Arc<builder::Builder>,
        local: NodeId,
    ) -> BoxFut<'static, KgResult<transport::DynTransport>> {
        Box::pin(async move {
            let config: MemTransportModConfig =
                builder.config.get_module_config()?;
            let hub = MemTransportHub::get(&config.mem_transport.test_id);
            let slot = hub.register(local.clone());
            let out: transport::DynTransport =
                Arc::new(MemTransport { local, hub, slot });
            Ok(out)
        })
    }
}

struct MemTransport {
    local: NodeId,
    hub: Arc<MemTransportHub>,
    slot: Arc<NodeSlot>,
}

impl std::fmt::Debug for MemTransport {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("MemTransport")
            .field("local", &self.local)
            .finish()
    }
}

impl transport::Transport for MemTransport {
    fn local_node(&self) -> NodeId {
        self.local.clone()
    }

    fn register_get_handler(&self, handler: DynGetHandler) {
        if self
            .slot
            .get_handler
            .lock()
            .unwrap()
            .replace(handler)
            .is_some()
        {
            panic!("Attempted to register duplicate get handler!");
        }
    }

    fn register_membership_handler(
        &self,
        handler: DynMembershipHandler,
    ) {
        if self
            .slot
            .membership_handler
            .lock()
            .unwrap()
            .replace(handler)
            .is_some()
        {
            panic!("Attempted to register duplicate membership handler!");
        }
    }

    fn send_get(
        &self,
        to: NodeId,
        req: GetRequest,
    ) -> BoxFut<'_, KgResult<GetReply>> {
        Box::pin(async move {
            let slot = self.hub.slot(&to).ok_or_else(|| {
                KgError::transport(&to, "unknown peer")
            })?;

            if slot.unreachable.load(Ordering::SeqCst) {
                // an unreachable peer neither replies nor errors; the
                // caller's deadline decides when to give up
                futures::future::pending::<()>().await;
            }

            let delay = slot.reply_delay_ms.load(Ordering::SeqCst);
            if delay > 0 {
                tokio::time::sleep(std::time::Duration::from_millis(
                    delay,
                ))
                .await;
            }

            let handler =
                slot.get_handler.lock().unwrap().clone().ok_or_else(
                    || KgError::transport(&to, "peer has no get handler"),
                )?;

            handler.handle_get(req).await
        })
    }
}
