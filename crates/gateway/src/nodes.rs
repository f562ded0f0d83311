use std::{
    collections::BTreeMap,
    sync::{
        Arc,
        atomic::{AtomicUsize, Ordering},
    },
};

use {
    async_trait::async_trait,
    tokio::sync::{RwLock, mpsc},
    tracing::{debug, info, warn},
};

use switchyard_protocol::{NodeFrame, NodeType, ServerId};

// ── Connections ──────────────────────────────────────────────────────────────

/// Outbound link to one backend process.
pub trait NodeConnection: Send + Sync {
    fn server_id(&self) -> &ServerId;
    fn node_type(&self) -> NodeType;
    /// Queue a frame without waiting for the backend. False means dropped.
    fn send(&self, frame: NodeFrame) -> bool;
    fn is_connected(&self) -> bool {
        true
    }
}

/// Connection backed by a bounded channel drained by the transport's writer
/// task. Frames are encoded here; a full or closed channel drops the frame.
pub struct ChannelNodeConnection {
    server_id: ServerId,
    node_type: NodeType,
    sender: mpsc::Sender<Vec<u8>>,
}

impl ChannelNodeConnection {
    pub fn new(server_id: ServerId, node_type: NodeType, sender: mpsc::Sender<Vec<u8>>) -> Self {
        Self {
            server_id,
            node_type,
            sender,
        }
    }
}

impl NodeConnection for ChannelNodeConnection {
    fn server_id(&self) -> &ServerId {
        &self.server_id
    }

    fn node_type(&self) -> NodeType {
        self.node_type
    }

    fn send(&self, frame: NodeFrame) -> bool {
        let bytes = match frame.to_bytes() {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(server = %self.server_id, error = %e, "frame encode failed");
                return false;
            },
        };
        self.sender.try_send(bytes).is_ok()
    }

    fn is_connected(&self) -> bool {
        !self.sender.is_closed()
    }
}

// ── Topology ─────────────────────────────────────────────────────────────────

/// Lookup of reachable backend nodes. Implementations may do I/O.
#[async_trait]
pub trait NodeTopology: Send + Sync {
    async fn node(&self, server_id: &ServerId) -> Option<Arc<dyn NodeConnection>>;
    async fn any_node_of_type(&self, node_type: NodeType) -> Option<Arc<dyn NodeConnection>>;
    async fn all_nodes(&self) -> Vec<Arc<dyn NodeConnection>>;
}

/// Registry of connected backend nodes, keyed by server id.
///
/// Nodes of one type are kept in server id order; fallback selection walks
/// them round-robin.
#[derive(Default)]
pub struct NodeRegistry {
    nodes: RwLock<BTreeMap<ServerId, Arc<dyn NodeConnection>>>,
    cursor: AtomicUsize,
}

impl NodeRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Add a node, replacing any previous connection with the same id.
    pub async fn register(&self, conn: Arc<dyn NodeConnection>) {
        let server_id = conn.server_id().clone();
        info!(server = %server_id, node_type = %conn.node_type(), "node registered");
        self.nodes.write().await.insert(server_id, conn);
    }

    pub async fn unregister(&self, server_id: &ServerId) -> Option<Arc<dyn NodeConnection>> {
        let removed = self.nodes.write().await.remove(server_id);
        if removed.is_some() {
            info!(server = %server_id, "node unregistered");
        }
        removed
    }

    pub async fn list(&self) -> Vec<ServerId> {
        self.nodes.read().await.keys().cloned().collect()
    }

    /// Connected nodes of `node_type`, in server id order.
    pub async fn nodes_of_type(&self, node_type: NodeType) -> Vec<Arc<dyn NodeConnection>> {
        self.nodes
            .read()
            .await
            .values()
            .filter(|n| n.node_type() == node_type && n.is_connected())
            .map(Arc::clone)
            .collect()
    }

    pub async fn count(&self) -> usize {
        self.nodes.read().await.len()
    }
}

#[async_trait]
impl NodeTopology for NodeRegistry {
    async fn node(&self, server_id: &ServerId) -> Option<Arc<dyn NodeConnection>> {
        self.nodes.read().await.get(server_id).map(Arc::clone)
    }

    async fn any_node_of_type(&self, node_type: NodeType) -> Option<Arc<dyn NodeConnection>> {
        let candidates = self.nodes_of_type(node_type).await;
        if candidates.is_empty() {
            return None;
        }
        let idx = self.cursor.fetch_add(1, Ordering::Relaxed) % candidates.len();
        let chosen = Arc::clone(&candidates[idx]);
        debug!(%node_type, server = %chosen.server_id(), "picked fallback node");
        Some(chosen)
    }

    async fn all_nodes(&self) -> Vec<Arc<dyn NodeConnection>> {
        self.nodes.read().await.values().map(Arc::clone).collect()
    }
}
