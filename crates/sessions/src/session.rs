use std::{collections::BTreeMap, fmt, sync::Arc, time::Instant};

use switchyard_protocol::{NodeType, ServerId};

/// Opaque reference to the client connection a session arrived on.
///
/// The transport owns the actual socket and resolves it by `conn_id`; two
/// handles are the same connection iff their ids match.
#[derive(Clone, PartialEq, Eq, Hash)]
pub struct ClientHandle {
    conn_id: Arc<str>,
}

impl ClientHandle {
    pub fn new(conn_id: impl Into<Arc<str>>) -> Self {
        Self {
            conn_id: conn_id.into(),
        }
    }

    pub fn conn_id(&self) -> &str {
        &self.conn_id
    }
}

impl fmt::Debug for ClientHandle {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        write!(f, "ClientHandle({})", self.conn_id)
    }
}

/// An authenticated account bound to its client and backend servers.
#[derive(Debug, Clone)]
pub struct Session {
    pub account: String,
    pub client: ClientHandle,
    pub assignments: BTreeMap<NodeType, ServerId>,
    pub bound_at: Instant,
    pub last_active_at: Instant,
}

impl Session {
    pub fn new(
        account: impl Into<String>,
        assignments: BTreeMap<NodeType, ServerId>,
        client: ClientHandle,
    ) -> Self {
        let now = Instant::now();
        Self {
            account: account.into(),
            client,
            assignments,
            bound_at: now,
            last_active_at: now,
        }
    }

    pub fn touch(&mut self) {
        self.last_active_at = Instant::now();
    }

    pub fn server_for(&self, node_type: NodeType) -> Option<&ServerId> {
        self.assignments.get(&node_type)
    }
}
