use std::{
    collections::BTreeMap,
    time::{Duration, Instant},
};

use {dashmap::DashMap, tracing::debug};

use switchyard_protocol::{NodeType, ServerId};

use crate::session::{ClientHandle, Session};

/// Concurrent account → session table.
///
/// Every method touches a single shard, so calls for different accounts run
/// in parallel while calls for the same account are serialized. Callers must
/// not hold a reference returned by `DashMap` across an `.await`; nothing here
/// hands one out.
#[derive(Default)]
pub struct SessionRegistry {
    sessions: DashMap<String, Session>,
}

impl SessionRegistry {
    pub fn new() -> Self {
        Self::default()
    }

    /// Create or replace the session for `account`.
    ///
    /// Returns the replaced session, whose client handle is stale from now on.
    pub fn bind(
        &self,
        account: &str,
        allocated_servers: BTreeMap<NodeType, ServerId>,
        client: ClientHandle,
    ) -> Option<Session> {
        let session = Session::new(account, allocated_servers, client);
        let previous = self.sessions.insert(account.to_string(), session);
        if let Some(prev) = &previous {
            debug!(account, stale_conn = prev.client.conn_id(), "session replaced");
        }
        previous
    }

    /// The server pinned for `(account, node_type)`, marking the session active.
    ///
    /// `None` if the account is not bound or has no assignment for that type.
    pub fn resolve_and_touch(&self, account: &str, node_type: NodeType) -> Option<ServerId> {
        let mut session = self.sessions.get_mut(account)?;
        session.touch();
        session.server_for(node_type).cloned()
    }

    /// Pin `(account, node_type)` to `server`. Returns false if not bound.
    pub fn rebind(&self, account: &str, node_type: NodeType, server: ServerId) -> bool {
        let Some(mut session) = self.sessions.get_mut(account) else {
            return false;
        };
        debug!(account, %node_type, %server, "rebinding service");
        session.assignments.insert(node_type, server);
        true
    }

    /// Remove the session. Removing an unbound account is a no-op.
    pub fn unbind(&self, account: &str) -> Option<Session> {
        self.sessions.remove(account).map(|(_, s)| s)
    }

    /// Remove the session only if it still belongs to `client`.
    ///
    /// A disconnect from a connection that was already replaced by a newer
    /// login must not tear down the newer session.
    pub fn unbind_client(&self, account: &str, client: &ClientHandle) -> Option<Session> {
        self.sessions
            .remove_if(account, |_, s| s.client == *client)
            .map(|(_, s)| s)
    }

    pub fn get(&self, account: &str) -> Option<Session> {
        self.sessions.get(account).map(|s| s.value().clone())
    }

    pub fn client(&self, account: &str) -> Option<ClientHandle> {
        self.sessions.get(account).map(|s| s.client.clone())
    }

    /// Snapshot of every bound account and its client.
    pub fn clients(&self) -> Vec<(String, ClientHandle)> {
        self.sessions
            .iter()
            .map(|e| (e.key().clone(), e.client.clone()))
            .collect()
    }

    pub fn contains(&self, account: &str) -> bool {
        self.sessions.contains_key(account)
    }

    pub fn len(&self) -> usize {
        self.sessions.len()
    }

    pub fn is_empty(&self) -> bool {
        self.sessions.is_empty()
    }

    /// Evict sessions whose last activity is before `cutoff`.
    pub fn evict_idle_before(&self, cutoff: Instant) -> Vec<Session> {
        let candidates: Vec<String> = self
            .sessions
            .iter()
            .filter(|e| e.last_active_at < cutoff)
            .map(|e| e.key().clone())
            .collect();

        // Re-check under the shard lock: the session may have been touched or
        // replaced since the scan.
        candidates
            .into_iter()
            .filter_map(|account| {
                self.sessions
                    .remove_if(&account, |_, s| s.last_active_at < cutoff)
                    .map(|(_, s)| s)
            })
            .collect()
    }

    /// Evict sessions idle for longer than `max_idle`.
    pub fn evict_idle(&self, max_idle: Duration) -> Vec<Session> {
        match Instant::now().checked_sub(max_idle) {
            Some(cutoff) => self.evict_idle_before(cutoff),
            None => Vec::new(),
        }
    }

    /// Drop every session, returning them.
    pub fn drain(&self) -> Vec<Session> {
        let accounts: Vec<String> = self.sessions.iter().map(|e| e.key().clone()).collect();
        accounts
            .into_iter()
            .filter_map(|a| self.unbind(&a))
            .collect()
    }
}
