use std::{sync::Arc, time::Duration};

#[cfg(feature = "metrics")]
use metrics::counter;
use {
    tokio::{sync::Mutex, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, info, warn},
};

use {
    switchyard_auth::TokenStore,
    switchyard_config::SwitchyardConfig,
    switchyard_protocol::VerifyOutcome,
    switchyard_sessions::{ClientHandle, Session},
};

use crate::{
    auth::check_token, hooks::GatewayHooks, nodes::NodeRegistry, relay::RelayDispatcher,
    state::GatewayState,
};

struct Sweeper {
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

/// The gateway role: verification, relay and session lifecycle on top of a
/// [`NodeRegistry`] it holds.
pub struct Gateway {
    state: Arc<GatewayState>,
    relay: RelayDispatcher,
    sweeper: Mutex<Option<Sweeper>>,
}

impl Gateway {
    pub fn new(
        config: SwitchyardConfig,
        tokens: Arc<dyn TokenStore>,
        hooks: GatewayHooks,
    ) -> anyhow::Result<Self> {
        let state = GatewayState::new(config, tokens, hooks)?;
        Ok(Self::with_state(state))
    }

    pub fn with_state(state: Arc<GatewayState>) -> Self {
        let relay = RelayDispatcher::from_state(&state);
        Self {
            state,
            relay,
            sweeper: Mutex::new(None),
        }
    }

    pub fn state(&self) -> &Arc<GatewayState> {
        &self.state
    }

    pub fn nodes(&self) -> &Arc<NodeRegistry> {
        &self.state.nodes
    }

    // ── Lifecycle ────────────────────────────────────────────────────────────

    /// Start background work. Idempotent.
    pub async fn start(&self) {
        let mut sweeper = self.sweeper.lock().await;
        if sweeper.is_some() {
            return;
        }
        let gw = &self.state.config.gateway;
        info!(
            version = %self.state.version,
            msg_cmd_offset = self.state.namespace.offset(),
            idle_timeout_secs = gw.session_idle_timeout_secs,
            "gateway starting"
        );
        if gw.session_idle_timeout_secs == 0 {
            return;
        }

        let cancel = CancellationToken::new();
        let task = tokio::spawn(run_sweeper(
            Arc::clone(&self.state),
            Duration::from_secs(gw.sweep_interval_secs.max(1)),
            Duration::from_secs(gw.session_idle_timeout_secs),
            cancel.clone(),
        ));
        *sweeper = Some(Sweeper { cancel, task });
    }

    /// Stop background work and release every session.
    pub async fn close(&self) {
        if let Some(sweeper) = self.sweeper.lock().await.take() {
            sweeper.cancel.cancel();
            if let Err(e) = sweeper.task.await {
                warn!(error = %e, "session sweeper ended abnormally");
            }
        }
        let sessions = self.state.sessions.drain();
        for session in &sessions {
            self.state.release_session(session).await;
        }
        info!(released = sessions.len(), "gateway closed");
    }

    // ── Client events ────────────────────────────────────────────────────────

    /// Verify a client's token and, on success, bind its session.
    ///
    /// A previous session for the same account is replaced; its client is
    /// reported to [`crate::hooks::ClientSender::session_replaced`].
    pub async fn verify_token(
        &self,
        account: &str,
        presented: &str,
        client: ClientHandle,
    ) -> VerifyOutcome {
        let outcome = match check_token(self.state.tokens.as_ref(), account, presented).await {
            Ok(token) => {
                let replaced = self
                    .state
                    .sessions
                    .bind(account, token.allocated_servers, client.clone());
                if let Some(prev) = replaced
                    && prev.client != client
                {
                    self.state.hooks.client_sender.session_replaced(&prev.client);
                }
                VerifyOutcome::Accepted
            },
            Err(outcome) => outcome,
        };
        #[cfg(feature = "metrics")]
        counter!("switchyard_verify_total", "code" => outcome.code().to_string()).increment(1);
        outcome
    }

    /// Relay a client command. See [`RelayDispatcher::on_client_command`].
    pub async fn on_client_command(&self, account: &str, wire_cmd: u32, payload: &[u8]) -> bool {
        self.relay
            .on_client_command(account, wire_cmd, payload)
            .await
    }

    /// The transport lost `client`. Drops the account's session if it still
    /// belongs to that connection and notifies the backends.
    pub async fn on_client_disconnected(&self, account: &str, client: &ClientHandle) -> bool {
        match self.state.sessions.unbind_client(account, client) {
            Some(session) => {
                debug!(
                    account,
                    conn = client.conn_id(),
                    bound_secs = session.bound_at.elapsed().as_secs(),
                    "client disconnected"
                );
                self.state.release_session(&session).await;
                true
            },
            None => false,
        }
    }

    /// Evict one account, whatever connection it is on.
    pub async fn evict(&self, account: &str) -> bool {
        match self.state.sessions.unbind(account) {
            Some(session) => {
                info!(account, "evicting session");
                release_evicted(&self.state, &session).await;
                true
            },
            None => false,
        }
    }

    // ── Push to clients ──────────────────────────────────────────────────────

    /// Push `data` to `account`'s client. False if not bound or not delivered.
    pub fn send_to_client(&self, account: &str, cmd: u32, data: &[u8]) -> bool {
        let Some(client) = self.state.sessions.client(account) else {
            debug!(account, cmd, "send to unbound account");
            return false;
        };
        match self.state.hooks.encoder.encode(data) {
            Ok(bytes) => self.state.hooks.client_sender.send(&client, cmd, bytes),
            Err(e) => {
                warn!(account, cmd, error = %e, "client payload encode failed");
                false
            },
        }
    }

    /// Push `data` to every bound client. Returns how many accepted it.
    pub fn send_to_all_clients(&self, cmd: u32, data: &[u8]) -> usize {
        let bytes = match self.state.hooks.encoder.encode(data) {
            Ok(bytes) => bytes,
            Err(e) => {
                warn!(cmd, error = %e, "broadcast payload encode failed");
                return 0;
            },
        };
        let sender = &self.state.hooks.client_sender;
        self.state
            .sessions
            .clients()
            .into_iter()
            .filter(|(_, client)| sender.send(client, cmd, bytes.clone()))
            .count()
    }

    /// Evict sessions idle past the configured timeout. Returns how many.
    pub async fn evict_idle(&self) -> usize {
        let max_idle = Duration::from_secs(self.state.config.gateway.session_idle_timeout_secs);
        evict_idle(&self.state, max_idle).await
    }
}

async fn evict_idle(state: &GatewayState, max_idle: Duration) -> usize {
    let evicted = state.sessions.evict_idle(max_idle);
    for session in &evicted {
        info!(account = %session.account, "evicting idle session");
        release_evicted(state, session).await;
    }
    evicted.len()
}

async fn release_evicted(state: &GatewayState, session: &Session) {
    state.hooks.client_sender.session_evicted(&session.client);
    state.release_session(session).await;
}

async fn run_sweeper(
    state: Arc<GatewayState>,
    every: Duration,
    max_idle: Duration,
    cancel: CancellationToken,
) {
    let mut interval = tokio::time::interval(every);
    loop {
        tokio::select! {
            () = cancel.cancelled() => break,
            _ = interval.tick() => {
                evict_idle(&state, max_idle).await;
            },
        }
    }
    debug!("session sweeper stopped");
}

#[cfg(test)]
mod tests {
    use std::sync::Mutex as StdMutex;

    use {
        switchyard_auth::{MemoryTokenStore, Token},
        switchyard_protocol::{NodeFrame, NodeType, RelayEnvelope, ServerId},
        tokio::sync::mpsc,
    };

    use super::*;
    use crate::{
        hooks::{ClientSender, Encoder},
        nodes::{ChannelNodeConnection, NodeTopology},
    };

    const OFFSET: u32 = 1000;

    #[derive(Default)]
    struct RecordingSender {
        sent: StdMutex<Vec<(String, u32, Vec<u8>)>>,
        replaced: StdMutex<Vec<String>>,
        evicted: StdMutex<Vec<String>>,
    }

    impl ClientSender for RecordingSender {
        fn send(&self, client: &ClientHandle, cmd: u32, data: Vec<u8>) -> bool {
            self.sent
                .lock()
                .unwrap()
                .push((client.conn_id().to_string(), cmd, data));
            true
        }

        fn session_replaced(&self, stale: &ClientHandle) {
            self.replaced
                .lock()
                .unwrap()
                .push(stale.conn_id().to_string());
        }

        fn session_evicted(&self, client: &ClientHandle) {
            self.evicted
                .lock()
                .unwrap()
                .push(client.conn_id().to_string());
        }
    }

    /// Frames client payloads as `<` data `>`.
    struct Bracketed;

    impl Encoder for Bracketed {
        fn encode(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
            Ok([&b"<"[..], data, &b">"[..]].concat())
        }

        fn decode(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
            data.strip_prefix(b"<")
                .and_then(|d| d.strip_suffix(b">"))
                .map(<[u8]>::to_vec)
                .ok_or_else(|| anyhow::anyhow!("unframed payload"))
        }
    }

    async fn gateway_with(
        config: SwitchyardConfig,
        sender: Arc<RecordingSender>,
    ) -> (Gateway, Arc<MemoryTokenStore>) {
        let store = Arc::new(MemoryTokenStore::new());
        store
            .put(Token::new("alice", "tok-123").with_server(NodeType::LOBBY, "srv-1"))
            .await;
        let hooks = GatewayHooks::noop().with_client_sender(sender);
        let gw = Gateway::new(config, store.clone(), hooks).unwrap();
        (gw, store)
    }

    async fn gateway() -> (Gateway, Arc<RecordingSender>) {
        let sender = Arc::new(RecordingSender::default());
        let (gw, _) = gateway_with(SwitchyardConfig::default(), sender.clone()).await;
        (gw, sender)
    }

    async fn add_node(gw: &Gateway, id: &str, node_type: NodeType) -> mpsc::Receiver<Vec<u8>> {
        let (tx, rx) = mpsc::channel(16);
        gw.nodes()
            .register(Arc::new(ChannelNodeConnection::new(id.into(), node_type, tx)))
            .await;
        rx
    }

    fn frames(rx: &mut mpsc::Receiver<Vec<u8>>) -> Vec<NodeFrame> {
        let mut out = Vec::new();
        while let Ok(bytes) = rx.try_recv() {
            out.push(NodeFrame::from_bytes(&bytes).unwrap());
        }
        out
    }

    #[tokio::test]
    async fn test_verify_and_relay_scenario() {
        let (gw, _) = gateway().await;
        let mut srv1 = add_node(&gw, "srv-1", NodeType::LOBBY).await;

        let outcome = gw
            .verify_token("alice", "tok-123", ClientHandle::new("h"))
            .await;
        assert_eq!(outcome.code(), 0);
        assert!(outcome.is_accepted());

        assert!(gw.on_client_command("alice", 2 * OFFSET + 42, b"hi").await);
        assert_eq!(frames(&mut srv1), vec![NodeFrame::Relay(
            RelayEnvelope::new("alice", 42, b"hi".to_vec())
        )]);
    }

    #[tokio::test]
    async fn test_wrong_token_creates_no_session() {
        let (gw, _) = gateway().await;

        let outcome = gw.verify_token("alice", "bad", ClientHandle::new("h")).await;
        assert_eq!(outcome.code(), 1);
        assert!(!outcome.is_accepted());
        assert!(!gw.state().sessions.contains("alice"));
        assert!(
            gw.state()
                .sessions
                .resolve_and_touch("alice", NodeType::LOBBY)
                .is_none()
        );
    }

    #[tokio::test]
    async fn test_unknown_account_is_system_error() {
        let (gw, _) = gateway().await;
        let outcome = gw.verify_token("ghost", "x", ClientHandle::new("h")).await;
        assert_eq!(outcome, VerifyOutcome::SystemError);
        assert_eq!(outcome.code(), 2);
    }

    #[tokio::test]
    async fn test_verified_session_resolves_allocated_server() {
        let (gw, _) = gateway().await;
        gw.verify_token("alice", "tok-123", ClientHandle::new("h"))
            .await;
        assert_eq!(
            gw.state()
                .sessions
                .resolve_and_touch("alice", NodeType::LOBBY),
            Some(ServerId::from("srv-1"))
        );
    }

    #[tokio::test]
    async fn test_no_lobby_node_drops_silently() {
        let (gw, _) = gateway().await;
        let mut room = add_node(&gw, "room-1", NodeType::ROOM).await;
        gw.verify_token("alice", "tok-123", ClientHandle::new("h"))
            .await;

        assert!(gw.on_client_command("alice", 2 * OFFSET + 42, b"hi").await);
        assert!(frames(&mut room).is_empty());
    }

    #[tokio::test]
    async fn test_relogin_replaces_and_reports_stale_client() {
        let (gw, sender) = gateway().await;
        gw.verify_token("alice", "tok-123", ClientHandle::new("old"))
            .await;
        gw.verify_token("alice", "tok-123", ClientHandle::new("new"))
            .await;

        assert_eq!(*sender.replaced.lock().unwrap(), vec!["old"]);
        assert_eq!(
            gw.state().sessions.client("alice").unwrap().conn_id(),
            "new"
        );

        // The stale connection's disconnect leaves the new session alone.
        assert!(
            !gw.on_client_disconnected("alice", &ClientHandle::new("old"))
                .await
        );
        assert!(gw.state().sessions.contains("alice"));
    }

    #[tokio::test]
    async fn test_disconnect_notifies_backends() {
        let (gw, _) = gateway().await;
        let mut lobby = add_node(&gw, "srv-1", NodeType::LOBBY).await;
        let mut room = add_node(&gw, "room-1", NodeType::ROOM).await;
        let client = ClientHandle::new("h");
        gw.verify_token("alice", "tok-123", client.clone()).await;

        assert!(gw.on_client_disconnected("alice", &client).await);
        assert!(!gw.on_client_disconnected("alice", &client).await);

        let lost = NodeFrame::AccountLost {
            account: "alice".into(),
        };
        assert_eq!(frames(&mut lobby), vec![lost.clone()]);
        assert_eq!(frames(&mut room), vec![lost]);
    }

    #[tokio::test]
    async fn test_send_to_clients() {
        let (gw, sender) = gateway().await;
        assert!(!gw.send_to_client("alice", 5, b"x"));

        gw.verify_token("alice", "tok-123", ClientHandle::new("h-alice"))
            .await;
        assert!(gw.send_to_client("alice", 5, b"x"));
        assert_eq!(gw.send_to_all_clients(6, b"all"), 1);

        assert_eq!(*sender.sent.lock().unwrap(), vec![
            ("h-alice".to_string(), 5, b"x".to_vec()),
            ("h-alice".to_string(), 6, b"all".to_vec()),
        ]);
    }

    #[tokio::test]
    async fn test_encoder_wraps_both_directions() {
        let sender = Arc::new(RecordingSender::default());
        let store = Arc::new(MemoryTokenStore::new());
        store
            .put(Token::new("alice", "tok-123").with_server(NodeType::LOBBY, "srv-1"))
            .await;
        let hooks = GatewayHooks::noop()
            .with_client_sender(sender.clone())
            .with_encoder(Arc::new(Bracketed));
        let gw = Gateway::new(SwitchyardConfig::default(), store, hooks).unwrap();
        let mut srv1 = add_node(&gw, "srv-1", NodeType::LOBBY).await;
        gw.verify_token("alice", "tok-123", ClientHandle::new("h"))
            .await;

        assert!(gw.on_client_command("alice", 2 * OFFSET + 1, b"<hi>").await);
        assert!(gw.on_client_command("alice", 2 * OFFSET + 2, b"raw").await);
        assert_eq!(frames(&mut srv1), vec![NodeFrame::Relay(RelayEnvelope::new(
            "alice",
            1,
            b"hi".to_vec()
        ))]);

        assert!(gw.send_to_client("alice", 9, b"yo"));
        assert_eq!(*sender.sent.lock().unwrap(), vec![(
            "h".to_string(),
            9,
            b"<yo>".to_vec()
        )]);
    }

    #[tokio::test]
    async fn test_evict_releases_and_reports_client() {
        let mut config = SwitchyardConfig::default();
        config.gateway.session_idle_timeout_secs = 3600;
        let sender = Arc::new(RecordingSender::default());
        let (gw, _) = gateway_with(config, sender.clone()).await;
        let mut lobby = add_node(&gw, "srv-1", NodeType::LOBBY).await;
        gw.verify_token("alice", "tok-123", ClientHandle::new("h"))
            .await;

        // Nothing is an hour old yet.
        assert_eq!(gw.evict_idle().await, 0);
        assert!(gw.state().sessions.contains("alice"));
        assert!(sender.evicted.lock().unwrap().is_empty());

        assert!(gw.evict("alice").await);
        assert!(!gw.evict("alice").await);
        assert_eq!(*sender.evicted.lock().unwrap(), vec!["h"]);
        assert_eq!(frames(&mut lobby), vec![NodeFrame::AccountLost {
            account: "alice".into()
        }]);
    }

    #[tokio::test]
    async fn test_sweeper_evicts_and_close_releases() {
        let mut config = SwitchyardConfig::default();
        config.gateway.session_idle_timeout_secs = 1;
        config.gateway.sweep_interval_secs = 1;
        let sender = Arc::new(RecordingSender::default());
        let (gw, store) = gateway_with(config, sender.clone()).await;
        store.put(Token::new("bob", "b")).await;
        let mut lobby = add_node(&gw, "srv-1", NodeType::LOBBY).await;

        gw.start().await;
        gw.start().await;
        gw.verify_token("alice", "tok-123", ClientHandle::new("a"))
            .await;

        let bytes = tokio::time::timeout(Duration::from_secs(10), lobby.recv())
            .await
            .unwrap()
            .unwrap();
        assert_eq!(NodeFrame::from_bytes(&bytes).unwrap(), NodeFrame::AccountLost {
            account: "alice".into()
        });
        assert!(!gw.state().sessions.contains("alice"));
        assert!(frames(&mut lobby).is_empty());
        assert_eq!(*sender.evicted.lock().unwrap(), vec!["a"]);

        gw.verify_token("bob", "b", ClientHandle::new("b")).await;
        gw.close().await;
        assert!(gw.state().sessions.is_empty());
        assert_eq!(frames(&mut lobby), vec![NodeFrame::AccountLost {
            account: "bob".into()
        }]);
        assert_eq!(gw.state().nodes.all_nodes().await.len(), 1);
    }

    #[test]
    fn test_zero_offset_is_rejected() {
        let mut config = SwitchyardConfig::default();
        config.common.msg_cmd_offset = 0;
        assert!(
            Gateway::new(
                config,
                Arc::new(MemoryTokenStore::new()),
                GatewayHooks::noop()
            )
            .is_err()
        );
    }
}
