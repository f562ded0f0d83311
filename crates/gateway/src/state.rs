use std::sync::Arc;

use tracing::{debug, warn};

use {
    switchyard_auth::TokenStore,
    switchyard_config::SwitchyardConfig,
    switchyard_protocol::{CommandNamespace, NodeFrame},
    switchyard_sessions::{Session, SessionRegistry},
};

use crate::{
    hooks::GatewayHooks,
    nodes::{NodeRegistry, NodeTopology},
};

// ── Gateway state ────────────────────────────────────────────────────────────

/// Process-wide gateway context, built once at startup and shared by `Arc`.
pub struct GatewayState {
    pub config: SwitchyardConfig,
    /// Wire command namespace derived from `common.msg_cmd_offset`.
    pub namespace: CommandNamespace,
    /// Authenticated accounts.
    pub sessions: Arc<SessionRegistry>,
    /// Connected backend nodes.
    pub nodes: Arc<NodeRegistry>,
    pub tokens: Arc<dyn TokenStore>,
    pub hooks: GatewayHooks,
    /// Server version string.
    pub version: String,
}

impl GatewayState {
    pub fn new(
        config: SwitchyardConfig,
        tokens: Arc<dyn TokenStore>,
        hooks: GatewayHooks,
    ) -> anyhow::Result<Arc<Self>> {
        config.validate()?;
        let namespace = CommandNamespace::new(config.common.msg_cmd_offset)?;
        Ok(Arc::new(Self {
            config,
            namespace,
            sessions: Arc::new(SessionRegistry::new()),
            nodes: Arc::new(NodeRegistry::new()),
            tokens,
            hooks,
            version: env!("CARGO_PKG_VERSION").to_string(),
        }))
    }

    /// Tell every backend to drop what it holds for `session`'s account.
    ///
    /// Broadcast rather than only the assigned servers: fallback-routed
    /// services never appear in the assignments. Backends treat the notice as
    /// idempotent.
    pub async fn release_session(&self, session: &Session) {
        let nodes = self.nodes.all_nodes().await;
        debug!(
            account = %session.account,
            nodes = nodes.len(),
            "broadcasting account loss"
        );
        for node in nodes {
            let frame = NodeFrame::AccountLost {
                account: session.account.clone(),
            };
            if !node.send(frame) {
                warn!(
                    account = %session.account,
                    server = %node.server_id(),
                    "account loss notice dropped"
                );
            }
        }
    }
}
