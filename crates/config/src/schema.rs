//! Config schema: common topology settings, gateway and backend sink sections.
use serde::{Deserialize, Serialize};

use switchyard_protocol::{DEFAULT_MSG_CMD_OFFSET, NodeType};

/// Root configuration.
#[derive(Debug, Clone, Default, Serialize, Deserialize)]
#[serde(default)]
pub struct SwitchyardConfig {
    pub common: CommonConfig,
    pub gateway: GatewayConfig,
    pub sink: SinkConfig,
}

/// Settings that must be identical on every node of the topology.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CommonConfig {
    /// Width of each service's wire command block.
    pub msg_cmd_offset: u32,
}

impl Default for CommonConfig {
    fn default() -> Self {
        Self {
            msg_cmd_offset: DEFAULT_MSG_CMD_OFFSET,
        }
    }
}

#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct GatewayConfig {
    /// SQLite URL of the token store.
    pub token_db: String,
    /// Upper bound on acquiring a token store connection.
    pub store_timeout_ms: u64,
    /// Sessions idle longer than this are evicted. `0` disables eviction.
    pub session_idle_timeout_secs: u64,
    /// How often the idle sweeper runs.
    pub sweep_interval_secs: u64,
}

impl Default for GatewayConfig {
    fn default() -> Self {
        Self {
            token_db: "sqlite://tokens.db".into(),
            store_timeout_ms: 3000,
            session_idle_timeout_secs: 0,
            sweep_interval_secs: 30,
        }
    }
}

/// What a per-account mailbox does when it is full.
#[derive(Debug, Clone, Copy, Default, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "lowercase")]
pub enum OverflowPolicy {
    /// Drop the incoming message and log it.
    #[default]
    Reject,
    /// Wait for the account's actor to make room.
    Block,
}

/// Backend-side relay sink settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct SinkConfig {
    /// Node types allowed to relay into this backend.
    pub allowed_sources: Vec<NodeType>,
    pub mailbox_capacity: usize,
    pub overflow: OverflowPolicy,
}

impl Default for SinkConfig {
    fn default() -> Self {
        Self {
            allowed_sources: vec![NodeType::CLIENT],
            mailbox_capacity: 256,
            overflow: OverflowPolicy::Reject,
        }
    }
}

impl SwitchyardConfig {
    /// Reject values the rest of the system cannot operate with.
    pub fn validate(&self) -> anyhow::Result<()> {
        if self.common.msg_cmd_offset == 0 {
            anyhow::bail!("common.msg_cmd_offset must be greater than zero");
        }
        if self.sink.mailbox_capacity == 0 {
            anyhow::bail!("sink.mailbox_capacity must be greater than zero");
        }
        if self.gateway.session_idle_timeout_secs > 0 && self.gateway.sweep_interval_secs == 0 {
            anyhow::bail!("gateway.sweep_interval_secs must be set when idle eviction is enabled");
        }
        Ok(())
    }
}
