use std::collections::BTreeMap;

use serde::{Deserialize, Serialize};

use switchyard_protocol::{NodeType, ServerId};

/// Snapshot of an issued token, loaded fresh for every verification.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct Token {
    pub account: String,
    pub token: String,
    #[serde(default)]
    pub allocated_servers: BTreeMap<NodeType, ServerId>,
}

impl Token {
    pub fn new(account: impl Into<String>, token: impl Into<String>) -> Self {
        Self {
            account: account.into(),
            token: token.into(),
            allocated_servers: BTreeMap::new(),
        }
    }

    pub fn with_server(mut self, node_type: NodeType, server: impl Into<ServerId>) -> Self {
        self.allocated_servers.insert(node_type, server.into());
        self
    }
}
