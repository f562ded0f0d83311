//! Gateway → backend frames.
//!
//! Frames are encoded with postcard. The transport is responsible for length
//! framing; these helpers only produce and consume one frame body.

use serde::{Deserialize, Serialize};

use crate::ProtocolError;

/// A client command relayed to the backend that owns the account.
///
/// `local_command` has the service's namespace offset already stripped.
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct RelayEnvelope {
    pub account: String,
    pub local_command: u32,
    pub payload: Vec<u8>,
}

impl RelayEnvelope {
    pub fn new(account: impl Into<String>, local_command: u32, payload: Vec<u8>) -> Self {
        Self {
            account: account.into(),
            local_command,
            payload,
        }
    }
}

#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub enum NodeFrame {
    Relay(RelayEnvelope),
    /// The gateway dropped the account's session; backends release its state.
    AccountLost { account: String },
}

impl NodeFrame {
    pub fn account(&self) -> &str {
        match self {
            Self::Relay(env) => &env.account,
            Self::AccountLost { account } => account,
        }
    }

    pub fn to_bytes(&self) -> Result<Vec<u8>, ProtocolError> {
        Ok(postcard::to_allocvec(self)?)
    }

    pub fn from_bytes(bytes: &[u8]) -> Result<Self, ProtocolError> {
        Ok(postcard::from_bytes(bytes)?)
    }
}
