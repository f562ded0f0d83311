//! Shared vocabulary between the gateway and backend nodes.
//!
//! Everything that crosses a process boundary lives here: node types, server
//! ids, the command namespace arithmetic, the gateway → backend frames and the
//! numeric token verification result codes.

pub mod command;
pub mod frame;
pub mod node;

pub use {
    command::CommandNamespace,
    frame::{NodeFrame, RelayEnvelope},
    node::{NodeType, ServerId},
};

/// Default width of each service's command range on the wire.
pub const DEFAULT_MSG_CMD_OFFSET: u32 = 1000;

#[derive(Debug, thiserror::Error)]
pub enum ProtocolError {
    #[error("command offset must be greater than zero")]
    ZeroOffset,
    #[error("local command {local} does not fit below offset {offset}")]
    LocalCommandOutOfRange { local: u32, offset: u32 },
    #[error("wire command for {node_type} overflows u32 with offset {offset}")]
    WireCommandOverflow { node_type: NodeType, offset: u32 },
    #[error("frame codec: {0}")]
    Codec(#[from] postcard::Error),
}

// ── Verification result ─────────────────────────────────────────────────────

/// Outcome of a token verification attempt.
///
/// The numeric codes are a wire contract and must never be renumbered.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum VerifyOutcome {
    Accepted,
    TokenMismatch,
    SystemError,
}

impl VerifyOutcome {
    pub fn code(self) -> u32 {
        match self {
            Self::Accepted => 0,
            Self::TokenMismatch => 1,
            Self::SystemError => 2,
        }
    }

    pub fn from_code(code: u32) -> Option<Self> {
        match code {
            0 => Some(Self::Accepted),
            1 => Some(Self::TokenMismatch),
            2 => Some(Self::SystemError),
            _ => None,
        }
    }

    pub fn is_accepted(self) -> bool {
        self == Self::Accepted
    }
}
