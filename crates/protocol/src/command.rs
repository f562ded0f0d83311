//! Wire command namespace.
//!
//! Each service owns a contiguous block of `offset` command numbers:
//! `wire = service * offset + local`. The offset must match on every node.

use crate::{NodeType, ProtocolError};

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CommandNamespace {
    offset: u32,
}

impl CommandNamespace {
    pub fn new(offset: u32) -> Result<Self, ProtocolError> {
        if offset == 0 {
            return Err(ProtocolError::ZeroOffset);
        }
        Ok(Self { offset })
    }

    pub fn offset(&self) -> u32 {
        self.offset
    }

    /// Split a wire command into its service type and local command.
    pub fn decode(&self, wire_cmd: u32) -> (NodeType, u32) {
        (NodeType(wire_cmd / self.offset), wire_cmd % self.offset)
    }

    pub fn encode(&self, node_type: NodeType, local_cmd: u32) -> Result<u32, ProtocolError> {
        if local_cmd >= self.offset {
            return Err(ProtocolError::LocalCommandOutOfRange {
                local: local_cmd,
                offset: self.offset,
            });
        }
        node_type
            .0
            .checked_mul(self.offset)
            .and_then(|base| base.checked_add(local_cmd))
            .ok_or(ProtocolError::WireCommandOverflow {
                node_type,
                offset: self.offset,
            })
    }
}

impl Default for CommandNamespace {
    fn default() -> Self {
        Self {
            offset: crate::DEFAULT_MSG_CMD_OFFSET,
        }
    }
}
