//! Client → backend relay.
//!
//! Once a wire command decodes to a relayable service the gateway owns it:
//! every later failure is logged and the message is dropped without any
//! signal back to the client.

use std::sync::Arc;

#[cfg(feature = "metrics")]
use metrics::counter;
use tracing::{error, trace, warn};

use {
    switchyard_protocol::{CommandNamespace, NodeFrame, RelayEnvelope},
    switchyard_sessions::SessionRegistry,
};

use crate::{hooks::Encoder, nodes::NodeTopology, state::GatewayState};

pub struct RelayDispatcher {
    namespace: CommandNamespace,
    sessions: Arc<SessionRegistry>,
    topology: Arc<dyn NodeTopology>,
    encoder: Arc<dyn Encoder>,
}

impl RelayDispatcher {
    pub fn new(
        namespace: CommandNamespace,
        sessions: Arc<SessionRegistry>,
        topology: Arc<dyn NodeTopology>,
        encoder: Arc<dyn Encoder>,
    ) -> Self {
        Self {
            namespace,
            sessions,
            topology,
            encoder,
        }
    }

    pub fn from_state(state: &GatewayState) -> Self {
        Self::new(
            state.namespace,
            Arc::clone(&state.sessions),
            Arc::clone(&state.nodes) as Arc<dyn NodeTopology>,
            Arc::clone(&state.hooks.encoder),
        )
    }

    /// Relay one client command.
    ///
    /// Returns false only when the command does not name a relayable service;
    /// the transport then keeps ownership. Otherwise returns true, whether or
    /// not the frame reached the backend.
    pub async fn on_client_command(&self, account: &str, wire_cmd: u32, payload: &[u8]) -> bool {
        let (node_type, local_cmd) = self.namespace.decode(wire_cmd);
        if !node_type.is_relay_target() {
            error!(account, cmd = wire_cmd, %node_type, "wrong message number");
            #[cfg(feature = "metrics")]
            counter!("switchyard_relay_rejected_total").increment(1);
            return false;
        }

        let payload = match self.encoder.decode(payload) {
            Ok(p) => p,
            Err(e) => {
                warn!(account, cmd = wire_cmd, error = %e, "client payload decode failed");
                record_drop("decode");
                return true;
            },
        };

        // Registry lookup first; the shard lock is released before any
        // topology call.
        let pinned = self.sessions.resolve_and_touch(account, node_type);
        let target = match &pinned {
            Some(server_id) => self.topology.node(server_id).await,
            None => self.topology.any_node_of_type(node_type).await,
        };
        let Some(target) = target else {
            error!(
                account,
                cmd = wire_cmd,
                %node_type,
                pinned = ?pinned,
                "target server not found"
            );
            record_drop("no_target");
            return true;
        };

        let frame = NodeFrame::Relay(RelayEnvelope::new(account, local_cmd, payload));
        if !target.send(frame) {
            error!(
                account,
                cmd = wire_cmd,
                %node_type,
                server = %target.server_id(),
                "sending to target server failed"
            );
            record_drop("send");
            return true;
        }

        trace!(account, cmd = local_cmd, server = %target.server_id(), "relayed");
        #[cfg(feature = "metrics")]
        counter!("switchyard_relay_forwarded_total").increment(1);
        true
    }
}

#[cfg_attr(not(feature = "metrics"), allow(unused_variables))]
fn record_drop(reason: &'static str) {
    #[cfg(feature = "metrics")]
    counter!("switchyard_relay_dropped_total", "reason" => reason).increment(1);
}
