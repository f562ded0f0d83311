//! Gateway: token verification, session affinity and client → backend relay.
//!
//! Lifecycle:
//! 1. Load + validate config, open the token store
//! 2. Build the [`state::GatewayState`] context with the transport's hooks
//! 3. [`server::Gateway::start`] spawns the idle-session sweeper
//! 4. The transport registers backend nodes and feeds client events in
//! 5. [`server::Gateway::close`] stops the sweeper and releases all sessions
//!
//! Accepting sockets and framing bytes belong to the transport; it talks to
//! this crate through [`server::Gateway`] and the traits in [`hooks`] and
//! [`nodes`].

pub mod auth;
pub mod hooks;
pub mod nodes;
pub mod relay;
pub mod server;
pub mod state;

pub use {
    hooks::{ClientSender, Encoder, GatewayHooks},
    nodes::{ChannelNodeConnection, NodeConnection, NodeRegistry, NodeTopology},
    server::Gateway,
};
