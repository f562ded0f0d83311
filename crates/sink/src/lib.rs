//! Backend side of the relay.
//!
//! Relayed client commands arrive here tagged with the node type that sent
//! them. Accepted messages are delivered to business logic through one
//! sequential actor per account, so a single account's commands are handled
//! strictly in arrival order while different accounts run concurrently.

pub mod actor;
pub mod sink;

pub use {
    actor::AccountHandler,
    sink::{AccountSink, SinkError},
};
