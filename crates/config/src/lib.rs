//! Configuration loading: discovery, `${ENV}` substitution, format detection
//! and the typed schema shared by the gateway and backend nodes.

pub mod env_subst;
pub mod loader;
pub mod schema;

pub use {
    loader::{
        clear_config_dir, config_dir, discover_and_load, load_config, parse_config,
        set_config_dir,
    },
    schema::{
        CommonConfig, GatewayConfig, OverflowPolicy, SinkConfig, SwitchyardConfig,
    },
};
