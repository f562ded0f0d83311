mod token_commands;

use std::{path::PathBuf, sync::Arc, time::Duration};

use {
    anyhow::Context,
    clap::{Parser, Subcommand},
    tracing::info,
    tracing_subscriber::{EnvFilter, fmt, layer::SubscriberExt, util::SubscriberInitExt},
};

use {
    switchyard_auth::SqliteTokenStore,
    switchyard_config::SwitchyardConfig,
    switchyard_gateway::{Gateway, GatewayHooks},
    switchyard_protocol::CommandNamespace,
};

#[derive(Parser)]
#[command(name = "switchyard", about = "Switchyard, session-affinity gateway")]
struct Cli {
    #[command(subcommand)]
    command: Commands,

    /// Config file (otherwise discovered as switchyard.{toml,yaml,yml,json}).
    #[arg(long, global = true)]
    config: Option<PathBuf>,

    /// Log level (trace, debug, info, warn, error).
    #[arg(long, global = true, default_value = "info")]
    log_level: String,

    /// Output logs as JSON instead of human-readable.
    #[arg(long, global = true, default_value_t = false)]
    json_logs: bool,
}

#[derive(Subcommand)]
enum Commands {
    /// Run the gateway until interrupted.
    Gateway,
    /// Split a wire command into node type and local command.
    Decode { wire_cmd: u32 },
    /// Token store management.
    Token {
        #[command(subcommand)]
        action: token_commands::TokenAction,
    },
}

fn init_telemetry(cli: &Cli) {
    let filter =
        EnvFilter::try_from_default_env().unwrap_or_else(|_| EnvFilter::new(&cli.log_level));

    if cli.json_logs {
        tracing_subscriber::registry()
            .with(filter)
            .with(fmt::layer().json().with_target(true).with_thread_ids(false))
            .init();
    } else {
        tracing_subscriber::registry()
            .with(filter)
            .with(
                fmt::layer()
                    .with_target(false)
                    .with_thread_ids(false)
                    .with_ansi(true),
            )
            .init();
    }
}

fn load_config(cli: &Cli) -> anyhow::Result<SwitchyardConfig> {
    match &cli.config {
        Some(path) => switchyard_config::load_config(path),
        None => switchyard_config::discover_and_load(),
    }
}

async fn run_gateway(config: SwitchyardConfig) -> anyhow::Result<()> {
    let gw = &config.gateway;
    let store = SqliteTokenStore::connect(&gw.token_db, Duration::from_millis(gw.store_timeout_ms))
        .await
        .with_context(|| format!("opening token store {}", gw.token_db))?;

    let gateway = Gateway::new(config, Arc::new(store), GatewayHooks::noop())?;
    gateway.start().await;

    tokio::signal::ctrl_c().await?;
    info!("shutdown requested");
    gateway.close().await;
    Ok(())
}

fn decode(config: &SwitchyardConfig, wire_cmd: u32) -> anyhow::Result<String> {
    let namespace = CommandNamespace::new(config.common.msg_cmd_offset)?;
    let (node_type, local) = namespace.decode(wire_cmd);
    let relay = if node_type.is_relay_target() {
        "relayed"
    } else {
        "not relayed"
    };
    Ok(format!("{node_type} {local} ({relay})"))
}

#[tokio::main]
async fn main() -> anyhow::Result<()> {
    dotenvy::dotenv().ok();
    let cli = Cli::parse();
    init_telemetry(&cli);

    info!(version = env!("CARGO_PKG_VERSION"), "switchyard starting");
    let config = load_config(&cli)?;

    match cli.command {
        Commands::Gateway => run_gateway(config).await,
        Commands::Decode { wire_cmd } => {
            println!("{}", decode(&config, wire_cmd)?);
            Ok(())
        },
        Commands::Token { action } => token_commands::handle_token(action, &config).await,
    }
}
