use std::time::Duration;

use {
    anyhow::{Context, Result},
    clap::Subcommand,
    switchyard_auth::{SqliteTokenStore, Token},
    switchyard_config::SwitchyardConfig,
    switchyard_protocol::{NodeType, ServerId},
};

#[derive(Subcommand)]
pub enum TokenAction {
    /// Create or replace an account's token.
    Put {
        account: String,
        token: String,
        /// Allocated server, as `<type>=<server id>` (e.g. `lobby=lobby-1`).
        #[arg(long = "server", value_parser = parse_server)]
        servers: Vec<(NodeType, ServerId)>,
    },
    /// Remove an account's token.
    Delete { account: String },
}

pub async fn handle_token(action: TokenAction, config: &SwitchyardConfig) -> Result<()> {
    let store = open_store(config).await?;
    match action {
        TokenAction::Put {
            account,
            token,
            servers,
        } => {
            let token = servers
                .into_iter()
                .fold(Token::new(&account, token), |t, (node_type, id)| {
                    t.with_server(node_type, id)
                });
            store.put(&token).await?;
            println!(
                "stored token for {account} ({} allocated servers)",
                token.allocated_servers.len()
            );
        },
        TokenAction::Delete { account } => {
            store.delete(&account).await?;
            println!("deleted token for {account}");
        },
    }
    Ok(())
}

async fn open_store(config: &SwitchyardConfig) -> Result<SqliteTokenStore> {
    let gw = &config.gateway;
    SqliteTokenStore::connect(&gw.token_db, Duration::from_millis(gw.store_timeout_ms))
        .await
        .with_context(|| format!("opening token store {}", gw.token_db))
}

/// Parse `<type>=<server id>`; the type is a name or a number.
fn parse_server(raw: &str) -> Result<(NodeType, ServerId), String> {
    let (node_type, id) = raw
        .split_once('=')
        .ok_or_else(|| format!("expected <type>=<server id>, got `{raw}`"))?;
    let node_type =
        NodeType::parse(node_type.trim()).ok_or_else(|| format!("unknown node type `{node_type}`"))?;
    let id = id.trim();
    if id.is_empty() {
        return Err(format!("empty server id in `{raw}`"));
    }
    Ok((node_type, ServerId::new(id)))
}

#[cfg(test)]
mod tests {
    use switchyard_auth::TokenStore;

    use super::*;

    #[test]
    fn test_parse_server() {
        assert_eq!(
            parse_server("lobby=lobby-1").unwrap(),
            (NodeType::LOBBY, ServerId::from("lobby-1"))
        );
        assert_eq!(
            parse_server("42 = custom-a").unwrap(),
            (NodeType(42), ServerId::from("custom-a"))
        );
        assert!(parse_server("lobby").is_err());
        assert!(parse_server("lobby=").is_err());
        assert!(parse_server("nope=x").is_err());
    }

    #[tokio::test]
    async fn test_put_then_delete() {
        let dir = tempfile::tempdir().unwrap();
        let mut config = SwitchyardConfig::default();
        config.gateway.token_db = format!("sqlite://{}", dir.path().join("tokens.db").display());

        handle_token(
            TokenAction::Put {
                account: "alice".into(),
                token: "tok-123".into(),
                servers: vec![(NodeType::LOBBY, "srv-1".into())],
            },
            &config,
        )
        .await
        .unwrap();

        let store = open_store(&config).await.unwrap();
        let token = store.load("alice").await.unwrap();
        assert_eq!(token.token, "tok-123");
        assert_eq!(
            token.allocated_servers.get(&NodeType::LOBBY),
            Some(&ServerId::from("srv-1"))
        );

        handle_token(
            TokenAction::Delete {
                account: "alice".into(),
            },
            &config,
        )
        .await
        .unwrap();
        assert!(store.load("alice").await.is_err());
    }
}
