use std::{collections::BTreeMap, time::Duration};

use {
    async_trait::async_trait,
    sqlx::sqlite::{SqliteConnectOptions, SqlitePoolOptions},
    tracing::debug,
};

use switchyard_protocol::{NodeType, ServerId};

use crate::{
    store::{TokenStore, TokenStoreError},
    token::Token,
};

/// SQLite-backed token store.
///
/// `allocated_servers` is stored as a JSON object keyed by node type name.
pub struct SqliteTokenStore {
    pool: sqlx::SqlitePool,
}

#[derive(sqlx::FromRow)]
struct TokenRow {
    account: String,
    token: String,
    allocated_servers: String,
}

impl TokenRow {
    fn into_token(self) -> Result<Token, TokenStoreError> {
        let allocated_servers: BTreeMap<NodeType, ServerId> =
            serde_json::from_str(&self.allocated_servers).map_err(|e| {
                TokenStoreError::Corrupt {
                    account: self.account.clone(),
                    reason: e.to_string(),
                }
            })?;
        Ok(Token {
            account: self.account,
            token: self.token,
            allocated_servers,
        })
    }
}

impl SqliteTokenStore {
    pub fn new(pool: sqlx::SqlitePool) -> Self {
        Self { pool }
    }

    /// Open (creating if needed) the database at `url` and ensure the schema.
    ///
    /// `acquire_timeout` bounds how long a lookup waits for a connection.
    pub async fn connect(url: &str, acquire_timeout: Duration) -> Result<Self, TokenStoreError> {
        let options = url
            .parse::<SqliteConnectOptions>()?
            .create_if_missing(true);
        let pool = SqlitePoolOptions::new()
            .acquire_timeout(acquire_timeout)
            .connect_with(options)
            .await?;
        Self::init(&pool).await?;
        debug!(url, "token store ready");
        Ok(Self::new(pool))
    }

    /// Create the `tokens` table if it doesn't exist.
    pub async fn init(pool: &sqlx::SqlitePool) -> Result<(), TokenStoreError> {
        sqlx::query(
            r#"CREATE TABLE IF NOT EXISTS tokens (
                account           TEXT PRIMARY KEY,
                token             TEXT NOT NULL,
                allocated_servers TEXT NOT NULL DEFAULT '{}'
            )"#,
        )
        .execute(pool)
        .await?;
        Ok(())
    }

    /// Insert or replace a token. Used by tooling that seeds the store.
    pub async fn put(&self, token: &Token) -> Result<(), TokenStoreError> {
        let servers = serde_json::to_string(&token.allocated_servers).map_err(|e| {
            TokenStoreError::Corrupt {
                account: token.account.clone(),
                reason: e.to_string(),
            }
        })?;
        sqlx::query(
            r#"INSERT INTO tokens (account, token, allocated_servers)
               VALUES (?, ?, ?)
               ON CONFLICT(account) DO UPDATE SET
                 token = excluded.token,
                 allocated_servers = excluded.allocated_servers"#,
        )
        .bind(&token.account)
        .bind(&token.token)
        .bind(servers)
        .execute(&self.pool)
        .await?;
        Ok(())
    }

    pub async fn delete(&self, account: &str) -> Result<(), TokenStoreError> {
        sqlx::query("DELETE FROM tokens WHERE account = ?")
            .bind(account)
            .execute(&self.pool)
            .await?;
        Ok(())
    }
}

#[async_trait]
impl TokenStore for SqliteTokenStore {
    async fn load(&self, account: &str) -> Result<Token, TokenStoreError> {
        let row = sqlx::query_as::<_, TokenRow>(
            "SELECT account, token, allocated_servers FROM tokens WHERE account = ?",
        )
        .bind(account)
        .fetch_optional(&self.pool)
        .await?;
        row.ok_or_else(|| TokenStoreError::NotFound(account.to_string()))?
            .into_token()
    }
}
