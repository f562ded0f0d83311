use std::collections::HashMap;

use {async_trait::async_trait, tokio::sync::RwLock};

use crate::token::Token;

#[derive(Debug, thiserror::Error)]
pub enum TokenStoreError {
    #[error("no token issued for account {0}")]
    NotFound(String),
    #[error("corrupt token record for account {account}: {reason}")]
    Corrupt { account: String, reason: String },
    #[error("token store unavailable: {0}")]
    Backend(#[from] sqlx::Error),
}

/// Read access to issued tokens.
///
/// Implementations own their timeouts; callers never retry.
#[async_trait]
pub trait TokenStore: Send + Sync {
    async fn load(&self, account: &str) -> Result<Token, TokenStoreError>;
}

/// In-process token store for tests and single-binary deployments.
#[derive(Default)]
pub struct MemoryTokenStore {
    tokens: RwLock<HashMap<String, Token>>,
}

impl MemoryTokenStore {
    pub fn new() -> Self {
        Self::default()
    }

    pub async fn put(&self, token: Token) {
        self.tokens
            .write()
            .await
            .insert(token.account.clone(), token);
    }

    pub async fn remove(&self, account: &str) -> Option<Token> {
        self.tokens.write().await.remove(account)
    }
}

#[async_trait]
impl TokenStore for MemoryTokenStore {
    async fn load(&self, account: &str) -> Result<Token, TokenStoreError> {
        self.tokens
            .read()
            .await
            .get(account)
            .cloned()
            .ok_or_else(|| TokenStoreError::NotFound(account.to_string()))
    }
}

#[cfg(test)]
mod tests {
    use switchyard_protocol::NodeType;

    use super::*;

    #[tokio::test]
    async fn memory_store_load_and_remove() {
        let store = MemoryTokenStore::new();
        store
            .put(Token::new("alice", "tok-123").with_server(NodeType::LOBBY, "srv-1"))
            .await;

        let token = store.load("alice").await.unwrap();
        assert_eq!(token.token, "tok-123");
        assert_eq!(
            token.allocated_servers[&NodeType::LOBBY].as_str(),
            "srv-1"
        );

        store.remove("alice").await;
        assert!(matches!(
            store.load("alice").await,
            Err(TokenStoreError::NotFound(a)) if a == "alice"
        ));
    }
}
