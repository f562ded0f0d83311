use std::sync::Arc;

use {
    dashmap::{DashMap, mapref::entry::Entry},
    tokio::sync::mpsc::error::TrySendError,
    tokio_util::sync::CancellationToken,
    tracing::{debug, error, warn},
};

use {
    switchyard_config::{OverflowPolicy, SinkConfig},
    switchyard_protocol::{NodeFrame, NodeType},
};

use crate::actor::{AccountActor, AccountHandler, Delivery};

#[derive(Debug, thiserror::Error)]
pub enum SinkError {
    #[error("node type {0} may not relay into this sink")]
    UnknownSource(NodeType),
    #[error("mailbox for account {0} is full")]
    MailboxFull(String),
    #[error("actor for account {0} stopped")]
    ActorStopped(String),
}

/// Receives relay frames and fans them out to per-account actors.
///
/// Actors are created lazily on an account's first message and torn down by
/// [`AccountSink::on_account_lost`].
pub struct AccountSink {
    allowed_sources: Vec<NodeType>,
    capacity: usize,
    overflow: OverflowPolicy,
    handler: Arc<dyn AccountHandler>,
    actors: DashMap<String, AccountActor>,
    /// Accounts whose release is in progress; cancelled once it completes.
    retiring: DashMap<String, CancellationToken>,
}

impl AccountSink {
    pub fn new(config: &SinkConfig, handler: Arc<dyn AccountHandler>) -> Self {
        Self {
            allowed_sources: config.allowed_sources.clone(),
            capacity: config.mailbox_capacity.max(1),
            overflow: config.overflow,
            handler,
            actors: DashMap::new(),
            retiring: DashMap::new(),
        }
    }

    /// Route a decoded frame from a node of type `source`.
    pub async fn on_frame(&self, source: NodeType, frame: NodeFrame) -> Result<(), SinkError> {
        match frame {
            NodeFrame::Relay(env) => {
                self.on_relay_message(source, &env.account, env.local_command, env.payload)
                    .await
            },
            NodeFrame::AccountLost { account } => {
                self.on_account_lost(&account).await;
                Ok(())
            },
        }
    }

    /// Queue a relayed command for `account`'s actor.
    ///
    /// Failures are logged here; callers may ignore the result.
    pub async fn on_relay_message(
        &self,
        source: NodeType,
        account: &str,
        local_command: u32,
        payload: Vec<u8>,
    ) -> Result<(), SinkError> {
        if !self.allowed_sources.contains(&source) {
            error!(%source, account, cmd = local_command, "unknown relay source, dropping");
            return Err(SinkError::UnknownSource(source));
        }

        let tx = self.mailbox(account);
        let delivery = Delivery {
            local_command,
            payload,
        };
        match self.overflow {
            OverflowPolicy::Reject => match tx.try_send(delivery) {
                Ok(()) => Ok(()),
                Err(TrySendError::Full(_)) => {
                    warn!(account, cmd = local_command, "mailbox full, dropping");
                    Err(SinkError::MailboxFull(account.to_string()))
                },
                Err(TrySendError::Closed(_)) => {
                    warn!(account, cmd = local_command, "actor stopped, dropping");
                    Err(SinkError::ActorStopped(account.to_string()))
                },
            },
            OverflowPolicy::Block => tx.send(delivery).await.map_err(|_| {
                warn!(account, cmd = local_command, "actor stopped, dropping");
                SinkError::ActorStopped(account.to_string())
            }),
        }
    }

    /// Drop everything held for `account`. Idempotent.
    ///
    /// Waits for the message in flight, if any; queued messages are
    /// discarded. A message arriving meanwhile starts a fresh actor that
    /// delivers nothing until the handler's release hook has returned.
    pub async fn on_account_lost(&self, account: &str) {
        let released = CancellationToken::new();
        let (actor, prior) = {
            // Swap the gate in while holding the account's shard lock so a
            // concurrent `mailbox` sees either the old actor or the new gate.
            let entry = self.actors.entry(account.to_string());
            let prior = self
                .retiring
                .insert(account.to_string(), released.clone());
            let actor = match entry {
                Entry::Occupied(e) => Some(e.remove()),
                Entry::Vacant(_) => None,
            };
            (actor, prior)
        };

        if let Some(prior) = prior {
            prior.cancelled().await;
        }
        if let Some(actor) = actor {
            debug!(account, "releasing account actor");
            actor.stop().await;
        }
        self.handler.on_account_lost(account).await;

        released.cancel();
        self.retiring.remove_if(account, |_, gate| gate.is_cancelled());
    }

    pub fn active_accounts(&self) -> usize {
        self.actors.len()
    }

    pub fn has_account(&self, account: &str) -> bool {
        self.actors.contains_key(account)
    }

    /// Sender for the account's actor, spawning one if needed. The shard lock
    /// is released before the caller sends.
    fn mailbox(&self, account: &str) -> tokio::sync::mpsc::Sender<Delivery> {
        let mut entry = self
            .actors
            .entry(account.to_string())
            .or_insert_with(|| self.spawn_actor(account));
        if entry.is_finished() {
            warn!(account, "account actor exited, restarting");
            *entry = self.spawn_actor(account);
        }
        entry.tx.clone()
    }

    fn spawn_actor(&self, account: &str) -> AccountActor {
        let after = self.retiring.get(account).map(|gate| gate.value().clone());
        AccountActor::spawn(
            account.to_string(),
            self.capacity,
            Arc::clone(&self.handler),
            after,
        )
    }
}
