use std::sync::Arc;

use {
    async_trait::async_trait,
    tokio::{sync::mpsc, task::JoinHandle},
    tokio_util::sync::CancellationToken,
    tracing::{debug, trace, warn},
};

/// Business logic that consumes relayed client commands.
#[async_trait]
pub trait AccountHandler: Send + Sync + 'static {
    /// Handle one command. Calls for the same account never overlap.
    async fn handle(&self, account: &str, local_command: u32, payload: Vec<u8>);

    /// Release any state cached for `account`. Runs after the account's last
    /// `handle` returned and before any later one starts. May be called for
    /// accounts the handler has never seen, and more than once.
    async fn on_account_lost(&self, _account: &str) {}
}

pub(crate) struct Delivery {
    pub local_command: u32,
    pub payload: Vec<u8>,
}

/// Mailbox and task of one account's sequential processor.
pub(crate) struct AccountActor {
    pub tx: mpsc::Sender<Delivery>,
    cancel: CancellationToken,
    task: JoinHandle<()>,
}

impl AccountActor {
    /// Spawn an actor. With `after`, nothing is delivered until that token is
    /// cancelled, so a replacement never overlaps the actor it replaces.
    pub fn spawn(
        account: String,
        capacity: usize,
        handler: Arc<dyn AccountHandler>,
        after: Option<CancellationToken>,
    ) -> Self {
        let (tx, rx) = mpsc::channel(capacity);
        let cancel = CancellationToken::new();
        let task = tokio::spawn(run(account, rx, handler, after, cancel.clone()));
        Self { tx, cancel, task }
    }

    /// Stop after the message in flight and wait for the task to exit.
    /// Anything still queued is discarded.
    pub async fn stop(self) {
        self.cancel.cancel();
        drop(self.tx);
        if let Err(e) = self.task.await {
            warn!(error = %e, "account actor ended abnormally");
        }
    }

    pub fn is_finished(&self) -> bool {
        self.task.is_finished()
    }
}

async fn run(
    account: String,
    mut rx: mpsc::Receiver<Delivery>,
    handler: Arc<dyn AccountHandler>,
    after: Option<CancellationToken>,
    cancel: CancellationToken,
) {
    if let Some(after) = after {
        tokio::select! {
            biased;
            () = cancel.cancelled() => return,
            () = after.cancelled() => {},
        }
    }
    debug!(account, "account actor started");
    loop {
        let delivery = tokio::select! {
            biased;
            () = cancel.cancelled() => break,
            msg = rx.recv() => match msg {
                Some(msg) => msg,
                None => break,
            },
        };
        trace!(account, cmd = delivery.local_command, "delivering");
        handler
            .handle(&account, delivery.local_command, delivery.payload)
            .await;
    }
    debug!(account, discarded = rx.len(), "account actor stopped");
}
