//! Strategy objects the transport injects at construction time.

use std::sync::Arc;

use switchyard_sessions::ClientHandle;

/// Client payload transform (compression, encryption, ...).
///
/// `decode` runs on every inbound client payload before it is relayed;
/// `encode` runs on everything pushed to clients.
pub trait Encoder: Send + Sync {
    fn encode(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;
    fn decode(&self, data: &[u8]) -> anyhow::Result<Vec<u8>>;
}

/// Passes bytes through untouched.
pub struct IdentityEncoder;

impl Encoder for IdentityEncoder {
    fn encode(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(data.to_vec())
    }

    fn decode(&self, data: &[u8]) -> anyhow::Result<Vec<u8>> {
        Ok(data.to_vec())
    }
}

/// Pushes frames to client connections owned by the transport.
pub trait ClientSender: Send + Sync {
    /// Queue `data` for `client`. Must not block; returns false if the
    /// connection is gone.
    fn send(&self, client: &ClientHandle, cmd: u32, data: Vec<u8>) -> bool;

    /// `stale` lost its session to a newer login of the same account. The
    /// transport decides whether to close it.
    fn session_replaced(&self, _stale: &ClientHandle) {}

    /// The gateway dropped `client`'s session on its own (idle or explicit
    /// eviction). Later commands from it are relayed without affinity until
    /// it verifies again, so the transport will usually close it.
    fn session_evicted(&self, _client: &ClientHandle) {}
}

/// For gateways that never push to clients.
pub struct NoopClientSender;

impl ClientSender for NoopClientSender {
    fn send(&self, _client: &ClientHandle, _cmd: u32, _data: Vec<u8>) -> bool {
        false
    }
}

/// Bundle of transport strategies handed to [`crate::state::GatewayState`].
#[derive(Clone)]
pub struct GatewayHooks {
    pub encoder: Arc<dyn Encoder>,
    pub client_sender: Arc<dyn ClientSender>,
}

impl GatewayHooks {
    pub fn noop() -> Self {
        Self {
            encoder: Arc::new(IdentityEncoder),
            client_sender: Arc::new(NoopClientSender),
        }
    }

    pub fn with_encoder(mut self, encoder: Arc<dyn Encoder>) -> Self {
        self.encoder = encoder;
        self
    }

    pub fn with_client_sender(mut self, sender: Arc<dyn ClientSender>) -> Self {
        self.client_sender = sender;
        self
    }
}

impl Default for GatewayHooks {
    fn default() -> Self {
        Self::noop()
    }
}
