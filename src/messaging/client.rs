//! Session Client
//!
//! Wraps exactly one backend connection for the life of the process.
//!
//! ## Locking
//!
//! The lifecycle sits behind a `tokio::sync::RwLock`. `connect` and
//! `disconnect` take the write half, so they never overlap. `send_text`
//! holds the read half until the backend acknowledges, which lets sends run
//! in parallel while making `disconnect` wait for every in-flight send.

use super::jid::Jid;
use super::store::Identity;
use super::traits::*;
use tokio::sync::RwLock;

/// Where the session is in its lifecycle
#[derive(Debug, Clone, Copy, PartialEq, Eq, Default)]
pub enum SessionPhase {
    /// Created, nothing requested from the backend yet
    #[default]
    Idle,
    /// Pairing requested, waiting for the operator
    Pairing,
    Connected,
    /// Torn down; a disconnected session is not reused
    Disconnected,
}

#[derive(Debug, Default)]
struct SessionState {
    phase: SessionPhase,
    identity: Option<Identity>,
    handler: Option<HandlerId>,
}

/// Live handle to one backend connection
pub struct SessionClient<B: MessagingBackend> {
    backend: B,
    state: RwLock<SessionState>,
}

impl<B: MessagingBackend> SessionClient<B> {
    /// Bind a client to a backend and the identity loaded from the store
    pub fn new(backend: B, identity: Option<Identity>) -> Self {
        Self {
            backend,
            state: RwLock::new(SessionState {
                identity,
                ..SessionState::default()
            }),
        }
    }

    pub fn backend(&self) -> &B {
        &self.backend
    }

    pub async fn identity(&self) -> Option<Identity> {
        self.state.read().await.identity.clone()
    }

    pub async fn phase(&self) -> SessionPhase {
        self.state.read().await.phase
    }

    pub async fn is_connected(&self) -> bool {
        self.phase().await == SessionPhase::Connected && self.backend.is_connected()
    }

    /// Register the event handler, replacing any previous one
    pub async fn register_handler(&self, handler: EventHandler) -> HandlerId {
        let mut state = self.state.write().await;
        if let Some(previous) = state.handler.take() {
            self.backend.unsubscribe(previous);
        }
        let id = self.backend.subscribe(handler);
        state.handler = Some(id);
        id
    }

    /// Ask the backend for a new-device pairing sequence
    ///
    /// Only valid before the first `connect`.
    pub async fn begin_pairing(&self) -> BridgeResult<PairingStream> {
        let mut state = self.state.write().await;
        if state.phase != SessionPhase::Idle {
            return Err(BridgeError::Pairing(format!(
                "cannot start pairing in phase {:?}",
                state.phase
            )));
        }

        let events = self.backend.begin_pairing().await?;
        state.phase = SessionPhase::Pairing;
        Ok(events)
    }

    /// Open the backend connection
    pub async fn connect(&self) -> BridgeResult<()> {
        let mut state = self.state.write().await;
        match state.phase {
            SessionPhase::Connected => return Err(BridgeError::AlreadyConnected),
            SessionPhase::Disconnected => {
                return Err(BridgeError::Network(
                    "session was disconnected; create a new client".to_string(),
                ))
            }
            SessionPhase::Idle | SessionPhase::Pairing => {}
        }

        self.backend.connect().await?;
        state.phase = SessionPhase::Connected;
        tracing::debug!("backend connection opened");
        Ok(())
    }

    /// Record the identity confirmed by a completed pairing
    pub(crate) async fn set_identity(&self, identity: Identity) {
        self.state.write().await.identity = Some(identity);
    }

    /// Close the connection. Only the first call reaches the backend.
    pub async fn disconnect(&self) {
        let mut state = self.state.write().await;
        if state.phase == SessionPhase::Disconnected {
            return;
        }

        if let Some(handler) = state.handler.take() {
            self.backend.unsubscribe(handler);
        }
        self.backend.disconnect().await;
        state.phase = SessionPhase::Disconnected;
        tracing::info!("session disconnected");
    }

    /// Send a text message on the live connection
    pub async fn send_text(
        &self,
        recipient: &Jid,
        message: OutboundMessage,
    ) -> BridgeResult<SendReceipt> {
        let state = self.state.read().await;
        if state.phase != SessionPhase::Connected {
            return Err(BridgeError::NotConnected);
        }

        let receipt = self.backend.send_text(recipient, message).await?;
        drop(state);

        tracing::debug!(recipient = %recipient, id = %receipt.id, "message submitted");
        Ok(receipt)
    }
}
