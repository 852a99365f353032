//! Messaging Backend Trait Abstractions
//!
//! The network protocol lives behind [`MessagingBackend`]. The session layer
//! only ever talks to this trait, so tests and local runs can swap in the
//! loopback backend.

use super::jid::Jid;
use async_trait::async_trait;
use futures::stream::BoxStream;
use std::fmt;
use std::sync::Arc;

/// Result type for session and backend operations
pub type BridgeResult<T> = Result<T, BridgeError>;

/// Session, backend and store errors
#[derive(Debug, thiserror::Error)]
pub enum BridgeError {
    #[error("Network error: {0}")]
    Network(String),

    #[error("Store error: {0}")]
    Store(String),

    #[error("Pairing error: {0}")]
    Pairing(String),

    #[error("Pairing failed: {0}")]
    PairingFailed(PairingStatus),

    #[error("Pairing timed out before a code was scanned")]
    PairingTimedOut,

    #[error("Pairing ended but no identity was stored")]
    PairingUnconfirmed,

    #[error("Send failed: {0}")]
    Send(String),

    #[error("Session is not connected")]
    NotConnected,

    #[error("Session is already connected")]
    AlreadyConnected,
}

/// Terminal status label reported at the end of a pairing attempt
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingStatus {
    Success,
    Timeout,
    ClientOutdated,
    ScannedWithoutMultidevice,
    Error(String),
}

impl PairingStatus {
    pub fn is_success(&self) -> bool {
        matches!(self, PairingStatus::Success)
    }
}

impl fmt::Display for PairingStatus {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            PairingStatus::Success => f.write_str("success"),
            PairingStatus::Timeout => f.write_str("timeout"),
            PairingStatus::ClientOutdated => f.write_str("err-client-outdated"),
            PairingStatus::ScannedWithoutMultidevice => {
                f.write_str("err-scanned-without-multidevice")
            }
            PairingStatus::Error(reason) => write!(f, "error: {}", reason),
        }
    }
}

/// One item of the pairing sequence
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingEvent {
    /// A code for the operator to scan; replaces any earlier code
    Code(String),
    /// Terminal status; nothing meaningful follows it
    Outcome(PairingStatus),
}

/// Lazy sequence of pairing events produced by the backend
pub type PairingStream = BoxStream<'static, PairingEvent>;

/// Metadata of an inbound message
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageInfo {
    pub id: String,
    pub chat: Jid,
    pub sender: Jid,
    pub push_name: Option<String>,
    pub timestamp: u64,
}

/// Inbound message as delivered by the backend
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct MessageEvent {
    pub info: MessageInfo,
    /// Plain conversation text; `None` for media and other non-text payloads
    pub text: Option<String>,
}

/// Everything the backend can deliver to subscribers
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendEvent {
    Connected,
    Disconnected,
    PairSuccess { jid: Jid },
    LoggedOut { reason: String },
    Message(MessageEvent),
    Receipt { sender: Jid, message_ids: Vec<String> },
    Presence { from: Jid, available: bool },
}

/// Outbound text payload
///
/// Carries no chat-state or reply context.
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct OutboundMessage {
    pub text: String,
}

impl OutboundMessage {
    pub fn text(text: impl Into<String>) -> Self {
        Self { text: text.into() }
    }
}

/// Server acknowledgement of a submitted message (not of delivery)
#[derive(Debug, Clone, PartialEq, Eq, serde::Serialize)]
pub struct SendReceipt {
    pub id: String,
    pub timestamp: u64,
}

/// Callback invoked by the backend for every event, on the backend's own task
pub type EventHandler = Arc<dyn Fn(BackendEvent) + Send + Sync>;

/// Identifier returned by [`MessagingBackend::subscribe`]
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct HandlerId(pub u32);

/// Messaging backend abstraction
///
/// Implementations own the connection, the protocol, and persisting the
/// identity once pairing succeeds.
#[async_trait]
pub trait MessagingBackend: Send + Sync {
    /// Open the connection. With no stored identity this also starts the
    /// pairing handshake requested through [`begin_pairing`](Self::begin_pairing).
    async fn connect(&self) -> BridgeResult<()>;

    /// Close the connection
    async fn disconnect(&self);

    /// Request a new-device pairing. Must be called before `connect`.
    async fn begin_pairing(&self) -> BridgeResult<PairingStream>;

    /// Submit a text message and wait for the server acknowledgement
    async fn send_text(
        &self,
        recipient: &Jid,
        message: OutboundMessage,
    ) -> BridgeResult<SendReceipt>;

    /// Register an event handler
    fn subscribe(&self, handler: EventHandler) -> HandlerId;

    /// Remove a previously registered handler
    fn unsubscribe(&self, id: HandlerId) -> bool;

    fn is_connected(&self) -> bool;
}
