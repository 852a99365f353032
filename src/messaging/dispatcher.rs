//! Inbound Event Dispatch
//!
//! The backend delivers its full event set; the bridge only reacts to text
//! messages. Every other kind is a no-op.

use super::jid::Jid;
use super::traits::{BackendEvent, EventHandler};
use std::sync::Arc;

/// The event kinds the bridge distinguishes
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum InboundEvent {
    Message { sender: Jid, body: String },
    Other,
}

impl From<&BackendEvent> for InboundEvent {
    fn from(event: &BackendEvent) -> Self {
        match event {
            BackendEvent::Message(message) => match &message.text {
                Some(body) => InboundEvent::Message {
                    sender: message.info.sender.clone(),
                    body: body.clone(),
                },
                None => InboundEvent::Other,
            },
            _ => InboundEvent::Other,
        }
    }
}

/// The single handler registered on the session
///
/// Runs on the backend's delivery task, so it only logs and returns.
#[derive(Debug, Clone, Copy, Default)]
pub struct EventDispatcher;

impl EventDispatcher {
    pub fn new() -> Self {
        Self
    }

    pub fn handle(&self, event: &BackendEvent) {
        if let InboundEvent::Message { sender, body } = InboundEvent::from(event) {
            tracing::info!(sender = %sender, body = %body, "received message");
        }
    }

    /// Wrap the dispatcher for [`SessionClient::register_handler`](super::client::SessionClient::register_handler)
    pub fn into_handler(self) -> EventHandler {
        Arc::new(move |event| self.handle(&event))
    }
}
