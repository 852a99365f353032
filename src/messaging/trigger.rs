//! Dispatch Trigger
//!
//! Shared entry point for every outbound send: HTTP requests and the `send`
//! command both come through [`dispatch_text`]. Input problems are reported
//! per request and never take the session down.

use super::client::SessionClient;
use super::jid::{Jid, JidParseError};
use super::traits::{BridgeError, MessagingBackend, OutboundMessage, SendReceipt};

/// Errors confined to one dispatch request
#[derive(Debug, thiserror::Error)]
pub enum DispatchError {
    #[error("Invalid recipient: {0}")]
    InvalidRecipient(#[from] JidParseError),

    #[error("Message body is empty")]
    EmptyMessage,

    #[error(transparent)]
    Session(#[from] BridgeError),
}

/// Parse an untrusted recipient string
pub fn parse_recipient(raw: &str) -> Result<Jid, DispatchError> {
    Ok(raw.parse::<Jid>()?)
}

/// Validate the inputs and submit one text message
///
/// Waits for the server acknowledgement, with no deadline and no retry.
pub async fn dispatch_text<B: MessagingBackend>(
    client: &SessionClient<B>,
    raw_recipient: &str,
    body: &str,
) -> Result<(Jid, SendReceipt), DispatchError> {
    let recipient = parse_recipient(raw_recipient)?;
    if body.trim().is_empty() {
        return Err(DispatchError::EmptyMessage);
    }

    let receipt = client
        .send_text(&recipient, OutboundMessage::text(body))
        .await?;

    tracing::info!(recipient = %recipient, id = %receipt.id, "message sent");
    Ok((recipient, receipt))
}
