//! Device Pairing
//!
//! Drives the interactive new-device handshake: every code the backend
//! produces is shown to the operator straight away, and the first terminal
//! status ends the flow.

use super::traits::{PairingEvent, PairingStatus, PairingStream};
use futures::StreamExt;
use std::time::Duration;

/// How a pairing attempt ended
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PairingOutcome {
    /// Backend reported success
    Success,
    /// Backend reported a terminal status other than success
    Failed(PairingStatus),
    /// The local deadline passed before a terminal status arrived
    TimedOut,
    /// The sequence ended without a terminal status
    Closed,
}

/// Surface that shows pairing codes to a human
pub trait CodeRenderer {
    /// Show `code`, replacing whatever was shown before
    fn render(&mut self, code: &str);
}

/// Renders codes as QR codes on the terminal
#[derive(Debug, Default)]
pub struct TerminalQrRenderer;

impl CodeRenderer for TerminalQrRenderer {
    fn render(&mut self, code: &str) {
        println!("📱 Scan this QR code with the phone that owns the account:");
        println!("   Settings → Linked Devices → Link a Device");
        println!();

        if let Err(e) = qr2term::print_qr(code) {
            tracing::warn!(error = %e, "failed to render QR code");
            println!("Please enter the code manually instead: {}", code);
        }

        println!();
        println!("⏳ Waiting for the code to be scanned...");
    }
}

/// Consume pairing events until the first terminal status
///
/// Blocks the caller for the whole handshake. With `timeout` set, gives up
/// once it elapses.
pub async fn run_pairing_flow<R: CodeRenderer>(
    events: PairingStream,
    renderer: &mut R,
    timeout: Option<Duration>,
) -> PairingOutcome {
    let flow = consume(events, renderer);

    match timeout {
        Some(limit) => match tokio::time::timeout(limit, flow).await {
            Ok(outcome) => outcome,
            Err(_) => {
                tracing::warn!(timeout = ?limit, "pairing deadline passed");
                PairingOutcome::TimedOut
            }
        },
        None => flow.await,
    }
}

async fn consume<R: CodeRenderer>(mut events: PairingStream, renderer: &mut R) -> PairingOutcome {
    let mut codes_shown = 0usize;

    while let Some(event) = events.next().await {
        match event {
            PairingEvent::Code(code) => {
                codes_shown += 1;
                tracing::debug!(codes_shown, "rendering pairing code");
                renderer.render(&code);
            }
            PairingEvent::Outcome(status) => {
                tracing::info!(status = %status, "pairing event");
                return match status {
                    PairingStatus::Success => PairingOutcome::Success,
                    PairingStatus::Timeout => PairingOutcome::TimedOut,
                    other => PairingOutcome::Failed(other),
                };
            }
        }
    }

    tracing::warn!(codes_shown, "pairing sequence closed without a status");
    PairingOutcome::Closed
}
