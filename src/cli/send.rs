use super::config::BridgeConfig;
use super::session::BridgeSession;
use futures::FutureExt;
use std::future::Future;
use wabridge::messaging::{dispatch_text, hold_until_shutdown, shutdown_signal};

/// Message sent when `--message` is not given
pub const DEFAULT_MESSAGE: &str = "Test message";

/// Send one text message, then keep the session up
///
/// The recipient comes from `--recipient` or the `RECIPIENT` environment
/// variable. After the send the process blocks until SIGINT/SIGTERM (unless
/// `no_wait`) so inbound messages keep being logged, then disconnects. A
/// signal during bootstrap or pairing abandons the send.
pub async fn execute(
    config: &BridgeConfig,
    recipient: &str,
    message: &str,
    no_wait: bool,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = shutdown_signal()?;
    send_then_hold(config, recipient, message, no_wait, shutdown).await
}

async fn send_then_hold<F>(
    config: &BridgeConfig,
    recipient: &str,
    message: &str,
    no_wait: bool,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()>,
{
    let shutdown = shutdown.shared();

    let session = BridgeSession::open(config).await?;
    if session.bootstrap_until(shutdown.clone()).await?.is_none() {
        return Ok(());
    }

    // A signal during the send is handled once it completes
    let sent = dispatch_text(session.client.as_ref(), recipient, message).await;
    let (jid, receipt) = match sent {
        Ok(sent) => sent,
        Err(e) => {
            session.client.disconnect().await;
            return Err(e.into());
        }
    };

    println!("📨 Sent to {} (id {})", jid, receipt.id);

    if no_wait {
        session.client.disconnect().await;
        return Ok(());
    }

    println!("⏳ Listening for messages. Press Ctrl-C to exit.");
    hold_until_shutdown(session.client.as_ref(), shutdown).await;
    println!("👋 Session closed");
    Ok(())
}
