use super::config::BridgeConfig;
use super::session::BridgeSession;
use std::future::Future;
use wabridge::messaging::{shutdown_signal, CredentialStore};

/// Pair this process as a linked device
///
/// Prints a QR code for the operator to scan with the phone that owns the
/// account, then waits until the backend reports the outcome. Does nothing if
/// an identity is already stored.
pub async fn execute(config: &BridgeConfig) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = shutdown_signal()?;
    pair_until(config, shutdown).await
}

async fn pair_until<F>(
    config: &BridgeConfig,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()>,
{
    println!("🔗 Pairing wabridge as a linked device...");
    println!("Store Path: {}", config.store.path.display());
    println!();

    let session = BridgeSession::open(config).await?;

    if let Some(identity) = session.store.load_identity().await? {
        println!("✅ Already paired as {}", identity.jid);
        println!("Run 'wabridge unregister' first to pair again.");
        return Ok(());
    }

    if session.bootstrap_until(shutdown).await?.is_none() {
        return Ok(());
    }
    session.client.disconnect().await;

    println!("🎉 You can now run 'wabridge serve' or 'wabridge send'.");
    Ok(())
}
