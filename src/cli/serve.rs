use super::config::BridgeConfig;
use super::session::BridgeSession;
use futures::FutureExt;
use std::future::Future;
use std::net::SocketAddr;
use wabridge::messaging::shutdown_signal;
use wabridge::server;

/// Run the HTTP dispatch trigger
///
/// Bootstraps the session once at startup and then serves
/// `GET /?JID=<recipient>&message=<text>` on that single connection until
/// SIGINT/SIGTERM. In-flight requests finish before the session is
/// disconnected.
pub async fn execute(
    config: &BridgeConfig,
    listen: Option<SocketAddr>,
) -> Result<(), Box<dyn std::error::Error>> {
    let shutdown = shutdown_signal()?;
    serve_until(config, listen, shutdown).await
}

async fn serve_until<F>(
    config: &BridgeConfig,
    listen: Option<SocketAddr>,
    shutdown: F,
) -> Result<(), Box<dyn std::error::Error>>
where
    F: Future<Output = ()> + Send + 'static,
{
    println!("🚀 Starting wabridge HTTP trigger...");
    println!("Store: {}", config.store.path.display());
    println!();

    let shutdown = shutdown.shared();

    let session = BridgeSession::open(config).await?;
    if session.bootstrap_until(shutdown.clone()).await?.is_none() {
        return Ok(());
    }

    let addr = listen.unwrap_or(config.http.listen);
    println!("📡 Listening on http://{}/?JID=<recipient>&message=<text>", addr);

    let served = server::serve(session.client.clone(), addr, shutdown).await;
    session.client.disconnect().await;
    served?;

    println!("👋 Session closed");
    Ok(())
}
