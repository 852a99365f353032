//! Process shutdown
//!
//! SIGINT or SIGTERM is the only thing that ends a running bridge. After the
//! signal the session is disconnected once, waiting for in-flight sends.
//! Listeners are registered at startup, before bootstrap and the first send.

use super::client::SessionClient;
use super::traits::MessagingBackend;
use std::future::Future;

/// Register for SIGINT and SIGTERM (Ctrl-C on Windows)
///
/// Listeners are installed before this returns; a signal that arrives before
/// the returned future is first polled still resolves it.
pub fn shutdown_signal() -> std::io::Result<impl Future<Output = ()> + Send + 'static> {
    #[cfg(unix)]
    {
        use tokio::signal::unix::{signal, SignalKind};

        let mut interrupt = signal(SignalKind::interrupt())?;
        let mut terminate = signal(SignalKind::terminate())?;

        Ok(async move {
            tokio::select! {
                _ = interrupt.recv() => tracing::info!("received SIGINT"),
                _ = terminate.recv() => tracing::info!("received SIGTERM"),
            }
        })
    }

    #[cfg(windows)]
    {
        let mut ctrl_c = tokio::signal::windows::ctrl_c()?;

        Ok(async move {
            ctrl_c.recv().await;
            tracing::info!("received Ctrl-C");
        })
    }
}

/// Keep the session up until `signal` resolves, then disconnect it
pub async fn hold_until_shutdown<B, F>(client: &SessionClient<B>, signal: F)
where
    B: MessagingBackend,
    F: Future<Output = ()>,
{
    signal.await;
    tracing::info!("shutting down");
    client.disconnect().await;
}
