//! HTTP dispatch trigger
//!
//! Serves `GET /?JID=<recipient>&message=<text>` on top of the one
//! long-lived session created at startup. Requests only borrow that session;
//! nothing here connects or pairs.

pub mod routes;

use crate::messaging::{MessagingBackend, SessionClient};
use axum::{routing::get, Router};
use std::future::Future;
use std::net::SocketAddr;
use std::sync::Arc;

/// Session shared across handlers
pub type SharedSession<B> = Arc<SessionClient<B>>;

/// Create the HTTP router
pub fn create_router<B>(session: SharedSession<B>) -> Router
where
    B: MessagingBackend + 'static,
{
    Router::new()
        .route("/", get(routes::send_message::<B>))
        .route("/health", get(routes::health::<B>))
        .with_state(session)
}

/// Serve until `shutdown` resolves, letting in-flight requests finish
pub async fn serve<B, F>(
    session: SharedSession<B>,
    addr: SocketAddr,
    shutdown: F,
) -> std::io::Result<()>
where
    B: MessagingBackend + 'static,
    F: Future<Output = ()> + Send + 'static,
{
    let listener = tokio::net::TcpListener::bind(addr).await?;
    tracing::info!(addr = %listener.local_addr()?, "HTTP trigger listening");

    axum::serve(listener, create_router(session))
        .with_graceful_shutdown(shutdown)
        .await
}
