//! Process-wide session setup shared by the commands

use super::config::BridgeConfig;
use std::future::Future;
use std::sync::Arc;
use wabridge::messaging::{
    BootstrapPath, Bootstrapper, CredentialStore, EventDispatcher, LoopbackBackend,
    SessionClient, SqliteCredentialStore, TerminalQrRenderer,
};

/// Everything one bridge process owns
pub struct BridgeSession {
    pub store: Arc<SqliteCredentialStore>,
    pub client: Arc<SessionClient<LoopbackBackend>>,
    bootstrapper: Bootstrapper,
}

impl BridgeSession {
    /// Open the store, bind the client to the stored identity and register
    /// the event dispatcher. Nothing is connected yet.
    pub async fn open(config: &BridgeConfig) -> Result<Self, Box<dyn std::error::Error>> {
        let store = Arc::new(SqliteCredentialStore::open(&config.store.path).await?);
        let identity = store.load_identity().await?;

        let backend = LoopbackBackend::new(store.clone(), config.loopback_config()?);
        let client = Arc::new(SessionClient::new(backend, identity));
        client
            .register_handler(EventDispatcher::new().into_handler())
            .await;

        let bootstrapper =
            Bootstrapper::new(store.clone()).with_pairing_timeout(config.pairing_timeout()?);

        Ok(Self {
            store,
            client,
            bootstrapper,
        })
    }

    /// Pair or reconnect; any failure is fatal to the caller
    pub async fn bootstrap(&self) -> Result<BootstrapPath, Box<dyn std::error::Error>> {
        let path = self
            .bootstrapper
            .run(self.client.as_ref(), &mut TerminalQrRenderer)
            .await?;

        match &path {
            BootstrapPath::Paired(identity) => {
                println!("✅ Device paired successfully!");
                println!("   JID: {}", identity.jid);
            }
            BootstrapPath::Reconnected(identity) => {
                println!("🔌 Connected as {}", identity.jid);
            }
        }
        println!();

        Ok(path)
    }

    /// Bootstrap unless `shutdown` resolves first
    ///
    /// `None` means the signal won; the half-open session is disconnected.
    pub async fn bootstrap_until<F>(
        &self,
        shutdown: F,
    ) -> Result<Option<BootstrapPath>, Box<dyn std::error::Error>>
    where
        F: Future<Output = ()>,
    {
        tokio::select! {
            path = self.bootstrap() => path.map(Some),
            _ = shutdown => {
                println!("🛑 Interrupted before the session came up");
                self.client.disconnect().await;
                Ok(None)
            }
        }
    }
}
