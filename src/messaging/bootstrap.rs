//! Connection Bootstrap
//!
//! Turns a fresh [`SessionClient`] into a connected one. With no stored
//! identity the device goes through pairing first; otherwise it reconnects
//! directly. Any failure here is fatal to startup and is never retried.

use super::client::SessionClient;
use super::pairing::{run_pairing_flow, CodeRenderer, PairingOutcome};
use super::store::{CredentialStore, Identity};
use super::traits::{BridgeError, BridgeResult, MessagingBackend};
use std::sync::Arc;
use std::time::Duration;

/// Which path the bootstrap took
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BootstrapPath {
    /// Stored identity, connected directly
    Reconnected(Identity),
    /// No identity; pairing completed and stored one
    Paired(Identity),
}

impl BootstrapPath {
    pub fn identity(&self) -> &Identity {
        match self {
            BootstrapPath::Reconnected(identity) | BootstrapPath::Paired(identity) => identity,
        }
    }
}

/// Connection bootstrapper
pub struct Bootstrapper {
    store: Arc<dyn CredentialStore>,
    pairing_timeout: Option<Duration>,
}

impl Bootstrapper {
    pub fn new(store: Arc<dyn CredentialStore>) -> Self {
        Self {
            store,
            pairing_timeout: None,
        }
    }

    /// Give up pairing after `timeout` if no terminal status arrived
    pub fn with_pairing_timeout(mut self, timeout: Option<Duration>) -> Self {
        self.pairing_timeout = timeout;
        self
    }

    /// Connect `client`, pairing first if it has no identity
    pub async fn run<B, R>(
        &self,
        client: &SessionClient<B>,
        renderer: &mut R,
    ) -> BridgeResult<BootstrapPath>
    where
        B: MessagingBackend,
        R: CodeRenderer,
    {
        if let Some(identity) = client.identity().await {
            tracing::info!(jid = %identity.jid, "stored identity found, reconnecting");
            client.connect().await?;
            return Ok(BootstrapPath::Reconnected(identity));
        }

        tracing::info!("no stored identity, starting pairing");
        let events = client.begin_pairing().await?;
        client.connect().await?;

        let outcome = run_pairing_flow(events, renderer, self.pairing_timeout).await;

        let failure = match &outcome {
            PairingOutcome::Success | PairingOutcome::Closed => None,
            PairingOutcome::Failed(status) => Some(BridgeError::PairingFailed(status.clone())),
            PairingOutcome::TimedOut => Some(BridgeError::PairingTimedOut),
        };
        if let Some(error) = failure {
            client.disconnect().await;
            return Err(error);
        }

        // Success and a silently closed sequence are both confirmed against
        // the store; only a persisted identity counts as paired.
        match self.store.load_identity().await? {
            Some(identity) => {
                tracing::info!(jid = %identity.jid, "pairing complete");
                client.set_identity(identity.clone()).await;
                Ok(BootstrapPath::Paired(identity))
            }
            None => {
                tracing::error!(?outcome, "pairing finished without a stored identity");
                client.disconnect().await;
                Err(BridgeError::PairingUnconfirmed)
            }
        }
    }
}
