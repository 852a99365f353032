//! Loopback Messaging Backend
//!
//! In-process stand-in for the network. Pairing is simulated (a generated
//! code, then approval after a delay), sends are recorded and can be echoed
//! back as inbound messages. The test suite and local runs of the binary both
//! use it.

use super::jid::Jid;
use super::store::{CredentialStore, Identity};
use super::traits::*;
use async_trait::async_trait;
use futures::StreamExt;
use std::sync::{Arc, Mutex, MutexGuard, PoisonError};
use std::time::{Duration, SystemTime, UNIX_EPOCH};
use tokio::sync::mpsc;
use tokio_stream::wrappers::ReceiverStream;

/// Loopback behaviour knobs
#[derive(Debug, Clone)]
pub struct LoopbackConfig {
    /// Phone number of the simulated account
    pub phone: String,

    /// Device number assigned when pairing succeeds
    pub device: u16,

    /// Delay between showing a code and the simulated scan
    pub approve_after: Duration,

    /// Deliver every sent message back as an inbound message
    pub echo: bool,

    /// Artificial time the server takes to acknowledge a send
    pub send_latency: Duration,

    /// Fixed pairing sequence; `None` generates one code followed by success
    pub pairing_script: Option<Vec<PairingEvent>>,
}

impl Default for LoopbackConfig {
    fn default() -> Self {
        Self {
            phone: "15550000000".to_string(),
            device: 1,
            approve_after: Duration::from_secs(5),
            echo: false,
            send_latency: Duration::ZERO,
            pairing_script: None,
        }
    }
}

/// Operation log entry, for assertions on call order
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum BackendCall {
    Connect,
    Disconnect,
    BeginPairing,
    SendText(Jid),
}

/// Message accepted by the loopback "server"
#[derive(Debug, Clone, PartialEq, Eq)]
pub struct SentMessage {
    pub recipient: Jid,
    pub message: OutboundMessage,
    pub receipt: SendReceipt,
}

#[derive(Default)]
struct LoopbackState {
    connected: bool,
    pending_pairing: Option<mpsc::Sender<PairingEvent>>,
    handlers: Vec<(HandlerId, EventHandler)>,
    next_handler_id: u32,
    sent: Vec<SentMessage>,
    calls: Vec<BackendCall>,
    connect_failure: Option<String>,
    send_failure: Option<String>,
}

struct Inner {
    config: LoopbackConfig,
    store: Arc<dyn CredentialStore>,
    state: Mutex<LoopbackState>,
}

impl Inner {
    fn state(&self) -> MutexGuard<'_, LoopbackState> {
        self.state.lock().unwrap_or_else(PoisonError::into_inner)
    }

    fn emit(&self, event: BackendEvent) {
        let handlers: Vec<EventHandler> = self
            .state()
            .handlers
            .iter()
            .map(|(_, handler)| Arc::clone(handler))
            .collect();

        for handler in handlers {
            handler(event.clone());
        }
    }

    fn paired_jid(&self) -> Jid {
        Jid::new_device(self.config.phone.clone(), self.config.device)
    }
}

/// In-process messaging backend
#[derive(Clone)]
pub struct LoopbackBackend {
    inner: Arc<Inner>,
}

impl LoopbackBackend {
    /// Create a loopback backend that persists paired identities to `store`
    pub fn new(store: Arc<dyn CredentialStore>, config: LoopbackConfig) -> Self {
        Self {
            inner: Arc::new(Inner {
                config,
                store,
                state: Mutex::new(LoopbackState::default()),
            }),
        }
    }

    /// Deliver an event to subscribers on the caller's task
    pub fn inject_event(&self, event: BackendEvent) {
        self.inner.emit(event);
    }

    /// Make the next `connect` call fail with a network error
    pub fn fail_next_connect(&self, reason: impl Into<String>) {
        self.inner.state().connect_failure = Some(reason.into());
    }

    /// Make every subsequent send fail (`None` restores normal sends)
    pub fn fail_sends(&self, reason: Option<String>) {
        self.inner.state().send_failure = reason;
    }

    pub fn sent_messages(&self) -> Vec<SentMessage> {
        self.inner.state().sent.clone()
    }

    pub fn calls(&self) -> Vec<BackendCall> {
        self.inner.state().calls.clone()
    }

    pub fn connect_count(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::Connect))
    }

    pub fn disconnect_count(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::Disconnect))
    }

    pub fn pairing_count(&self) -> usize {
        self.count_calls(|call| matches!(call, BackendCall::BeginPairing))
    }

    pub fn handler_count(&self) -> usize {
        self.inner.state().handlers.len()
    }

    fn count_calls(&self, pred: impl Fn(&BackendCall) -> bool) -> usize {
        self.inner.state().calls.iter().filter(|c| pred(c)).count()
    }

    fn record(&self, call: BackendCall) {
        self.inner.state().calls.push(call);
    }
}

/// Pairing code in the `ref,key` shape the real network shows
fn generate_pairing_code() -> String {
    let reference: [u8; 16] = rand::random();
    let key: [u8; 32] = rand::random();
    format!("2@{},{}", hex::encode(reference), hex::encode(key))
}

fn unix_now() -> u64 {
    SystemTime::now()
        .duration_since(UNIX_EPOCH)
        .map(|d| d.as_secs())
        .unwrap_or_default()
}

async fn run_pairing(inner: Arc<Inner>, events: mpsc::Sender<PairingEvent>) {
    let script = inner.config.pairing_script.clone().unwrap_or_else(|| {
        vec![
            PairingEvent::Code(generate_pairing_code()),
            PairingEvent::Outcome(PairingStatus::Success),
        ]
    });

    for event in script {
        match event {
            PairingEvent::Code(code) => {
                if events.send(PairingEvent::Code(code)).await.is_err() {
                    tracing::debug!("pairing consumer went away");
                    return;
                }
                tokio::time::sleep(inner.config.approve_after).await;
            }
            PairingEvent::Outcome(status) => {
                // abandoned by a disconnect while waiting for the scan
                if !inner.state().connected || events.is_closed() {
                    tracing::debug!("pairing abandoned before completion");
                    return;
                }

                let status = if status.is_success() {
                    let identity = Identity::new(inner.paired_jid(), unix_now());
                    match inner.store.save_identity(&identity).await {
                        Ok(()) => {
                            inner.emit(BackendEvent::PairSuccess {
                                jid: identity.jid.clone(),
                            });
                            inner.emit(BackendEvent::Connected);
                            status
                        }
                        Err(e) => {
                            inner.state().connected = false;
                            PairingStatus::Error(e.to_string())
                        }
                    }
                } else {
                    inner.state().connected = false;
                    status
                };

                let _ = events.send(PairingEvent::Outcome(status)).await;
                return;
            }
        }
    }
}

#[async_trait]
impl MessagingBackend for LoopbackBackend {
    async fn connect(&self) -> BridgeResult<()> {
        self.record(BackendCall::Connect);

        let pending = {
            let mut state = self.inner.state();
            if let Some(reason) = state.connect_failure.take() {
                return Err(BridgeError::Network(reason));
            }
            if state.connected {
                return Err(BridgeError::AlreadyConnected);
            }
            state.pending_pairing.take()
        };

        if let Some(events) = pending {
            self.inner.state().connected = true;
            tokio::spawn(run_pairing(Arc::clone(&self.inner), events));
            return Ok(());
        }

        if !self.inner.store.identity_exists().await? {
            return Err(BridgeError::Network(
                "no identity stored and no pairing requested".to_string(),
            ));
        }

        self.inner.state().connected = true;
        self.inner.emit(BackendEvent::Connected);
        Ok(())
    }

    async fn disconnect(&self) {
        self.record(BackendCall::Disconnect);

        let was_connected = {
            let mut state = self.inner.state();
            state.pending_pairing = None;
            std::mem::replace(&mut state.connected, false)
        };

        if was_connected {
            self.inner.emit(BackendEvent::Disconnected);
        }
    }

    async fn begin_pairing(&self) -> BridgeResult<PairingStream> {
        self.record(BackendCall::BeginPairing);

        if self.inner.state().connected {
            return Err(BridgeError::Pairing(
                "pairing must be requested before connecting".to_string(),
            ));
        }
        if self.inner.store.identity_exists().await? {
            return Err(BridgeError::Pairing(
                "store already contains an identity".to_string(),
            ));
        }

        let (tx, rx) = mpsc::channel(8);
        self.inner.state().pending_pairing = Some(tx);
        Ok(ReceiverStream::new(rx).boxed())
    }

    async fn send_text(
        &self,
        recipient: &Jid,
        message: OutboundMessage,
    ) -> BridgeResult<SendReceipt> {
        self.record(BackendCall::SendText(recipient.clone()));

        if !self.inner.state().connected {
            return Err(BridgeError::NotConnected);
        }

        if !self.inner.config.send_latency.is_zero() {
            tokio::time::sleep(self.inner.config.send_latency).await;
        }

        if let Some(reason) = self.inner.state().send_failure.clone() {
            return Err(BridgeError::Send(reason));
        }

        let receipt = SendReceipt {
            id: uuid::Uuid::new_v4().simple().to_string().to_uppercase(),
            timestamp: unix_now(),
        };

        self.inner.state().sent.push(SentMessage {
            recipient: recipient.clone(),
            message: message.clone(),
            receipt: receipt.clone(),
        });

        if self.inner.config.echo {
            let inner = Arc::clone(&self.inner);
            let echo = BackendEvent::Message(MessageEvent {
                info: MessageInfo {
                    id: format!("ECHO-{}", receipt.id),
                    chat: recipient.to_non_device(),
                    sender: recipient.clone(),
                    push_name: None,
                    timestamp: receipt.timestamp,
                },
                text: Some(message.text),
            });
            tokio::spawn(async move { inner.emit(echo) });
        }

        Ok(receipt)
    }

    fn subscribe(&self, handler: EventHandler) -> HandlerId {
        let mut state = self.inner.state();
        let id = HandlerId(state.next_handler_id);
        state.next_handler_id += 1;
        state.handlers.push((id, handler));
        id
    }

    fn unsubscribe(&self, id: HandlerId) -> bool {
        let mut state = self.inner.state();
        let before = state.handlers.len();
        state.handlers.retain(|(handler_id, _)| *handler_id != id);
        state.handlers.len() != before
    }

    fn is_connected(&self) -> bool {
        self.inner.state().connected
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::messaging::store::MemoryCredentialStore;

    fn instant_config() -> LoopbackConfig {
        LoopbackConfig {
            approve_after: Duration::ZERO,
            ..LoopbackConfig::default()
        }
    }

    fn recipient() -> Jid {
        "123456789@s.whatsapp.net".parse().unwrap()
    }

    #[tokio::test]
    async fn test_connect_requires_identity_or_pairing() {
        let backend = LoopbackBackend::new(Arc::new(MemoryCredentialStore::new()), instant_config());

        let result = backend.connect().await;
        assert!(matches!(result, Err(BridgeError::Network(_))));
        assert!(!backend.is_connected());
    }

    #[tokio::test]
    async fn test_default_pairing_persists_identity() {
        let store = Arc::new(MemoryCredentialStore::new());
        let backend = LoopbackBackend::new(store.clone(), instant_config());

        let events: Vec<PairingEvent> = {
            let stream = backend.begin_pairing().await.unwrap();
            backend.connect().await.unwrap();
            stream.collect().await
        };

        assert_eq!(events.len(), 2);
        assert!(matches!(&events[0], PairingEvent::Code(code) if code.starts_with("2@")));
        assert_eq!(events[1], PairingEvent::Outcome(PairingStatus::Success));

        let identity = store.load_identity().await.unwrap().unwrap();
        assert_eq!(identity.jid.to_string(), "15550000000:1@s.whatsapp.net");
        assert!(backend.is_connected());
    }

    #[tokio::test]
    async fn test_failed_pairing_drops_connection() {
        let store = Arc::new(MemoryCredentialStore::new());
        let backend = LoopbackBackend::new(
            store.clone(),
            LoopbackConfig {
                pairing_script: Some(vec![
                    PairingEvent::Code("2@a".to_string()),
                    PairingEvent::Outcome(PairingStatus::Timeout),
                ]),
                ..instant_config()
            },
        );

        let stream = backend.begin_pairing().await.unwrap();
        backend.connect().await.unwrap();
        let events: Vec<PairingEvent> = stream.collect().await;

        assert_eq!(
            events.last(),
            Some(&PairingEvent::Outcome(PairingStatus::Timeout))
        );
        assert!(!backend.is_connected());
        assert!(!store.identity_exists().await.unwrap());
    }

    #[tokio::test]
    async fn test_begin_pairing_rejects_existing_identity() {
        let store = Arc::new(MemoryCredentialStore::with_identity(Identity::new(
            Jid::new_device("15550000000", 1),
            1,
        )));
        let backend = LoopbackBackend::new(store, instant_config());

        assert!(matches!(
            backend.begin_pairing().await,
            Err(BridgeError::Pairing(_))
        ));
    }

    #[tokio::test]
    async fn test_send_records_message() {
        let store = Arc::new(MemoryCredentialStore::with_identity(Identity::new(
            Jid::new_device("15550000000", 1),
            1,
        )));
        let backend = LoopbackBackend::new(store, instant_config());
        backend.connect().await.unwrap();

        let receipt = backend
            .send_text(&recipient(), OutboundMessage::text("hello"))
            .await
            .unwrap();

        let sent = backend.sent_messages();
        assert_eq!(sent.len(), 1);
        assert_eq!(sent[0].recipient, recipient());
        assert_eq!(sent[0].message.text, "hello");
        assert_eq!(sent[0].receipt, receipt);
    }

    #[tokio::test]
    async fn test_send_requires_connection() {
        let backend = LoopbackBackend::new(Arc::new(MemoryCredentialStore::new()), instant_config());

        let result = backend
            .send_text(&recipient(), OutboundMessage::text("hello"))
            .await;

        assert!(matches!(result, Err(BridgeError::NotConnected)));
        assert!(backend.sent_messages().is_empty());
    }

    #[tokio::test]
    async fn test_subscribe_and_unsubscribe() {
        let backend = LoopbackBackend::new(Arc::new(MemoryCredentialStore::new()), instant_config());
        let seen = Arc::new(Mutex::new(Vec::new()));

        let sink = Arc::clone(&seen);
        let id = backend.subscribe(Arc::new(move |event| sink.lock().unwrap().push(event)));

        backend.inject_event(BackendEvent::Connected);
        assert!(backend.unsubscribe(id));
        assert!(!backend.unsubscribe(id));
        backend.inject_event(BackendEvent::Disconnected);

        assert_eq!(*seen.lock().unwrap(), vec![BackendEvent::Connected]);
    }

    #[tokio::test]
    async fn test_echo_delivers_inbound_message() {
        let store = Arc::new(MemoryCredentialStore::with_identity(Identity::new(
            Jid::new_device("15550000000", 1),
            1,
        )));
        let backend = LoopbackBackend::new(
            store,
            LoopbackConfig {
                echo: true,
                ..instant_config()
            },
        );
        let (tx, mut rx) = mpsc::unbounded_channel();
        backend.subscribe(Arc::new(move |event| {
            if let BackendEvent::Message(message) = event {
                let _ = tx.send(message);
            }
        }));
        backend.connect().await.unwrap();

        backend
            .send_text(&recipient(), OutboundMessage::text("ping"))
            .await
            .unwrap();

        let echoed = rx.recv().await.unwrap();
        assert_eq!(echoed.info.sender, recipient());
        assert_eq!(echoed.text.as_deref(), Some("ping"));
    }
}
