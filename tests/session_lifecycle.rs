//! End-to-end session lifecycle through the public API: pairing, reconnect
//! after restart, sends over the HTTP trigger and shutdown ordering.

use std::sync::Arc;
use std::time::Duration;
use tempfile::TempDir;
use tokio::io::{AsyncReadExt, AsyncWriteExt};
use tokio::net::TcpStream;
use tokio::sync::oneshot;
use wabridge::messaging::loopback::BackendCall;
use wabridge::messaging::{
    dispatch_text, hold_until_shutdown, BootstrapPath, Bootstrapper, CodeRenderer,
    CredentialStore, DispatchError, EventDispatcher, Identity, Jid, LoopbackBackend,
    LoopbackConfig, SessionClient, SqliteCredentialStore,
};
use wabridge::server;

#[derive(Default)]
struct RecordingRenderer {
    rendered: Vec<String>,
}

impl CodeRenderer for RecordingRenderer {
    fn render(&mut self, code: &str) {
        self.rendered.push(code.to_string());
    }
}

fn fast_pairing() -> LoopbackConfig {
    LoopbackConfig {
        approve_after: Duration::ZERO,
        ..LoopbackConfig::default()
    }
}

async fn start_session(
    store: Arc<SqliteCredentialStore>,
    config: LoopbackConfig,
) -> (LoopbackBackend, Arc<SessionClient<LoopbackBackend>>, BootstrapPath) {
    let identity = store.load_identity().await.unwrap();
    let backend = LoopbackBackend::new(store.clone(), config);
    let client = Arc::new(SessionClient::new(backend.clone(), identity));
    client
        .register_handler(EventDispatcher::new().into_handler())
        .await;

    let path = Bootstrapper::new(store)
        .run(client.as_ref(), &mut RecordingRenderer::default())
        .await
        .unwrap();

    (backend, client, path)
}

async fn http_get(addr: std::net::SocketAddr, target: &str) -> String {
    let mut stream = None;
    for _ in 0..50 {
        match TcpStream::connect(addr).await {
            Ok(s) => {
                stream = Some(s);
                break;
            }
            Err(_) => tokio::time::sleep(Duration::from_millis(20)).await,
        }
    }
    let mut stream = stream.expect("HTTP trigger never came up");

    let request = format!(
        "GET {} HTTP/1.1\r\nHost: localhost\r\nConnection: close\r\n\r\n",
        target
    );
    stream.write_all(request.as_bytes()).await.unwrap();

    let mut response = String::new();
    stream.read_to_string(&mut response).await.unwrap();
    response
}

fn free_local_addr() -> std::net::SocketAddr {
    let listener = std::net::TcpListener::bind("127.0.0.1:0").unwrap();
    listener.local_addr().unwrap()
}

#[tokio::test]
async fn test_first_run_pairs_and_restart_reconnects() {
    let temp_dir = TempDir::new().unwrap();
    let store_path = temp_dir.path().join("store.db");

    // First run: empty store, pairing path
    let store = Arc::new(SqliteCredentialStore::open(&store_path).await.unwrap());
    let (backend, client, path) = start_session(store.clone(), fast_pairing()).await;

    let BootstrapPath::Paired(identity) = path else {
        panic!("expected pairing on first run");
    };
    assert_eq!(backend.pairing_count(), 1);
    client.disconnect().await;
    store.close().await;

    // Restart: same store, no pairing
    let store = Arc::new(SqliteCredentialStore::open(&store_path).await.unwrap());
    let (backend, client, path) = start_session(store.clone(), fast_pairing()).await;

    assert_eq!(path, BootstrapPath::Reconnected(identity));
    assert_eq!(backend.pairing_count(), 0);
    assert_eq!(backend.calls(), vec![BackendCall::Connect]);

    client.disconnect().await;
    store.close().await;
}

#[tokio::test]
async fn test_env_style_trigger_sends_then_holds() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteCredentialStore::open(temp_dir.path().join("store.db"))
            .await
            .unwrap(),
    );
    let (backend, client, _) = start_session(store, fast_pairing()).await;

    let (recipient, _) = dispatch_text(client.as_ref(), "123456789@s.whatsapp.net", "Test message")
        .await
        .unwrap();
    assert!(client.is_connected().await);

    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    stop_tx.send(()).unwrap();
    hold_until_shutdown(client.as_ref(), async {
        let _ = stop_rx.await;
    })
    .await;

    let calls = backend.calls();
    assert_eq!(
        &calls[calls.len() - 2..],
        &[BackendCall::SendText(recipient), BackendCall::Disconnect]
    );
    assert!(!client.is_connected().await);
}

#[tokio::test]
async fn test_invalid_recipient_leaves_session_usable() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteCredentialStore::open(temp_dir.path().join("store.db"))
            .await
            .unwrap(),
    );
    let (backend, client, _) = start_session(store, fast_pairing()).await;

    let result = dispatch_text(client.as_ref(), "bogus", "Test message").await;
    assert!(matches!(result, Err(DispatchError::InvalidRecipient(_))));

    dispatch_text(client.as_ref(), "123456789@s.whatsapp.net", "after")
        .await
        .unwrap();
    assert_eq!(backend.sent_messages().len(), 1);

    client.disconnect().await;
}

#[tokio::test]
async fn test_http_trigger_shares_one_session() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteCredentialStore::open(temp_dir.path().join("store.db"))
            .await
            .unwrap(),
    );
    let (backend, client, _) = start_session(store, fast_pairing()).await;

    let addr = free_local_addr();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(Arc::clone(&client), addr, async {
        let _ = stop_rx.await;
    }));

    let ok = http_get(addr, "/?JID=123456789@s.whatsapp.net&message=hello%20there").await;
    assert!(ok.starts_with("HTTP/1.1 200"), "{}", ok);
    assert!(ok.contains("\"status\":\"sent\""));

    let bad = http_get(addr, "/?JID=not-a-jid&message=hello").await;
    assert!(bad.starts_with("HTTP/1.1 400"), "{}", bad);

    let missing = http_get(addr, "/?message=hello").await;
    assert!(missing.starts_with("HTTP/1.1 400"), "{}", missing);

    let health = http_get(addr, "/health").await;
    assert!(health.starts_with("HTTP/1.1 200"), "{}", health);

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
    client.disconnect().await;

    let sent = backend.sent_messages();
    assert_eq!(sent.len(), 1);
    assert_eq!(sent[0].message.text, "hello there");
    assert_eq!(backend.connect_count(), 1);
    assert_eq!(backend.pairing_count(), 1);
}

#[tokio::test]
async fn test_http_trigger_reports_disconnected_session() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteCredentialStore::open(temp_dir.path().join("store.db"))
            .await
            .unwrap(),
    );
    let (_backend, client, _) = start_session(store, fast_pairing()).await;
    client.disconnect().await;

    let addr = free_local_addr();
    let (stop_tx, stop_rx) = oneshot::channel::<()>();
    let server = tokio::spawn(server::serve(Arc::clone(&client), addr, async {
        let _ = stop_rx.await;
    }));

    let response = http_get(addr, "/?JID=123456789@s.whatsapp.net&message=hi").await;
    assert!(response.starts_with("HTTP/1.1 503"), "{}", response);

    stop_tx.send(()).unwrap();
    server.await.unwrap().unwrap();
}

#[tokio::test]
async fn test_concurrent_sends_share_one_connection() {
    let temp_dir = TempDir::new().unwrap();
    let store = Arc::new(
        SqliteCredentialStore::open(temp_dir.path().join("store.db"))
            .await
            .unwrap(),
    );
    store
        .save_identity(&Identity::new(Jid::new_device("15550000000", 1), 1))
        .await
        .unwrap();
    let latency = Duration::from_millis(300);
    let (backend, client, _) = start_session(
        store,
        LoopbackConfig {
            send_latency: latency,
            ..fast_pairing()
        },
    )
    .await;

    let started = std::time::Instant::now();
    let (first, second) = tokio::join!(
        dispatch_text(client.as_ref(), "123456789@s.whatsapp.net", "first"),
        dispatch_text(client.as_ref(), "987654321@s.whatsapp.net", "second"),
    );
    let elapsed = started.elapsed();

    assert!(first.is_ok());
    assert!(second.is_ok());
    assert_eq!(backend.sent_messages().len(), 2);
    assert_eq!(backend.connect_count(), 1);
    assert_eq!(backend.pairing_count(), 0);
    // both ran under the same read guard rather than one after the other
    assert!(elapsed < latency * 2, "sends were serialized: {:?}", elapsed);

    client.disconnect().await;
}
