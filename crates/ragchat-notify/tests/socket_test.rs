use async_trait::async_trait;
use futures::channel::mpsc as channel;
use futures::{SinkExt, StreamExt};
use parking_lot::Mutex;
use ragchat_notify::{
    ConnectionState, Connector, JobProgress, NotificationSocket, NotifyError, SocketConfig,
    SocketConnection,
};
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::mpsc;
use url::Url;

/// Server side of one accepted mock connection
struct ServerEnd {
    url: Url,
    from_client: channel::UnboundedReceiver<String>,
    to_client: channel::UnboundedSender<anyhow::Result<String>>,
}

impl ServerEnd {
    fn push(&self, frame: &str) {
        self.to_client.unbounded_send(Ok(frame.to_string())).unwrap();
    }
}

struct MockConnector {
    refuse: Mutex<bool>,
    hang: Mutex<bool>,
    attempts: Mutex<Vec<Url>>,
    accepted: mpsc::UnboundedSender<ServerEnd>,
}

impl MockConnector {
    fn new() -> (Arc<Self>, mpsc::UnboundedReceiver<ServerEnd>) {
        let (tx, rx) = mpsc::unbounded_channel();
        let connector = Arc::new(Self {
            refuse: Mutex::new(false),
            hang: Mutex::new(false),
            attempts: Mutex::new(Vec::new()),
            accepted: tx,
        });
        (connector, rx)
    }

    fn refuse_connections(&self, refuse: bool) {
        *self.refuse.lock() = refuse;
    }

    /// Handshakes never complete, like a blackholed host
    fn hang_connections(&self, hang: bool) {
        *self.hang.lock() = hang;
    }

    fn attempt_count(&self) -> usize {
        self.attempts.lock().len()
    }
}

#[async_trait]
impl Connector for MockConnector {
    async fn connect(&self, url: &Url) -> anyhow::Result<SocketConnection> {
        self.attempts.lock().push(url.clone());
        let hang = *self.hang.lock();
        if hang {
            std::future::pending::<()>().await;
        }
        if *self.refuse.lock() {
            anyhow::bail!("connection refused");
        }

        let (client_tx, server_rx) = channel::unbounded::<String>();
        let (server_tx, client_rx) = channel::unbounded::<anyhow::Result<String>>();

        let _ = self.accepted.send(ServerEnd {
            url: url.clone(),
            from_client: server_rx,
            to_client: server_tx,
        });

        Ok(SocketConnection::new(
            Box::pin(client_tx.sink_map_err(anyhow::Error::from)),
            Box::pin(client_rx),
        ))
    }
}

fn socket(connector: &Arc<MockConnector>) -> NotificationSocket {
    socket_with(connector, SocketConfig::default())
}

fn socket_with(connector: &Arc<MockConnector>, config: SocketConfig) -> NotificationSocket {
    NotificationSocket::with_connector("http://localhost:8000", config, connector.clone()).unwrap()
}

async fn wait_open(socket: &NotificationSocket) {
    socket.subscribe().wait_for(|s| s.is_open()).await.unwrap();
}

#[tokio::test(start_paused = true)]
async fn test_connects_to_client_path_and_sends_keepalive() {
    let (connector, mut accepted) = MockConnector::new();
    let socket = socket(&connector);

    socket.connect().unwrap();
    let mut server = accepted.recv().await.unwrap();
    wait_open(&socket).await;

    assert_eq!(server.url.scheme(), "ws");
    assert_eq!(server.url.path(), format!("/ws/{}", socket.client_id()));
    assert_eq!(socket.status().reconnect_attempts, 0);

    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(server.from_client.next().await.unwrap(), "ping");
}

#[tokio::test(start_paused = true)]
async fn test_dispatch_skips_ack_unknown_and_malformed_frames() {
    let (connector, mut accepted) = MockConnector::new();
    let socket = socket(&connector);

    let (progress_tx, mut progress_rx) = mpsc::unbounded_channel::<JobProgress>();
    socket
        .on_progress(move |p| {
            let _ = progress_tx.send(p.clone());
        })
        .unwrap();

    let (pong_tx, mut pong_rx) = mpsc::unbounded_channel::<()>();
    socket
        .on("pong", move |_| {
            let _ = pong_tx.send(());
        })
        .unwrap();

    socket.connect().unwrap();
    let server = accepted.recv().await.unwrap();

    server.push(r#"{"type":"pong"}"#);
    server.push("not json at all");
    server.push(r#"{"type":"mystery","kb_id":3}"#);
    server.push(r#"{"type":"progress","kb_id":3,"stage":"embedding","progress":40,"message":"Embedding chunks"}"#);

    let progress = progress_rx.recv().await.unwrap();
    assert_eq!(progress.kb_id, Some(3));
    assert_eq!(progress.stage, "embedding");
    assert_eq!(progress.progress, 40.0);

    // The ack frame arrived first and was consumed before reaching any handler
    assert!(pong_rx.try_recv().is_err());
    assert!(socket.is_connected());
}

#[tokio::test(start_paused = true)]
async fn test_replacing_handler() {
    let (connector, mut accepted) = MockConnector::new();
    let socket = socket(&connector);

    let (tx, mut rx) = mpsc::unbounded_channel::<&'static str>();
    let first = tx.clone();
    socket
        .on("complete", move |_| {
            let _ = first.send("first");
        })
        .unwrap();
    socket
        .on("complete", move |_| {
            let _ = tx.send("second");
        })
        .unwrap();

    socket.connect().unwrap();
    let server = accepted.recv().await.unwrap();
    server.push(r#"{"type":"complete","kb_id":1,"message":"done"}"#);

    assert_eq!(rx.recv().await.unwrap(), "second");
    assert!(rx.try_recv().is_err());
}

#[tokio::test(start_paused = true)]
async fn test_send_requires_open_socket() {
    let (connector, mut accepted) = MockConnector::new();
    let socket = socket(&connector);

    let command = serde_json::json!({"action": "subscribe", "kb_id": 9});
    assert!(matches!(socket.send(&command), Err(NotifyError::NotConnected)));

    socket.connect().unwrap();
    let mut server = accepted.recv().await.unwrap();
    wait_open(&socket).await;

    socket.send(&command).unwrap();
    let received = server.from_client.next().await.unwrap();
    let value: serde_json::Value = serde_json::from_str(&received).unwrap();
    assert_eq!(value, command);
}

#[tokio::test(start_paused = true)]
async fn test_reconnects_with_same_client_id_after_server_drop() {
    let (connector, mut accepted) = MockConnector::new();
    let socket = socket(&connector);
    let mut status = socket.subscribe();

    socket.connect().unwrap();
    let first = accepted.recv().await.unwrap();
    wait_open(&socket).await;

    let first_url = first.url.clone();
    drop(first);

    let after_drop = status
        .wait_for(|s| s.state == ConnectionState::Disconnected)
        .await
        .unwrap()
        .clone();
    assert_eq!(after_drop.reconnect_attempts, 1);

    let second = accepted.recv().await.unwrap();
    wait_open(&socket).await;

    assert_eq!(second.url, first_url);
    assert_eq!(socket.status().reconnect_attempts, 0);
    assert_eq!(connector.attempt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_gives_up_after_attempt_bound_and_connect_restarts() {
    let (connector, mut accepted) = MockConnector::new();
    connector.refuse_connections(true);
    let socket = socket(&connector);
    let mut status = socket.subscribe();

    socket.connect().unwrap();
    let final_status = status.wait_for(|s| s.gave_up).await.unwrap().clone();

    assert_eq!(final_status.state, ConnectionState::Disconnected);
    assert_eq!(final_status.reconnect_attempts, 5);
    // The first attempt plus five retries
    assert_eq!(connector.attempt_count(), 6);

    tokio::time::sleep(Duration::from_secs(60)).await;
    assert_eq!(connector.attempt_count(), 6);

    connector.refuse_connections(false);
    socket.connect().unwrap();
    let _server = accepted.recv().await.unwrap();
    wait_open(&socket).await;

    let status = socket.status();
    assert!(!status.gave_up);
    assert_eq!(status.reconnect_attempts, 0);
}

#[tokio::test(start_paused = true)]
async fn test_no_reconnect_after_close() {
    let (connector, mut accepted) = MockConnector::new();
    let socket = socket(&connector);
    let mut status = socket.subscribe();

    socket.connect().unwrap();
    let mut server = accepted.recv().await.unwrap();
    wait_open(&socket).await;

    socket.close().unwrap();
    status
        .wait_for(|s| s.state == ConnectionState::Disconnected)
        .await
        .unwrap();

    // The client side of the connection was closed
    assert!(server.from_client.next().await.is_none());

    tokio::time::sleep(Duration::from_secs(10)).await;
    assert_eq!(connector.attempt_count(), 1);
    assert_eq!(socket.status().state, ConnectionState::Disconnected);
    assert!(!socket.status().reconnect_enabled);
    assert!(matches!(socket.send("hello"), Err(NotifyError::NotConnected)));
}

#[tokio::test(start_paused = true)]
async fn test_close_abandons_pending_handshake() {
    let (connector, _accepted) = MockConnector::new();
    connector.hang_connections(true);
    let socket = socket(&connector);
    let mut status = socket.subscribe();

    socket.connect().unwrap();
    status
        .wait_for(|s| s.state == ConnectionState::Connecting)
        .await
        .unwrap();
    assert!(!socket.is_connected());

    socket.close().unwrap();
    let closed = status
        .wait_for(|s| s.state == ConnectionState::Disconnected)
        .await
        .unwrap()
        .clone();
    assert!(!closed.reconnect_enabled);

    tokio::time::sleep(Duration::from_secs(600)).await;
    assert_eq!(connector.attempt_count(), 1);
    assert_eq!(socket.status().state, ConnectionState::Disconnected);
}

#[tokio::test(start_paused = true)]
async fn test_handshake_timeout_counts_as_failed_attempt() {
    let (connector, _accepted) = MockConnector::new();
    connector.hang_connections(true);
    let config = SocketConfig::default()
        .with_connect_timeout(Duration::from_secs(2))
        .with_max_reconnect_attempts(1);
    let socket = socket_with(&connector, config);
    let mut status = socket.subscribe();

    socket.connect().unwrap();
    let final_status = status.wait_for(|s| s.gave_up).await.unwrap().clone();

    assert_eq!(final_status.state, ConnectionState::Disconnected);
    assert_eq!(final_status.reconnect_attempts, 1);
    assert_eq!(connector.attempt_count(), 2);
}

#[tokio::test(start_paused = true)]
async fn test_unanswered_keepalive_drops_connection() {
    let (connector, mut accepted) = MockConnector::new();
    let socket = socket(&connector);
    let mut status = socket.subscribe();

    socket.connect().unwrap();
    let mut first = accepted.recv().await.unwrap();
    wait_open(&socket).await;

    // Answered keepalive keeps the connection
    tokio::time::sleep(Duration::from_secs(31)).await;
    assert_eq!(first.from_client.next().await.unwrap(), "ping");
    first.push(r#"{"type":"pong"}"#);

    tokio::time::sleep(Duration::from_secs(30)).await;
    assert_eq!(first.from_client.next().await.unwrap(), "ping");
    assert!(socket.is_connected());
    assert_eq!(connector.attempt_count(), 1);

    // No answer to the second one: the next heartbeat gives up on this connection
    let dropped = status
        .wait_for(|s| s.state == ConnectionState::Disconnected)
        .await
        .unwrap()
        .clone();
    assert_eq!(dropped.reconnect_attempts, 1);

    let _second = accepted.recv().await.unwrap();
    wait_open(&socket).await;
    assert_eq!(connector.attempt_count(), 2);
    drop(first);
}
