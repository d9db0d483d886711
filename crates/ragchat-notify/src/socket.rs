use futures::future::BoxFuture;
use futures::{SinkExt, StreamExt};
use ragchat_types::{JobComplete, JobFailure, JobProgress, Notification};
use serde::{Deserialize, Serialize};
use std::collections::VecDeque;
use std::sync::Arc;
use tokio::sync::{mpsc, watch};
use tokio::time::{Instant, Interval, MissedTickBehavior};
use url::Url;

use crate::client_id::ClientId;
use crate::config::SocketConfig;
use crate::endpoint::socket_url;
use crate::error::{NotifyError, Result};
use crate::handlers::{Dispatch, HandlerRegistry, NotificationHandler};
use crate::state::{ConnectionState, SocketAction, SocketInput, SocketMachine};
use crate::transport::{Connector, SocketConnection, TungsteniteConnector};

/// Snapshot of the socket lifecycle, published on every transition
#[derive(Debug, Clone, PartialEq, Eq, Serialize, Deserialize)]
pub struct SocketStatus {
    pub state: ConnectionState,
    pub reconnect_attempts: u32,
    /// Attempt bound exhausted; the channel stays offline until `connect()` is called again
    pub gave_up: bool,
    pub reconnect_enabled: bool,
}

impl SocketStatus {
    fn of(machine: &SocketMachine) -> Self {
        Self {
            state: machine.state(),
            reconnect_attempts: machine.reconnect_attempts(),
            gave_up: machine.gave_up(),
            reconnect_enabled: machine.reconnect_enabled(),
        }
    }

    pub fn is_open(&self) -> bool {
        self.state == ConnectionState::Open
    }
}

type PendingHandshake = BoxFuture<'static, anyhow::Result<SocketConnection>>;

enum Command {
    Connect,
    Close,
    Send(String),
    Register(String, NotificationHandler),
}

/// Long-lived notification channel for one client
///
/// The connection, the heartbeat and the reconnect timer live in a background task; this handle
/// only sends it commands. Dropping the handle closes the socket.
///
/// ```no_run
/// # async fn run() -> ragchat_notify::Result<()> {
/// use ragchat_notify::{NotificationSocket, SocketConfig};
///
/// let socket = NotificationSocket::new("http://localhost:8000", SocketConfig::default())?;
/// socket.on_progress(|p| println!("{}: {:.0}%", p.stage, p.progress))?;
/// socket.connect()?;
/// # Ok(())
/// # }
/// ```
pub struct NotificationSocket {
    client_id: ClientId,
    url: Url,
    commands: mpsc::UnboundedSender<Command>,
    status: watch::Receiver<SocketStatus>,
}

impl NotificationSocket {
    /// Socket for the backend at `origin` using the tungstenite transport
    ///
    /// Must be called from within a tokio runtime.
    pub fn new(origin: &str, config: SocketConfig) -> Result<Self> {
        Self::with_connector(origin, config, Arc::new(TungsteniteConnector::new()))
    }

    pub fn with_connector(
        origin: &str,
        config: SocketConfig,
        connector: Arc<dyn Connector>,
    ) -> Result<Self> {
        let client_id = ClientId::generate();
        let url = socket_url(origin, &client_id)?;

        let machine = SocketMachine::new(&config);
        let (status_tx, status_rx) = watch::channel(SocketStatus::of(&machine));
        let (command_tx, command_rx) = mpsc::unbounded_channel();

        let actor = SocketActor {
            url: url.clone(),
            client_id: client_id.clone(),
            config,
            connector,
            machine,
            handlers: HandlerRegistry::new(),
            handshake: None,
            connection: None,
            heartbeat: None,
            awaiting_ack: false,
            retry_at: None,
            status: status_tx,
        };
        tokio::spawn(actor.run(command_rx));

        tracing::debug!(client_id = %client_id, url = %url, "Notification socket created");

        Ok(Self {
            client_id,
            url,
            commands: command_tx,
            status: status_rx,
        })
    }

    pub fn client_id(&self) -> &ClientId {
        &self.client_id
    }

    pub fn url(&self) -> &Url {
        &self.url
    }

    /// Open the connection, or start over after the socket gave up
    pub fn connect(&self) -> Result<()> {
        self.command(Command::Connect)
    }

    /// Close for good: the socket will not reconnect on its own afterwards
    pub fn close(&self) -> Result<()> {
        self.command(Command::Close)
    }

    /// Serialize `data` and send it while the socket is open
    ///
    /// Nothing is queued: when the socket is not open this fails with
    /// [`NotifyError::NotConnected`].
    pub fn send<T>(&self, data: &T) -> Result<()>
    where
        T: Serialize + ?Sized,
    {
        if !self.is_connected() {
            tracing::warn!(client_id = %self.client_id, "Socket not connected, message dropped");
            return Err(NotifyError::NotConnected);
        }

        let text = serde_json::to_string(data)?;
        self.command(Command::Send(text))
    }

    /// Register the handler for one notification type, replacing any earlier one
    pub fn on<F>(&self, kind: impl Into<String>, handler: F) -> Result<()>
    where
        F: FnMut(&Notification) + Send + 'static,
    {
        self.command(Command::Register(kind.into(), Box::new(handler)))
    }

    pub fn on_progress<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(&JobProgress) + Send + 'static,
    {
        self.on("progress", move |n| {
            if let Notification::Progress(progress) = n {
                handler(progress)
            }
        })
    }

    pub fn on_complete<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(&JobComplete) + Send + 'static,
    {
        self.on("complete", move |n| {
            if let Notification::Complete(complete) = n {
                handler(complete)
            }
        })
    }

    pub fn on_job_error<F>(&self, mut handler: F) -> Result<()>
    where
        F: FnMut(&JobFailure) + Send + 'static,
    {
        self.on("error", move |n| {
            if let Notification::Error(failure) = n {
                handler(failure)
            }
        })
    }

    pub fn status(&self) -> SocketStatus {
        self.status.borrow().clone()
    }

    /// Watch status changes, e.g. to show an "offline" indicator
    pub fn subscribe(&self) -> watch::Receiver<SocketStatus> {
        self.status.clone()
    }

    pub fn is_connected(&self) -> bool {
        self.status.borrow().is_open()
    }

    fn command(&self, command: Command) -> Result<()> {
        self.commands.send(command).map_err(|_| NotifyError::Shutdown)
    }
}

impl std::fmt::Debug for NotificationSocket {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("NotificationSocket")
            .field("client_id", &self.client_id)
            .field("url", &self.url.as_str())
            .field("status", &*self.status.borrow())
            .finish()
    }
}

struct SocketActor {
    url: Url,
    client_id: ClientId,
    config: SocketConfig,
    connector: Arc<dyn Connector>,
    machine: SocketMachine,
    handlers: HandlerRegistry,
    /// In-flight transport handshake, raced against commands so `close()` can abandon it
    handshake: Option<PendingHandshake>,
    connection: Option<SocketConnection>,
    heartbeat: Option<Interval>,
    /// A keepalive went out and no frame has arrived since
    awaiting_ack: bool,
    retry_at: Option<Instant>,
    status: watch::Sender<SocketStatus>,
}

impl SocketActor {
    async fn run(mut self, mut commands: mpsc::UnboundedReceiver<Command>) {
        loop {
            tokio::select! {
                command = commands.recv() => match command {
                    Some(command) => self.handle_command(command).await,
                    None => break,
                },
                result = handshake_outcome(&mut self.handshake) => {
                    self.handshake = None;
                    self.handle_handshake(result).await;
                }
                frame = next_frame(&mut self.connection) => self.handle_frame(frame).await,
                _ = heartbeat_tick(&mut self.heartbeat) => self.send_keepalive().await,
                _ = retry_elapsed(self.retry_at) => {
                    self.retry_at = None;
                    self.apply(SocketInput::RetryElapsed).await;
                }
            }
        }

        // Every handle is gone
        self.apply(SocketInput::CloseRequested).await;
        tracing::debug!(client_id = %self.client_id, "Notification socket task stopped");
    }

    async fn handle_command(&mut self, command: Command) {
        match command {
            Command::Connect => self.apply(SocketInput::Connect).await,
            Command::Close => {
                tracing::info!(client_id = %self.client_id, "Closing notification socket");
                self.apply(SocketInput::CloseRequested).await
            }
            Command::Send(text) => self.transmit(text).await,
            Command::Register(kind, handler) => {
                self.handlers.register(kind, handler);
            }
        }
    }

    async fn handle_handshake(&mut self, result: anyhow::Result<SocketConnection>) {
        match result {
            Ok(connection) if self.machine.state() == ConnectionState::Connecting => {
                tracing::info!(client_id = %self.client_id, "Notification socket connected");
                self.connection = Some(connection);
                self.apply(SocketInput::Opened).await;
            }
            Ok(_) => {
                tracing::debug!(state = ?self.machine.state(), "Dropping connection opened after the socket moved on");
            }
            Err(e) => {
                tracing::warn!(url = %self.url, "Socket connection failed: {:#}", e);
                self.apply(SocketInput::Closed).await;
            }
        }
    }

    async fn handle_frame(&mut self, frame: Option<anyhow::Result<String>>) {
        match frame {
            Some(Ok(text)) => {
                self.awaiting_ack = false;
                self.dispatch(&text);
            }
            Some(Err(e)) => {
                tracing::warn!(client_id = %self.client_id, "Socket transport error: {:#}", e);
                self.connection = None;
                self.apply(SocketInput::Closed).await;
            }
            None => {
                tracing::info!(client_id = %self.client_id, "Socket closed by server");
                self.connection = None;
                self.apply(SocketInput::Closed).await;
            }
        }
    }

    fn dispatch(&mut self, text: &str) {
        let notification = match Notification::from_json(text) {
            Ok(notification) => notification,
            Err(e) => {
                tracing::warn!(error = %e, frame = %text, "Discarding undecodable notification");
                return;
            }
        };

        if notification.kind() == self.config.ack_kind {
            tracing::trace!("Keepalive acknowledged");
            return;
        }

        tracing::debug!(kind = notification.kind(), kb_id = ?notification.kb_id(), "Notification received");

        if self.handlers.dispatch(&notification) == Dispatch::Unhandled {
            tracing::warn!(kind = notification.kind(), "No handler registered for notification type");
        }
    }

    /// Send the keepalive, or drop the connection if the previous one went unanswered
    async fn send_keepalive(&mut self) {
        if self.awaiting_ack {
            tracing::warn!(
                client_id = %self.client_id,
                "No frame received within {:?} of the last keepalive, connection presumed dead",
                self.config.heartbeat_interval
            );
            self.awaiting_ack = false;
            self.connection = None;
            self.apply(SocketInput::Closed).await;
            return;
        }

        tracing::trace!("Sending keepalive");
        let token = self.config.keepalive_token.clone();
        self.transmit(token).await;
        self.awaiting_ack = self.connection.is_some();
    }

    async fn transmit(&mut self, text: String) {
        let connection = match (self.machine.state(), self.connection.as_mut()) {
            (ConnectionState::Open, Some(connection)) => connection,
            _ => {
                tracing::warn!(client_id = %self.client_id, "Socket not connected, message dropped");
                return;
            }
        };

        let sent = connection.sink.send(text).await;
        if let Err(e) = sent {
            tracing::warn!(client_id = %self.client_id, "Socket send failed: {:#}", e);
            self.connection = None;
            self.apply(SocketInput::Closed).await;
        }
    }

    /// Feed one input through the machine and run the resulting actions
    ///
    /// Status is published after every transition. Closing the transport produces the follow-up
    /// `Closed` input, which is processed before returning; a handshake completes later in `run`.
    async fn apply(&mut self, input: SocketInput) {
        let mut inputs = VecDeque::from([input]);

        while let Some(input) = inputs.pop_front() {
            let actions = self.machine.handle(input);
            self.status.send_replace(SocketStatus::of(&self.machine));

            for action in actions {
                if let Some(next) = self.perform(action).await {
                    inputs.push_back(next);
                }
            }
        }
    }

    async fn perform(&mut self, action: SocketAction) -> Option<SocketInput> {
        match action {
            SocketAction::OpenTransport => {
                tracing::info!(url = %self.url, "Connecting notification socket");
                let connector = self.connector.clone();
                let url = self.url.clone();
                let timeout = self.config.connect_timeout;

                self.handshake = Some(Box::pin(async move {
                    match tokio::time::timeout(timeout, connector.connect(&url)).await {
                        Ok(result) => result,
                        Err(_) => Err(anyhow::anyhow!("handshake timed out after {:?}", timeout)),
                    }
                }));
                None
            }
            SocketAction::CloseTransport => {
                if self.handshake.take().is_some() {
                    tracing::debug!(client_id = %self.client_id, "Pending handshake abandoned");
                }
                if let Some(mut connection) = self.connection.take() {
                    if let Err(e) = connection.sink.close().await {
                        tracing::debug!("Error while closing socket: {:#}", e);
                    }
                }
                Some(SocketInput::Closed)
            }
            SocketAction::StartHeartbeat => {
                self.awaiting_ack = false;
                let period = self.config.heartbeat_interval;
                let mut interval = tokio::time::interval_at(Instant::now() + period, period);
                interval.set_missed_tick_behavior(MissedTickBehavior::Delay);
                self.heartbeat = Some(interval);
                None
            }
            SocketAction::StopHeartbeat => {
                self.heartbeat = None;
                self.awaiting_ack = false;
                None
            }
            SocketAction::ScheduleReconnect { delay, attempt } => {
                tracing::info!(
                    attempt,
                    max_attempts = self.config.max_reconnect_attempts,
                    "Reconnecting notification socket in {:?}",
                    delay
                );
                self.retry_at = Some(Instant::now() + delay);
                None
            }
            SocketAction::CancelReconnect => {
                self.retry_at = None;
                None
            }
            SocketAction::GiveUp { attempts } => {
                tracing::error!(
                    client_id = %self.client_id,
                    attempts,
                    "Notification socket gave up reconnecting"
                );
                None
            }
        }
    }
}

async fn handshake_outcome(
    handshake: &mut Option<PendingHandshake>,
) -> anyhow::Result<SocketConnection> {
    match handshake {
        Some(handshake) => handshake.await,
        None => std::future::pending().await,
    }
}

async fn next_frame(connection: &mut Option<SocketConnection>) -> Option<anyhow::Result<String>> {
    match connection {
        Some(connection) => connection.stream.next().await,
        None => std::future::pending().await,
    }
}

async fn heartbeat_tick(heartbeat: &mut Option<Interval>) {
    match heartbeat {
        Some(interval) => {
            interval.tick().await;
        }
        None => std::future::pending().await,
    }
}

async fn retry_elapsed(at: Option<Instant>) {
    match at {
        Some(at) => tokio::time::sleep_until(at).await,
        None => std::future::pending().await,
    }
}
