//! WebSocket client for the presence gateway.

use std::sync::Arc;
use std::time::Duration;

use futures_util::{SinkExt, StreamExt};
use tokio::sync::mpsc;
use tokio::task::JoinHandle;
use tokio::time::timeout;

use lanyard_common::{ClientFrame, ServerFrame};

use crate::config::GatewayConfig;
use crate::error::{Error, Result};
use crate::store::{Connectivity, PresenceStore, PresenceView, StoreUpdate, Subscription};
use crate::transport::{Connection, FrameSink, Transport};

use super::backoff::{reconnect_delay, ReconnectState};
use super::timer::{self, Timer};

/// Lifecycle of the gateway connection.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub(crate) enum ConnectionState {
    Connecting,
    Open,
    ClosedManually,
    ClosedUnexpectedly,
}

/// Gateway WebSocket client.
///
/// Keeps a [`PresenceStore`] current for one subscribed user. All connection
/// state lives in a single background task; this handle only queues
/// `connect`/`disconnect` requests, so calls never block. Must be created
/// inside a Tokio runtime.
///
/// Dropping the handle disconnects and stops the background task.
pub struct GatewayClient {
    commands: mpsc::UnboundedSender<Command>,
    store: Arc<PresenceStore>,
    task: JoinHandle<()>,
}

impl GatewayClient {
    pub fn new<T: Transport>(config: GatewayConfig, transport: T) -> Self {
        let store = Arc::new(PresenceStore::new());
        let (commands_tx, commands_rx) = mpsc::unbounded_channel();
        let (events_tx, events_rx) = mpsc::unbounded_channel();

        let driver = Driver::new(config, Arc::new(transport), store.clone(), events_tx);
        let task = tokio::spawn(driver.run(commands_rx, events_rx));

        Self {
            commands: commands_tx,
            store,
            task,
        }
    }

    /// Open a connection and keep it alive until [`disconnect`](Self::disconnect).
    ///
    /// Ignored while a connection is already active.
    pub fn connect(&self) {
        if self.commands.send(Command::Connect).is_err() {
            tracing::error!("Gateway event loop is gone, cannot connect");
        }
    }

    /// Close the connection and cancel pending heartbeats and reconnects.
    pub fn disconnect(&self) {
        if self.commands.send(Command::Disconnect).is_err() {
            tracing::debug!("Gateway event loop already stopped");
        }
    }

    /// Latest presence and connectivity.
    pub fn read(&self) -> PresenceView {
        self.store.read()
    }

    /// Register a listener invoked on every presence or connectivity change.
    pub fn subscribe<F>(&self, listener: F) -> Subscription
    where
        F: Fn(&PresenceView) + Send + Sync + 'static,
    {
        self.store.subscribe(listener)
    }

    pub fn store(&self) -> Arc<PresenceStore> {
        self.store.clone()
    }

    /// Disconnect and wait for the background task to finish.
    pub async fn shutdown(self) {
        let Self { commands, task, .. } = self;
        drop(commands);
        if let Err(e) = task.await {
            tracing::error!("Gateway event loop failed: {}", e);
        }
    }
}

enum Command {
    Connect,
    Disconnect,
}

enum Event {
    Opened { generation: u64, sink: FrameSink },
    Frame { generation: u64, text: String },
    SocketError { generation: u64, error: Error },
    Closed { generation: u64 },
    HeartbeatDue { timer: u64 },
    ReconnectDue { timer: u64 },
}

/// The socket owned by the event loop. `sink` is set once the connection opens.
struct Socket {
    generation: u64,
    sink: Option<FrameSink>,
    task: JoinHandle<()>,
}

impl Drop for Socket {
    fn drop(&mut self) {
        self.task.abort();
    }
}

struct Driver {
    config: GatewayConfig,
    transport: Arc<dyn Transport>,
    store: Arc<PresenceStore>,
    events: mpsc::UnboundedSender<Event>,
    state: ConnectionState,
    generation: u64,
    manual_close: bool,
    socket: Option<Socket>,
    heartbeat: Option<Timer>,
    reconnect: ReconnectState,
    next_timer_id: u64,
}

impl Driver {
    fn new(
        config: GatewayConfig,
        transport: Arc<dyn Transport>,
        store: Arc<PresenceStore>,
        events: mpsc::UnboundedSender<Event>,
    ) -> Self {
        Self {
            config,
            transport,
            store,
            events,
            state: ConnectionState::ClosedManually,
            generation: 0,
            manual_close: true,
            socket: None,
            heartbeat: None,
            reconnect: ReconnectState::default(),
            next_timer_id: 0,
        }
    }

    /// Handle commands and events one at a time until the handle is dropped.
    async fn run(
        mut self,
        mut commands: mpsc::UnboundedReceiver<Command>,
        mut events: mpsc::UnboundedReceiver<Event>,
    ) {
        loop {
            tokio::select! {
                biased;

                command = commands.recv() => match command {
                    Some(Command::Connect) => self.connect(),
                    Some(Command::Disconnect) => self.disconnect().await,
                    None => {
                        self.disconnect().await;
                        break;
                    }
                },

                Some(event) = events.recv() => self.handle_event(event).await,
            }
        }
        tracing::debug!("Gateway event loop stopped");
    }

    async fn handle_event(&mut self, event: Event) {
        match event {
            Event::Opened { generation, sink } => self.on_open(generation, sink),
            Event::Frame { generation, text } => {
                if self.is_current(generation) {
                    self.on_frame(&text).await;
                }
            }
            Event::SocketError { generation, error } => {
                // The close that follows decides what happens next.
                if self.is_current(generation) {
                    tracing::warn!("Gateway socket error: {}", error);
                }
            }
            Event::Closed { generation } => self.on_close(generation),
            Event::HeartbeatDue { timer } => self.on_heartbeat(timer).await,
            Event::ReconnectDue { timer } => self.on_reconnect_due(timer),
        }
    }

    fn connect(&mut self) {
        if self.socket.is_some() {
            tracing::warn!("Already connected to gateway, ignoring connect");
            return;
        }

        self.manual_close = false;
        self.reconnect.pending = None;
        self.generation += 1;
        self.state = ConnectionState::Connecting;
        self.store.write(StoreUpdate::Connectivity(Connectivity::Connecting));

        tracing::info!("Connecting to gateway at {}", self.config.ws_url);
        let task = tokio::spawn(run_socket(
            self.transport.clone(),
            self.config.ws_url.clone(),
            self.generation,
            self.events.clone(),
        ));
        self.socket = Some(Socket {
            generation: self.generation,
            sink: None,
            task,
        });
    }

    async fn disconnect(&mut self) {
        self.manual_close = true;
        self.reconnect.reset();
        self.heartbeat = None;

        if let Some(mut socket) = self.socket.take() {
            if let Some(mut sink) = socket.sink.take() {
                match timeout(self.config.close_timeout(), sink.close()).await {
                    Ok(Ok(())) => {}
                    Ok(Err(e)) => tracing::debug!("Error closing gateway socket: {}", e),
                    Err(_) => tracing::debug!("Timed out closing gateway socket"),
                }
            }
            tracing::info!("Disconnected from gateway");
        }

        self.state = ConnectionState::ClosedManually;
        self.store.write(StoreUpdate::Connectivity(Connectivity::Closed));
    }

    fn on_open(&mut self, generation: u64, sink: FrameSink) {
        match self.socket.as_mut() {
            Some(socket) if socket.generation == generation => {
                socket.sink = Some(sink);
                self.state = ConnectionState::Open;
                self.reconnect.attempts = 0;
                tracing::info!("Connected to gateway, waiting for hello");
            }
            _ => tracing::debug!("Dropping stale gateway connection {}", generation),
        }
    }

    async fn on_frame(&mut self, text: &str) {
        let frame = match ServerFrame::decode(text) {
            Ok(frame) => frame,
            Err(e) => {
                tracing::warn!("Ignoring malformed gateway frame: {}", e);
                return;
            }
        };

        match frame {
            ServerFrame::Hello(hello) => {
                let period = Duration::from_millis(hello.heartbeat_interval.get());
                self.start_heartbeat(period);
                tracing::info!(
                    "Gateway hello, heartbeat every {}ms, subscribing to {}",
                    period.as_millis(),
                    self.config.subject_id
                );
                self.send(ClientFrame::initialize(self.config.subject_id.clone()))
                    .await;
            }
            ServerFrame::Presence { kind, snapshot } => {
                tracing::debug!("Received {} ({})", kind, snapshot.discord_status);
                self.store.write(StoreUpdate::Snapshot(*snapshot));
            }
            ServerFrame::Ignored { op, t } => {
                tracing::debug!("Ignoring gateway frame op={} t={:?}", op, t);
            }
        }
    }

    fn on_close(&mut self, generation: u64) {
        // disconnect() drops the socket before its close arrives, so only
        // unexpected closes get past this check.
        if !self.is_current(generation) {
            tracing::debug!("Ignoring close of stale gateway connection {}", generation);
            return;
        }

        self.socket = None;
        self.heartbeat = None;

        self.state = ConnectionState::ClosedUnexpectedly;
        self.reconnect.attempts = self.reconnect.attempts.saturating_add(1);
        let delay = reconnect_delay(
            self.reconnect.attempts,
            self.config.reconnect_base_delay(),
            self.config.reconnect_max_delay(),
        );
        tracing::warn!(
            "Gateway connection lost, reconnecting in {}ms (attempt {})",
            delay.as_millis(),
            self.reconnect.attempts
        );
        self.store.write(StoreUpdate::Connectivity(Connectivity::Connecting));

        let id = self.next_timer_id();
        self.reconnect.pending = Some(Timer::once(
            id,
            delay,
            self.events.clone(),
            Event::ReconnectDue { timer: id },
        ));
    }

    async fn on_heartbeat(&mut self, timer: u64) {
        if !timer::is_current(&self.heartbeat, timer) {
            tracing::debug!("Ignoring stale heartbeat timer {}", timer);
            return;
        }
        tracing::debug!("Sending heartbeat");
        self.send(ClientFrame::Heartbeat).await;
    }

    fn on_reconnect_due(&mut self, timer: u64) {
        if self.manual_close || !timer::is_current(&self.reconnect.pending, timer) {
            tracing::debug!("Ignoring stale reconnect timer {}", timer);
            return;
        }
        self.reconnect.pending = None;
        self.connect();
    }

    /// Replace any running heartbeat with one ticking every `period`.
    fn start_heartbeat(&mut self, period: Duration) {
        self.heartbeat = None;
        let id = self.next_timer_id();
        self.heartbeat = Some(Timer::repeating(id, period, self.events.clone(), move || {
            Event::HeartbeatDue { timer: id }
        }));
    }

    async fn send(&mut self, frame: ClientFrame) {
        let op = frame.op();
        if let Err(e) = self.try_send(frame).await {
            tracing::warn!("Failed to send op {} to gateway: {}", op, e);
        }
    }

    /// Send a frame if the socket is open; otherwise drop it.
    async fn try_send(&mut self, frame: ClientFrame) -> Result<()> {
        let sink = match self.socket.as_mut().and_then(|s| s.sink.as_mut()) {
            Some(sink) if self.state == ConnectionState::Open => sink,
            _ => {
                tracing::debug!("Socket not open, dropping op {}", frame.op());
                return Ok(());
            }
        };

        let text = frame.encode()?;
        sink.send(text).await
    }

    fn is_current(&self, generation: u64) -> bool {
        self.socket
            .as_ref()
            .is_some_and(|socket| socket.generation == generation)
    }

    fn next_timer_id(&mut self) -> u64 {
        self.next_timer_id += 1;
        self.next_timer_id
    }
}

/// Open one connection and forward everything it does to the event loop.
///
/// Always ends with `Closed`, including when the connect itself fails.
async fn run_socket(
    transport: Arc<dyn Transport>,
    url: String,
    generation: u64,
    events: mpsc::UnboundedSender<Event>,
) {
    match transport.connect(&url).await {
        Ok(Connection { sink, mut stream }) => {
            if events.send(Event::Opened { generation, sink }).is_err() {
                return;
            }
            while let Some(frame) = stream.next().await {
                let event = match frame {
                    Ok(text) => Event::Frame { generation, text },
                    Err(error) => Event::SocketError { generation, error },
                };
                if events.send(event).is_err() {
                    return;
                }
            }
        }
        Err(error) => {
            let _ = events.send(Event::SocketError { generation, error });
        }
    }
    let _ = events.send(Event::Closed { generation });
}
