//! In-memory transport for exercising the gateway client without a network.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::Arc;

use async_trait::async_trait;
use futures_util::{sink, stream};
use tokio::sync::mpsc;
use tokio::time::Instant;

use crate::error::{Error, Result};
use crate::transport::{Connection, Transport};

/// Transport whose connections are driven by the test.
///
/// Every `connect` call is recorded on the attempts channel. Accepted
/// connections are handed over as [`MockConnection`]s, the server side of the
/// socket.
pub struct MockTransport {
    refuse: Arc<AtomicBool>,
    attempts: mpsc::UnboundedSender<ConnectAttempt>,
    accepted: mpsc::UnboundedSender<MockConnection>,
}

/// A recorded `connect` call.
#[derive(Debug, Clone)]
pub struct ConnectAttempt {
    pub url: String,
    pub at: Instant,
}

/// Test-side controls for a [`MockTransport`].
pub struct MockGateway {
    refuse: Arc<AtomicBool>,
    pub attempts: mpsc::UnboundedReceiver<ConnectAttempt>,
    pub accepted: mpsc::UnboundedReceiver<MockConnection>,
}

impl MockTransport {
    pub fn new() -> (Self, MockGateway) {
        let refuse = Arc::new(AtomicBool::new(false));
        let (attempts_tx, attempts_rx) = mpsc::unbounded_channel();
        let (accepted_tx, accepted_rx) = mpsc::unbounded_channel();

        let transport = Self {
            refuse: refuse.clone(),
            attempts: attempts_tx,
            accepted: accepted_tx,
        };
        let gateway = MockGateway {
            refuse,
            attempts: attempts_rx,
            accepted: accepted_rx,
        };
        (transport, gateway)
    }
}

impl MockGateway {
    /// Make subsequent connects fail (or succeed again).
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }

    /// Wait for the client to open the next connection.
    pub async fn accept(&mut self) -> MockConnection {
        self.accepted
            .recv()
            .await
            .expect("mock transport dropped")
    }
}

#[async_trait]
impl Transport for MockTransport {
    async fn connect(&self, url: &str) -> Result<Connection> {
        let _ = self.attempts.send(ConnectAttempt {
            url: url.to_string(),
            at: Instant::now(),
        });

        if self.refuse.load(Ordering::SeqCst) {
            return Err(Error::ConnectionRefused(url.to_string()));
        }

        let (inbound_tx, inbound_rx) = mpsc::unbounded_channel::<Result<String>>();
        let (outbound_tx, outbound_rx) = mpsc::unbounded_channel::<String>();

        let sink = sink::unfold(outbound_tx, |tx, text: String| async move {
            tx.send(text).map_err(|_| Error::ConnectionClosed)?;
            Ok::<_, Error>(tx)
        });
        let stream = stream::unfold(inbound_rx, |mut rx| async move {
            rx.recv().await.map(|item| (item, rx))
        });

        self.accepted
            .send(MockConnection {
                inbound: inbound_tx,
                outbound: outbound_rx,
            })
            .map_err(|_| Error::ConnectionClosed)?;

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Server side of a mock socket.
///
/// Dropping it closes the socket from the gateway's end.
pub struct MockConnection {
    inbound: mpsc::UnboundedSender<Result<String>>,
    outbound: mpsc::UnboundedReceiver<String>,
}

impl MockConnection {
    pub fn send_text(&self, text: impl Into<String>) {
        let _ = self.inbound.send(Ok(text.into()));
    }

    pub fn send_json(&self, value: serde_json::Value) {
        self.send_text(value.to_string());
    }

    /// Deliver a transport error to the client without closing.
    pub fn send_error(&self, message: &str) {
        let _ = self.inbound.send(Err(Error::ConnectionRefused(message.to_string())));
    }

    /// Next frame the client sent, or `None` once the client dropped the socket.
    pub async fn next_frame(&mut self) -> Option<serde_json::Value> {
        let text = self.outbound.recv().await?;
        Some(serde_json::from_str(&text).expect("client sent invalid JSON"))
    }

    /// A frame the client already sent, without waiting.
    pub fn try_next_frame(&mut self) -> Option<serde_json::Value> {
        let text = self.outbound.try_recv().ok()?;
        Some(serde_json::from_str(&text).expect("client sent invalid JSON"))
    }

    /// Whether the client still holds its end of the socket.
    pub fn is_open(&self) -> bool {
        !self.inbound.is_closed()
    }

    /// Close the socket from the gateway's end.
    pub fn close(self) {}
}
