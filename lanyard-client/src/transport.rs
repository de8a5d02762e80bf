//! Transport abstraction over the gateway socket.
//!
//! The gateway client only needs a sink of outbound text frames and a stream
//! of inbound ones. The stream ending means the socket closed.

use std::pin::Pin;

use async_trait::async_trait;
use futures_util::{future, Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite::Message};

use crate::error::{Error, Result};

/// Outbound half of a connection.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = Error> + Send>>;

/// Inbound half of a connection.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// An open socket, split into its two halves.
pub struct Connection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens connections to the gateway.
#[async_trait]
pub trait Transport: Send + Sync + 'static {
    async fn connect(&self, url: &str) -> Result<Connection>;
}

/// Transport backed by tokio-tungstenite.
///
/// Ping/pong and close handshakes are handled by tungstenite itself; only
/// text frames are surfaced.
#[derive(Debug, Default, Clone)]
pub struct WebSocketTransport;

#[async_trait]
impl Transport for WebSocketTransport {
    async fn connect(&self, url: &str) -> Result<Connection> {
        let (ws_stream, _) = connect_async(url).await?;
        let (write, read) = ws_stream.split();

        let sink = write.with(|text: String| future::ready(Ok::<_, Error>(Message::Text(text))));
        let stream = read.filter_map(|message| {
            future::ready(match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Close(frame)) => {
                    tracing::debug!("Gateway sent close frame: {:?}", frame);
                    None
                }
                Ok(_) => None,
                Err(e) => Some(Err(Error::from(e))),
            })
        });

        Ok(Connection {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}
