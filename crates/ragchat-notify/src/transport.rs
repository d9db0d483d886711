use anyhow::{Context, Result};
use async_trait::async_trait;
use futures::{Sink, SinkExt, Stream, StreamExt};
use std::pin::Pin;
use tokio_tungstenite::tungstenite::Message;
use url::Url;

/// Outgoing text frames
pub type FrameSink = Pin<Box<dyn Sink<String, Error = anyhow::Error> + Send>>;

/// Incoming text frames; the stream ends when the peer closes
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String>> + Send>>;

/// One open socket, split into its two directions
pub struct SocketConnection {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

impl SocketConnection {
    pub fn new(sink: FrameSink, stream: FrameStream) -> Self {
        Self { sink, stream }
    }
}

/// Opens text-frame connections to a WebSocket URL
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &Url) -> Result<SocketConnection>;
}

/// Production connector backed by `tokio-tungstenite`
///
/// Control frames are answered by tungstenite itself and never surface; binary frames are
/// decoded as UTF-8 when possible and dropped otherwise.
#[derive(Debug, Clone, Default)]
pub struct TungsteniteConnector;

impl TungsteniteConnector {
    pub fn new() -> Self {
        Self
    }
}

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &Url) -> Result<SocketConnection> {
        let (ws, response) = tokio_tungstenite::connect_async(url.as_str())
            .await
            .with_context(|| format!("WebSocket handshake with {} failed", url))?;

        tracing::debug!(url = %url, status = %response.status(), "WebSocket handshake complete");

        let (sink, stream) = ws.split();

        let sink = sink
            .sink_map_err(anyhow::Error::from)
            .with(|text: String| async move { Ok::<_, anyhow::Error>(Message::Text(text)) });

        let stream = stream.filter_map(|message| async move {
            match message {
                Ok(Message::Text(text)) => Some(Ok(text)),
                Ok(Message::Binary(bytes)) => match String::from_utf8(bytes) {
                    Ok(text) => Some(Ok(text)),
                    Err(_) => {
                        tracing::warn!("Dropping non-UTF-8 binary frame");
                        None
                    }
                },
                Ok(_) => None,
                Err(e) => Some(Err(anyhow::Error::from(e))),
            }
        });

        Ok(SocketConnection::new(Box::pin(sink), Box::pin(stream)))
    }
}
