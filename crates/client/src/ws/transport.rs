//! Pluggable pieces of the realtime connection: how a duplex text channel is
//! opened and how reconnect delays are waited out.

use std::pin::Pin;
use std::time::Duration;

use async_trait::async_trait;
use futures_util::future::{self, BoxFuture};
use futures_util::{Sink, SinkExt, Stream, StreamExt};
use tokio_tungstenite::{connect_async, tungstenite, tungstenite::Message};
use tracing::debug;

#[derive(Debug, thiserror::Error)]
pub enum TransportError {
    #[error("WebSocket error: {0}")]
    WebSocket(#[from] tungstenite::Error),
    #[error("connection closed")]
    Closed,
    #[error("{0}")]
    Other(String),
}

/// Outgoing half of an open channel; accepts text frames.
pub type FrameSink = Pin<Box<dyn Sink<String, Error = TransportError> + Send>>;

/// Incoming half of an open channel. Ends when the peer closes.
pub type FrameStream = Pin<Box<dyn Stream<Item = Result<String, TransportError>> + Send>>;

/// An open text channel.
pub struct Duplex {
    pub sink: FrameSink,
    pub stream: FrameStream,
}

/// Opens channels to the realtime endpoint.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self, url: &str) -> Result<Duplex, TransportError>;
}

/// Waits out reconnect delays.
pub trait Timer: Send + Sync {
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()>;
}

/// [`Connector`] backed by `tokio-tungstenite`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TungsteniteConnector;

#[async_trait]
impl Connector for TungsteniteConnector {
    async fn connect(&self, url: &str) -> Result<Duplex, TransportError> {
        let (ws_stream, _response) = connect_async(url).await?;
        let (write, read) = ws_stream.split();

        let sink = write
            .sink_map_err(TransportError::from)
            .with(|text: String| future::ready(Ok::<_, TransportError>(Message::Text(text.into()))));

        // Pong is handled automatically by tungstenite; binary frames are
        // not part of the protocol.
        let stream = read
            .take_while(|msg| future::ready(!matches!(msg, Ok(Message::Close(_)))))
            .filter_map(|msg| future::ready(text_payload(msg)));

        Ok(Duplex {
            sink: Box::pin(sink),
            stream: Box::pin(stream),
        })
    }
}

/// Text payload of an inbound frame. Other frame kinds are logged and
/// skipped.
fn text_payload(
    msg: Result<Message, tungstenite::Error>,
) -> Option<Result<String, TransportError>> {
    match msg {
        Ok(Message::Text(text)) => Some(Ok(text.as_str().to_owned())),
        Ok(Message::Binary(data)) => {
            debug!("Dropping binary WebSocket frame ({} bytes)", data.len());
            None
        }
        Ok(other) => {
            debug!("Ignoring WebSocket control frame: {:?}", other);
            None
        }
        Err(e) => Some(Err(TransportError::from(e))),
    }
}

/// [`Timer`] backed by `tokio::time`.
#[derive(Debug, Clone, Copy, Default)]
pub struct TokioTimer;

impl Timer for TokioTimer {
    fn sleep(&self, delay: Duration) -> BoxFuture<'static, ()> {
        Box::pin(tokio::time::sleep(delay))
    }
}
