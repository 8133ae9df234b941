//! The byte pipe under the STOMP session. Frames travel as text messages.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::{self, Message};
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream};

use super::RealtimeError;

#[async_trait]
pub trait Connector: Send + Sync {
    async fn open(&self) -> Result<Box<dyn Transport>, RealtimeError>;
}

#[async_trait]
pub trait Transport: Send {
    async fn send(&mut self, text: String) -> Result<(), RealtimeError>;

    /// Next text message, or `None` once the peer has gone away.
    /// Must be cancel safe: the driver polls it inside `select!`.
    async fn recv(&mut self) -> Option<Result<String, RealtimeError>>;

    async fn close(&mut self) -> Result<(), RealtimeError>;
}

/// WebSocket connector for the raw (non-SockJS) endpoint.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn open(&self) -> Result<Box<dyn Transport>, RealtimeError> {
        tracing::debug!("Opening WebSocket to {}", self.url);
        let (stream, _response) = tokio_tungstenite::connect_async(self.url.as_str()).await?;
        Ok(Box::new(WsTransport { stream }))
    }
}

/// Binary frames carry STOMP text too; anything that is not UTF-8 is dropped.
fn binary_text(bytes: &[u8]) -> Option<String> {
    match std::str::from_utf8(bytes) {
        Ok(text) => Some(text.to_owned()),
        Err(e) => {
            tracing::warn!("Dropping binary message that is not UTF-8: {}", e);
            None
        }
    }
}

struct WsTransport {
    stream: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), RealtimeError> {
        self.stream.send(Message::text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, RealtimeError>> {
        loop {
            match self.stream.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text.as_str().to_owned())),
                Ok(Message::Binary(bytes)) => match binary_text(&bytes) {
                    Some(text) => return Some(Ok(text)),
                    None => continue,
                },
                Ok(Message::Close(_)) => return None,
                Ok(_) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) -> Result<(), RealtimeError> {
        match self.stream.close(None).await {
            Ok(())
            | Err(tungstenite::Error::ConnectionClosed)
            | Err(tungstenite::Error::AlreadyClosed) => Ok(()),
            Err(e) => Err(e.into()),
        }
    }
}
