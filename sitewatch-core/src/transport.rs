//! Duplex transport abstraction and the WebSocket implementation.
//!
//! The connection manager drives a [`Transport`] obtained from a
//! [`Connector`]; both are traits so tests can substitute an
//! in-memory fake for the real WebSocket.

use async_trait::async_trait;
use futures::{SinkExt, StreamExt};
use tokio::net::TcpStream;
use tokio_tungstenite::tungstenite::protocol::Message;
use tokio_tungstenite::{MaybeTlsStream, WebSocketStream, connect_async};
use tracing::debug;

use crate::error::StreamError;

/// An established duplex text-message connection.
#[async_trait]
pub trait Transport: Send {
    /// Write one text payload.
    async fn send(&mut self, text: String) -> Result<(), StreamError>;

    /// Read the next text payload.
    ///
    /// `None` means the peer closed the connection; `Some(Err(_))`
    /// is a transport failure.
    async fn recv(&mut self) -> Option<Result<String, StreamError>>;

    /// Close the connection. Best-effort.
    async fn close(&mut self);
}

/// Opens transports. Injectable seam for tests.
#[async_trait]
pub trait Connector: Send + Sync {
    async fn connect(&self) -> Result<Box<dyn Transport>, StreamError>;
}

// ── WebSocket implementation ─────────────────────────────────────

/// Connects to the analysis service over a WebSocket.
pub struct WsConnector {
    url: String,
}

impl WsConnector {
    /// Connector for a `ws://` / `wss://` endpoint.
    pub fn new(url: impl Into<String>) -> Self {
        Self { url: url.into() }
    }

    /// The configured endpoint.
    pub fn url(&self) -> &str {
        &self.url
    }
}

#[async_trait]
impl Connector for WsConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, StreamError> {
        let (stream, _response) = connect_async(&self.url).await?;
        debug!("websocket established to {}", self.url);
        Ok(Box::new(WsTransport { inner: stream }))
    }
}

/// A live WebSocket to the analysis service.
pub struct WsTransport {
    inner: WebSocketStream<MaybeTlsStream<TcpStream>>,
}

#[async_trait]
impl Transport for WsTransport {
    async fn send(&mut self, text: String) -> Result<(), StreamError> {
        self.inner.send(Message::Text(text)).await?;
        Ok(())
    }

    async fn recv(&mut self) -> Option<Result<String, StreamError>> {
        // Protocol traffic is text-only; WebSocket control frames and
        // stray binary payloads are not surfaced to the manager.
        loop {
            match self.inner.next().await? {
                Ok(Message::Text(text)) => return Some(Ok(text)),
                Ok(Message::Close(_)) => return None,
                Ok(Message::Binary(_))
                | Ok(Message::Ping(_))
                | Ok(Message::Pong(_))
                | Ok(Message::Frame(_)) => continue,
                Err(e) => return Some(Err(e.into())),
            }
        }
    }

    async fn close(&mut self) {
        let _ = self.inner.close(None).await;
    }
}
