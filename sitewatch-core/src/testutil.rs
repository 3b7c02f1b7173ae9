//! In-memory fakes shared by the unit tests: a channel-backed
//! transport pair standing in for the WebSocket.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::time::Duration;

use async_trait::async_trait;
use tokio::sync::mpsc;

use crate::error::StreamError;
use crate::transport::{Connector, Transport};

const WAIT_TIMEOUT: Duration = Duration::from_secs(2);

/// Poll `cond` until it holds or a deadline passes.
pub(crate) async fn wait_for(mut cond: impl FnMut() -> bool) {
    let deadline = tokio::time::Instant::now() + WAIT_TIMEOUT;
    while !cond() {
        assert!(
            tokio::time::Instant::now() < deadline,
            "condition not met in time"
        );
        tokio::time::sleep(Duration::from_millis(5)).await;
    }
}

/// Connector producing channel-backed transports. Each successful
/// `connect` hands the server side of the pair to [`FakeSessions`].
pub(crate) struct FakeConnector {
    sessions_tx: mpsc::UnboundedSender<FakeServerSide>,
    connects: Arc<AtomicUsize>,
    refuse: Arc<AtomicBool>,
}

impl FakeConnector {
    /// Returns the connector, the server-side session stream, and the
    /// connect-attempt counter.
    pub fn new() -> (Self, FakeSessions, Arc<AtomicUsize>) {
        let (sessions_tx, sessions_rx) = mpsc::unbounded_channel();
        let connects = Arc::new(AtomicUsize::new(0));
        let refuse = Arc::new(AtomicBool::new(false));
        (
            Self {
                sessions_tx,
                connects: Arc::clone(&connects),
                refuse: Arc::clone(&refuse),
            },
            FakeSessions {
                rx: sessions_rx,
                refuse,
            },
            connects,
        )
    }
}

#[async_trait]
impl Connector for FakeConnector {
    async fn connect(&self) -> Result<Box<dyn Transport>, StreamError> {
        self.connects.fetch_add(1, Ordering::SeqCst);
        if self.refuse.load(Ordering::SeqCst) {
            return Err(StreamError::Other("connection refused".into()));
        }

        let (to_server_tx, to_server_rx) = mpsc::unbounded_channel();
        let (to_client_tx, to_client_rx) = mpsc::unbounded_channel();

        self.sessions_tx
            .send(FakeServerSide {
                from_client: to_server_rx,
                to_client: to_client_tx,
            })
            .map_err(|_| StreamError::ChannelClosed)?;

        Ok(Box::new(FakeClientTransport {
            tx: to_server_tx,
            rx: to_client_rx,
        }))
    }
}

/// Server-side view of the sessions a [`FakeConnector`] produced.
pub(crate) struct FakeSessions {
    rx: mpsc::UnboundedReceiver<FakeServerSide>,
    refuse: Arc<AtomicBool>,
}

impl FakeSessions {
    /// Wait for the next session to be established.
    pub async fn next(&mut self) -> FakeServerSide {
        tokio::time::timeout(WAIT_TIMEOUT, self.rx.recv())
            .await
            .expect("timed out waiting for a connection")
            .expect("connector dropped")
    }

    /// Make subsequent connect attempts fail.
    pub fn refuse_connections(&self, refuse: bool) {
        self.refuse.store(refuse, Ordering::SeqCst);
    }
}

/// The remote end of one fake session.
pub(crate) struct FakeServerSide {
    from_client: mpsc::UnboundedReceiver<String>,
    to_client: mpsc::UnboundedSender<String>,
}

impl FakeServerSide {
    /// Wait for the next payload the client sent.
    pub async fn expect_from_client(&mut self) -> String {
        tokio::time::timeout(WAIT_TIMEOUT, self.from_client.recv())
            .await
            .expect("timed out waiting for a client payload")
            .expect("client side dropped")
    }

    /// Deliver a payload to the client.
    pub fn push_to_client(&self, text: &str) {
        let _ = self.to_client.send(text.to_string());
    }

    /// Drop both halves, which the client observes as a close.
    pub fn close(self) {}
}

/// Client-side transport half of a fake session.
struct FakeClientTransport {
    tx: mpsc::UnboundedSender<String>,
    rx: mpsc::UnboundedReceiver<String>,
}

#[async_trait]
impl Transport for FakeClientTransport {
    async fn send(&mut self, text: String) -> Result<(), StreamError> {
        self.tx.send(text).map_err(|_| StreamError::ChannelClosed)
    }

    async fn recv(&mut self) -> Option<Result<String, StreamError>> {
        self.rx.recv().await.map(Ok)
    }

    async fn close(&mut self) {
        self.rx.close();
    }
}
