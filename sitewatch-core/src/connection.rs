//! Connection manager: owns the single outbound connection, its
//! lifecycle state machine, heartbeat, and reconnection policy.
//!
//! [`ConnectionManager::run`] is driven by exactly one task, so
//! transport events (open, message, close, error) are handled
//! strictly in arrival order with no reentrancy. The capture loop
//! talks to the manager only through the synchronous [`send`]
//! gate and the shared pending counter.
//!
//! Reconnection is a fixed-delay, unlimited retry: as long as closes
//! keep happening while streaming is desired, the manager schedules
//! exactly one new attempt 2 s after each close. An explicit
//! [`disconnect`] never triggers that path.
//!
//! [`send`]: ConnectionManager::send
//! [`disconnect`]: ConnectionManager::disconnect

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use tokio::sync::{Notify, mpsc, watch};
use tracing::{debug, info, warn};

use crate::backpressure::BackpressureController;
use crate::error::StreamError;
use crate::protocol::{ClientMessage, ServerMessage};
use crate::store::StateStore;
use crate::transport::{Connector, Transport};

// ── Constants ────────────────────────────────────────────────────

/// Heartbeat ping period while the connection is open.
pub const HEARTBEAT_INTERVAL: Duration = Duration::from_secs(10);

/// Fixed delay before the single reconnection attempt after a close.
pub const RECONNECT_DELAY: Duration = Duration::from_secs(2);

// ── Session outcome ──────────────────────────────────────────────

/// Why a connection session ended.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
enum SessionEnd {
    /// Remote closed gracefully.
    Closed,
    /// Transport or connect failure.
    Failed,
    /// Explicit disconnect; suppresses reconnection.
    Shutdown,
}

// ── ConnectionManager ────────────────────────────────────────────

/// Owns the one connection to the analysis service.
pub struct ConnectionManager {
    connector: Box<dyn Connector>,
    store: Arc<StateStore>,
    backpressure: Arc<BackpressureController>,
    /// The capture guard's streaming flag; gates reconnection.
    streaming: watch::Receiver<bool>,
    /// Writer half of the live session, present only while open.
    outbound: Mutex<Option<mpsc::UnboundedSender<String>>>,
    /// Raised by `disconnect`; cleared when `run` is re-invoked.
    shutdown: AtomicBool,
    /// Wakes `run` out of a session or a reconnect delay.
    wake: Notify,
    /// Guards against a second concurrent `run`.
    active: AtomicBool,
    heartbeat_interval: Duration,
    reconnect_delay: Duration,
}

impl ConnectionManager {
    /// Manager with the standard heartbeat and reconnect timing.
    pub fn new(
        connector: Box<dyn Connector>,
        store: Arc<StateStore>,
        backpressure: Arc<BackpressureController>,
        streaming: watch::Receiver<bool>,
    ) -> Self {
        Self::with_timing(
            connector,
            store,
            backpressure,
            streaming,
            HEARTBEAT_INTERVAL,
            RECONNECT_DELAY,
        )
    }

    /// Manager with explicit timing (used by tests).
    pub fn with_timing(
        connector: Box<dyn Connector>,
        store: Arc<StateStore>,
        backpressure: Arc<BackpressureController>,
        streaming: watch::Receiver<bool>,
        heartbeat_interval: Duration,
        reconnect_delay: Duration,
    ) -> Self {
        Self {
            connector,
            store,
            backpressure,
            streaming,
            outbound: Mutex::new(None),
            shutdown: AtomicBool::new(false),
            wake: Notify::new(),
            active: AtomicBool::new(false),
            heartbeat_interval,
            reconnect_delay,
        }
    }

    /// Whether a `run` task is currently driving the connection.
    pub fn is_active(&self) -> bool {
        self.active.load(Ordering::SeqCst)
    }

    fn outbound_lock(&self) -> std::sync::MutexGuard<'_, Option<mpsc::UnboundedSender<String>>> {
        self.outbound.lock().expect("outbound mutex poisoned")
    }

    // ── Send ─────────────────────────────────────────────────────

    /// Serialize and dispatch a message to the open connection.
    ///
    /// Fails with [`StreamError::NotConnected`] unless the state is
    /// `Open` and a live writer exists. Callers must check the result
    /// before doing any pending-count bookkeeping; a refused send has
    /// no side effects.
    pub fn send(&self, msg: &ClientMessage) -> Result<(), StreamError> {
        if !self.store.connection_state().is_open() {
            return Err(StreamError::NotConnected);
        }
        let text = msg.to_wire()?;
        match self.outbound_lock().as_ref() {
            Some(tx) => tx.send(text).map_err(|_| StreamError::NotConnected),
            None => Err(StreamError::NotConnected),
        }
    }

    // ── Disconnect ───────────────────────────────────────────────

    /// Explicitly stop the connection from any state.
    ///
    /// Closes the transport, forces `Closed`, and never schedules a
    /// reconnection — the caller's intent is to stop, not to recover.
    pub fn disconnect(&self) {
        self.shutdown.store(true, Ordering::SeqCst);
        *self.outbound_lock() = None;
        self.wake.notify_one();
        if !self.is_active() && !self.store.connection_state().is_closed() {
            self.store.set_closed();
        }
    }

    // ── Lifecycle loop ───────────────────────────────────────────

    /// Drive the connection until explicitly disconnected or until a
    /// close happens while streaming is no longer desired.
    ///
    /// Intended to be spawned:
    ///
    /// ```no_run
    /// # use std::sync::Arc;
    /// # use sitewatch_core::connection::ConnectionManager;
    /// # fn example(manager: Arc<ConnectionManager>) {
    /// tokio::spawn(Arc::clone(&manager).run());
    /// # }
    /// ```
    pub async fn run(self: Arc<Self>) {
        if self.active.swap(true, Ordering::SeqCst) {
            return; // another task already drives the connection
        }
        // A fresh run is a deliberate connect; forget old disconnects.
        self.shutdown.store(false, Ordering::SeqCst);

        loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break;
            }

            let end = self.session().await;

            if end == SessionEnd::Shutdown || self.shutdown.load(Ordering::SeqCst) {
                break;
            }
            if !*self.streaming.borrow() {
                info!("not streaming; no reconnection scheduled");
                break;
            }

            debug!("reconnecting in {:?}", self.reconnect_delay);
            tokio::select! {
                _ = tokio::time::sleep(self.reconnect_delay) => {}
                _ = self.wake.notified() => {} // disconnect during the delay
            }
        }

        if !self.store.connection_state().is_closed() {
            self.store.set_closed();
        }
        self.active.store(false, Ordering::SeqCst);
    }

    /// One connect → open → close cycle.
    async fn session(&self) -> SessionEnd {
        if let Err(e) = self.store.update_connection(|s| s.begin_connect()) {
            warn!("connect rejected: {e}");
            return SessionEnd::Failed;
        }

        let mut transport = match self.connector.connect().await {
            Ok(t) => t,
            Err(e) => {
                warn!("connect failed: {e}");
                let _ = self.store.update_connection(|s| s.mark_error());
                self.store.set_closed();
                return SessionEnd::Failed;
            }
        };

        if let Err(e) = self.store.update_connection(|s| s.mark_open()) {
            warn!("unexpected state on open: {e}");
            transport.close().await;
            self.store.set_closed();
            return SessionEnd::Failed;
        }
        self.backpressure.reset();
        info!("connection open");

        let (tx, mut rx) = mpsc::unbounded_channel::<String>();
        *self.outbound_lock() = Some(tx);

        // First ping one full period after open.
        let mut heartbeat = tokio::time::interval_at(
            tokio::time::Instant::now() + self.heartbeat_interval,
            self.heartbeat_interval,
        );
        heartbeat.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Delay);

        let end = loop {
            if self.shutdown.load(Ordering::SeqCst) {
                break SessionEnd::Shutdown;
            }
            tokio::select! {
                _ = self.wake.notified() => {
                    break SessionEnd::Shutdown;
                }
                _ = heartbeat.tick() => {
                    let ping = match ClientMessage::Ping.to_wire() {
                        Ok(text) => text,
                        Err(e) => {
                            warn!("heartbeat serialization failed: {e}");
                            continue;
                        }
                    };
                    if let Err(e) = transport.send(ping).await {
                        warn!("heartbeat send failed: {e}");
                        break SessionEnd::Failed;
                    }
                }
                out = rx.recv() => match out {
                    Some(text) => {
                        if let Err(e) = transport.send(text).await {
                            warn!("send failed: {e}");
                            break SessionEnd::Failed;
                        }
                    }
                    // Writer handle dropped; treat as shutdown.
                    None => break SessionEnd::Shutdown,
                },
                inbound = transport.recv() => match inbound {
                    Some(Ok(text)) => self.handle_message(&text),
                    Some(Err(e)) => {
                        warn!("transport error: {e}");
                        break SessionEnd::Failed;
                    }
                    None => {
                        info!("connection closed by remote");
                        break SessionEnd::Closed;
                    }
                },
            }
        };

        *self.outbound_lock() = None;
        transport.close().await;

        match end {
            SessionEnd::Failed => {
                let _ = self.store.update_connection(|s| s.mark_error());
                self.store.set_closed();
            }
            SessionEnd::Closed | SessionEnd::Shutdown => self.store.set_closed(),
        }
        end
    }

    /// Handle one inbound payload. Runs to completion before the next
    /// event is dispatched.
    fn handle_message(&self, text: &str) {
        match ServerMessage::from_wire(text) {
            Ok(ServerMessage::Pong) => debug!("heartbeat acknowledged"),
            Ok(ServerMessage::Error { message }) => {
                // Application-level error, not a transport failure.
                warn!("analysis service error: {message}");
            }
            Ok(ServerMessage::Result(payload)) => {
                self.backpressure.record_result();
                self.store.apply_result(payload);
            }
            Err(e) => warn!("dropping malformed message: {e}"),
        }
    }
}

impl std::fmt::Debug for ConnectionManager {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("ConnectionManager")
            .field("state", &self.store.connection_state())
            .field("active", &self.is_active())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
