//! Top-level streaming service: wires the capture guard, state store,
//! connection manager, and capture loop together and owns their
//! background tasks.
//!
//! Consumers interact with [`StreamService`] alone: subscribe for
//! state snapshots, start and stop streaming, shut the whole thing
//! down. The first subscription lazily brings the connection up so a
//! monitoring view shows live connection state before any frame is
//! ever captured.

use std::sync::atomic::{AtomicBool, Ordering};
use std::sync::{Arc, Mutex, MutexGuard};

use tokio::task::JoinHandle;
use tracing::{debug, info};

use crate::backpressure::BackpressureController;
use crate::capture::{CaptureBackend, CaptureConfig, CaptureGuard};
use crate::connection::ConnectionManager;
use crate::encoder::{FrameEncoder, JPEG_QUALITY};
use crate::error::StreamError;
use crate::sender::{FrameSender, IntervalTicker, TICK_HZ};
use crate::state::ConnectionState;
use crate::store::{Snapshot, StateStore, SubscriberFn, SubscriptionId};
use crate::transport::{Connector, WsConnector};

// ── Configuration ────────────────────────────────────────────────

/// Default analysis-service endpoint.
pub const DEFAULT_ENDPOINT: &str = "ws://localhost:8000/ws";

/// Everything a [`StreamService`] needs to run.
#[derive(Debug, Clone, PartialEq)]
pub struct StreamConfig {
    /// WebSocket endpoint of the analysis service.
    pub endpoint: String,
    /// Capture resolution.
    pub capture: CaptureConfig,
    /// JPEG quality for the frame encoder.
    pub jpeg_quality: u8,
    /// Capture loop tick rate.
    pub tick_hz: u32,
}

impl Default for StreamConfig {
    fn default() -> Self {
        Self {
            endpoint: DEFAULT_ENDPOINT.to_string(),
            capture: CaptureConfig::default(),
            jpeg_quality: JPEG_QUALITY,
            tick_hz: TICK_HZ,
        }
    }
}

// ── StreamService ────────────────────────────────────────────────

/// A spawned capture loop and its stop flag.
struct SenderTask {
    stop: Arc<AtomicBool>,
    handle: JoinHandle<()>,
}

/// Owns one capture pipeline and one connection to the analysis
/// service.
pub struct StreamService {
    config: StreamConfig,
    guard: Arc<CaptureGuard>,
    store: Arc<StateStore>,
    backpressure: Arc<BackpressureController>,
    manager: Arc<ConnectionManager>,
    conn_task: Mutex<Option<JoinHandle<()>>>,
    sender_task: Mutex<Option<SenderTask>>,
}

impl StreamService {
    /// Service connecting to the configured WebSocket endpoint.
    pub fn new(config: StreamConfig, backend: Box<dyn CaptureBackend>) -> Self {
        let connector = Box::new(WsConnector::new(&config.endpoint));
        Self::with_connector(config, backend, connector)
    }

    /// Service over an explicit connector (used by tests).
    pub fn with_connector(
        config: StreamConfig,
        backend: Box<dyn CaptureBackend>,
        connector: Box<dyn Connector>,
    ) -> Self {
        let backpressure = Arc::new(BackpressureController::new());
        let store = Arc::new(StateStore::new(Arc::clone(&backpressure)));
        let guard = Arc::new(CaptureGuard::new(backend, config.capture));
        let manager = Arc::new(ConnectionManager::new(
            connector,
            Arc::clone(&store),
            Arc::clone(&backpressure),
            guard.streaming_changes(),
        ));
        Self {
            config,
            guard,
            store,
            backpressure,
            manager,
            conn_task: Mutex::new(None),
            sender_task: Mutex::new(None),
        }
    }

    fn conn_lock(&self) -> MutexGuard<'_, Option<JoinHandle<()>>> {
        self.conn_task.lock().expect("connection task mutex poisoned")
    }

    fn sender_lock(&self) -> MutexGuard<'_, Option<SenderTask>> {
        self.sender_task.lock().expect("sender task mutex poisoned")
    }

    // ── Subscriptions ────────────────────────────────────────────

    /// Register a snapshot subscriber and bring the connection up if
    /// it is not running.
    ///
    /// The subscriber receives the current snapshot immediately, then
    /// one per state change until unsubscribed.
    pub fn subscribe(&self, subscriber: SubscriberFn) -> SubscriptionId {
        self.ensure_connection();
        self.store.subscribe(subscriber)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.store.unsubscribe(id);
    }

    /// Current state snapshot.
    pub fn snapshot(&self) -> Snapshot {
        self.store.snapshot()
    }

    /// Current connection state.
    pub fn connection_state(&self) -> ConnectionState {
        self.store.connection_state()
    }

    /// Whether capture is running.
    pub fn is_streaming(&self) -> bool {
        self.guard.is_streaming()
    }

    // ── Connection lifecycle ─────────────────────────────────────

    /// Spawn the connection manager task if none is running.
    ///
    /// A finished task (explicit disconnect, or a close with
    /// streaming stopped) is replaced; an active one is left alone.
    pub fn ensure_connection(&self) {
        let mut slot = self.conn_lock();
        let running = slot.as_ref().is_some_and(|h| !h.is_finished());
        if !running {
            debug!("spawning connection task");
            *slot = Some(tokio::spawn(Arc::clone(&self.manager).run()));
        }
    }

    // ── Streaming lifecycle ──────────────────────────────────────

    /// Acquire the capture device and start the capture loop.
    ///
    /// Fails with [`StreamError::DeviceUnavailable`] when the device
    /// cannot be acquired; nothing is spawned in that case.
    pub fn start(&self) -> Result<(), StreamError> {
        self.guard.start()?;
        self.ensure_connection();

        let mut slot = self.sender_lock();
        let running = slot.as_ref().is_some_and(|t| !t.handle.is_finished());
        if !running {
            let sender = FrameSender::new(
                Arc::clone(&self.guard),
                Arc::clone(&self.store),
                Arc::clone(&self.backpressure),
                Arc::clone(&self.manager),
                FrameEncoder::with_quality(self.config.jpeg_quality),
            );
            let stop = sender.stop_handle();
            let ticker = Box::new(IntervalTicker::from_hz(self.config.tick_hz));
            let handle = tokio::spawn(sender.run(ticker));
            *slot = Some(SenderTask { stop, handle });
            info!("streaming started");
        }
        Ok(())
    }

    /// Stop capture: end the capture loop and release the device.
    ///
    /// Safe to call at any time, including when already stopped. The
    /// connection stays up; a subsequent remote close will not be
    /// followed by a reconnect while streaming stays off.
    pub fn stop(&self) {
        if let Some(task) = self.sender_lock().take() {
            task.stop.store(true, Ordering::SeqCst);
            task.handle.abort();
        }
        self.guard.stop();
    }

    /// Discard frames, analysis results, and fps; keep the
    /// connection state and subscribers.
    pub fn clear(&self) {
        self.store.clear();
    }

    /// Stop streaming and tear the connection down for good.
    pub fn shutdown(&self) {
        self.stop();
        self.manager.disconnect();
        info!("service shut down");
    }
}

impl Drop for StreamService {
    fn drop(&mut self) {
        self.shutdown();
    }
}

// ── Tests ────────────────────────────────────────────────────────
