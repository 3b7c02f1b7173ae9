//! Capture loop: samples the device on a cooperative schedule and
//! dispatches encoded frames under the rate-limit and backpressure
//! gates.
//!
//! Each tick runs a fixed, ordered check; any failed check idles the
//! tick entirely. Later gates assume earlier ones passed, so the
//! order is load-bearing:
//!
//! 1. streaming flag raised;
//! 2. connection open — a disconnected client never buffers frames;
//! 3. device reports a ready frame of non-zero dimensions;
//! 4. in-flight count at or below the ceiling;
//! 5. minimum interval elapsed since the last successful send.
//!
//! The loop always works on the freshest frame and never accumulates
//! a backlog: under sustained backpressure frames are lost, not
//! delayed, trading completeness for bounded memory and latency.

use std::sync::Arc;
use std::sync::atomic::{AtomicBool, Ordering};
use std::time::{Duration, Instant};

use async_trait::async_trait;
use tracing::{debug, trace};

use crate::backpressure::BackpressureController;
use crate::capture::CaptureGuard;
use crate::connection::ConnectionManager;
use crate::encoder::FrameEncoder;
use crate::protocol::ClientMessage;
use crate::store::StateStore;

// ── Constants ────────────────────────────────────────────────────

/// Minimum spacing between dispatched frames (5 frames/second cap,
/// regardless of device frame rate or tick rate).
pub const SEND_MIN_INTERVAL: Duration = Duration::from_millis(200);

/// Default scheduler tick rate, approximating a display-refresh
/// cadence.
pub const TICK_HZ: u32 = 60;

// ── Ticker ───────────────────────────────────────────────────────

/// Repeating-tick scheduler. Abstracted so the loop can run under a
/// real timer in production and a manual ticker in tests.
#[async_trait]
pub trait Ticker: Send {
    /// Complete when the next tick is due.
    async fn tick(&mut self);
}

/// Timer-driven ticker.
pub struct IntervalTicker {
    interval: tokio::time::Interval,
}

impl IntervalTicker {
    /// Ticker firing `hz` times per second (minimum 1).
    pub fn from_hz(hz: u32) -> Self {
        let hz = hz.max(1);
        let mut interval = tokio::time::interval(Duration::from_secs_f64(1.0 / hz as f64));
        interval.set_missed_tick_behavior(tokio::time::MissedTickBehavior::Skip);
        Self { interval }
    }
}

#[async_trait]
impl Ticker for IntervalTicker {
    async fn tick(&mut self) {
        self.interval.tick().await;
    }
}

// ── Tick outcome ─────────────────────────────────────────────────

/// What one capture tick did, and if it idled, which gate stopped it.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum TickOutcome {
    /// A frame was encoded and dispatched.
    Sent,
    /// Streaming flag is down.
    NotStreaming,
    /// Connection is not open.
    NotConnected,
    /// No ready frame of non-zero dimensions.
    NoFrame,
    /// In-flight count above the ceiling; this capture opportunity
    /// is dropped, never queued.
    Saturated,
    /// Too soon after the previous dispatch.
    RateLimited,
    /// The captured frame could not be encoded; retried next tick.
    EncodeSkipped,
    /// The transport refused the send; no bookkeeping was done.
    SendRefused,
}

// ── FrameSender ──────────────────────────────────────────────────

/// The capture-and-send loop.
pub struct FrameSender {
    guard: Arc<CaptureGuard>,
    store: Arc<StateStore>,
    backpressure: Arc<BackpressureController>,
    manager: Arc<ConnectionManager>,
    encoder: FrameEncoder,
    min_interval: Duration,
    last_send: Option<Instant>,
    stop: Arc<AtomicBool>,
}

impl FrameSender {
    pub fn new(
        guard: Arc<CaptureGuard>,
        store: Arc<StateStore>,
        backpressure: Arc<BackpressureController>,
        manager: Arc<ConnectionManager>,
        encoder: FrameEncoder,
    ) -> Self {
        Self {
            guard,
            store,
            backpressure,
            manager,
            encoder,
            min_interval: SEND_MIN_INTERVAL,
            last_send: None,
            stop: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Override the rate-limit interval (used by tests).
    pub fn with_min_interval(mut self, interval: Duration) -> Self {
        self.min_interval = interval;
        self
    }

    /// Cloneable handle that stops the loop on its next tick.
    pub fn stop_handle(&self) -> Arc<AtomicBool> {
        Arc::clone(&self.stop)
    }

    /// Drive the loop until stopped.
    pub async fn run(mut self, mut ticker: Box<dyn Ticker>) {
        debug!("capture loop started");
        loop {
            ticker.tick().await;
            if self.stop.load(Ordering::SeqCst) {
                break;
            }
            self.on_tick(Instant::now());
        }
        debug!("capture loop stopped");
    }

    /// Run the gate sequence for one tick and dispatch if all pass.
    pub fn on_tick(&mut self, now: Instant) -> TickOutcome {
        // Gate 1: user wants streaming.
        if !self.guard.is_streaming() {
            return TickOutcome::NotStreaming;
        }
        // Gate 2: connection open.
        if !self.store.connection_state().is_open() {
            return TickOutcome::NotConnected;
        }
        // Gate 3: a frame is ready.
        if !self.guard.frame_ready() {
            return TickOutcome::NoFrame;
        }
        // Gate 4: backpressure ceiling.
        if self.backpressure.is_saturated() {
            trace!("backpressure saturated; dropping capture opportunity");
            return TickOutcome::Saturated;
        }
        // Gate 5: outbound rate limit.
        if let Some(last) = self.last_send {
            if now.saturating_duration_since(last) < self.min_interval {
                return TickOutcome::RateLimited;
            }
        }

        // All gates passed: capture the freshest frame and dispatch.
        let frame = match self.guard.capture_frame() {
            Ok(frame) => frame,
            Err(e) => {
                trace!("no frame this tick: {e}");
                return TickOutcome::NoFrame;
            }
        };
        let uri = match self.encoder.encode_data_uri(&frame) {
            Ok(uri) => uri,
            Err(e) => {
                // Expected to be transient (device mid-reconfiguration).
                debug!("encode failed, abandoning tick: {e}");
                return TickOutcome::EncodeSkipped;
            }
        };

        match self.manager.send(&ClientMessage::Frame { frame: uri }) {
            Ok(()) => {
                // Bookkeeping only after an actual dispatch.
                self.last_send = Some(now);
                self.backpressure.record_dispatch();
                TickOutcome::Sent
            }
            Err(e) => {
                trace!("send refused: {e}");
                TickOutcome::SendRefused
            }
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
