//! Shared state store: single source of truth for connection and
//! result state, broadcast to display consumers as immutable
//! snapshots.
//!
//! Exactly one store exists per client regardless of how many display
//! consumers subscribe. All mutation happens on the connection
//! manager's task; consumers only ever receive owned [`Snapshot`]
//! copies, so no notification can observe a torn or in-place write.
//!
//! Subscriber callbacks run synchronously during delivery and must
//! not call back into the store.

use std::sync::Arc;
use std::sync::Mutex;

use tracing::warn;

use crate::backpressure::BackpressureController;
use crate::error::StreamError;
use crate::protocol::{Detection, Posture, ResultPayload};
use crate::state::ConnectionState;

// ── Snapshot types ───────────────────────────────────────────────

/// Most recently received overlay frame per named channel.
///
/// A result that carries a value for a channel overwrites it; absent
/// fields leave the previous value untouched.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct ChannelFrames {
    /// Object-detection overlay, as a JPEG data URI.
    pub object: Option<String>,
    /// Pose-estimation overlay, as a JPEG data URI.
    pub pose: Option<String>,
}

/// Most recent detection/posture payload, with the same
/// last-write-wins partial-update semantics as [`ChannelFrames`].
#[derive(Debug, Clone, Default, PartialEq)]
pub struct AnalysisResult {
    pub detections: Option<Vec<Detection>>,
    pub posture: Option<Posture>,
}

/// An immutable, fully-copied view of the store at one point in time.
///
/// Every notification hands each subscriber a fresh, independent
/// copy; mutating a delivered snapshot never affects the store.
#[derive(Debug, Clone, Default, PartialEq)]
pub struct Snapshot {
    /// Connection lifecycle state.
    pub connection: ConnectionState,
    /// Service-side throughput estimate (results/second), stored
    /// verbatim.
    pub fps: f64,
    /// Latest overlay frame per channel.
    pub frames: ChannelFrames,
    /// Latest analysis payload, or `None` before the first result.
    pub result: Option<AnalysisResult>,
}

// ── Subscribers ──────────────────────────────────────────────────

/// A display consumer's callback. Returning `Err` is logged and does
/// not interrupt delivery to the remaining subscribers.
pub type SubscriberFn = Box<dyn FnMut(Snapshot) -> Result<(), StreamError> + Send>;

/// Identity key for a registered subscriber, used to remove it.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Hash)]
pub struct SubscriptionId(u64);

// ── StateStore ───────────────────────────────────────────────────

struct Inner {
    connection: ConnectionState,
    fps: f64,
    frames: ChannelFrames,
    result: Option<AnalysisResult>,
    next_id: u64,
    subscribers: Vec<(u64, SubscriberFn)>,
}

/// The canonical client-side state store.
pub struct StateStore {
    backpressure: Arc<BackpressureController>,
    inner: Mutex<Inner>,
}

impl StateStore {
    /// Create an empty store sharing the given pending-frame counter
    /// (needed so [`clear`](Self::clear) can reset it).
    pub fn new(backpressure: Arc<BackpressureController>) -> Self {
        Self {
            backpressure,
            inner: Mutex::new(Inner {
                connection: ConnectionState::default(),
                fps: 0.0,
                frames: ChannelFrames::default(),
                result: None,
                next_id: 0,
                subscribers: Vec::new(),
            }),
        }
    }

    fn lock(&self) -> std::sync::MutexGuard<'_, Inner> {
        self.inner.lock().expect("state store mutex poisoned")
    }

    // ── Subscription ─────────────────────────────────────────────

    /// Register a display consumer.
    ///
    /// The current snapshot is delivered synchronously before this
    /// returns, so late subscribers are never blind to current state.
    pub fn subscribe(&self, mut callback: SubscriberFn) -> SubscriptionId {
        let mut inner = self.lock();
        let id = inner.next_id;
        inner.next_id += 1;

        let snapshot = Self::snapshot_of(&inner);
        if let Err(e) = callback(snapshot) {
            warn!("subscriber {id} failed on initial snapshot: {e}");
        }

        inner.subscribers.push((id, callback));
        SubscriptionId(id)
    }

    /// Remove a subscriber. Unknown ids are ignored.
    pub fn unsubscribe(&self, id: SubscriptionId) {
        self.lock().subscribers.retain(|(sid, _)| *sid != id.0);
    }

    /// Number of registered subscribers.
    pub fn subscriber_count(&self) -> usize {
        self.lock().subscribers.len()
    }

    // ── Reads ────────────────────────────────────────────────────

    /// Current connection state (read every capture tick).
    pub fn connection_state(&self) -> ConnectionState {
        self.lock().connection
    }

    /// Current immutable copy of the store.
    pub fn snapshot(&self) -> Snapshot {
        Self::snapshot_of(&self.lock())
    }

    // ── Mutation (connection manager only) ───────────────────────

    /// Apply a connection state-machine transition and publish the
    /// new snapshot on success.
    pub fn update_connection(
        &self,
        f: impl FnOnce(&mut ConnectionState) -> Result<(), StreamError>,
    ) -> Result<(), StreamError> {
        let mut inner = self.lock();
        f(&mut inner.connection)?;
        Self::notify_locked(&mut inner);
        Ok(())
    }

    /// Force the connection state to `Closed` and publish.
    pub fn set_closed(&self) {
        let mut inner = self.lock();
        inner.connection.force_closed();
        Self::notify_locked(&mut inner);
    }

    /// Merge a result payload: last-write-wins per field, absent
    /// fields untouched. Publishes the merged snapshot.
    pub fn apply_result(&self, payload: ResultPayload) {
        let mut inner = self.lock();

        if let Some(frame) = payload.frame_object {
            inner.frames.object = Some(frame);
        }
        if let Some(frame) = payload.frame_pose {
            inner.frames.pose = Some(frame);
        }
        if payload.detections.is_some() || payload.posture.is_some() {
            let result = inner.result.get_or_insert_with(AnalysisResult::default);
            if payload.detections.is_some() {
                result.detections = payload.detections;
            }
            if payload.posture.is_some() {
                result.posture = payload.posture;
            }
        }
        if let Some(fps) = payload.fps {
            inner.fps = fps;
        }

        Self::notify_locked(&mut inner);
    }

    /// Reset frames, result, throughput, and the pending counter to
    /// empty/zero and publish — without altering connection state.
    ///
    /// Used when a consumer stops monitoring but wants the connection
    /// to remain idle-open.
    pub fn clear(&self) {
        self.backpressure.reset();
        let mut inner = self.lock();
        inner.frames = ChannelFrames::default();
        inner.result = None;
        inner.fps = 0.0;
        Self::notify_locked(&mut inner);
    }

    // ── Internal ─────────────────────────────────────────────────

    fn snapshot_of(inner: &Inner) -> Snapshot {
        Snapshot {
            connection: inner.connection,
            fps: inner.fps,
            frames: inner.frames.clone(),
            result: inner.result.clone(),
        }
    }

    /// Deliver a fresh snapshot to every subscriber in registration
    /// order. A failing callback is logged and skipped.
    fn notify_locked(inner: &mut Inner) {
        let snapshot = Self::snapshot_of(inner);
        for (id, callback) in inner.subscribers.iter_mut() {
            if let Err(e) = callback(snapshot.clone()) {
                warn!("subscriber {id} failed: {e}");
            }
        }
    }
}

impl std::fmt::Debug for StateStore {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        let inner = self.lock();
        f.debug_struct("StateStore")
            .field("connection", &inner.connection)
            .field("fps", &inner.fps)
            .field("subscribers", &inner.subscribers.len())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
