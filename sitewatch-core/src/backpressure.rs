//! Backpressure controller for in-flight frames.
//!
//! Bounds the number of frames believed to be in flight (sent but not
//! yet answered by a result). Pure counter logic — the controller
//! deliberately does not match a specific result to a specific prior
//! send; bounding the count is enough to bound resource use.

use std::sync::atomic::{AtomicU32, Ordering};

/// Maximum in-flight frames before the capture loop goes idle.
pub const PENDING_CEILING: u32 = 2;

/// Counts frames in flight and gates new sends.
///
/// Shared between the connection manager (which records results) and
/// the capture loop (which records dispatches and checks saturation).
#[derive(Debug)]
pub struct BackpressureController {
    /// Frames dispatched whose result has not yet arrived.
    pending: AtomicU32,
    /// Saturation threshold.
    ceiling: u32,
}

impl BackpressureController {
    /// Create a controller with the default ceiling.
    pub fn new() -> Self {
        Self::with_ceiling(PENDING_CEILING)
    }

    /// Create a controller with a custom ceiling.
    pub fn with_ceiling(ceiling: u32) -> Self {
        Self {
            pending: AtomicU32::new(0),
            ceiling,
        }
    }

    /// Record one successfully dispatched frame.
    ///
    /// Call exactly once per send that was actually handed to an open
    /// transport — a send refused with `NotConnected` must not be
    /// recorded.
    pub fn record_dispatch(&self) {
        self.pending.fetch_add(1, Ordering::SeqCst);
    }

    /// Record one inbound result, clamped so the count never goes
    /// below zero.
    pub fn record_result(&self) {
        let _ = self
            .pending
            .fetch_update(Ordering::SeqCst, Ordering::SeqCst, |n| {
                Some(n.saturating_sub(1))
            });
    }

    /// Reset to zero. Called on connection open and on explicit clear.
    pub fn reset(&self) {
        self.pending.store(0, Ordering::SeqCst);
    }

    /// Current in-flight count.
    pub fn pending(&self) -> u32 {
        self.pending.load(Ordering::SeqCst)
    }

    /// Whether new sends should be suppressed.
    pub fn is_saturated(&self) -> bool {
        self.pending() > self.ceiling
    }
}

impl Default for BackpressureController {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn dispatch_and_result_bookkeeping() {
        let bp = BackpressureController::new();
        assert_eq!(bp.pending(), 0);

        bp.record_dispatch();
        bp.record_dispatch();
        assert_eq!(bp.pending(), 2);

        bp.record_result();
        assert_eq!(bp.pending(), 1);
    }

    #[test]
    fn never_negative() {
        let bp = BackpressureController::new();
        bp.record_result();
        bp.record_result();
        assert_eq!(bp.pending(), 0);

        bp.record_dispatch();
        bp.record_result();
        bp.record_result();
        assert_eq!(bp.pending(), 0);
    }

    #[test]
    fn saturation_strictly_above_ceiling() {
        let bp = BackpressureController::new();
        for _ in 0..PENDING_CEILING {
            bp.record_dispatch();
        }
        // At the ceiling the gate still passes.
        assert!(!bp.is_saturated());

        bp.record_dispatch();
        assert!(bp.is_saturated());
    }

    #[test]
    fn reset_clears_count() {
        let bp = BackpressureController::new();
        bp.record_dispatch();
        bp.record_dispatch();
        bp.record_dispatch();
        assert!(bp.is_saturated());

        bp.reset();
        assert_eq!(bp.pending(), 0);
        assert!(!bp.is_saturated());
    }

    #[test]
    fn interleaved_sequences_stay_bounded() {
        let bp = BackpressureController::new();
        for round in 0..100u32 {
            bp.record_dispatch();
            if round % 3 != 0 {
                bp.record_result();
            }
            // Extra results must clamp, not underflow.
            bp.record_result();
            bp.record_result();
        }
        assert_eq!(bp.pending(), 0);
    }
}
