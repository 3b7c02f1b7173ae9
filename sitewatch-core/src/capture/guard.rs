//! Exclusive-ownership wrapper around the capture device.
//!
//! `is_streaming` is the single authoritative flag the capture loop
//! reads every tick; it alone distinguishes "user wants streaming"
//! from "device acquired". The guard releases the device explicitly
//! on every stop path, including `Drop`, so teardown never leaves a
//! hardware indicator lit.

use std::sync::Mutex;

use tokio::sync::watch;
use tracing::{debug, info};

use crate::capture::device::{CaptureBackend, CaptureConfig, CaptureDevice, RawFrame};
use crate::error::StreamError;

/// Exclusive owner of the capture device and the streaming flag.
pub struct CaptureGuard {
    backend: Box<dyn CaptureBackend>,
    config: CaptureConfig,
    device: Mutex<Option<Box<dyn CaptureDevice>>>,
    streaming: watch::Sender<bool>,
}

impl CaptureGuard {
    /// Create a guard that will acquire devices from `backend`.
    pub fn new(backend: Box<dyn CaptureBackend>, config: CaptureConfig) -> Self {
        let (streaming, _) = watch::channel(false);
        Self {
            backend,
            config,
            device: Mutex::new(None),
            streaming,
        }
    }

    fn device_lock(&self) -> std::sync::MutexGuard<'_, Option<Box<dyn CaptureDevice>>> {
        self.device.lock().expect("capture device mutex poisoned")
    }

    /// Acquire the device and raise the streaming flag.
    ///
    /// If the device is already held, only the flag changes. Fails
    /// with [`StreamError::DeviceUnavailable`] when acquisition is
    /// denied; streaming never begins in that case.
    pub fn start(&self) -> Result<(), StreamError> {
        let mut device = self.device_lock();
        if device.is_none() {
            *device = Some(self.backend.open(&self.config)?);
            info!(
                "capture device acquired ({}x{})",
                self.config.width, self.config.height
            );
        }
        self.streaming.send_replace(true);
        Ok(())
    }

    /// Lower the streaming flag and release the device.
    ///
    /// Idempotent: safe to call repeatedly and on teardown paths.
    pub fn stop(&self) {
        let was_streaming = self.streaming.send_replace(false);
        if let Some(mut device) = self.device_lock().take() {
            device.release();
            info!("capture device released");
        } else if was_streaming {
            debug!("stop with no device held");
        }
    }

    /// The authoritative streaming flag, read every capture tick.
    pub fn is_streaming(&self) -> bool {
        *self.streaming.borrow()
    }

    /// Observe streaming-flag changes (used by the connection manager
    /// to gate reconnection).
    pub fn streaming_changes(&self) -> watch::Receiver<bool> {
        self.streaming.subscribe()
    }

    /// Whether the held device reports a ready frame of non-zero
    /// dimensions. `false` when no device is held.
    pub fn frame_ready(&self) -> bool {
        self.device_lock()
            .as_ref()
            .map(|d| d.frame_ready())
            .unwrap_or(false)
    }

    /// Grab the freshest frame from the held device.
    pub fn capture_frame(&self) -> Result<RawFrame, StreamError> {
        match self.device_lock().as_mut() {
            Some(device) => device.capture(),
            None => Err(StreamError::NoFrame),
        }
    }
}

impl Drop for CaptureGuard {
    fn drop(&mut self) {
        self.stop();
    }
}

impl std::fmt::Debug for CaptureGuard {
    fn fmt(&self, f: &mut std::fmt::Formatter<'_>) -> std::fmt::Result {
        f.debug_struct("CaptureGuard")
            .field("streaming", &self.is_streaming())
            .field("device_held", &self.device_lock().is_some())
            .finish()
    }
}

// ── Tests ────────────────────────────────────────────────────────
