//! Capture device abstraction.
//!
//! The streaming core never talks to camera hardware directly; it
//! goes through these traits so tests and headless environments can
//! inject a fake device.

use bytes::Bytes;

use crate::error::StreamError;

/// Requested capture geometry.
#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub struct CaptureConfig {
    /// Target capture width in pixels.
    pub width: u32,
    /// Target capture height in pixels.
    pub height: u32,
}

impl Default for CaptureConfig {
    fn default() -> Self {
        Self {
            width: 640,
            height: 480,
        }
    }
}

/// One raw frame as tightly-packed RGB8 pixels.
#[derive(Debug, Clone, PartialEq)]
pub struct RawFrame {
    pub width: u32,
    pub height: u32,
    /// `width * height * 3` bytes, row-major RGB.
    pub data: Bytes,
}

impl RawFrame {
    /// Whether the frame has non-zero dimensions and a matching
    /// pixel buffer.
    pub fn is_valid(&self) -> bool {
        self.width > 0
            && self.height > 0
            && self.data.len() == (self.width * self.height * 3) as usize
    }
}

/// An acquired capture device.
///
/// The guard calls [`release`](Self::release) explicitly on every
/// stop path — hardware must not be left running merely because the
/// handle was dropped.
pub trait CaptureDevice: Send {
    /// Whether a frame of non-zero dimensions is ready right now.
    fn frame_ready(&self) -> bool;

    /// Grab the freshest frame. Transient failures (device
    /// mid-reconfiguration) surface as errors and are retried on the
    /// next tick.
    fn capture(&mut self) -> Result<RawFrame, StreamError>;

    /// Stop every underlying stream and release the hardware.
    /// Must be idempotent.
    fn release(&mut self);
}

/// Opens capture devices. The injectable seam for tests and for
/// platform-specific camera stacks.
pub trait CaptureBackend: Send + Sync {
    /// Acquire the device exclusively.
    ///
    /// Fails with [`StreamError::DeviceUnavailable`] when acquisition
    /// is denied (permissions, missing hardware, already in use).
    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureDevice>, StreamError>;
}
