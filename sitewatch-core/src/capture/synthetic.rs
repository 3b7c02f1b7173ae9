//! Synthetic capture device.
//!
//! Produces a deterministic moving gradient so the full pipeline can
//! run on machines with no camera, and so tests get reproducible
//! pixels. Stands in for the platform camera stack, which is an
//! external collaborator of the streaming core.

use bytes::Bytes;

use crate::capture::device::{CaptureBackend, CaptureConfig, CaptureDevice, RawFrame};
use crate::error::StreamError;

/// Backend producing [`SyntheticDevice`]s. Acquisition never fails.
pub struct SyntheticBackend;

impl CaptureBackend for SyntheticBackend {
    fn open(&self, config: &CaptureConfig) -> Result<Box<dyn CaptureDevice>, StreamError> {
        if config.width == 0 || config.height == 0 {
            return Err(StreamError::DeviceUnavailable(
                "zero-dimension capture requested".into(),
            ));
        }
        Ok(Box::new(SyntheticDevice::new(*config)))
    }
}

/// Deterministic test-pattern device.
pub struct SyntheticDevice {
    config: CaptureConfig,
    /// Advances one step per captured frame, shifting the pattern.
    frame_counter: u64,
    released: bool,
}

impl SyntheticDevice {
    pub fn new(config: CaptureConfig) -> Self {
        Self {
            config,
            frame_counter: 0,
            released: false,
        }
    }

    /// Frames captured so far.
    pub fn frames_captured(&self) -> u64 {
        self.frame_counter
    }
}

impl CaptureDevice for SyntheticDevice {
    fn frame_ready(&self) -> bool {
        !self.released
    }

    fn capture(&mut self) -> Result<RawFrame, StreamError> {
        if self.released {
            return Err(StreamError::NoFrame);
        }

        let (w, h) = (self.config.width, self.config.height);
        let shift = (self.frame_counter % 256) as u8;
        self.frame_counter += 1;

        let mut data = Vec::with_capacity((w * h * 3) as usize);
        for y in 0..h {
            for x in 0..w {
                data.push((x as u8).wrapping_add(shift));
                data.push((y as u8).wrapping_add(shift));
                data.push(shift);
            }
        }

        Ok(RawFrame {
            width: w,
            height: h,
            data: Bytes::from(data),
        })
    }

    fn release(&mut self) {
        self.released = true;
    }
}

// ── Tests ────────────────────────────────────────────────────────
