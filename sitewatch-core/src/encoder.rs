//! JPEG wire encoding for captured frames.
//!
//! Frames cross the wire as `data:image/jpeg;base64,…` URIs inside a
//! `frame` message — a size-efficient compressed still-image form the
//! analysis service decodes with its own vision stack.

use base64::Engine as _;
use base64::engine::general_purpose::STANDARD as BASE64;
use image::ExtendedColorType;
use image::codecs::jpeg::JpegEncoder;

use crate::capture::RawFrame;
use crate::error::StreamError;

/// Default JPEG quality (the 0.8–0.85 band on a 0–100 scale).
pub const JPEG_QUALITY: u8 = 85;

/// Data-URI prefix for encoded frames.
pub const DATA_URI_PREFIX: &str = "data:image/jpeg;base64,";

/// Encodes RGB frames into the JPEG data-URI wire format.
#[derive(Debug, Clone, Copy)]
pub struct FrameEncoder {
    quality: u8,
}

impl FrameEncoder {
    /// Encoder with the default quality.
    pub fn new() -> Self {
        Self::with_quality(JPEG_QUALITY)
    }

    /// Encoder with an explicit quality, clamped to `1..=100`.
    pub fn with_quality(quality: u8) -> Self {
        Self {
            quality: quality.clamp(1, 100),
        }
    }

    /// Current quality setting.
    pub fn quality(&self) -> u8 {
        self.quality
    }

    /// Encode a raw frame to a `data:image/jpeg;base64,…` URI.
    ///
    /// Fails with [`StreamError::Encoding`] for dimensionless or
    /// short-buffer frames; the capture tick abandons such a frame
    /// silently and retries next tick.
    pub fn encode_data_uri(&self, frame: &RawFrame) -> Result<String, StreamError> {
        if !frame.is_valid() {
            return Err(StreamError::Encoding(format!(
                "unencodable frame: {}x{}, {} bytes",
                frame.width,
                frame.height,
                frame.data.len()
            )));
        }

        let mut jpeg = Vec::new();
        JpegEncoder::new_with_quality(&mut jpeg, self.quality).encode(
            &frame.data,
            frame.width,
            frame.height,
            ExtendedColorType::Rgb8,
        )?;

        let mut uri = String::with_capacity(DATA_URI_PREFIX.len() + jpeg.len() * 4 / 3 + 4);
        uri.push_str(DATA_URI_PREFIX);
        BASE64.encode_string(&jpeg, &mut uri);
        Ok(uri)
    }
}

impl Default for FrameEncoder {
    fn default() -> Self {
        Self::new()
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use crate::capture::{CaptureConfig, CaptureDevice, SyntheticDevice};
    use bytes::Bytes;

    #[test]
    fn encodes_synthetic_frame_to_decodable_jpeg() {
        let mut device = SyntheticDevice::new(CaptureConfig {
            width: 64,
            height: 48,
        });
        let frame = device.capture().unwrap();

        let uri = FrameEncoder::new().encode_data_uri(&frame).unwrap();
        assert!(uri.starts_with(DATA_URI_PREFIX));

        let jpeg = BASE64.decode(&uri[DATA_URI_PREFIX.len()..]).unwrap();
        let decoded = image::load_from_memory(&jpeg).unwrap();
        assert_eq!(decoded.width(), 64);
        assert_eq!(decoded.height(), 48);
    }

    #[test]
    fn rejects_zero_dimension_frame() {
        let frame = RawFrame {
            width: 0,
            height: 48,
            data: Bytes::new(),
        };
        let err = FrameEncoder::new().encode_data_uri(&frame);
        assert!(matches!(err, Err(StreamError::Encoding(_))));
    }

    #[test]
    fn rejects_short_pixel_buffer() {
        let frame = RawFrame {
            width: 16,
            height: 16,
            data: Bytes::from(vec![0u8; 10]),
        };
        assert!(FrameEncoder::new().encode_data_uri(&frame).is_err());
    }

    #[test]
    fn quality_is_clamped() {
        assert_eq!(FrameEncoder::with_quality(0).quality(), 1);
        assert_eq!(FrameEncoder::with_quality(255).quality(), 100);
        assert_eq!(FrameEncoder::new().quality(), JPEG_QUALITY);
    }
}
