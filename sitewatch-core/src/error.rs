//! Domain-specific error types for the SiteWatch streaming client.
//!
//! All fallible operations return `Result<T, StreamError>`.
//! No panics on invalid input — every error is typed and recoverable.

use thiserror::Error;

/// The canonical error type for the streaming client.
#[derive(Debug, Error)]
pub enum StreamError {
    // ── Connection Errors ────────────────────────────────────────
    /// A send was attempted while the connection is not open.
    ///
    /// Non-fatal: the caller skips its bookkeeping for that attempt.
    #[error("not connected")]
    NotConnected,

    /// The connection state machine rejected a transition.
    #[error("invalid state transition: {0}")]
    InvalidTransition(&'static str),

    /// The WebSocket layer reported an error.
    #[error("transport error: {0}")]
    Transport(#[from] tokio_tungstenite::tungstenite::Error),

    /// The TCP/IO layer reported an error.
    #[error("connection error: {0}")]
    Connection(#[from] std::io::Error),

    /// An mpsc channel was closed unexpectedly.
    #[error("channel closed")]
    ChannelClosed,

    // ── Protocol Errors ──────────────────────────────────────────
    /// An inbound payload could not be parsed as a protocol message.
    ///
    /// Malformed payloads are logged and dropped; they never
    /// disconnect the transport.
    #[error("malformed message: {0}")]
    Malformed(#[from] serde_json::Error),

    // ── Capture Errors ───────────────────────────────────────────
    /// The capture device could not be acquired (permissions, missing
    /// hardware, already in use).
    #[error("capture device unavailable: {0}")]
    DeviceUnavailable(String),

    /// The device produced no encodable frame this tick.
    #[error("no frame available")]
    NoFrame,

    /// JPEG encoding of a captured frame failed.
    #[error("encoding error: {0}")]
    Encoding(String),

    // ── Store Errors ─────────────────────────────────────────────
    /// A subscriber callback failed during snapshot delivery.
    ///
    /// Isolated per subscriber; delivery continues to the rest.
    #[error("subscriber error: {0}")]
    Subscriber(String),

    /// Catch-all for errors that do not fit another variant.
    #[error("{0}")]
    Other(String),
}

// ── Convenient From implementations ──────────────────────────────

impl From<String> for StreamError {
    fn from(s: String) -> Self {
        StreamError::Other(s)
    }
}

impl From<&str> for StreamError {
    fn from(s: &str) -> Self {
        StreamError::Other(s.to_string())
    }
}

impl<T> From<tokio::sync::mpsc::error::SendError<T>> for StreamError {
    fn from(_: tokio::sync::mpsc::error::SendError<T>) -> Self {
        StreamError::ChannelClosed
    }
}

impl From<image::ImageError> for StreamError {
    fn from(e: image::ImageError) -> Self {
        StreamError::Encoding(e.to_string())
    }
}
