//! Wire protocol for the analysis service connection.
//!
//! JSON messages over a single persistent duplex WebSocket, tagged by
//! a `"type"` field:
//!
//! Outbound:
//! - `{"type": "ping"}` — heartbeat, sent every 10 s while open.
//! - `{"type": "frame", "frame": "<jpeg-data-uri>"}` — one per
//!   dispatched capture.
//!
//! Inbound:
//! - `{"type": "pong"}` — heartbeat acknowledgment.
//! - `{"type": "result", ...}` — any subset of annotated fields.
//! - `{"type": "error", "message": "..."}` — application-level error;
//!   does not affect the connection.

use serde::{Deserialize, Serialize};

use crate::error::StreamError;

// ── Outbound ─────────────────────────────────────────────────────

/// Messages sent from the client to the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ClientMessage {
    /// Connection-health heartbeat.
    Ping,
    /// A captured frame as a `data:image/jpeg;base64,…` URI.
    Frame { frame: String },
}

impl ClientMessage {
    /// Serialize to the JSON wire form.
    pub fn to_wire(&self) -> Result<String, StreamError> {
        Ok(serde_json::to_string(self)?)
    }
}

// ── Inbound ──────────────────────────────────────────────────────

/// Messages received from the analysis service.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
#[serde(tag = "type", rename_all = "lowercase")]
pub enum ServerMessage {
    /// Heartbeat acknowledgment. No state change.
    Pong,
    /// Annotated analysis output. Absent fields leave the previous
    /// store values untouched.
    Result(ResultPayload),
    /// Backend-reported application error. Logged, never a transport
    /// failure.
    Error { message: String },
}

impl ServerMessage {
    /// Parse an inbound text payload.
    pub fn from_wire(text: &str) -> Result<Self, StreamError> {
        Ok(serde_json::from_str(text)?)
    }
}

/// Payload of a `result` message. Every field is optional — the
/// service sends whatever its pipeline produced for that frame.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct ResultPayload {
    /// Object-detection overlay frame as a JPEG data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_object: Option<String>,
    /// Pose-estimation overlay frame as a JPEG data URI.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub frame_pose: Option<String>,
    /// Detected objects in the analyzed frame.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub detections: Option<Vec<Detection>>,
    /// Ergonomic posture assessment.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub posture: Option<Posture>,
    /// Service-side throughput estimate in results/second, stored
    /// verbatim by the client.
    #[serde(skip_serializing_if = "Option::is_none")]
    pub fps: Option<f64>,
}

// ── Analysis payloads ────────────────────────────────────────────

/// A single object detection.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    /// Bounding box as `[x1, y1, x2, y2]` pixel coordinates.
    pub bbox: [i32; 4],
    /// Detector confidence in `0.0..=1.0`.
    pub conf: f32,
    /// Model class index.
    pub class_id: i32,
}

/// RULA/REBA ergonomic posture assessment.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Posture {
    /// Rapid Upper Limb Assessment (1–7 scale).
    pub rula: AssessmentScore,
    /// Rapid Entire Body Assessment (1–15 scale).
    pub reba: AssessmentScore,
}

/// One ergonomic score with its qualitative risk band.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct AssessmentScore {
    pub score: u8,
    /// Risk band, e.g. "low", "medium", "high".
    pub risk: String,
}

// ── Tests ────────────────────────────────────────────────────────
