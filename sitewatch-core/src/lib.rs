//! Core streaming client for the construction-site safety monitor.
//!
//! Captures camera frames, encodes them as JPEG data URIs, and streams
//! them over a WebSocket to the analysis service, which answers with
//! detection and posture results. The crate is organized around a few
//! cooperating pieces:
//!
//! * [`service::StreamService`] — the top-level facade wiring
//!   everything together and owning the background tasks.
//! * [`connection::ConnectionManager`] — the single connection, its
//!   lifecycle state machine, heartbeat, and reconnection policy.
//! * [`sender::FrameSender`] — the gated capture loop.
//! * [`store::StateStore`] — snapshot broadcast to display consumers.
//! * [`backpressure::BackpressureController`] — the in-flight frame
//!   ceiling that keeps the client from outrunning the analyzer.
//! * [`capture`] — device abstraction, exclusive-ownership guard, and
//!   a synthetic device for headless use.

pub mod backpressure;
pub mod capture;
pub mod connection;
pub mod encoder;
pub mod error;
pub mod protocol;
pub mod sender;
pub mod service;
pub mod state;
pub mod store;
pub mod transport;

#[cfg(test)]
mod testutil;

pub use backpressure::{BackpressureController, PENDING_CEILING};
pub use capture::{CaptureBackend, CaptureConfig, CaptureDevice, CaptureGuard, RawFrame};
pub use connection::{ConnectionManager, HEARTBEAT_INTERVAL, RECONNECT_DELAY};
pub use encoder::{FrameEncoder, JPEG_QUALITY};
pub use error::StreamError;
pub use protocol::{ClientMessage, Detection, Posture, ResultPayload, ServerMessage};
pub use sender::{FrameSender, SEND_MIN_INTERVAL, TICK_HZ};
pub use service::{DEFAULT_ENDPOINT, StreamConfig, StreamService};
pub use state::ConnectionState;
pub use store::{Snapshot, StateStore, SubscriberFn, SubscriptionId};
pub use transport::{Connector, Transport, WsConnector};
