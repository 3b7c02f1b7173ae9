//! Capture device ownership and frame acquisition.
//!
//! - [`CaptureDevice`] / [`CaptureBackend`]: the seam between the
//!   streaming core and real camera hardware.
//! - [`CaptureGuard`]: exclusive owner of the acquired device and of
//!   the authoritative `is_streaming` flag.
//! - [`SyntheticBackend`]: deterministic stand-in device for
//!   development and tests.

pub mod device;
pub mod guard;
pub mod synthetic;

pub use device::{CaptureBackend, CaptureConfig, CaptureDevice, RawFrame};
pub use guard::CaptureGuard;
pub use synthetic::{SyntheticBackend, SyntheticDevice};
