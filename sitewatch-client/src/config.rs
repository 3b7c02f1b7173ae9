//! Configuration for the SiteWatch client.

use std::path::Path;

use serde::{Deserialize, Serialize};

use sitewatch_core::{CaptureConfig, StreamConfig};

/// Top-level configuration loaded from a TOML file.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct ClientConfig {
    /// Network settings.
    pub network: NetworkConfig,
    /// Camera capture settings.
    pub capture: CaptureSettings,
    /// Logging settings.
    pub logging: LoggingConfig,
}

/// Network configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct NetworkConfig {
    /// WebSocket endpoint of the analysis service.
    pub endpoint: String,
}

/// Camera capture configuration.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct CaptureSettings {
    /// Capture width in pixels.
    pub width: u32,
    /// Capture height in pixels.
    pub height: u32,
    /// JPEG quality for outbound frames (1-100).
    pub jpeg_quality: u8,
    /// Capture loop tick rate in Hz.
    pub tick_hz: u32,
}

/// Logging settings.
#[derive(Debug, Clone, Serialize, Deserialize)]
#[serde(default)]
pub struct LoggingConfig {
    /// Log level: "trace", "debug", "info", "warn", "error".
    pub level: String,
    /// Optional log file path. If empty, logs to stderr.
    pub file: String,
}

// ── Defaults ─────────────────────────────────────────────────────

impl Default for ClientConfig {
    fn default() -> Self {
        Self {
            network: NetworkConfig::default(),
            capture: CaptureSettings::default(),
            logging: LoggingConfig::default(),
        }
    }
}

impl Default for NetworkConfig {
    fn default() -> Self {
        Self {
            endpoint: sitewatch_core::DEFAULT_ENDPOINT.into(),
        }
    }
}

impl Default for CaptureSettings {
    fn default() -> Self {
        let capture = CaptureConfig::default();
        Self {
            width: capture.width,
            height: capture.height,
            jpeg_quality: sitewatch_core::JPEG_QUALITY,
            tick_hz: sitewatch_core::TICK_HZ,
        }
    }
}

impl Default for LoggingConfig {
    fn default() -> Self {
        Self {
            level: "info".into(),
            file: String::new(),
        }
    }
}

// ── Loading ──────────────────────────────────────────────────────

impl ClientConfig {
    /// Load configuration from a TOML file, falling back to defaults.
    pub fn load(path: &Path) -> Self {
        match std::fs::read_to_string(path) {
            Ok(contents) => toml::from_str(&contents).unwrap_or_else(|e| {
                tracing::warn!("invalid config {}: {e}; using defaults", path.display());
                Self::default()
            }),
            Err(_) => {
                tracing::info!("no config at {}; using defaults", path.display());
                Self::default()
            }
        }
    }

    /// Write the default configuration to a file (for bootstrapping).
    pub fn write_default(path: &Path) -> std::io::Result<()> {
        let cfg = Self::default();
        let text = toml::to_string_pretty(&cfg).map_err(std::io::Error::other)?;
        std::fs::write(path, text)
    }

    /// Convert into the core stream configuration.
    pub fn to_stream_config(&self) -> StreamConfig {
        StreamConfig {
            endpoint: self.network.endpoint.clone(),
            capture: CaptureConfig {
                width: self.capture.width.max(1),
                height: self.capture.height.max(1),
            },
            jpeg_quality: self.capture.jpeg_quality.clamp(1, 100),
            tick_hz: self.capture.tick_hz.clamp(1, 240),
        }
    }
}

// ── Tests ────────────────────────────────────────────────────────
