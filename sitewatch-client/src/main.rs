//! SiteWatch client — entry point.
//!
//! ```text
//! sitewatch-client                  Stream with defaults
//! sitewatch-client --config <path>  Load a custom config TOML
//! sitewatch-client --gen-config     Write default config to stdout
//! ```

use std::path::PathBuf;

use clap::Parser;
use tracing::info;
use tracing_subscriber::EnvFilter;

use sitewatch_client::app::ClientApp;
use sitewatch_client::config::ClientConfig;
use sitewatch_core::capture::SyntheticBackend;

// ── CLI ──────────────────────────────────────────────────────────

#[derive(Parser, Debug)]
#[command(name = "sitewatch-client", about = "SiteWatch safety-monitor streaming client")]
struct Cli {
    /// Path to configuration TOML file.
    #[arg(short, long, default_value = "sitewatch-client.toml")]
    config: PathBuf,

    /// Print the default configuration to stdout and exit.
    #[arg(long)]
    gen_config: bool,
}

// ── Main ─────────────────────────────────────────────────────────

#[tokio::main]
async fn main() -> Result<(), Box<dyn std::error::Error>> {
    let cli = Cli::parse();

    // --gen-config: dump defaults and exit.
    if cli.gen_config {
        let text = toml::to_string_pretty(&ClientConfig::default())?;
        println!("{text}");
        return Ok(());
    }

    // Load config.
    let config = ClientConfig::load(&cli.config);

    // Init tracing.
    let filter = EnvFilter::try_from_default_env()
        .unwrap_or_else(|_| EnvFilter::new(&config.logging.level));
    tracing_subscriber::fmt().with_env_filter(filter).init();

    info!("sitewatch-client v{}", env!("CARGO_PKG_VERSION"));
    info!("endpoint: {}", config.network.endpoint);
    info!(
        "capture: {}x{} @ quality {}",
        config.capture.width, config.capture.height, config.capture.jpeg_quality
    );

    // The synthetic device stands in until a platform camera backend
    // is plugged into `CaptureBackend`.
    let app = ClientApp::new(&config, Box::new(SyntheticBackend));
    app.run().await?;

    Ok(())
}
