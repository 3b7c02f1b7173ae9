//! Console application: runs the streaming service and logs what the
//! analysis service reports.

use std::sync::{Arc, Mutex};

use tracing::{info, warn};

use sitewatch_core::{
    CaptureBackend, ConnectionState, Snapshot, StreamError, StreamService, SubscriptionId,
};

use crate::config::ClientConfig;

/// The console monitor: owns the service and a logging subscriber.
pub struct ClientApp {
    service: Arc<StreamService>,
    subscription: SubscriptionId,
}

impl ClientApp {
    /// Build the service from config and attach the console reporter.
    pub fn new(config: &ClientConfig, backend: Box<dyn CaptureBackend>) -> Self {
        let service = Arc::new(StreamService::new(config.to_stream_config(), backend));
        let subscription = service.subscribe(Box::new(reporter()));
        Self {
            service,
            subscription,
        }
    }

    /// The underlying service.
    pub fn service(&self) -> &StreamService {
        &self.service
    }

    /// Stream until Ctrl-C, then tear everything down.
    pub async fn run(self) -> Result<(), StreamError> {
        self.service.start()?;

        tokio::signal::ctrl_c().await.ok();
        info!("shutting down");

        self.service.unsubscribe(self.subscription);
        self.service.shutdown();
        Ok(())
    }
}

/// Snapshot subscriber that logs changes, not every delivery.
fn reporter() -> impl FnMut(Snapshot) -> Result<(), StreamError> + Send {
    let last: Mutex<Option<Snapshot>> = Mutex::new(None);
    move |snap: Snapshot| {
        let mut last = last.lock().expect("reporter mutex poisoned");
        let previous = last.replace(snap.clone());

        if previous.as_ref().map(|p| p.connection) != Some(snap.connection) {
            match snap.connection {
                ConnectionState::Open => info!("connected to analysis service"),
                ConnectionState::Connecting => info!("connecting..."),
                ConnectionState::Closed => info!("disconnected"),
                ConnectionState::Error => warn!("connection error"),
            }
        }

        let prev_result = previous.as_ref().and_then(|p| p.result.as_ref());
        if let Some(result) = &snap.result {
            if prev_result != Some(result) {
                if let Some(detections) = &result.detections {
                    info!(
                        count = detections.len(),
                        fps = snap.fps,
                        "detections updated"
                    );
                }
                if let Some(posture) = &result.posture {
                    info!(
                        rula = posture.rula.score,
                        rula_risk = %posture.rula.risk,
                        reba = posture.reba.score,
                        reba_risk = %posture.reba.risk,
                        "posture assessment updated"
                    );
                }
            }
        }
        Ok(())
    }
}

// ── Tests ────────────────────────────────────────────────────────

#[cfg(test)]
mod tests {
    use super::*;
    use sitewatch_core::capture::SyntheticBackend;

    #[tokio::test]
    async fn app_builds_and_shuts_down() {
        let app = ClientApp::new(&ClientConfig::default(), Box::new(SyntheticBackend));
        assert!(!app.service().is_streaming());
        app.service().shutdown();
    }

    #[test]
    fn reporter_tolerates_repeated_snapshots() {
        let mut report = reporter();
        let snap = Snapshot::default();
        report(snap.clone()).unwrap();
        report(snap).unwrap();
    }
}
