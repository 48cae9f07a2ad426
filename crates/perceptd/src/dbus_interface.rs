use crate::controller::ControllerHandle;
use crate::gate::GateState;
use percept_core::DetectionSet;
use tokio::sync::watch;
use zbus::interface;

/// D-Bus interface for the Percept overlay daemon.
///
/// Bus name: org.freedesktop.Percept1
/// Object path: /org/freedesktop/Percept1
///
/// Presentation triggers (`ToggleFacing`, `ClearDetections`) route
/// through the controller; the read calls serve the latest published
/// values, JSON-encoded.
pub struct PerceptService {
    controller: ControllerHandle,
    detections_rx: watch::Receiver<DetectionSet>,
    state_rx: watch::Receiver<GateState>,
}

impl PerceptService {
    pub fn new(
        controller: ControllerHandle,
        detections_rx: watch::Receiver<DetectionSet>,
        state_rx: watch::Receiver<GateState>,
    ) -> Self {
        Self {
            controller,
            detections_rx,
            state_rx,
        }
    }
}

fn internal(e: impl std::fmt::Display) -> zbus::fdo::Error {
    zbus::fdo::Error::Failed(e.to_string())
}

#[interface(name = "org.freedesktop.Percept1")]
impl PerceptService {
    /// Stop the current stream, flip the facing mode, reacquire.
    /// Returns the resulting capture state as JSON.
    async fn toggle_facing(&self) -> zbus::fdo::Result<String> {
        tracing::info!("toggle_facing requested");
        let state = self.controller.toggle_facing().await.map_err(internal)?;
        serde_json::to_string(&state).map_err(internal)
    }

    /// Clear the published detection list.
    async fn clear_detections(&self) -> zbus::fdo::Result<()> {
        tracing::info!("clear_detections requested");
        self.controller.clear_detections().await.map_err(internal)
    }

    /// The current ranked detection list as a JSON array.
    async fn detections(&self) -> zbus::fdo::Result<String> {
        let set = self.detections_rx.borrow().clone();
        serde_json::to_string(&set).map_err(internal)
    }

    /// The current capture/permission state as JSON.
    async fn state(&self) -> zbus::fdo::Result<String> {
        let state = *self.state_rx.borrow();
        serde_json::to_string(&state).map_err(internal)
    }

    /// Daemon status information as JSON.
    async fn status(&self) -> zbus::fdo::Result<String> {
        let status = self.controller.status().await.map_err(internal)?;
        Ok(serde_json::json!({
            "version": env!("CARGO_PKG_VERSION"),
            "state": status.state,
            "requested_facing": status.requested_facing,
            "models_ready": status.models_ready,
            "detections": self.detections_rx.borrow().len(),
        })
        .to_string())
    }
}
