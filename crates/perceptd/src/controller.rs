//! Camera controller — serialized facing toggles and user actions.
//!
//! A dedicated thread owns the capture session and processes commands
//! one at a time, so two rapid toggles can never race into two open
//! streams. This is the only path that can move the permission gate
//! out of `Denied`.

use crate::gate::GateState;
use crate::registry::ModelRegistry;
use crate::session::{CaptureSession, StreamBackend};
use percept_core::DetectionSet;
use percept_hw::FacingMode;
use std::sync::Arc;
use thiserror::Error;
use tokio::sync::{mpsc, oneshot, watch};

#[derive(Error, Debug)]
pub enum ControllerError {
    #[error("controller thread exited")]
    ChannelClosed,
}

/// Daemon status snapshot for the D-Bus `Status` call.
#[derive(Debug, Clone)]
pub struct Status {
    pub state: GateState,
    pub requested_facing: FacingMode,
    pub models_ready: bool,
}

/// Messages sent from D-Bus handlers to the controller thread.
enum Command {
    ToggleFacing {
        reply: oneshot::Sender<GateState>,
    },
    ClearDetections {
        reply: oneshot::Sender<()>,
    },
    Status {
        reply: oneshot::Sender<Status>,
    },
    Shutdown {
        reply: oneshot::Sender<()>,
    },
}

/// Clone-safe handle to the controller thread.
#[derive(Clone)]
pub struct ControllerHandle {
    tx: mpsc::Sender<Command>,
}

impl ControllerHandle {
    /// Stop the current stream (if any), flip the facing mode, and
    /// attempt reacquisition. Returns the resulting gate state.
    pub async fn toggle_facing(&self) -> Result<GateState, ControllerError> {
        self.request(|reply| Command::ToggleFacing { reply }).await
    }

    /// Publish an empty detection set, independent of the timer.
    pub async fn clear_detections(&self) -> Result<(), ControllerError> {
        self.request(|reply| Command::ClearDetections { reply }).await
    }

    pub async fn status(&self) -> Result<Status, ControllerError> {
        self.request(|reply| Command::Status { reply }).await
    }

    /// Stop the stream and end the controller thread.
    pub async fn shutdown(&self) -> Result<(), ControllerError> {
        self.request(|reply| Command::Shutdown { reply }).await
    }

    async fn request<T>(
        &self,
        make: impl FnOnce(oneshot::Sender<T>) -> Command,
    ) -> Result<T, ControllerError> {
        let (reply_tx, reply_rx) = oneshot::channel();
        self.tx
            .send(make(reply_tx))
            .await
            .map_err(|_| ControllerError::ChannelClosed)?;
        reply_rx.await.map_err(|_| ControllerError::ChannelClosed)
    }
}

/// Spawn the controller on a dedicated OS thread.
///
/// Performs the initial acquisition for `initial_facing`, then enters
/// the command loop. Stream opens are blocking device work, which is
/// why this runs off the async executor.
pub fn spawn_controller<B: StreamBackend>(
    mut session: CaptureSession<B>,
    registry: Arc<ModelRegistry>,
    detections_tx: watch::Sender<DetectionSet>,
    initial_facing: FacingMode,
) -> ControllerHandle {
    let (tx, mut rx) = mpsc::channel::<Command>(4);

    std::thread::Builder::new()
        .name("percept-controller".into())
        .spawn(move || {
            let mut facing = initial_facing;
            match session.open(facing) {
                Ok(()) => tracing::info!(facing = %facing, "camera acquired"),
                Err(e) => {
                    tracing::warn!(error = %e, facing = %facing, "initial camera acquisition failed")
                }
            }

            while let Some(cmd) = rx.blocking_recv() {
                match cmd {
                    Command::ToggleFacing { reply } => {
                        session.stop();
                        facing = facing.flip();
                        match session.open(facing) {
                            Ok(()) => tracing::info!(facing = %facing, "camera facing switched"),
                            Err(e) => {
                                tracing::warn!(error = %e, facing = %facing, "facing switch failed")
                            }
                        }
                        let _ = reply.send(session.state());
                    }
                    Command::ClearDetections { reply } => {
                        detections_tx.send_replace(DetectionSet::empty());
                        tracing::info!("detections cleared");
                        let _ = reply.send(());
                    }
                    Command::Status { reply } => {
                        let _ = reply.send(Status {
                            state: session.state(),
                            requested_facing: facing,
                            models_ready: registry.is_ready(),
                        });
                    }
                    Command::Shutdown { reply } => {
                        session.stop();
                        let _ = reply.send(());
                        break;
                    }
                }
            }
            tracing::info!("controller exiting");
        })
        .expect("failed to spawn controller thread");

    ControllerHandle { tx }
}
