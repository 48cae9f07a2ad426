//! Detection fusion engine — the periodic inference cycle.
//!
//! On a fixed-period timer, samples the latest camera frame, runs both
//! models concurrently, fuses their outputs, and publishes the ranked
//! result. Ticks that fail their precondition (models not ready, no
//! open stream, no frame delivered yet) leave the published set
//! untouched.

use crate::registry::ModelRegistry;
use crate::session::FrameSource;
use percept_core::{fuse, DetectionSet, InferenceError, ObjectDetector, SceneClassifier};
use percept_hw::Frame;
use std::sync::Arc;
use std::time::Duration;
use tokio::sync::watch;
use tokio::time::MissedTickBehavior;

pub struct FusionEngine<S: FrameSource + 'static> {
    registry: Arc<ModelRegistry>,
    source_rx: watch::Receiver<Option<Arc<S>>>,
    detections_tx: watch::Sender<DetectionSet>,
    period: Duration,
}

impl<S: FrameSource + 'static> FusionEngine<S> {
    pub fn new(
        registry: Arc<ModelRegistry>,
        source_rx: watch::Receiver<Option<Arc<S>>>,
        detections_tx: watch::Sender<DetectionSet>,
        period: Duration,
    ) -> Self {
        Self {
            registry,
            source_rx,
            detections_tx,
            period,
        }
    }

    pub fn spawn(self) -> tokio::task::JoinHandle<()> {
        tokio::spawn(self.run())
    }

    async fn run(self) {
        tracing::info!(period_ms = self.period.as_millis() as u64, "fusion engine started");
        let mut ticker = tokio::time::interval(self.period);
        // A starved executor must not burst-fire a backlog of ticks.
        ticker.set_missed_tick_behavior(MissedTickBehavior::Skip);

        loop {
            ticker.tick().await;
            self.on_tick();
        }
    }

    /// One timer firing.
    ///
    /// Never waits on inference: an eligible tick spawns its work and
    /// the timer keeps firing, so slow inference overlaps the next
    /// tick. Overlapping publishes race and the last to complete wins.
    fn on_tick(&self) {
        let Some((scene, object)) = self.registry.models() else {
            return;
        };
        let Some(frame) = current_frame(&self.source_rx) else {
            return;
        };

        tokio::spawn(run_inference(
            scene,
            object,
            frame,
            self.source_rx.clone(),
            self.detections_tx.clone(),
        ));
    }
}

/// The latest frame of the current source, if a stream is open and has
/// delivered one.
fn current_frame<S: FrameSource>(source_rx: &watch::Receiver<Option<Arc<S>>>) -> Option<Frame> {
    let source = source_rx.borrow().clone()?;
    source.latest_frame()
}

/// Run both models against one frame, fuse, publish.
///
/// The two calls are independently scheduled blocking tasks joined
/// before the merge. Any failure discards the whole tick's result and
/// keeps the previously published set.
async fn run_inference<S: FrameSource + 'static>(
    scene: Arc<dyn SceneClassifier>,
    object: Arc<dyn ObjectDetector>,
    frame: Frame,
    source_rx: watch::Receiver<Option<Arc<S>>>,
    detections_tx: watch::Sender<DetectionSet>,
) {
    let object_frame = frame.clone();
    let scene_task = tokio::task::spawn_blocking(move || {
        scene.classify(&frame.data, frame.width, frame.height)
    });
    let object_task = tokio::task::spawn_blocking(move || {
        object.detect(&object_frame.data, object_frame.width, object_frame.height)
    });

    let (scene_res, object_res) = tokio::join!(scene_task, object_task);

    let (scene_out, object_out) = match (unwrap_call(scene_res), unwrap_call(object_res)) {
        (Ok(s), Ok(o)) => (s, o),
        (Err(e), _) | (_, Err(e)) => {
            tracing::warn!(error = %e, "tick discarded, keeping previous detections");
            return;
        }
    };

    let set = fuse(scene_out, object_out);

    // Precondition re-check at publish time: a result landing after
    // the stream was stopped (toggle or teardown) is discarded.
    if source_rx.borrow().is_none() {
        tracing::debug!("discarding result for a stopped stream");
        return;
    }

    tracing::debug!(detections = set.len(), "publishing detections");
    detections_tx.send_replace(set);
}

fn unwrap_call<T>(
    res: Result<Result<T, InferenceError>, tokio::task::JoinError>,
) -> Result<T, String> {
    match res {
        Ok(Ok(v)) => Ok(v),
        Ok(Err(e)) => Err(e.to_string()),
        Err(e) => Err(format!("inference task panicked: {e}")),
    }
}
