//! Test doubles for the capture backend and both model contracts.

use crate::session::{FrameSource, StreamBackend};
use percept_core::classifier::ClassifierError;
use percept_core::detector::DetectorError;
use percept_core::{
    BoundingBox, InferenceError, ObjectDetector, ObjectHit, SceneClass, SceneClassifier,
};
use percept_hw::{CameraError, FacingMode, Frame};
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};

pub fn test_frame(width: u32, height: u32) -> Frame {
    Frame {
        data: vec![0u8; (width * height * 3) as usize],
        width,
        height,
        timestamp: std::time::Instant::now(),
        sequence: 0,
    }
}

pub fn scene(label: &str, probability: f32) -> SceneClass {
    SceneClass {
        label: label.into(),
        probability,
    }
}

pub fn object_hit(label: &str, score: f32) -> ObjectHit {
    ObjectHit {
        label: label.into(),
        score,
        bbox: BoundingBox {
            x: 0.0,
            y: 0.0,
            width: 1.0,
            height: 1.0,
        },
    }
}

/// Scene classifier double: canned results or failure.
pub struct MockScene {
    pub classes: Vec<SceneClass>,
    pub fail: bool,
}

impl MockScene {
    pub fn returning(classes: Vec<SceneClass>) -> Self {
        Self {
            classes,
            fail: false,
        }
    }

    pub fn failing() -> Self {
        Self {
            classes: Vec::new(),
            fail: true,
        }
    }
}

impl SceneClassifier for MockScene {
    fn classify(
        &self,
        _rgb: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<SceneClass>, InferenceError> {
        if self.fail {
            return Err(ClassifierError::InferenceFailed("mock classify failure".into()).into());
        }
        Ok(self.classes.clone())
    }
}

/// Object detector double: canned results or failure.
pub struct MockObject {
    pub hits: Vec<ObjectHit>,
    pub fail: bool,
}

impl MockObject {
    pub fn returning(hits: Vec<ObjectHit>) -> Self {
        Self { hits, fail: false }
    }

    pub fn failing() -> Self {
        Self {
            hits: Vec::new(),
            fail: true,
        }
    }
}

impl ObjectDetector for MockObject {
    fn detect(
        &self,
        _rgb: &[u8],
        _width: u32,
        _height: u32,
    ) -> Result<Vec<ObjectHit>, InferenceError> {
        if self.fail {
            return Err(DetectorError::InferenceFailed("mock detect failure".into()).into());
        }
        Ok(self.hits.clone())
    }
}

/// Capture stream double. Tracks stop calls and keeps the backend's
/// active-stream count honest.
pub struct MockStream {
    frame: Mutex<Option<Frame>>,
    stopped: AtomicBool,
    stop_calls: AtomicUsize,
    active: Arc<AtomicUsize>,
}

impl MockStream {
    pub fn stop_count(&self) -> usize {
        self.stop_calls.load(Ordering::SeqCst)
    }
}

impl FrameSource for MockStream {
    fn latest_frame(&self) -> Option<Frame> {
        self.frame.lock().unwrap().clone()
    }

    fn stop(&self) {
        self.stop_calls.fetch_add(1, Ordering::SeqCst);
        if !self.stopped.swap(true, Ordering::SeqCst) {
            self.active.fetch_sub(1, Ordering::SeqCst);
        }
    }
}

/// Capture backend double: configurable denials, overlap detection.
pub struct MockBackend {
    deny: Vec<FacingMode>,
    deliver_frames: bool,
    opens: Arc<AtomicUsize>,
    active: Arc<AtomicUsize>,
    overlap: Arc<AtomicBool>,
}

impl MockBackend {
    pub fn new() -> Self {
        Self {
            deny: Vec::new(),
            deliver_frames: false,
            opens: Arc::new(AtomicUsize::new(0)),
            active: Arc::new(AtomicUsize::new(0)),
            overlap: Arc::new(AtomicBool::new(false)),
        }
    }

    /// Fail every acquisition for `facing`.
    pub fn deny(mut self, facing: FacingMode) -> Self {
        self.deny.push(facing);
        self
    }

    /// Make opened streams deliver a frame immediately.
    pub fn with_frames(mut self) -> Self {
        self.deliver_frames = true;
        self
    }

    /// Handles for asserting after the backend is moved into a session:
    /// (successful opens, streams currently open, overlap-ever flag).
    pub fn probes(&self) -> (Arc<AtomicUsize>, Arc<AtomicUsize>, Arc<AtomicBool>) {
        (
            Arc::clone(&self.opens),
            Arc::clone(&self.active),
            Arc::clone(&self.overlap),
        )
    }
}

impl StreamBackend for MockBackend {
    type Stream = MockStream;

    fn request_stream(
        &self,
        facing: FacingMode,
        ideal_width: u32,
        ideal_height: u32,
    ) -> Result<MockStream, CameraError> {
        if self.deny.contains(&facing) {
            return Err(CameraError::PermissionDenied(format!(
                "mock denial for {facing}"
            )));
        }
        self.opens.fetch_add(1, Ordering::SeqCst);
        if self.active.fetch_add(1, Ordering::SeqCst) > 0 {
            self.overlap.store(true, Ordering::SeqCst);
        }
        let frame = self
            .deliver_frames
            .then(|| test_frame(ideal_width.min(64), ideal_height.min(64)));
        Ok(MockStream {
            frame: Mutex::new(frame),
            stopped: AtomicBool::new(false),
            stop_calls: AtomicUsize::new(0),
            active: Arc::clone(&self.active),
        })
    }
}
