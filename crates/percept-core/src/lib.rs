//! percept-core — Scene classification, object detection, and fusion.
//!
//! Uses MobileNet for whole-frame scene classification and SSD for
//! multi-object detection, both running via ONNX Runtime for CPU
//! inference, and fuses their outputs into one ranked detection list.

use std::path::PathBuf;

pub mod classifier;
pub mod detector;
pub mod fusion;
pub mod model;
pub mod types;

pub use classifier::SceneModel;
pub use detector::ObjectModel;
pub use fusion::{fuse, MAX_DETECTIONS};
pub use model::{InferenceError, ObjectDetector, SceneClassifier};
pub use types::{
    BoundingBox, Detection, DetectionKind, DetectionSet, ObjectHit, SceneClass,
};

/// Default directory for ONNX model and label files.
pub fn default_model_dir() -> PathBuf {
    PathBuf::from("/usr/share/percept/models")
}
