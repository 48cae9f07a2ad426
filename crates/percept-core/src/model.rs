//! Model contracts consumed by the fusion engine.
//!
//! The engine never sees model internals — only these two call shapes.
//! Production implementations live in [`crate::classifier`] and
//! [`crate::detector`]; tests substitute doubles.

use crate::types::{ObjectHit, SceneClass};
use thiserror::Error;

/// A single model call failed. Tick-local: callers discard the tick's
/// result and keep the previously published set.
#[derive(Error, Debug)]
pub enum InferenceError {
    #[error("scene classifier: {0}")]
    Classifier(#[from] crate::classifier::ClassifierError),
    #[error("object detector: {0}")]
    Detector(#[from] crate::detector::DetectorError),
}

/// Whole-frame scene classifier: ranked class labels for an RGB frame.
pub trait SceneClassifier: Send + Sync {
    /// Classify a packed RGB frame (3 bytes per pixel, row-major).
    /// Returns classes sorted descending by probability.
    fn classify(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<SceneClass>, InferenceError>;
}

/// Multi-object detector: localized labeled hits for an RGB frame.
pub trait ObjectDetector: Send + Sync {
    /// Detect objects in a packed RGB frame (3 bytes per pixel,
    /// row-major). Returns hits sorted descending by score.
    fn detect(&self, rgb: &[u8], width: u32, height: u32)
        -> Result<Vec<ObjectHit>, InferenceError>;
}
