use serde::{Deserialize, Serialize};

/// Which model produced a detection.
#[derive(Debug, Clone, Copy, PartialEq, Eq, Serialize, Deserialize)]
#[serde(rename_all = "snake_case")]
pub enum DetectionKind {
    /// Whole-frame scene classification.
    Scene,
    /// Localized object detection.
    Object,
}

/// One labeled, confidence-scored recognition result.
///
/// Produced only by the fusion step; never mutated after creation.
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Detection {
    pub label: String,
    /// Confidence in [0, 1], as reported by the producing model.
    pub confidence: f32,
    pub kind: DetectionKind,
}

/// Bounding box for a detected object, in frame pixel coordinates.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
}

/// Raw output of the scene classifier: one ranked class.
#[derive(Debug, Clone)]
pub struct SceneClass {
    pub label: String,
    pub probability: f32,
}

/// Raw output of the object detector: one localized hit.
///
/// Box geometry is carried for callers that render overlays; fusion
/// uses only label and score.
#[derive(Debug, Clone)]
pub struct ObjectHit {
    pub label: String,
    pub score: f32,
    pub bbox: BoundingBox,
}

/// The ranked detection list published to presentation.
///
/// At most [`crate::fusion::MAX_DETECTIONS`] entries, sorted descending
/// by confidence; replaced wholesale on every publish.
#[derive(Debug, Clone, Default, PartialEq, Serialize, Deserialize)]
pub struct DetectionSet(Vec<Detection>);

impl DetectionSet {
    pub(crate) fn from_ranked(detections: Vec<Detection>) -> Self {
        Self(detections)
    }

    /// The empty set, as published after `clear_detections()`.
    pub fn empty() -> Self {
        Self::default()
    }

    pub fn len(&self) -> usize {
        self.0.len()
    }

    pub fn is_empty(&self) -> bool {
        self.0.is_empty()
    }

    pub fn iter(&self) -> std::slice::Iter<'_, Detection> {
        self.0.iter()
    }

    pub fn as_slice(&self) -> &[Detection] {
        &self.0
    }
}

impl<'a> IntoIterator for &'a DetectionSet {
    type Item = &'a Detection;
    type IntoIter = std::slice::Iter<'a, Detection>;

    fn into_iter(self) -> Self::IntoIter {
        self.0.iter()
    }
}
