//! MobileNet scene classifier via ONNX Runtime.
//!
//! Classifies a whole RGB frame into ranked ImageNet scene/class
//! labels. Implements [`SceneClassifier`] for the fusion engine.

use crate::model::{InferenceError, SceneClassifier};
use crate::types::SceneClass;
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use parking_lot::Mutex;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const MOBILENET_INPUT_SIZE: usize = 224;
const MOBILENET_MEAN: f32 = 127.5;
const MOBILENET_STD: f32 = 127.5;
/// Ranked classes returned per frame.
const CLASSIFIER_TOP_K: usize = 3;

#[derive(Error, Debug)]
pub enum ClassifierError {
    #[error("model file not found: {0} — export MobileNet v2 to ONNX and place in models/")]
    ModelNotFound(String),
    #[error("label file not found: {0}")]
    LabelsNotFound(String),
    #[error("label file unreadable: {0}")]
    LabelsUnreadable(#[from] std::io::Error),
    #[error("inference failed: {0}")]
    InferenceFailed(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// MobileNet-based scene classifier.
pub struct SceneModel {
    /// `Session::run` needs exclusive access; the engine calls through
    /// a shared handle, so the session sits behind a lock.
    session: Mutex<Session>,
    labels: Vec<String>,
}

impl SceneModel {
    /// Load the MobileNet ONNX model and its label file.
    pub fn load(model_path: &str, labels_path: &str) -> Result<Self, ClassifierError> {
        if !Path::new(model_path).exists() {
            return Err(ClassifierError::ModelNotFound(model_path.to_string()));
        }
        let labels = load_labels(labels_path)?;

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        tracing::info!(
            path = model_path,
            classes = labels.len(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?session.outputs().iter().map(|o| o.name()).collect::<Vec<_>>(),
            "loaded MobileNet model"
        );

        Ok(Self {
            session: Mutex::new(session),
            labels,
        })
    }

    fn classify_inner(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<SceneClass>, ClassifierError> {
        let input = preprocess(rgb, width, height);

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (_, logits) = outputs[0]
            .try_extract_tensor::<f32>()
            .map_err(|e| ClassifierError::InferenceFailed(format!("logits: {e}")))?;

        // TF exports carry a background class at index 0; labels files
        // list only real classes.
        let background_offset = if logits.len() == self.labels.len() + 1 {
            1
        } else if logits.len() == self.labels.len() {
            0
        } else {
            return Err(ClassifierError::InferenceFailed(format!(
                "expected {} class scores, got {}",
                self.labels.len(),
                logits.len()
            )));
        };

        let probabilities = softmax(&logits[background_offset..]);
        Ok(top_k(&probabilities, &self.labels, CLASSIFIER_TOP_K))
    }
}

impl SceneClassifier for SceneModel {
    fn classify(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<SceneClass>, InferenceError> {
        Ok(self.classify_inner(rgb, width, height)?)
    }
}

/// Read one label per line, ignoring blank lines.
fn load_labels(path: &str) -> Result<Vec<String>, ClassifierError> {
    if !Path::new(path).exists() {
        return Err(ClassifierError::LabelsNotFound(path.to_string()));
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Resize a packed RGB frame to 224×224 and normalize into a NCHW
/// float tensor with symmetric MobileNet normalization.
fn preprocess(rgb: &[u8], width: u32, height: u32) -> Array4<f32> {
    let size = MOBILENET_INPUT_SIZE;

    let image = RgbImage::from_raw(width, height, rgb.to_vec()).unwrap_or_else(|| {
        // Short buffer: classify a black frame rather than panic.
        tracing::warn!(width, height, len = rgb.len(), "RGB buffer shorter than frame size");
        RgbImage::new(width.max(1), height.max(1))
    });
    let resized = image::imageops::resize(&image, size as u32, size as u32, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] =
                (pixel[c] as f32 - MOBILENET_MEAN) / MOBILENET_STD;
        }
    }
    tensor
}

/// Numerically stable softmax.
fn softmax(logits: &[f32]) -> Vec<f32> {
    let max = logits.iter().copied().fold(f32::NEG_INFINITY, f32::max);
    let exps: Vec<f32> = logits.iter().map(|&l| (l - max).exp()).collect();
    let sum: f32 = exps.iter().sum();
    if sum > 0.0 {
        exps.iter().map(|&e| e / sum).collect()
    } else {
        vec![0.0; logits.len()]
    }
}

/// Top-k classes by probability, descending.
fn top_k(probabilities: &[f32], labels: &[String], k: usize) -> Vec<SceneClass> {
    let mut indexed: Vec<(usize, f32)> = probabilities.iter().copied().enumerate().collect();
    indexed.sort_by(|a, b| b.1.total_cmp(&a.1));

    indexed
        .into_iter()
        .take(k)
        .map(|(i, p)| SceneClass {
            label: labels[i].clone(),
            probability: p,
        })
        .collect()
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_softmax_sums_to_one() {
        let probs = softmax(&[1.0, 2.0, 3.0]);
        let sum: f32 = probs.iter().sum();
        assert!((sum - 1.0).abs() < 1e-5, "sum = {sum}");
    }

    #[test]
    fn test_softmax_monotonic() {
        let probs = softmax(&[0.5, 2.5, 1.0]);
        assert!(probs[1] > probs[2]);
        assert!(probs[2] > probs[0]);
    }

    #[test]
    fn test_softmax_large_logits_stable() {
        // Without the max shift these would overflow to inf/NaN.
        let probs = softmax(&[1000.0, 1001.0]);
        assert!(probs.iter().all(|p| p.is_finite()));
        assert!((probs.iter().sum::<f32>() - 1.0).abs() < 1e-5);
    }

    #[test]
    fn test_top_k_ordering() {
        let labels: Vec<String> = ["a", "b", "c", "d"].iter().map(|s| s.to_string()).collect();
        let result = top_k(&[0.1, 0.6, 0.05, 0.25], &labels, 3);
        let picked: Vec<&str> = result.iter().map(|c| c.label.as_str()).collect();
        assert_eq!(picked, vec!["b", "d", "a"]);
        assert!((result[0].probability - 0.6).abs() < 1e-6);
    }

    #[test]
    fn test_top_k_shorter_than_k() {
        let labels: Vec<String> = vec!["only".into()];
        let result = top_k(&[0.9], &labels, 3);
        assert_eq!(result.len(), 1);
    }

    #[test]
    fn test_preprocess_output_shape() {
        let rgb = vec![128u8; 64 * 48 * 3];
        let tensor = preprocess(&rgb, 64, 48);
        assert_eq!(
            tensor.shape(),
            &[1, 3, MOBILENET_INPUT_SIZE, MOBILENET_INPUT_SIZE]
        );
    }

    #[test]
    fn test_preprocess_normalization() {
        // A uniform 128 frame normalizes to (128 - 127.5) / 127.5.
        let rgb = vec![128u8; 32 * 32 * 3];
        let tensor = preprocess(&rgb, 32, 32);
        let expected = (128.0 - MOBILENET_MEAN) / MOBILENET_STD;
        let val = tensor[[0, 0, 0, 0]];
        assert!((val - expected).abs() < 1e-6, "got {val}, expected {expected}");
    }

    #[test]
    fn test_preprocess_extremes_map_to_unit_range() {
        let mut rgb = vec![0u8; 8 * 8 * 3];
        rgb[0] = 255;
        let tensor = preprocess(&rgb, 8, 8);
        for v in tensor.iter() {
            assert!((-1.0..=1.0).contains(v), "out of range: {v}");
        }
    }
}
