//! SSD MobileNet object detector via ONNX Runtime.
//!
//! Decodes SSD box/score tensors with per-class score thresholding and
//! NMS post-processing. Implements [`ObjectDetector`] for the fusion
//! engine.

use crate::model::{InferenceError, ObjectDetector};
use crate::types::{BoundingBox, ObjectHit};
use image::{imageops::FilterType, RgbImage};
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;
use parking_lot::Mutex;
use std::path::Path;
use thiserror::Error;

// --- Named constants ---
const SSD_INPUT_SIZE: usize = 300;
const SSD_MEAN: f32 = 127.5;
const SSD_STD: f32 = 127.5;
const SSD_CONFIDENCE_THRESHOLD: f32 = 0.5;
const SSD_NMS_THRESHOLD: f32 = 0.45;
/// Hits returned per frame after NMS, highest score first.
const SSD_MAX_HITS: usize = 20;

#[derive(Error, Debug)]
pub enum DetectorError {
    #[error("model file not found: {0} — export SSD MobileNet v2 to ONNX and place in models/")]
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

/// Output tensor indices: (boxes_idx, scores_idx).
type OutputIndices = (usize, usize);

/// One decoded anchor before NMS.
#[derive(Debug, Clone)]
struct Candidate {
    class_idx: usize,
    score: f32,
    bbox: BoundingBox,
}

/// SSD-based object detector.
pub struct ObjectModel {
    session: Mutex<Session>,
    labels: Vec<String>,
    /// (boxes, scores) output positions, discovered by name at load
    /// time; falls back to positional ordering.
    output_indices: OutputIndices,
}

impl ObjectModel {
    /// Load the SSD ONNX model and its label file.
    pub fn load(model_path: &str, labels_path: &str) -> Result<Self, DetectorError> {
        if !Path::new(model_path).exists() {
            return Err(DetectorError::ModelNotFound(model_path.to_string()));
        }
        let labels = load_labels(labels_path)?;

        let session = Session::builder()?
            .with_intra_threads(2)?
            .commit_from_file(model_path)?;

        let output_names: Vec<String> =
            session.outputs().iter().map(|o| o.name().to_string()).collect();
        if output_names.len() < 2 {
            return Err(DetectorError::InferenceFailed(format!(
                "SSD model requires boxes + scores outputs, got {}",
                output_names.len()
            )));
        }
        let output_indices = discover_output_indices(&output_names);

        tracing::info!(
            path = model_path,
            classes = labels.len(),
            inputs = ?session.inputs().iter().map(|i| (i.name(), i.dtype())).collect::<Vec<_>>(),
            outputs = ?output_names,
            "loaded SSD model"
        );

        Ok(Self {
            session: Mutex::new(session),
            labels,
            output_indices,
        })
    }

    fn detect_inner(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<ObjectHit>, DetectorError> {
        let input = preprocess(rgb, width, height);

        let mut session = self.session.lock();
        let outputs = session.run(ort::inputs![TensorRef::from_array_view(input.view())?])?;

        let (boxes_idx, scores_idx) = self.output_indices;
        let (_, boxes) = outputs[boxes_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("boxes: {e}")))?;
        let (_, scores) = outputs[scores_idx]
            .try_extract_tensor::<f32>()
            .map_err(|e| DetectorError::InferenceFailed(format!("scores: {e}")))?;

        let num_anchors = boxes.len() / 4;
        if num_anchors == 0 || scores.len() % num_anchors != 0 {
            return Err(DetectorError::InferenceFailed(format!(
                "tensor shape mismatch: {} box values, {} score values",
                boxes.len(),
                scores.len()
            )));
        }
        let num_classes = scores.len() / num_anchors;
        // TF SSD exports carry a background class at index 0; labels
        // files list only real classes.
        let background_offset = if num_classes == self.labels.len() + 1 {
            1
        } else {
            0
        };

        let candidates = decode(
            boxes,
            scores,
            num_classes,
            background_offset,
            width as f32,
            height as f32,
            SSD_CONFIDENCE_THRESHOLD,
        );

        let mut kept = nms(candidates, SSD_NMS_THRESHOLD);
        kept.sort_by(|a, b| b.score.total_cmp(&a.score));
        kept.truncate(SSD_MAX_HITS);

        Ok(kept
            .into_iter()
            .filter_map(|c| {
                let label = self.labels.get(c.class_idx)?.clone();
                Some(ObjectHit {
                    label,
                    score: c.score,
                    bbox: c.bbox,
                })
            })
            .collect())
    }
}

impl ObjectDetector for ObjectModel {
    fn detect(
        &self,
        rgb: &[u8],
        width: u32,
        height: u32,
    ) -> Result<Vec<ObjectHit>, InferenceError> {
        Ok(self.detect_inner(rgb, width, height)?)
    }
}

/// Read one label per line, ignoring blank lines.
fn load_labels(path: &str) -> Result<Vec<String>, DetectorError> {
    if !Path::new(path).exists() {
        return Err(DetectorError::LabelsNotFound(path.to_string()));
    }
    let raw = std::fs::read_to_string(path)?;
    Ok(raw
        .lines()
        .map(str::trim)
        .filter(|l| !l.is_empty())
        .map(String::from)
        .collect())
}

/// Discover (boxes, scores) output positions by name.
///
/// SSD exports commonly name the tensors "boxes"/"scores" (sometimes
/// "detection_boxes"/"detection_scores"). Falls back to positional
/// ordering [0]=boxes, [1]=scores when names are not recognized.
fn discover_output_indices(names: &[String]) -> OutputIndices {
    let find = |needle: &str| names.iter().position(|n| n.contains(needle));

    match (find("box"), find("score")) {
        (Some(b), Some(s)) if b != s => {
            tracing::debug!(boxes = b, scores = s, "SSD: name-based output mapping");
            (b, s)
        }
        _ => {
            tracing::info!(
                ?names,
                "SSD: output names not recognized, using positional mapping [0]=boxes, [1]=scores"
            );
            (0, 1)
        }
    }
}

/// Resize a packed RGB frame to 300×300 and normalize into a NCHW
/// float tensor.
fn preprocess(rgb: &[u8], width: u32, height: u32) -> Array4<f32> {
    let size = SSD_INPUT_SIZE;

    let image = RgbImage::from_raw(width, height, rgb.to_vec()).unwrap_or_else(|| {
        tracing::warn!(width, height, len = rgb.len(), "RGB buffer shorter than frame size");
        RgbImage::new(width.max(1), height.max(1))
    });
    let resized = image::imageops::resize(&image, size as u32, size as u32, FilterType::Triangle);

    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for (x, y, pixel) in resized.enumerate_pixels() {
        for c in 0..3 {
            tensor[[0, c, y as usize, x as usize]] = (pixel[c] as f32 - SSD_MEAN) / SSD_STD;
        }
    }
    tensor
}

/// Decode SSD outputs into thresholded candidates.
///
/// `boxes` is `[num_anchors * 4]` normalized `[ymin, xmin, ymax, xmax]`;
/// `scores` is `[num_anchors * num_classes]`. Each anchor contributes
/// its best non-background class when that score clears `threshold`.
/// Coordinates are scaled to frame pixels and clamped to the frame.
fn decode(
    boxes: &[f32],
    scores: &[f32],
    num_classes: usize,
    background_offset: usize,
    frame_width: f32,
    frame_height: f32,
    threshold: f32,
) -> Vec<Candidate> {
    let num_anchors = boxes.len() / 4;
    let mut candidates = Vec::new();

    for idx in 0..num_anchors {
        let row = &scores[idx * num_classes..(idx + 1) * num_classes];

        let mut best_class = None;
        let mut best_score = threshold;
        for (class, &score) in row.iter().enumerate().skip(background_offset) {
            if score > best_score {
                best_score = score;
                best_class = Some(class - background_offset);
            }
        }
        let Some(class_idx) = best_class else {
            continue;
        };

        let b = &boxes[idx * 4..idx * 4 + 4];
        let y1 = (b[0] * frame_height).clamp(0.0, frame_height);
        let x1 = (b[1] * frame_width).clamp(0.0, frame_width);
        let y2 = (b[2] * frame_height).clamp(0.0, frame_height);
        let x2 = (b[3] * frame_width).clamp(0.0, frame_width);
        if x2 <= x1 || y2 <= y1 {
            continue;
        }

        candidates.push(Candidate {
            class_idx,
            score: best_score,
            bbox: BoundingBox {
                x: x1,
                y: y1,
                width: x2 - x1,
                height: y2 - y1,
            },
        });
    }

    candidates
}

/// Per-class Non-Maximum Suppression: remove overlapping detections of
/// the same class.
fn nms(mut candidates: Vec<Candidate>, iou_threshold: f32) -> Vec<Candidate> {
    candidates.sort_by(|a, b| b.score.total_cmp(&a.score));

    let mut keep = Vec::new();
    let mut suppressed = vec![false; candidates.len()];

    for i in 0..candidates.len() {
        if suppressed[i] {
            continue;
        }
        keep.push(candidates[i].clone());

        for j in (i + 1)..candidates.len() {
            if suppressed[j] || candidates[j].class_idx != candidates[i].class_idx {
                continue;
            }
            if iou(&candidates[i].bbox, &candidates[j].bbox) > iou_threshold {
                suppressed[j] = true;
            }
        }
    }

    keep
}

/// Compute Intersection-over-Union between two bounding boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter_w = (x2 - x1).max(0.0);
    let inter_h = (y2 - y1).max(0.0);
    let inter_area = inter_w * inter_h;

    let area_a = a.width * a.height;
    let area_b = b.width * b.height;
    let union_area = area_a + area_b - inter_area;

    if union_area > 0.0 {
        inter_area / union_area
    } else {
        0.0
    }
}
