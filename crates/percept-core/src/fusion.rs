//! Detection fusion — normalize, merge, rank, truncate.
//!
//! Combines the scene classifier's and the object detector's outputs
//! into one ranked [`DetectionSet`]. Pure; no I/O, no clock.

use crate::types::{Detection, DetectionKind, DetectionSet, ObjectHit, SceneClass};

/// Maximum entries in a published detection set.
pub const MAX_DETECTIONS: usize = 5;

/// Fuse both models' outputs into one ranked detection set.
///
/// Scene results are normalized and concatenated ahead of object
/// results, then the merged sequence is stable-sorted descending by
/// confidence and truncated to [`MAX_DETECTIONS`]. The concatenation
/// order is load-bearing: at equal confidence, scene entries precede
/// object entries.
pub fn fuse(scene: Vec<SceneClass>, objects: Vec<ObjectHit>) -> DetectionSet {
    let mut merged: Vec<Detection> = Vec::with_capacity(scene.len() + objects.len());

    merged.extend(scene.into_iter().map(|c| Detection {
        label: c.label,
        confidence: c.probability.clamp(0.0, 1.0),
        kind: DetectionKind::Scene,
    }));
    merged.extend(objects.into_iter().map(|o| Detection {
        label: o.label,
        confidence: o.score.clamp(0.0, 1.0),
        kind: DetectionKind::Object,
    }));

    // sort_by is stable, so equal-confidence entries keep merge order.
    merged.sort_by(|a, b| b.confidence.total_cmp(&a.confidence));
    merged.truncate(MAX_DETECTIONS);

    DetectionSet::from_ranked(merged)
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::types::BoundingBox;

    fn scene(label: &str, probability: f32) -> SceneClass {
        SceneClass {
            label: label.into(),
            probability,
        }
    }

    fn object(label: &str, score: f32) -> ObjectHit {
        ObjectHit {
            label: label.into(),
            score,
            bbox: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
            },
        }
    }

    #[test]
    fn test_fuse_empty_inputs() {
        assert!(fuse(vec![], vec![]).is_empty());
    }

    #[test]
    fn test_fuse_sorted_descending() {
        let set = fuse(
            vec![scene("street", 0.3), scene("plaza", 0.8)],
            vec![object("person", 0.6), object("bicycle", 0.95)],
        );
        let confs: Vec<f32> = set.iter().map(|d| d.confidence).collect();
        assert_eq!(confs, vec![0.95, 0.8, 0.6, 0.3]);
    }

    #[test]
    fn test_fuse_equal_confidence_scene_precedes_object() {
        // Scene [(A, 0.9)] + object [(B, 0.9), (C, 0.4)]
        // must fuse to [A(Scene), B(Object), C(Object)].
        let set = fuse(
            vec![scene("A", 0.9)],
            vec![object("B", 0.9), object("C", 0.4)],
        );
        let labels: Vec<&str> = set.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["A", "B", "C"]);
        assert_eq!(set.as_slice()[0].kind, DetectionKind::Scene);
        assert_eq!(set.as_slice()[1].kind, DetectionKind::Object);
    }

    #[test]
    fn test_fuse_truncates_to_top_five() {
        let set = fuse(
            vec![scene("s1", 0.9), scene("s2", 0.2), scene("s3", 0.1)],
            vec![
                object("o1", 0.8),
                object("o2", 0.7),
                object("o3", 0.6),
                object("o4", 0.05),
            ],
        );
        assert_eq!(set.len(), MAX_DETECTIONS);
        let labels: Vec<&str> = set.iter().map(|d| d.label.as_str()).collect();
        // Exactly the top 5 by confidence survive; 0.1 and 0.05 are gone.
        assert_eq!(labels, vec!["s1", "o1", "o2", "o3", "s2"]);
        assert!(!labels.contains(&"s3"));
        assert!(!labels.contains(&"o4"));
    }

    #[test]
    fn test_fuse_clamps_out_of_range_confidence() {
        let set = fuse(vec![scene("hot", 1.7)], vec![object("cold", -0.2)]);
        assert_eq!(set.as_slice()[0].confidence, 1.0);
        assert_eq!(set.as_slice()[1].confidence, 0.0);
    }

    #[test]
    fn test_fuse_ties_among_objects_keep_detector_order() {
        let set = fuse(vec![], vec![object("first", 0.5), object("second", 0.5)]);
        let labels: Vec<&str> = set.iter().map(|d| d.label.as_str()).collect();
        assert_eq!(labels, vec!["first", "second"]);
    }

    #[test]
    fn test_fuse_scene_only() {
        let set = fuse(vec![scene("kitchen", 0.7)], vec![]);
        assert_eq!(set.len(), 1);
        assert_eq!(set.as_slice()[0].kind, DetectionKind::Scene);
    }
}
