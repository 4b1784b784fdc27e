use serde::{Deserialize, Serialize};
use std::fmt;

/// Result label returned when the nearest gallery entry is outside the tolerance.
pub const UNKNOWN_LABEL: &str = "Unknown";
/// Result label returned when the detector finds no face at all.
pub const NO_FACE_LABEL: &str = "No face detected";

/// Bounding box for a detected face, with optional facial landmarks.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct BoundingBox {
    pub x: f32,
    pub y: f32,
    pub width: f32,
    pub height: f32,
    pub confidence: f32,
    /// Five-point facial landmarks: [left_eye, right_eye, nose, left_mouth, right_mouth].
    pub landmarks: Option<[(f32, f32); 5]>,
}

/// Face embedding vector (512-dimensional for the bundled ArcFace extractor).
#[derive(Debug, Clone, PartialEq, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    pub fn new(values: Vec<f32>) -> Self {
        Self {
            values,
            model_version: None,
        }
    }

    pub fn dimension(&self) -> usize {
        self.values.len()
    }

    /// Euclidean distance between two embeddings of equal dimension.
    pub fn euclidean_distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face found in an image, with the embedding extracted from it.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub bbox: BoundingBox,
    pub embedding: Embedding,
}

/// Outcome of identifying a query image against the gallery.
#[derive(Debug, Clone, PartialEq, Eq, Hash)]
pub enum Identification {
    Known(String),
    Unknown,
    NoFaceDetected,
}

impl Identification {
    /// Wire label: the identity itself, or one of the two sentinel strings.
    pub fn label(&self) -> &str {
        match self {
            Self::Known(name) => name,
            Self::Unknown => UNKNOWN_LABEL,
            Self::NoFaceDetected => NO_FACE_LABEL,
        }
    }
}

impl fmt::Display for Identification {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        f.write_str(self.label())
    }
}

/// True for the two result labels that never name a real person.
pub fn is_sentinel_label(label: &str) -> bool {
    label == UNKNOWN_LABEL || label == NO_FACE_LABEL
}

#[cfg(test)]
mod tests {
    use super::*;

    #[test]
    fn test_euclidean_distance_identical() {
        let a = Embedding::new(vec![0.3, -0.2, 0.9]);
        assert_eq!(a.euclidean_distance(&a), 0.0);
    }

    #[test]
    fn test_euclidean_distance_3_4_5() {
        let a = Embedding::new(vec![0.0, 0.0]);
        let b = Embedding::new(vec![3.0, 4.0]);
        assert!((a.euclidean_distance(&b) - 5.0).abs() < 1e-6);
        assert!((b.euclidean_distance(&a) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_identification_labels() {
        assert_eq!(Identification::Known("Alice".into()).label(), "Alice");
        assert_eq!(Identification::Unknown.label(), "Unknown");
        assert_eq!(Identification::NoFaceDetected.to_string(), "No face detected");
    }

    #[test]
    fn test_sentinel_labels() {
        assert!(is_sentinel_label("Unknown"));
        assert!(is_sentinel_label("No face detected"));
        assert!(!is_sentinel_label("unknown"));
        assert!(!is_sentinel_label("Alice"));
    }
}
