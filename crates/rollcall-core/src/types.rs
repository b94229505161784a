use serde::{Deserialize, Serialize};

/// Bounding region of a detected face, with optional facial landmarks.
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

impl BoundingBox {
    /// Scale every coordinate by a uniform factor.
    ///
    /// Used to map regions found in a downscaled frame back to
    /// original-frame coordinates.
    pub fn scaled(&self, factor: f32) -> BoundingBox {
        BoundingBox {
            x: self.x * factor,
            y: self.y * factor,
            width: self.width * factor,
            height: self.height * factor,
            confidence: self.confidence,
            landmarks: self
                .landmarks
                .map(|points| points.map(|(px, py)| (px * factor, py * factor))),
        }
    }
}

/// Face embedding vector (512-dimensional for ArcFace).
///
/// Carries no meaning beyond distance comparison and is immutable once
/// produced.
#[derive(Debug, Clone, Serialize, Deserialize)]
pub struct Embedding {
    pub values: Vec<f32>,
    /// Model version that produced this embedding (e.g., "w600k_r50").
    pub model_version: Option<String>,
}

impl Embedding {
    /// Euclidean distance to another embedding. Lower = more similar.
    pub fn distance(&self, other: &Embedding) -> f32 {
        self.values
            .iter()
            .zip(other.values.iter())
            .map(|(a, b)| (a - b).powi(2))
            .sum::<f32>()
            .sqrt()
    }
}

/// One face found by the embedding provider in a single frame.
///
/// Transient: scoped to the recognition call that produced it.
#[derive(Debug, Clone)]
pub struct DetectedFace {
    pub embedding: Embedding,
    pub region: BoundingBox,
}

/// An enrolled identity: display name plus reference embedding.
#[derive(Debug, Clone)]
pub struct KnownIdentity {
    pub name: String,
    pub embedding: Embedding,
}

/// One accepted match from the recognition engine: the identity name and
/// the face region in original-frame coordinates.
#[derive(Debug, Clone)]
pub struct Recognition {
    pub name: String,
    pub region: BoundingBox,
}

#[cfg(test)]
mod tests {
    use super::*;

    fn embedding(values: Vec<f32>) -> Embedding {
        Embedding {
            values,
            model_version: None,
        }
    }

    #[test]
    fn test_distance_identical_is_zero() {
        let a = embedding(vec![0.5, -0.5, 1.0]);
        assert!(a.distance(&a).abs() < 1e-6);
    }

    #[test]
    fn test_distance_known_value() {
        let a = embedding(vec![0.0, 0.0]);
        let b = embedding(vec![3.0, 4.0]);
        assert!((a.distance(&b) - 5.0).abs() < 1e-6);
    }

    #[test]
    fn test_distance_symmetric() {
        let a = embedding(vec![1.0, 2.0, 3.0]);
        let b = embedding(vec![-1.0, 0.5, 2.0]);
        assert!((a.distance(&b) - b.distance(&a)).abs() < 1e-6);
    }

    #[test]
    fn test_bounding_box_scaled() {
        let region = BoundingBox {
            x: 10.0,
            y: 20.0,
            width: 30.0,
            height: 40.0,
            confidence: 0.9,
            landmarks: Some([(1.0, 2.0); 5]),
        };
        let scaled = region.scaled(4.0);
        assert_eq!(scaled.x, 40.0);
        assert_eq!(scaled.y, 80.0);
        assert_eq!(scaled.width, 120.0);
        assert_eq!(scaled.height, 160.0);
        assert_eq!(scaled.confidence, 0.9);
        assert_eq!(scaled.landmarks.unwrap()[0], (4.0, 8.0));
    }
}
