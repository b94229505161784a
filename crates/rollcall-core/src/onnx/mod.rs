//! ONNX-backed embedding provider: SCRFD detection + ArcFace embeddings,
//! both on CPU via ONNX Runtime.

mod align;
mod detect;
mod embed;

use crate::provider::{EmbeddingProvider, ProviderError};
use crate::types::DetectedFace;
use image::GrayImage;
use ort::session::Session;
use std::path::Path;

pub const DETECTOR_MODEL_FILE: &str = "det_10g.onnx";
pub const EMBEDDER_MODEL_FILE: &str = "w600k_r50.onnx";

/// SCRFD + ArcFace pipeline behind the [`EmbeddingProvider`] capability.
pub struct OnnxProvider {
    detector: Session,
    embedder: Session,
}

impl OnnxProvider {
    /// Load both ONNX models from the given directory.
    pub fn load(model_dir: &Path) -> Result<OnnxProvider, ProviderError> {
        let detector = load_session(&model_dir.join(DETECTOR_MODEL_FILE))?;
        let outputs = detector.outputs().len();
        if outputs < 9 {
            return Err(ProviderError::Inference(format!(
                "SCRFD model must expose 9 outputs (3 strides x score/bbox/kps), got {outputs}"
            )));
        }

        Ok(OnnxProvider {
            detector,
            embedder: load_session(&model_dir.join(EMBEDDER_MODEL_FILE))?,
        })
    }
}

fn load_session(path: &Path) -> Result<Session, ProviderError> {
    if !path.exists() {
        return Err(ProviderError::ModelNotFound(path.display().to_string()));
    }

    let session = Session::builder()?
        .with_intra_threads(2)
        .map_err(ort::Error::from)?
        .commit_from_file(path)?;

    tracing::info!(
        path = %path.display(),
        outputs = ?session.outputs().iter().map(|o| o.name().to_string()).collect::<Vec<_>>(),
        "loaded ONNX model"
    );

    Ok(session)
}

impl EmbeddingProvider for OnnxProvider {
    fn detect_and_embed(&mut self, frame: &GrayImage) -> Result<Vec<DetectedFace>, ProviderError> {
        let regions = detect::detect_faces(&mut self.detector, frame)?;

        let mut faces = Vec::with_capacity(regions.len());
        for region in regions {
            let Some(landmarks) = region.landmarks else {
                tracing::debug!("detection without landmarks cannot be aligned, dropping");
                continue;
            };
            let crop = align::align_crop(frame, &landmarks);
            let embedding = embed::extract(&mut self.embedder, &crop)?;
            faces.push(DetectedFace { embedding, region });
        }

        Ok(faces)
    }
}
