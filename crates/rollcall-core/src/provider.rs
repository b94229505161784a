use crate::types::DetectedFace;
use image::GrayImage;
use thiserror::Error;

#[derive(Error, Debug)]
pub enum ProviderError {
    #[error("model file not found: {0} — download from insightface and place in the model directory")]
    ModelNotFound(String),
    #[error("inference failed: {0}")]
    Inference(String),
    #[error("ort: {0}")]
    Ort(#[from] ort::Error),
}

/// Opaque face detection + embedding capability.
///
/// Given a grayscale frame, returns one entry per detected face with its
/// embedding and bounding region in frame coordinates. Zero faces is a
/// normal result, not an error. Any implementation satisfying this contract
/// is substitutable without touching the registry, engine, or ledger.
///
/// Implementations may be stateful (inference sessions), hence `&mut self`.
pub trait EmbeddingProvider {
    fn detect_and_embed(&mut self, frame: &GrayImage) -> Result<Vec<DetectedFace>, ProviderError>;
}
