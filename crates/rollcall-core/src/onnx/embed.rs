//! ArcFace embedding extraction from aligned 112x112 crops.

use crate::provider::ProviderError;
use crate::types::Embedding;
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

const CROP_SIZE: usize = 112;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 127.5; // symmetric normalization, unlike the detector
const EMBEDDING_DIM: usize = 512;
const MODEL_VERSION: &str = "w600k_r50";

/// Extract an L2-normalized embedding from an aligned face crop.
pub fn extract(session: &mut Session, crop: &GrayImage) -> Result<Embedding, ProviderError> {
    let tensor = preprocess(crop);

    let outputs = session.run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;
    let (_, raw) = outputs[0]
        .try_extract_tensor::<f32>()
        .map_err(|e| ProviderError::Inference(format!("embedding extraction: {e}")))?;

    if raw.len() != EMBEDDING_DIM {
        return Err(ProviderError::Inference(format!(
            "expected {EMBEDDING_DIM}-dim embedding, got {}",
            raw.len()
        )));
    }

    // L2-normalize so Euclidean distances are comparable across frames.
    let norm = raw.iter().map(|v| v * v).sum::<f32>().sqrt();
    let values = if norm > 0.0 {
        raw.iter().map(|v| v / norm).collect()
    } else {
        raw.to_vec()
    };

    Ok(Embedding {
        values,
        model_version: Some(MODEL_VERSION.to_string()),
    })
}

/// Build a normalized NCHW tensor from the grayscale crop, replicating the
/// single channel across RGB.
fn preprocess(crop: &GrayImage) -> Array4<f32> {
    let mut tensor = Array4::<f32>::zeros((1, 3, CROP_SIZE, CROP_SIZE));
    for y in 0..CROP_SIZE.min(crop.height() as usize) {
        for x in 0..CROP_SIZE.min(crop.width() as usize) {
            let value = (crop.get_pixel(x as u32, y as u32)[0] as f32 - PIXEL_MEAN) / PIXEL_STD;
            tensor[[0, 0, y, x]] = value;
            tensor[[0, 1, y, x]] = value;
            tensor[[0, 2, y, x]] = value;
        }
    }
    tensor
}
