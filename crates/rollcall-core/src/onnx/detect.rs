//! SCRFD face detection: anchor-free decoding over three stride levels
//! with NMS post-processing.

use crate::provider::ProviderError;
use crate::types::BoundingBox;
use image::imageops::{self, FilterType};
use image::GrayImage;
use ndarray::Array4;
use ort::session::Session;
use ort::value::TensorRef;

const INPUT_SIZE: u32 = 640;
const PIXEL_MEAN: f32 = 127.5;
const PIXEL_STD: f32 = 128.0;
const SCORE_THRESHOLD: f32 = 0.5;
const NMS_IOU_THRESHOLD: f32 = 0.4;
const STRIDES: [usize; 3] = [8, 16, 32];
const ANCHORS_PER_CELL: usize = 2;

/// Detect faces in a grayscale frame.
///
/// Returns bounding boxes with landmarks in frame coordinates, sorted by
/// confidence. No face is an empty Vec. The session must expose 9 outputs
/// (validated at load time).
pub fn detect_faces(
    session: &mut Session,
    frame: &GrayImage,
) -> Result<Vec<BoundingBox>, ProviderError> {
    let (tensor, scale) = preprocess(frame);

    let outputs = session.run(ort::inputs![TensorRef::from_array_view(tensor.view())?])?;

    // Standard SCRFD export ordering: [0-2]=scores, [3-5]=bbox deltas,
    // [6-8]=landmark deltas, one slot per stride.
    let mut detections = Vec::new();
    for (slot, &stride) in STRIDES.iter().enumerate() {
        let (_, scores) = outputs[slot]
            .try_extract_tensor::<f32>()
            .map_err(|e| ProviderError::Inference(format!("scores stride {stride}: {e}")))?;
        let (_, deltas) = outputs[slot + 3]
            .try_extract_tensor::<f32>()
            .map_err(|e| ProviderError::Inference(format!("bboxes stride {stride}: {e}")))?;
        let (_, kps) = outputs[slot + 6]
            .try_extract_tensor::<f32>()
            .map_err(|e| ProviderError::Inference(format!("landmarks stride {stride}: {e}")))?;

        decode_stride(scores, deltas, kps, stride, scale, &mut detections);
    }

    let mut kept = nms(detections, NMS_IOU_THRESHOLD);
    kept.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    Ok(kept)
}

/// Resize the frame to fit the model input, anchored top-left, and build a
/// normalized NCHW tensor. Padding pixels normalize to 0.
///
/// Returns the tensor plus the applied scale; dividing model-space
/// coordinates by the scale maps them back to frame coordinates.
fn preprocess(frame: &GrayImage) -> (Array4<f32>, f32) {
    let longest = frame.width().max(frame.height()).max(1);
    let scale = INPUT_SIZE as f32 / longest as f32;
    let new_w = ((frame.width() as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);
    let new_h = ((frame.height() as f32 * scale).round() as u32).clamp(1, INPUT_SIZE);

    let resized = imageops::resize(frame, new_w, new_h, FilterType::Triangle);

    let size = INPUT_SIZE as usize;
    let mut tensor = Array4::<f32>::zeros((1, 3, size, size));
    for y in 0..new_h as usize {
        for x in 0..new_w as usize {
            let value = (resized.get_pixel(x as u32, y as u32)[0] as f32 - PIXEL_MEAN) / PIXEL_STD;
            // Grayscale replicated across the three input channels.
            tensor[[0, 0, y, x]] = value;
            tensor[[0, 1, y, x]] = value;
            tensor[[0, 2, y, x]] = value;
        }
    }

    (tensor, scale)
}

/// Decode anchor-free detections for a single stride level into frame
/// coordinates.
fn decode_stride(
    scores: &[f32],
    deltas: &[f32],
    kps: &[f32],
    stride: usize,
    scale: f32,
    out: &mut Vec<BoundingBox>,
) {
    let grid = INPUT_SIZE as usize / stride;
    let anchors = grid * grid * ANCHORS_PER_CELL;

    for idx in 0..anchors.min(scores.len()) {
        let score = scores[idx];
        if score <= SCORE_THRESHOLD {
            continue;
        }

        let cell = idx / ANCHORS_PER_CELL;
        let anchor_x = ((cell % grid) * stride) as f32;
        let anchor_y = ((cell / grid) * stride) as f32;

        let b = idx * 4;
        if b + 3 >= deltas.len() {
            break;
        }
        // Deltas are [left, top, right, bottom] offsets in stride units.
        let x1 = (anchor_x - deltas[b] * stride as f32) / scale;
        let y1 = (anchor_y - deltas[b + 1] * stride as f32) / scale;
        let x2 = (anchor_x + deltas[b + 2] * stride as f32) / scale;
        let y2 = (anchor_y + deltas[b + 3] * stride as f32) / scale;

        let k = idx * 10;
        let landmarks = if k + 9 < kps.len() {
            let mut points = [(0.0f32, 0.0f32); 5];
            for (i, point) in points.iter_mut().enumerate() {
                point.0 = (anchor_x + kps[k + i * 2] * stride as f32) / scale;
                point.1 = (anchor_y + kps[k + i * 2 + 1] * stride as f32) / scale;
            }
            Some(points)
        } else {
            None
        };

        out.push(BoundingBox {
            x: x1,
            y: y1,
            width: x2 - x1,
            height: y2 - y1,
            confidence: score,
            landmarks,
        });
    }
}

/// Non-Maximum Suppression: drop detections overlapping a higher-confidence
/// one beyond the IoU threshold.
fn nms(mut detections: Vec<BoundingBox>, iou_threshold: f32) -> Vec<BoundingBox> {
    detections.sort_by(|a, b| {
        b.confidence
            .partial_cmp(&a.confidence)
            .unwrap_or(std::cmp::Ordering::Equal)
    });

    let mut keep: Vec<BoundingBox> = Vec::new();
    for candidate in detections {
        if keep.iter().all(|k| iou(k, &candidate) <= iou_threshold) {
            keep.push(candidate);
        }
    }
    keep
}

/// Intersection-over-Union of two boxes.
fn iou(a: &BoundingBox, b: &BoundingBox) -> f32 {
    let x1 = a.x.max(b.x);
    let y1 = a.y.max(b.y);
    let x2 = (a.x + a.width).min(b.x + b.width);
    let y2 = (a.y + a.height).min(b.y + b.height);

    let inter = (x2 - x1).max(0.0) * (y2 - y1).max(0.0);
    let union = a.width * a.height + b.width * b.height - inter;

    if union > 0.0 {
        inter / union
    } else {
        0.0
    }
}
