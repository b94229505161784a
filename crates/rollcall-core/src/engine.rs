//! Recognition engine: nearest-embedding matching against the registry.

use crate::provider::{EmbeddingProvider, ProviderError};
use crate::registry::Registry;
use crate::types::Recognition;
use image::imageops::{self, FilterType};
use image::GrayImage;

/// Linear downscale factor applied to frames before detection for
/// throughput. Regions are mapped back by the same factor before being
/// reported.
const DOWNSCALE: u32 = 4;

/// Recognize enrolled identities in a frame.
///
/// Every detected face is compared against every registry entry; the match
/// is the entry at minimum embedding distance, accepted only if that
/// distance clears `threshold`. Faces whose closest candidate fails the
/// threshold are dropped silently. Ties go to the earlier registry entry.
///
/// Results preserve face detection order, with regions rescaled to
/// original-frame coordinates. An empty registry yields an empty result
/// without touching the provider.
pub fn recognize(
    frame: &GrayImage,
    registry: &Registry,
    provider: &mut dyn EmbeddingProvider,
    threshold: f32,
) -> Result<Vec<Recognition>, ProviderError> {
    if registry.is_empty() {
        tracing::debug!("registry is empty, nothing to recognize");
        return Ok(Vec::new());
    }

    let small = imageops::resize(
        frame,
        (frame.width() / DOWNSCALE).max(1),
        (frame.height() / DOWNSCALE).max(1),
        FilterType::Triangle,
    );

    let faces = provider.detect_and_embed(&small)?;
    let mut recognized = Vec::new();

    for face in faces {
        // Stable index-of-minimum: strict `<` means the first entry in
        // build order wins ties.
        let mut best_idx = 0usize;
        let mut best_dist = f32::INFINITY;
        for (idx, known) in registry.entries().iter().enumerate() {
            let dist = face.embedding.distance(&known.embedding);
            if dist < best_dist {
                best_dist = dist;
                best_idx = idx;
            }
        }

        if best_dist > threshold {
            tracing::debug!(distance = best_dist, "closest candidate over threshold, dropping face");
            continue;
        }

        let name = registry.entries()[best_idx].name.clone();
        tracing::info!(name = %name, distance = best_dist, "recognized");
        recognized.push(Recognition {
            name,
            region: face.region.scaled(DOWNSCALE as f32),
        });
    }

    Ok(recognized)
}
