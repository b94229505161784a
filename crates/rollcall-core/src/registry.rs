//! Identity registry built from a directory of reference images.
//!
//! One image per identity, named `<PersonName>.<ext>`. The registry is
//! built once at startup and is immutable for the process lifetime.

use crate::provider::EmbeddingProvider;
use crate::types::KnownIdentity;
use std::io;
use std::path::Path;

/// Enrolled identities in build order.
///
/// Build order doubles as tie-break priority during matching: when two
/// entries are equidistant from a probe, the earlier one wins.
pub struct Registry {
    entries: Vec<KnownIdentity>,
}

impl Registry {
    /// Construct a registry from pre-built entries (fabricated registries
    /// for tests, or a future cache path).
    pub fn from_entries(entries: Vec<KnownIdentity>) -> Registry {
        Registry { entries }
    }

    /// Build the registry from a directory of reference images.
    ///
    /// The directory is created if missing. Hidden files are excluded;
    /// unreadable images and images with no detectable face are skipped
    /// with a warning. An empty result is the valid "no one enrolled yet"
    /// state, not an error.
    pub fn build(dir: &Path, provider: &mut dyn EmbeddingProvider) -> io::Result<Registry> {
        if !dir.exists() {
            std::fs::create_dir_all(dir)?;
            tracing::warn!(
                dir = %dir.display(),
                "reference image directory created; add face images to enroll identities"
            );
            return Ok(Registry::from_entries(Vec::new()));
        }

        let mut files: Vec<_> = std::fs::read_dir(dir)?
            .filter_map(|entry| entry.ok())
            .map(|entry| entry.path())
            .filter(|path| path.is_file())
            .filter(|path| {
                path.file_name()
                    .and_then(|name| name.to_str())
                    .is_some_and(|name| !name.starts_with('.'))
            })
            .collect();
        // Enumeration order becomes tie-break priority; sort so it is
        // deterministic across platforms.
        files.sort();

        let mut entries = Vec::new();
        for path in files {
            let image = match image::open(&path) {
                Ok(image) => image.to_luma8(),
                Err(err) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %err,
                        "skipping unreadable reference image"
                    );
                    continue;
                }
            };

            let faces = match provider.detect_and_embed(&image) {
                Ok(faces) => faces,
                Err(err) => {
                    tracing::warn!(
                        file = %path.display(),
                        error = %err,
                        "embedding failed for reference image, skipping"
                    );
                    continue;
                }
            };

            // One face expected per reference image; keep the first detection.
            let Some(face) = faces.into_iter().next() else {
                tracing::warn!(file = %path.display(), "no face detected in reference image, skipping");
                continue;
            };

            let name = path
                .file_name()
                .and_then(|name| name.to_str())
                .map(display_name)
                .unwrap_or_default();

            tracing::info!(name = %name, file = %path.display(), "enrolled identity");
            entries.push(KnownIdentity {
                name,
                embedding: face.embedding,
            });
        }

        if entries.is_empty() {
            tracing::warn!(dir = %dir.display(), "no usable reference images; registry is empty");
        }

        Ok(Registry::from_entries(entries))
    }

    pub fn entries(&self) -> &[KnownIdentity] {
        &self.entries
    }

    pub fn len(&self) -> usize {
        self.entries.len()
    }

    pub fn is_empty(&self) -> bool {
        self.entries.is_empty()
    }
}

/// Derive a display name from a reference image file name: extension
/// stripped, first character uppercased, the rest lowercased.
pub fn display_name(file_name: &str) -> String {
    let stem = file_name
        .rsplit_once('.')
        .map(|(stem, _)| stem)
        .unwrap_or(file_name);
    let mut chars = stem.chars();
    match chars.next() {
        Some(first) => first
            .to_uppercase()
            .chain(chars.flat_map(|c| c.to_lowercase()))
            .collect(),
        None => String::new(),
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::provider::ProviderError;
    use crate::types::{BoundingBox, DetectedFace, Embedding};
    use image::GrayImage;
    use std::collections::VecDeque;

    /// Provider returning queued responses in call order.
    struct QueueProvider {
        responses: VecDeque<Vec<DetectedFace>>,
        calls: usize,
    }

    impl QueueProvider {
        fn new(responses: Vec<Vec<DetectedFace>>) -> QueueProvider {
            QueueProvider {
                responses: responses.into(),
                calls: 0,
            }
        }
    }

    impl EmbeddingProvider for QueueProvider {
        fn detect_and_embed(
            &mut self,
            _frame: &GrayImage,
        ) -> Result<Vec<DetectedFace>, ProviderError> {
            self.calls += 1;
            Ok(self.responses.pop_front().unwrap_or_default())
        }
    }

    fn face(seed: f32) -> DetectedFace {
        DetectedFace {
            embedding: Embedding {
                values: vec![seed, seed + 1.0],
                model_version: None,
            },
            region: BoundingBox {
                x: 0.0,
                y: 0.0,
                width: 10.0,
                height: 10.0,
                confidence: 0.9,
                landmarks: None,
            },
        }
    }

    fn write_image(path: &std::path::Path) {
        GrayImage::new(8, 8).save(path).unwrap();
    }

    #[test]
    fn test_missing_directory_created_and_empty() {
        let tmp = tempfile::tempdir().unwrap();
        let dir = tmp.path().join("faces");
        let mut provider = QueueProvider::new(vec![]);

        let registry = Registry::build(&dir, &mut provider).unwrap();

        assert!(registry.is_empty());
        assert!(dir.is_dir());
        assert_eq!(provider.calls, 0);
    }

    #[test]
    fn test_empty_directory_is_valid() {
        let tmp = tempfile::tempdir().unwrap();
        let mut provider = QueueProvider::new(vec![]);

        let registry = Registry::build(tmp.path(), &mut provider).unwrap();

        assert!(registry.is_empty());
        assert_eq!(provider.calls, 0);
    }

    #[test]
    fn test_build_enrolls_in_sorted_order() {
        let tmp = tempfile::tempdir().unwrap();
        write_image(&tmp.path().join("bob.png"));
        write_image(&tmp.path().join("alice.png"));
        let mut provider = QueueProvider::new(vec![vec![face(1.0)], vec![face(2.0)]]);

        let registry = Registry::build(tmp.path(), &mut provider).unwrap();

        assert_eq!(registry.len(), 2);
        // alice.png enumerates before bob.png
        assert_eq!(registry.entries()[0].name, "Alice");
        assert_eq!(registry.entries()[1].name, "Bob");
        assert_eq!(registry.entries()[0].embedding.values, vec![1.0, 2.0]);
        assert_eq!(registry.entries()[1].embedding.values, vec![2.0, 3.0]);
    }

    #[test]
    fn test_hidden_files_excluded() {
        let tmp = tempfile::tempdir().unwrap();
        write_image(&tmp.path().join(".hidden.png"));
        write_image(&tmp.path().join("carol.png"));
        let mut provider = QueueProvider::new(vec![vec![face(1.0)]]);

        let registry = Registry::build(tmp.path(), &mut provider).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].name, "Carol");
        assert_eq!(provider.calls, 1);
    }

    #[test]
    fn test_unreadable_file_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        std::fs::write(tmp.path().join("broken.jpg"), b"not an image").unwrap();
        write_image(&tmp.path().join("dave.png"));
        let mut provider = QueueProvider::new(vec![vec![face(1.0)]]);

        let registry = Registry::build(tmp.path(), &mut provider).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].name, "Dave");
        // Only the decodable image reaches the provider.
        assert_eq!(provider.calls, 1);
    }

    #[test]
    fn test_no_face_image_skipped() {
        let tmp = tempfile::tempdir().unwrap();
        write_image(&tmp.path().join("empty.png"));
        write_image(&tmp.path().join("frank.png"));
        let mut provider = QueueProvider::new(vec![vec![], vec![face(1.0)]]);

        let registry = Registry::build(tmp.path(), &mut provider).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].name, "Frank");
    }

    #[test]
    fn test_first_face_kept_for_multi_face_image() {
        let tmp = tempfile::tempdir().unwrap();
        write_image(&tmp.path().join("pair.png"));
        let mut provider = QueueProvider::new(vec![vec![face(5.0), face(9.0)]]);

        let registry = Registry::build(tmp.path(), &mut provider).unwrap();

        assert_eq!(registry.len(), 1);
        assert_eq!(registry.entries()[0].embedding.values, vec![5.0, 6.0]);
    }

    #[test]
    fn test_display_name_strips_extension_and_capitalizes() {
        assert_eq!(display_name("alice.jpg"), "Alice");
        assert_eq!(display_name("BOB.png"), "Bob");
        assert_eq!(display_name("carol"), "Carol");
        assert_eq!(display_name("mary ann.jpeg"), "Mary ann");
        assert_eq!(display_name("photo.backup.png"), "Photo.backup");
        assert_eq!(display_name(""), "");
    }
}
