//! rollcall-core — face recognition domain for the attendance pipeline.
//!
//! Builds the identity registry from a directory of reference images and
//! matches faces detected in incoming frames against it by nearest embedding
//! distance. Detection and embedding run via ONNX Runtime (SCRFD + ArcFace)
//! behind the [`EmbeddingProvider`] capability trait, so the registry and
//! engine never depend on a particular model.

pub mod engine;
pub mod onnx;
pub mod provider;
pub mod registry;
pub mod types;

pub use engine::recognize;
pub use onnx::OnnxProvider;
pub use provider::{EmbeddingProvider, ProviderError};
pub use registry::Registry;
pub use types::{BoundingBox, DetectedFace, Embedding, KnownIdentity, Recognition};
