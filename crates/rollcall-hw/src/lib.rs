//! rollcall-hw — camera capture for the attendance loop.
//!
//! V4L2 device access with YUYV/GREY format negotiation. Frames are
//! delivered as grayscale buffers ready for the recognition pipeline.

pub mod camera;
pub mod frame;

pub use camera::{Camera, CameraError, CameraStream, DeviceInfo, PixelFormat};
pub use frame::Frame;
