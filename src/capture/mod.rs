pub mod camera;
pub mod frame;
mod source;

pub use camera::{CameraConfig, CameraSource};
pub use frame::{SampledFrame, DEFAULT_JPEG_QUALITY};
pub use source::{CaptureError, CaptureSession, FrameExtractionError, FrameSource, NotReadyReason};
