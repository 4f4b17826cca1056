use std::fmt;
use std::time::Duration;

use chrono::{DateTime, Utc};
use image::RgbImage;
use serde::Serialize;
use thiserror::Error;
use uuid::Uuid;

/// Startup failures. Fatal to the loop and never retried.
#[derive(Debug, Error)]
pub enum CaptureError {
    #[error("camera permission denied")]
    PermissionDenied,

    #[error("no camera device available")]
    NoDevice,

    #[error("failed to open camera {index}: {reason}")]
    Open { index: u32, reason: String },

    #[error("camera playback failed: {0}")]
    Playback(String),

    #[error("camera delivered no frame within {0:?}")]
    StartupTimeout(Duration),
}

/// Per-tick failures. Logged by the loop, never surfaced to the user.
#[derive(Debug, Error)]
pub enum FrameExtractionError {
    #[error("frame not ready: {0}")]
    NotReady(NotReadyReason),

    #[error("frame encoding failed: {0}")]
    Encode(#[from] image::ImageError),
}

#[derive(Debug, Clone, Copy, PartialEq, Eq)]
pub enum NotReadyReason {
    NoSource,
    InvalidDimensions { width: u32, height: u32 },
    NoBufferedData,
}

impl fmt::Display for NotReadyReason {
    fn fmt(&self, f: &mut fmt::Formatter<'_>) -> fmt::Result {
        match self {
            NotReadyReason::NoSource => write!(f, "no capture source"),
            NotReadyReason::InvalidDimensions { width, height } => {
                write!(f, "invalid frame dimensions {width}x{height}")
            }
            NotReadyReason::NoBufferedData => write!(f, "no buffered frame data"),
        }
    }
}

/// An open camera stream. Dimensions are what the device actually delivers,
/// which may differ from the requested resolution.
#[derive(Debug, Clone, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct CaptureSession {
    pub id: Uuid,
    pub device_index: u32,
    pub width: u32,
    pub height: u32,
    pub started_at: DateTime<Utc>,
}

impl CaptureSession {
    pub fn new(device_index: u32, width: u32, height: u32) -> Self {
        Self {
            id: Uuid::new_v4(),
            device_index,
            width,
            height,
            started_at: Utc::now(),
        }
    }
}

/// Anything the scheduling loop can sample stills from.
pub trait FrameSource: Send + 'static {
    /// `None` once the source has been torn down.
    fn session(&self) -> Option<&CaptureSession>;

    fn readiness(&self) -> Result<(), NotReadyReason>;

    fn current_frame_ready(&self) -> bool {
        self.readiness().is_ok()
    }

    fn capture_still(&mut self) -> Result<RgbImage, FrameExtractionError>;

    /// Stop the device and release the session. Idempotent.
    fn teardown(&mut self);
}
