//! Webcam-backed frame source.
//!
//! `nokhwa::Camera` is `!Send`, so the device lives on a dedicated thread that
//! keeps decoding frames into a shared slot. The loop only ever copies the most
//! recent frame out of that slot.

use std::sync::{
    atomic::{AtomicBool, Ordering},
    Arc, Mutex,
};
use std::thread::{self, JoinHandle};
use std::time::{Duration, Instant};

use image::RgbImage;
use nokhwa::pixel_format::RgbFormat;
use nokhwa::utils::{
    CameraFormat, CameraIndex, FrameFormat, RequestedFormat, RequestedFormatType, Resolution,
};
use nokhwa::Camera;
use tokio::sync::oneshot;

use super::{CaptureError, CaptureSession, FrameExtractionError, FrameSource, NotReadyReason};

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_error, log_info, log_warn};

pub const PREFERRED_WIDTH: u32 = 640;
pub const PREFERRED_HEIGHT: u32 = 480;
const FRAME_RETRY_DELAY_MS: u64 = 50;
/// A buffered frame older than this many frame periods counts as no data.
const STALE_FRAME_PERIODS: u32 = 10;

#[derive(Debug, Clone)]
pub struct CameraConfig {
    /// 0 is the built-in, user-facing camera on laptops.
    pub device_index: u32,
    /// Preferred resolution. A hint only; the device picks the closest mode.
    pub width: u32,
    pub height: u32,
    pub fps: u32,
    pub startup_timeout: Duration,
}

impl Default for CameraConfig {
    fn default() -> Self {
        Self {
            device_index: 0,
            width: PREFERRED_WIDTH,
            height: PREFERRED_HEIGHT,
            fps: 30,
            startup_timeout: Duration::from_secs(10),
        }
    }
}

impl CameraConfig {
    fn stale_after(&self) -> Duration {
        Duration::from_secs(1) * STALE_FRAME_PERIODS / self.fps.max(1)
    }
}

struct BufferedFrame {
    image: RgbImage,
    decoded_at: Instant,
}

type LatestFrame = Arc<Mutex<Option<BufferedFrame>>>;

pub struct CameraSource {
    session: Option<CaptureSession>,
    latest: LatestFrame,
    stale_after: Duration,
    stop: Arc<AtomicBool>,
    worker: Option<JoinHandle<()>>,
}

impl CameraSource {
    /// Open the camera and wait until it has actually produced a decoded frame.
    pub async fn initialize(config: CameraConfig) -> Result<Self, CaptureError> {
        request_permission().await?;

        let latest: LatestFrame = Arc::new(Mutex::new(None));
        let stop = Arc::new(AtomicBool::new(false));
        let (ready_tx, ready_rx) = oneshot::channel();

        let worker = thread::Builder::new()
            .name("camera-capture".to_string())
            .spawn({
                let config = config.clone();
                let latest = Arc::clone(&latest);
                let stop = Arc::clone(&stop);
                move || capture_thread(config, latest, stop, ready_tx)
            })
            .map_err(|err| CaptureError::Playback(format!("failed to spawn capture thread: {err}")))?;

        let (width, height) = match tokio::time::timeout(config.startup_timeout, ready_rx).await {
            Ok(Ok(Ok(dimensions))) => dimensions,
            Ok(Ok(Err(err))) => return Err(err),
            Ok(Err(_)) => {
                return Err(CaptureError::Playback(
                    "capture thread exited before the stream started".into(),
                ))
            }
            Err(_) => {
                // The thread may be stuck inside the driver; leave it detached.
                stop.store(true, Ordering::SeqCst);
                return Err(CaptureError::StartupTimeout(config.startup_timeout));
            }
        };

        if width != config.width || height != config.height {
            log_info!(
                "camera {} delivers {}x{} (requested {}x{})",
                config.device_index, width, height, config.width, config.height
            );
        }

        let session = CaptureSession::new(config.device_index, width, height);
        log_info!("capture session {} started on camera {}", session.id, config.device_index);

        Ok(Self {
            session: Some(session),
            latest,
            stale_after: config.stale_after(),
            stop,
            worker: Some(worker),
        })
    }
}

impl FrameSource for CameraSource {
    fn session(&self) -> Option<&CaptureSession> {
        self.session.as_ref()
    }

    fn readiness(&self) -> Result<(), NotReadyReason> {
        if self.session.is_none() {
            return Err(NotReadyReason::NoSource);
        }

        let guard = self
            .latest
            .lock()
            .map_err(|_| NotReadyReason::NoBufferedData)?;
        match guard.as_ref() {
            None => Err(NotReadyReason::NoBufferedData),
            // The device stalled; resubmitting the last still would be a lie.
            Some(frame) if frame.decoded_at.elapsed() > self.stale_after => {
                Err(NotReadyReason::NoBufferedData)
            }
            Some(frame) if frame.image.width() == 0 || frame.image.height() == 0 => {
                Err(NotReadyReason::InvalidDimensions {
                    width: frame.image.width(),
                    height: frame.image.height(),
                })
            }
            Some(_) => Ok(()),
        }
    }

    fn capture_still(&mut self) -> Result<RgbImage, FrameExtractionError> {
        self.readiness().map_err(FrameExtractionError::NotReady)?;
        let guard = self
            .latest
            .lock()
            .map_err(|_| FrameExtractionError::NotReady(NotReadyReason::NoBufferedData))?;
        guard
            .as_ref()
            .map(|frame| frame.image.clone())
            .ok_or(FrameExtractionError::NotReady(NotReadyReason::NoBufferedData))
    }

    /// Signals the capture thread and returns without waiting on the driver.
    /// The thread stops the stream itself on its next pass.
    fn teardown(&mut self) {
        self.stop.store(true, Ordering::SeqCst);
        if let Some(handle) = self.worker.take() {
            if handle.is_finished() {
                if handle.join().is_err() {
                    log_error!("camera capture thread panicked");
                }
            } else {
                log_debug!("camera capture thread still in the driver; detaching");
            }
        }
        if let Some(session) = self.session.take() {
            log_info!("capture session {} stopped", session.id);
        }
        if let Ok(mut guard) = self.latest.lock() {
            *guard = None;
        }
    }
}

impl Drop for CameraSource {
    fn drop(&mut self) {
        self.teardown();
    }
}

#[cfg(target_os = "macos")]
async fn request_permission() -> Result<(), CaptureError> {
    let (tx, rx) = oneshot::channel();
    let tx = Mutex::new(Some(tx));
    nokhwa::nokhwa_initialize(move |granted| {
        if let Some(tx) = tx.lock().ok().and_then(|mut guard| guard.take()) {
            let _ = tx.send(granted);
        }
    });
    match rx.await {
        Ok(true) => Ok(()),
        _ => Err(CaptureError::PermissionDenied),
    }
}

#[cfg(not(target_os = "macos"))]
async fn request_permission() -> Result<(), CaptureError> {
    Ok(())
}

fn open_camera(config: &CameraConfig) -> Result<Camera, CaptureError> {
    let backend = nokhwa::native_api_backend().ok_or(CaptureError::NoDevice)?;
    let devices = nokhwa::query(backend).map_err(|err| classify_open_error(config, err))?;
    if devices.is_empty() {
        return Err(CaptureError::NoDevice);
    }

    let preferred = CameraFormat::new(
        Resolution::new(config.width, config.height),
        FrameFormat::MJPEG,
        config.fps,
    );
    let requested =
        RequestedFormat::new::<RgbFormat>(RequestedFormatType::Closest(preferred));

    let mut camera = Camera::new(CameraIndex::Index(config.device_index), requested)
        .map_err(|err| classify_open_error(config, err))?;
    camera
        .open_stream()
        .map_err(|err| CaptureError::Playback(err.to_string()))?;
    Ok(camera)
}

fn classify_open_error(config: &CameraConfig, err: nokhwa::NokhwaError) -> CaptureError {
    let reason = err.to_string();
    let lowered = reason.to_ascii_lowercase();
    if lowered.contains("permission") || lowered.contains("denied") || lowered.contains("not authorized") {
        CaptureError::PermissionDenied
    } else {
        CaptureError::Open {
            index: config.device_index,
            reason,
        }
    }
}

fn capture_thread(
    config: CameraConfig,
    latest: LatestFrame,
    stop: Arc<AtomicBool>,
    ready_tx: oneshot::Sender<Result<(u32, u32), CaptureError>>,
) {
    let mut ready_tx = Some(ready_tx);

    let mut camera = match open_camera(&config) {
        Ok(camera) => camera,
        Err(err) => {
            if let Some(tx) = ready_tx.take() {
                let _ = tx.send(Err(err));
            }
            return;
        }
    };

    while !stop.load(Ordering::SeqCst) {
        let buffer = match camera.frame() {
            Ok(buffer) => buffer,
            Err(err) => {
                // Before the first frame this is a playback failure, afterwards a hiccup.
                if let Some(tx) = ready_tx.take() {
                    let _ = tx.send(Err(CaptureError::Playback(err.to_string())));
                    break;
                }
                log_warn!("camera frame read failed: {err}");
                thread::sleep(Duration::from_millis(FRAME_RETRY_DELAY_MS));
                continue;
            }
        };

        let decoded = match buffer.decode_image::<RgbFormat>() {
            Ok(decoded) => decoded,
            Err(err) => {
                log_warn!("camera frame decode failed: {err}");
                continue;
            }
        };

        let (width, height) = (decoded.width(), decoded.height());
        let Some(frame) = RgbImage::from_raw(width, height, decoded.into_raw()) else {
            log_warn!("camera frame buffer does not match {width}x{height}");
            continue;
        };

        match latest.lock() {
            Ok(mut guard) => {
                *guard = Some(BufferedFrame {
                    image: frame,
                    decoded_at: Instant::now(),
                })
            }
            Err(_) => {
                log_error!("camera frame slot poisoned; stopping capture");
                break;
            }
        }

        if let Some(tx) = ready_tx.take() {
            log_debug!("first camera frame decoded ({width}x{height})");
            let _ = tx.send(Ok((width, height)));
        }
    }

    if let Err(err) = camera.stop_stream() {
        log_warn!("error stopping camera stream: {err}");
    }
}
