//! In-process fakes for the capture, recognition and feedback seams.

use std::future::Future;
use std::sync::atomic::{AtomicBool, AtomicUsize, Ordering};
use std::sync::{Arc, Mutex};
use std::time::Duration;

use image::{Rgb, RgbImage};
use tokio::sync::{mpsc, oneshot};

use crate::audio::{AudioError, Cue, CuePlayer};
use crate::capture::{
    CaptureSession, FrameExtractionError, FrameSource, NotReadyReason, SampledFrame,
};
use crate::presence::{StatusDisplay, StatusMessage};
use crate::recognition::{
    RecognitionClient, RecognitionError, RecognitionResult, RecognizedFace, SubmitOutcome,
};

/// Let spawned tasks run. Under a paused clock the sleep completes as soon as
/// the runtime is otherwise idle.
pub async fn settle() {
    tokio::time::sleep(Duration::from_millis(1)).await;
}

/// A camera that always has the same still. Clones share capture counters and
/// teardown state.
#[derive(Clone)]
pub struct FakeSource {
    session: CaptureSession,
    still: RgbImage,
    captures: Arc<AtomicUsize>,
    fail_next: Arc<AtomicBool>,
    torn_down: Arc<AtomicBool>,
}

impl FakeSource {
    pub fn ready() -> Self {
        Self::with_still(RgbImage::from_pixel(32, 24, Rgb([90, 120, 150])))
    }

    /// Playing, but reporting a 0x0 frame.
    pub fn zero_sized() -> Self {
        Self::with_still(RgbImage::new(0, 0))
    }

    fn with_still(still: RgbImage) -> Self {
        Self {
            session: CaptureSession::new(0, still.width(), still.height()),
            still,
            captures: Arc::new(AtomicUsize::new(0)),
            fail_next: Arc::new(AtomicBool::new(false)),
            torn_down: Arc::new(AtomicBool::new(false)),
        }
    }

    pub fn captures(&self) -> usize {
        self.captures.load(Ordering::SeqCst)
    }

    pub fn fail_next_capture(&self) {
        self.fail_next.store(true, Ordering::SeqCst);
    }

    pub fn is_torn_down(&self) -> bool {
        self.torn_down.load(Ordering::SeqCst)
    }
}

impl FrameSource for FakeSource {
    fn session(&self) -> Option<&CaptureSession> {
        (!self.is_torn_down()).then_some(&self.session)
    }

    fn readiness(&self) -> Result<(), NotReadyReason> {
        if self.is_torn_down() {
            return Err(NotReadyReason::NoSource);
        }
        let (width, height) = self.still.dimensions();
        if width == 0 || height == 0 {
            return Err(NotReadyReason::InvalidDimensions { width, height });
        }
        Ok(())
    }

    fn capture_still(&mut self) -> Result<RgbImage, FrameExtractionError> {
        if self.fail_next.swap(false, Ordering::SeqCst) {
            return Err(FrameExtractionError::NotReady(NotReadyReason::NoBufferedData));
        }
        self.captures.fetch_add(1, Ordering::SeqCst);
        Ok(self.still.clone())
    }

    fn teardown(&mut self) {
        self.torn_down.store(true, Ordering::SeqCst);
    }
}

/// A submitted frame waiting for the test to decide what the service says.
pub struct PendingRequest {
    pub frame: SampledFrame,
    reply: oneshot::Sender<Result<SubmitOutcome, RecognitionError>>,
}

impl PendingRequest {
    pub fn recognized(self, faces: Vec<RecognizedFace>) {
        let result = RecognitionResult {
            sequence: self.frame.sequence,
            faces,
        };
        let _ = self.reply.send(Ok(SubmitOutcome::Recognized(result)));
    }

    pub fn rejected(self) {
        let _ = self.reply.send(Ok(SubmitOutcome::Rejected {
            error: Some("No face found in frame".into()),
        }));
    }

    pub fn failed(self, err: RecognitionError) {
        let _ = self.reply.send(Err(err));
    }
}

/// Hands every submission to the test through a channel and waits for its reply.
pub struct FakeClient {
    tx: mpsc::UnboundedSender<PendingRequest>,
}

impl FakeClient {
    pub fn new() -> (Self, mpsc::UnboundedReceiver<PendingRequest>) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { tx }, rx)
    }
}

impl RecognitionClient for FakeClient {
    fn submit(
        &self,
        frame: SampledFrame,
    ) -> impl Future<Output = Result<SubmitOutcome, RecognitionError>> + Send {
        let (reply, rx) = oneshot::channel();
        let delivered = self.tx.send(PendingRequest { frame, reply }).is_ok();
        async move {
            if !delivered {
                return Err(RecognitionError::Decode("test harness went away".into()));
            }
            rx.await
                .unwrap_or_else(|_| Err(RecognitionError::Decode("request abandoned".into())))
        }
    }
}

#[derive(Clone, Default)]
pub struct RecordingDisplay {
    messages: Arc<Mutex<Vec<StatusMessage>>>,
}

impl RecordingDisplay {
    pub fn messages(&self) -> Vec<StatusMessage> {
        self.messages.lock().unwrap().clone()
    }
}

impl StatusDisplay for RecordingDisplay {
    fn show(&mut self, status: StatusMessage) {
        self.messages.lock().unwrap().push(status);
    }
}

#[derive(Clone)]
pub struct RecordingCues {
    loaded: bool,
    failing: bool,
    played: Arc<Mutex<Vec<Cue>>>,
}

impl RecordingCues {
    pub fn loaded() -> Self {
        Self::build(true, false)
    }

    pub fn unloaded() -> Self {
        Self::build(false, false)
    }

    /// Loaded, but every playback errors.
    pub fn failing() -> Self {
        Self::build(true, true)
    }

    fn build(loaded: bool, failing: bool) -> Self {
        Self {
            loaded,
            failing,
            played: Arc::new(Mutex::new(Vec::new())),
        }
    }

    pub fn played(&self) -> Vec<Cue> {
        self.played.lock().unwrap().clone()
    }
}

impl CuePlayer for RecordingCues {
    fn is_loaded(&self, _cue: Cue) -> bool {
        self.loaded
    }

    fn play(&self, cue: Cue) -> Result<(), AudioError> {
        if self.failing {
            return Err(AudioError::Engine("no output device".into()));
        }
        self.played.lock().unwrap().push(cue);
        Ok(())
    }
}
