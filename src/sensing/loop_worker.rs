use std::sync::Arc;

use serde::Serialize;
use tokio::sync::{mpsc, watch};
use tokio::time::{Duration, Instant};
use tokio_util::sync::CancellationToken;

use crate::capture::{FrameSource, SampledFrame, DEFAULT_JPEG_QUALITY};
use crate::presence::{ApplyOutcome, Feedback, PresenceMachine, DEBOUNCE_WINDOW};
use crate::recognition::{RecognitionClient, RecognitionError, RecognitionResult, SubmitOutcome};

use super::scheduler::TickScheduler;

// Set to true to enable verbose logging in this module
const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_info, log_warn};

#[derive(Debug, Clone)]
pub struct LoopConfig {
    pub jpeg_quality: u8,
    /// 0 = no cap on concurrent requests.
    pub max_in_flight: usize,
    pub debounce_window: Duration,
}

impl Default for LoopConfig {
    fn default() -> Self {
        Self {
            jpeg_quality: DEFAULT_JPEG_QUALITY,
            max_in_flight: 0,
            debounce_window: DEBOUNCE_WINDOW,
        }
    }
}

#[derive(Debug, Clone, Default, PartialEq, Eq, Serialize)]
#[serde(rename_all = "camelCase")]
pub struct LoopStats {
    pub ticks: u64,
    /// Processing inactive or no session.
    pub idle_ticks: u64,
    pub unready_ticks: u64,
    pub throttled_ticks: u64,
    pub extraction_failures: u64,
    pub frames_submitted: u64,
    pub results_applied: u64,
    pub events_emitted: u64,
    pub rejected: u64,
    pub failed: u64,
    pub stale: u64,
    /// Results that arrived while processing was inactive.
    pub discarded: u64,
}

struct Completion {
    sequence: u64,
    outcome: Result<SubmitOutcome, RecognitionError>,
}

/// Everything the loop mutates. Lives on the loop task only, so presence and
/// status updates are serialized without locks.
struct Worker<S, C> {
    source: S,
    client: Arc<C>,
    feedback: Feedback,
    presence: PresenceMachine,
    config: LoopConfig,
    stats: LoopStats,
    last_sequence: u64,
    in_flight: usize,
    result_tx: mpsc::UnboundedSender<Completion>,
}

impl<S: FrameSource, C: RecognitionClient> Worker<S, C> {
    fn on_tick(&mut self) {
        self.stats.ticks += 1;

        if !self.presence.state().is_active || self.source.session().is_none() {
            self.stats.idle_ticks += 1;
            return;
        }

        if let Err(reason) = self.source.readiness() {
            self.stats.unready_ticks += 1;
            log_debug!("video not ready: {reason}");
            return;
        }

        if self.config.max_in_flight > 0 && self.in_flight >= self.config.max_in_flight {
            self.stats.throttled_ticks += 1;
            log_debug!("{} recognition requests in flight; skipping tick", self.in_flight);
            return;
        }

        let sequence = self.last_sequence + 1;
        let frame = match self
            .source
            .capture_still()
            .and_then(|still| SampledFrame::encode(sequence, &still, self.config.jpeg_quality))
        {
            Ok(frame) => frame,
            Err(err) => {
                self.stats.extraction_failures += 1;
                log_warn!("frame extraction failed: {err}");
                return;
            }
        };
        self.last_sequence = sequence;

        self.dispatch(frame);
    }

    /// Fire and continue: the tick never waits on the service.
    fn dispatch(&mut self, frame: SampledFrame) {
        let sequence = frame.sequence;
        let client = Arc::clone(&self.client);
        let result_tx = self.result_tx.clone();

        self.in_flight += 1;
        self.stats.frames_submitted += 1;

        tokio::spawn(async move {
            let outcome = client.submit(frame).await;
            // The loop may be gone by now; late results are dropped with the channel.
            let _ = result_tx.send(Completion { sequence, outcome });
        });
    }

    fn on_completion(&mut self, completion: Completion) {
        self.in_flight = self.in_flight.saturating_sub(1);

        match completion.outcome {
            Ok(SubmitOutcome::Recognized(result)) => self.apply(result),
            Ok(SubmitOutcome::Rejected { error }) => {
                self.stats.rejected += 1;
                log_debug!(
                    "frame {} rejected by service: {}",
                    completion.sequence,
                    error.as_deref().unwrap_or("no reason given")
                );
            }
            Err(err) => {
                self.stats.failed += 1;
                log_warn!("recognition for frame {} failed: {err}", completion.sequence);
            }
        }
    }

    fn apply(&mut self, result: RecognitionResult) {
        match self.presence.apply(&result, Instant::now()) {
            ApplyOutcome::Inactive => {
                self.stats.discarded += 1;
                log_debug!("processing inactive; dropping result for frame {}", result.sequence);
            }
            ApplyOutcome::Stale { sequence, newest } => {
                self.stats.stale += 1;
                log_debug!("dropping stale result for frame {sequence} (newest applied {newest})");
            }
            ApplyOutcome::Applied(events) => {
                self.stats.results_applied += 1;
                for event in &events {
                    log_info!("presence event: {event:?}");
                    self.feedback.emit(event);
                    self.stats.events_emitted += 1;
                }
            }
        }
    }

    fn set_active(&mut self, active: bool) {
        if self.presence.state().is_active != active {
            log_info!("recognition processing {}", if active { "resumed" } else { "paused" });
        }
        self.presence.set_active(active);
    }
}

/// Tick, sample, dispatch; apply results as they come back. Runs until the
/// token is cancelled or the scheduler runs dry, then tears the source down.
pub async fn recognition_loop<S, C, T>(
    source: S,
    client: Arc<C>,
    mut scheduler: T,
    feedback: Feedback,
    config: LoopConfig,
    mut active_rx: watch::Receiver<bool>,
    cancel_token: CancellationToken,
) -> LoopStats
where
    S: FrameSource,
    C: RecognitionClient,
    T: TickScheduler,
{
    let (result_tx, mut result_rx) = mpsc::unbounded_channel();
    let mut worker = Worker {
        source,
        client,
        feedback,
        presence: PresenceMachine::new(config.debounce_window, Instant::now()),
        config,
        stats: LoopStats::default(),
        last_sequence: 0,
        in_flight: 0,
        result_tx,
    };
    worker.set_active(*active_rx.borrow_and_update());
    let mut active_open = true;

    loop {
        tokio::select! {
            biased;
            _ = cancel_token.cancelled() => {
                log_info!("recognition loop shutting down");
                break;
            }
            changed = active_rx.changed(), if active_open => {
                if changed.is_ok() {
                    let active = *active_rx.borrow_and_update();
                    worker.set_active(active);
                } else {
                    active_open = false;
                }
            }
            Some(completion) = result_rx.recv() => {
                worker.on_completion(completion);
            }
            ticked = scheduler.next_tick() => {
                if !ticked {
                    log_info!("tick scheduler finished; stopping recognition loop");
                    break;
                }
                worker.on_tick();
            }
        }
    }

    worker.set_active(false);
    worker.source.teardown();

    if worker.in_flight > 0 {
        log_debug!("{} recognition requests still in flight at shutdown", worker.in_flight);
    }
    worker.stats
}
