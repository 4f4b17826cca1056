use std::future::Future;
use std::sync::Arc;

use anyhow::{bail, Context, Result};
use log::info;
use tokio::sync::watch;
use tokio::task::JoinHandle;
use tokio_util::sync::CancellationToken;

use crate::capture::{CaptureError, FrameSource};
use crate::presence::{Feedback, StatusMessage};
use crate::recognition::RecognitionClient;

use super::loop_worker::{recognition_loop, LoopConfig, LoopStats};
use super::scheduler::TickScheduler;

/// Owns the running recognition loop: start, pause/resume, teardown.
pub struct SensingController {
    handle: Option<JoinHandle<LoopStats>>,
    cancel_token: Option<CancellationToken>,
    active_tx: Option<watch::Sender<bool>>,
}

impl Default for SensingController {
    fn default() -> Self {
        Self::new()
    }
}

impl SensingController {
    pub fn new() -> Self {
        Self {
            handle: None,
            cancel_token: None,
            active_tx: None,
        }
    }

    /// Wait for the capture source, report the outcome on the status slot, and
    /// start the loop only if the camera came up. Capture failures are not retried.
    pub async fn launch<S, C, T, F>(
        initialize: F,
        client: C,
        scheduler: T,
        mut feedback: Feedback,
        config: LoopConfig,
    ) -> Result<Self, CaptureError>
    where
        S: FrameSource,
        C: RecognitionClient,
        T: TickScheduler,
        F: Future<Output = Result<S, CaptureError>>,
    {
        match initialize.await {
            Ok(source) => {
                feedback.show(StatusMessage::success("Camera initialized successfully"));
                let mut controller = Self::new();
                controller.spawn_loop(source, client, scheduler, feedback, config);
                Ok(controller)
            }
            Err(err) => {
                log::error!("error accessing camera: {err}");
                feedback.show(StatusMessage::error(format!("Error accessing camera: {err}")));
                Err(err)
            }
        }
    }

    pub fn start<S, C, T>(
        &mut self,
        source: S,
        client: C,
        scheduler: T,
        feedback: Feedback,
        config: LoopConfig,
    ) -> Result<()>
    where
        S: FrameSource,
        C: RecognitionClient,
        T: TickScheduler,
    {
        if self.handle.is_some() {
            bail!("recognition loop already running");
        }
        self.spawn_loop(source, client, scheduler, feedback, config);
        Ok(())
    }

    fn spawn_loop<S, C, T>(
        &mut self,
        source: S,
        client: C,
        scheduler: T,
        feedback: Feedback,
        config: LoopConfig,
    ) where
        S: FrameSource,
        C: RecognitionClient,
        T: TickScheduler,
    {
        let cancel_token = CancellationToken::new();
        let (active_tx, active_rx) = watch::channel(true);

        let handle = tokio::spawn(recognition_loop(
            source,
            Arc::new(client),
            scheduler,
            feedback,
            config,
            active_rx,
            cancel_token.clone(),
        ));

        self.handle = Some(handle);
        self.cancel_token = Some(cancel_token);
        self.active_tx = Some(active_tx);
    }

    pub fn is_running(&self) -> bool {
        self.handle.as_ref().is_some_and(|handle| !handle.is_finished())
    }

    /// Pause or resume processing without releasing the camera.
    pub fn set_active(&self, active: bool) {
        if let Some(tx) = &self.active_tx {
            let _ = tx.send(active);
        }
    }

    /// Mark processing inactive, stop the loop and release the camera.
    /// Requests still in flight are left to finish; their results are dropped.
    pub async fn teardown(&mut self) -> Result<LoopStats> {
        if let Some(tx) = self.active_tx.take() {
            let _ = tx.send(false);
        }
        if let Some(token) = self.cancel_token.take() {
            token.cancel();
        }

        let Some(handle) = self.handle.take() else {
            return Ok(LoopStats::default());
        };
        let stats = handle
            .await
            .context("recognition loop task failed to join")?;
        info!(
            "recognition loop stopped after {} ticks: {} frames submitted, {} results applied, {} events",
            stats.ticks, stats.frames_submitted, stats.results_applied, stats.events_emitted
        );
        Ok(stats)
    }
}

#[cfg(test)]
mod tests {
    use super::*;
    use crate::presence::Severity;
    use crate::sensing::scheduler::ManualScheduler;
    use crate::testing::{settle, FakeClient, FakeSource, RecordingCues, RecordingDisplay};

    #[tokio::test(start_paused = true)]
    async fn permission_denied_reports_error_and_never_starts() {
        let display = RecordingDisplay::default();
        let feedback = Feedback::new(display.clone(), RecordingCues::loaded());
        let (client, mut requests) = FakeClient::new();
        let (scheduler, ticker) = ManualScheduler::new();

        let result = SensingController::launch(
            async { Err::<FakeSource, _>(CaptureError::PermissionDenied) },
            client,
            scheduler,
            feedback,
            LoopConfig::default(),
        )
        .await;

        assert!(matches!(result, Err(CaptureError::PermissionDenied)));
        let messages = display.messages();
        assert_eq!(messages.len(), 1);
        assert_eq!(messages[0].severity, Severity::Error);
        assert!(messages[0].text.contains("permission denied"));

        // The scheduler went down with the failed launch.
        assert!(!ticker.tick());
        assert!(requests.try_recv().is_err());
    }

    #[tokio::test(start_paused = true)]
    async fn successful_launch_reports_and_runs() {
        let display = RecordingDisplay::default();
        let feedback = Feedback::new(display.clone(), RecordingCues::loaded());
        let (client, mut requests) = FakeClient::new();
        let (scheduler, ticker) = ManualScheduler::new();
        let source = FakeSource::ready();

        let mut controller = SensingController::launch(
            async { Ok(source.clone()) },
            client,
            scheduler,
            feedback,
            LoopConfig::default(),
        )
        .await
        .unwrap();

        assert!(controller.is_running());
        assert_eq!(
            display.messages(),
            vec![StatusMessage::success("Camera initialized successfully")]
        );

        ticker.tick();
        settle().await;
        assert!(requests.try_recv().is_ok());

        let stats = controller.teardown().await.unwrap();
        assert_eq!(stats.frames_submitted, 1);
        assert!(source.is_torn_down());
        assert!(!controller.is_running());
    }

    #[tokio::test(start_paused = true)]
    async fn start_twice_is_rejected() {
        let (client_a, _requests_a) = FakeClient::new();
        let (client_b, _requests_b) = FakeClient::new();
        let (scheduler_a, _ticker_a) = ManualScheduler::new();
        let (scheduler_b, _ticker_b) = ManualScheduler::new();
        let mut controller = SensingController::new();

        controller
            .start(
                FakeSource::ready(),
                client_a,
                scheduler_a,
                Feedback::new(RecordingDisplay::default(), RecordingCues::loaded()),
                LoopConfig::default(),
            )
            .unwrap();
        let second = controller.start(
            FakeSource::ready(),
            client_b,
            scheduler_b,
            Feedback::new(RecordingDisplay::default(), RecordingCues::loaded()),
            LoopConfig::default(),
        );

        assert!(second.is_err());
        controller.teardown().await.unwrap();
    }

    #[tokio::test(start_paused = true)]
    async fn pause_and_resume_gate_sampling() {
        let (client, mut requests) = FakeClient::new();
        let (scheduler, ticker) = ManualScheduler::new();
        let mut controller = SensingController::new();
        controller
            .start(
                FakeSource::ready(),
                client,
                scheduler,
                Feedback::new(RecordingDisplay::default(), RecordingCues::loaded()),
                LoopConfig::default(),
            )
            .unwrap();

        controller.set_active(false);
        settle().await;
        ticker.tick();
        settle().await;
        assert!(requests.try_recv().is_err());

        controller.set_active(true);
        settle().await;
        ticker.tick();
        settle().await;
        assert!(requests.try_recv().is_ok());

        let stats = controller.teardown().await.unwrap();
        assert_eq!(stats.idle_ticks, 1);
    }

    #[tokio::test]
    async fn teardown_without_start_is_a_no_op() {
        let mut controller = SensingController::new();
        assert_eq!(controller.teardown().await.unwrap(), LoopStats::default());
    }
}
