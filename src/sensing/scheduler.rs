use std::future::Future;

use tokio::sync::mpsc;
use tokio::time::{self, Duration, Interval, MissedTickBehavior};

/// Source of scheduling ticks for the recognition loop.
pub trait TickScheduler: Send + 'static {
    /// Resolves at the next tick. `false` means no more ticks will ever come.
    fn next_tick(&mut self) -> impl Future<Output = bool> + Send;
}

/// Ticks at a fixed rate, standing in for the display refresh. Late ticks are
/// skipped rather than bunched up.
pub struct FrameRateScheduler {
    interval: Interval,
}

impl FrameRateScheduler {
    pub fn new(rate_hz: u32) -> Self {
        let period = Duration::from_secs_f64(1.0 / f64::from(rate_hz.max(1)));
        let mut interval = time::interval(period);
        interval.set_missed_tick_behavior(MissedTickBehavior::Skip);
        Self { interval }
    }

    pub fn period(&self) -> Duration {
        self.interval.period()
    }
}

impl TickScheduler for FrameRateScheduler {
    fn next_tick(&mut self) -> impl Future<Output = bool> + Send {
        async move {
            self.interval.tick().await;
            true
        }
    }
}

/// Ticks only when told to through its [`ManualTicker`].
pub struct ManualScheduler {
    rx: mpsc::UnboundedReceiver<()>,
}

#[derive(Clone)]
pub struct ManualTicker {
    tx: mpsc::UnboundedSender<()>,
}

impl ManualScheduler {
    pub fn new() -> (Self, ManualTicker) {
        let (tx, rx) = mpsc::unbounded_channel();
        (Self { rx }, ManualTicker { tx })
    }
}

impl ManualTicker {
    /// Returns `false` once the scheduler has been dropped.
    pub fn tick(&self) -> bool {
        self.tx.send(()).is_ok()
    }
}

impl TickScheduler for ManualScheduler {
    fn next_tick(&mut self) -> impl Future<Output = bool> + Send {
        async move { self.rx.recv().await.is_some() }
    }
}

#[cfg(test)]
mod tests {
    use super::*;

    #[tokio::test(start_paused = true)]
    async fn frame_rate_scheduler_ticks_at_its_period() {
        let mut scheduler = FrameRateScheduler::new(50);
        assert_eq!(scheduler.period(), Duration::from_millis(20));

        let start = time::Instant::now();
        for _ in 0..6 {
            assert!(scheduler.next_tick().await);
        }
        // First tick is immediate; five periods follow.
        assert_eq!(start.elapsed(), Duration::from_millis(100));
    }

    #[tokio::test]
    async fn zero_rate_is_clamped() {
        assert_eq!(FrameRateScheduler::new(0).period(), Duration::from_secs(1));
    }

    #[tokio::test]
    async fn manual_scheduler_ends_when_ticker_dropped() {
        let (mut scheduler, ticker) = ManualScheduler::new();
        assert!(ticker.tick());
        assert!(scheduler.next_tick().await);

        drop(ticker);
        assert!(!scheduler.next_tick().await);
    }
}
