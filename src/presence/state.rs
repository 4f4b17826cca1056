use std::time::Duration;

use serde::Serialize;
use tokio::time::Instant;

use crate::recognition::RecognitionResult;

use super::PresenceEvent;

/// Minimum quiet time before a repeated welcome/absence is surfaced again.
pub const DEBOUNCE_WINDOW: Duration = Duration::from_millis(5000);

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Presence {
    /// No face confirmed within the debounce window.
    Awaiting,
    /// A face was confirmed recently.
    Present,
}

#[derive(Debug, Clone)]
pub struct PresenceState {
    pub presence: Presence,
    /// Last time a face was seen. Welcomes and absences are both measured from here.
    pub last_event_at: Instant,
    /// Set when an absence is reported, cleared by the next face. Keeps one
    /// absence per window while nobody is in view.
    pub last_absence_at: Option<Instant>,
    pub is_active: bool,
    /// Highest frame sequence whose result has been applied.
    pub last_applied_sequence: Option<u64>,
}

impl PresenceState {
    pub fn new(now: Instant) -> Self {
        Self {
            presence: Presence::Awaiting,
            last_event_at: now,
            last_absence_at: None,
            is_active: true,
            last_applied_sequence: None,
        }
    }

    pub fn since_last_event(&self, now: Instant) -> Duration {
        now.saturating_duration_since(self.last_event_at)
    }

    fn absence_reported_within(&self, now: Instant, window: Duration) -> bool {
        self.last_absence_at
            .is_some_and(|at| now.saturating_duration_since(at) <= window)
    }
}

#[derive(Debug, Clone, PartialEq)]
pub enum ApplyOutcome {
    /// Processing is disabled (torn down or paused); nothing was touched.
    Inactive,
    /// A newer frame's result was already applied.
    Stale { sequence: u64, newest: u64 },
    Applied(Vec<PresenceEvent>),
}

/// Turns the stream of recognition results into debounced presence events.
/// Pure state: the caller supplies the clock and performs the side effects.
#[derive(Debug, Clone)]
pub struct PresenceMachine {
    state: PresenceState,
    window: Duration,
}

impl PresenceMachine {
    pub fn new(window: Duration, now: Instant) -> Self {
        Self {
            state: PresenceState::new(now),
            window,
        }
    }

    pub fn state(&self) -> &PresenceState {
        &self.state
    }

    pub fn window(&self) -> Duration {
        self.window
    }

    pub fn set_active(&mut self, active: bool) {
        self.state.is_active = active;
    }

    pub fn apply(&mut self, result: &RecognitionResult, now: Instant) -> ApplyOutcome {
        if !self.state.is_active {
            return ApplyOutcome::Inactive;
        }

        if let Some(newest) = self.state.last_applied_sequence {
            if result.sequence <= newest {
                return ApplyOutcome::Stale {
                    sequence: result.sequence,
                    newest,
                };
            }
        }
        self.state.last_applied_sequence = Some(result.sequence);

        let mut events = Vec::new();

        for face in &result.faces {
            if self.state.since_last_event(now) > self.window {
                events.push(PresenceEvent::Welcome {
                    name: face.name.clone(),
                });
                self.state.presence = Presence::Present;
            }
            self.state.last_event_at = now;
            self.state.last_absence_at = None;
        }

        // Read after the per-face updates. Only empty results get here, and
        // those make no per-face updates, so this equals the start-of-pass value.
        // Absences never move `last_event_at`, so a returning face is still
        // measured against the last sighting.
        if result.faces.is_empty()
            && self.state.since_last_event(now) > self.window
            && !self.state.absence_reported_within(now, self.window)
        {
            events.push(PresenceEvent::Absence);
            self.state.presence = Presence::Awaiting;
            self.state.last_absence_at = Some(now);
        }

        ApplyOutcome::Applied(events)
    }
}
