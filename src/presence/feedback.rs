use std::io::Write;

use chrono::Local;
use serde::Serialize;

use crate::audio::{Cue, CuePlayer};

use super::PresenceEvent;

const ENABLE_LOGS: bool = true;

use crate::{log_debug, log_warn};

#[derive(Debug, Clone, Copy, Serialize, PartialEq, Eq)]
#[serde(rename_all = "camelCase")]
pub enum Severity {
    Success,
    Error,
}

#[derive(Debug, Clone, Serialize, PartialEq, Eq)]
pub struct StatusMessage {
    pub text: String,
    pub severity: Severity,
}

impl StatusMessage {
    pub fn success(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Success,
        }
    }

    pub fn error(text: impl Into<String>) -> Self {
        Self {
            text: text.into(),
            severity: Severity::Error,
        }
    }
}

/// The single user-visible status slot. Every call overwrites the previous message.
pub trait StatusDisplay: Send {
    fn show(&mut self, status: StatusMessage);
}

/// Writes each status change as one line on stdout.
#[derive(Default)]
pub struct TerminalStatus {
    current: Option<StatusMessage>,
}

impl TerminalStatus {
    pub fn new() -> Self {
        Self::default()
    }

    pub fn current(&self) -> Option<&StatusMessage> {
        self.current.as_ref()
    }
}

impl StatusDisplay for TerminalStatus {
    fn show(&mut self, status: StatusMessage) {
        let marker = match status.severity {
            Severity::Success => "[ok] ",
            Severity::Error => "[!!] ",
        };
        let mut stdout = std::io::stdout().lock();
        let _ = writeln!(
            stdout,
            "{} {}{}",
            Local::now().format("%H:%M:%S"),
            marker,
            status.text
        );
        let _ = stdout.flush();
        self.current = Some(status);
    }
}

/// Routes presence events to the status slot and the matching audio cue.
pub struct Feedback {
    display: Box<dyn StatusDisplay>,
    cues: Box<dyn CuePlayer>,
}

impl Feedback {
    pub fn new(display: impl StatusDisplay + 'static, cues: impl CuePlayer + 'static) -> Self {
        Self {
            display: Box::new(display),
            cues: Box::new(cues),
        }
    }

    pub fn show(&mut self, status: StatusMessage) {
        self.display.show(status);
    }

    pub fn emit(&mut self, event: &PresenceEvent) {
        self.display.show(event.status());
        self.play_cue(event.cue());
    }

    /// Best-effort: unloaded cues are skipped, playback errors only logged.
    fn play_cue(&self, cue: Cue) {
        if !self.cues.is_loaded(cue) {
            log_debug!("{cue:?} cue not loaded; skipping playback");
            return;
        }
        if let Err(err) = self.cues.play(cue) {
            log_warn!("failed to play {cue:?} cue: {err}");
        }
    }
}
