pub mod feedback;
pub mod state;

pub use feedback::{Feedback, Severity, StatusDisplay, StatusMessage, TerminalStatus};
pub use state::{ApplyOutcome, Presence, PresenceMachine, PresenceState, DEBOUNCE_WINDOW};

use crate::audio::Cue;

/// A state change worth telling the user about.
#[derive(Debug, Clone, PartialEq, Eq)]
pub enum PresenceEvent {
    Welcome { name: String },
    Absence,
}

impl PresenceEvent {
    pub fn status(&self) -> StatusMessage {
        match self {
            PresenceEvent::Welcome { name } => StatusMessage::success(format!("Welcome {name}!")),
            PresenceEvent::Absence => StatusMessage::error("No face detected"),
        }
    }

    pub fn cue(&self) -> Cue {
        match self {
            PresenceEvent::Welcome { .. } => Cue::Welcome,
            PresenceEvent::Absence => Cue::Absence,
        }
    }
}
