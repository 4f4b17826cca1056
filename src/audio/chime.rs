use rodio::Source;
use std::f32::consts::PI;
use std::time::Duration;

use super::Cue;

const SAMPLE_RATE: u32 = 44100;
const NOTE_SECS: f32 = 0.18;
const AMPLITUDE: f32 = 0.25;

/// Two-note chime used when no cue file is configured.
/// Rising for a welcome, falling for an absence.
pub struct Chime {
    notes: [f32; 2],
    sample_rate: u32,
    note_samples: usize,
    num_sample: usize,
}

impl Chime {
    pub fn new(first_freq: f32, second_freq: f32) -> Self {
        Self {
            notes: [first_freq, second_freq],
            sample_rate: SAMPLE_RATE,
            note_samples: (SAMPLE_RATE as f32 * NOTE_SECS) as usize,
            num_sample: 0,
        }
    }

    pub fn for_cue(cue: Cue) -> Self {
        match cue {
            Cue::Welcome => Self::new(659.25, 880.0), // E5 -> A5
            Cue::Absence => Self::new(523.25, 392.0), // C5 -> G4
        }
    }

    fn total_samples(&self) -> usize {
        self.note_samples * self.notes.len()
    }
}

impl Iterator for Chime {
    type Item = f32;

    fn next(&mut self) -> Option<Self::Item> {
        if self.num_sample >= self.total_samples() {
            return None;
        }

        let note = self.num_sample / self.note_samples;
        let in_note = (self.num_sample % self.note_samples) as f32 / self.sample_rate as f32;
        let t = self.num_sample as f32 / self.sample_rate as f32;
        self.num_sample += 1;

        // Fast exponential decay so each note reads as a "ding"
        let envelope = (-in_note * 12.0).exp();
        Some((2.0 * PI * self.notes[note] * t).sin() * envelope * AMPLITUDE)
    }
}

impl Source for Chime {
    fn current_frame_len(&self) -> Option<usize> {
        Some(self.total_samples() - self.num_sample.min(self.total_samples()))
    }

    fn channels(&self) -> u16 {
        1 // Mono
    }

    fn sample_rate(&self) -> u32 {
        self.sample_rate
    }

    fn total_duration(&self) -> Option<Duration> {
        Some(Duration::from_secs_f32(
            self.total_samples() as f32 / self.sample_rate as f32,
        ))
    }
}
